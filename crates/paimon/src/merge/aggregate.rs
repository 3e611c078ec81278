// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The `aggregation` merge engine: one named aggregator per non-key field.

use std::str::FromStr;

use super::{KeyValue, MergeFunction};
use crate::error::ConfigInvalidSnafu;
use crate::spec::{FieldValue, Row, RowKind};
use crate::Result;

/// A named per-field aggregator, mirroring paimon-java's `FieldAggregator`
/// hierarchy (`FieldSumAgg`, `FieldMaxAgg`, ...) as plain enum variants
/// since this crate has no need for per-aggregator pluggability yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Min,
    Max,
    LastValue,
    LastNonNullValue,
    Listagg,
    BoolAnd,
    BoolOr,
}

impl AggFunc {
    /// Whether this aggregator accepts retractions (`-U`/`-D`); every other
    /// aggregator simply ignores them, folding only additions.
    fn accepts_retraction(&self) -> bool {
        matches!(self, AggFunc::Sum)
    }
}

impl FromStr for AggFunc {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "last_value" => Ok(Self::LastValue),
            "last_non_null_value" => Ok(Self::LastNonNullValue),
            "listagg" => Ok(Self::Listagg),
            "bool_and" => Ok(Self::BoolAnd),
            "bool_or" => Ok(Self::BoolOr),
            other => ConfigInvalidSnafu {
                message: format!("unrecognized fields.*.aggregate-function: {other}"),
            }
            .fail(),
        }
    }
}

/// `(field index, aggregator)` pair configured for one field of an
/// `aggregation` table. `ignore_retract` lets a `sum` field opt back out of
/// the retraction handling every other aggregator already ignores
/// (`fields.<name>.ignore-retract`, §6).
#[derive(Debug, Clone, Copy)]
pub struct AggSpec {
    pub field_index: usize,
    pub func: AggFunc,
    pub ignore_retract: bool,
}

impl AggSpec {
    pub fn new(field_index: usize, func: AggFunc) -> Self {
        Self {
            field_index,
            func,
            ignore_retract: false,
        }
    }

    pub fn with_ignore_retract(mut self, ignore_retract: bool) -> Self {
        self.ignore_retract = ignore_retract;
        self
    }
}

/// Applies one [`AggFunc`] per configured field across a key's change
/// stream. Fields with no configured aggregator fall back to last-value
/// semantics, matching paimon-java's default for unannotated columns.
pub struct AggregateMergeFunction {
    specs: Vec<AggSpec>,
    arity: usize,
    state: Vec<Option<FieldValue>>,
    seen_any: bool,
}

impl AggregateMergeFunction {
    pub fn new(arity: usize, specs: Vec<AggSpec>) -> Self {
        Self {
            specs,
            arity,
            state: vec![None; arity],
            seen_any: false,
        }
    }

    fn spec_for(&self, index: usize) -> (AggFunc, bool) {
        self.specs
            .iter()
            .find(|s| s.field_index == index)
            .map(|s| (s.func, s.ignore_retract))
            .unwrap_or((AggFunc::LastValue, false))
    }

    fn fold_one(current: Option<&FieldValue>, incoming: &FieldValue, func: AggFunc, ignore_retract: bool, is_retract: bool) -> Option<FieldValue> {
        if is_retract && (ignore_retract || !func.accepts_retraction()) {
            return current.cloned();
        }
        match func {
            AggFunc::Sum => {
                if is_retract {
                    match current {
                        Some(c) => c.checked_sub(incoming).or_else(|| Some(c.clone())),
                        None => Some(incoming.clone()),
                    }
                } else {
                    match current {
                        Some(c) => c.checked_add(incoming).or_else(|| Some(incoming.clone())),
                        None => Some(incoming.clone()),
                    }
                }
            }
            AggFunc::Min => match current {
                Some(c) if c <= incoming => Some(c.clone()),
                _ => Some(incoming.clone()),
            },
            AggFunc::Max => match current {
                Some(c) if c >= incoming => Some(c.clone()),
                _ => Some(incoming.clone()),
            },
            AggFunc::LastValue => Some(incoming.clone()),
            AggFunc::LastNonNullValue => {
                if incoming.is_null() {
                    current.cloned()
                } else {
                    Some(incoming.clone())
                }
            }
            AggFunc::Listagg => match (current, incoming) {
                (Some(FieldValue::String(a)), FieldValue::String(b)) => {
                    Some(FieldValue::String(format!("{a},{b}")))
                }
                (None, v) => Some(v.clone()),
                (c, _) => c.cloned(),
            },
            AggFunc::BoolAnd => match (current, incoming) {
                (Some(FieldValue::Boolean(a)), FieldValue::Boolean(b)) => {
                    Some(FieldValue::Boolean(*a && *b))
                }
                (None, v) => Some(v.clone()),
                (c, _) => c.cloned(),
            },
            AggFunc::BoolOr => match (current, incoming) {
                (Some(FieldValue::Boolean(a)), FieldValue::Boolean(b)) => {
                    Some(FieldValue::Boolean(*a || *b))
                }
                (None, v) => Some(v.clone()),
                (c, _) => c.cloned(),
            },
        }
    }
}

impl MergeFunction for AggregateMergeFunction {
    fn reset(&mut self) {
        self.state = vec![None; self.arity];
        self.seen_any = false;
    }

    fn add(&mut self, kv: &KeyValue) {
        if kv.kind == RowKind::Delete {
            // A delete retracts every field's contribution; fields with a
            // non-retracting aggregator simply keep their running value.
            for (idx, slot) in self.state.iter_mut().enumerate() {
                if let Some(incoming) = kv.value.get(idx) {
                    let (func, ignore_retract) = self.spec_for(idx);
                    *slot = Self::fold_one(slot.as_ref(), incoming, func, ignore_retract, true);
                }
            }
            self.seen_any = true;
            return;
        }
        for idx in 0..self.arity {
            if let Some(incoming) = kv.value.get(idx) {
                let (func, ignore_retract) = self.spec_for(idx);
                self.state[idx] = Self::fold_one(self.state[idx].as_ref(), incoming, func, ignore_retract, false);
            }
        }
        self.seen_any = true;
    }

    fn result(&self) -> Option<Row> {
        if !self.seen_any {
            return None;
        }
        Some(Row::new(self.state.iter().map(|v| v.clone().unwrap_or(FieldValue::Null)).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(seq: i64, kind: RowKind, value: Vec<FieldValue>) -> KeyValue {
        KeyValue::new(Row::new(vec![FieldValue::Int(1)]), seq, kind, Row::new(value))
    }

    #[test]
    fn sum_accumulates_across_records() {
        let mut f = AggregateMergeFunction::new(1, vec![AggSpec::new(0, AggFunc::Sum)]);
        let out = f.merge(&[
            kv(0, RowKind::Insert, vec![FieldValue::BigInt(3)]),
            kv(1, RowKind::Insert, vec![FieldValue::BigInt(4)]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::BigInt(7)])));
    }

    #[test]
    fn max_keeps_highest_seen() {
        let mut f = AggregateMergeFunction::new(1, vec![AggSpec::new(0, AggFunc::Max)]);
        let out = f.merge(&[
            kv(0, RowKind::Insert, vec![FieldValue::Int(3)]),
            kv(1, RowKind::Insert, vec![FieldValue::Int(1)]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::Int(3)])));
    }

    #[test]
    fn last_non_null_value_ignores_null_updates() {
        let mut f = AggregateMergeFunction::new(1, vec![AggSpec::new(0, AggFunc::LastNonNullValue)]);
        let out = f.merge(&[
            kv(0, RowKind::Insert, vec![FieldValue::String("a".into())]),
            kv(1, RowKind::UpdateAfter, vec![FieldValue::Null]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::String("a".into())])));
    }
}
