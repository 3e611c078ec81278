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

//! Merge functions (§4.J): fold an ordered run of changes to the same key
//! into at most one output value.
//!
//! [`KeyValue`] is the unit the LSM write path and the read path's merging
//! reader both operate on: a key, the sequence number that orders it among
//! same-key records, the [`RowKind`] it carries, and its value row.
//! [`MergeFunction`] is implemented once per `merge-engine` table option and
//! is the only place compaction and point lookups need to agree on what
//! "merge" means for a table.

mod aggregate;
pub use aggregate::{AggFunc, AggSpec, AggregateMergeFunction};

use crate::options::{MergeEngine, TableOptions};
use crate::spec::{FieldValue, Row, RowKind, RowType};
use crate::Result;

/// A single change to a key, as produced by a write buffer flush or read
/// back out of a data file. Ordered by `(key, sequence)` when merged.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: Row,
    pub sequence_number: i64,
    pub kind: RowKind,
    pub value: Row,
}

impl KeyValue {
    pub fn new(key: Row, sequence_number: i64, kind: RowKind, value: Row) -> Self {
        Self {
            key,
            sequence_number,
            kind,
            value,
        }
    }
}

/// Folds an ordered-by-sequence run of [`KeyValue`]s sharing one key into at
/// most one output value. Implementations MUST be associative over the
/// subset of splits that universal compaction may fold in stages-or must
/// refuse reordering by documenting the restriction, as `PartialUpdate` does
/// for deletes.
pub trait MergeFunction: Send + Sync {
    /// Resets any running state; called once per key group.
    fn reset(&mut self);

    /// Folds one more change into the running state.
    fn add(&mut self, kv: &KeyValue);

    /// Returns the merged result for the key group, or `None` if the key is
    /// no longer present (e.g. the last change was a delete).
    fn result(&self) -> Option<Row>;

    /// Merges a full run in one call; the default just drives `add`/`result`.
    fn merge(&mut self, kvs: &[KeyValue]) -> Option<Row> {
        self.reset();
        for kv in kvs {
            self.add(kv);
        }
        self.result()
    }
}

/// Keeps the value with the greatest sequence number; a trailing delete
/// yields no output.
#[derive(Debug, Default)]
pub struct DeduplicateMergeFunction {
    latest: Option<KeyValue>,
}

impl MergeFunction for DeduplicateMergeFunction {
    fn reset(&mut self) {
        self.latest = None;
    }

    fn add(&mut self, kv: &KeyValue) {
        if self
            .latest
            .as_ref()
            .is_none_or(|cur| kv.sequence_number >= cur.sequence_number)
        {
            self.latest = Some(kv.clone());
        }
    }

    fn result(&self) -> Option<Row> {
        self.latest.as_ref().filter(|kv| kv.kind != RowKind::Delete).map(|kv| kv.value.clone())
    }
}

/// Folds values in sequence order, overwriting each non-null field with the
/// later record's value. A delete either resets accumulated state (default)
/// or is ignored, per `partial-update.ignore-delete`.
pub struct PartialUpdateMergeFunction {
    ignore_delete: bool,
    current: Option<Vec<FieldValue>>,
}

impl PartialUpdateMergeFunction {
    pub fn new(ignore_delete: bool) -> Self {
        Self {
            ignore_delete,
            current: None,
        }
    }
}

impl MergeFunction for PartialUpdateMergeFunction {
    fn reset(&mut self) {
        self.current = None;
    }

    fn add(&mut self, kv: &KeyValue) {
        if kv.kind == RowKind::Delete {
            if !self.ignore_delete {
                self.current = None;
            }
            return;
        }
        match &mut self.current {
            None => self.current = Some(kv.value.0.clone()),
            Some(fields) => {
                for (slot, incoming) in fields.iter_mut().zip(kv.value.0.iter()) {
                    if !incoming.is_null() {
                        *slot = incoming.clone();
                    }
                }
            }
        }
    }

    fn result(&self) -> Option<Row> {
        self.current.clone().map(Row::new)
    }
}

/// Value is a `BIGINT` occurrence count; merging adds counts together and a
/// key whose running count drops to zero or below is dropped entirely, the
/// read path for tables with no primary key (§4.L "value-count" shape).
#[derive(Debug, Default)]
pub struct ValueCountMergeFunction {
    count: i64,
    seen: bool,
}

impl ValueCountMergeFunction {
    fn delta(kv: &KeyValue) -> i64 {
        let count = match kv.value.get(0) {
            Some(FieldValue::BigInt(n)) => *n,
            Some(FieldValue::Int(n)) => *n as i64,
            _ => 1,
        };
        if kv.kind.is_add() {
            count
        } else {
            -count
        }
    }
}

impl MergeFunction for ValueCountMergeFunction {
    fn reset(&mut self) {
        self.count = 0;
        self.seen = false;
    }

    fn add(&mut self, kv: &KeyValue) {
        self.seen = true;
        self.count += Self::delta(kv);
    }

    fn result(&self) -> Option<Row> {
        if self.seen && self.count > 0 {
            Some(Row::new(vec![FieldValue::BigInt(self.count)]))
        } else {
            None
        }
    }
}

/// Selects the configured merge function for a table, the `MergeFn` sum type
/// named in the design notes (`Dedup | PartialUpdate{mask} | Aggregate{..} |
/// ValueCount`) expressed as a small enum over the trait rather than a class
/// hierarchy.
pub enum MergeEngineFn {
    Deduplicate(DeduplicateMergeFunction),
    PartialUpdate(PartialUpdateMergeFunction),
    Aggregate(AggregateMergeFunction),
    ValueCount(ValueCountMergeFunction),
}

impl MergeEngineFn {
    pub fn as_trait(&mut self) -> &mut dyn MergeFunction {
        match self {
            MergeEngineFn::Deduplicate(f) => f,
            MergeEngineFn::PartialUpdate(f) => f,
            MergeEngineFn::Aggregate(f) => f,
            MergeEngineFn::ValueCount(f) => f,
        }
    }
}

/// Builds the `new_merge_fn` closure [`crate::mergetree::MergeTreeWriter`]
/// and the read-path merging reader both take, reading `merge-engine` (§6)
/// and, for `aggregation`, each value field's `fields.<name>.aggregate-function`
/// / `fields.<name>.ignore-retract` off `options`. `has_primary_key` selects
/// [`ValueCountMergeFunction`] regardless of `merge-engine` for tables with
/// no primary key, matching `MergeEngine::ValueCount`'s doc comment.
pub fn build_merge_engine_fn(
    options: &TableOptions,
    value_type: &RowType,
    has_primary_key: bool,
) -> Result<Box<dyn Fn() -> MergeEngineFn + Send + Sync>> {
    if !has_primary_key {
        return Ok(Box::new(|| MergeEngineFn::ValueCount(ValueCountMergeFunction::default())));
    }

    match options.merge_engine()? {
        MergeEngine::Deduplicate => Ok(Box::new(|| MergeEngineFn::Deduplicate(DeduplicateMergeFunction::default()))),
        MergeEngine::PartialUpdate => {
            let ignore_delete = options.partial_update_ignore_delete()?;
            Ok(Box::new(move || MergeEngineFn::PartialUpdate(PartialUpdateMergeFunction::new(ignore_delete))))
        }
        MergeEngine::Aggregation => {
            let arity = value_type.arity();
            let mut specs = Vec::new();
            for (index, field) in value_type.fields().iter().enumerate() {
                if let Some(func) = options.field_aggregate_function(&field.name)? {
                    let ignore_retract = options.field_ignore_retract(&field.name)?;
                    specs.push(AggSpec::new(index, func.parse()?).with_ignore_retract(ignore_retract));
                }
            }
            Ok(Box::new(move || MergeEngineFn::Aggregate(AggregateMergeFunction::new(arity, specs.clone()))))
        }
        MergeEngine::ValueCount => Ok(Box::new(|| MergeEngineFn::ValueCount(ValueCountMergeFunction::default()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn kv(key: i32, seq: i64, kind: RowKind, value: Vec<FieldValue>) -> KeyValue {
        KeyValue::new(Row::new(vec![FieldValue::Int(key)]), seq, kind, Row::new(value))
    }

    #[test]
    fn dedup_keeps_highest_sequence() {
        let mut f = DeduplicateMergeFunction::default();
        let out = f.merge(&[
            kv(1, 0, RowKind::Insert, vec![FieldValue::String("a".into())]),
            kv(1, 1, RowKind::UpdateAfter, vec![FieldValue::String("b".into())]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::String("b".into())])));
    }

    #[test]
    fn dedup_trailing_delete_yields_nothing() {
        let mut f = DeduplicateMergeFunction::default();
        let out = f.merge(&[
            kv(1, 0, RowKind::Insert, vec![FieldValue::Int(1)]),
            kv(1, 1, RowKind::Delete, vec![FieldValue::Int(1)]),
        ]);
        assert_eq!(out, None);
    }

    #[test]
    fn partial_update_overwrites_non_null_fields_only() {
        let mut f = PartialUpdateMergeFunction::new(false);
        let out = f.merge(&[
            kv(1, 0, RowKind::Insert, vec![FieldValue::Int(1), FieldValue::String("a".into())]),
            kv(1, 1, RowKind::UpdateAfter, vec![FieldValue::Null, FieldValue::String("b".into())]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::Int(1), FieldValue::String("b".into())])));
    }

    #[test]
    fn partial_update_delete_resets_unless_ignored() {
        let mut resetting = PartialUpdateMergeFunction::new(false);
        let out = resetting.merge(&[
            kv(1, 0, RowKind::Insert, vec![FieldValue::Int(1)]),
            kv(1, 1, RowKind::Delete, vec![FieldValue::Int(1)]),
            kv(1, 2, RowKind::Insert, vec![FieldValue::Int(2)]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::Int(2)])));

        let mut ignoring = PartialUpdateMergeFunction::new(true);
        let out = ignoring.merge(&[
            kv(1, 0, RowKind::Insert, vec![FieldValue::Int(1)]),
            kv(1, 1, RowKind::Delete, vec![FieldValue::Int(1)]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::Int(1)])));
    }

    #[test]
    fn value_count_adds_and_drops_non_positive() {
        let mut f = ValueCountMergeFunction::default();
        let out = f.merge(&[
            kv(1, 0, RowKind::Insert, vec![FieldValue::BigInt(2)]),
            kv(1, 1, RowKind::Insert, vec![FieldValue::BigInt(1)]),
            kv(1, 2, RowKind::Delete, vec![FieldValue::BigInt(3)]),
        ]);
        assert_eq!(out, None);
    }

    fn value_type() -> RowType {
        use crate::spec::{BigIntType, DataField, DataType};
        RowType::new(vec![
            DataField::new(0, "price".to_string(), DataType::BigInt(BigIntType::new())),
            DataField::new(1, "sales".to_string(), DataType::BigInt(BigIntType::new())),
        ])
    }

    #[test]
    fn no_primary_key_always_selects_value_count() {
        let options = TableOptions::new(HashMap::from([("merge-engine".to_string(), "deduplicate".to_string())]));
        let factory = build_merge_engine_fn(&options, &value_type(), false).unwrap();
        assert!(matches!(factory(), MergeEngineFn::ValueCount(_)));
    }

    #[test]
    fn default_merge_engine_is_deduplicate() {
        let options = TableOptions::default();
        let factory = build_merge_engine_fn(&options, &value_type(), true).unwrap();
        assert!(matches!(factory(), MergeEngineFn::Deduplicate(_)));
    }

    #[test]
    fn aggregation_reads_per_field_aggregate_function() {
        let options = TableOptions::new(HashMap::from([
            ("merge-engine".to_string(), "aggregation".to_string()),
            ("fields.price.aggregate-function".to_string(), "max".to_string()),
            ("fields.sales.aggregate-function".to_string(), "sum".to_string()),
        ]));
        let factory = build_merge_engine_fn(&options, &value_type(), true).unwrap();
        let mut engine = factory();
        let out = engine.as_trait().merge(&[
            kv(1, 0, RowKind::Insert, vec![FieldValue::BigInt(23), FieldValue::BigInt(15)]),
            kv(1, 1, RowKind::Insert, vec![FieldValue::BigInt(30), FieldValue::BigInt(20)]),
        ]);
        assert_eq!(out, Some(Row::new(vec![FieldValue::BigInt(30), FieldValue::BigInt(35)])));
    }

    #[test]
    fn unrecognized_merge_engine_is_rejected() {
        let options = TableOptions::new(HashMap::from([("merge-engine".to_string(), "bogus".to_string())]));
        assert!(build_merge_engine_fn(&options, &value_type(), true).is_err());
    }
}
