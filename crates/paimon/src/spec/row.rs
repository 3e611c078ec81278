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

/*!
 * In-memory row representation used by the write buffer, merge functions,
 * predicates and the read path.
 *
 * [`crate::spec::DataType`]/[`crate::spec::RowType`] describe a table's
 * *logical* schema; [`FieldValue`]/[`Row`] are the runtime values that flow
 * through the engine once a schema has been resolved. Keeping the two
 * separate mirrors paimon-java's split between `DataType` and
 * `InternalRow`/`GenericRow`.
 */

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single column value. `Ord` is defined so that `Null` sorts lowest,
/// matching SQL's NULLS FIRST convention and giving merge/compaction a total
/// order to sort by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Adds two numeric values, used by the `sum` aggregator (§4.J). Returns
    /// `None` for non-numeric or mismatched variants.
    pub fn checked_add(&self, other: &FieldValue) -> Option<FieldValue> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(FieldValue::Int(a + b)),
            (FieldValue::BigInt(a), FieldValue::BigInt(b)) => Some(FieldValue::BigInt(a + b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => Some(FieldValue::Float(a + b)),
            (FieldValue::Double(a), FieldValue::Double(b)) => Some(FieldValue::Double(a + b)),
            (FieldValue::Null, v) | (v, FieldValue::Null) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn checked_sub(&self, other: &FieldValue) -> Option<FieldValue> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(FieldValue::Int(a - b)),
            (FieldValue::BigInt(a), FieldValue::BigInt(b)) => Some(FieldValue::BigInt(a - b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => Some(FieldValue::Float(a - b)),
            (FieldValue::Double(a), FieldValue::Double(b)) => Some(FieldValue::Double(a - b)),
            _ => None,
        }
    }
}

impl Eq for FieldValue {}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (BigInt(a), BigInt(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Double(a), Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (String(a), String(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            // Mismatched variants only arise from programmer error (schema
            // evolution is handled before values reach here); fall back to a
            // stable, arbitrary order rather than panicking mid-compaction.
            _ => format!("{self:?}").cmp(&format!("{other:?}")),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Boolean(v) => write!(f, "{v}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::BigInt(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Double(v) => write!(f, "{v}"),
            FieldValue::String(v) => write!(f, "{v}"),
            FieldValue::Bytes(v) => write!(f, "{v:?}"),
        }
    }
}

/// A fixed-arity tuple of column values, addressed positionally like
/// paimon's `GenericRow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(pub Vec<FieldValue>);

impl Row {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self(values)
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.0.get(index)
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Projects this row onto the given field positions, used for both
    /// partition/bucket-key extraction and schema-evolution projection
    /// (§4.B). `None` entries (absent in the source schema) become `Null`.
    pub fn project(&self, positions: &[Option<usize>]) -> Row {
        Row(positions
            .iter()
            .map(|p| p.and_then(|i| self.0.get(i)).cloned().unwrap_or(FieldValue::Null))
            .collect())
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// The kind of change a record represents, matching paimon's `RowKind`:
/// `+I` insert, `-U` update-before, `+U` update-after, `-D` delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RowKind {
    Insert = 0,
    UpdateBefore = 1,
    UpdateAfter = 2,
    Delete = 3,
}

impl RowKind {
    /// Whether this kind adds presence of a row (`+I`/`+U`) as opposed to
    /// removing it (`-U`/`-D`).
    pub fn is_add(&self) -> bool {
        matches!(self, RowKind::Insert | RowKind::UpdateAfter)
    }

    pub fn short_string(&self) -> &'static str {
        match self {
            RowKind::Insert => "+I",
            RowKind::UpdateBefore => "-U",
            RowKind::UpdateAfter => "+U",
            RowKind::Delete => "-D",
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_first() {
        let mut values = vec![FieldValue::Int(1), FieldValue::Null, FieldValue::Int(-1)];
        values.sort();
        assert_eq!(values, vec![FieldValue::Null, FieldValue::Int(-1), FieldValue::Int(1)]);
    }

    #[test]
    fn project_fills_absent_with_null() {
        let row = Row::new(vec![FieldValue::Int(1), FieldValue::String("a".into())]);
        let projected = row.project(&[Some(1), None, Some(0)]);
        assert_eq!(
            projected,
            Row::new(vec![
                FieldValue::String("a".into()),
                FieldValue::Null,
                FieldValue::Int(1)
            ])
        );
    }

    #[test]
    fn checked_add_sums_like_types() {
        assert_eq!(
            FieldValue::BigInt(3).checked_add(&FieldValue::BigInt(4)),
            Some(FieldValue::BigInt(7))
        );
        assert_eq!(FieldValue::BigInt(3).checked_add(&FieldValue::Int(4)), None);
    }
}
