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

//! Predicates for partition/key/value filter pushdown (§4.H).
//!
//! A [`Predicate`] evaluates two ways: directly against a materialized
//! [`Row`] (used by the merge engine and by tests), and against a file's
//! [`FieldStats`] summary (used by [`crate::scan::Scan`] to decide whether a
//! whole file can be skipped without opening it). The two must agree: if
//! [`Predicate::test`] can be true for some row whose values fall within
//! `stats`, [`Predicate::test_stats`] must not say "skip".

mod field_ref;
pub use field_ref::FieldRef;

use crate::spec::{FieldStats, FieldValue, Row};

/// A predicate over a row, built out of field references and literals the
/// way paimon-java's `PredicateBuilder`/`LeafPredicate` tree works, just
/// flattened into a single recursive enum rather than a class hierarchy.
#[derive(Debug, Clone)]
pub enum Predicate {
    Equal(FieldRef, FieldValue),
    NotEqual(FieldRef, FieldValue),
    LessThan(FieldRef, FieldValue),
    LessOrEqual(FieldRef, FieldValue),
    GreaterThan(FieldRef, FieldValue),
    GreaterOrEqual(FieldRef, FieldValue),
    IsNull(FieldRef),
    IsNotNull(FieldRef),
    In(FieldRef, Vec<FieldValue>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Evaluates this predicate against a materialized row.
    pub fn test(&self, row: &Row) -> bool {
        match self {
            Predicate::Equal(f, v) => row.get(f.index()).is_some_and(|x| x == v),
            Predicate::NotEqual(f, v) => row.get(f.index()).is_some_and(|x| x != v),
            Predicate::LessThan(f, v) => row.get(f.index()).is_some_and(|x| x < v),
            Predicate::LessOrEqual(f, v) => row.get(f.index()).is_some_and(|x| x <= v),
            Predicate::GreaterThan(f, v) => row.get(f.index()).is_some_and(|x| x > v),
            Predicate::GreaterOrEqual(f, v) => row.get(f.index()).is_some_and(|x| x >= v),
            Predicate::IsNull(f) => row.get(f.index()).is_none_or(|x| x.is_null()),
            Predicate::IsNotNull(f) => row.get(f.index()).is_some_and(|x| !x.is_null()),
            Predicate::In(f, vs) => row.get(f.index()).is_some_and(|x| vs.contains(x)),
            Predicate::And(ps) => ps.iter().all(|p| p.test(row)),
            Predicate::Or(ps) => ps.iter().any(|p| p.test(row)),
        }
    }

    /// Evaluates this predicate against per-column `(min, max, null_count)`
    /// statistics, returning `true` only when the range **could** contain a
    /// row satisfying the predicate. This is the file-level pushdown used by
    /// `Scan` to drop a `DataFileMeta` without reading it: a `false` here is
    /// a hard guarantee, a `true` may still turn out empty once the file is
    /// actually opened (§4.H step 3).
    pub fn test_stats(&self, stats: &FieldStats) -> bool {
        let bound = |idx: usize| -> Option<(&FieldValue, &FieldValue, i64)> {
            let min = stats.min_values.get(idx)?;
            let max = stats.max_values.get(idx)?;
            let nulls = *stats.null_counts.get(idx)?;
            Some((min, max, nulls))
        };

        match self {
            Predicate::Equal(f, v) => match bound(f.index()) {
                None => true,
                Some((min, max, _)) => v >= min && v <= max,
            },
            Predicate::NotEqual(f, v) => match bound(f.index()) {
                None => true,
                // Only safe to skip when every value in the file equals v.
                Some((min, max, _)) => !(min == max && min == v),
            },
            Predicate::LessThan(f, v) => match bound(f.index()) {
                None => true,
                Some((min, _, _)) => min < v,
            },
            Predicate::LessOrEqual(f, v) => match bound(f.index()) {
                None => true,
                Some((min, _, _)) => min <= v,
            },
            Predicate::GreaterThan(f, v) => match bound(f.index()) {
                None => true,
                Some((_, max, _)) => max > v,
            },
            Predicate::GreaterOrEqual(f, v) => match bound(f.index()) {
                None => true,
                Some((_, max, _)) => max >= v,
            },
            Predicate::IsNull(f) => match bound(f.index()) {
                None => true,
                Some((_, _, nulls)) => nulls > 0,
            },
            Predicate::IsNotNull(f) => match bound(f.index()) {
                None => true,
                Some((min, max, _)) => !(min.is_null() && max.is_null()),
            },
            Predicate::In(f, vs) => match bound(f.index()) {
                None => true,
                Some((min, max, _)) => vs.iter().any(|v| v >= min && v <= max),
            },
            Predicate::And(ps) => ps.iter().all(|p| p.test_stats(stats)),
            Predicate::Or(ps) => ps.iter().any(|p| p.test_stats(stats)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::DataType;

    fn field(idx: usize) -> FieldRef {
        FieldRef::new(idx, "a", DataType::Int(crate::spec::IntType::new()))
    }

    #[test]
    fn equal_tests_row_value() {
        let p = Predicate::Equal(field(0), FieldValue::Int(5));
        assert!(p.test(&Row::new(vec![FieldValue::Int(5)])));
        assert!(!p.test(&Row::new(vec![FieldValue::Int(6)])));
    }

    #[test]
    fn equal_skips_file_outside_min_max_range() {
        let p = Predicate::Equal(field(0), FieldValue::Int(42));
        let stats = FieldStats::new(
            vec![FieldValue::Int(0)],
            vec![FieldValue::Int(10)],
            vec![0],
        );
        assert!(!p.test_stats(&stats));

        let stats_in_range = FieldStats::new(
            vec![FieldValue::Int(0)],
            vec![FieldValue::Int(100)],
            vec![0],
        );
        assert!(p.test_stats(&stats_in_range));
    }

    #[test]
    fn and_or_compose() {
        let p = Predicate::And(vec![
            Predicate::GreaterOrEqual(field(0), FieldValue::Int(1)),
            Predicate::LessOrEqual(field(0), FieldValue::Int(3)),
        ]);
        assert!(p.test(&Row::new(vec![FieldValue::Int(2)])));
        assert!(!p.test(&Row::new(vec![FieldValue::Int(9)])));

        let o = Predicate::Or(vec![
            Predicate::Equal(field(0), FieldValue::Int(1)),
            Predicate::Equal(field(0), FieldValue::Int(9)),
        ]);
        assert!(o.test(&Row::new(vec![FieldValue::Int(9)])));
    }

    #[test]
    fn is_null_respects_null_count() {
        let p = Predicate::IsNull(field(0));
        let stats_no_nulls = FieldStats::new(
            vec![FieldValue::Int(0)],
            vec![FieldValue::Int(10)],
            vec![0],
        );
        assert!(!p.test_stats(&stats_no_nulls));

        let stats_with_nulls = FieldStats::new(
            vec![FieldValue::Int(0)],
            vec![FieldValue::Int(10)],
            vec![3],
        );
        assert!(p.test_stats(&stats_with_nulls));
    }
}
