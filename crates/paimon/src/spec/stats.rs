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

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The statistics for columns, supports the following stats.
///
/// All statistics are stored in the form of a Binary, which can significantly reduce its memory consumption, but the cost is that the column type needs to be known when getting.
///
/// Impl Reference: <https://github.com/apache/paimon/blob/release-0.8.2/paimon-core/src/main/java/org/apache/paimon/stats/FieldStatsArraySerializer.java#L111>
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct BinaryTableStats {
    /// the minimum values of the columns
    #[serde(rename = "_MIN_VALUES", with = "serde_bytes")]
    min_values: Vec<u8>,

    /// the maximum values of the columns
    #[serde(rename = "_MAX_VALUES", with = "serde_bytes")]
    max_values: Vec<u8>,

    /// the number of nulls of the columns
    #[serde(rename = "_NULL_COUNTS")]
    null_counts: Vec<i64>,
}

impl BinaryTableStats {
    /// Get the minimum values of the columns
    #[inline]
    pub fn min_values(&self) -> &[u8] {
        &self.min_values
    }

    /// Get the maximum values of the columns
    #[inline]
    pub fn max_values(&self) -> &[u8] {
        &self.max_values
    }

    /// Get the number of nulls of the columns
    #[inline]
    pub fn null_counts(&self) -> &Vec<i64> {
        &self.null_counts
    }

    pub fn new(
        min_values: Vec<u8>,
        max_values: Vec<u8>,
        null_counts: Vec<i64>,
    ) -> BinaryTableStats {
        Self {
            min_values,
            max_values,
            null_counts,
        }
    }
}

impl Display for BinaryTableStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BinaryTableStats{{minValues={} bytes, maxValues={} bytes, nullCounts={:?}}}",
            self.min_values.len(),
            self.max_values.len(),
            self.null_counts
        )
    }
}

/// Per-field statistics kept on the write path before they are packed into
/// the wire-level [`BinaryTableStats`] (which stores them as opaque,
/// type-erased `BinaryRow`-style bytes). Having a typed form lets the
/// predicate evaluator (§4.K) and the stats collector (§4.I) reason about
/// individual columns without re-parsing the binary encoding each time.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStats {
    pub min_values: Vec<crate::spec::FieldValue>,
    pub max_values: Vec<crate::spec::FieldValue>,
    pub null_counts: Vec<i64>,
}

impl FieldStats {
    pub fn new(
        min_values: Vec<crate::spec::FieldValue>,
        max_values: Vec<crate::spec::FieldValue>,
        null_counts: Vec<i64>,
    ) -> Self {
        Self {
            min_values,
            max_values,
            null_counts,
        }
    }

    /// An all-null/zero-width placeholder, used when a file carries no
    /// collected statistics (e.g. it predates stats collection).
    pub fn none(arity: usize) -> Self {
        Self {
            min_values: vec![crate::spec::FieldValue::Null; arity],
            max_values: vec![crate::spec::FieldValue::Null; arity],
            null_counts: vec![0; arity],
        }
    }

    /// Packs these typed stats into the JSON-serialized wire form stored in
    /// a [`crate::spec::DataFileMeta`]. The binary "row" here is simply the
    /// JSON encoding of the value vector; unlike paimon-java's packed
    /// `BinaryRow` layout this trades a few bytes for not needing a second,
    /// schema-aware binary codec in this crate.
    pub fn to_binary(&self) -> crate::Result<BinaryTableStats> {
        let min_values = serde_json::to_vec(&self.min_values)
            .map_err(|e| crate::error::Error::DataInvalid {
                message: format!("failed to encode min stats: {e}"),
            })?;
        let max_values = serde_json::to_vec(&self.max_values)
            .map_err(|e| crate::error::Error::DataInvalid {
                message: format!("failed to encode max stats: {e}"),
            })?;
        Ok(BinaryTableStats::new(min_values, max_values, self.null_counts.clone()))
    }

    pub fn from_binary(stats: &BinaryTableStats) -> crate::Result<Self> {
        let min_values = serde_json::from_slice(stats.min_values())
            .map_err(|e| crate::error::Error::DataInvalid {
                message: format!("failed to decode min stats: {e}"),
            })?;
        let max_values = serde_json::from_slice(stats.max_values())
            .map_err(|e| crate::error::Error::DataInvalid {
                message: format!("failed to decode max stats: {e}"),
            })?;
        Ok(Self {
            min_values,
            max_values,
            null_counts: stats.null_counts().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldValue;

    #[test]
    fn field_stats_roundtrips_through_binary_form() {
        let stats = FieldStats::new(
            vec![FieldValue::Int(1), FieldValue::Null],
            vec![FieldValue::Int(9), FieldValue::String("z".into())],
            vec![0, 3],
        );
        let binary = stats.to_binary().unwrap();
        let decoded = FieldStats::from_binary(&binary).unwrap();
        assert_eq!(stats, decoded);
    }

    #[test]
    fn none_is_all_null() {
        let stats = FieldStats::none(2);
        assert_eq!(stats.min_values, vec![FieldValue::Null, FieldValue::Null]);
        assert_eq!(stats.null_counts, vec![0, 0]);
    }
}
