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

use crate::spec::{BinaryTableStats, FieldValue, RowType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const EMPTY_BINARY_ROW: BinaryRow = BinaryRow::new(0);

/// A row serialized to its binary wire form, used for partition values and
/// primary-key min/max bounds in manifest entries.
///
/// paimon-java packs these as a fixed-width null-bitset-plus-fields layout
/// (see [`BinaryRow::cal_fix_part_size_in_bytes`] for that arithmetic, kept
/// here since manifests computed against a real paimon table still encode
/// sizes that way). This crate instead packs the field vector as JSON: it
/// is not bit-for-bit compatible with paimon-java's layout, but the layout
/// is otherwise a private wire detail of this engine, and JSON keeps
/// [`BinaryRow::to_fields`]/[`BinaryRow::from_fields`] trivial to keep in
/// sync with [`FieldValue`]'s own `Serialize` impl as new variants are added.
///
/// Impl Reference: <https://github.com/apache/paimon/blob/release-0.8.2/paimon-common/src/main/java/org/apache/paimon/data/BinaryRow.java>
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BinaryRow {
    arity: i32,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl BinaryRow {
    pub const HEADER_SIZE_IN_BYTES: i32 = 8;
    pub const fn cal_bit_set_width_in_bytes(arity: i32) -> i32 {
        ((arity + 63 + Self::HEADER_SIZE_IN_BYTES) / 64) * 8
    }
    pub const fn cal_fix_part_size_in_bytes(arity: i32) -> i32 {
        Self::cal_bit_set_width_in_bytes(arity) + 8 * arity
    }

    pub const fn new(arity: i32) -> Self {
        Self {
            arity,
            data: Vec::new(),
        }
    }

    pub fn arity(&self) -> i32 {
        self.arity
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Packs a key/partition projection into its binary wire form.
    pub fn from_fields(fields: &[FieldValue]) -> crate::Result<Self> {
        let data = serde_json::to_vec(fields).map_err(|e| crate::error::Error::DataInvalid {
            message: format!("failed to encode binary row: {e}"),
        })?;
        Ok(Self {
            arity: fields.len() as i32,
            data,
        })
    }

    /// Unpacks the field values this row was built from.
    pub fn to_fields(&self) -> crate::Result<Vec<FieldValue>> {
        if self.data.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&self.data).map_err(|e| crate::error::Error::DataInvalid {
            message: format!("failed to decode binary row: {e}"),
        })
    }
}

/// The statistics for columns, stored in a data file's metadata in their
/// packed binary form; see [`crate::spec::FieldStats`] for the typed form
/// used elsewhere in the engine.
///
/// Impl References: <https://github.com/apache/paimon/blob/release-0.8.2/paimon-core/src/main/java/org/apache/paimon/stats/SimpleStats.java>
type SimpleStats = BinaryTableStats;

/// The Source of a file.
/// TODO: move me to the manifest module.
///
/// Impl References: <https://github.com/apache/paimon/blob/release-0.8.2/paimon-core/src/main/java/org/apache/paimon/manifest/FileSource.java>
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileSource {
    Append = 0,
    Compact = 1,
}

/// Metadata of a data file.
///
/// Impl References: <https://github.com/apache/paimon/blob/release-0.8.2/paimon-core/src/main/java/org/apache/paimon/io/DataFileMeta.java>
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFileMeta {
    pub file_name: String,
    pub file_size: i64,
    // row_count tells the total number of rows (including add & delete) in this file.
    pub row_count: i64,
    pub min_key: BinaryRow,
    pub max_key: BinaryRow,
    pub key_stats: SimpleStats,
    pub value_stats: SimpleStats,
    pub min_sequence_number: i64,
    pub max_sequence_number: i64,
    pub schema_id: i64,
    pub level: i32,
    pub extra_files: Vec<String>,
    pub creation_time: DateTime<Utc>,
    // rowCount = add_row_count + delete_row_count.
    pub delete_row_count: Option<i64>,
    // file index filter bytes, if it is small, store in data file meta
    pub embedded_index: Option<Vec<u8>>,
    pub file_source: Option<FileSource>,
}

impl Display for DataFileMeta {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DataFileMeta{{fileName={}, fileSize={}, rowCount={}, level={}, schemaId={}}}",
            self.file_name, self.file_size, self.row_count, self.level, self.schema_id
        )
    }
}

impl DataFileMeta {
    pub const SCHEMA: RowType = RowType::new(vec![]);

    /// Whether this file was produced directly by a write (vs. by
    /// compaction), used by the changelog producer to decide whether a file
    /// contributes directly to the INPUT changelog (§4.J).
    pub fn is_append_file(&self) -> bool {
        matches!(self.file_source, Some(FileSource::Append) | None)
    }
}
