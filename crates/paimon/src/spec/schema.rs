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

use crate::spec::{DataType, RowType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The table schema for paimon table.
///
/// Impl References: <https://github.com/apache/paimon/blob/db8bcd7fdd9c2705435d2ab1d2341c52d1f67ee5/paimon-core/src/main/java/org/apache/paimon/schema/TableSchema.java#L47>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// version of schema for paimon
    pub version: i32,
    pub id: i64,
    pub fields: Vec<DataField>,
    pub highest_field_id: i32,
    pub partition_keys: Vec<String>,
    pub primary_keys: Vec<String>,
    pub options: HashMap<String, String>,
    pub comment: Option<String>,
    pub time_millis: i64,
}

impl TableSchema {
    /// The logical row type of the whole table, including partition and
    /// primary key columns; used as [`crate::spec::DataFileMeta::SCHEMA`]'s
    /// per-table counterpart when building a writer or a scan.
    pub fn row_type(&self) -> RowType {
        RowType::new(self.fields.clone())
    }

    /// Positions of the primary key fields within [`TableSchema::fields`],
    /// in declaration order. Used to build the trimmed-primary-key row a
    /// merge-tree writer keys its levels by (§4.I).
    pub fn primary_key_positions(&self) -> Vec<usize> {
        self.primary_keys
            .iter()
            .filter_map(|name| self.fields.iter().position(|f| &f.name == name))
            .collect()
    }

    pub fn highest_field_id(fields: &[DataField]) -> i32 {
        fields.iter().map(|f| f.id).max().unwrap_or(-1)
    }

    /// [`TableSchema::partition_keys`] resolved to their [`DataField`]s, in
    /// partition-key declaration order; used to render `k1=v1/k2=v2`
    /// directory paths (§6).
    pub fn partition_fields(&self) -> Vec<DataField> {
        self.partition_keys
            .iter()
            .filter_map(|name| self.fields.iter().find(|f| &f.name == name).cloned())
            .collect()
    }
}

/// Data field for paimon table.
///
/// Impl Reference: <https://github.com/apache/paimon/blob/db8bcd7fdd9c2705435d2ab1d2341c52d1f67ee5/paimon-common/src/main/java/org/apache/paimon/types/DataField.java#L40>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataField {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub typ: DataType,
    pub description: Option<String>,
}

impl DataField {
    pub fn new(id: i32, name: String, typ: DataType) -> Self {
        Self {
            id,
            name,
            typ,
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.typ
    }
}
