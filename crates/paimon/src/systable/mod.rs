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

//! Read-only virtual tables over a table's own metadata (§4.N, §6):
//! `snapshots`, `schemas`, `options`, `audit_log`, `files`.
//!
//! Each one has a fixed [`RowType`], the same way
//! [`crate::spec::DataFileMeta::SCHEMA`] pins down a row shape for a
//! system-internal row, and is sourced straight from the manager that
//! already owns the underlying metadata: [`crate::snapshot::SnapshotManager`],
//! [`crate::schema::SchemaManager`], a table's [`TableOptions`], or manifest
//! entries read through [`crate::manifest::ManifestFile`].

use crate::io::FileIO;
use crate::manifest::ManifestFile;
use crate::options::TableOptions;
use crate::schema::SchemaManager;
use crate::scan::reduce_entries;
use crate::snapshot::SnapshotManager;
use crate::spec::{
    BigIntType, CommitKind, DataField, DataType, IntType, ManifestListFactory, Row, RowKind, RowType, VarCharType,
};
use crate::Result;

fn commit_kind_name(kind: &CommitKind) -> &'static str {
    match kind {
        CommitKind::Append => "APPEND",
        CommitKind::Compact => "COMPACT",
        CommitKind::Overwrite => "OVERWRITE",
        CommitKind::Analyze => "ANALYZE",
    }
}

/// System table text columns (user names, paths, serialized option values)
/// have no natural bound, so every one of them uses the same generous cap
/// rather than guessing a precise length per column.
const TEXT_LENGTH: u32 = 1 << 20;

fn varchar_field(id: i32, name: &str) -> DataField {
    DataField::new(id, name.to_string(), DataType::VarChar(VarCharType::new(TEXT_LENGTH).unwrap()))
}

fn bigint_field(id: i32, name: &str) -> DataField {
    DataField::new(id, name.to_string(), DataType::BigInt(BigIntType::new()))
}

fn int_field(id: i32, name: &str) -> DataField {
    DataField::new(id, name.to_string(), DataType::Int(IntType::new()))
}

/// `snapshots` system table schema.
pub fn snapshots_schema() -> RowType {
    RowType::new(vec![
        bigint_field(0, "snapshot_id"),
        bigint_field(1, "schema_id"),
        varchar_field(2, "commit_user"),
        bigint_field(3, "commit_identifier"),
        varchar_field(4, "commit_kind"),
        bigint_field(5, "commit_time"),
    ])
}

/// Every retained snapshot of a table, ascending by id.
pub async fn snapshots(file_io: FileIO, table_root: impl Into<String>) -> Result<Vec<Row>> {
    let manager = SnapshotManager::new(file_io, table_root);
    let mut rows = Vec::new();
    let (Some(earliest), Some(latest)) = (
        manager.earliest_snapshot_id().await?,
        manager.latest_snapshot_id().await?,
    ) else {
        return Ok(rows);
    };
    for id in earliest..=latest {
        if !manager.snapshot_exists(id).await? {
            continue;
        }
        let snapshot = manager.snapshot(id).await?;
        rows.push(Row::new(vec![
            crate::spec::FieldValue::BigInt(snapshot.id()),
            crate::spec::FieldValue::BigInt(snapshot.schema_id()),
            crate::spec::FieldValue::String(snapshot.commit_user().to_string()),
            crate::spec::FieldValue::BigInt(snapshot.commit_identifier()),
            crate::spec::FieldValue::String(commit_kind_name(snapshot.commit_kind()).to_string()),
            crate::spec::FieldValue::BigInt(snapshot.time_millis()),
        ]));
    }
    Ok(rows)
}

/// `schemas` system table schema.
pub fn schemas_schema() -> RowType {
    RowType::new(vec![
        bigint_field(0, "schema_id"),
        int_field(1, "field_count"),
        varchar_field(2, "partition_keys"),
        varchar_field(3, "primary_keys"),
        bigint_field(4, "commit_time"),
    ])
}

/// Every schema version a table has ever had, ascending by id.
pub async fn schemas(file_io: FileIO, table_root: impl Into<String>) -> Result<Vec<Row>> {
    let manager = SchemaManager::new(file_io, table_root);
    let mut rows = Vec::new();
    for schema in manager.list_all().await? {
        rows.push(Row::new(vec![
            crate::spec::FieldValue::BigInt(schema.id),
            crate::spec::FieldValue::Int(schema.fields.len() as i32),
            crate::spec::FieldValue::String(schema.partition_keys.join(",")),
            crate::spec::FieldValue::String(schema.primary_keys.join(",")),
            crate::spec::FieldValue::BigInt(schema.time_millis),
        ]));
    }
    Ok(rows)
}

/// `options` system table schema.
pub fn options_schema() -> RowType {
    RowType::new(vec![varchar_field(0, "key"), varchar_field(1, "value")])
}

/// The raw option map backing a table's [`TableOptions`].
pub fn options(options: &TableOptions) -> Vec<Row> {
    options
        .raw()
        .iter()
        .map(|(k, v)| Row::new(vec![crate::spec::FieldValue::String(k.clone()), crate::spec::FieldValue::String(v.clone())]))
        .collect()
}

/// `audit_log` system table schema: the table's own row type with a virtual
/// `rowkind` column prepended, mirroring paimon's `$audit_log` view.
pub fn audit_log_schema(value_fields: &[DataField]) -> RowType {
    let mut fields = vec![varchar_field(-1, "rowkind")];
    fields.extend(value_fields.iter().cloned());
    RowType::new(fields)
}

/// Prepends a row's change kind as the virtual `rowkind` column.
pub fn audit_log_row(kind: RowKind, value: Row) -> Row {
    let mut fields = vec![crate::spec::FieldValue::String(kind.short_string().to_string())];
    fields.extend(value.0);
    Row::new(fields)
}

fn render_field_value(value: &crate::spec::FieldValue) -> String {
    use crate::spec::FieldValue;
    match value {
        FieldValue::Null => "null".to_string(),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Int(i) => i.to_string(),
        FieldValue::BigInt(i) => i.to_string(),
        FieldValue::Float(f) => f.to_string(),
        FieldValue::Double(f) => f.to_string(),
        FieldValue::String(s) => s.clone(),
        FieldValue::Bytes(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
    }
}

/// `files` system table schema.
pub fn files_schema() -> RowType {
    RowType::new(vec![
        varchar_field(0, "partition"),
        int_field(1, "bucket"),
        varchar_field(2, "file_name"),
        int_field(3, "level"),
        bigint_field(4, "row_count"),
        bigint_field(5, "file_size_in_bytes"),
    ])
}

/// Every live data file behind the latest snapshot.
pub async fn files(file_io: FileIO, table_root: impl Into<String>) -> Result<Vec<Row>> {
    let table_root = table_root.into();
    let snapshots = SnapshotManager::new(file_io.clone(), table_root.clone());
    let manifest_list = ManifestListFactory::new(file_io.clone());
    let manifest_file = ManifestFile::new(file_io.clone());
    let manifest_dir = format!("{}/manifest", table_root.trim_end_matches('/'));

    let mut rows = Vec::new();
    let Some(latest_id) = snapshots.latest_snapshot_id().await? else {
        return Ok(rows);
    };
    let snapshot = snapshots.snapshot(latest_id).await?;

    let mut metas = manifest_list
        .read(&format!("{manifest_dir}/{}", snapshot.base_manifest_list()))
        .await?
        .entries()
        .clone();
    metas.extend(
        manifest_list
            .read(&format!("{manifest_dir}/{}", snapshot.delta_manifest_list()))
            .await?
            .entries()
            .clone(),
    );

    let mut entries = Vec::new();
    for meta in &metas {
        let path = format!("{manifest_dir}/{}", meta.file_name());
        entries.extend(manifest_file.read(&path).await?);
    }

    for entry in reduce_entries(entries) {
        let partition = crate::paths::decode_partition(entry.partition())?;
        let rendered = partition
            .iter()
            .map(render_field_value)
            .collect::<Vec<_>>()
            .join(",");
        rows.push(Row::new(vec![
            crate::spec::FieldValue::String(rendered),
            crate::spec::FieldValue::Int(entry.bucket()),
            crate::spec::FieldValue::String(entry.file_name().to_string()),
            crate::spec::FieldValue::Int(entry.level()),
            crate::spec::FieldValue::BigInt(entry.file().row_count),
            crate::spec::FieldValue::BigInt(entry.file().file_size),
        ]));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Committable, FileStoreCommit};
    use crate::spec::{BinaryRow, BinaryTableStats, DataFileMeta, FieldValue, FileKind, FileSource, ManifestEntry};
    use chrono::Utc;
    use std::collections::HashMap;

    fn memory_file_io() -> FileIO {
        FileIO::new(HashMap::from([("scheme".to_string(), "memory".to_string())])).unwrap()
    }

    fn data_file(name: &str) -> DataFileMeta {
        DataFileMeta {
            file_name: name.to_string(),
            file_size: 10,
            row_count: 3,
            min_key: BinaryRow::new(0),
            max_key: BinaryRow::new(0),
            key_stats: BinaryTableStats::new(vec![], vec![], vec![]),
            value_stats: BinaryTableStats::new(vec![], vec![], vec![]),
            min_sequence_number: 0,
            max_sequence_number: 2,
            schema_id: 0,
            level: 0,
            extra_files: vec![],
            creation_time: Utc::now(),
            delete_row_count: Some(0),
            embedded_index: None,
            file_source: Some(FileSource::Append),
        }
    }

    #[tokio::test]
    async fn snapshots_lists_every_retained_commit() {
        let file_io = memory_file_io();
        let commit = FileStoreCommit::new(file_io.clone(), "t");
        let mut committable = Committable::new(0, "w", 1, CommitKind::Append, 1000);
        committable
            .delta_entries
            .push(ManifestEntry::new(FileKind::Add, vec![], 0, 1, data_file("a"), 2));
        commit.commit(committable).await.unwrap();

        let rows = snapshots(file_io, "t").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(&FieldValue::BigInt(0)));
    }

    #[tokio::test]
    async fn files_lists_live_data_files() {
        let file_io = memory_file_io();
        let commit = FileStoreCommit::new(file_io.clone(), "t");
        let mut committable = Committable::new(0, "w", 1, CommitKind::Append, 1000);
        committable
            .delta_entries
            .push(ManifestEntry::new(FileKind::Add, vec![], 0, 1, data_file("a.avro"), 2));
        commit.commit(committable).await.unwrap();

        let rows = files(file_io, "t").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(2), Some(&FieldValue::String("a.avro".to_string())));
    }

    #[test]
    fn options_exposes_raw_map() {
        let opts = TableOptions::new(HashMap::from([("bucket".to_string(), "4".to_string())]));
        let rows = options(&opts);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(&FieldValue::String("bucket".to_string())));
    }

    #[test]
    fn audit_log_row_prepends_rowkind() {
        let row = audit_log_row(RowKind::Insert, Row::new(vec![FieldValue::Int(1)]));
        assert_eq!(row.get(0), Some(&FieldValue::String("+I".to_string())));
        assert_eq!(row.get(1), Some(&FieldValue::Int(1)));
    }
}
