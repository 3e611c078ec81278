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

//! Schema storage and evolution (§4.B).
//!
//! `SchemaManager` is an append-only store of `schema/schema-<id>` JSON
//! files, mirroring how [`crate::snapshot::SnapshotManager`] manages
//! `snapshot/snapshot-<id>`: both resolve "latest" by directory listing
//! rather than by keeping any mutable index around.

mod evolution;
pub use evolution::{CastPolicy, SchemaEvolution};

use crate::error::{ConfigInvalidSnafu, DataInvalidSnafu, IoFatalSnafu};
use crate::io::FileIO;
use crate::spec::{DataField, SchemaChange, TableSchema};
use crate::Result;
use bytes::Bytes;
use snafu::OptionExt;
use std::collections::HashMap;

const SCHEMA_DIR: &str = "schema";
const SCHEMA_PREFIX: &str = "schema-";

/// Append-only store of table schema versions under `<table root>/schema/`.
pub struct SchemaManager {
    file_io: FileIO,
    table_root: String,
}

impl SchemaManager {
    pub fn new(file_io: FileIO, table_root: impl Into<String>) -> Self {
        Self {
            file_io,
            table_root: table_root.into(),
        }
    }

    fn schema_dir(&self) -> String {
        format!("{}/{}", self.table_root.trim_end_matches('/'), SCHEMA_DIR)
    }

    fn schema_path(&self, id: i64) -> String {
        format!("{}/{}{}", self.schema_dir(), SCHEMA_PREFIX, id)
    }

    /// Lists every schema id present on disk, ascending.
    pub async fn list_all_ids(&self) -> Result<Vec<i64>> {
        let dir = self.schema_dir();
        if !self.file_io.exists(&dir).await? {
            return Ok(Vec::new());
        }
        let mut ids: Vec<i64> = self
            .file_io
            .list_status(&format!("{dir}/"))
            .await?
            .into_iter()
            .filter_map(|status| {
                let name = status.path.rsplit('/').next().unwrap_or(&status.path);
                name.strip_prefix(SCHEMA_PREFIX)?.parse::<i64>().ok()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Reads and parses every schema version, ascending by id.
    pub async fn list_all(&self) -> Result<Vec<TableSchema>> {
        let mut out = Vec::new();
        for id in self.list_all_ids().await? {
            out.push(self.schema(id).await?);
        }
        Ok(out)
    }

    /// Reads a specific schema version.
    pub async fn schema(&self, id: i64) -> Result<TableSchema> {
        let path = self.schema_path(id);
        let bytes = self.file_io.new_input(&path)?.read().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            crate::Error::DataInvalid {
                message: format!("failed to parse schema {id} at {path}: {e}"),
            }
        })
    }

    /// Resolves the current schema: the schema with the highest id on disk.
    /// There is no hint file for schemas (unlike snapshots) since the schema
    /// directory is expected to stay small and is listed directly.
    pub async fn latest(&self) -> Result<Option<TableSchema>> {
        let ids = self.list_all_ids().await?;
        match ids.last() {
            None => Ok(None),
            Some(id) => self.schema(*id).await.map(Some),
        }
    }

    async fn write_schema(&self, schema: &TableSchema) -> Result<()> {
        let path = self.schema_path(schema.id);
        let bytes = serde_json::to_vec_pretty(schema).map_err(|e| crate::Error::DataInvalid {
            message: format!("failed to encode schema {}: {e}", schema.id),
        })?;
        // Schema ids are assigned by this manager under a single committer,
        // so a plain create (not a rename dance like snapshots) is enough:
        // concurrent commit conflicts are caught by FileStoreCommit's schema
        // id check (§4.F), not by schema publication itself.
        self.file_io.new_output(&path)?.write(Bytes::from(bytes)).await
    }

    /// Creates schema 0 for a brand-new table.
    pub async fn create_table(
        &self,
        fields: Vec<DataField>,
        partition_keys: Vec<String>,
        primary_keys: Vec<String>,
        options: HashMap<String, String>,
        comment: Option<String>,
        time_millis: i64,
    ) -> Result<TableSchema> {
        if self.latest().await?.is_some() {
            return ConfigInvalidSnafu {
                message: "table already has a schema; use commit_changes to evolve it",
            }
            .fail();
        }
        validate_primary_keys(&partition_keys, &primary_keys)?;
        let highest_field_id = TableSchema::highest_field_id(&fields);
        let schema = TableSchema {
            version: 1,
            id: 0,
            fields,
            highest_field_id,
            partition_keys,
            primary_keys,
            options,
            comment,
            time_millis,
        };
        self.write_schema(&schema).await?;
        Ok(schema)
    }

    /// Applies `changes` to the latest schema and publishes schema `id+1`.
    pub async fn commit_changes(
        &self,
        changes: Vec<SchemaChange>,
        time_millis: i64,
    ) -> Result<TableSchema> {
        let current = self.latest().await?.context(IoFatalSnafu {
            message: "cannot evolve a table with no schema yet".to_string(),
        })?;
        let next = apply_changes(&current, changes)?;
        validate_primary_keys(&next.partition_keys, &next.primary_keys)?;
        self.write_schema(&next).await?;
        Ok(next)
    }
}

/// I: `primaryKeys ⊇ partitionKeys`, and for PK tables `primaryKeys \
/// partitionKeys ≠ ∅` (§3 Invariants).
fn validate_primary_keys(partition_keys: &[String], primary_keys: &[String]) -> Result<()> {
    if primary_keys.is_empty() {
        return Ok(());
    }
    for pk in partition_keys {
        if !primary_keys.contains(pk) {
            return DataInvalidSnafu {
                message: format!(
                    "primary keys must contain all partition keys; missing '{pk}'"
                ),
            }
            .fail();
        }
    }
    if primary_keys.len() == partition_keys.len() {
        return DataInvalidSnafu {
            message: "primary keys must contain at least one field beyond the partition keys"
                .to_string(),
        }
        .fail();
    }
    Ok(())
}

fn apply_changes(base: &TableSchema, changes: Vec<SchemaChange>) -> Result<TableSchema> {
    let mut fields = base.fields.clone();
    let mut partition_keys = base.partition_keys.clone();
    let mut primary_keys = base.primary_keys.clone();
    let mut options = base.options.clone();
    let mut comment = base.comment.clone();
    let mut highest_field_id = base.highest_field_id;

    for change in changes {
        match change {
            SchemaChange::SetOption { key, value } => {
                options.insert(key, value);
            }
            SchemaChange::RemoveOption { key } => {
                options.remove(&key);
            }
            SchemaChange::UpdateComment { comment: c } => {
                comment = c;
            }
            SchemaChange::AddColumn {
                field_name,
                data_type,
                description,
                ..
            } => {
                if fields.iter().any(|f| f.name == field_name) {
                    return DataInvalidSnafu {
                        message: format!("column '{field_name}' already exists"),
                    }
                    .fail();
                }
                highest_field_id += 1;
                let mut field = DataField::new(highest_field_id, field_name, data_type);
                field = field.with_description(description);
                fields.push(field);
            }
            SchemaChange::RenameColumn {
                field_name,
                new_name,
            } => {
                let field = fields.iter_mut().find(|f| f.name == field_name).context(
                    DataInvalidSnafu {
                        message: format!("column '{field_name}' does not exist"),
                    },
                )?;
                field.name = new_name.clone();
                for key in partition_keys.iter_mut().chain(primary_keys.iter_mut()) {
                    if *key == field_name {
                        *key = new_name.clone();
                    }
                }
            }
            SchemaChange::DropColumn { field_name } => {
                if primary_keys.contains(&field_name) || partition_keys.contains(&field_name) {
                    return DataInvalidSnafu {
                        message: format!(
                            "cannot drop '{field_name}': part of the partition or primary key"
                        ),
                    }
                    .fail();
                }
                let before = fields.len();
                fields.retain(|f| f.name != field_name);
                if fields.len() == before {
                    return DataInvalidSnafu {
                        message: format!("column '{field_name}' does not exist"),
                    }
                    .fail();
                }
            }
            SchemaChange::UpdateColumnType {
                field_name,
                data_type,
            } => {
                let field = fields.iter_mut().find(|f| f.name == field_name).context(
                    DataInvalidSnafu {
                        message: format!("column '{field_name}' does not exist"),
                    },
                )?;
                field.typ = data_type;
            }
            SchemaChange::UpdateColumnPosition { column_move } => {
                reorder_field(&mut fields, &column_move)?;
            }
            SchemaChange::UpdateColumnNullability { .. }
            | SchemaChange::UpdateColumnComment { .. } => {
                // Nullability/comment-only changes don't affect field ids,
                // ordering, partitioning or keys; nothing else to update.
            }
        }
    }

    Ok(TableSchema {
        version: base.version,
        id: base.id + 1,
        fields,
        highest_field_id,
        partition_keys,
        primary_keys,
        options,
        comment,
        time_millis: base.time_millis,
    })
}

fn reorder_field(
    fields: &mut Vec<DataField>,
    column_move: &crate::spec::ColumnMove,
) -> Result<()> {
    let from = fields
        .iter()
        .position(|f| f.name == column_move.field_name())
        .context(DataInvalidSnafu {
            message: format!("column '{}' does not exist", column_move.field_name()),
        })?;
    let field = fields.remove(from);
    let to = match column_move.move_type() {
        crate::spec::ColumnMoveType::FIRST => 0,
        crate::spec::ColumnMoveType::AFTER => {
            let anchor = column_move.referenced_field_name().context(DataInvalidSnafu {
                message: "AFTER move requires a referenced field".to_string(),
            })?;
            fields
                .iter()
                .position(|f| f.name == anchor)
                .context(DataInvalidSnafu {
                    message: format!("column '{anchor}' does not exist"),
                })?
                + 1
        }
    };
    fields.insert(to.min(fields.len()), field);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{DataType, IntType, VarCharType};

    fn memory_file_io() -> FileIO {
        FileIO::new(HashMap::from([(
            "scheme".to_string(),
            "memory".to_string(),
        )]))
        .unwrap()
    }

    fn manager() -> SchemaManager {
        SchemaManager::new(memory_file_io(), "warehouse/db.db/t")
    }

    fn base_fields() -> Vec<DataField> {
        vec![
            DataField::new(0, "k".to_string(), DataType::Int(IntType::new())),
            DataField::new(1, "v".to_string(), DataType::VarChar(VarCharType::new(20).unwrap())),
        ]
    }

    #[tokio::test]
    async fn create_table_writes_schema_zero() {
        let mgr = manager();
        let schema = mgr
            .create_table(base_fields(), vec![], vec!["k".to_string()], HashMap::new(), None, 0)
            .await
            .unwrap();
        assert_eq!(schema.id, 0);
        assert_eq!(schema.highest_field_id, 1);
        assert_eq!(mgr.latest().await.unwrap().unwrap().id, 0);
        assert_eq!(mgr.list_all_ids().await.unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn create_table_twice_is_rejected() {
        let mgr = manager();
        mgr.create_table(base_fields(), vec![], vec![], HashMap::new(), None, 0)
            .await
            .unwrap();
        let err = mgr
            .create_table(base_fields(), vec![], vec![], HashMap::new(), None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::ConfigInvalid { .. }));
    }

    #[tokio::test]
    async fn primary_keys_must_be_superset_of_partition_keys() {
        let mgr = manager();
        let err = mgr
            .create_table(
                base_fields(),
                vec!["k".to_string()],
                vec!["v".to_string()],
                HashMap::new(),
                None,
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::DataInvalid { .. }));
    }

    #[tokio::test]
    async fn primary_keys_must_extend_beyond_partition_keys() {
        let mgr = manager();
        let err = mgr
            .create_table(
                base_fields(),
                vec!["k".to_string()],
                vec!["k".to_string()],
                HashMap::new(),
                None,
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::DataInvalid { .. }));
    }

    #[tokio::test]
    async fn commit_changes_adds_column_and_bumps_schema_id() {
        let mgr = manager();
        mgr.create_table(base_fields(), vec![], vec!["k".to_string()], HashMap::new(), None, 0)
            .await
            .unwrap();

        let next = mgr
            .commit_changes(
                vec![SchemaChange::add_column("c".to_string(), DataType::Int(IntType::new()))],
                1,
            )
            .await
            .unwrap();

        assert_eq!(next.id, 1);
        assert_eq!(next.highest_field_id, 2);
        assert!(next.fields.iter().any(|f| f.name == "c"));
        assert_eq!(mgr.latest().await.unwrap().unwrap().id, 1);
    }

    #[tokio::test]
    async fn commit_changes_renames_column_and_tracked_keys() {
        let mgr = manager();
        mgr.create_table(base_fields(), vec![], vec!["k".to_string()], HashMap::new(), None, 0)
            .await
            .unwrap();

        let next = mgr
            .commit_changes(
                vec![SchemaChange::rename_column("k".to_string(), "id".to_string())],
                1,
            )
            .await
            .unwrap();

        assert_eq!(next.primary_keys, vec!["id".to_string()]);
        assert!(next.fields.iter().any(|f| f.name == "id"));
    }

    #[tokio::test]
    async fn commit_changes_rejects_dropping_a_primary_key() {
        let mgr = manager();
        mgr.create_table(base_fields(), vec![], vec!["k".to_string()], HashMap::new(), None, 0)
            .await
            .unwrap();

        let err = mgr
            .commit_changes(vec![SchemaChange::drop_column("k".to_string())], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::DataInvalid { .. }));
    }

    #[tokio::test]
    async fn commit_changes_drops_non_key_column() {
        let mgr = manager();
        mgr.create_table(base_fields(), vec![], vec!["k".to_string()], HashMap::new(), None, 0)
            .await
            .unwrap();

        let next = mgr
            .commit_changes(vec![SchemaChange::drop_column("v".to_string())], 1)
            .await
            .unwrap();
        assert!(!next.fields.iter().any(|f| f.name == "v"));
    }

    #[tokio::test]
    async fn commit_changes_without_prior_schema_fails() {
        let mgr = manager();
        let err = mgr
            .commit_changes(vec![SchemaChange::drop_column("v".to_string())], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::IoFatal { .. }));
    }
}
