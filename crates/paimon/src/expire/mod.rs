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

//! Snapshot and partition expiration (§4.G).
//!
//! [`Expire`] physically removes data, manifest and snapshot files that no
//! retained snapshot can reach anymore. It tolerates files that are already
//! gone ([`crate::io::FileIO::delete_file`] itself is tolerant; anything
//! else unexpected downgrades to a warning rather than aborting the whole
//! run, since one missing manifest must not strand every newer snapshot).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use crate::commit::{Committable, FileStoreCommit};
use crate::io::FileIO;
use crate::manifest::ManifestFile;
use crate::options::TableOptions;
use crate::paths::data_file_path;
use crate::predicate::{FieldRef, Predicate};
use crate::spec::{CommitKind, DataField, FieldValue, ManifestEntry, ManifestListFactory};
use crate::snapshot::SnapshotManager;
use crate::Result;

const MANIFEST_DIR: &str = "manifest";

/// Expires old snapshots down to the window `options` describes, deleting
/// whatever storage they alone were keeping alive.
pub struct Expire {
    file_io: FileIO,
    table_root: String,
    partition_fields: Vec<DataField>,
    partition_default_name: String,
    snapshots: SnapshotManager,
    manifest_list: ManifestListFactory,
    manifest_file: ManifestFile,
    num_retained_min: u64,
    num_retained_max: u64,
    time_retained_millis: i64,
}

impl Expire {
    pub fn new(
        file_io: FileIO,
        table_root: impl Into<String>,
        partition_fields: Vec<DataField>,
        options: &TableOptions,
    ) -> Result<Self> {
        let table_root = table_root.into();
        Ok(Self {
            snapshots: SnapshotManager::new(file_io.clone(), table_root.clone()),
            manifest_list: ManifestListFactory::new(file_io.clone()),
            manifest_file: ManifestFile::new(file_io.clone()),
            partition_default_name: options.partition_default_name(),
            num_retained_min: options.snapshot_num_retained_min()?,
            num_retained_max: options.snapshot_num_retained_max()?,
            time_retained_millis: options.snapshot_time_retained().as_millis() as i64,
            file_io,
            table_root,
            partition_fields,
        })
    }

    fn manifest_dir(&self) -> String {
        format!("{}/{}", self.table_root.trim_end_matches('/'), MANIFEST_DIR)
    }

    /// Expires as many of the oldest snapshots as the retention policy
    /// allows at `now_millis`, returning the ids actually removed. A table
    /// with at most one snapshot is always left untouched (§4.G invariant:
    /// at least one snapshot always remains).
    pub async fn expire(&self, now_millis: i64) -> Result<Vec<i64>> {
        let (Some(earliest), Some(latest)) = (
            self.snapshots.earliest_snapshot_id().await?,
            self.snapshots.latest_snapshot_id().await?,
        ) else {
            return Ok(Vec::new());
        };
        if earliest >= latest {
            return Ok(Vec::new());
        }

        let end_exclusive = self.compute_end_exclusive(earliest, latest, now_millis).await?;
        let mut expired = Vec::new();
        for id in earliest..end_exclusive {
            self.expire_one(id).await?;
            expired.push(id);
        }
        if let Some(&new_earliest) = expired.last() {
            self.snapshots.commit_earliest_hint(new_earliest + 1).await?;
        }
        Ok(expired)
    }

    /// The exclusive upper bound of ids to expire: at least
    /// `num_retained_min` snapshots always survive; at most
    /// `num_retained_max` survive regardless of age; between those two
    /// floors, a snapshot expires once it is older than
    /// `snapshot.time-retained`.
    async fn compute_end_exclusive(&self, earliest: i64, latest: i64, now_millis: i64) -> Result<i64> {
        let total = latest - earliest + 1;
        let max_expirable = total.saturating_sub(self.num_retained_min as i64).max(0);
        let must_expire_for_max = total.saturating_sub(self.num_retained_max as i64).max(0);

        let hard_floor = earliest + must_expire_for_max;
        let hard_cap = earliest + max_expirable;

        let mut end_exclusive = hard_floor;
        while end_exclusive < hard_cap {
            let snapshot = self.snapshots.snapshot(end_exclusive).await?;
            let age = now_millis - snapshot.time_millis();
            if age <= self.time_retained_millis {
                break;
            }
            end_exclusive += 1;
        }
        Ok(end_exclusive.min(latest))
    }

    /// Removes everything only snapshot `id` was keeping alive: data files
    /// a DELETE entry in its delta supersedes, the delta's own manifest and
    /// manifest-list files, its changelog manifest list if any, and finally
    /// the snapshot file itself.
    ///
    /// A file an ADD entry introduces is left alone here — it stays live
    /// until the snapshot whose delta DELETEs it is itself expired, at
    /// which point this same branch removes it.
    async fn expire_one(&self, id: i64) -> Result<()> {
        let snapshot = match self.snapshots.snapshot(id).await {
            Ok(s) => s,
            Err(e) => {
                warn!("snapshot {id} could not be read during expiration, skipping: {e}");
                return Ok(());
            }
        };

        let manifest_dir = self.manifest_dir();
        let delta_list_path = format!("{manifest_dir}/{}", snapshot.delta_manifest_list());
        let delta_metas = match self.manifest_list.read(&delta_list_path).await {
            Ok(list) => list.entries().clone(),
            Err(e) => {
                warn!("manifest list {delta_list_path} unreadable during expiration, skipping its files: {e}");
                Vec::new()
            }
        };

        for meta in &delta_metas {
            let manifest_path = format!("{manifest_dir}/{}", meta.file_name());
            match self.manifest_file.read(&manifest_path).await {
                Ok(entries) => {
                    for entry in entries {
                        if entry.kind().is_add() {
                            continue;
                        }
                        let partition = crate::paths::decode_partition(entry.partition())
                            .unwrap_or_default();
                        let path = data_file_path(
                            &self.table_root,
                            &self.partition_fields,
                            &partition,
                            entry.bucket(),
                            entry.file_name(),
                            &self.partition_default_name,
                        );
                        self.file_io.delete_file(&path).await?;
                    }
                }
                Err(e) => warn!("manifest {manifest_path} unreadable during expiration, skipping: {e}"),
            }
            self.file_io.delete_file(&manifest_path).await?;
        }
        self.file_io.delete_file(&delta_list_path).await?;

        if let Some(changelog_list) = snapshot.change_log_manifest_list() {
            let changelog_list_path = format!("{manifest_dir}/{changelog_list}");
            if let Ok(list) = self.manifest_list.read(&changelog_list_path).await {
                for meta in list.entries() {
                    self.file_io
                        .delete_file(&format!("{manifest_dir}/{}", meta.file_name()))
                        .await?;
                }
            }
            self.file_io.delete_file(&changelog_list_path).await?;
        }

        self.file_io.delete_file(&self.snapshots.snapshot_path(id)).await
    }
}

/// The fixed `commit_user` [`PartitionExpire`] commits under. Kept distinct
/// from any real writer's `commit_user` so its `i64::MAX` commit identifier
/// (§4.G') never falls inside another writer's idempotence window — the
/// open question SPEC_FULL.md §9 flags about reusing `MAX_VALUE` is resolved
/// this way, per DESIGN.md.
const PARTITION_EXPIRE_COMMIT_USER: &str = "partition-expire";

/// Periodically deletes whole partitions whose data has aged out, driven by
/// a timestamp extracted from the partition value itself (§4.G').
pub struct PartitionExpire {
    partition_fields: Vec<DataField>,
    snapshots: SnapshotManager,
    manifest_list: ManifestListFactory,
    manifest_file: ManifestFile,
    commit: FileStoreCommit,
    table_root: String,
    schema_id: i64,
    timestamp_pattern: String,
    timestamp_formatter: String,
    expiration_time: Duration,
    check_interval: Duration,
}

impl PartitionExpire {
    pub fn new(
        file_io: FileIO,
        table_root: impl Into<String>,
        partition_fields: Vec<DataField>,
        schema_id: i64,
        options: &TableOptions,
    ) -> Result<Self> {
        let table_root = table_root.into();
        let timestamp_pattern = options.partition_timestamp_pattern().ok_or_else(|| {
            crate::Error::ConfigInvalid {
                message: "partition.timestamp-pattern is required to run partition expiration"
                    .to_string(),
            }
        })?;
        let expiration_time = options.partition_expiration_time().ok_or_else(|| {
            crate::Error::ConfigInvalid {
                message: "partition.expiration-time is required to run partition expiration"
                    .to_string(),
            }
        })?;
        Ok(Self {
            snapshots: SnapshotManager::new(file_io.clone(), table_root.clone()),
            manifest_list: ManifestListFactory::new(file_io.clone()),
            manifest_file: ManifestFile::new(file_io.clone()),
            commit: FileStoreCommit::new(file_io, table_root.clone()),
            table_root,
            partition_fields,
            schema_id,
            timestamp_pattern,
            timestamp_formatter: options.partition_timestamp_formatter(),
            expiration_time,
            check_interval: options.partition_expiration_check_interval(),
        })
    }

    /// The clock the caller should drive [`Self::expire_partitions`] on.
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    fn manifest_dir(&self) -> String {
        format!("{}/{}", self.table_root.trim_end_matches('/'), MANIFEST_DIR)
    }

    /// Discovers every distinct partition value live in the latest snapshot,
    /// and for each whose timestamp extracted from `partition.timestamp-pattern`
    /// is older than `partition.expiration-time` as of `now_millis`, issues a
    /// single `OVERWRITE` commit with `commitIdentifier = MAX` that deletes
    /// it. Returns the partition values actually expired.
    pub async fn expire_partitions(&self, now_millis: i64) -> Result<Vec<Vec<FieldValue>>> {
        let Some(latest_id) = self.snapshots.latest_snapshot_id().await? else {
            return Ok(Vec::new());
        };
        let snapshot = self.snapshots.snapshot(latest_id).await?;
        let entries = self
            .read_live_entries(snapshot.base_manifest_list())
            .await?;

        let mut distinct: HashMap<Vec<u8>, Vec<FieldValue>> = HashMap::new();
        for entry in &entries {
            if distinct.contains_key(entry.partition()) {
                continue;
            }
            let values = crate::paths::decode_partition(entry.partition())?;
            distinct.insert(entry.partition().clone(), values);
        }

        let mut expired = Vec::new();
        for values in distinct.into_values() {
            if self.is_expired(&values, now_millis) {
                expired.push(values);
            }
        }

        for values in &expired {
            let predicate = partition_equals_predicate(&self.partition_fields, values);
            let committable = Committable::new(
                self.schema_id,
                PARTITION_EXPIRE_COMMIT_USER,
                i64::MAX,
                CommitKind::Overwrite,
                now_millis,
            );
            self.commit.overwrite(Some(predicate), committable).await?;
        }
        Ok(expired)
    }

    async fn read_live_entries(&self, manifest_list_path: &str) -> Result<Vec<ManifestEntry>> {
        let manifest_dir = self.manifest_dir();
        let list = self
            .manifest_list
            .read(&format!("{manifest_dir}/{manifest_list_path}"))
            .await?;
        let mut entries = Vec::new();
        for meta in list.entries() {
            let path = format!("{manifest_dir}/{}", meta.file_name());
            entries.extend(self.manifest_file.read(&path).await?);
        }
        Ok(crate::scan::reduce_entries(entries))
    }

    fn is_expired(&self, values: &[FieldValue], now_millis: i64) -> bool {
        match extract_partition_timestamp(
            &self.timestamp_pattern,
            &self.timestamp_formatter,
            &self.partition_fields,
            values,
        ) {
            None => false,
            Some(extracted) => {
                now_millis - extracted.timestamp_millis() > self.expiration_time.as_millis() as i64
            }
        }
    }
}

fn partition_equals_predicate(fields: &[DataField], values: &[FieldValue]) -> Predicate {
    let mut clauses: Vec<Predicate> = fields
        .iter()
        .zip(values.iter())
        .enumerate()
        .map(|(idx, (field, value))| {
            let field_ref = FieldRef::new(idx, field.name(), field.data_type().clone());
            if value.is_null() {
                Predicate::IsNull(field_ref)
            } else {
                Predicate::Equal(field_ref, value.clone())
            }
        })
        .collect();
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Predicate::And(clauses)
    }
}

/// Translates the small subset of Java `SimpleDateFormat` tokens paimon's
/// `partition.timestamp-formatter` recognizes into `chrono`'s `strftime`
/// tokens.
fn java_pattern_to_chrono(pattern: &str) -> String {
    pattern
        .replace("yyyy", "%Y")
        .replace("MM", "%m")
        .replace("dd", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
}

/// Substitutes each `$<partitionField>` token in `timestamp_pattern` with
/// that column's value, then parses the result with `timestamp_formatter`
/// (e.g. pattern `"$dt $hour:00:00"`, formatter `"yyyy-MM-dd HH:mm:ss"`).
fn extract_partition_timestamp(
    timestamp_pattern: &str,
    timestamp_formatter: &str,
    partition_fields: &[DataField],
    values: &[FieldValue],
) -> Option<DateTime<Utc>> {
    let mut text = timestamp_pattern.to_string();
    for (field, value) in partition_fields.iter().zip(values.iter()) {
        let token = format!("${}", field.name());
        if text.contains(&token) {
            text = text.replace(&token, &value.to_string());
        }
    }
    let chrono_fmt = java_pattern_to_chrono(timestamp_formatter);
    if let Ok(naive) = NaiveDateTime::parse_from_str(&text, &chrono_fmt) {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, &chrono_fmt) {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{BinaryRow, BinaryTableStats, DataFileMeta, FileKind};
    use chrono::Utc;
    use std::collections::HashMap;

    fn memory_file_io() -> FileIO {
        FileIO::new(HashMap::from([("scheme".to_string(), "memory".to_string())])).unwrap()
    }

    fn options(pairs: &[(&str, &str)]) -> TableOptions {
        TableOptions::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn data_file(name: &str) -> DataFileMeta {
        DataFileMeta {
            file_name: name.to_string(),
            file_size: 10,
            row_count: 1,
            min_key: BinaryRow::new(0),
            max_key: BinaryRow::new(0),
            key_stats: BinaryTableStats::new(vec![], vec![], vec![]),
            value_stats: BinaryTableStats::new(vec![], vec![], vec![]),
            min_sequence_number: 0,
            max_sequence_number: 0,
            schema_id: 0,
            level: 0,
            extra_files: vec![],
            creation_time: Utc::now(),
            delete_row_count: None,
            embedded_index: None,
            file_source: None,
        }
    }

    #[tokio::test]
    async fn keeps_at_least_one_snapshot() {
        let file_io = memory_file_io();
        let commit = FileStoreCommit::new(file_io.clone(), "t");
        let mut committable = Committable::new(0, "w", 0, crate::spec::CommitKind::Append, 0);
        committable.delta_entries.push(ManifestEntry::new(FileKind::Add, vec![], 0, 1, data_file("a"), 2));
        commit.commit(committable).await.unwrap();

        let expire = Expire::new(
            file_io,
            "t",
            vec![],
            &options(&[("snapshot.num-retained.min", "1"), ("snapshot.num-retained.max", "1")]),
        )
        .unwrap();
        let expired = expire.expire(0).await.unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn expires_down_to_max_retained_regardless_of_age() {
        let file_io = memory_file_io();
        let commit = FileStoreCommit::new(file_io.clone(), "t");
        for i in 0..3 {
            let mut committable = Committable::new(0, "w", i, crate::spec::CommitKind::Append, i);
            committable
                .delta_entries
                .push(ManifestEntry::new(FileKind::Add, vec![], 0, 1, data_file(&format!("f{i}")), 2));
            commit.commit(committable).await.unwrap();
        }

        let expire = Expire::new(
            file_io,
            "t",
            vec![],
            &options(&[("snapshot.num-retained.min", "1"), ("snapshot.num-retained.max", "1")]),
        )
        .unwrap();
        let expired = expire.expire(0).await.unwrap();
        assert_eq!(expired, vec![0, 1]);
    }

    fn partition_field() -> crate::spec::DataField {
        crate::spec::DataField::new(
            0,
            "dt".to_string(),
            crate::spec::DataType::VarChar(crate::spec::VarCharType::new(10).unwrap()),
        )
    }

    fn data_file_entry(file_name: &str, partition_value: &str) -> ManifestEntry {
        let partition =
            BinaryRow::from_fields(&[FieldValue::String(partition_value.to_string())])
                .unwrap()
                .as_bytes()
                .to_vec();
        ManifestEntry::new(FileKind::Add, partition, 0, 1, data_file(file_name), 2)
    }

    #[test]
    fn java_pattern_to_chrono_translates_known_tokens() {
        assert_eq!(java_pattern_to_chrono("yyyy-MM-dd HH:mm:ss"), "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn extract_partition_timestamp_substitutes_and_parses() {
        let fields = vec![partition_field()];
        let values = vec![FieldValue::String("2024-01-15".to_string())];
        let extracted = extract_partition_timestamp("$dt", "yyyy-MM-dd", &fields, &values).unwrap();
        assert_eq!(extracted.format("%Y-%m-%d").to_string(), "2024-01-15");
    }

    #[test]
    fn extract_partition_timestamp_returns_none_on_mismatch() {
        let fields = vec![partition_field()];
        let values = vec![FieldValue::String("not-a-date".to_string())];
        assert!(extract_partition_timestamp("$dt", "yyyy-MM-dd", &fields, &values).is_none());
    }

    #[tokio::test]
    async fn expire_partitions_overwrites_only_the_aged_out_partition() {
        let file_io = memory_file_io();
        let commit = FileStoreCommit::new(file_io.clone(), "t");
        let mut committable = Committable::new(0, "writer-1", 0, crate::spec::CommitKind::Append, 0);
        committable.delta_entries.push(data_file_entry("old.avro", "2020-01-01"));
        committable.delta_entries.push(data_file_entry("new.avro", "2099-01-01"));
        commit.commit(committable).await.unwrap();

        let partition_expire = PartitionExpire::new(
            file_io.clone(),
            "t",
            vec![partition_field()],
            0,
            &options(&[
                ("partition.timestamp-pattern", "$dt"),
                ("partition.timestamp-formatter", "yyyy-MM-dd"),
                ("partition.expiration-time", "1d"),
            ]),
        )
        .unwrap();

        let now_millis = chrono::Utc::now().timestamp_millis();
        let expired = partition_expire.expire_partitions(now_millis).await.unwrap();
        assert_eq!(expired, vec![vec![FieldValue::String("2020-01-01".to_string())]]);

        let scan = crate::scan::Scan::new(file_io, "t", false);
        let splits = scan.plan(None).await.unwrap();
        let file_names: Vec<&str> = splits
            .iter()
            .flat_map(|s| s.files.iter().map(|f| f.file_name.as_str()))
            .collect();
        assert_eq!(file_names, vec!["new.avro"]);
    }
}
