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

//! Optimistic-concurrency commit protocol (§4.F).
//!
//! [`FileStoreCommit::commit`] publishes exactly one new snapshot per call.
//! A snapshot's visible file set is `base_manifest_list ∪ delta_manifest_list`;
//! each commit rolls the previous snapshot's base and delta manifest-list
//! entries together into the new base, and writes only its own new manifest
//! file(s) as the new delta — the same pointer-chasing relationship
//! [`crate::manifest::ManifestFile::merge`] later compacts back down.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ConflictFatalSnafu, SchemaMismatchSnafu};
use crate::io::FileIO;
use crate::manifest::ManifestFile;
use crate::predicate::Predicate;
use crate::spec::{
    CommitKind, FileKind, ManifestEntry, ManifestFileMeta, ManifestListFactory, Row, Snapshot,
};
use crate::snapshot::SnapshotManager;
use crate::Result;

const MANIFEST_DIR: &str = "manifest";
const DEFAULT_MAX_RETRIES: u32 = 10;

/// A hook serializing concurrent committers when the backing store cannot
/// guarantee atomic rename ([`crate::io::FileIO::is_object_store`]). The
/// `fs`/`memory` backends never need one; callers targeting an object
/// store inject their own lease/lock implementation.
#[async_trait]
pub trait CommitLock: Send + Sync {
    async fn acquire(&self) -> Result<()>;
    async fn release(&self) -> Result<()>;
}

/// The set of manifest-entry changes a writer wants reflected in one new
/// snapshot.
#[derive(Debug, Clone)]
pub struct Committable {
    pub schema_id: i64,
    pub commit_user: String,
    pub commit_identifier: i64,
    pub commit_kind: CommitKind,
    /// ADD entries for newly written data files plus DELETE entries for
    /// files this commit supersedes (compaction outputs/inputs, or the
    /// matched partitions of an `OVERWRITE`).
    pub delta_entries: Vec<ManifestEntry>,
    /// Changelog file entries produced by the configured changelog
    /// producer (§4.I), empty under `ChangelogProducer::None`.
    pub changelog_entries: Vec<ManifestEntry>,
    pub time_millis: i64,
}

impl Committable {
    pub fn new(
        schema_id: i64,
        commit_user: impl Into<String>,
        commit_identifier: i64,
        commit_kind: CommitKind,
        time_millis: i64,
    ) -> Self {
        Self {
            schema_id,
            commit_user: commit_user.into(),
            commit_identifier,
            commit_kind,
            delta_entries: Vec::new(),
            changelog_entries: Vec::new(),
            time_millis,
        }
    }
}

/// Drives the optimistic-concurrency publish protocol for one table.
pub struct FileStoreCommit {
    file_io: FileIO,
    table_root: String,
    snapshots: SnapshotManager,
    manifest_file: ManifestFile,
    manifest_list: ManifestListFactory,
    max_retries: u32,
    lock: Option<Arc<dyn CommitLock>>,
}

impl FileStoreCommit {
    pub fn new(file_io: FileIO, table_root: impl Into<String>) -> Self {
        let table_root = table_root.into();
        Self {
            snapshots: SnapshotManager::new(file_io.clone(), table_root.clone()),
            manifest_file: ManifestFile::new(file_io.clone()),
            manifest_list: ManifestListFactory::new(file_io.clone()),
            file_io,
            table_root,
            max_retries: DEFAULT_MAX_RETRIES,
            lock: None,
        }
    }

    pub fn with_lock(mut self, lock: Arc<dyn CommitLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn manifest_dir(&self) -> String {
        format!("{}/{}", self.table_root.trim_end_matches('/'), MANIFEST_DIR)
    }

    /// Callers after failover pass the identifiers of commits they are
    /// unsure completed; this filters out those already visible in some
    /// snapshot's `commit_identifier` under the same `commit_user`, so a
    /// retried write never gets applied twice (§4.F idempotence).
    pub async fn filter_committed(
        &self,
        commit_user: &str,
        identifiers: Vec<i64>,
    ) -> Result<Vec<i64>> {
        let snapshots = self.snapshots.traverse_from_latest_safely().await?;
        let already_committed: HashSet<i64> = snapshots
            .iter()
            .filter(|s| s.commit_user() == commit_user)
            .map(|s| s.commit_identifier())
            .collect();
        Ok(identifiers
            .into_iter()
            .filter(|id| !already_committed.contains(id))
            .collect())
    }

    async fn manifest_list_entries(&self, path: &Option<String>) -> Result<Vec<ManifestFileMeta>> {
        match path {
            None => Ok(Vec::new()),
            Some(path) => Ok(self
                .manifest_list
                .read(&format!("{}/{path}", self.manifest_dir()))
                .await?
                .entries()
                .clone()),
        }
    }

    async fn run_locked<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let needs_lock = self.lock.is_some() && self.file_io.is_object_store();
        if needs_lock {
            let lock = self.lock.as_ref().expect("checked above");
            lock.acquire().await?;
            let result = f().await;
            lock.release().await?;
            result
        } else {
            f().await
        }
    }

    /// Publishes `committable` as exactly one new snapshot, retrying on
    /// retriable conflicts up to `max_retries` times.
    pub async fn commit(&self, committable: Committable) -> Result<Snapshot> {
        let mut target_id = self
            .snapshots
            .latest_snapshot_id()
            .await?
            .map(|id| id + 1)
            .unwrap_or(0);

        for attempt in 0..self.max_retries {
            let base_id = target_id.checked_sub(1);
            let base_snapshot = match base_id {
                Some(id) => Some(self.snapshots.snapshot(id).await?),
                None => None,
            };

            if let Some(base) = &base_snapshot {
                if base.schema_id() != committable.schema_id {
                    return SchemaMismatchSnafu {
                        message: format!(
                            "table schema advanced to {} while committing against schema {}",
                            base.schema_id(),
                            committable.schema_id
                        ),
                    }
                    .fail();
                }
            }

            let mut rolled_up = match &base_snapshot {
                Some(base) => {
                    let mut entries = self
                        .manifest_list_entries(&Some(base.base_manifest_list().to_string()))
                        .await?;
                    entries.extend(
                        self.manifest_list_entries(&Some(base.delta_manifest_list().to_string()))
                            .await?,
                    );
                    entries
                }
                None => Vec::new(),
            };

            let manifest_dir = self.manifest_dir();
            self.file_io.mkdirs(&manifest_dir).await?;
            let target_file_size = 8 * 1024 * 1024;
            let delta_metas = self
                .manifest_file
                .write(
                    &manifest_dir,
                    committable.delta_entries.clone(),
                    committable.schema_id,
                    target_file_size,
                )
                .await?;
            let delta_manifest_list = self
                .manifest_list
                .write(&manifest_dir, delta_metas.clone())
                .await?;

            rolled_up.extend(delta_metas);
            let base_manifest_list = self.manifest_list.write(&manifest_dir, rolled_up).await?;

            let change_log_manifest_list = if committable.changelog_entries.is_empty() {
                None
            } else {
                let changelog_metas = self
                    .manifest_file
                    .write(
                        &manifest_dir,
                        committable.changelog_entries.clone(),
                        committable.schema_id,
                        target_file_size,
                    )
                    .await?;
                Some(
                    self.manifest_list
                        .write(&manifest_dir, changelog_metas)
                        .await?,
                )
            };

            let snapshot = Snapshot::builder()
                .version(3)
                .id(target_id)
                .schema_id(committable.schema_id)
                .base_manifest_list(base_manifest_list)
                .delta_manifest_list(delta_manifest_list)
                .change_log_manifest_list(change_log_manifest_list)
                .commit_user(committable.commit_user.clone())
                .commit_identifier(committable.commit_identifier)
                .commit_kind(committable.commit_kind.clone())
                .time_millis(committable.time_millis)
                .log_offsets(Default::default())
                .build();

            let published = self
                .run_locked(|| async { self.snapshots.commit(&snapshot).await })
                .await?;
            if published {
                debug!(snapshot_id = target_id, attempt, "committed snapshot");
                return Ok(snapshot);
            }

            warn!(
                snapshot_id = target_id,
                attempt, "snapshot id already taken, checking for conflicts"
            );
            let new_latest = self
                .snapshots
                .latest_snapshot_id()
                .await?
                .expect("a racing commit just published one");
            self.check_no_fatal_conflict(target_id, new_latest, &committable)
                .await?;
            target_id = new_latest + 1;
        }

        ConflictFatalSnafu {
            message: format!(
                "exceeded {} commit attempts for commit_user {}",
                self.max_retries, committable.commit_user
            ),
        }
        .fail()
    }

    /// Reads the full live (ADD/DELETE-reduced) file set of `snapshot_id`,
    /// combining its base and delta manifest lists the same way
    /// [`crate::scan::Scan`] does when it opens a snapshot for reading.
    async fn live_entries(&self, snapshot_id: i64) -> Result<Vec<ManifestEntry>> {
        let snapshot = self.snapshots.snapshot(snapshot_id).await?;
        let mut metas = self
            .manifest_list_entries(&Some(snapshot.base_manifest_list().to_string()))
            .await?;
        metas.extend(
            self.manifest_list_entries(&Some(snapshot.delta_manifest_list().to_string()))
                .await?,
        );
        let manifest_dir = self.manifest_dir();
        let mut entries = Vec::new();
        for meta in metas {
            let path = format!("{manifest_dir}/{}", meta.file_name());
            entries.extend(self.manifest_file.read(&path).await?);
        }
        Ok(crate::scan::reduce_entries(entries))
    }

    /// Publishes a single `OVERWRITE` snapshot that deletes every currently
    /// live file whose partition matches `partition_predicate` (or every
    /// live file at all, when `None` — a full-table overwrite) before
    /// adding `committable`'s own files (§4.F).
    pub async fn overwrite(
        &self,
        partition_predicate: Option<Predicate>,
        mut committable: Committable,
    ) -> Result<Snapshot> {
        committable.commit_kind = CommitKind::Overwrite;
        if let Some(latest_id) = self.snapshots.latest_snapshot_id().await? {
            let mut deletes = Vec::new();
            for entry in self.live_entries(latest_id).await? {
                let matches = match &partition_predicate {
                    None => true,
                    Some(predicate) => {
                        let values = crate::paths::decode_partition(entry.partition())?;
                        predicate.test(&Row::new(values))
                    }
                };
                if matches {
                    deletes.push(ManifestEntry::new(
                        FileKind::Delete,
                        entry.partition().clone(),
                        entry.bucket(),
                        entry.total_buckets(),
                        entry.file().clone(),
                        2,
                    ));
                }
            }
            deletes.extend(committable.delta_entries);
            committable.delta_entries = deletes;
        }
        self.commit(committable).await
    }

    /// Checks every snapshot in `(from_id - 1, through_id]` for a logical
    /// conflict with `committable` (§4.F): two committers deleting the same
    /// file is never safe to paper over, and neither is two committers
    /// adding to the same `(partition, bucket)` when either side is an
    /// `OVERWRITE` — an overwrite's DELETE set is computed once against the
    /// pre-race snapshot, so anything concurrently added to that bucket
    /// would otherwise survive alongside the overwrite's own output and
    /// silently violate the "replace the matching partition" contract.
    /// Both cases abort the whole commit.
    async fn check_no_fatal_conflict(
        &self,
        from_id: i64,
        through_id: i64,
        committable: &Committable,
    ) -> Result<()> {
        let my_deletes: HashSet<&str> = committable
            .delta_entries
            .iter()
            .filter(|e| !e.kind().is_add())
            .map(|e| e.file_name())
            .collect();
        let my_adds: HashSet<(Vec<u8>, i32)> = committable
            .delta_entries
            .iter()
            .filter(|e| e.kind().is_add())
            .map(|e| (e.partition().clone(), e.bucket()))
            .collect();
        let my_is_overwrite = committable.commit_kind == CommitKind::Overwrite;

        if my_deletes.is_empty() && my_adds.is_empty() {
            return Ok(());
        }

        for id in from_id..=through_id {
            if !self.snapshots.snapshot_exists(id).await? {
                continue;
            }
            let snapshot = self.snapshots.snapshot(id).await?;
            let intervening_is_overwrite = *snapshot.commit_kind() == CommitKind::Overwrite;
            let entries = self
                .manifest_list_entries(&Some(snapshot.delta_manifest_list().to_string()))
                .await?;
            for meta in entries {
                let path = format!("{}/{}", self.manifest_dir(), meta.file_name());
                for entry in self.manifest_file.read(&path).await? {
                    if !entry.kind().is_add() && my_deletes.contains(entry.file_name()) {
                        return ConflictFatalSnafu {
                            message: format!(
                                "file {} was deleted by both commit_user {} and snapshot {id}",
                                entry.file_name(),
                                committable.commit_user
                            ),
                        }
                        .fail();
                    }
                    if entry.kind().is_add()
                        && (my_is_overwrite || intervening_is_overwrite)
                        && my_adds.contains(&(entry.partition().clone(), entry.bucket()))
                    {
                        return ConflictFatalSnafu {
                            message: format!(
                                "commit_user {} and snapshot {id} both added to bucket {} of the \
                                 same partition and at least one of them is an overwrite",
                                committable.commit_user,
                                entry.bucket()
                            ),
                        }
                        .fail();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{
        BinaryRow, BinaryTableStats, DataFileMeta, FileKind, FileSource,
    };
    use chrono::Utc;
    use std::collections::HashMap;

    fn memory_file_io() -> FileIO {
        FileIO::new(HashMap::from([("scheme".to_string(), "memory".to_string())])).unwrap()
    }

    fn add_entry(file_name: &str) -> ManifestEntry {
        let value_bytes = serde_json::to_vec(&Vec::<crate::spec::FieldValue>::new()).unwrap();
        let file = DataFileMeta {
            file_name: file_name.to_string(),
            file_size: 100,
            row_count: 5,
            min_key: BinaryRow::new(0),
            max_key: BinaryRow::new(0),
            key_stats: BinaryTableStats::new(value_bytes.clone(), value_bytes.clone(), vec![]),
            value_stats: BinaryTableStats::new(value_bytes.clone(), value_bytes, vec![]),
            min_sequence_number: 0,
            max_sequence_number: 4,
            schema_id: 0,
            level: 0,
            extra_files: vec![],
            creation_time: Utc::now(),
            delete_row_count: Some(0),
            embedded_index: None,
            file_source: Some(FileSource::Append),
        };
        ManifestEntry::new(FileKind::Add, vec![], 0, 1, file, 2)
    }

    #[tokio::test]
    async fn first_commit_creates_snapshot_zero() {
        let commit = FileStoreCommit::new(memory_file_io(), "warehouse/db.db/t");
        let mut committable = Committable::new(0, "writer-1", 1, CommitKind::Append, 1000);
        committable.delta_entries.push(add_entry("data-1.avro"));

        let snapshot = commit.commit(committable).await.unwrap();
        assert_eq!(snapshot.id(), 0);
        assert_eq!(snapshot.commit_kind(), &CommitKind::Append);
    }

    #[tokio::test]
    async fn sequential_commits_chain_base_manifest_lists() {
        let commit = FileStoreCommit::new(memory_file_io(), "warehouse/db.db/t");

        let mut first = Committable::new(0, "writer-1", 1, CommitKind::Append, 1000);
        first.delta_entries.push(add_entry("data-1.avro"));
        let snapshot0 = commit.commit(first).await.unwrap();

        let mut second = Committable::new(0, "writer-1", 2, CommitKind::Append, 2000);
        second.delta_entries.push(add_entry("data-2.avro"));
        let snapshot1 = commit.commit(second).await.unwrap();

        assert_eq!(snapshot1.id(), 1);
        assert_ne!(
            snapshot0.base_manifest_list(),
            snapshot1.base_manifest_list()
        );
    }

    #[tokio::test]
    async fn filter_committed_drops_already_applied_identifiers() {
        let commit = FileStoreCommit::new(memory_file_io(), "warehouse/db.db/t");
        let mut first = Committable::new(0, "writer-1", 42, CommitKind::Append, 1000);
        first.delta_entries.push(add_entry("data-1.avro"));
        commit.commit(first).await.unwrap();

        let remaining = commit
            .filter_committed("writer-1", vec![42, 43])
            .await
            .unwrap();
        assert_eq!(remaining, vec![43]);
    }

    fn add_entry_with_partition(file_name: &str, partition: &str) -> ManifestEntry {
        let mut entry = add_entry(file_name);
        let partition_bytes =
            crate::spec::BinaryRow::from_fields(&[crate::spec::FieldValue::String(
                partition.to_string(),
            )])
            .unwrap()
            .as_bytes()
            .to_vec();
        entry = ManifestEntry::new(
            *entry.kind(),
            partition_bytes,
            entry.bucket(),
            entry.total_buckets(),
            entry.file().clone(),
            2,
        );
        entry
    }

    fn partition_field() -> crate::predicate::FieldRef {
        crate::predicate::FieldRef::new(0, "p", crate::spec::DataType::VarChar(
            crate::spec::VarCharType::new(10).unwrap(),
        ))
    }

    #[tokio::test]
    async fn overwrite_replaces_only_the_matching_partition() {
        let commit = FileStoreCommit::new(memory_file_io(), "warehouse/db.db/t");

        let mut first = Committable::new(0, "writer-1", 1, CommitKind::Append, 1000);
        first.delta_entries.push(add_entry_with_partition("p1-a.avro", "p1"));
        first.delta_entries.push(add_entry_with_partition("p2-a.avro", "p2"));
        commit.commit(first).await.unwrap();

        let mut overwrite_committable = Committable::new(0, "writer-1", 2, CommitKind::Append, 2000);
        overwrite_committable
            .delta_entries
            .push(add_entry_with_partition("p2-b.avro", "p2"));
        let predicate = Predicate::Equal(partition_field(), crate::spec::FieldValue::String("p2".to_string()));
        let snapshot = commit
            .overwrite(Some(predicate), overwrite_committable)
            .await
            .unwrap();
        assert_eq!(snapshot.commit_kind(), &CommitKind::Overwrite);

        let live = commit.live_entries(snapshot.id()).await.unwrap();
        let file_names: HashSet<&str> = live.iter().map(|e| e.file_name()).collect();
        assert_eq!(file_names, HashSet::from(["p1-a.avro", "p2-b.avro"]));
    }

    #[tokio::test]
    async fn overwrite_with_no_predicate_replaces_the_whole_table() {
        let commit = FileStoreCommit::new(memory_file_io(), "warehouse/db.db/t");

        let mut first = Committable::new(0, "writer-1", 1, CommitKind::Append, 1000);
        first.delta_entries.push(add_entry_with_partition("p1-a.avro", "p1"));
        first.delta_entries.push(add_entry_with_partition("p2-a.avro", "p2"));
        commit.commit(first).await.unwrap();

        let mut overwrite_committable = Committable::new(0, "writer-1", 2, CommitKind::Append, 2000);
        overwrite_committable
            .delta_entries
            .push(add_entry_with_partition("p3-a.avro", "p3"));
        let snapshot = commit.overwrite(None, overwrite_committable).await.unwrap();

        let live = commit.live_entries(snapshot.id()).await.unwrap();
        let file_names: HashSet<&str> = live.iter().map(|e| e.file_name()).collect();
        assert_eq!(file_names, HashSet::from(["p3-a.avro"]));
    }

    #[tokio::test]
    async fn fatal_conflict_on_overwrite_colliding_with_concurrent_add_to_same_bucket() {
        let commit = FileStoreCommit::new(memory_file_io(), "warehouse/db.db/t");

        let mut first = Committable::new(0, "writer-1", 1, CommitKind::Append, 1000);
        first.delta_entries.push(add_entry_with_partition("p1-a.avro", "p1"));
        commit.commit(first).await.unwrap();

        // An intervening OVERWRITE replaces p1-a.avro with p1-b.avro in the
        // same (partition p1, bucket 0).
        let mut overwrite_committable = Committable::new(0, "writer-2", 2, CommitKind::Append, 2000);
        overwrite_committable
            .delta_entries
            .push(add_entry_with_partition("p1-b.avro", "p1"));
        let predicate = Predicate::Equal(
            partition_field(),
            crate::spec::FieldValue::String("p1".to_string()),
        );
        commit
            .overwrite(Some(predicate), overwrite_committable)
            .await
            .unwrap();

        // A racing plain append also targeting (partition p1, bucket 0).
        let mut racing = Committable::new(0, "writer-3", 1, CommitKind::Append, 3000);
        racing.delta_entries.push(add_entry_with_partition("p1-c.avro", "p1"));

        let result = commit.check_no_fatal_conflict(1, 1, &racing).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn concurrent_plain_appends_to_same_bucket_are_not_a_fatal_conflict() {
        let commit = FileStoreCommit::new(memory_file_io(), "warehouse/db.db/t");

        let mut first = Committable::new(0, "writer-1", 1, CommitKind::Append, 1000);
        first.delta_entries.push(add_entry_with_partition("p1-a.avro", "p1"));
        commit.commit(first).await.unwrap();

        let mut second = Committable::new(0, "writer-2", 2, CommitKind::Append, 2000);
        second.delta_entries.push(add_entry_with_partition("p1-b.avro", "p1"));
        commit.commit(second).await.unwrap();

        let mut racing = Committable::new(0, "writer-3", 1, CommitKind::Append, 3000);
        racing.delta_entries.push(add_entry_with_partition("p1-c.avro", "p1"));

        let result = commit.check_no_fatal_conflict(1, 1, &racing).await;
        assert!(result.is_ok());
    }
}
