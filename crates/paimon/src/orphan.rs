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

//! Orphan file cleanup (§7).
//!
//! A commit that writes new data files but fails before publishing its
//! snapshot, or a manifest superseded by [`crate::manifest::ManifestFile::merge`],
//! can leave behind files no retained snapshot references anymore.
//! [`OrphanFilesClean::clean`] computes the set of paths still reachable
//! from some snapshot in `[earliest, latest]`, lists every file actually on
//! disk under `manifest/` and the partition/bucket directories, and deletes
//! whatever is unreferenced *and* older than a safety window — the window
//! exists so a commit still in flight (data files already written, snapshot
//! not yet published) is never mistaken for garbage.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::io::FileIO;
use crate::manifest::ManifestFile;
use crate::snapshot::SnapshotManager;
use crate::spec::{DataField, ManifestListFactory};
use crate::Result;

const MANIFEST_DIR: &str = "manifest";
const SNAPSHOT_DIR: &str = "snapshot";
const SCHEMA_DIR: &str = "schema";

/// Lists and removes data, changelog and manifest files no retained
/// snapshot can reach.
pub struct OrphanFilesClean {
    file_io: FileIO,
    table_root: String,
    partition_fields: Vec<DataField>,
    partition_default_name: String,
    snapshots: SnapshotManager,
    manifest_list: ManifestListFactory,
    manifest_file: ManifestFile,
}

impl OrphanFilesClean {
    pub fn new(
        file_io: FileIO,
        table_root: impl Into<String>,
        partition_fields: Vec<DataField>,
        partition_default_name: impl Into<String>,
    ) -> Self {
        let table_root = table_root.into();
        Self {
            snapshots: SnapshotManager::new(file_io.clone(), table_root.clone()),
            manifest_list: ManifestListFactory::new(file_io.clone()),
            manifest_file: ManifestFile::new(file_io.clone()),
            file_io,
            table_root,
            partition_fields,
            partition_default_name: partition_default_name.into(),
        }
    }

    fn manifest_dir(&self) -> String {
        format!("{}/{}", self.table_root.trim_end_matches('/'), MANIFEST_DIR)
    }

    /// Deletes every unreferenced file older than `older_than_millis` as of
    /// `now_millis`, returning the paths removed. Tolerates snapshots or
    /// manifests that vanish mid-scan (a concurrent [`crate::expire::Expire`]
    /// run is always possible) the same way `Expire` itself does.
    pub async fn clean(&self, now_millis: i64, older_than_millis: i64) -> Result<Vec<String>> {
        let referenced = self.referenced_paths().await?;
        let cutoff = now_millis - older_than_millis;

        let mut candidates = self.list_files_recursive(&self.manifest_dir()).await?;
        candidates.extend(self.list_data_candidates().await?);

        let mut removed = Vec::new();
        for candidate in candidates {
            if referenced.contains(&candidate.path) {
                continue;
            }
            let age_ok = candidate
                .last_modified
                .map(|t| t.timestamp_millis() <= cutoff)
                .unwrap_or(true);
            if !age_ok {
                continue;
            }
            match self.file_io.delete_file(&candidate.path).await {
                Ok(()) => {
                    info!(path = %candidate.path, "deleted orphan file");
                    removed.push(candidate.path);
                }
                Err(e) => warn!(path = %candidate.path, "failed to delete orphan file, skipping: {e}"),
            }
        }
        Ok(removed)
    }

    /// Every path reachable from a snapshot still in `[earliest, latest]`:
    /// its manifest-list files, the manifest files they point at, and the
    /// data/changelog files those manifests ADD.
    async fn referenced_paths(&self) -> Result<HashSet<String>> {
        let mut referenced = HashSet::new();
        let (Some(earliest), Some(latest)) = (
            self.snapshots.earliest_snapshot_id().await?,
            self.snapshots.latest_snapshot_id().await?,
        ) else {
            return Ok(referenced);
        };

        let manifest_dir = self.manifest_dir();
        for id in earliest..=latest {
            if !self.snapshots.snapshot_exists(id).await? {
                continue;
            }
            let snapshot = match self.snapshots.snapshot(id).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("snapshot {id} could not be read while collecting references, skipping: {e}");
                    continue;
                }
            };
            let mut list_names = vec![
                snapshot.base_manifest_list().to_string(),
                snapshot.delta_manifest_list().to_string(),
            ];
            if let Some(changelog) = snapshot.change_log_manifest_list() {
                list_names.push(changelog.to_string());
            }

            for list_name in list_names {
                let list_path = format!("{manifest_dir}/{list_name}");
                referenced.insert(list_path.clone());
                let list = match self.manifest_list.read(&list_path).await {
                    Ok(list) => list,
                    Err(e) => {
                        warn!("manifest list {list_path} unreadable while collecting references, skipping: {e}");
                        continue;
                    }
                };
                for meta in list.entries() {
                    let manifest_path = format!("{manifest_dir}/{}", meta.file_name());
                    referenced.insert(manifest_path.clone());
                    let entries = match self.manifest_file.read(&manifest_path).await {
                        Ok(entries) => entries,
                        Err(e) => {
                            warn!("manifest {manifest_path} unreadable while collecting references, skipping: {e}");
                            continue;
                        }
                    };
                    for entry in entries {
                        if !entry.kind().is_add() {
                            continue;
                        }
                        let partition =
                            crate::paths::decode_partition(entry.partition()).unwrap_or_default();
                        let path = crate::paths::data_file_path(
                            &self.table_root,
                            &self.partition_fields,
                            &partition,
                            entry.bucket(),
                            entry.file_name(),
                            &self.partition_default_name,
                        );
                        referenced.insert(path);
                    }
                }
            }
        }
        Ok(referenced)
    }

    /// Recursively lists every plain file under `dir`, skipping the
    /// `snapshot/` and `schema/` subtrees, which hold metadata this
    /// procedure never touches.
    async fn list_data_candidates(&self) -> Result<Vec<crate::io::FileStatus>> {
        let root = self.table_root.trim_end_matches('/');
        let snapshot_dir = format!("{root}/{SNAPSHOT_DIR}");
        let schema_dir = format!("{root}/{SCHEMA_DIR}");
        let manifest_dir = self.manifest_dir();

        let mut out = Vec::new();
        for status in self.file_io.list_status(&format!("{root}/")).await? {
            if status.path == snapshot_dir || status.path == schema_dir || status.path == manifest_dir {
                continue;
            }
            if status.is_dir {
                out.extend(self.list_files_recursive(&status.path).await?);
            } else {
                out.push(status);
            }
        }
        Ok(out)
    }

    async fn list_files_recursive(&self, dir: &str) -> Result<Vec<crate::io::FileStatus>> {
        let mut out = Vec::new();
        let mut stack = vec![dir.to_string()];
        while let Some(current) = stack.pop() {
            if !self.file_io.exists(&current).await? {
                continue;
            }
            for status in self.file_io.list_status(&format!("{}/", current.trim_end_matches('/'))).await? {
                if status.is_dir {
                    stack.push(status.path.clone());
                } else {
                    out.push(status);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Committable, FileStoreCommit};
    use crate::spec::{BinaryRow, BinaryTableStats, CommitKind, DataFileMeta, FileKind, ManifestEntry};
    use chrono::Utc;
    use std::collections::HashMap;

    fn memory_file_io() -> FileIO {
        FileIO::new(HashMap::from([("scheme".to_string(), "memory".to_string())])).unwrap()
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
    async fn clean_removes_a_file_written_by_a_commit_that_never_published() {
        let file_io = memory_file_io();
        let commit = FileStoreCommit::new(file_io.clone(), "t");
        let mut committable = Committable::new(0, "w", 0, CommitKind::Append, 0);
        committable
            .delta_entries
            .push(ManifestEntry::new(FileKind::Add, vec![], 0, 1, data_file("live.avro"), 2));
        commit.commit(committable).await.unwrap();

        // Simulate a data file orphaned by a commit that crashed before
        // publishing its snapshot: nothing in any manifest references it.
        file_io.mkdirs("t/bucket-0").await.unwrap();
        file_io
            .new_output("t/bucket-0/orphan.avro")
            .unwrap()
            .write(bytes::Bytes::from_static(b"orphan"))
            .await
            .unwrap();

        let clean = OrphanFilesClean::new(file_io.clone(), "t", vec![], "__DEFAULT_PARTITION__");
        let now = Utc::now().timestamp_millis();
        let removed = clean.clean(now, 0).await.unwrap();

        assert_eq!(removed, vec!["t/bucket-0/orphan.avro".to_string()]);
        assert!(!file_io.exists("t/bucket-0/orphan.avro").await.unwrap());
    }

    #[tokio::test]
    async fn clean_keeps_files_younger_than_the_safety_window() {
        let file_io = memory_file_io();
        file_io.mkdirs("t/bucket-0").await.unwrap();
        file_io
            .new_output("t/bucket-0/fresh.avro")
            .unwrap()
            .write(bytes::Bytes::from_static(b"fresh"))
            .await
            .unwrap();

        let clean = OrphanFilesClean::new(file_io.clone(), "t", vec![], "__DEFAULT_PARTITION__");
        let now = Utc::now().timestamp_millis();
        let removed = clean.clean(now, 3600_000).await.unwrap();

        assert!(removed.is_empty());
        assert!(file_io.exists("t/bucket-0/fresh.avro").await.unwrap());
    }
}
