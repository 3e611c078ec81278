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

//! Scan planning and split generation (§4.H).
//!
//! [`Scan`] resolves a snapshot, reads its manifest list and manifests with
//! partition-stats pushdown, reduces ADD/DELETE entries down to the files
//! actually live, and groups survivors by `(partition, bucket)`.
//! [`SplitGenerator`] then decides how those per-bucket file groups turn
//! into [`Split`]s a reader can open independently.

use std::collections::HashMap;

use crate::manifest::ManifestFile;
use crate::predicate::Predicate;
use crate::spec::{DataFileMeta, FieldStats, ManifestEntry, ManifestEntryIdentifier as Identifier};
use crate::spec::ManifestListFactory;
use crate::io::FileIO;
use crate::snapshot::SnapshotManager;
use crate::Result;

/// One independently-openable unit of work: all the files a reader needs
/// for one `(partition, bucket)` group (merge-tree tables) or one
/// size-bounded chunk of it (append-only tables).
#[derive(Debug, Clone)]
pub struct Split {
    pub partition: Vec<u8>,
    pub bucket: i32,
    pub files: Vec<DataFileMeta>,
}

/// Plans a snapshot scan: resolves the snapshot, applies partition/key/value
/// filter pushdown while reading manifests, and groups the surviving files.
pub struct Scan {
    file_io: FileIO,
    table_root: String,
    snapshots: SnapshotManager,
    manifest_list: ManifestListFactory,
    manifest_file: ManifestFile,
    partition_filter: Option<Predicate>,
    key_filter: Option<Predicate>,
    value_filter: Option<Predicate>,
    /// PK tables must not push the value filter into file skipping: an
    /// unchanged key's latest value may live in a file the filter would
    /// otherwise exclude (§4.H step 3).
    has_primary_key: bool,
}

impl Scan {
    pub fn new(file_io: FileIO, table_root: impl Into<String>, has_primary_key: bool) -> Self {
        let table_root = table_root.into();
        Self {
            snapshots: SnapshotManager::new(file_io.clone(), table_root.clone()),
            manifest_list: ManifestListFactory::new(file_io.clone()),
            manifest_file: ManifestFile::new(file_io.clone()),
            file_io,
            table_root,
            partition_filter: None,
            key_filter: None,
            value_filter: None,
            has_primary_key,
        }
    }

    pub fn with_partition_filter(mut self, predicate: Predicate) -> Self {
        self.partition_filter = Some(predicate);
        self
    }

    pub fn with_key_filter(mut self, predicate: Predicate) -> Self {
        self.key_filter = Some(predicate);
        self
    }

    pub fn with_value_filter(mut self, predicate: Predicate) -> Self {
        self.value_filter = Some(predicate);
        self
    }

    fn manifest_dir(&self) -> String {
        format!("{}/manifest", self.table_root.trim_end_matches('/'))
    }

    /// Resolves a snapshot id (explicit, or "latest" when `None`) and plans
    /// its full, ADD/DELETE-reduced file set grouped by bucket (§4.H steps
    /// 1-4).
    pub async fn plan(&self, snapshot_id: Option<i64>) -> Result<Vec<Split>> {
        let id = match snapshot_id {
            Some(id) => id,
            None => {
                self.snapshots
                    .latest_snapshot_id()
                    .await?
                    .ok_or_else(|| crate::Error::DataInvalid {
                        message: "cannot scan a table with no snapshots".to_string(),
                    })?
            }
        };
        let snapshot = self.snapshots.snapshot(id).await?;
        self.plan_manifest_list(snapshot.base_manifest_list()).await
    }

    /// Plans only the files a single snapshot's delta introduced, for the
    /// streaming enumerator's incremental reads (§4.K).
    pub async fn plan_incremental(&self, snapshot_id: i64) -> Result<Vec<Split>> {
        let snapshot = self.snapshots.snapshot(snapshot_id).await?;
        self.plan_manifest_list(snapshot.delta_manifest_list()).await
    }

    async fn plan_manifest_list(&self, manifest_list_path: &str) -> Result<Vec<Split>> {
        let entries = self.read_entries(manifest_list_path).await?;
        let reduced = reduce_entries(entries);
        let filtered: Vec<ManifestEntry> = reduced.into_iter().filter(|e| self.entry_passes(e)).collect();
        Ok(group_by_bucket(filtered))
    }

    async fn read_entries(&self, manifest_list_path: &str) -> Result<Vec<ManifestEntry>> {
        let list = self.manifest_list.read(manifest_list_path).await?;
        let manifest_dir = self.manifest_dir();
        let mut out = Vec::new();
        for meta in list.entries() {
            if let Some(predicate) = &self.partition_filter {
                let stats = FieldStats::from_binary(meta.partition_stats())?;
                if !predicate.test_stats(&stats) {
                    continue;
                }
            }
            let path = format!("{manifest_dir}/{}", meta.file_name());
            out.extend(self.manifest_file.read(&path).await?);
        }
        Ok(out)
    }

    fn entry_passes(&self, entry: &ManifestEntry) -> bool {
        if let Some(predicate) = &self.key_filter {
            let stats = match FieldStats::from_binary(&entry.file().key_stats) {
                Ok(s) => s,
                Err(_) => return true,
            };
            if !predicate.test_stats(&stats) {
                return false;
            }
        }
        if !self.has_primary_key {
            if let Some(predicate) = &self.value_filter {
                let stats = match FieldStats::from_binary(&entry.file().value_stats) {
                    Ok(s) => s,
                    Err(_) => return true,
                };
                if !predicate.test_stats(&stats) {
                    return false;
                }
            }
        }
        true
    }
}

/// Cancels ADD/DELETE pairs referring to the same file (by [`Identifier`])
/// and returns the surviving ADD entries, the reduction every scan applies
/// before grouping (§4.H step 2).
pub(crate) fn reduce_entries(entries: Vec<ManifestEntry>) -> Vec<ManifestEntry> {
    let mut by_id: HashMap<Identifier, Vec<ManifestEntry>> = HashMap::new();
    for entry in entries {
        by_id.entry(entry.identifier()).or_default().push(entry);
    }
    let mut out = Vec::new();
    for group in by_id.into_values() {
        let adds = group.iter().filter(|e| e.kind().is_add()).count();
        if adds > group.len() - adds {
            if let Some(add) = group.into_iter().find(|e| e.kind().is_add()) {
                out.push(add);
            }
        }
    }
    out
}

fn group_by_bucket(entries: Vec<ManifestEntry>) -> Vec<Split> {
    let mut groups: HashMap<(Vec<u8>, i32), Vec<DataFileMeta>> = HashMap::new();
    for entry in entries {
        groups.entry((entry.partition().clone(), entry.bucket())).or_default().push(entry.file().clone());
    }
    groups
        .into_iter()
        .map(|((partition, bucket), files)| Split { partition, bucket, files })
        .collect()
}

/// Packs an append-only bucket's files into size-bounded splits, greedily
/// accumulating by `fileSize + openFileCost` against `target-size` (§4.H
/// step 5, append-only case). Merge-tree buckets instead keep one split per
/// bucket (callers simply skip this and use [`Scan::plan`]'s groups as-is),
/// since splitting them would break the merge.
pub fn pack_append_only_files(files: Vec<DataFileMeta>, target_size: u64, open_file_cost: u64) -> Vec<Vec<DataFileMeta>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut current_size = 0u64;
    for file in files {
        let weight = file.file_size as u64 + open_file_cost;
        if !current.is_empty() && current_size + weight > target_size {
            groups.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += weight;
        current.push(file);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{BinaryRow, BinaryTableStats, FileKind};
    use chrono::Utc;

    fn data_file(name: &str, size: i64) -> DataFileMeta {
        DataFileMeta {
            file_name: name.to_string(),
            file_size: size,
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

    fn entry(kind: FileKind, bucket: i32, file_name: &str) -> ManifestEntry {
        ManifestEntry::new(kind, vec![], bucket, 1, data_file(file_name, 100), 2)
    }

    #[test]
    fn reduce_cancels_matching_add_delete_pair() {
        let entries = vec![entry(FileKind::Add, 0, "a"), entry(FileKind::Delete, 0, "a")];
        assert!(reduce_entries(entries).is_empty());
    }

    #[test]
    fn reduce_keeps_unmatched_add() {
        let entries = vec![entry(FileKind::Add, 0, "a"), entry(FileKind::Add, 0, "b")];
        assert_eq!(reduce_entries(entries).len(), 2);
    }

    #[test]
    fn group_by_bucket_partitions_entries() {
        let entries = vec![entry(FileKind::Add, 0, "a"), entry(FileKind::Add, 1, "b")];
        let splits = group_by_bucket(entries);
        assert_eq!(splits.len(), 2);
    }

    #[test]
    fn append_only_packing_respects_target_size() {
        let files = vec![data_file("a", 40), data_file("b", 40), data_file("c", 40)];
        let groups = pack_append_only_files(files, 100, 0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
    }
}
