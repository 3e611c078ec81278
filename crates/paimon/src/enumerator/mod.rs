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

//! Streaming snapshot discovery and split distribution (§4.K).
//!
//! [`SnapshotEnumerator`] walks snapshots one at a time from wherever
//! `scan.mode` resolved its starting point, handing each tick the files that
//! snapshot's delta introduced. [`ContinuousFileSplitEnumerator`] then fans
//! those splits out to readers, keeping every bucket pinned to one reader
//! and ordered oldest-snapshot-first.

use std::collections::{HashMap, VecDeque};

use crate::io::FileIO;
use crate::options::{ScanMode, TableOptions};
use crate::scan::{Scan, Split};
use crate::snapshot::SnapshotManager;
use crate::Result;

/// One tick's outcome.
#[derive(Debug)]
pub enum EnumerateResult {
    /// `snapshot_id`'s incremental plan, grouped by bucket same as
    /// [`Scan::plan`].
    Plan { snapshot_id: i64, splits: Vec<Split> },
    /// The next expected snapshot is gone (expired while this enumerator
    /// fell behind); the caller should restart from `latest`.
    Finished,
}

/// Discovers new snapshots one at a time, starting from the id `scan.mode`
/// resolves (§4.K).
pub struct SnapshotEnumerator {
    scan: Scan,
    snapshots: SnapshotManager,
    next_snapshot_id: i64,
}

impl SnapshotEnumerator {
    pub fn new(file_io: FileIO, table_root: impl Into<String>, has_primary_key: bool, next_snapshot_id: i64) -> Self {
        let table_root = table_root.into();
        Self {
            scan: Scan::new(file_io.clone(), table_root.clone(), has_primary_key),
            snapshots: SnapshotManager::new(file_io, table_root),
            next_snapshot_id,
        }
    }

    /// Resolves the initial `next_snapshot_id` from `scan.mode`:
    /// `from-snapshot` starts right after the named snapshot, `from-timestamp`
    /// starts at the first snapshot whose `time_millis` is not earlier than
    /// `scan.timestamp-millis`, and every other mode (`default`, `latest`,
    /// `latest-full`, `compacted-full`) starts right after whatever is
    /// latest today.
    pub async fn starting_at(
        file_io: FileIO,
        table_root: impl Into<String>,
        has_primary_key: bool,
        options: &TableOptions,
    ) -> Result<Self> {
        let table_root = table_root.into();
        let snapshots = SnapshotManager::new(file_io.clone(), table_root.clone());
        let next_snapshot_id = match options.scan_mode()? {
            ScanMode::FromSnapshot => options.scan_snapshot_id()?.map(|id| id + 1).unwrap_or(0),
            ScanMode::FromTimestamp => {
                let target = options.scan_timestamp_millis()?.unwrap_or(0);
                Self::first_snapshot_at_or_after(&snapshots, target).await?
            }
            ScanMode::Default | ScanMode::Latest | ScanMode::LatestFull | ScanMode::CompactedFull => {
                snapshots.latest_snapshot_id().await?.map(|id| id + 1).unwrap_or(0)
            }
        };
        Ok(Self::new(file_io, table_root, has_primary_key, next_snapshot_id))
    }

    async fn first_snapshot_at_or_after(snapshots: &SnapshotManager, target_millis: i64) -> Result<i64> {
        let Some(latest) = snapshots.latest_snapshot_id().await? else {
            return Ok(0);
        };
        let Some(earliest) = snapshots.earliest_snapshot_id().await? else {
            return Ok(0);
        };
        for id in earliest..=latest {
            if !snapshots.snapshot_exists(id).await? {
                continue;
            }
            if snapshots.snapshot(id).await?.time_millis() >= target_millis {
                return Ok(id);
            }
        }
        Ok(latest + 1)
    }

    pub fn next_snapshot_id(&self) -> i64 {
        self.next_snapshot_id
    }

    /// Advances one tick. `Ok(None)` means there is nothing new yet; the
    /// caller should retry after `continuous-discovery-interval`.
    pub async fn tick(&mut self) -> Result<Option<EnumerateResult>> {
        let Some(latest) = self.snapshots.latest_snapshot_id().await? else {
            return Ok(None);
        };
        if self.next_snapshot_id > latest {
            return Ok(None);
        }
        if !self.snapshots.snapshot_exists(self.next_snapshot_id).await? {
            return Ok(Some(EnumerateResult::Finished));
        }

        let splits = self.scan.plan_incremental(self.next_snapshot_id).await?;
        let snapshot_id = self.next_snapshot_id;
        self.next_snapshot_id += 1;
        Ok(Some(EnumerateResult::Plan { snapshot_id, splits }))
    }
}

/// One split still waiting to be handed to a reader.
#[derive(Debug, Clone)]
pub struct PendingSplit {
    pub snapshot_id: i64,
    pub split: Split,
}

/// Fans splits out to a fixed set of readers, keyed by bucket (§4.K):
/// - a bucket is always assigned to the same reader (`bucket % num_readers`);
/// - within one bucket, splits drain in increasing snapshot-id order;
/// - across buckets assigned to the same reader, service rotates fairly.
pub struct ContinuousFileSplitEnumerator {
    num_readers: usize,
    bucket_queues: HashMap<i32, VecDeque<PendingSplit>>,
    next_bucket_cursor: usize,
}

impl ContinuousFileSplitEnumerator {
    pub fn new(num_readers: usize) -> Self {
        Self {
            num_readers: num_readers.max(1),
            bucket_queues: HashMap::new(),
            next_bucket_cursor: 0,
        }
    }

    /// The reader a bucket is permanently pinned to.
    pub fn reader_for_bucket(&self, bucket: i32) -> usize {
        bucket.rem_euclid(self.num_readers as i32) as usize
    }

    /// Enqueues one snapshot's plan. Callers MUST call this with
    /// monotonically increasing `snapshot_id`s (as [`SnapshotEnumerator`]
    /// produces them) for within-bucket FIFO ordering to hold.
    pub fn add_splits(&mut self, snapshot_id: i64, splits: Vec<Split>) {
        for split in splits {
            self.bucket_queues
                .entry(split.bucket)
                .or_default()
                .push_back(PendingSplit { snapshot_id, split });
        }
    }

    /// Pops the next split assigned to `reader_id`, rotating fairly across
    /// that reader's buckets that currently have pending work.
    pub fn poll_next(&mut self, reader_id: usize) -> Option<PendingSplit> {
        let mut buckets: Vec<i32> = self
            .bucket_queues
            .keys()
            .copied()
            .filter(|b| self.reader_for_bucket(*b) == reader_id)
            .collect();
        buckets.sort_unstable();
        if buckets.is_empty() {
            return None;
        }

        for offset in 0..buckets.len() {
            let idx = (self.next_bucket_cursor + offset) % buckets.len();
            let bucket = buckets[idx];
            if let Some(queue) = self.bucket_queues.get_mut(&bucket) {
                if let Some(pending) = queue.pop_front() {
                    self.next_bucket_cursor = (idx + 1) % buckets.len();
                    if queue.is_empty() {
                        self.bucket_queues.remove(&bucket);
                    }
                    return Some(pending);
                }
            }
        }
        None
    }

    /// Puts a split back at the front of its bucket's queue, for a reader
    /// that reconnected without having finished it. Safe to call with any
    /// split still bucket-ordered before whatever else is already queued,
    /// since it was popped from this same queue more recently than
    /// anything added after it.
    pub fn requeue(&mut self, pending: PendingSplit) {
        self.bucket_queues
            .entry(pending.split.bucket)
            .or_default()
            .push_front(pending);
    }

    pub fn has_pending(&self) -> bool {
        !self.bucket_queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(bucket: i32) -> Split {
        Split {
            partition: vec![],
            bucket,
            files: vec![],
        }
    }

    #[test]
    fn bucket_stays_with_one_reader() {
        let mut enumerator = ContinuousFileSplitEnumerator::new(2);
        enumerator.add_splits(0, vec![split(0), split(1), split(2)]);
        enumerator.add_splits(1, vec![split(0)]);

        assert_eq!(enumerator.reader_for_bucket(0), 0);
        assert_eq!(enumerator.reader_for_bucket(1), 1);
        assert_eq!(enumerator.reader_for_bucket(2), 0);

        let first = enumerator.poll_next(0).unwrap();
        assert_eq!(first.split.bucket % 2, 0);
    }

    #[test]
    fn within_bucket_order_is_fifo_by_snapshot() {
        let mut enumerator = ContinuousFileSplitEnumerator::new(1);
        enumerator.add_splits(0, vec![split(0)]);
        enumerator.add_splits(1, vec![split(0)]);

        let first = enumerator.poll_next(0).unwrap();
        let second = enumerator.poll_next(0).unwrap();
        assert_eq!(first.snapshot_id, 0);
        assert_eq!(second.snapshot_id, 1);
    }

    #[test]
    fn across_buckets_assignment_is_fair() {
        let mut enumerator = ContinuousFileSplitEnumerator::new(1);
        enumerator.add_splits(0, vec![split(0), split(1), split(0), split(1)]);

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(enumerator.poll_next(0).unwrap().split.bucket);
        }
        assert_eq!(seen, vec![0, 1, 0, 1]);
    }

    #[test]
    fn requeue_restores_fifo_position() {
        let mut enumerator = ContinuousFileSplitEnumerator::new(1);
        enumerator.add_splits(0, vec![split(0)]);
        enumerator.add_splits(1, vec![split(0)]);

        let popped = enumerator.poll_next(0).unwrap();
        enumerator.requeue(popped);

        let first = enumerator.poll_next(0).unwrap();
        assert_eq!(first.snapshot_id, 0);
    }
}
