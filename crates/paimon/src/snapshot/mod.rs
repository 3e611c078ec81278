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

//! Snapshot storage and discovery (§4.E).
//!
//! Snapshots live at `<table root>/snapshot/snapshot-<id>`, published only
//! through [`crate::io::FileIO::try_atomic_rename`]. `LATEST`/`EARLIEST`
//! hint files cache the id range so readers don't have to list the
//! directory on every open; they are advisory only, `SnapshotManager`
//! falls back to a directory listing whenever a hint is absent or stale.

use bytes::Bytes;
use snafu::OptionExt;
use uuid::Uuid;

use crate::error::DataInvalidSnafu;
use crate::io::FileIO;
use crate::spec::Snapshot;
use crate::Result;

const SNAPSHOT_DIR: &str = "snapshot";
const SNAPSHOT_PREFIX: &str = "snapshot-";
const EARLIEST_HINT: &str = "EARLIEST";
const LATEST_HINT: &str = "LATEST";

pub struct SnapshotManager {
    file_io: FileIO,
    table_root: String,
}

impl SnapshotManager {
    pub fn new(file_io: FileIO, table_root: impl Into<String>) -> Self {
        Self {
            file_io,
            table_root: table_root.into(),
        }
    }

    fn snapshot_dir(&self) -> String {
        format!("{}/{}", self.table_root.trim_end_matches('/'), SNAPSHOT_DIR)
    }

    pub fn snapshot_path(&self, id: i64) -> String {
        format!("{}/{}{}", self.snapshot_dir(), SNAPSHOT_PREFIX, id)
    }

    fn hint_path(&self, name: &str) -> String {
        format!("{}/{}", self.snapshot_dir(), name)
    }

    pub async fn snapshot_exists(&self, id: i64) -> Result<bool> {
        self.file_io.exists(&self.snapshot_path(id)).await
    }

    /// Reads a specific snapshot by id.
    pub async fn snapshot(&self, id: i64) -> Result<Snapshot> {
        let path = self.snapshot_path(id);
        let bytes = self.file_io.new_input(&path)?.read().await?;
        serde_json::from_slice(&bytes).map_err(|e| crate::Error::DataInvalid {
            message: format!("failed to parse snapshot {id} at {path}: {e}"),
        })
    }

    async fn read_hint(&self, name: &str) -> Result<Option<i64>> {
        let path = self.hint_path(name);
        if !self.file_io.exists(&path).await? {
            return Ok(None);
        }
        let bytes = self.file_io.new_input(&path)?.read().await?;
        let text = std::str::from_utf8(&bytes).map_err(|_| crate::Error::DataInvalid {
            message: format!("hint file {path} is not valid utf-8"),
        })?;
        let id = text.trim().parse::<i64>().ok().with_context(|| DataInvalidSnafu {
            message: format!("hint file {path} does not contain a snapshot id"),
        })?;
        Ok(Some(id))
    }

    async fn write_hint(&self, name: &str, id: i64) -> Result<()> {
        let tmp = format!("{}.tmp-{}", self.hint_path(name), Uuid::new_v4());
        self.file_io
            .new_output(&tmp)?
            .write(Bytes::from(id.to_string()))
            .await?;
        // Hints are advisory: an unconditional rename is fine, a reader
        // that loses the race just falls back to a directory listing.
        self.file_io.rename(&tmp, &self.hint_path(name)).await
    }

    async fn list_all_ids(&self) -> Result<Vec<i64>> {
        let dir = self.snapshot_dir();
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
                name.strip_prefix(SNAPSHOT_PREFIX)?.parse::<i64>().ok()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Resolves the latest snapshot id, trusting the `LATEST` hint only
    /// when the snapshot it names still exists.
    pub async fn latest_snapshot_id(&self) -> Result<Option<i64>> {
        if let Some(id) = self.read_hint(LATEST_HINT).await? {
            if self.snapshot_exists(id).await? {
                return Ok(Some(id));
            }
        }
        Ok(self.list_all_ids().await?.into_iter().max())
    }

    /// Resolves the earliest snapshot id still present, trusting the
    /// `EARLIEST` hint only when the snapshot it names still exists
    /// (expiration may have moved it forward since the hint was written).
    pub async fn earliest_snapshot_id(&self) -> Result<Option<i64>> {
        if let Some(id) = self.read_hint(EARLIEST_HINT).await? {
            if self.snapshot_exists(id).await? {
                return Ok(Some(id));
            }
        }
        Ok(self.list_all_ids().await?.into_iter().min())
    }

    pub async fn commit_latest_hint(&self, id: i64) -> Result<()> {
        self.write_hint(LATEST_HINT, id).await
    }

    pub async fn commit_earliest_hint(&self, id: i64) -> Result<()> {
        self.write_hint(EARLIEST_HINT, id).await
    }

    /// Writes `snapshot` to a temp path and publishes it at its id via
    /// [`crate::io::FileIO::try_atomic_rename`]. Returns `Ok(false)`
    /// without error when another committer already published this id,
    /// leaving the retry decision to the caller (§4.F).
    pub async fn commit(&self, snapshot: &Snapshot) -> Result<bool> {
        let dir = self.snapshot_dir();
        self.file_io.mkdirs(&dir).await?;
        let tmp = format!("{dir}/.tmp-{}", Uuid::new_v4());
        let bytes = serde_json::to_vec_pretty(snapshot).map_err(|e| crate::Error::DataInvalid {
            message: format!("failed to encode snapshot {}: {e}", snapshot.id()),
        })?;
        self.file_io.new_output(&tmp)?.write(Bytes::from(bytes)).await?;

        let dst = self.snapshot_path(snapshot.id());
        let published = self.file_io.try_atomic_rename(&tmp, &dst).await?;
        if !published {
            self.file_io.delete_file(&tmp).await?;
        }
        Ok(published)
    }

    /// Walks snapshots backward from the latest, stopping at the first one
    /// that can no longer be read rather than treating that as an error:
    /// concurrent [`crate::expire::Expire`] may have removed older
    /// snapshots while this scan is in progress (§4.G).
    pub async fn traverse_from_latest_safely(&self) -> Result<Vec<Snapshot>> {
        let mut out = Vec::new();
        let mut next_id = match self.latest_snapshot_id().await? {
            Some(id) => id,
            None => return Ok(out),
        };
        loop {
            match self.snapshot(next_id).await {
                Ok(snapshot) => out.push(snapshot),
                Err(_) => break,
            }
            if next_id == 0 {
                break;
            }
            next_id -= 1;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::CommitKind;
    use std::collections::HashMap;

    fn memory_file_io() -> FileIO {
        FileIO::new(HashMap::from([("scheme".to_string(), "memory".to_string())])).unwrap()
    }

    fn sample_snapshot(id: i64) -> Snapshot {
        Snapshot::builder()
            .version(3)
            .id(id)
            .schema_id(0)
            .base_manifest_list(format!("manifest-list-base-{id}"))
            .delta_manifest_list(format!("manifest-list-delta-{id}"))
            .commit_user("writer-1".to_string())
            .commit_identifier(id)
            .commit_kind(CommitKind::Append)
            .time_millis(id)
            .log_offsets(HashMap::new())
            .build()
    }

    #[tokio::test]
    async fn commit_then_read_round_trips() {
        let manager = SnapshotManager::new(memory_file_io(), "warehouse/db.db/t");
        assert!(manager.commit(&sample_snapshot(0)).await.unwrap());
        let read_back = manager.snapshot(0).await.unwrap();
        assert_eq!(read_back.id(), 0);
        assert_eq!(read_back.commit_user(), "writer-1");
    }

    #[tokio::test]
    async fn commit_fails_closed_on_existing_id() {
        let manager = SnapshotManager::new(memory_file_io(), "warehouse/db.db/t");
        assert!(manager.commit(&sample_snapshot(5)).await.unwrap());
        assert!(!manager.commit(&sample_snapshot(5)).await.unwrap());
    }

    #[tokio::test]
    async fn latest_id_falls_back_to_listing_without_a_hint() {
        let manager = SnapshotManager::new(memory_file_io(), "warehouse/db.db/t");
        manager.commit(&sample_snapshot(0)).await.unwrap();
        manager.commit(&sample_snapshot(1)).await.unwrap();
        manager.commit(&sample_snapshot(2)).await.unwrap();

        assert_eq!(manager.latest_snapshot_id().await.unwrap(), Some(2));
        assert_eq!(manager.earliest_snapshot_id().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn stale_hint_falls_back_to_listing() {
        let manager = SnapshotManager::new(memory_file_io(), "warehouse/db.db/t");
        manager.commit(&sample_snapshot(0)).await.unwrap();
        manager.commit_latest_hint(41).await.unwrap();

        assert_eq!(manager.latest_snapshot_id().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn traverse_stops_at_first_gap() {
        let manager = SnapshotManager::new(memory_file_io(), "warehouse/db.db/t");
        manager.commit(&sample_snapshot(0)).await.unwrap();
        manager.commit(&sample_snapshot(2)).await.unwrap();
        manager.commit_latest_hint(2).await.unwrap();

        let snapshots = manager.traverse_from_latest_safely().await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id(), 2);
    }
}
