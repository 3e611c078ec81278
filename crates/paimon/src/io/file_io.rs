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

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::offset::Utc;
use chrono::DateTime;
use opendal::{Metakey, Operator};
use snafu::ResultExt;

use crate::error::*;

use super::Storage;

/// Builds a [`FileIO`] for one scheme (`file`, `memory`, ...) plus options.
///
/// The input options map is paimon-java's
/// [`Options`](https://github.com/apache/paimon/blob/release-0.8.2/paimon-common/src/main/java/org/apache/paimon/options/Options.java#L60);
/// unknown keys are currently ignored rather than rejected since no backend
/// wired up here reads any.
#[derive(Debug, Clone, Default)]
pub struct FileIOBuilder {
    scheme: String,
    props: HashMap<String, String>,
}

impl FileIOBuilder {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            props: HashMap::new(),
        }
    }

    /// Infers the scheme from a path's `scheme://` prefix, defaulting to the
    /// local filesystem when there is none.
    pub fn from_path(path: &str) -> Self {
        let scheme = path.split("://").next().unwrap_or("file");
        let scheme = if scheme == path { "file" } else { scheme };
        Self::new(scheme)
    }

    pub fn with_props(mut self, props: impl IntoIterator<Item = (String, String)>) -> Self {
        self.props.extend(props);
        self
    }

    pub(crate) fn into_parts(self) -> (String, HashMap<String, String>) {
        (self.scheme, self.props)
    }

    pub fn build(self) -> Result<FileIO> {
        let (storage, op) = Storage::build(self)?;
        Ok(FileIO {
            storage: Arc::new(storage),
            op,
        })
    }
}

/// Abstract filesystem capability (§4.A).
///
/// `FileIO` never overwrites silently: [`FileIO::try_atomic_rename`] is the
/// only path a new snapshot or manifest file is ever published through, and
/// it fails closed when the destination is already present.
#[derive(Clone)]
pub struct FileIO {
    storage: Arc<Storage>,
    op: Operator,
}

impl std::fmt::Debug for FileIO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIO").finish_non_exhaustive()
    }
}

impl FileIO {
    /// Convenience constructor for the common case of a single local-fs or
    /// in-memory table root; prefer [`FileIOBuilder`] to configure an
    /// object-store scheme with credentials. Looks for a `scheme` key in
    /// `options` (defaulting to `file`) so callers can request the in-memory
    /// backend without going through [`FileIOBuilder`] directly.
    pub fn new(mut options: HashMap<String, String>) -> Result<Self> {
        let scheme = options.remove("scheme").unwrap_or_else(|| "file".to_string());
        FileIOBuilder::new(scheme).with_props(options).build()
    }

    fn relative(&self, path: &str) -> String {
        self.storage.relativize(path).to_string()
    }

    /// Create a new input file to read data.
    pub fn new_input(&self, path: &str) -> Result<InputFile> {
        Ok(InputFile {
            op: self.op.clone(),
            path: self.relative(path),
            display_path: path.to_string(),
        })
    }

    /// Create a new output file to write data.
    pub fn new_output(&self, path: &str) -> Result<OutputFile> {
        Ok(OutputFile {
            op: self.op.clone(),
            path: self.relative(path),
            display_path: path.to_string(),
        })
    }

    /// Return a file status object that represents the path.
    pub async fn get_status(&self, path: &str) -> Result<FileStatus> {
        let meta = self
            .op
            .stat(&self.relative(path))
            .await
            .context(IoUnexpectedSnafu {
                message: "failed to get file status".to_string(),
            })?;

        Ok(FileStatus {
            size: meta.content_length(),
            is_dir: meta.is_dir(),
            last_modified: meta.last_modified(),
            path: path.to_string(),
        })
    }

    /// List the statuses of the files/directories under `path`.
    pub async fn list_status(&self, path: &str) -> Result<Vec<FileStatus>> {
        let rel = self.relative(path);
        let entries = self
            .op
            .list_with(&rel)
            .metakey(Metakey::ContentLength | Metakey::LastModified)
            .await
            .context(IoUnexpectedSnafu {
                message: "failed to list file status".to_string(),
            })?;

        Ok(entries
            .into_iter()
            .map(|meta| FileStatus {
                size: meta.metadata().content_length(),
                is_dir: meta.metadata().is_dir(),
                last_modified: meta.metadata().last_modified(),
                path: format!("{}{}", path.trim_end_matches('/'), meta.name()),
            })
            .collect())
    }

    /// Check if a path exists.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        self.op
            .exists(&self.relative(path))
            .await
            .context(IoUnexpectedSnafu {
                message: "failed to check file existence".to_string(),
            })
    }

    /// Delete a single file. Tolerates the file already being gone, matching
    /// the "tolerate missing files" requirement expiration relies on (§4.G).
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        match self.op.delete(&self.relative(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a directory and everything beneath it.
    pub async fn delete_dir(&self, path: &str) -> Result<()> {
        self.op
            .remove_all(&self.relative(path))
            .await
            .context(IoUnexpectedSnafu {
                message: "failed to delete dir".to_string(),
            })?;
        Ok(())
    }

    /// `mkdir -p` semantics; existence of the hierarchy is not an error.
    pub async fn mkdirs(&self, path: &str) -> Result<()> {
        self.op
            .create_dir(&self.relative(path))
            .await
            .context(IoUnexpectedSnafu {
                message: "failed to create dir".to_string(),
            })?;
        Ok(())
    }

    /// Unconditional rename, used for operations (e.g. spill-file cleanup)
    /// that do not require the fail-closed guarantee. Prefer
    /// [`FileIO::try_atomic_rename`] when publishing a snapshot/manifest.
    pub async fn rename(&self, src: &str, dst: &str) -> Result<()> {
        self.op
            .rename(&self.relative(src), &self.relative(dst))
            .await
            .context(IoUnexpectedSnafu {
                message: "failed to rename file".to_string(),
            })?;
        Ok(())
    }

    /// Atomically renames `src` to `dst`, refusing to clobber an existing
    /// `dst`. Returns `Ok(false)` (no write performed) rather than an error
    /// when `dst` is already present, so callers (the commit retry loop, in
    /// particular) can treat "someone beat me to it" as ordinary control
    /// flow instead of an I/O failure.
    ///
    /// This is the only way the engine ever publishes a `snapshot/snapshot-<id>`
    /// or a manifest file: §4.A requires rename to be atomic when both paths
    /// share a store and to fail closed otherwise. Local filesystems and
    /// `opendal`'s in-memory backend both support rename without an
    /// intervening window where `dst` can be observed half-written, which
    /// is what "atomic" means here; we still re-check existence first since
    /// `opendal::Operator::rename` itself overwrites unconditionally.
    pub async fn try_atomic_rename(&self, src: &str, dst: &str) -> Result<bool> {
        if self.exists(dst).await? {
            return Ok(false);
        }
        self.rename(src, dst).await?;
        Ok(true)
    }

    /// Whether this `FileIO`'s backend cannot guarantee atomic rename and
    /// therefore requires an external lock around the commit's publish step
    /// (§4.A, §4.F).
    pub fn is_object_store(&self) -> bool {
        self.storage.is_object_store()
    }
}

/// FileStatus represents the status of a file.
#[derive(Clone, Debug)]
pub struct FileStatus {
    pub size: u64,
    pub is_dir: bool,
    pub path: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A file that can be read from.
#[derive(Clone)]
pub struct InputFile {
    op: Operator,
    path: String,
    display_path: String,
}

impl InputFile {
    pub fn path(&self) -> &str {
        &self.display_path
    }

    /// Reads the entire file into memory. Manifests, manifest lists,
    /// snapshots and schema files are all small enough that streaming reads
    /// are not worth the complexity for this core engine.
    pub async fn read(&self) -> Result<Bytes> {
        self.op
            .read(&self.path)
            .await
            .map(|buf| buf.to_bytes())
            .context(IoUnexpectedSnafu {
                message: format!("failed to read {}", self.display_path),
            })
    }
}

/// A file that can be written to.
#[derive(Clone)]
pub struct OutputFile {
    op: Operator,
    path: String,
    display_path: String,
}

impl OutputFile {
    pub fn path(&self) -> &str {
        &self.display_path
    }

    /// Writes `bytes` to this file, creating parent directories implicitly
    /// (opendal's fs/memory backends both do this). Overwrites unconditionally;
    /// callers that need fail-closed semantics write to a temp path and go
    /// through [`FileIO::try_atomic_rename`].
    pub async fn write(&self, bytes: Bytes) -> Result<()> {
        self.op
            .write(&self.path, bytes)
            .await
            .context(IoUnexpectedSnafu {
                message: format!("failed to write {}", self.display_path),
            })?;
        Ok(())
    }
}
