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

//! Abstract filesystem capability (§4.A FileIO).
//!
//! Paimon's commit protocol relies on one operation above all others: an
//! atomic, fail-closed rename. Everything else (listing, mkdirs, delete) is
//! a thin wrapper over [`opendal::Operator`], chosen because it already
//! gives us a uniform interface across local disk and object stores without
//! us having to write per-backend code.

mod file_io;
mod storage;

pub use file_io::{FileIO, FileIOBuilder, FileStatus, InputFile, OutputFile};
pub(crate) use storage::Storage;

use opendal::{services, Operator};

use crate::error::IoUnexpectedSnafu;
use crate::Result;
use snafu::ResultExt;

/// Builds the `memory://` operator used for tests and ephemeral tables.
pub(crate) fn memory_config_build() -> Result<Operator> {
    Ok(Operator::new(services::Memory::default())
        .context(IoUnexpectedSnafu {
            message: "failed to build memory operator".to_string(),
        })?
        .finish())
}

/// Builds the `file://` operator rooted at `/`, matching paimon-java's
/// `LocalFileIO` semantics (paths passed to `FileIO` are absolute).
pub(crate) fn fs_config_build() -> Result<Operator> {
    Ok(Operator::new(services::Fs::default().root("/"))
        .context(IoUnexpectedSnafu {
            message: "failed to build local filesystem operator".to_string(),
        })?
        .finish())
}
