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

use opendal::{Operator, Scheme};

use crate::error;

use super::FileIOBuilder;

/// The storage backends paimon's `FileIO` knows how to resolve a scheme to.
///
/// Object stores (s3, gcs, ...) are intentionally not wired up here: per
/// §1 this crate treats concrete object-store plugins as an external
/// concern, but the `isObjectStore` bit they'd flip is already modeled on
/// [`Storage::is_object_store`] so the commit-lock hook (§4.F) has
/// something real to call.
#[derive(Debug)]
pub(crate) enum Storage {
    #[cfg(feature = "storage-memory")]
    Memory,
    #[cfg(feature = "storage-fs")]
    LocalFs,
}

impl Storage {
    pub(crate) fn build(file_io_builder: FileIOBuilder) -> crate::Result<(Self, Operator)> {
        let (scheme_str, _props) = file_io_builder.into_parts();
        let scheme = Self::parse_scheme(&scheme_str)?;

        match scheme {
            #[cfg(feature = "storage-memory")]
            Scheme::Memory => Ok((Self::Memory, super::memory_config_build()?)),
            #[cfg(feature = "storage-fs")]
            Scheme::Fs => Ok((Self::LocalFs, super::fs_config_build()?)),
            _ => Err(error::Error::IoUnsupported {
                message: format!("unsupported storage scheme: {scheme_str}"),
            }),
        }
    }

    /// Strips the scheme prefix (`file://`, `memory://`) from a path so the
    /// remainder can be handed to the scheme-rooted [`Operator`].
    pub(crate) fn relativize<'a>(&self, path: &'a str) -> &'a str {
        match self {
            #[cfg(feature = "storage-memory")]
            Storage::Memory => path.strip_prefix("memory:/").unwrap_or(path),
            #[cfg(feature = "storage-fs")]
            Storage::LocalFs => path.strip_prefix("file:/").unwrap_or(path),
        }
    }

    /// Whether this backend requires an externally-injected commit lock
    /// because it cannot guarantee atomic rename (§4.A, §4.F).
    pub(crate) fn is_object_store(&self) -> bool {
        match self {
            #[cfg(feature = "storage-memory")]
            Storage::Memory => false,
            #[cfg(feature = "storage-fs")]
            Storage::LocalFs => false,
        }
    }

    fn parse_scheme(scheme: &str) -> crate::Result<Scheme> {
        match scheme {
            "memory" => Ok(Scheme::Memory),
            "file" | "" => Ok(Scheme::Fs),
            s => Ok(s.parse::<Scheme>()?),
        }
    }
}
