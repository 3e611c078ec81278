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

//! A table storage engine providing ACID-consistent, columnar, partitioned,
//! bucketed tables with snapshot isolation on top of an object-store-like
//! filesystem.
//!
//! Three logical table shapes share one snapshot/manifest metadata plane
//! and a pluggable columnar file format:
//! - append-only tables ([`read::AppendOnlyFileStoreRead`]),
//! - changelog-with-primary-key tables, backed by the LSM merge tree in
//!   [`mergetree`] and merged on read by [`merge`],
//! - changelog-by-value-count tables, which reuse the same merge tree with
//!   [`merge::ValueCountMergeFunction`].
//!
//! The metadata plane ([`spec`], [`snapshot`], [`manifest`], [`schema`])
//! and the write/read/scan pipelines built on top of it are covered module
//! by module below; [`catalog`] is the thin database/table naming layer
//! above a single table's [`io::FileIO`] root.

pub mod catalog;
pub mod commit;
pub mod enumerator;
pub mod error;
pub mod expire;
pub mod format;
pub mod fs;
pub mod io;
pub mod manifest;
pub mod merge;
pub mod mergetree;
pub mod options;
pub mod orphan;
pub mod paths;
pub mod predicate;
pub mod read;
pub mod scan;
pub mod schema;
pub mod snapshot;
pub mod spec;
pub mod systable;

pub use error::{Error, Result};
