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

//! Spec module for paimon.
//!
//! All paimon specs types are defined here.

mod data_file;
pub use data_file::*;

mod schema;
pub use schema::*;

mod schema_change;
pub use schema_change::*;

mod snapshot;
pub use snapshot::*;

mod manifest_file_meta;
pub use manifest_file_meta::*;

mod manifest_list;
pub use manifest_list::*;

mod row;
pub use row::*;

mod manifest_common;
pub use manifest_common::FileKind;

pub mod manifest_entry;
pub use manifest_entry::{Identifier as ManifestEntryIdentifier, ManifestEntry};

mod stats;
pub use stats::*;

mod types;
pub use types::*;
