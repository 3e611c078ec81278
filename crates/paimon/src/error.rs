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

use snafu::prelude::*;

/// Result type used in paimon.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for paimon.
///
/// Every variant maps onto one of the error-taxonomy kinds: CONFIG_INVALID,
/// SCHEMA_MISMATCH, CONFLICT_RETRIABLE, CONFLICT_FATAL, IO_TRANSIENT,
/// IO_FATAL or MERGE_UNSUPPORTED. [`Error::is_retriable`] is the single
/// place that decides which kinds the engine is allowed to retry on its own.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Paimon data invalid for {}", message))]
    DataInvalid { message: String },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon data type invalid for {}", message)
    )]
    DataTypeInvalid { message: String },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon could not parse data type: {}", message)
    )]
    DataTypeParsing { message: String },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon hitting unexpected error {}: {:?}", message, source)
    )]
    IoUnexpected {
        message: String,
        source: opendal::Error,
    },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon hitting unsupported io error {}", message)
    )]
    IoUnsupported { message: String },

    /// IO_FATAL: a file that must exist is missing, or is corrupt beyond repair.
    #[snafu(
        visibility(pub(crate)),
        display("Paimon hitting fatal io error {}", message)
    )]
    IoFatal { message: String },

    /// IO_TRANSIENT: a filesystem hiccup that the engine is allowed to retry
    /// internally at manifest/snapshot read boundaries. Never used for writes.
    #[snafu(
        visibility(pub(crate)),
        display("Paimon hitting transient io error {}", message)
    )]
    IoTransient { message: String },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon hitting invalid config: {}", message)
    )]
    ConfigInvalid { message: String },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon hitting unexpected avro error {}: {:?}", message, source)
    )]
    AvroFailed {
        message: String,
        source: apache_avro::Error,
    },

    /// SCHEMA_MISMATCH: a data file's schema can no longer be reconciled
    /// with the table schema used by the read or write in progress.
    #[snafu(
        visibility(pub(crate)),
        display("Paimon schema mismatch: {}", message)
    )]
    SchemaMismatch { message: String },

    /// CONFLICT_RETRIABLE: the optimistic-concurrency commit loop raced
    /// another writer but the conflict is logically compatible; the caller
    /// (or the commit retry loop) may retarget and retry.
    #[snafu(
        visibility(pub(crate)),
        display("Paimon commit conflict, retriable: {}", message)
    )]
    ConflictRetriable { message: String },

    /// CONFLICT_FATAL: two writers deleted the same file, or an overwrite
    /// collided with a concurrent committer. Never retried automatically.
    #[snafu(
        visibility(pub(crate)),
        display("Paimon commit conflict, fatal: {}", message)
    )]
    ConflictFatal { message: String },

    /// MERGE_UNSUPPORTED: a record could not be folded by the configured
    /// merge function (e.g. DELETE under partial-update without
    /// `partial-update.ignore-delete`).
    #[snafu(
        visibility(pub(crate)),
        display("Paimon merge function does not support this input: {}", message)
    )]
    MergeUnsupported { message: String },

    #[snafu(visibility(pub(crate)), display("Paimon table not found: {}", identifier))]
    TableNotExist { identifier: String },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon factory '{}' is already registered", identifier)
    )]
    FactoryAlreadyExists { identifier: String },

    #[snafu(
        visibility(pub(crate)),
        display("Paimon factory '{}' was not found", identifier)
    )]
    FactoryNotFound { identifier: String },
}

impl Error {
    /// Whether this error kind is safe for the engine to retry internally.
    ///
    /// Only IO_TRANSIENT and CONFLICT_RETRIABLE are retriable; every other
    /// kind is surfaced to the caller as-is, per the propagation policy: write
    /// and commit errors are never silently retried.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::IoTransient { .. } | Error::ConflictRetriable { .. }
        )
    }
}

impl From<opendal::Error> for Error {
    fn from(source: opendal::Error) -> Self {
        if source.kind() == opendal::ErrorKind::NotFound {
            Error::IoFatal {
                message: format!("path does not exist: {source}"),
            }
        } else if source.is_temporary() {
            Error::IoTransient {
                message: format!("transient storage error: {source}"),
            }
        } else {
            Error::IoUnexpected {
                message: "IO operation failed on underlying storage".to_string(),
                source,
            }
        }
    }
}

impl From<apache_avro::Error> for Error {
    fn from(source: apache_avro::Error) -> Self {
        Error::AvroFailed {
            message: "failed to encode/decode avro payload".to_string(),
            source,
        }
    }
}
