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

//! Pluggable columnar file format capability (§4.C).
//!
//! A [`FileFormat`] hands out a reader factory, a writer factory and a stats
//! extractor for one `(row type, projection, filters)` shape. Formats
//! register themselves process-wide under an identifier (`"avro"`, ...) the
//! same way the teacher's `file_index::file_index_factory` registers
//! `FileIndexerFactory`s, so a caller resolving `file.format` from
//! [`crate::options::TableOptions`] never needs a match on a closed enum of
//! known formats.

mod avro;

pub use avro::AvroFileFormat;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::io::FileIO;
use crate::predicate::Predicate;
use crate::spec::{FieldStats, Row, RowType};
use crate::{Error, Result};

/// A format identifier (`"avro"`, `"orc"`, `"parquet"`, ...) together with
/// its factories for one table's row type.
pub trait FileFormat: Send + Sync {
    fn identifier(&self) -> &str;

    fn create_reader_factory(
        &self,
        row_type: RowType,
        projection: Option<Vec<usize>>,
        filters: Vec<Predicate>,
    ) -> Box<dyn ReaderFactory>;

    fn create_writer_factory(&self, row_type: RowType) -> Box<dyn WriterFactory>;

    fn create_stats_extractor(&self, row_type: RowType) -> Box<dyn StatsExtractor>;
}

/// Builds a [`FileFormat`] for one identifier out of unvalidated options,
/// rejecting unrecognized keys at construction rather than at first use.
pub trait FileFormatFactory: Send + Sync {
    fn identifier(&self) -> String;

    fn create(&self, options: &HashMap<String, String>) -> Result<Box<dyn FileFormat>>;
}

/// Opens a [`RecordReader`] over one data file.
#[async_trait]
pub trait ReaderFactory: Send + Sync {
    async fn create_reader(&self, file_io: &FileIO, path: &str) -> Result<Box<dyn RecordReader>>;
}

/// A (possibly lazily materialized) sequence of rows already decoded and
/// projected. This core engine reads whole manifest/data files into memory
/// before iterating (files are expected to stay under `target-file-size`),
/// so a boxed `Vec` iterator satisfies every current caller; a future
/// streaming format only needs to hand back a different `Iterator` impl.
pub trait RecordReader: Iterator<Item = Result<Row>> + Send {}

impl<T> RecordReader for T where T: Iterator<Item = Result<Row>> + Send {}

/// Opens a [`BulkWriter`] that appends rows to one new data file.
#[async_trait]
pub trait WriterFactory: Send + Sync {
    async fn create_writer(&self, file_io: &FileIO, path: &str) -> Result<Box<dyn BulkWriter>>;
}

/// Accumulates rows for one data file and finalizes it on [`BulkWriter::close`].
#[async_trait]
pub trait BulkWriter: Send {
    fn add_element(&mut self, row: &Row) -> Result<()>;

    /// Number of bytes buffered so far, used by the LSM writer to decide
    /// when a file has grown past `target-file-size`.
    fn length(&self) -> Result<u64>;

    /// Flushes and closes the file, returning the row count actually
    /// written.
    async fn close(self: Box<Self>) -> Result<i64>;
}

/// Computes per-column `(min, max, null_count)` for a batch of rows,
/// matching the shape [`crate::manifest`] already stores on
/// [`crate::spec::ManifestFileMeta`] for partition columns.
pub trait StatsExtractor: Send + Sync {
    fn extract(&self, rows: &[Row]) -> Result<FieldStats>;
}

type FactoryMap = HashMap<String, Arc<dyn FileFormatFactory>>;

static FACTORIES: Lazy<Mutex<FactoryMap>> = Lazy::new(|| Mutex::new(default_factories()));

fn default_factories() -> FactoryMap {
    let mut map: FactoryMap = HashMap::new();
    let factory: Arc<dyn FileFormatFactory> = Arc::new(avro::AvroFileFormatFactory);
    map.insert(factory.identifier(), factory);
    map
}

/// Registers a new format factory, failing if its identifier is already
/// taken (including by the built-in `"avro"` factory).
pub fn register_factory(factory: Arc<dyn FileFormatFactory>) -> Result<()> {
    let mut factories = FACTORIES.lock().unwrap();
    let identifier = factory.identifier();
    if factories.contains_key(&identifier) {
        return Err(Error::FactoryAlreadyExists { identifier });
    }
    factories.insert(identifier, factory);
    Ok(())
}

/// Resolves `file.format` (e.g. `"avro"`) to a constructed [`FileFormat`],
/// validating `options` against that format's recognized keys.
pub fn create_file_format(
    identifier: &str,
    options: &HashMap<String, String>,
) -> Result<Box<dyn FileFormat>> {
    let factory = FACTORIES
        .lock()
        .unwrap()
        .get(identifier)
        .cloned()
        .ok_or_else(|| Error::FactoryNotFound {
            identifier: identifier.to_string(),
        })?;
    factory.create(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avro_factory_is_registered_by_default() {
        let format = create_file_format("avro", &HashMap::new()).unwrap();
        assert_eq!(format.identifier(), "avro");
    }

    #[test]
    fn unknown_format_identifier_fails() {
        let err = create_file_format("orc", &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::FactoryNotFound { .. }));
    }

    #[test]
    fn unrecognized_option_fails_construction() {
        let mut options = HashMap::new();
        options.insert("not-a-real-option".to_string(), "x".to_string());
        let err = create_file_format("avro", &options).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }
}
