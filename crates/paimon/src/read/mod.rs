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

//! The read path (§4.L): turns a [`crate::scan::Split`] into a stream of
//! rows.
//!
//! [`AppendOnlyFileStoreRead`] just concatenates a split's files in order.
//! [`KeyValueFileStoreRead`] decodes each file back into [`KeyValue`]s using
//! the same `[key..., sequence, kind, value...]` layout
//! [`crate::mergetree::MergeTreeWriter`] writes, k-way merges them by
//! `(key, sequence)`, and folds each key's run through the table's merge
//! function, same as compaction does for a sorted run.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::format::{FileFormat, RecordReader};
use crate::io::FileIO;
use crate::merge::{KeyValue, MergeEngineFn, MergeFunction};
use crate::paths::{bucket_dir, decode_partition};
use crate::predicate::Predicate;
use crate::scan::Split;
use crate::spec::{DataField, FieldValue, Row, RowKind, RowType};
use crate::Result;

/// Concatenates a split's files one after another; used for append-only
/// tables and for value-count tables with no merge engine applied.
pub struct ConcatRecordReader {
    readers: VecDeque<Box<dyn RecordReader>>,
}

impl ConcatRecordReader {
    pub fn new(readers: Vec<Box<dyn RecordReader>>) -> Self {
        Self {
            readers: readers.into(),
        }
    }
}

impl Iterator for ConcatRecordReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let front = self.readers.front_mut()?;
            match front.next() {
                Some(item) => return Some(item),
                None => {
                    self.readers.pop_front();
                }
            }
        }
    }
}

/// Reads append-only (no primary key, no value-count) tables: every file in
/// a split is opened and concatenated in order, with projection and filter
/// pushdown delegated to the file format's reader factory (§4.C).
pub struct AppendOnlyFileStoreRead {
    file_io: FileIO,
    table_root: String,
    partition_fields: Vec<DataField>,
    partition_default_name: String,
    file_format: Arc<dyn FileFormat>,
    row_type: RowType,
    projection: Option<Vec<usize>>,
    filters: Vec<Predicate>,
}

impl AppendOnlyFileStoreRead {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_io: FileIO,
        table_root: impl Into<String>,
        partition_fields: Vec<DataField>,
        partition_default_name: String,
        file_format: Arc<dyn FileFormat>,
        row_type: RowType,
    ) -> Self {
        Self {
            file_io,
            table_root: table_root.into(),
            partition_fields,
            partition_default_name,
            file_format,
            row_type,
            projection: None,
            filters: Vec::new(),
        }
    }

    pub fn with_projection(mut self, projection: Vec<usize>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_filters(mut self, filters: Vec<Predicate>) -> Self {
        self.filters = filters;
        self
    }

    fn bucket_dir(&self, split: &Split) -> Result<String> {
        let partition = decode_partition(&split.partition)?;
        Ok(bucket_dir(
            &self.table_root,
            &self.partition_fields,
            &partition,
            split.bucket,
            &self.partition_default_name,
        ))
    }

    pub async fn create_reader(&self, split: &Split) -> Result<ConcatRecordReader> {
        let dir = self.bucket_dir(split)?;
        let reader_factory = self.file_format.create_reader_factory(
            self.row_type.clone(),
            self.projection.clone(),
            self.filters.clone(),
        );
        let mut readers = Vec::with_capacity(split.files.len());
        for file in &split.files {
            let path = format!("{dir}/{}", file.file_name);
            readers.push(reader_factory.create_reader(&self.file_io, &path).await?);
        }
        Ok(ConcatRecordReader::new(readers))
    }
}

/// How a merged key group's result is presented to the caller (§4.L).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutputMode {
    /// Emit the merged value once, optionally with a virtual `rowkind`
    /// column appended for the last-seen change kind.
    ValueContent,
    /// The table carries no primary key: the merged value is a `BIGINT`
    /// count, and the key row itself is emitted `|count|` times, `+I` if
    /// positive or `-D` if non-positive.
    ValueCount,
}

/// Decodes the `[key..., sequence, kind, value...]` layout a merge-tree
/// writer encodes a row as (mirrors
/// [`crate::mergetree::MergeTreeWriter::decode_kv`]'s private counterpart).
fn decode_kv(row: &Row, key_arity: usize, value_arity: usize) -> KeyValue {
    let key = Row::new(row.0[0..key_arity].to_vec());
    let sequence_number = match &row.0[key_arity] {
        FieldValue::BigInt(n) => *n,
        _ => 0,
    };
    let kind = match &row.0[key_arity + 1] {
        FieldValue::Int(0) => RowKind::Insert,
        FieldValue::Int(1) => RowKind::UpdateBefore,
        FieldValue::Int(2) => RowKind::UpdateAfter,
        _ => RowKind::Delete,
    };
    let value = Row::new(row.0[key_arity + 2..key_arity + 2 + value_arity].to_vec());
    KeyValue::new(key, sequence_number, kind, value)
}

/// A k-way merge by `(key, sequence)` over every `KeyValue` a split's files
/// decode to, folding each key's run through the table's merge function.
/// Files are expected to stay under `target-file-size` (the same assumption
/// [`RecordReader`] already documents), so collecting the split in memory
/// before sorting keeps this reader as simple as the write path's own
/// `merge_files` pass.
pub struct MergeReader {
    rows: std::vec::IntoIter<Result<Row>>,
}

impl MergeReader {
    pub fn new(
        mut kvs: Vec<KeyValue>,
        new_merge_fn: &dyn Fn() -> MergeEngineFn,
        mode: RowOutputMode,
        with_row_kind: bool,
    ) -> Self {
        kvs.sort_by(|a, b| a.key.0.cmp(&b.key.0).then(a.sequence_number.cmp(&b.sequence_number)));

        let mut out = Vec::new();
        let mut i = 0;
        while i < kvs.len() {
            let mut j = i + 1;
            while j < kvs.len() && kvs[j].key == kvs[i].key {
                j += 1;
            }
            let mut merge_fn = new_merge_fn();
            if let Some(value) = merge_fn.as_trait().merge(&kvs[i..j]) {
                match mode {
                    RowOutputMode::ValueContent => {
                        let mut fields = value.0;
                        if with_row_kind {
                            fields.push(FieldValue::String(kvs[j - 1].kind.short_string().to_string()));
                        }
                        out.push(Ok(Row::new(fields)));
                    }
                    RowOutputMode::ValueCount => {
                        let count = match value.get(0) {
                            Some(FieldValue::BigInt(n)) => *n,
                            _ => 0,
                        };
                        if count != 0 {
                            let kind = if count > 0 { RowKind::Insert } else { RowKind::Delete };
                            for _ in 0..count.unsigned_abs() {
                                let mut fields = kvs[i].key.0.clone();
                                if with_row_kind {
                                    fields.push(FieldValue::String(kind.short_string().to_string()));
                                }
                                out.push(Ok(Row::new(fields)));
                            }
                        }
                    }
                }
            }
            i = j;
        }
        Self { rows: out.into_iter() }
    }
}

impl Iterator for MergeReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// Reads tables with a primary key (or value-count tables without one): a
/// split's files are decoded back into `KeyValue`s and merged through the
/// configured [`MergeFunction`] (§4.J).
pub struct KeyValueFileStoreRead {
    file_io: FileIO,
    table_root: String,
    partition_fields: Vec<DataField>,
    partition_default_name: String,
    file_format: Arc<dyn FileFormat>,
    key_arity: usize,
    value_arity: usize,
    new_merge_fn: Box<dyn Fn() -> MergeEngineFn + Send + Sync>,
    output_mode: RowOutputMode,
    with_row_kind: bool,
}

impl KeyValueFileStoreRead {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_io: FileIO,
        table_root: impl Into<String>,
        partition_fields: Vec<DataField>,
        partition_default_name: String,
        file_format: Arc<dyn FileFormat>,
        key_arity: usize,
        value_arity: usize,
        new_merge_fn: Box<dyn Fn() -> MergeEngineFn + Send + Sync>,
        output_mode: RowOutputMode,
    ) -> Self {
        Self {
            file_io,
            table_root: table_root.into(),
            partition_fields,
            partition_default_name,
            file_format,
            key_arity,
            value_arity,
            new_merge_fn,
            output_mode,
            with_row_kind: false,
        }
    }

    /// Appends a virtual `rowkind` column (`+I`/`-U`/`+U`/`-D`) to every
    /// emitted row, used by changelog-reading callers.
    pub fn with_row_kind(mut self, with_row_kind: bool) -> Self {
        self.with_row_kind = with_row_kind;
        self
    }

    fn bucket_dir(&self, split: &Split) -> Result<String> {
        let partition = decode_partition(&split.partition)?;
        Ok(bucket_dir(
            &self.table_root,
            &self.partition_fields,
            &partition,
            split.bucket,
            &self.partition_default_name,
        ))
    }

    pub async fn create_reader(&self, split: &Split) -> Result<MergeReader> {
        let dir = self.bucket_dir(split)?;
        // Files hold the raw key/value/sequence layout, never the
        // projected/filtered row type a caller ultimately wants, so
        // projection and predicates apply after merging, not at this layer.
        let reader_factory = self.file_format.create_reader_factory(
            RowType::new(Vec::new()),
            None,
            Vec::new(),
        );
        let mut kvs = Vec::new();
        for file in &split.files {
            let path = format!("{dir}/{}", file.file_name);
            let reader = reader_factory.create_reader(&self.file_io, &path).await?;
            for row in reader {
                kvs.push(decode_kv(&row?, self.key_arity, self.value_arity));
            }
        }
        Ok(MergeReader::new(kvs, self.new_merge_fn.as_ref(), self.output_mode, self.with_row_kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::DeduplicateMergeFunction;

    fn kv(key: i32, seq: i64, kind: RowKind, value: &str) -> KeyValue {
        KeyValue::new(
            Row::new(vec![FieldValue::Int(key)]),
            seq,
            kind,
            Row::new(vec![FieldValue::String(value.to_string())]),
        )
    }

    #[test]
    fn merge_reader_dedups_by_highest_sequence() {
        let kvs = vec![
            kv(1, 0, RowKind::Insert, "a"),
            kv(1, 1, RowKind::UpdateAfter, "b"),
            kv(2, 0, RowKind::Insert, "c"),
        ];
        let factory = || MergeEngineFn::Deduplicate(DeduplicateMergeFunction::default());
        let reader = MergeReader::new(kvs, &factory, RowOutputMode::ValueContent, false);
        let rows: Vec<Row> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Row::new(vec![FieldValue::String("b".into())]));
        assert_eq!(rows[1], Row::new(vec![FieldValue::String("c".into())]));
    }

    #[test]
    fn merge_reader_drops_trailing_delete() {
        let kvs = vec![kv(1, 0, RowKind::Insert, "a"), kv(1, 1, RowKind::Delete, "a")];
        let factory = || MergeEngineFn::Deduplicate(DeduplicateMergeFunction::default());
        let reader = MergeReader::new(kvs, &factory, RowOutputMode::ValueContent, false);
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn merge_reader_value_count_repeats_key_row() {
        let kvs = vec![
            KeyValue::new(Row::new(vec![FieldValue::Int(1)]), 0, RowKind::Insert, Row::new(vec![FieldValue::BigInt(2)])),
            KeyValue::new(Row::new(vec![FieldValue::Int(1)]), 1, RowKind::Insert, Row::new(vec![FieldValue::BigInt(1)])),
        ];
        let factory = || MergeEngineFn::ValueCount(crate::merge::ValueCountMergeFunction::default());
        let reader = MergeReader::new(kvs, &factory, RowOutputMode::ValueCount, false);
        let rows: Vec<Row> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![Row::new(vec![FieldValue::Int(1)]), Row::new(vec![FieldValue::Int(1)]), Row::new(vec![FieldValue::Int(1)])]);
    }

    #[tokio::test]
    async fn append_only_read_concatenates_split_files() {
        use crate::format::create_file_format;
        use crate::spec::{BinaryRow, BinaryTableStats, DataFileMeta, FileSource};
        use chrono::Utc;
        use std::collections::HashMap;

        let file_io = FileIO::new(HashMap::from([("scheme".to_string(), "memory".to_string())])).unwrap();
        let row_type = RowType::new(vec![crate::spec::DataField::new(
            0,
            "v".to_string(),
            crate::spec::DataType::Int(crate::spec::IntType::new()),
        )]);
        let format: Arc<dyn FileFormat> = Arc::from(create_file_format("avro", &HashMap::new()).unwrap());

        let writer_factory = format.create_writer_factory(row_type.clone());
        let mut writer = writer_factory.create_writer(&file_io, "t/bucket-0/data-1.avro").await.unwrap();
        writer.add_element(&Row::new(vec![FieldValue::Int(1)])).unwrap();
        writer.add_element(&Row::new(vec![FieldValue::Int(2)])).unwrap();
        writer.close().await.unwrap();

        let read = AppendOnlyFileStoreRead::new(file_io, "t", vec![], "__DEFAULT_PARTITION__".to_string(), format, row_type);
        let split = Split {
            partition: vec![],
            bucket: 0,
            files: vec![DataFileMeta {
                file_name: "data-1.avro".to_string(),
                file_size: 1,
                row_count: 2,
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
                file_source: Some(FileSource::Append),
            }],
        };
        let reader = read.create_reader(&split).await.unwrap();
        let rows: Vec<Row> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![Row::new(vec![FieldValue::Int(1)]), Row::new(vec![FieldValue::Int(2)])]);
    }
}
