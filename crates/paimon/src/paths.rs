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

//! On-disk path conventions shared by the write, scan and expire paths
//! (§6): `<table root>/k1=v1/k2=v2/bucket-<n>/<file name>`, with a
//! configurable `partition.default-name` standing in for a null partition
//! value, matching [`crate::manifest`] and [`crate::snapshot`]'s existing
//! `format!("{root}/{subdir}")` style.
//!
//! Partition values are taken as plain [`FieldValue`]s rather than a
//! [`crate::spec::BinaryRow`], since [`crate::spec::ManifestEntry::partition`]
//! hands back the packed bytes directly; callers decode those through
//! [`crate::spec::BinaryRow::to_fields`] first.

use crate::spec::{DataField, FieldValue};
use crate::Result;

/// Renders `partition` as `k1=v1/k2=v2/...` against the table's partition
/// fields, in declaration order. Returns an empty string for an unpartitioned
/// table.
pub fn partition_path(
    partition_fields: &[DataField],
    partition: &[FieldValue],
    default_name: &str,
) -> String {
    partition_fields
        .iter()
        .zip(partition.iter())
        .map(|(field, value)| {
            let rendered = if value.is_null() {
                default_name.to_string()
            } else {
                value.to_string()
            };
            format!("{}={}", field.name(), rendered)
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The directory holding one bucket's data and changelog files.
pub fn bucket_dir(
    table_root: &str,
    partition_fields: &[DataField],
    partition: &[FieldValue],
    bucket: i32,
    default_name: &str,
) -> String {
    let root = table_root.trim_end_matches('/');
    let part = partition_path(partition_fields, partition, default_name);
    if part.is_empty() {
        format!("{root}/bucket-{bucket}")
    } else {
        format!("{root}/{part}/bucket-{bucket}")
    }
}

/// The full path of one data or changelog file within its bucket.
pub fn data_file_path(
    table_root: &str,
    partition_fields: &[DataField],
    partition: &[FieldValue],
    bucket: i32,
    file_name: &str,
    default_name: &str,
) -> String {
    let dir = bucket_dir(table_root, partition_fields, partition, bucket, default_name);
    format!("{dir}/{file_name}")
}

/// Decodes a manifest entry's packed partition bytes back into field
/// values, matching [`crate::spec::BinaryRow::to_fields`]'s own decoding of
/// the same wire trick.
pub fn decode_partition(bytes: &[u8]) -> Result<Vec<FieldValue>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes).map_err(|e| crate::Error::DataInvalid {
        message: format!("failed to decode partition: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{DataType, VarCharType};

    fn fields() -> Vec<DataField> {
        vec![DataField::new(
            0,
            "dt".to_string(),
            DataType::VarChar(VarCharType::new(10).unwrap()),
        )]
    }

    #[test]
    fn renders_partition_value_into_directory_name() {
        let partition = vec![FieldValue::String("2024-01-01".to_string())];
        let path = data_file_path(
            "warehouse/db.db/t",
            &fields(),
            &partition,
            2,
            "data-1.avro",
            "__DEFAULT_PARTITION__",
        );
        assert_eq!(path, "warehouse/db.db/t/dt=2024-01-01/bucket-2/data-1.avro");
    }

    #[test]
    fn null_partition_value_uses_default_name() {
        let partition = vec![FieldValue::Null];
        let path = data_file_path(
            "warehouse/db.db/t",
            &fields(),
            &partition,
            0,
            "data-2.avro",
            "__DEFAULT_PARTITION__",
        );
        assert_eq!(
            path,
            "warehouse/db.db/t/dt=__DEFAULT_PARTITION__/bucket-0/data-2.avro"
        );
    }

    #[test]
    fn unpartitioned_table_skips_partition_segment() {
        let path = data_file_path(
            "warehouse/db.db/t",
            &[],
            &[],
            0,
            "data-3.avro",
            "__DEFAULT_PARTITION__",
        );
        assert_eq!(path, "warehouse/db.db/t/bucket-0/data-3.avro");
    }

    #[test]
    fn decode_partition_round_trips_through_binary_row() {
        let values = vec![FieldValue::Int(7), FieldValue::String("x".to_string())];
        let binary = crate::spec::BinaryRow::from_fields(&values).unwrap();
        let decoded = decode_partition(binary.as_bytes()).unwrap();
        assert_eq!(decoded, values);
    }
}
