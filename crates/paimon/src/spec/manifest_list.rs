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

use super::manifest_file_meta::{ManifestFileMeta, AVRO_SCHEMA};
use crate::io::FileIO;
use crate::{Error, Result};
use apache_avro::types::Value;
use apache_avro::{from_value, Reader, Schema, Writer};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// This file includes several [`ManifestFileMeta`], representing all data of the whole table at the corresponding snapshot.
pub struct ManifestList {
    entries: Vec<ManifestFileMeta>,
}

impl ManifestList {
    pub fn entries(&self) -> &Vec<ManifestFileMeta> {
        &self.entries
    }

    pub fn from_avro_bytes(bytes: &[u8]) -> Result<ManifestList> {
        let reader = Reader::new(bytes).map_err(Error::from)?;
        let records = reader
            .collect::<std::result::Result<Vec<Value>, _>>()
            .map_err(Error::from)?;
        let values = Value::Array(records);
        from_value::<ManifestList>(&values).map_err(Error::from)
    }

    /// Encodes `metas` as an avro object container file, one record per
    /// entry, matching the format [`ManifestList::from_avro_bytes`] reads.
    pub fn to_avro_bytes(metas: &[ManifestFileMeta]) -> Result<Vec<u8>> {
        let schema = Schema::parse_str(AVRO_SCHEMA).map_err(Error::from)?;
        let mut writer = Writer::new(&schema, Vec::new());
        for meta in metas {
            writer.append_ser(meta).map_err(Error::from)?;
        }
        writer.into_inner().map_err(Error::from)
    }
}

/// Reads and writes manifest-list files (§4.D). A manifest list is a flat
/// sequence of [`ManifestFileMeta`] encoded as an avro object container
/// file; writing one always goes to a fresh, UUID-named path, since a
/// snapshot's manifest list is never mutated in place once published.
pub struct ManifestListFactory {
    file_io: FileIO,
}

impl ManifestListFactory {
    pub fn new(file_io: FileIO) -> ManifestListFactory {
        Self { file_io }
    }

    /// Writes several [`ManifestFileMeta`]s into a freshly named manifest
    /// list file under `dir` and returns the file name (not the full path),
    /// matching paimon-java's `ManifestList.write`.
    pub async fn write(&self, dir: &str, metas: Vec<ManifestFileMeta>) -> Result<String> {
        let file_name = format!("manifest-list-{}", Uuid::new_v4());
        let bytes = ManifestList::to_avro_bytes(&metas)?;
        let path = format!("{}/{}", dir.trim_end_matches('/'), file_name);
        self.file_io.new_output(&path)?.write(Bytes::from(bytes)).await?;
        Ok(file_name)
    }

    /// Read [`ManifestList`] from the manifest file.
    pub async fn read(&self, path: &str) -> Result<ManifestList> {
        let bs = self.file_io.new_input(path)?.read().await?;
        ManifestList::from_avro_bytes(bs.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FileIO;
    use crate::spec::BinaryTableStats;
    use std::collections::HashMap;

    fn sample_metas() -> Vec<ManifestFileMeta> {
        let value_bytes = vec![
            0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 49, 0, 0, 0, 0, 0, 0, 129,
        ];
        vec![
            ManifestFileMeta::new(
                "manifest-19d138df-233f-46f7-beb6-fadaf4741c0e".to_string(),
                10,
                10,
                10,
                BinaryTableStats::new(value_bytes.clone(), value_bytes.clone(), vec![1, 2]),
                1,
            ),
            ManifestFileMeta::new(
                "manifest-a703ee48-c411-413e-b84e-c03bdb179631".to_string(),
                11,
                0,
                10,
                BinaryTableStats::new(value_bytes.clone(), value_bytes.clone(), vec![1, 2]),
                2,
            ),
        ]
    }

    #[test]
    fn avro_round_trip_preserves_entries() {
        let metas = sample_metas();
        let bytes = ManifestList::to_avro_bytes(&metas).unwrap();
        let decoded = ManifestList::from_avro_bytes(&bytes).unwrap();
        assert_eq!(decoded, ManifestList { entries: metas });
    }

    #[tokio::test]
    async fn write_then_read_round_trips_through_file_io() {
        let file_io = FileIO::new(HashMap::from([(
            "scheme".to_string(),
            "memory".to_string(),
        )]))
        .unwrap();
        let factory = ManifestListFactory::new(file_io);
        let metas = sample_metas();

        let file_name = factory.write("manifest", metas.clone()).await.unwrap();
        let read_back = factory
            .read(&format!("manifest/{file_name}"))
            .await
            .unwrap();

        assert_eq!(read_back.entries, metas);
    }
}
