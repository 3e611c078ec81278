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

//! Per-bucket sorted-run bookkeeping (§4.I).
//!
//! `L0` holds the files a flush appends directly: each is its own sorted
//! run and runs may overlap in key range. `L >= 1` holds exactly one sorted
//! run per level: its files are kept in key order and never overlap.

use crate::spec::DataFileMeta;

#[derive(Debug, Default)]
pub struct Levels {
    /// `levels[0]` is L0 (one run per file); `levels[n]` for `n >= 1` holds
    /// the single sorted run living at level `n`, file-ordered by key.
    levels: Vec<Vec<DataFileMeta>>,
}

impl Levels {
    pub fn new(num_levels: usize) -> Self {
        Self {
            levels: vec![Vec::new(); num_levels.max(1)],
        }
    }

    /// Rebuilds levels from a bucket's files as restored from a snapshot,
    /// grouping by each file's own `level` field (§4.I "Restart").
    pub fn restore(num_levels: usize, files: Vec<DataFileMeta>) -> Self {
        let mut levels = Self::new(num_levels);
        for file in files {
            let level = (file.level as usize).min(levels.levels.len() - 1);
            levels.levels[level].push(file);
        }
        for run in levels.levels.iter_mut().skip(1) {
            run.sort_by(|a, b| a.min_key.cmp(&b.min_key));
        }
        levels
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn files(&self, level: usize) -> &[DataFileMeta] {
        self.levels.get(level).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn l0_run_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Every run across every level, L0 first (youngest), oldest levels
    /// last, the order universal compaction scans them in.
    pub fn all_files(&self) -> Vec<&DataFileMeta> {
        self.levels.iter().flatten().collect()
    }

    pub fn add_l0_file(&mut self, file: DataFileMeta) {
        self.levels[0].push(file);
    }

    /// Total size, in bytes, of the run at `level` (L0's "runs" are
    /// individual files; other levels are already one run).
    pub fn run_size(&self, level: usize) -> u64 {
        self.files(level).iter().map(|f| f.file_size as u64).sum()
    }

    /// Replaces the input files (found anywhere in the levels) with the
    /// compaction's output run at `output_level`, used once a compaction
    /// completes.
    pub fn replace_after_compaction(
        &mut self,
        output_level: usize,
        inputs: &[DataFileMeta],
        mut outputs: Vec<DataFileMeta>,
    ) {
        let input_names: std::collections::HashSet<&str> =
            inputs.iter().map(|f| f.file_name.as_str()).collect();
        for run in self.levels.iter_mut() {
            run.retain(|f| !input_names.contains(f.file_name.as_str()));
        }
        outputs.sort_by(|a, b| a.min_key.cmp(&b.min_key));
        let level = output_level.min(self.levels.len() - 1);
        self.levels[level].extend(outputs);
        self.levels[level].sort_by(|a, b| a.min_key.cmp(&b.min_key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::BinaryRow;
    use chrono::Utc;

    fn file(name: &str, level: i32) -> DataFileMeta {
        DataFileMeta {
            file_name: name.to_string(),
            file_size: 100,
            row_count: 10,
            min_key: BinaryRow::new(0),
            max_key: BinaryRow::new(0),
            key_stats: crate::spec::BinaryTableStats::new(vec![], vec![], vec![]),
            value_stats: crate::spec::BinaryTableStats::new(vec![], vec![], vec![]),
            min_sequence_number: 0,
            max_sequence_number: 0,
            schema_id: 0,
            level,
            extra_files: vec![],
            creation_time: Utc::now(),
            delete_row_count: None,
            embedded_index: None,
            file_source: None,
        }
    }

    #[test]
    fn restore_groups_files_by_level() {
        let levels = Levels::restore(3, vec![file("a", 0), file("b", 1), file("c", 0)]);
        assert_eq!(levels.files(0).len(), 2);
        assert_eq!(levels.files(1).len(), 1);
    }

    #[test]
    fn compaction_replaces_inputs_with_outputs() {
        let mut levels = Levels::new(3);
        levels.add_l0_file(file("a", 0));
        levels.add_l0_file(file("b", 0));
        let inputs: Vec<DataFileMeta> = levels.files(0).to_vec();
        levels.replace_after_compaction(1, &inputs, vec![file("merged", 1)]);
        assert_eq!(levels.files(0).len(), 0);
        assert_eq!(levels.files(1).len(), 1);
        assert_eq!(levels.files(1)[0].file_name, "merged");
    }
}
