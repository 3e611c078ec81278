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

//! The default universal compaction strategy (§4.I).
//!
//! Treats every L0 file as its own "sorted run" and every level `>= 1` as
//! one run, then asks three questions of the run list, oldest-last:
//! are there too many runs, is the oldest run disproportionately large
//! compared to everything younger, and do two adjacent runs have a size
//! ratio worth merging early. The first trigger that fires picks a
//! contiguous suffix (oldest runs) to merge into the next level.

use crate::spec::DataFileMeta;

/// One run considered by the picker: either a single L0 file or the whole
/// sorted run living at a level `>= 1`.
#[derive(Debug, Clone)]
pub struct Run {
    pub level: usize,
    pub files: Vec<DataFileMeta>,
    pub size: u64,
}

/// A chosen compaction: merge `inputs` (oldest-first) and write the result
/// to `output_level`.
#[derive(Debug, Clone)]
pub struct CompactUnit {
    pub output_level: usize,
    pub inputs: Vec<DataFileMeta>,
}

pub struct UniversalCompaction {
    pub max_size_amplification_percent: u32,
    pub size_ratio: u32,
    pub num_sorted_run_compaction_trigger: usize,
}

impl UniversalCompaction {
    pub fn new(max_size_amplification_percent: u32, size_ratio: u32, num_sorted_run_compaction_trigger: usize) -> Self {
        Self {
            max_size_amplification_percent,
            size_ratio,
            num_sorted_run_compaction_trigger,
        }
    }

    /// Decides whether to compact given the current runs (index 0 =
    /// youngest / L0's most recent file, last = oldest). Runs are assumed
    /// already ordered oldest-last the way [`super::levels::Levels::all_files`]
    /// groups them once turned into [`Run`]s by the caller.
    pub fn pick(&self, runs: &[Run], num_levels: usize) -> Option<CompactUnit> {
        if runs.len() < self.num_sorted_run_compaction_trigger
            && !self.size_amplification_exceeded(runs)
            && !self.adjacent_ratio_exceeded(runs)
        {
            return None;
        }
        if runs.is_empty() {
            return None;
        }
        // Merge every run; output lands one level below the oldest input's
        // level (capped at the last level), matching universal compaction's
        // "full merge" behavior for the default trigger shapes above.
        let output_level = runs
            .iter()
            .map(|r| r.level)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
            .min(num_levels.saturating_sub(1));
        let inputs = runs.iter().flat_map(|r| r.files.clone()).collect();
        Some(CompactUnit { output_level, inputs })
    }

    /// Triggers when the oldest run is disproportionately large relative to
    /// the sum of everything younger than it: `oldest * pct/100 <= younger_sum`.
    fn size_amplification_exceeded(&self, runs: &[Run]) -> bool {
        if runs.len() < 2 {
            return false;
        }
        let oldest = runs.last().unwrap().size;
        let younger_sum: u64 = runs[..runs.len() - 1].iter().map(|r| r.size).sum();
        if younger_sum == 0 {
            return false;
        }
        oldest.saturating_mul(self.max_size_amplification_percent as u64) / 100 <= younger_sum
    }

    /// Triggers when two adjacent runs (by age) have a size ratio within
    /// `size_ratio` percent of each other, worth folding together early
    /// rather than waiting for the run-count trigger.
    fn adjacent_ratio_exceeded(&self, runs: &[Run]) -> bool {
        for pair in runs.windows(2) {
            let (younger, older) = (pair[0].size, pair[1].size);
            if younger == 0 {
                continue;
            }
            if older.saturating_mul(100) <= younger.saturating_mul(100 + self.size_ratio as u64) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(level: usize, size: u64) -> Run {
        Run {
            level,
            files: vec![],
            size,
        }
    }

    #[test]
    fn triggers_on_run_count() {
        let strategy = UniversalCompaction::new(200, 1, 3);
        let runs = vec![run(0, 10), run(0, 10), run(0, 10)];
        assert!(strategy.pick(&runs, 5).is_some());
    }

    #[test]
    fn no_trigger_below_thresholds() {
        let strategy = UniversalCompaction::new(200, 1, 5);
        let runs = vec![run(0, 10), run(0, 10)];
        assert!(strategy.pick(&runs, 5).is_none());
    }

    #[test]
    fn triggers_on_size_amplification() {
        let strategy = UniversalCompaction::new(50, 1, 10);
        let runs = vec![run(0, 5), run(1, 100)];
        assert!(strategy.pick(&runs, 5).is_some());
    }
}
