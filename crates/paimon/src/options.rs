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

/*!
 * Table options.
 *
 * Mirrors paimon-java's `CoreOptions`: a string-keyed map with typed,
 * defaulted accessors. Unrecognized but required keys surface
 * [`crate::Error::ConfigInvalid`] at construction time rather than at first use.
 */

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigInvalidSnafu;
use crate::Result;
use snafu::ResultExt;

/// `merge-engine` table option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeEngine {
    #[default]
    Deduplicate,
    PartialUpdate,
    Aggregation,
    /// Selected automatically for tables with no primary key: rows carry a
    /// bigint count rather than a value, merged by [`crate::merge::ValueCountMergeFunction`].
    ValueCount,
}

impl FromStr for MergeEngine {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deduplicate" => Ok(Self::Deduplicate),
            "partial-update" => Ok(Self::PartialUpdate),
            "aggregation" => Ok(Self::Aggregation),
            other => ConfigInvalidSnafu {
                message: format!("unrecognized merge-engine: {other}"),
            }
            .fail(),
        }
    }
}

/// `changelog-producer` table option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangelogProducer {
    #[default]
    None,
    Input,
    Lookup,
    FullCompaction,
}

impl FromStr for ChangelogProducer {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "input" => Ok(Self::Input),
            "lookup" => Ok(Self::Lookup),
            "full-compaction" => Ok(Self::FullCompaction),
            other => ConfigInvalidSnafu {
                message: format!("unrecognized changelog-producer: {other}"),
            }
            .fail(),
        }
    }
}

/// `scan.mode` table option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Default,
    LatestFull,
    Latest,
    CompactedFull,
    FromTimestamp,
    FromSnapshot,
}

impl FromStr for ScanMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Self::Default),
            "latest-full" => Ok(Self::LatestFull),
            "latest" => Ok(Self::Latest),
            "compacted-full" => Ok(Self::CompactedFull),
            "from-timestamp" => Ok(Self::FromTimestamp),
            "from-snapshot" => Ok(Self::FromSnapshot),
            other => ConfigInvalidSnafu {
                message: format!("unrecognized scan.mode: {other}"),
            }
            .fail(),
        }
    }
}

macro_rules! option_key {
    ($const_name:ident, $key:expr) => {
        pub const $const_name: &'static str = $key;
    };
}

/// Table options, a thin typed view over the raw string map persisted in
/// [`crate::spec::TableSchema::options`].
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    raw: HashMap<String, String>,
}

impl TableOptions {
    option_key!(BUCKET, "bucket");
    option_key!(BUCKET_KEY, "bucket-key");
    option_key!(FILE_FORMAT, "file.format");
    option_key!(MANIFEST_FORMAT, "manifest.format");
    option_key!(MANIFEST_TARGET_FILE_SIZE, "manifest.target-file-size");
    option_key!(MANIFEST_MERGE_MIN_COUNT, "manifest.merge-min-count");
    option_key!(WRITE_BUFFER_SIZE, "write-buffer-size");
    option_key!(PAGE_SIZE, "page-size");
    option_key!(WRITE_BUFFER_SPILLABLE, "write-buffer-spillable");
    option_key!(NUM_LEVELS, "num-levels");
    option_key!(NUM_SORTED_RUN_COMPACTION_TRIGGER, "num-sorted-run.compaction-trigger");
    option_key!(NUM_SORTED_RUN_STOP_TRIGGER, "num-sorted-run.stop-trigger");
    option_key!(TARGET_FILE_SIZE, "target-file-size");
    option_key!(SORT_SPILL_THRESHOLD, "sort-spill-threshold");
    option_key!(
        COMPACTION_MAX_SIZE_AMPLIFICATION_PERCENT,
        "compaction.max-size-amplification-percent"
    );
    option_key!(COMPACTION_SIZE_RATIO, "compaction.size-ratio");
    option_key!(MERGE_ENGINE, "merge-engine");
    option_key!(PARTIAL_UPDATE_IGNORE_DELETE, "partial-update.ignore-delete");
    option_key!(SEQUENCE_FIELD, "sequence.field");
    option_key!(CHANGELOG_PRODUCER, "changelog-producer");
    option_key!(
        CHANGELOG_PRODUCER_COMPACTION_INTERVAL,
        "changelog-producer.compaction-interval"
    );
    option_key!(SNAPSHOT_TIME_RETAINED, "snapshot.time-retained");
    option_key!(SNAPSHOT_NUM_RETAINED_MIN, "snapshot.num-retained.min");
    option_key!(SNAPSHOT_NUM_RETAINED_MAX, "snapshot.num-retained.max");
    option_key!(PARTITION_EXPIRATION_TIME, "partition.expiration-time");
    option_key!(
        PARTITION_EXPIRATION_CHECK_INTERVAL,
        "partition.expiration-check-interval"
    );
    option_key!(PARTITION_TIMESTAMP_PATTERN, "partition.timestamp-pattern");
    option_key!(PARTITION_TIMESTAMP_FORMATTER, "partition.timestamp-formatter");
    option_key!(PARTITION_DEFAULT_NAME, "partition.default-name");
    option_key!(SCAN_MODE, "scan.mode");
    option_key!(SCAN_TIMESTAMP_MILLIS, "scan.timestamp-millis");
    option_key!(SCAN_SNAPSHOT_ID, "scan.snapshot-id");
    option_key!(CONTINUOUS_DISCOVERY_INTERVAL, "continuous.discovery-interval");
    option_key!(WRITE_ONLY, "write-only");
    option_key!(COMMIT_FORCE_COMPACT, "commit.force-compact");

    pub fn new(raw: HashMap<String, String>) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &HashMap<String, String> {
        &self.raw
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.parse::<T>().map_err(|e| {
                crate::Error::ConfigInvalid {
                    message: format!("invalid value '{v}' for option '{key}': {e}"),
                }
            }),
        }
    }

    pub fn bucket(&self) -> Result<i32> {
        self.get_parsed(Self::BUCKET, -1)
    }

    pub fn bucket_key(&self) -> Vec<String> {
        self.get(Self::BUCKET_KEY)
            .filter(|s| !s.is_empty())
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn file_format(&self) -> String {
        self.get(Self::FILE_FORMAT).unwrap_or("avro").to_string()
    }

    pub fn manifest_format(&self) -> String {
        self.get(Self::MANIFEST_FORMAT).unwrap_or("avro").to_string()
    }

    pub fn manifest_target_file_size(&self) -> Result<u64> {
        self.get_parsed(Self::MANIFEST_TARGET_FILE_SIZE, 8 * 1024 * 1024)
    }

    pub fn manifest_merge_min_count(&self) -> Result<usize> {
        self.get_parsed(Self::MANIFEST_MERGE_MIN_COUNT, 30)
    }

    pub fn write_buffer_size(&self) -> Result<u64> {
        self.get_parsed(Self::WRITE_BUFFER_SIZE, 64 * 1024 * 1024)
    }

    pub fn page_size(&self) -> Result<u64> {
        self.get_parsed(Self::PAGE_SIZE, 64 * 1024)
    }

    pub fn write_buffer_spillable(&self) -> Result<bool> {
        self.get_parsed(Self::WRITE_BUFFER_SPILLABLE, false)
    }

    pub fn num_levels(&self) -> Result<i32> {
        self.get_parsed(Self::NUM_LEVELS, 5)
    }

    pub fn num_sorted_run_compaction_trigger(&self) -> Result<usize> {
        self.get_parsed(Self::NUM_SORTED_RUN_COMPACTION_TRIGGER, 5)
    }

    pub fn num_sorted_run_stop_trigger(&self) -> Result<usize> {
        let trigger = self.num_sorted_run_compaction_trigger()?;
        self.get_parsed(Self::NUM_SORTED_RUN_STOP_TRIGGER, trigger + 3)
    }

    pub fn target_file_size(&self) -> Result<u64> {
        self.get_parsed(Self::TARGET_FILE_SIZE, 128 * 1024 * 1024)
    }

    pub fn sort_spill_threshold(&self) -> Result<Option<usize>> {
        match self.get(Self::SORT_SPILL_THRESHOLD) {
            None => Ok(None),
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .context(ConfigInvalidSnafu {
                    message: format!("invalid sort-spill-threshold: {v}"),
                })
                .map_err(Into::into),
        }
    }

    pub fn compaction_max_size_amplification_percent(&self) -> Result<u32> {
        self.get_parsed(Self::COMPACTION_MAX_SIZE_AMPLIFICATION_PERCENT, 200)
    }

    pub fn compaction_size_ratio(&self) -> Result<u32> {
        self.get_parsed(Self::COMPACTION_SIZE_RATIO, 1)
    }

    pub fn merge_engine(&self) -> Result<MergeEngine> {
        match self.get(Self::MERGE_ENGINE) {
            None => Ok(MergeEngine::default()),
            Some(v) => v.parse(),
        }
    }

    pub fn partial_update_ignore_delete(&self) -> Result<bool> {
        self.get_parsed(Self::PARTIAL_UPDATE_IGNORE_DELETE, false)
    }

    pub fn sequence_field(&self) -> Option<String> {
        self.get(Self::SEQUENCE_FIELD).map(str::to_string)
    }

    pub fn changelog_producer(&self) -> Result<ChangelogProducer> {
        match self.get(Self::CHANGELOG_PRODUCER) {
            None => Ok(ChangelogProducer::default()),
            Some(v) => v.parse(),
        }
    }

    pub fn changelog_producer_compaction_interval(&self) -> Duration {
        self.get(Self::CHANGELOG_PRODUCER_COMPACTION_INTERVAL)
            .and_then(|v| humantime_like_parse(v))
            .unwrap_or(Duration::from_secs(30 * 60))
    }

    pub fn snapshot_time_retained(&self) -> Duration {
        self.get(Self::SNAPSHOT_TIME_RETAINED)
            .and_then(|v| humantime_like_parse(v))
            .unwrap_or(Duration::from_secs(3600))
    }

    pub fn snapshot_num_retained_min(&self) -> Result<u64> {
        self.get_parsed(Self::SNAPSHOT_NUM_RETAINED_MIN, 10)
    }

    pub fn snapshot_num_retained_max(&self) -> Result<u64> {
        self.get_parsed(Self::SNAPSHOT_NUM_RETAINED_MAX, i32::MAX as u64)
    }

    pub fn partition_expiration_time(&self) -> Option<Duration> {
        self.get(Self::PARTITION_EXPIRATION_TIME)
            .and_then(humantime_like_parse)
    }

    pub fn partition_expiration_check_interval(&self) -> Duration {
        self.get(Self::PARTITION_EXPIRATION_CHECK_INTERVAL)
            .and_then(humantime_like_parse)
            .unwrap_or(Duration::from_secs(3600))
    }

    pub fn partition_timestamp_pattern(&self) -> Option<String> {
        self.get(Self::PARTITION_TIMESTAMP_PATTERN).map(str::to_string)
    }

    pub fn partition_timestamp_formatter(&self) -> String {
        self.get(Self::PARTITION_TIMESTAMP_FORMATTER)
            .unwrap_or("yyyy-MM-dd")
            .to_string()
    }

    pub fn partition_default_name(&self) -> String {
        self.get(Self::PARTITION_DEFAULT_NAME)
            .unwrap_or("__DEFAULT_PARTITION__")
            .to_string()
    }

    pub fn scan_mode(&self) -> Result<ScanMode> {
        match self.get(Self::SCAN_MODE) {
            None => Ok(ScanMode::default()),
            Some(v) => v.parse(),
        }
    }

    pub fn scan_timestamp_millis(&self) -> Result<Option<i64>> {
        match self.get(Self::SCAN_TIMESTAMP_MILLIS) {
            None => Ok(None),
            Some(v) => v.parse::<i64>().map(Some).map_err(|e| crate::Error::ConfigInvalid {
                message: format!("invalid scan.timestamp-millis '{v}': {e}"),
            }),
        }
    }

    pub fn scan_snapshot_id(&self) -> Result<Option<i64>> {
        match self.get(Self::SCAN_SNAPSHOT_ID) {
            None => Ok(None),
            Some(v) => v.parse::<i64>().map(Some).map_err(|e| crate::Error::ConfigInvalid {
                message: format!("invalid scan.snapshot-id '{v}': {e}"),
            }),
        }
    }

    pub fn continuous_discovery_interval(&self) -> Duration {
        self.get(Self::CONTINUOUS_DISCOVERY_INTERVAL)
            .and_then(humantime_like_parse)
            .unwrap_or(Duration::from_secs(10))
    }

    pub fn write_only(&self) -> Result<bool> {
        self.get_parsed(Self::WRITE_ONLY, false)
    }

    pub fn commit_force_compact(&self) -> Result<bool> {
        self.get_parsed(Self::COMMIT_FORCE_COMPACT, false)
    }

    /// `fields.<name>.aggregate-function`: the named aggregator the
    /// `aggregation` merge engine applies to one non-key field. Absent for
    /// fields that fall back to last-value semantics (§6).
    pub fn field_aggregate_function(&self, field_name: &str) -> Result<Option<String>> {
        Ok(self
            .get(&format!("fields.{field_name}.aggregate-function"))
            .map(str::to_string))
    }

    /// `fields.<name>.ignore-retract`: whether the named field's aggregator
    /// ignores retractions (`-U`/`-D`) rather than folding them in. Only
    /// `sum` honors retractions by default; this lets a table opt a `sum`
    /// field back out (§6).
    pub fn field_ignore_retract(&self, field_name: &str) -> Result<bool> {
        self.get_parsed(&format!("fields.{field_name}.ignore-retract"), false)
    }
}

/// Parses durations of the form `30s`, `10 min`, `1h`, falling back to a bare
/// integer meaning seconds. Deliberately small: full calendar-aware duration
/// parsing belongs to an options DSL outside the scope of this crate.
fn humantime_like_parse(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (num, unit) = raw.split_at(raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len()));
    let num: u64 = num.parse().ok()?;
    let secs = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" => num,
        "min" | "m" | "mins" => num * 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => num * 3600,
        "d" | "day" | "days" => num * 86400,
        "ms" => return Some(Duration::from_millis(num)),
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> TableOptions {
        TableOptions::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_are_applied() {
        let opts = TableOptions::default();
        assert_eq!(opts.num_levels().unwrap(), 5);
        assert_eq!(opts.num_sorted_run_compaction_trigger().unwrap(), 5);
        assert_eq!(opts.num_sorted_run_stop_trigger().unwrap(), 8);
        assert_eq!(opts.merge_engine().unwrap(), MergeEngine::Deduplicate);
        assert_eq!(opts.changelog_producer().unwrap(), ChangelogProducer::None);
    }

    #[test]
    fn parses_merge_engine_and_changelog_producer() {
        let opts = options(&[
            ("merge-engine", "partial-update"),
            ("changelog-producer", "lookup"),
        ]);
        assert_eq!(opts.merge_engine().unwrap(), MergeEngine::PartialUpdate);
        assert_eq!(opts.changelog_producer().unwrap(), ChangelogProducer::Lookup);
    }

    #[test]
    fn rejects_unrecognized_enum_value() {
        let opts = options(&[("merge-engine", "bogus")]);
        assert!(opts.merge_engine().is_err());
    }

    #[test]
    fn parses_duration_like_options() {
        let opts = options(&[("snapshot.time-retained", "2h")]);
        assert_eq!(opts.snapshot_time_retained(), Duration::from_secs(7200));
    }

    #[test]
    fn bucket_key_splits_csv() {
        let opts = options(&[("bucket-key", "a, b,c")]);
        assert_eq!(opts.bucket_key(), vec!["a", "b", "c"]);
    }
}
