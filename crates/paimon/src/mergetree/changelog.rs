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

//! Changelog producers (§4.I): turn a flush or compaction into the stream
//! of `+I`/`-U`/`+U`/`-D` records a streaming reader observes, independent
//! of whatever the LSM tree itself stores.

use crate::merge::KeyValue;
use crate::options::ChangelogProducer;
use crate::spec::{Row, RowKind};

/// `changelog-producer = input`: every record handed to the writer is also
/// emitted verbatim, unchanged, as the changelog for this commit.
pub fn input_changelog(incoming: &[KeyValue]) -> Vec<KeyValue> {
    incoming.to_vec()
}

/// `changelog-producer = lookup`: for each key newly written at L0, probe
/// `lookup` for the value that key held *before* this write (typically by
/// searching higher levels) and diff against it.
pub fn lookup_changelog(
    incoming: &[KeyValue],
    mut lookup: impl FnMut(&Row) -> Option<Row>,
) -> Vec<KeyValue> {
    let mut out = Vec::new();
    for kv in incoming {
        let before = lookup(&kv.key);
        match (before, kv.kind.is_add()) {
            (Some(old), true) => {
                out.push(KeyValue::new(kv.key.clone(), kv.sequence_number, RowKind::UpdateBefore, old));
                out.push(KeyValue::new(kv.key.clone(), kv.sequence_number, RowKind::UpdateAfter, kv.value.clone()));
            }
            (None, true) => {
                out.push(KeyValue::new(kv.key.clone(), kv.sequence_number, RowKind::Insert, kv.value.clone()));
            }
            (Some(old), false) => {
                out.push(KeyValue::new(kv.key.clone(), kv.sequence_number, RowKind::Delete, old));
            }
            (None, false) => {
                // Deleting a key with no prior value is a no-op for the
                // changelog stream.
            }
        }
    }
    out
}

/// `changelog-producer = full-compaction`: diffs the fully-merged state of
/// a key range before and after a forced full compaction. Both inputs MUST
/// already be sorted by key (the shape a merge-tree full merge produces).
pub fn full_compaction_changelog(before: &[(Row, Row)], after: &[(Row, Row)]) -> Vec<KeyValue> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < before.len() || j < after.len() {
        match (before.get(i), after.get(j)) {
            (Some((bk, bv)), Some((ak, av))) => match bk.0.cmp(&ak.0) {
                std::cmp::Ordering::Less => {
                    out.push(KeyValue::new(bk.clone(), 0, RowKind::Delete, bv.clone()));
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(KeyValue::new(ak.clone(), 0, RowKind::Insert, av.clone()));
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    if bv != av {
                        out.push(KeyValue::new(bk.clone(), 0, RowKind::UpdateBefore, bv.clone()));
                        out.push(KeyValue::new(ak.clone(), 0, RowKind::UpdateAfter, av.clone()));
                    }
                    i += 1;
                    j += 1;
                }
            },
            (Some((bk, bv)), None) => {
                out.push(KeyValue::new(bk.clone(), 0, RowKind::Delete, bv.clone()));
                i += 1;
            }
            (None, Some((ak, av))) => {
                out.push(KeyValue::new(ak.clone(), 0, RowKind::Insert, av.clone()));
                j += 1;
            }
            (None, None) => break,
        }
    }
    out
}

/// Computes the changelog for one write-buffer flush given the table's
/// configured producer. `None`/`Input` need nothing but the incoming
/// records; `Lookup`/`FullCompaction` are driven by the writer, which has
/// access to the levels needed to look up prior values.
pub fn producer_needs_lookup(producer: ChangelogProducer) -> bool {
    matches!(producer, ChangelogProducer::Lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldValue;

    fn row(v: i32) -> Row {
        Row::new(vec![FieldValue::Int(v)])
    }

    #[test]
    fn input_changelog_passes_through() {
        let incoming = vec![KeyValue::new(row(1), 0, RowKind::Insert, row(10))];
        assert_eq!(input_changelog(&incoming), incoming);
    }

    #[test]
    fn lookup_changelog_emits_update_pair_for_existing_key() {
        let incoming = vec![KeyValue::new(row(1), 5, RowKind::UpdateAfter, row(99))];
        let out = lookup_changelog(&incoming, |_| Some(row(10)));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, RowKind::UpdateBefore);
        assert_eq!(out[1].kind, RowKind::UpdateAfter);
    }

    #[test]
    fn lookup_changelog_emits_insert_for_new_key() {
        let incoming = vec![KeyValue::new(row(1), 5, RowKind::Insert, row(99))];
        let out = lookup_changelog(&incoming, |_| None);
        assert_eq!(out, vec![KeyValue::new(row(1), 5, RowKind::Insert, row(99))]);
    }

    #[test]
    fn full_compaction_changelog_diffs_sorted_ranges() {
        let before = vec![(row(1), row(1)), (row(2), row(2))];
        let after = vec![(row(1), row(1)), (row(2), row(20)), (row(3), row(3))];
        let out = full_compaction_changelog(&before, &after);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].kind, RowKind::UpdateBefore);
        assert_eq!(out[1].kind, RowKind::UpdateAfter);
        assert_eq!(out[2].kind, RowKind::Insert);
    }
}
