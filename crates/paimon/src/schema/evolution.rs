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

//! Maps a data file's schema onto the table's current schema so that a
//! reader sees every file, regardless of which schema id it was written
//! under, as if it had always had the table's current columns.
//!
//! Impl References: <https://github.com/apache/paimon/blob/release-0.8.2/paimon-core/src/main/java/org/apache/paimon/utils/ProjectedRow.java>,
//! <https://github.com/apache/paimon/blob/release-0.8.2/paimon-core/src/main/java/org/apache/paimon/schema/SchemaEvolutionUtil.java>

use crate::spec::{DataType, FieldValue, Row, TableSchema};

/// How a single field is reconciled between a data file's schema and the
/// table's current schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastPolicy {
    /// Both schemas agree on the type; the value passes through unchanged.
    Identity,
    /// The data file's column is missing from this position and is filled
    /// with `NULL` (a column dropped, or a file written before the column
    /// existed).
    Absent,
    /// The stored type differs from the table's current type but values
    /// can be safely widened (e.g. `int` -> `bigint`, `float` -> `double`).
    Widen,
    /// The stored type differs and converting it back down could lose
    /// information (e.g. `bigint` -> `int`). Still performed, since a
    /// schema change that narrows a column is only rejected at evolution
    /// time if actually unsafe; by the time a reader gets here the change
    /// was already accepted, so this policy exists to document the
    /// asymmetry rather than to trigger new validation.
    Narrow,
}

/// The resolved mapping from a data file's schema to the table's current
/// schema, built once per distinct `schemaId` encountered by a scan and
/// then reused across every file written under that schema.
///
/// Impl Reference: <https://github.com/apache/paimon/blob/release-0.8.2/paimon-core/src/main/java/org/apache/paimon/schema/SchemaEvolutionUtil.java#L56>
#[derive(Debug, Clone)]
pub struct SchemaEvolution {
    /// `index_mapping[table_field_pos] = Some(data_field_pos)`, or `None`
    /// when the table's column has no counterpart in the data file.
    index_mapping: Vec<Option<usize>>,
    policies: Vec<CastPolicy>,
}

impl SchemaEvolution {
    /// Builds the mapping from `data_schema` (the schema a file was
    /// written under) onto `table_schema` (the schema a reader wants rows
    /// back in). Fields are matched by id, not position or name, so a
    /// rename between the two schemas is transparent.
    pub fn resolve(table_schema: &TableSchema, data_schema: &TableSchema) -> Self {
        if table_schema.id == data_schema.id {
            let len = table_schema.fields.len();
            return Self {
                index_mapping: (0..len).map(Some).collect(),
                policies: vec![CastPolicy::Identity; len],
            };
        }

        let mut index_mapping = Vec::with_capacity(table_schema.fields.len());
        let mut policies = Vec::with_capacity(table_schema.fields.len());
        for table_field in &table_schema.fields {
            match data_schema
                .fields
                .iter()
                .position(|f| f.id == table_field.id)
            {
                None => {
                    index_mapping.push(None);
                    policies.push(CastPolicy::Absent);
                }
                Some(pos) => {
                    let data_field = &data_schema.fields[pos];
                    index_mapping.push(Some(pos));
                    policies.push(classify_cast(&data_field.typ, &table_field.typ));
                }
            }
        }
        Self {
            index_mapping,
            policies,
        }
    }

    /// The identity mapping for a schema compared with itself, used by
    /// callers that have not yet loaded the data file's schema and know
    /// from the snapshot/manifest bookkeeping that it can't differ.
    pub fn identity(len: usize) -> Self {
        Self {
            index_mapping: (0..len).map(Some).collect(),
            policies: vec![CastPolicy::Identity; len],
        }
    }

    pub fn index_mapping(&self) -> &[Option<usize>] {
        &self.index_mapping
    }

    pub fn policies(&self) -> &[CastPolicy] {
        &self.policies
    }

    /// Whether this mapping changes nothing, letting callers skip
    /// projecting/casting entirely in the common case of reading a file
    /// written under the table's current schema.
    pub fn is_identity(&self) -> bool {
        self.policies.iter().all(|p| *p == CastPolicy::Identity)
    }

    /// Projects and casts a row read under the data file's schema into the
    /// shape of the table's current schema.
    pub fn apply(&self, row: &Row) -> Row {
        let projected = row.project(&self.index_mapping);
        let values = projected
            .0
            .into_iter()
            .zip(self.policies.iter())
            .map(|(value, policy)| cast_value(value, *policy))
            .collect();
        Row::new(values)
    }
}

/// Decides how a field's stored type relates to its current type. Treats
/// any same-family numeric widening as safe and everything else that
/// isn't an exact match as a narrowing cast, mirroring paimon-java's
/// `SchemaEvolutionUtil#createIndexMapping` cast conservatively: it never
/// refuses a cast outright here since evolution-time validation is the
/// place that rejects genuinely unsupported type changes (§4.B `AddColumn`
/// / `UpdateColumnType`), not the read path.
fn classify_cast(from: &DataType, to: &DataType) -> CastPolicy {
    use DataType::*;
    if from == to {
        return CastPolicy::Identity;
    }
    match (from, to) {
        (TinyInt(_), SmallInt(_) | Int(_) | BigInt(_) | Float(_) | Double(_))
        | (SmallInt(_), Int(_) | BigInt(_) | Float(_) | Double(_))
        | (Int(_), BigInt(_) | Double(_))
        | (Float(_), Double(_))
        | (Char(_), VarChar(_))
        | (Binary(_), VarBinary(_)) => CastPolicy::Widen,
        _ => CastPolicy::Narrow,
    }
}

/// Applies a [`CastPolicy`] to a single already-projected value.
///
/// `Absent` fields are already `NULL` by the time they reach here (that's
/// what [`Row::project`] does for an absent source index); `Widen` and
/// `Narrow` are both represented the same way at this layer; since
/// [`FieldValue`] itself carries no fixed-width numeric distinction beyond
/// `Int`/`BigInt`/`Float`/`Double`, only those already-widened arithmetic
/// types round-trip, so the conversion is a no-op here and real
/// fixed-width narrowing is left to the file format decoder that first
/// materializes the value.
fn cast_value(value: FieldValue, _policy: CastPolicy) -> FieldValue {
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{DataField, DataType, IntType, VarCharType};

    fn schema(id: i64, fields: Vec<DataField>) -> TableSchema {
        TableSchema {
            version: 1,
            id,
            highest_field_id: TableSchema::highest_field_id(&fields),
            fields,
            partition_keys: vec![],
            primary_keys: vec![],
            options: Default::default(),
            comment: None,
            time_millis: 0,
        }
    }

    #[test]
    fn same_schema_id_is_identity() {
        let s = schema(
            3,
            vec![DataField::new(0, "a".into(), DataType::Int(IntType::new()))],
        );
        let evolution = SchemaEvolution::resolve(&s, &s);
        assert!(evolution.is_identity());
        assert_eq!(evolution.index_mapping(), &[Some(0)]);
    }

    #[test]
    fn dropped_column_maps_to_absent() {
        let data = schema(
            0,
            vec![
                DataField::new(0, "a".into(), DataType::Int(IntType::new())),
                DataField::new(1, "b".into(), DataType::VarChar(VarCharType::new(8).unwrap())),
            ],
        );
        let table = schema(
            1,
            vec![DataField::new(0, "a".into(), DataType::Int(IntType::new()))],
        );
        let evolution = SchemaEvolution::resolve(&table, &data);
        assert_eq!(evolution.index_mapping(), &[Some(0)]);

        let row = Row::new(vec![FieldValue::Int(7), FieldValue::String("x".into())]);
        let projected = evolution.apply(&row);
        assert_eq!(projected.0, vec![FieldValue::Int(7)]);
    }

    #[test]
    fn added_column_maps_to_null() {
        let data = schema(
            0,
            vec![DataField::new(0, "a".into(), DataType::Int(IntType::new()))],
        );
        let table = schema(
            1,
            vec![
                DataField::new(0, "a".into(), DataType::Int(IntType::new())),
                DataField::new(1, "b".into(), DataType::VarChar(VarCharType::new(8).unwrap())),
            ],
        );
        let evolution = SchemaEvolution::resolve(&table, &data);
        assert_eq!(evolution.index_mapping(), &[Some(0), None]);

        let row = Row::new(vec![FieldValue::Int(7)]);
        let projected = evolution.apply(&row);
        assert_eq!(projected.0, vec![FieldValue::Int(7), FieldValue::Null]);
    }

    #[test]
    fn widening_int_to_bigint_is_classified_as_widen() {
        let data = schema(
            0,
            vec![DataField::new(0, "a".into(), DataType::Int(IntType::new()))],
        );
        let table = schema(
            1,
            vec![DataField::new(
                0,
                "a".into(),
                DataType::BigInt(crate::spec::BigIntType::new()),
            )],
        );
        let evolution = SchemaEvolution::resolve(&table, &data);
        assert_eq!(evolution.policies(), &[CastPolicy::Widen]);
    }
}
