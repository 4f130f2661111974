//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rowflow.
//! The Rowflow project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # DynamicField Processor
//!
//! Pivot: turns an entity-attribute-value layout into real typed fields on
//! the primary row. Two nested pipelines feed it:
//!
//! - **field definitions**: read eagerly and entirely on the first pull; each
//!   row declares (fieldId, fieldName, fieldType, fieldValueColumn). Their
//!   read order fixes the left-to-right order of pivoted fields on every
//!   output row, regardless of the order values arrive in.
//! - **field values**: consumed in sorted-merge lockstep with the primary
//!   stream. Each values row names a fieldId and carries the actual value in
//!   the column the matching definition points at.
//!
//! A values row whose fieldId has no definition is a Type error; a definition
//! without a type column defaults to String. The per-definition value-column
//! pointer has a deprecated fallback: an ordered candidate column list, first
//! non-null wins, consulted only when the definition carries no pointer.
//!
//! Join mode matches Merge: outer (default) emits unmatched primary rows with
//! the pivoted fields simply absent, inner drops them. The definitions cache
//! is private to one stream instance.

use std::collections::HashMap;

use crate::context::FlowContext;
use crate::datatype::DataType;
use crate::errors::{FlowError, Result};
use crate::pipeline::SourcePipeline;
use crate::processors::correlate::{JoinMode, KeySpec, SecondaryCursor};
use crate::row::DataRow;
use crate::stream::{collect, BoxRowStream, RowStream};
use crate::value::Value;

const DEFAULT_ID_COLUMN: &str = "fieldId";
const DEFAULT_NAME_COLUMN: &str = "fieldName";
const DEFAULT_TYPE_COLUMN: &str = "fieldType";
const DEFAULT_VALUE_COLUMN_COLUMN: &str = "fieldValueColumn";

/// Pivots a definitions-plus-values child relation into typed primary fields.
#[derive(Clone, Debug)]
pub struct DynamicFieldDef {
    parent_keys: KeySpec,
    values_keys: KeySpec,
    field_defns: SourcePipeline,
    field_values: SourcePipeline,
    mode: JoinMode,
    case_insensitive: bool,
    /// Column names inside the definitions feed.
    defn_id_column: String,
    defn_name_column: String,
    defn_type_column: String,
    defn_value_column_column: String,
    /// Column naming the fieldId inside each values row.
    values_id_column: String,
    /// Deprecated: ordered candidate value columns, first non-null wins,
    /// consulted only when a definition carries no value-column pointer.
    fallback_value_columns: Vec<String>,
}

impl DynamicFieldDef {
    pub fn new(
        parent_keys: KeySpec,
        values_keys: KeySpec,
        field_defns: SourcePipeline,
        field_values: SourcePipeline,
    ) -> Result<Self> {
        if parent_keys.len() != values_keys.len() {
            return Err(FlowError::configuration(format!(
                "dynamic_field parent key has {} columns but values key has {}",
                parent_keys.len(),
                values_keys.len()
            )));
        }
        Ok(DynamicFieldDef {
            parent_keys,
            values_keys,
            field_defns,
            field_values,
            mode: JoinMode::default(),
            case_insensitive: false,
            defn_id_column: DEFAULT_ID_COLUMN.to_string(),
            defn_name_column: DEFAULT_NAME_COLUMN.to_string(),
            defn_type_column: DEFAULT_TYPE_COLUMN.to_string(),
            defn_value_column_column: DEFAULT_VALUE_COLUMN_COLUMN.to_string(),
            values_id_column: DEFAULT_ID_COLUMN.to_string(),
            fallback_value_columns: Vec::new(),
        })
    }

    pub fn with_mode(mut self, mode: JoinMode) -> Self {
        self.mode = mode;
        self
    }

    /// Case-insensitive column and field-name matching.
    pub fn with_case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Renames the columns read from the definitions feed.
    pub fn with_defn_columns(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        self.defn_id_column = id.into();
        self.defn_name_column = name.into();
        self.defn_type_column = data_type.into();
        self.defn_value_column_column = value_column.into();
        self
    }

    /// Renames the fieldId column read from each values row.
    pub fn with_values_id_column(mut self, column: impl Into<String>) -> Self {
        self.values_id_column = column.into();
        self
    }

    /// Deprecated compatibility path: candidate value columns tried in order
    /// when a definition has no value-column pointer.
    pub fn with_fallback_value_columns(mut self, columns: Vec<String>) -> Self {
        self.fallback_value_columns = columns;
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.field_defns.validate()?;
        self.field_values.validate()
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream, env: &FlowContext) -> Result<BoxRowStream> {
        Ok(Box::new(DynamicFieldStream {
            def: self.clone(),
            env: env.clone(),
            state: None,
            upstream,
        }))
    }

    /// Reads the definitions feed completely and builds the pivot schema.
    fn load_defns(&self, env: &FlowContext) -> Result<(Vec<FieldDefn>, HashMap<String, usize>)> {
        let mut stream = self.field_defns.open(env)?;
        let rows = collect(&mut stream)?;

        let mut defns = Vec::with_capacity(rows.len());
        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = match row.lookup(&self.defn_id_column, self.case_insensitive) {
                Some(field) if !field.value.is_null() => field.value.render(),
                _ => {
                    return Err(FlowError::configuration(format!(
                        "field definition row lacks an id in column '{}'",
                        self.defn_id_column
                    )))
                }
            };
            let name = match row.lookup(&self.defn_name_column, self.case_insensitive) {
                Some(field) if !field.value.is_null() => field.value.render(),
                _ => {
                    return Err(FlowError::configuration(format!(
                        "field definition '{id}' lacks a name in column '{}'",
                        self.defn_name_column
                    )))
                }
            };
            let data_type = match row.lookup(&self.defn_type_column, self.case_insensitive) {
                Some(field) if !field.value.is_null() => {
                    DataType::parse_name(&field.value.render())?
                }
                _ => DataType::String,
            };
            let value_column = row
                .lookup(&self.defn_value_column_column, self.case_insensitive)
                .filter(|field| !field.value.is_null())
                .map(|field| field.value.render());

            by_id.insert(self.id_key(&id), defns.len());
            defns.push(FieldDefn {
                name,
                data_type,
                value_column,
            });
        }
        Ok((defns, by_id))
    }

    fn id_key(&self, id: &str) -> String {
        if self.case_insensitive {
            id.to_ascii_lowercase()
        } else {
            id.to_string()
        }
    }
}

/// One row of the definitions feed, resolved.
#[derive(Clone, Debug)]
struct FieldDefn {
    name: String,
    data_type: DataType,
    value_column: Option<String>,
}

/// Built lazily on the first pull so that attaching a pipeline stays cheap
/// and the eager definitions read happens inside the run.
struct PivotState {
    defns: Vec<FieldDefn>,
    by_id: HashMap<String, usize>,
    cursor: SecondaryCursor,
}

struct DynamicFieldStream {
    def: DynamicFieldDef,
    env: FlowContext,
    state: Option<PivotState>,
    upstream: BoxRowStream,
}

impl DynamicFieldStream {
    fn state(&mut self) -> Result<&mut PivotState> {
        if self.state.is_none() {
            let (defns, by_id) = self.def.load_defns(&self.env)?;
            let cursor = SecondaryCursor::open(
                &self.def.field_values,
                &self.env,
                self.def.values_keys.clone(),
                self.def.case_insensitive,
            )?;
            self.state = Some(PivotState {
                defns,
                by_id,
                cursor,
            });
        }
        Ok(self.state.as_mut().expect("state just initialized"))
    }

    /// Resolves the actual value a values row carries for one definition.
    fn extract_value(
        def: &DynamicFieldDef,
        defn: &FieldDefn,
        values_row: &DataRow,
    ) -> Result<Value> {
        if let Some(column) = &defn.value_column {
            let value = values_row
                .lookup(column, def.case_insensitive)
                .map(|field| field.value.clone())
                .unwrap_or(Value::Null);
            return value.cast(defn.data_type);
        }
        // Deprecated fallback resolution, first non-null candidate wins.
        for candidate in &def.fallback_value_columns {
            if let Some(field) = values_row.lookup(candidate, def.case_insensitive) {
                if !field.value.is_null() {
                    return field.value.cast(defn.data_type);
                }
            }
        }
        Ok(Value::Null)
    }
}

impl RowStream for DynamicFieldStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        loop {
            let mut row = match self.upstream.next_row()? {
                Some(row) => row,
                None => return Ok(None),
            };

            let key = self.def.parent_keys.key_of(&row, self.def.case_insensitive);
            let def = self.def.clone();
            let state = self.state()?;
            let run = state.cursor.run_for(&key)?;

            if run.is_empty() {
                match def.mode {
                    JoinMode::Inner => continue,
                    JoinMode::Outer => return Ok(Some(row)),
                }
            }

            // Collect per-definition values; a later row in the run replaces
            // an earlier one for the same fieldId.
            let mut pivoted: Vec<Option<Value>> = vec![None; state.defns.len()];
            for values_row in run {
                let id = match values_row.lookup(&def.values_id_column, def.case_insensitive) {
                    Some(field) if !field.value.is_null() => field.value.render(),
                    _ => {
                        return Err(FlowError::type_error(format!(
                            "values row lacks a field id in column '{}'",
                            def.values_id_column
                        )))
                    }
                };
                let index = *state.by_id.get(&def.id_key(&id)).ok_or_else(|| {
                    FlowError::type_error(format!("values row references unknown field id '{id}'"))
                })?;
                let defn = &state.defns[index];
                pivoted[index] = Some(Self::extract_value(&def, defn, values_row)?);
            }

            // Emit in definition order, not values-arrival order.
            for (index, value) in pivoted.into_iter().enumerate() {
                if let Some(value) = value {
                    let defn = &state.defns[index];
                    row.set_checked(&defn.name, defn.data_type, value, def.case_insensitive)?;
                }
            }
            return Ok(Some(row));
        }
    }
}
