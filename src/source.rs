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

//! # Rowflow Source Module
//!
//! The connector boundary and the bundled synthetic source.
//!
//! Concrete SQL/HTTP connectors live outside this crate; they implement
//! [`Source`] and surface their failures as `FlowError::Upstream`. The
//! synthetic [`RecordsSource`] builds typed rows from JSON objects with
//! per-column type inference, an optional declared schema, and a
//! post-inference [`ColumnTypeOverride`] list, the same override hook the
//! external source configuration exposes for real connectors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::FlowContext;
use crate::datatype::{common_type, DataType};
use crate::errors::{FlowError, Result};
use crate::row::DataRow;
use crate::stream::{rows, BoxRowStream};
use crate::value::Value;

/// Connector contract: given the per-run context, yield a row stream.
///
/// Each call opens an independent stream with its own resource lifecycle;
/// nested pipelines rely on this to get separate connections.
pub trait Source: Send + Sync + std::fmt::Debug {
    fn open(&self, env: &FlowContext) -> Result<BoxRowStream>;
}

/// Forces a column to a data type after inference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnTypeOverride {
    pub column: String,
    pub data_type: DataType,
}

/// Synthetic in-memory source over JSON objects.
///
/// Column order follows first appearance across the records; per-column types
/// are inferred from the JSON values and unified through the common-type
/// rules, then adjusted by the override list. Values are cast to the final
/// column types when the source is opened, so a bad override fails the run
/// with a Type error rather than emitting mixed columns.
#[derive(Clone, Debug)]
pub struct RecordsSource {
    records: Vec<serde_json::Map<String, serde_json::Value>>,
    schema: Option<Vec<(String, DataType)>>,
    overrides: Vec<ColumnTypeOverride>,
}

impl RecordsSource {
    /// Builds a source from JSON values; every record must be an object.
    pub fn new(records: Vec<serde_json::Value>) -> Result<Self> {
        let mut objects = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match record {
                serde_json::Value::Object(map) => objects.push(map),
                other => {
                    return Err(FlowError::configuration(format!(
                        "record #{index} must be a JSON object, got {other}"
                    )))
                }
            }
        }
        Ok(RecordsSource {
            records: objects,
            schema: None,
            overrides: Vec::new(),
        })
    }

    /// Declares the full column schema, bypassing inference. Column order of
    /// the output rows follows the declaration.
    pub fn with_schema(mut self, columns: Vec<(String, DataType)>) -> Self {
        self.schema = Some(columns);
        self
    }

    /// Applies type overrides after inference.
    pub fn with_overrides(mut self, overrides: Vec<ColumnTypeOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Convenience: a boxed `Arc<dyn Source>` for pipeline assembly.
    pub fn shared(self) -> Arc<dyn Source> {
        Arc::new(self)
    }

    fn resolve_columns(&self) -> Result<Vec<(String, DataType)>> {
        let mut columns: Vec<(String, DataType)> = match &self.schema {
            Some(declared) => declared.clone(),
            None => {
                let mut inferred: Vec<(String, DataType)> = Vec::new();
                for record in &self.records {
                    for (name, json) in record {
                        let dtype = infer_type(json)?;
                        match inferred.iter_mut().find(|(n, _)| n == name) {
                            Some((_, existing)) => *existing = common_type(*existing, dtype)?,
                            None => inferred.push((name.clone(), dtype)),
                        }
                    }
                }
                inferred
            }
        };

        for over in &self.overrides {
            match columns.iter_mut().find(|(n, _)| *n == over.column) {
                Some((_, dtype)) => *dtype = over.data_type,
                None => {
                    return Err(FlowError::configuration(format!(
                        "type override targets unknown column '{}'",
                        over.column
                    )))
                }
            }
        }

        // Columns that never saw a non-null value stay typed Null; widen to
        // String so downstream casts have something concrete.
        for (_, dtype) in columns.iter_mut() {
            if *dtype == DataType::Null {
                *dtype = DataType::String;
            }
        }
        Ok(columns)
    }
}

impl Source for RecordsSource {
    fn open(&self, _env: &FlowContext) -> Result<BoxRowStream> {
        let columns = self.resolve_columns()?;
        let mut out = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let mut row = DataRow::with_capacity(columns.len());
            for (name, dtype) in &columns {
                let value = match record.get(name) {
                    Some(json) => json_value(json)?.cast(*dtype)?,
                    None => Value::Null,
                };
                row.push_field(name.clone(), *dtype, value);
            }
            out.push(row);
        }
        Ok(rows(out))
    }
}

/// Infers the engine type of one JSON value.
fn infer_type(json: &serde_json::Value) -> Result<DataType> {
    match json {
        serde_json::Value::Null => Ok(DataType::Null),
        serde_json::Value::Bool(_) => Ok(DataType::Boolean),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    Ok(DataType::Integer)
                } else {
                    Ok(DataType::Long)
                }
            } else {
                Ok(DataType::Double)
            }
        }
        serde_json::Value::String(_) => Ok(DataType::String),
        other => Err(FlowError::configuration(format!(
            "unsupported JSON value for a row field: {other}"
        ))),
    }
}

/// Converts one JSON value to its natural engine value.
fn json_value(json: &serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Ok(Value::Integer(small)),
                    Err(_) => Ok(Value::Long(i)),
                }
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Double(f))
            } else {
                Err(FlowError::type_error(format!("unrepresentable number {n}")))
            }
        }
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        other => Err(FlowError::type_error(format!(
            "unsupported JSON value for a row field: {other}"
        ))),
    }
}
