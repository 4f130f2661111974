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

//! # Rowflow DataRow Module
//!
//! One record flowing through a pipeline: an ordered sequence of
//! (name, DataType, value) triples.
//!
//! ## Design Principles
//!
//! - **Ordered**: field order is meaningful (output serializers rely on it,
//!   and DynamicField appends pivoted fields in definition order)
//! - **Owned**: a row belongs to exactly one position in exactly one stream;
//!   processors that hold a previous row for comparison clone it, so a
//!   mutation is never observed by another stage
//! - **Case-sensitive by default**: name lookup is exact; the explicitly
//!   flagged `_ci` variants provide the case-insensitive mode some processors
//!   expose
//!
//! Rows serialize to JSON for the Sort spill files.

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;
use crate::errors::{FlowError, Result};
use crate::value::Value;

/// One named, typed field of a row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataField {
    pub name: String,
    pub data_type: DataType,
    pub value: Value,
}

/// Ordered, named, typed record flowing through the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    fields: Vec<DataField>,
}

impl DataRow {
    /// Constructs an empty row.
    pub fn new() -> Self {
        DataRow { fields: Vec::new() }
    }

    /// Constructs an empty row with pre-allocated field capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        DataRow {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of the field with the given name, exact match.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Index of the field with the given name, ignoring ASCII case.
    ///
    /// This is the explicitly flagged case-insensitive lookup variant; exact
    /// lookup is the default everywhere else.
    pub fn index_of_ci(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// The field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&DataField> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    /// The value of the named field, if present.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).map(|f| &f.value)
    }

    /// Lookup honoring the processor's case-sensitivity flag.
    pub fn lookup(&self, name: &str, case_insensitive: bool) -> Option<&DataField> {
        let index = if case_insensitive {
            self.index_of_ci(name)
        } else {
            self.index_of(name)
        };
        index.map(|i| &self.fields[i])
    }

    /// Appends a field without checking for an existing one with the same
    /// name. Callers constructing rows from a schema use this; everyone else
    /// goes through [`DataRow::set`].
    pub fn push_field(&mut self, name: impl Into<String>, data_type: DataType, value: Value) {
        self.fields.push(DataField {
            name: name.into(),
            data_type,
            value,
        });
    }

    /// Creates or replaces the named field, keeping its position when it
    /// already exists.
    pub fn set(&mut self, name: &str, data_type: DataType, value: Value) {
        match self.index_of(name) {
            Some(i) => {
                self.fields[i].data_type = data_type;
                self.fields[i].value = value;
            }
            None => self.push_field(name, data_type, value),
        }
    }

    /// Creates the named field, or replaces it only when the stored type
    /// matches the declared type.
    ///
    /// This is the overwrite rule Expression and DynamicField follow: a
    /// declared type that disagrees with an existing field's stored type is a
    /// Type error rather than a silent re-type.
    pub fn set_checked(
        &mut self,
        name: &str,
        data_type: DataType,
        value: Value,
        case_insensitive: bool,
    ) -> Result<()> {
        let index = if case_insensitive {
            self.index_of_ci(name)
        } else {
            self.index_of(name)
        };
        match index {
            Some(i) => {
                let stored = self.fields[i].data_type;
                if stored != data_type && stored != DataType::Null {
                    return Err(FlowError::type_error(format!(
                        "field '{}' holds {} but {} was declared",
                        self.fields[i].name,
                        stored.name(),
                        data_type.name()
                    )));
                }
                self.fields[i].data_type = data_type;
                self.fields[i].value = value;
            }
            None => self.push_field(name, data_type, value),
        }
        Ok(())
    }

    /// Renames a field in place; returns false when absent.
    pub fn rename(&mut self, name: &str, new_name: &str) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.fields[i].name = new_name.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes a field; returns false when absent.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Some(i) => {
                self.fields.remove(i);
                true
            }
            None => false,
        }
    }

    /// Field names in row order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fields in row order.
    pub fn iter(&self) -> impl Iterator<Item = &DataField> {
        self.fields.iter()
    }
}

impl IntoIterator for DataRow {
    type Item = DataField;
    type IntoIter = std::vec::IntoIter<DataField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
