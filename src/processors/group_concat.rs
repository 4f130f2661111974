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

//! # GroupConcat Processor
//!
//! Sorted-merge concatenation: every secondary row sharing a primary row's
//! key contributes values, joined with a delimiter (default `", "`) in the
//! secondary stream's row order. Three column-selection modes:
//!
//! 1. `child_value_column` + `parent_value_column`: the child column's values
//!    land in one new field named by `parent_value_column`
//! 2. only `child_value_column`: same, but the field keeps the child's name
//! 3. neither: every non-key child column is concatenated independently and
//!    merged under its own name
//!
//! Concatenated fields are always typed String; Null child values contribute
//! nothing. Join mode matches Merge: outer (default) passes unmatched primary
//! rows through, inner drops them.

use crate::context::FlowContext;
use crate::datatype::DataType;
use crate::errors::{FlowError, Result};
use crate::pipeline::SourcePipeline;
use crate::processors::correlate::{JoinMode, KeySpec, SecondaryCursor};
use crate::row::DataRow;
use crate::stream::{BoxRowStream, RowStream};
use crate::value::Value;

const DEFAULT_DELIMITER: &str = ", ";

/// Concatenates matching secondary rows' values into primary-row fields.
#[derive(Clone, Debug)]
pub struct GroupConcatDef {
    parent_keys: KeySpec,
    child_keys: KeySpec,
    mode: JoinMode,
    delimiter: Option<String>,
    child_value_column: Option<String>,
    parent_value_column: Option<String>,
    child: SourcePipeline,
}

impl GroupConcatDef {
    pub fn new(
        parent_keys: KeySpec,
        child_keys: KeySpec,
        child: SourcePipeline,
    ) -> Result<Self> {
        if parent_keys.len() != child_keys.len() {
            return Err(FlowError::configuration(format!(
                "group_concat parent key has {} columns but child key has {}",
                parent_keys.len(),
                child_keys.len()
            )));
        }
        Ok(GroupConcatDef {
            parent_keys,
            child_keys,
            mode: JoinMode::default(),
            delimiter: None,
            child_value_column: None,
            parent_value_column: None,
            child,
        })
    }

    pub fn with_mode(mut self, mode: JoinMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Selects the child column to concatenate (modes 1 and 2).
    pub fn with_child_value_column(mut self, column: impl Into<String>) -> Self {
        self.child_value_column = Some(column.into());
        self
    }

    /// Renames the concatenated field on the primary row (mode 1).
    pub fn with_parent_value_column(mut self, column: impl Into<String>) -> Self {
        self.parent_value_column = Some(column.into());
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.parent_value_column.is_some() && self.child_value_column.is_none() {
            return Err(FlowError::configuration(
                "group_concat parentValueColumn requires childValueColumn",
            ));
        }
        self.child.validate()
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream, env: &FlowContext) -> Result<BoxRowStream> {
        self.check()?;
        let cursor = SecondaryCursor::open(&self.child, env, self.child_keys.clone(), false)?;
        Ok(Box::new(GroupConcatStream {
            parent_keys: self.parent_keys.clone(),
            child_keys: self.child_keys.clone(),
            mode: self.mode,
            delimiter: self
                .delimiter
                .clone()
                .unwrap_or_else(|| DEFAULT_DELIMITER.to_string()),
            child_value_column: self.child_value_column.clone(),
            parent_value_column: self.parent_value_column.clone(),
            cursor,
            upstream,
        }))
    }
}

struct GroupConcatStream {
    parent_keys: KeySpec,
    child_keys: KeySpec,
    mode: JoinMode,
    delimiter: String,
    child_value_column: Option<String>,
    parent_value_column: Option<String>,
    cursor: SecondaryCursor,
    upstream: BoxRowStream,
}

impl GroupConcatStream {
    /// Concatenates one named column across the run; None when every value is
    /// Null or absent.
    fn concat_column(&self, run: &[DataRow], column: &str) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        for row in run {
            match row.value(column) {
                Some(Value::Null) | None => {}
                Some(value) => parts.push(value.render()),
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(&self.delimiter))
        }
    }
}

impl RowStream for GroupConcatStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        loop {
            let mut row = match self.upstream.next_row()? {
                Some(row) => row,
                None => return Ok(None),
            };
            let key = self.parent_keys.key_of(&row, false);
            let run = self.cursor.run_for(&key)?.to_vec();

            if run.is_empty() {
                match self.mode {
                    JoinMode::Inner => continue,
                    JoinMode::Outer => return Ok(Some(row)),
                }
            }

            match &self.child_value_column {
                Some(child_column) => {
                    let target = self
                        .parent_value_column
                        .as_deref()
                        .unwrap_or(child_column.as_str());
                    if let Some(joined) = self.concat_column(&run, child_column) {
                        row.set(target, DataType::String, Value::String(joined));
                    }
                }
                None => {
                    // Every non-key child column, in the order the secondary
                    // rows present them.
                    let mut columns: Vec<String> = Vec::new();
                    for child_row in &run {
                        for name in child_row.names() {
                            if !self.child_keys.contains(name)
                                && !columns.iter().any(|c| c == name)
                            {
                                columns.push(name.to_string());
                            }
                        }
                    }
                    for column in columns {
                        if let Some(joined) = self.concat_column(&run, &column) {
                            row.set(&column, DataType::String, Value::String(joined));
                        }
                    }
                }
            }
            return Ok(Some(row));
        }
    }
}
