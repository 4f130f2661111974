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

//! # Sorted-Merge Machinery
//!
//! Shared plumbing for the correlated processors (Merge, GroupConcat,
//! DynamicField): composite key tuples, DataType-aware lexicographic key
//! comparison, and the secondary cursor that serves "the run of rows for key
//! K" over a nested pipeline's pre-sorted output.
//!
//! Both sides of a correlation must arrive sorted ascending by their key
//! tuples; this is a caller-enforced precondition. The cursor never looks
//! backwards,
//! so unsorted input yields deterministic-but-unspecified matching (rows are
//! skipped or treated as unmatched), never a crash.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::context::FlowContext;
use crate::errors::{FlowError, Result};
use crate::pipeline::SourcePipeline;
use crate::row::DataRow;
use crate::stream::BoxRowStream;
use crate::value::{compare, Value};

/// Whether unmatched primary rows are dropped or passed through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinMode {
    /// Drop primary rows with no matching secondary key.
    Inner,
    /// Always emit the primary row; enrichment fields stay unset on a miss.
    #[default]
    Outer,
}

/// Ordered list of column names forming a composite join/group key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeySpec {
    columns: Vec<String>,
}

impl KeySpec {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(FlowError::configuration("key column list must not be empty"));
        }
        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(FlowError::configuration("key column name must not be blank"));
        }
        Ok(KeySpec { columns })
    }

    /// Single-column convenience constructor.
    pub fn single(column: impl Into<String>) -> Result<Self> {
        Self::new(vec![column.into()])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// True when the named column is part of the key.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Extracts this key's value tuple from a row; absent columns read as
    /// Null.
    pub fn key_of(&self, row: &DataRow, case_insensitive: bool) -> Vec<Value> {
        self.columns
            .iter()
            .map(|column| {
                row.lookup(column, case_insensitive)
                    .map(|f| f.value.clone())
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

/// Lexicographic composite-key ordering: column 1 major, column 2 minor, and
/// so on, each column compared with the DataType-aware value ordering.
pub fn compare_keys(a: &[Value], b: &[Value]) -> Result<Ordering> {
    for (left, right) in a.iter().zip(b.iter()) {
        match compare(left, right)? {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Cursor over a nested pipeline's sorted output, serving key runs.
///
/// A run (the contiguous rows sharing one key) is collected once and cached
/// by key, so consecutive primary rows with equal keys re-use it without
/// consuming the secondary stream again. Dropping the cursor drops the nested
/// pipeline's stream and its resources.
pub struct SecondaryCursor {
    stream: Option<BoxRowStream>,
    keys: KeySpec,
    case_insensitive: bool,
    /// Last pulled, not yet consumed row and its key.
    pending: Option<(Vec<Value>, DataRow)>,
    run: Vec<DataRow>,
    run_key: Option<Vec<Value>>,
}

impl SecondaryCursor {
    /// Opens the nested pipeline with its own independent resources.
    pub fn open(
        pipeline: &SourcePipeline,
        env: &FlowContext,
        keys: KeySpec,
        case_insensitive: bool,
    ) -> Result<Self> {
        let stream = pipeline.open(env)?;
        Ok(SecondaryCursor {
            stream: Some(stream),
            keys,
            case_insensitive,
            pending: None,
            run: Vec::new(),
            run_key: None,
        })
    }

    fn pull(&mut self) -> Result<Option<(Vec<Value>, DataRow)>> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(None),
        };
        match stream.next_row()? {
            Some(row) => {
                let key = self.keys.key_of(&row, self.case_insensitive);
                Ok(Some((key, row)))
            }
            None => {
                // Exhausted; release the nested pipeline.
                self.stream = None;
                Ok(None)
            }
        }
    }

    /// The run of secondary rows whose key equals `key`; empty when none.
    ///
    /// Advancing past a smaller key discards those rows for good: correct
    /// for sorted input, deterministic (if wrong) for unsorted input.
    pub fn run_for(&mut self, key: &[Value]) -> Result<&[DataRow]> {
        if self
            .run_key
            .as_deref()
            .is_some_and(|cached| compare_keys(cached, key).map(Ordering::is_eq).unwrap_or(false))
        {
            return Ok(&self.run);
        }

        self.run.clear();
        self.run_key = None;

        loop {
            let (candidate_key, row) = match self.pull()? {
                Some(item) => item,
                None => return Ok(&self.run),
            };
            match compare_keys(&candidate_key, key)? {
                Ordering::Less => continue,
                Ordering::Greater => {
                    self.pending = Some((candidate_key, row));
                    return Ok(&self.run);
                }
                Ordering::Equal => {
                    self.run_key = Some(candidate_key);
                    self.run.push(row);
                    break;
                }
            }
        }

        // Collect the remainder of the run.
        loop {
            let (candidate_key, row) = match self.pull()? {
                Some(item) => item,
                None => break,
            };
            if compare_keys(&candidate_key, key)? == Ordering::Equal {
                self.run.push(row);
            } else {
                self.pending = Some((candidate_key, row));
                break;
            }
        }
        Ok(&self.run)
    }
}
