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

//! # Merge Processor
//!
//! Sorted-merge enrichment: for each primary row, the fields of the **first**
//! secondary row sharing its key are unioned into the primary row. Further
//! secondary rows in the same key run are ignored, and a primary field is
//! never overwritten by a secondary one of the same name.
//!
//! Both sides must arrive sorted ascending by their key columns. Outer join
//! (the default) passes unmatched primary rows through untouched; inner join
//! drops them.
//!
//! A `delimiter` is accepted for configuration compatibility but has no
//! effect: first-match-wins enrichment never concatenates. GroupConcat is the
//! processor that reads it.

use crate::context::FlowContext;
use crate::errors::{FlowError, Result};
use crate::pipeline::SourcePipeline;
use crate::processors::correlate::{JoinMode, KeySpec, SecondaryCursor};
use crate::row::DataRow;
use crate::stream::{BoxRowStream, RowStream};

/// First-match-wins field union from a nested pipeline's sorted output.
#[derive(Clone, Debug)]
pub struct MergeDef {
    parent_keys: KeySpec,
    child_keys: KeySpec,
    mode: JoinMode,
    /// Accepted but unused; kept so Merge and GroupConcat share a config
    /// shape.
    delimiter: Option<String>,
    child: SourcePipeline,
}

impl MergeDef {
    pub fn new(parent_keys: KeySpec, child_keys: KeySpec, child: SourcePipeline) -> Result<Self> {
        if parent_keys.len() != child_keys.len() {
            return Err(FlowError::configuration(format!(
                "merge parent key has {} columns but child key has {}",
                parent_keys.len(),
                child_keys.len()
            )));
        }
        Ok(MergeDef {
            parent_keys,
            child_keys,
            mode: JoinMode::default(),
            delimiter: None,
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

    pub(crate) fn check(&self) -> Result<()> {
        if self.delimiter.is_some() {
            log::warn!("merge ignores its configured delimiter; use group_concat to concatenate");
        }
        self.child.validate()
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream, env: &FlowContext) -> Result<BoxRowStream> {
        let cursor = SecondaryCursor::open(&self.child, env, self.child_keys.clone(), false)?;
        Ok(Box::new(MergeStream {
            parent_keys: self.parent_keys.clone(),
            mode: self.mode,
            cursor,
            upstream,
        }))
    }
}

struct MergeStream {
    parent_keys: KeySpec,
    mode: JoinMode,
    cursor: SecondaryCursor,
    upstream: BoxRowStream,
}

impl RowStream for MergeStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        loop {
            let mut row = match self.upstream.next_row()? {
                Some(row) => row,
                None => return Ok(None),
            };
            let key = self.parent_keys.key_of(&row, false);
            let run = self.cursor.run_for(&key)?;

            let Some(first) = run.first() else {
                match self.mode {
                    JoinMode::Inner => continue,
                    JoinMode::Outer => return Ok(Some(row)),
                }
            };

            for field in first.iter() {
                if row.index_of(&field.name).is_none() {
                    row.push_field(field.name.clone(), field.data_type, field.value.clone());
                }
            }
            return Ok(Some(row));
        }
    }
}
