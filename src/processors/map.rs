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

use serde::{Deserialize, Serialize};

use crate::errors::{FlowError, Result};
use crate::row::DataRow;
use crate::stream::{BoxRowStream, RowStream};

/// One relabel instruction: rename `source_label`, or remove it when
/// `new_label` is absent or blank.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Relabel {
    pub source_label: String,
    #[serde(default)]
    pub new_label: Option<String>,
}

impl Relabel {
    pub fn rename(source_label: impl Into<String>, new_label: impl Into<String>) -> Self {
        Relabel {
            source_label: source_label.into(),
            new_label: Some(new_label.into()),
        }
    }

    pub fn remove(source_label: impl Into<String>) -> Self {
        Relabel {
            source_label: source_label.into(),
            new_label: None,
        }
    }

    fn target(&self) -> Option<&str> {
        match self.new_label.as_deref() {
            Some(label) if !label.trim().is_empty() => Some(label),
            _ => None,
        }
    }
}

/// Renames or removes fields on every row.
///
/// Relabels apply strictly left-to-right, so a later relabel may target a
/// field created by an earlier one in the same list. A relabel whose source
/// field is absent on a given row is a no-op for that row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapDef {
    relabels: Vec<Relabel>,
}

impl MapDef {
    pub fn new(relabels: Vec<Relabel>) -> Result<Self> {
        if relabels.is_empty() {
            return Err(FlowError::configuration("map requires at least one relabel"));
        }
        for relabel in &relabels {
            if relabel.source_label.trim().is_empty() {
                return Err(FlowError::configuration(
                    "map relabel has a blank source label",
                ));
            }
        }
        Ok(MapDef { relabels })
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream) -> BoxRowStream {
        Box::new(MapStream {
            relabels: self.relabels.clone(),
            upstream,
        })
    }
}

struct MapStream {
    relabels: Vec<Relabel>,
    upstream: BoxRowStream,
}

impl RowStream for MapStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        let mut row = match self.upstream.next_row()? {
            Some(row) => row,
            None => return Ok(None),
        };
        for relabel in self.relabels.iter() {
            match relabel.target() {
                Some(new_label) => {
                    row.rename(&relabel.source_label, new_label);
                }
                None => {
                    row.remove(&relabel.source_label);
                }
            }
        }
        Ok(Some(row))
    }
}
