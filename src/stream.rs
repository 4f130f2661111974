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

//! # Rowflow Stream Module
//!
//! The substrate every processor consumes and produces: a lazy, forward-only,
//! single-pass sequence of rows.
//!
//! ## Contract
//!
//! - `Ok(Some(row))` yields the next row
//! - `Ok(None)` is the explicit end-of-stream marker; further calls keep
//!   returning it
//! - `Err(_)` is a typed mid-stream failure that propagates to the consumer;
//!   this layer never retries (retries, if any, belong to source connectors)
//!
//! No stream supports random access or rewinding. Sort is the sole exception
//! to single-pass consumption, by design, because it fully buffers.
//!
//! Cancellation is `Drop`: releasing a stream releases its whole upstream
//! chain, including nested secondary pipelines and spill files.

use crate::errors::Result;
use crate::row::DataRow;

/// Pull-based row stream.
pub trait RowStream {
    /// Pulls the next row; `Ok(None)` signals end-of-stream.
    fn next_row(&mut self) -> Result<Option<DataRow>>;
}

/// Boxed stream, the form processors chain together.
pub type BoxRowStream = Box<dyn RowStream + Send>;

impl RowStream for BoxRowStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        (**self).next_row()
    }
}

/// In-memory stream over a vector of rows.
///
/// Backs the synthetic source and most tests.
#[derive(Debug)]
pub struct MemoryRows {
    rows: std::vec::IntoIter<DataRow>,
}

impl MemoryRows {
    pub fn new(rows: Vec<DataRow>) -> Self {
        MemoryRows {
            rows: rows.into_iter(),
        }
    }
}

impl RowStream for MemoryRows {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        Ok(self.rows.next())
    }
}

/// Boxes a vector of rows as a stream.
pub fn rows(rows: Vec<DataRow>) -> BoxRowStream {
    Box::new(MemoryRows::new(rows))
}

/// Drains a stream to completion, collecting every row.
///
/// Used by eager readers (DynamicField definitions) and tests. An error
/// mid-stream discards rows collected so far.
pub fn collect(stream: &mut dyn RowStream) -> Result<Vec<DataRow>> {
    let mut out = Vec::new();
    while let Some(row) = stream.next_row()? {
        out.push(row);
    }
    Ok(out)
}
