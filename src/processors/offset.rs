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

/// Discards the first `count` rows and passes the rest unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OffsetDef {
    count: usize,
}

impl OffsetDef {
    /// A negative count is a configuration error, raised at build time.
    pub fn new(count: i64) -> Result<Self> {
        if count < 0 {
            return Err(FlowError::configuration(format!(
                "offset count must be non-negative, got {count}"
            )));
        }
        Ok(OffsetDef {
            count: count as usize,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream) -> BoxRowStream {
        Box::new(OffsetStream {
            to_skip: self.count,
            upstream,
        })
    }
}

struct OffsetStream {
    to_skip: usize,
    upstream: BoxRowStream,
}

impl RowStream for OffsetStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        while self.to_skip > 0 {
            match self.upstream.next_row()? {
                Some(_) => self.to_skip -= 1,
                None => return Ok(None),
            }
        }
        self.upstream.next_row()
    }
}
