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

/// Passes through the first `count` rows, then signals end-of-stream.
///
/// Once the limit is reached the upstream is dropped immediately, so no
/// further pulls are issued and upstream resources are released.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitDef {
    count: usize,
}

impl LimitDef {
    /// A negative count is a configuration error, raised at build time.
    pub fn new(count: i64) -> Result<Self> {
        if count < 0 {
            return Err(FlowError::configuration(format!(
                "limit count must be non-negative, got {count}"
            )));
        }
        Ok(LimitDef {
            count: count as usize,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream) -> BoxRowStream {
        Box::new(LimitStream {
            remaining: self.count,
            upstream: Some(upstream),
        })
    }
}

struct LimitStream {
    remaining: usize,
    upstream: Option<BoxRowStream>,
}

impl RowStream for LimitStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        if self.remaining == 0 {
            // Cancels the upstream chain on the first pull past the limit.
            self.upstream = None;
            return Ok(None);
        }
        let upstream = match self.upstream.as_mut() {
            Some(upstream) => upstream,
            None => return Ok(None),
        };
        match upstream.next_row()? {
            Some(row) => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.upstream = None;
                }
                Ok(Some(row))
            }
            None => {
                self.upstream = None;
                Ok(None)
            }
        }
    }
}
