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

//! # Rowflow Context Module
//!
//! Per-run environment handed to every stage when a pipeline is opened:
//! request metadata for expression contexts, the installed evaluator slots,
//! and spill tuning. The context is immutable during a run and cheap to
//! clone; all mutable per-run state (iteration counters, sort buffers,
//! definition caches) lives inside the stream objects instead, so one
//! definition can be opened repeatedly and concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::expression::Evaluator;

/// Default number of rows Sort buffers in memory before spilling to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 10_000;

/// Per-run environment shared by every stage of a pipeline instance.
#[derive(Clone, Default)]
pub struct FlowContext {
    /// Request metadata exposed to expression/script contexts.
    pub metadata: BTreeMap<String, String>,
    /// Evaluator for Expression processors; None until installed.
    pub expression_evaluator: Option<Arc<dyn Evaluator>>,
    /// Evaluator for Script processors; None until installed.
    pub script_evaluator: Option<Arc<dyn Evaluator>>,
    /// Row-count threshold above which Sort spills to disk; None for the
    /// default.
    pub spill_threshold: Option<usize>,
}

impl FlowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one request-metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Installs the expression evaluator.
    pub fn with_expression_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.expression_evaluator = Some(evaluator);
        self
    }

    /// Installs the script evaluator.
    pub fn with_script_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.script_evaluator = Some(evaluator);
        self
    }

    /// Overrides the Sort spill threshold for this run.
    pub fn with_spill_threshold(mut self, rows: usize) -> Self {
        self.spill_threshold = Some(rows);
        self
    }

    pub fn spill_threshold(&self) -> usize {
        self.spill_threshold.unwrap_or(DEFAULT_SPILL_THRESHOLD)
    }
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("metadata", &self.metadata)
            .field("expression_evaluator", &self.expression_evaluator.is_some())
            .field("script_evaluator", &self.script_evaluator.is_some())
            .field("spill_threshold", &self.spill_threshold)
            .finish()
    }
}
