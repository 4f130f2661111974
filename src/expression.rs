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

//! # Rowflow Expression Boundary
//!
//! Black-box contract for predicate and value-producing expressions. The
//! engine never interprets expression text itself; it hands the text and a
//! context bag to an installed [`Evaluator`] and receives a typed value (or a
//! failure) back. Expression and Script processors differ only in which
//! evaluator slot they use.

use std::collections::BTreeMap;

use crate::errors::Result;
use crate::row::DataRow;
use crate::value::Value;

/// Context bag passed to an evaluator for each evaluation.
#[derive(Debug)]
pub struct EvalContext<'a> {
    /// Request metadata supplied by the caller of the pipeline run.
    pub metadata: &'a BTreeMap<String, String>,
    /// The current row, or an empty row when none applies.
    pub row: &'a DataRow,
    /// Counter incremented for each predicate evaluation in a run.
    pub iteration: u64,
}

/// Black-box expression or script engine.
///
/// Implementations live outside this crate (JEXL-style expression languages,
/// embedded scripting runtimes). Text in, typed value out, or a failure.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expression: &str, ctx: &EvalContext<'_>) -> Result<Value>;
}

/// Predicate truthiness: Boolean(true) or text equal to "true" ignoring ASCII
/// case. Everything else, including Null and numbers, is falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
