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

use crate::context::FlowContext;
use crate::datatype::DataType;
use crate::errors::Result;
use crate::processors::expr::{EvaluatorSlot, ExpressionDef};
use crate::stream::BoxRowStream;

/// Same dual predicate/assignment contract as Expression, routed through the
/// general-purpose script evaluator instead of the expression evaluator.
/// Strictly slower; prefer Expression when the expression language suffices.
#[derive(Clone, Debug)]
pub struct ScriptDef {
    inner: ExpressionDef,
}

impl ScriptDef {
    pub fn new(
        predicate: Option<String>,
        field: Option<String>,
        field_type: Option<DataType>,
        field_value: Option<String>,
    ) -> Result<Self> {
        Ok(ScriptDef {
            inner: ExpressionDef::new(predicate, field, field_type, field_value)?,
        })
    }

    /// Predicate-only form.
    pub fn filter(predicate: impl Into<String>) -> Self {
        ScriptDef {
            inner: ExpressionDef::filter(predicate),
        }
    }

    /// Assignment-only form.
    pub fn assign(
        field: impl Into<String>,
        field_type: DataType,
        field_value: impl Into<String>,
    ) -> Self {
        ScriptDef {
            inner: ExpressionDef::assign(field, field_type, field_value),
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.inner.check()
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream, env: &FlowContext) -> Result<BoxRowStream> {
        self.inner.attach(upstream, env, EvaluatorSlot::Script)
    }
}
