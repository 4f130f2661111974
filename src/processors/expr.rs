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

//! # Expression Processor
//!
//! Two independent optional behaviors, combinable in one instance:
//!
//! 1. **Predicate**: evaluated per row against the installed expression
//!    evaluator; a non-"true" result discards the row. The evaluation context
//!    exposes request metadata, the row, and an `iteration` counter
//!    incremented on each predicate evaluation.
//! 2. **Field assignment**: `field_value` is evaluated, cast to `field_type`
//!    (String when omitted), and set on the row. Overwriting an existing
//!    field with a different declared type is a Type error.
//!
//! The predicate runs first: a discarded row is never mutated. The Script
//! processor shares this implementation verbatim, differing only in which
//! evaluator slot of the context it uses.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::FlowContext;
use crate::datatype::DataType;
use crate::errors::{FlowError, Result};
use crate::expression::{is_truthy, EvalContext, Evaluator};
use crate::row::DataRow;
use crate::stream::{BoxRowStream, RowStream};

/// Which evaluator slot of the context a definition binds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EvaluatorSlot {
    Expression,
    Script,
}

impl EvaluatorSlot {
    fn resolve(self, env: &FlowContext) -> Option<Arc<dyn Evaluator>> {
        match self {
            EvaluatorSlot::Expression => env.expression_evaluator.clone(),
            EvaluatorSlot::Script => env.script_evaluator.clone(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            EvaluatorSlot::Expression => "expression",
            EvaluatorSlot::Script => "script",
        }
    }
}

/// Per-row predicate filtering and/or computed field assignment.
#[derive(Clone, Debug)]
pub struct ExpressionDef {
    pub(crate) predicate: Option<String>,
    pub(crate) field: Option<String>,
    pub(crate) field_type: Option<DataType>,
    pub(crate) field_value: Option<String>,
}

impl ExpressionDef {
    pub fn new(
        predicate: Option<String>,
        field: Option<String>,
        field_type: Option<DataType>,
        field_value: Option<String>,
    ) -> Result<Self> {
        let def = ExpressionDef {
            predicate,
            field,
            field_type,
            field_value,
        };
        def.check()?;
        Ok(def)
    }

    /// Predicate-only form.
    pub fn filter(predicate: impl Into<String>) -> Self {
        ExpressionDef {
            predicate: Some(predicate.into()),
            field: None,
            field_type: None,
            field_value: None,
        }
    }

    /// Assignment-only form.
    pub fn assign(
        field: impl Into<String>,
        field_type: DataType,
        field_value: impl Into<String>,
    ) -> Self {
        ExpressionDef {
            predicate: None,
            field: Some(field.into()),
            field_type: Some(field_type),
            field_value: Some(field_value.into()),
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.field.is_some() != self.field_value.is_some() {
            return Err(FlowError::configuration(
                "expression field and fieldValue must be set together",
            ));
        }
        if self.predicate.is_none() && self.field.is_none() {
            return Err(FlowError::configuration(
                "expression requires a predicate and/or a field assignment",
            ));
        }
        Ok(())
    }

    pub(crate) fn attach(
        &self,
        upstream: BoxRowStream,
        env: &FlowContext,
        slot: EvaluatorSlot,
    ) -> Result<BoxRowStream> {
        let evaluator = slot.resolve(env).ok_or_else(|| {
            FlowError::configuration(format!(
                "pipeline uses a {} processor but no {} evaluator is installed",
                slot.label(),
                slot.label()
            ))
        })?;
        Ok(Box::new(ExpressionStream {
            def: self.clone(),
            evaluator,
            metadata: env.metadata.clone(),
            iteration: 0,
            upstream,
        }))
    }
}

struct ExpressionStream {
    def: ExpressionDef,
    evaluator: Arc<dyn Evaluator>,
    metadata: BTreeMap<String, String>,
    iteration: u64,
    upstream: BoxRowStream,
}

impl ExpressionStream {
    fn evaluate(&self, expression: &str, row: &DataRow) -> Result<crate::value::Value> {
        let ctx = EvalContext {
            metadata: &self.metadata,
            row,
            iteration: self.iteration,
        };
        self.evaluator.evaluate(expression, &ctx)
    }
}

impl RowStream for ExpressionStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        loop {
            let mut row = match self.upstream.next_row()? {
                Some(row) => row,
                None => return Ok(None),
            };

            if let Some(predicate) = &self.def.predicate {
                let verdict = self.evaluate(predicate, &row)?;
                self.iteration += 1;
                if !is_truthy(&verdict) {
                    continue;
                }
            }

            if let (Some(field), Some(field_value)) = (&self.def.field, &self.def.field_value) {
                let declared = self.def.field_type.unwrap_or(DataType::String);
                let raw = self.evaluate(field_value, &row)?;
                let value = raw.cast(declared)?;
                row.set_checked(field, declared, value, false)?;
            }

            return Ok(Some(row));
        }
    }
}
