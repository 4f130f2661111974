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

//! # Rowflow Error Module
//!
//! This module defines the error types and utilities used throughout the
//! Rowflow engine for consistent error handling and reporting.
//!
//! ## Error Handling Philosophy
//!
//! Rowflow uses a structured error approach with the following principles:
//!
//! - **Explicit Error Classes**: Each variant represents one class of failure
//!   so that a caller (typically an HTTP layer) can choose an appropriate
//!   response without string matching
//! - **Build-Time vs. Run-Time**: Configuration errors are raised while a
//!   pipeline is assembled, before any row flows; Type and Upstream errors
//!   abort a running pipeline
//! - **Nothing Swallowed**: No error is silently dropped inside the engine;
//!   partial output is never favored over silent data corruption
//!
//! ## Error Categories
//!
//! - **Configuration**: Invalid processor definitions detected at build time
//! - **Type**: Failed casts, impossible common-type unification, declared vs.
//!   stored field-type mismatches
//! - **Upstream**: I/O failures raised by a source or a nested pipeline
//! - **Expression**: Failures crossing the expression/script evaluator boundary
//! - **Io**: Local I/O failures (sort spill buffers)
//! - **Serde**: Serialization failures (spill rows, step configuration)
//! - **Internal**: Catch-all for unexpected situations

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type used throughout the Rowflow engine.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Canonical error enumeration for the Rowflow engine.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum FlowError {
    /// Invalid pipeline or processor definition, detected before any row flows.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Failed cast, unification, or field-type mismatch while rows flow.
    #[error("type error: {message}")]
    Type { message: String },

    /// I/O failure raised by a source connector or a nested pipeline.
    #[error("upstream error: {message}")]
    Upstream { message: String },

    /// Failure crossing the expression/script evaluator boundary.
    #[error("expression '{expression}' failed: {message}")]
    Expression { expression: String, message: String },

    /// Local I/O failure (sort spill buffers).
    #[error("io error: {0}")]
    Io(String),

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for FlowError {
    fn from(err: io::Error) -> Self {
        FlowError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serde(err.to_string())
    }
}

impl FlowError {
    /// Helper to construct configuration errors.
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        FlowError::Configuration {
            message: message.into(),
        }
    }

    /// Helper to construct type errors.
    pub fn type_error<T: Into<String>>(message: T) -> Self {
        FlowError::Type {
            message: message.into(),
        }
    }

    /// Helper to construct upstream errors.
    pub fn upstream<T: Into<String>>(message: T) -> Self {
        FlowError::Upstream {
            message: message.into(),
        }
    }

    /// Helper to construct expression-boundary errors.
    pub fn expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Expression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        FlowError::Internal(message.into())
    }

    /// True when the error was raised while assembling a pipeline.
    pub fn is_configuration(&self) -> bool {
        matches!(self, FlowError::Configuration { .. })
    }
}
