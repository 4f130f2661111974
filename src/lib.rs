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

//! # Rowflow Core Library
//!
//! This is the main library entry point for the Rowflow data pipeline engine.
//! It provides a typed row model and a declarative, composable set of stream
//! processors for filtering, transforming, sorting and correlating tabular
//! data pulled from pluggable sources.
//!
//! ## Module Overview
//!
//! The library is organized into the following major modules:
//!
//! - **datatype**: The engine type system (DataType, SQL mapping, common-type resolution)
//! - **value**: Typed cell values, casting, rendering and comparison
//! - **row**: DataRow and DataField, the record flowing through a pipeline
//! - **stream**: The pull-based RowStream abstraction every stage consumes and produces
//! - **source**: The Source connector boundary and the bundled synthetic records source
//! - **processors**: All pipeline processors, single-stream and correlated
//! - **pipeline**: SourcePipeline assembly and the config-driven PipelineBuilder
//! - **expression**: The black-box expression/script evaluator boundary
//! - **context**: The per-run environment (metadata, evaluators, spill tuning)
//! - **errors**: The FlowError type shared by every fallible operation
//!
//! ## Quick Start
//!
//! ```rust
//! use rowflow::{FlowContext, PipelineBuilder};
//! use serde_json::json;
//!
//! let builder = PipelineBuilder::with_defaults();
//! let pipeline = builder
//!     .build_from_config(&json!({
//!         "source": {"type": "records", "records": [
//!             {"id": 2, "name": "beta"},
//!             {"id": 1, "name": "alpha"},
//!         ]},
//!         "processors": [
//!             {"type": "sort", "fields": ["id"]},
//!             {"type": "query", "query": "name==alpha*"},
//!         ]
//!     }))
//!     .unwrap();
//!
//! let mut stream = pipeline.open(&FlowContext::new()).unwrap();
//! while let Some(row) = stream.next_row().unwrap() {
//!     println!("{row:?}");
//! }
//! ```
//!
//! ## Architecture
//!
//! Rowflow follows a pull-based pipeline architecture:
//! 1. **Rows**: Data is an ordered sequence of named, typed fields
//! 2. **Streams**: Every stage is a lazy, forward-only row stream
//! 3. **Processors**: Immutable definitions that attach to an upstream stream
//! 4. **Pipelines**: A Source plus a processor chain, nestable as the
//!    secondary feed of the correlated processors
//! 5. **Context**: Per-run metadata, evaluator slots and spill tuning
//!
//! Correlated processors (merge, group_concat, dynamic_field) consume a
//! primary stream plus nested secondary pipelines in sorted-merge lockstep;
//! both sides must arrive sorted ascending by their key columns.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FlowError>` for explicit error handling.
//! Configuration errors surface when a definition is built or validated;
//! Type and Upstream errors surface mid-stream and abort the run.

pub mod context;
pub mod datatype;
pub mod errors;
pub mod expression;
pub mod pipeline;
pub mod processors;
pub mod row;
pub mod source;
pub mod stream;
pub mod value;
pub mod version;

pub use context::{FlowContext, DEFAULT_SPILL_THRESHOLD};
pub use datatype::{common_type, DataType, SqlType};
pub use errors::{FlowError, Result};
pub use expression::{is_truthy, EvalContext, Evaluator};
pub use pipeline::{PipelineBuilder, ProcessorDef, SourcePipeline};
pub use row::{DataField, DataRow};
pub use source::{ColumnTypeOverride, RecordsSource, Source};
pub use stream::{collect, rows, BoxRowStream, MemoryRows, RowStream};
pub use value::{compare, parse_text, Value};

pub use processors::correlate::{compare_keys, JoinMode, KeySpec, SecondaryCursor};
pub use processors::dynamic_field::DynamicFieldDef;
pub use processors::expr::ExpressionDef;
pub use processors::group_concat::GroupConcatDef;
pub use processors::limit::LimitDef;
pub use processors::map::{MapDef, Relabel};
pub use processors::merge::MergeDef;
pub use processors::offset::OffsetDef;
pub use processors::query::QueryDef;
pub use processors::script::ScriptDef;
pub use processors::sort::SortDef;
pub use version::VERSION;
