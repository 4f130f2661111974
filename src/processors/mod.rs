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

//! # Processors Module
//!
//! All row-stream processors available in Rowflow pipelines. Each processor
//! is a definition struct (immutable, shareable configuration) that attaches
//! to an upstream stream and yields a new stream.
//!
//! ## Processor Categories
//!
//! - **Single-stream**: limit, offset, map, query, expression, script, sort.
//!   Stateless or locally-stateful transforms over one input stream.
//! - **Correlated**: merge, group_concat, dynamic_field. Sorted-merge
//!   algorithms joining the primary stream with nested secondary pipelines.
//!
//! The shared sorted-merge machinery (key tuples, secondary cursors) lives in
//! [`correlate`].

pub mod correlate;
pub mod dynamic_field;
pub mod expr;
pub mod group_concat;
pub mod limit;
pub mod map;
pub mod merge;
pub mod offset;
pub mod query;
pub mod script;
pub mod sort;
