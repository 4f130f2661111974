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

//! # Rowflow Pipeline Module
//!
//! Pipeline assembly: a [`SourcePipeline`] is one Source plus an ordered list
//! of processors, and is also the recursive unit nested inside Merge,
//! GroupConcat and DynamicField as their secondary feed.
//!
//! Processors are a closed sum type, [`ProcessorDef`], dispatched by
//! exhaustive matching, so a misconfigured processor kind cannot survive past
//! config parsing. Definitions are immutable once built and cheap to clone,
//! so one pipeline definition serves any number of concurrent runs; all
//! per-run state lives in the stream objects [`SourcePipeline::open`]
//! produces.
//!
//! ## Building From Config
//!
//! [`PipelineBuilder`] assembles pipelines from JSON (or YAML) definitions
//! through named factory registries:
//!
//! ```json
//! {
//!   "source": {"type": "records", "records": [{"id": 1}]},
//!   "processors": [
//!     {"type": "query", "query": "id=gt=0"},
//!     {"type": "limit", "count": 10}
//!   ]
//! }
//! ```
//!
//! Correlated processors carry their nested pipeline definitions inline under
//! `pipeline` (or `fieldDefns`/`fieldValues` for dynamic_field), built
//! recursively through the same registries, so custom sources registered on
//! the builder are available at every nesting depth.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::context::FlowContext;
use crate::datatype::DataType;
use crate::errors::{FlowError, Result};
use crate::processors::correlate::{JoinMode, KeySpec};
use crate::processors::dynamic_field::DynamicFieldDef;
use crate::processors::expr::{EvaluatorSlot, ExpressionDef};
use crate::processors::group_concat::GroupConcatDef;
use crate::processors::limit::LimitDef;
use crate::processors::map::{MapDef, Relabel};
use crate::processors::merge::MergeDef;
use crate::processors::offset::OffsetDef;
use crate::processors::query::QueryDef;
use crate::processors::script::ScriptDef;
use crate::processors::sort::SortDef;
use crate::source::{ColumnTypeOverride, RecordsSource, Source};
use crate::stream::BoxRowStream;

/// Every processor kind a pipeline can contain.
#[derive(Clone, Debug)]
pub enum ProcessorDef {
    Limit(LimitDef),
    Offset(OffsetDef),
    Map(MapDef),
    Query(QueryDef),
    Expression(ExpressionDef),
    Script(ScriptDef),
    Sort(SortDef),
    Merge(MergeDef),
    GroupConcat(GroupConcatDef),
    DynamicField(DynamicFieldDef),
}

impl ProcessorDef {
    /// The registry name of this processor kind.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessorDef::Limit(_) => "limit",
            ProcessorDef::Offset(_) => "offset",
            ProcessorDef::Map(_) => "map",
            ProcessorDef::Query(_) => "query",
            ProcessorDef::Expression(_) => "expression",
            ProcessorDef::Script(_) => "script",
            ProcessorDef::Sort(_) => "sort",
            ProcessorDef::Merge(_) => "merge",
            ProcessorDef::GroupConcat(_) => "group_concat",
            ProcessorDef::DynamicField(_) => "dynamic_field",
        }
    }

    /// Cross-field validation that constructors alone cannot cover, plus
    /// recursive validation of nested pipelines.
    pub fn validate(&self) -> Result<()> {
        match self {
            ProcessorDef::Limit(_)
            | ProcessorDef::Offset(_)
            | ProcessorDef::Map(_)
            | ProcessorDef::Query(_)
            | ProcessorDef::Sort(_) => Ok(()),
            ProcessorDef::Expression(def) => def.check(),
            ProcessorDef::Script(def) => def.check(),
            ProcessorDef::Merge(def) => def.check(),
            ProcessorDef::GroupConcat(def) => def.check(),
            ProcessorDef::DynamicField(def) => def.check(),
        }
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream, env: &FlowContext) -> Result<BoxRowStream> {
        match self {
            ProcessorDef::Limit(def) => Ok(def.attach(upstream)),
            ProcessorDef::Offset(def) => Ok(def.attach(upstream)),
            ProcessorDef::Map(def) => Ok(def.attach(upstream)),
            ProcessorDef::Query(def) => Ok(def.attach(upstream)),
            ProcessorDef::Expression(def) => def.attach(upstream, env, EvaluatorSlot::Expression),
            ProcessorDef::Script(def) => def.attach(upstream, env),
            ProcessorDef::Sort(def) => Ok(def.attach(upstream, env)),
            ProcessorDef::Merge(def) => def.attach(upstream, env),
            ProcessorDef::GroupConcat(def) => def.attach(upstream, env),
            ProcessorDef::DynamicField(def) => def.attach(upstream, env),
        }
    }
}

/// One Source plus its ordered processor chain.
#[derive(Clone, Debug)]
pub struct SourcePipeline {
    source: Arc<dyn Source>,
    processors: Vec<ProcessorDef>,
}

impl SourcePipeline {
    pub fn new(source: Arc<dyn Source>) -> Self {
        SourcePipeline {
            source,
            processors: Vec::new(),
        }
    }

    /// Appends one processor to the chain.
    pub fn with_processor(mut self, processor: ProcessorDef) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn processors(&self) -> &[ProcessorDef] {
        &self.processors
    }

    /// Validates the full definition, nested pipelines included.
    pub fn validate(&self) -> Result<()> {
        for processor in &self.processors {
            processor.validate()?;
        }
        Ok(())
    }

    /// Opens one independent run of this pipeline: validates, opens the
    /// source, then chains every processor in order.
    ///
    /// Dropping the returned stream cancels the run, releasing the whole
    /// upstream chain including nested secondary pipelines and spill files.
    pub fn open(&self, env: &FlowContext) -> Result<BoxRowStream> {
        self.validate()?;
        let mut stream = self.source.open(env)?;
        for processor in &self.processors {
            stream = processor.attach(stream, env)?;
        }
        Ok(stream)
    }
}

type ProcessorFactory =
    Box<dyn Fn(&serde_json::Map<String, Json>, &PipelineBuilder) -> Result<ProcessorDef> + Send + Sync>;
type SourceFactory =
    Box<dyn Fn(&serde_json::Map<String, Json>) -> Result<Arc<dyn Source>> + Send + Sync>;

/// Builds [`SourcePipeline`]s from JSON/YAML definitions through named
/// processor and source factory registries.
pub struct PipelineBuilder {
    processors: BTreeMap<String, ProcessorFactory>,
    sources: BTreeMap<String, SourceFactory>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PipelineBuilder {
    /// An empty builder with no registered factories.
    pub fn new() -> Self {
        PipelineBuilder {
            processors: BTreeMap::new(),
            sources: BTreeMap::new(),
        }
    }

    /// A builder with every bundled processor and the `records` source
    /// registered.
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        builder.register_source("records", |config| {
            Ok(build_records_source(config)?.shared())
        });
        builder.register_processor("limit", |config, _| {
            Ok(ProcessorDef::Limit(LimitDef::new(i64_field(config, "count")?)?))
        });
        builder.register_processor("offset", |config, _| {
            Ok(ProcessorDef::Offset(OffsetDef::new(i64_field(
                config, "count",
            )?)?))
        });
        builder.register_processor("map", |config, _| {
            let items = list_field(config, "relabels")?;
            let mut relabels = Vec::with_capacity(items.len());
            for item in items {
                let item = as_object(item, "map relabel")?;
                relabels.push(Relabel {
                    source_label: str_field(item, "sourceLabel")?,
                    new_label: opt_str_field(item, "newLabel")?,
                });
            }
            Ok(ProcessorDef::Map(MapDef::new(relabels)?))
        });
        builder.register_processor("query", |config, _| {
            Ok(ProcessorDef::Query(QueryDef::new(str_field(
                config, "query",
            )?)?))
        });
        builder.register_processor("expression", |config, _| {
            Ok(ProcessorDef::Expression(ExpressionDef::new(
                opt_str_field(config, "predicate")?,
                opt_str_field(config, "field")?,
                opt_type_field(config, "fieldType")?,
                opt_str_field(config, "fieldValue")?,
            )?))
        });
        builder.register_processor("script", |config, _| {
            Ok(ProcessorDef::Script(ScriptDef::new(
                opt_str_field(config, "predicate")?,
                opt_str_field(config, "field")?,
                opt_type_field(config, "fieldType")?,
                opt_str_field(config, "fieldValue")?,
            )?))
        });
        builder.register_processor("sort", |config, _| {
            let mut def = SortDef::new(str_list_field(config, "fields")?)?;
            if let Some(threshold) = opt_u64_field(config, "spillThreshold")? {
                def = def.with_spill_threshold(threshold as usize);
            }
            Ok(ProcessorDef::Sort(def))
        });
        builder.register_processor("merge", |config, builder| {
            let child = builder.build_from_config(field(config, "pipeline")?)?;
            let mut def = MergeDef::new(
                key_field(config, "parentKeys")?,
                key_field(config, "childKeys")?,
                child,
            )?;
            def = def.with_mode(join_field(config)?);
            if let Some(delimiter) = opt_str_field(config, "delimiter")? {
                def = def.with_delimiter(delimiter);
            }
            Ok(ProcessorDef::Merge(def))
        });
        builder.register_processor("group_concat", |config, builder| {
            let child = builder.build_from_config(field(config, "pipeline")?)?;
            let mut def = GroupConcatDef::new(
                key_field(config, "parentKeys")?,
                key_field(config, "childKeys")?,
                child,
            )?;
            def = def.with_mode(join_field(config)?);
            if let Some(delimiter) = opt_str_field(config, "delimiter")? {
                def = def.with_delimiter(delimiter);
            }
            if let Some(column) = opt_str_field(config, "childValueColumn")? {
                def = def.with_child_value_column(column);
            }
            if let Some(column) = opt_str_field(config, "parentValueColumn")? {
                def = def.with_parent_value_column(column);
            }
            Ok(ProcessorDef::GroupConcat(def))
        });
        builder.register_processor("dynamic_field", |config, builder| {
            let defns = builder.build_from_config(field(config, "fieldDefns")?)?;
            let values = builder.build_from_config(field(config, "fieldValues")?)?;
            let mut def = DynamicFieldDef::new(
                key_field(config, "parentKeys")?,
                key_field(config, "valuesKeys")?,
                defns,
                values,
            )?;
            def = def.with_mode(join_field(config)?);
            if let Some(Json::Bool(true)) = config.get("caseInsensitive") {
                def = def.with_case_insensitive(true);
            }
            if let Some(column) = opt_str_field(config, "valuesFieldIdColumn")? {
                def = def.with_values_id_column(column);
            }
            if let Some(columns) = opt_str_list_field(config, "fallbackValueColumns")? {
                def = def.with_fallback_value_columns(columns);
            }
            let id = opt_str_field(config, "fieldIdColumn")?;
            let name = opt_str_field(config, "fieldNameColumn")?;
            let data_type = opt_str_field(config, "fieldTypeColumn")?;
            let value_column = opt_str_field(config, "fieldValueColumnColumn")?;
            if id.is_some() || name.is_some() || data_type.is_some() || value_column.is_some() {
                def = def.with_defn_columns(
                    id.unwrap_or_else(|| "fieldId".to_string()),
                    name.unwrap_or_else(|| "fieldName".to_string()),
                    data_type.unwrap_or_else(|| "fieldType".to_string()),
                    value_column.unwrap_or_else(|| "fieldValueColumn".to_string()),
                );
            }
            Ok(ProcessorDef::DynamicField(def))
        });
        builder
    }

    /// Registers (or replaces) a processor factory under `name`.
    pub fn register_processor<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Map<String, Json>, &PipelineBuilder) -> Result<ProcessorDef>
            + Send
            + Sync
            + 'static,
    {
        self.processors.insert(name.into(), Box::new(factory));
    }

    /// Registers (or replaces) a source factory under `name`.
    pub fn register_source<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Map<String, Json>) -> Result<Arc<dyn Source>> + Send + Sync + 'static,
    {
        self.sources.insert(name.into(), Box::new(factory));
    }

    /// Builds a pipeline from a JSON definition.
    pub fn build_from_config(&self, config: &Json) -> Result<SourcePipeline> {
        let config = as_object(config, "pipeline definition")?;

        let source_config = as_object(field(config, "source")?, "source definition")?;
        let source_kind = str_field(source_config, "type")?;
        let source_factory = self.sources.get(&source_kind).ok_or_else(|| {
            FlowError::configuration(format!(
                "unknown source type '{source_kind}' (registered: {})",
                keys(&self.sources)
            ))
        })?;
        let mut pipeline = SourcePipeline::new(source_factory(source_config)?);

        if let Some(processors) = config.get("processors") {
            let processors = processors.as_array().ok_or_else(|| {
                FlowError::configuration("'processors' must be an array")
            })?;
            for processor_config in processors {
                let processor_config = as_object(processor_config, "processor definition")?;
                let kind = str_field(processor_config, "type")?;
                let factory = self.processors.get(&kind).ok_or_else(|| {
                    FlowError::configuration(format!(
                        "unknown processor type '{kind}' (registered: {})",
                        keys(&self.processors)
                    ))
                })?;
                pipeline = pipeline.with_processor(factory(processor_config, self)?);
            }
        }

        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Builds a pipeline from a YAML definition.
    pub fn build_from_yaml(&self, yaml: &str) -> Result<SourcePipeline> {
        let config: Json = serde_yaml::from_str(yaml)
            .map_err(|err| FlowError::configuration(format!("invalid YAML pipeline: {err}")))?;
        self.build_from_config(&config)
    }
}

fn build_records_source(config: &serde_json::Map<String, Json>) -> Result<RecordsSource> {
    let records = list_field(config, "records")?.to_vec();
    let mut source = RecordsSource::new(records)?;
    if let Some(overrides) = config.get("overrides") {
        let overrides = overrides
            .as_array()
            .ok_or_else(|| FlowError::configuration("'overrides' must be an array"))?;
        let mut parsed = Vec::with_capacity(overrides.len());
        for over in overrides {
            let over = as_object(over, "type override")?;
            parsed.push(ColumnTypeOverride {
                column: str_field(over, "column")?,
                data_type: DataType::parse_name(&str_field(over, "dataType")?)?,
            });
        }
        source = source.with_overrides(parsed);
    }
    Ok(source)
}

// Small config accessors; every failure is a Configuration error naming the
// offending key.

fn keys<V>(map: &BTreeMap<String, V>) -> String {
    map.keys().cloned().collect::<Vec<_>>().join(", ")
}

fn as_object<'a>(value: &'a Json, what: &str) -> Result<&'a serde_json::Map<String, Json>> {
    value
        .as_object()
        .ok_or_else(|| FlowError::configuration(format!("{what} must be a JSON object")))
}

fn field<'a>(map: &'a serde_json::Map<String, Json>, key: &str) -> Result<&'a Json> {
    map.get(key)
        .ok_or_else(|| FlowError::configuration(format!("missing required key '{key}'")))
}

fn str_field(map: &serde_json::Map<String, Json>, key: &str) -> Result<String> {
    field(map, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FlowError::configuration(format!("'{key}' must be a string")))
}

fn opt_str_field(map: &serde_json::Map<String, Json>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Json::Null) => Ok(None),
        Some(Json::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(FlowError::configuration(format!(
            "'{key}' must be a string"
        ))),
    }
}

fn i64_field(map: &serde_json::Map<String, Json>, key: &str) -> Result<i64> {
    field(map, key)?
        .as_i64()
        .ok_or_else(|| FlowError::configuration(format!("'{key}' must be an integer")))
}

fn opt_u64_field(map: &serde_json::Map<String, Json>, key: &str) -> Result<Option<u64>> {
    match map.get(key) {
        None | Some(Json::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            FlowError::configuration(format!("'{key}' must be a non-negative integer"))
        }),
    }
}

fn list_field<'a>(map: &'a serde_json::Map<String, Json>, key: &str) -> Result<&'a [Json]> {
    field(map, key)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| FlowError::configuration(format!("'{key}' must be an array")))
}

fn str_list_field(map: &serde_json::Map<String, Json>, key: &str) -> Result<Vec<String>> {
    list_field(map, key)?
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| FlowError::configuration(format!("'{key}' must contain strings")))
        })
        .collect()
}

fn opt_str_list_field(
    map: &serde_json::Map<String, Json>,
    key: &str,
) -> Result<Option<Vec<String>>> {
    match map.get(key) {
        None | Some(Json::Null) => Ok(None),
        Some(_) => str_list_field(map, key).map(Some),
    }
}

fn opt_type_field(map: &serde_json::Map<String, Json>, key: &str) -> Result<Option<DataType>> {
    match opt_str_field(map, key)? {
        Some(name) => Ok(Some(DataType::parse_name(&name)?)),
        None => Ok(None),
    }
}

fn key_field(map: &serde_json::Map<String, Json>, key: &str) -> Result<KeySpec> {
    KeySpec::new(str_list_field(map, key)?)
}

fn join_field(map: &serde_json::Map<String, Json>) -> Result<JoinMode> {
    match opt_str_field(map, "join")? {
        None => Ok(JoinMode::default()),
        Some(mode) => match mode.to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinMode::Inner),
            "outer" => Ok(JoinMode::Outer),
            other => Err(FlowError::configuration(format!(
                "unknown join mode '{other}', expected 'inner' or 'outer'"
            ))),
        },
    }
}
