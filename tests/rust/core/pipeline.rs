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

//! Integration tests for pipeline assembly: the config-driven builder,
//! end-to-end runs over nested pipelines, and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rowflow::{
    collect, BoxRowStream, DataRow, DataType, FlowContext, FlowError, PipelineBuilder, Result,
    RowStream, Source, SourcePipeline, Value,
};
use serde_json::json;

fn run_json(config: serde_json::Value) -> Vec<DataRow> {
    let builder = PipelineBuilder::with_defaults();
    let pipeline = builder.build_from_config(&config).unwrap();
    let mut stream = pipeline.open(&FlowContext::new()).unwrap();
    collect(&mut stream).unwrap()
}

#[test]
fn group_concat_end_to_end() {
    let out = run_json(json!({
        "source": {"type": "records", "records": [
            {"id": 1, "name": "x"},
            {"id": 2, "name": "y"},
        ]},
        "processors": [{
            "type": "group_concat",
            "parentKeys": ["id"],
            "childKeys": ["id"],
            "childValueColumn": "tag",
            "parentValueColumn": "tags",
            "pipeline": {
                "source": {"type": "records", "records": [
                    {"id": 1, "tag": "a"},
                    {"id": 1, "tag": "b"},
                    {"id": 2, "tag": "c"},
                ]}
            }
        }]
    }));

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].value("id"), Some(&Value::Integer(1)));
    assert_eq!(out[0].value("name"), Some(&Value::String("x".into())));
    assert_eq!(out[0].value("tags"), Some(&Value::String("a, b".into())));
    assert_eq!(out[1].value("tags"), Some(&Value::String("c".into())));
}

#[test]
fn dynamic_field_builds_from_config() {
    let out = run_json(json!({
        "source": {"type": "records", "records": [{"id": 1}]},
        "processors": [{
            "type": "dynamic_field",
            "parentKeys": ["id"],
            "valuesKeys": ["id"],
            "fieldDefns": {
                "source": {"type": "records", "records": [
                    {"fieldId": "h", "fieldName": "height", "fieldType": "INTEGER",
                     "fieldValueColumn": "intVal"},
                ]}
            },
            "fieldValues": {
                "source": {"type": "records", "records": [
                    {"id": 1, "fieldId": "h", "intVal": 12},
                ]}
            }
        }]
    }));
    assert_eq!(out[0].value("height"), Some(&Value::Integer(12)));
}

#[test]
fn processors_chain_in_declaration_order() {
    // limit-then-offset and offset-then-limit are different windows.
    let records = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
    let first = run_json(json!({
        "source": {"type": "records", "records": records.clone()},
        "processors": [
            {"type": "offset", "count": 1},
            {"type": "limit", "count": 1},
        ]
    }));
    let second = run_json(json!({
        "source": {"type": "records", "records": records},
        "processors": [
            {"type": "limit", "count": 1},
            {"type": "offset", "count": 1},
        ]
    }));
    assert_eq!(first[0].value("id"), Some(&Value::Integer(2)));
    assert!(second.is_empty());
}

#[test]
fn yaml_and_json_definitions_are_equivalent() -> anyhow::Result<()> {
    let builder = PipelineBuilder::with_defaults();
    let from_yaml = builder.build_from_yaml(
        r#"
source:
  type: records
  records:
    - id: 1
    - id: 2
processors:
  - type: query
    query: id==1
"#,
    )?;
    let from_json = builder.build_from_config(&json!({
        "source": {"type": "records", "records": [{"id": 1}, {"id": 2}]},
        "processors": [{"type": "query", "query": "id==1"}]
    }))?;

    let env = FlowContext::new();
    let yaml_rows = collect(&mut from_yaml.open(&env)?)?;
    let json_rows = collect(&mut from_json.open(&env)?)?;
    assert_eq!(yaml_rows, json_rows);
    Ok(())
}

#[test]
fn type_overrides_flow_through_the_records_source() {
    let out = run_json(json!({
        "source": {
            "type": "records",
            "records": [{"day": "2024-03-09"}],
            "overrides": [{"column": "day", "dataType": "DATE"}]
        }
    }));
    assert_eq!(out[0].field("day").unwrap().data_type, DataType::Date);
}

#[test]
fn config_errors_name_the_offending_piece() {
    let builder = PipelineBuilder::with_defaults();

    let unknown_source = builder
        .build_from_config(&json!({"source": {"type": "quantum"}}))
        .unwrap_err();
    assert!(unknown_source.is_configuration());
    assert!(unknown_source.to_string().contains("quantum"));

    let negative_offset = builder
        .build_from_config(&json!({
            "source": {"type": "records", "records": []},
            "processors": [{"type": "offset", "count": -2}]
        }))
        .unwrap_err();
    assert!(negative_offset.is_configuration());

    let missing_query = builder
        .build_from_config(&json!({
            "source": {"type": "records", "records": []},
            "processors": [{"type": "query"}]
        }))
        .unwrap_err();
    assert!(missing_query.to_string().contains("query"));
}

/// Source that records whether its stream has been dropped.
#[derive(Debug)]
struct TrackedSource {
    released: Arc<AtomicBool>,
}

impl Source for TrackedSource {
    fn open(&self, _env: &FlowContext) -> Result<BoxRowStream> {
        Ok(Box::new(TrackedStream {
            next_id: 1,
            released: Arc::clone(&self.released),
        }))
    }
}

struct TrackedStream {
    next_id: i32,
    released: Arc<AtomicBool>,
}

impl RowStream for TrackedStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        let mut row = DataRow::new();
        row.push_field("id", DataType::Integer, Value::Integer(self.next_id));
        self.next_id += 1;
        Ok(Some(row))
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[test]
fn reaching_a_limit_releases_the_upstream_chain() {
    let released = Arc::new(AtomicBool::new(false));
    let pipeline = SourcePipeline::new(Arc::new(TrackedSource {
        released: Arc::clone(&released),
    }))
    .with_processor(rowflow::ProcessorDef::Limit(
        rowflow::LimitDef::new(1).unwrap(),
    ));

    let mut stream = pipeline.open(&FlowContext::new()).unwrap();
    assert!(stream.next_row().unwrap().is_some());
    // The limit is exhausted: the infinite source must already be gone even
    // though the consumer still holds the output stream.
    assert!(released.load(Ordering::SeqCst));
    assert!(stream.next_row().unwrap().is_none());
}

#[test]
fn dropping_the_output_stream_cancels_nested_pipelines() {
    let released = Arc::new(AtomicBool::new(false));
    let builder = PipelineBuilder::with_defaults();
    let mut pipeline = builder
        .build_from_config(&json!({
            "source": {"type": "records", "records": [
                {"id": 1}, {"id": 2}, {"id": 3},
            ]},
        }))
        .unwrap();
    // Wire a tracked secondary pipeline into a merge by hand.
    let secondary = SourcePipeline::new(Arc::new(TrackedSource {
        released: Arc::clone(&released),
    }));
    pipeline = pipeline.with_processor(rowflow::ProcessorDef::Merge(
        rowflow::MergeDef::new(
            rowflow::KeySpec::single("id").unwrap(),
            rowflow::KeySpec::single("id").unwrap(),
            secondary,
        )
        .unwrap(),
    ));

    let mut stream = pipeline.open(&FlowContext::new()).unwrap();
    assert!(stream.next_row().unwrap().is_some());
    assert!(!released.load(Ordering::SeqCst));
    // Consumer walks away mid-stream; the nested pipeline goes with it.
    drop(stream);
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn one_definition_serves_many_concurrent_runs() {
    let builder = PipelineBuilder::with_defaults();
    let pipeline = builder
        .build_from_config(&json!({
            "source": {"type": "records", "records": [{"id": 1}, {"id": 2}]},
            "processors": [{"type": "sort", "fields": ["id"]}]
        }))
        .unwrap();

    let pipeline = Arc::new(pipeline);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                let mut stream = pipeline.open(&FlowContext::new()).unwrap();
                collect(&mut stream).unwrap().len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
}
