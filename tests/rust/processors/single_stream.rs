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

//! Integration tests for the single-stream processors: limit, offset, map,
//! query, expression, script and sort.

use std::sync::Arc;

use rowflow::{
    collect, DataRow, DataType, EvalContext, Evaluator, ExpressionDef, FlowContext, FlowError,
    LimitDef, MapDef, OffsetDef, ProcessorDef, QueryDef, RecordsSource, Relabel, Result,
    ScriptDef, SortDef, Source, SourcePipeline, Value,
};
use serde_json::json;

/// Evaluator stub understanding a handful of fixed expressions.
struct StubEvaluator;

impl Evaluator for StubEvaluator {
    fn evaluate(&self, expression: &str, ctx: &EvalContext) -> Result<Value> {
        match expression {
            "id_is_even" => match ctx.row.value("id") {
                Some(Value::Integer(id)) => Ok(Value::Boolean(id % 2 == 0)),
                other => Err(FlowError::expression(
                    expression,
                    format!("unexpected id {other:?}"),
                )),
            },
            "double_id" => match ctx.row.value("id") {
                Some(Value::Integer(id)) => Ok(Value::Integer(id * 2)),
                other => Err(FlowError::expression(
                    expression,
                    format!("unexpected id {other:?}"),
                )),
            },
            "every_other" => Ok(Value::Boolean(ctx.iteration % 2 == 0)),
            "meta.user" => Ok(ctx
                .metadata
                .get("user")
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::Null)),
            other => Ok(Value::String(other.to_string())),
        }
    }
}

fn ids(count: i32) -> SourcePipeline {
    let records = (1..=count).map(|id| json!({"id": id})).collect();
    SourcePipeline::new(RecordsSource::new(records).unwrap().shared())
}

fn run(pipeline: &SourcePipeline, env: &FlowContext) -> Vec<DataRow> {
    let mut stream = pipeline.open(env).unwrap();
    collect(&mut stream).unwrap()
}

fn id_values(rows: &[DataRow]) -> Vec<i32> {
    rows.iter()
        .map(|row| match row.value("id") {
            Some(Value::Integer(id)) => *id,
            other => panic!("unexpected id {other:?}"),
        })
        .collect()
}

// Limit and Offset

#[test]
fn offset_then_limit_windows_the_stream() {
    let pipeline = ids(5)
        .with_processor(ProcessorDef::Offset(OffsetDef::new(1).unwrap()))
        .with_processor(ProcessorDef::Limit(LimitDef::new(2).unwrap()));
    let out = run(&pipeline, &FlowContext::new());
    assert_eq!(id_values(&out), vec![2, 3]);
}

#[test]
fn limit_zero_emits_nothing() {
    let pipeline = ids(3).with_processor(ProcessorDef::Limit(LimitDef::new(0).unwrap()));
    assert!(run(&pipeline, &FlowContext::new()).is_empty());
}

#[test]
fn offset_past_the_end_emits_nothing() {
    let pipeline = ids(3).with_processor(ProcessorDef::Offset(OffsetDef::new(10).unwrap()));
    assert!(run(&pipeline, &FlowContext::new()).is_empty());
}

#[test]
fn negative_counts_are_configuration_errors() {
    assert!(LimitDef::new(-1).unwrap_err().is_configuration());
    assert!(OffsetDef::new(-5).unwrap_err().is_configuration());
}

// Map

#[test]
fn relabels_apply_left_to_right() {
    let source = SourcePipeline::new(
        RecordsSource::new(vec![json!({"a": 1, "b": 2})])
            .unwrap()
            .shared(),
    );
    // The second relabel targets the field the first one just created.
    let map = MapDef::new(vec![
        Relabel::rename("a", "renamed"),
        Relabel::rename("renamed", "final"),
        Relabel::remove("b"),
    ])
    .unwrap();
    let pipeline = source.with_processor(ProcessorDef::Map(map));
    let out = run(&pipeline, &FlowContext::new());
    let names: Vec<&str> = out[0].names().collect();
    assert_eq!(names, vec!["final"]);
}

#[test]
fn blank_new_label_means_removal() {
    let source = SourcePipeline::new(
        RecordsSource::new(vec![json!({"a": 1, "b": 2})])
            .unwrap()
            .shared(),
    );
    let map = MapDef::new(vec![Relabel {
        source_label: "a".into(),
        new_label: Some("  ".into()),
    }])
    .unwrap();
    let pipeline = source.with_processor(ProcessorDef::Map(map));
    let out = run(&pipeline, &FlowContext::new());
    assert!(out[0].value("a").is_none());
}

// Query

#[test]
fn query_filters_with_typed_comparisons() {
    let source = SourcePipeline::new(
        RecordsSource::new(vec![
            json!({"id": 2, "name": "alpha"}),
            json!({"id": 10, "name": "beta"}),
            json!({"id": 30, "name": "alpha centauri"}),
        ])
        .unwrap()
        .shared(),
    );
    let pipeline = source.with_processor(ProcessorDef::Query(
        QueryDef::new("id=ge=10;name==alpha*").unwrap(),
    ));
    let out = run(&pipeline, &FlowContext::new());
    assert_eq!(id_values(&out), vec![30]);
}

// Expression

fn expression_env() -> FlowContext {
    FlowContext::new()
        .with_metadata("user", "amelie")
        .with_expression_evaluator(Arc::new(StubEvaluator))
}

#[test]
fn predicate_discards_non_true_rows() {
    let pipeline = ids(4).with_processor(ProcessorDef::Expression(ExpressionDef::filter(
        "id_is_even",
    )));
    let out = run(&pipeline, &expression_env());
    assert_eq!(id_values(&out), vec![2, 4]);
}

#[test]
fn iteration_counter_increments_per_predicate_evaluation() {
    // "every_other" keys off the counter, not row content: evaluations 0, 2
    // and 4 pass.
    let pipeline = ids(5).with_processor(ProcessorDef::Expression(ExpressionDef::filter(
        "every_other",
    )));
    let out = run(&pipeline, &expression_env());
    assert_eq!(id_values(&out), vec![1, 3, 5]);
}

#[test]
fn assignment_casts_to_the_declared_type() {
    let pipeline = ids(2).with_processor(ProcessorDef::Expression(ExpressionDef::assign(
        "doubled",
        DataType::Integer,
        "double_id",
    )));
    let out = run(&pipeline, &expression_env());
    assert_eq!(out[0].value("doubled"), Some(&Value::Integer(2)));
    assert_eq!(out[1].value("doubled"), Some(&Value::Integer(4)));
}

#[test]
fn assignment_reads_request_metadata() {
    let pipeline = ids(1).with_processor(ProcessorDef::Expression(ExpressionDef::assign(
        "requested_by",
        DataType::String,
        "meta.user",
    )));
    let out = run(&pipeline, &expression_env());
    assert_eq!(
        out[0].value("requested_by"),
        Some(&Value::String("amelie".into()))
    );
}

#[test]
fn overwriting_with_a_different_type_is_a_type_error() {
    // "id" holds an Integer; declaring it String must abort the run.
    let pipeline = ids(1).with_processor(ProcessorDef::Expression(ExpressionDef::assign(
        "id",
        DataType::String,
        "anything",
    )));
    let mut stream = pipeline.open(&expression_env()).unwrap();
    let err = collect(&mut stream).unwrap_err();
    assert!(matches!(err, FlowError::Type { .. }));
}

#[test]
fn missing_evaluator_fails_at_open() {
    let pipeline = ids(1).with_processor(ProcessorDef::Expression(ExpressionDef::filter(
        "id_is_even",
    )));
    match pipeline.open(&FlowContext::new()) {
        Err(err) => assert!(err.is_configuration()),
        Ok(_) => panic!("open must fail without an expression evaluator"),
    }
}

#[test]
fn predicate_and_assignment_require_at_least_one() {
    assert!(ExpressionDef::new(None, None, None, None).is_err());
    // field without fieldValue is inconsistent.
    assert!(ExpressionDef::new(None, Some("f".into()), None, None).is_err());
}

// Script

#[test]
fn script_uses_the_script_evaluator_slot() {
    let env = FlowContext::new().with_script_evaluator(Arc::new(StubEvaluator));
    let pipeline = ids(4).with_processor(ProcessorDef::Script(ScriptDef::filter("id_is_even")));
    let out = run(&pipeline, &env);
    assert_eq!(id_values(&out), vec![2, 4]);

    // The expression slot stays empty, so an Expression processor refuses to
    // run in the same context.
    let expression = ids(1).with_processor(ProcessorDef::Expression(ExpressionDef::filter(
        "id_is_even",
    )));
    match expression.open(&env) {
        Err(err) => assert!(err.is_configuration()),
        Ok(_) => panic!("open must fail without an expression evaluator"),
    }
}

// Sort

#[test]
fn sort_is_stable_over_equal_keys() {
    let source = SourcePipeline::new(
        RecordsSource::new(vec![
            json!({"k": 2, "tag": "first"}),
            json!({"k": 1, "tag": "second"}),
            json!({"k": 2, "tag": "third"}),
            json!({"k": 1, "tag": "fourth"}),
        ])
        .unwrap()
        .shared(),
    );
    let pipeline =
        source.with_processor(ProcessorDef::Sort(SortDef::new(vec!["k".into()]).unwrap()));
    let out = run(&pipeline, &FlowContext::new());
    let tags: Vec<&Value> = out.iter().map(|r| r.value("tag").unwrap()).collect();
    assert_eq!(
        tags,
        vec![
            &Value::String("second".into()),
            &Value::String("fourth".into()),
            &Value::String("first".into()),
            &Value::String("third".into()),
        ]
    );
}

#[test]
fn spilled_sort_matches_in_memory_sort() {
    let records: Vec<serde_json::Value> = (0..50)
        .map(|i| json!({"k": (91 - i * 7) % 17, "seq": i}))
        .collect();
    let build = || {
        SourcePipeline::new(RecordsSource::new(records.clone()).unwrap().shared())
            .with_processor(ProcessorDef::Sort(SortDef::new(vec!["k".into()]).unwrap()))
    };

    let in_memory = run(&build(), &FlowContext::new());
    // A tiny threshold forces several spill runs through the k-way merge.
    let spilled = run(&build(), &FlowContext::new().with_spill_threshold(4));
    assert_eq!(in_memory, spilled);
}

#[test]
fn sort_keys_missing_on_some_rows_order_first() {
    let source = SourcePipeline::new(
        RecordsSource::new(vec![
            json!({"k": 5, "id": 1}),
            json!({"k": null, "id": 2}),
            json!({"k": 3, "id": 3}),
        ])
        .unwrap()
        .shared(),
    );
    let pipeline =
        source.with_processor(ProcessorDef::Sort(SortDef::new(vec!["k".into()]).unwrap()));
    let out = run(&pipeline, &FlowContext::new());
    assert_eq!(id_values(&out), vec![2, 3, 1]);
}

/// Source whose stream fails after two rows.
#[derive(Debug)]
struct FailingSource;

impl Source for FailingSource {
    fn open(&self, _env: &FlowContext) -> Result<rowflow::BoxRowStream> {
        Ok(Box::new(FailingStream { served: 0 }))
    }
}

struct FailingStream {
    served: i32,
}

impl rowflow::RowStream for FailingStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        if self.served < 2 {
            self.served += 1;
            let mut row = DataRow::new();
            row.push_field("id", DataType::Integer, Value::Integer(self.served));
            return Ok(Some(row));
        }
        Err(FlowError::upstream("connection reset"))
    }
}

#[test]
fn upstream_error_aborts_sort_before_any_output() {
    let pipeline = SourcePipeline::new(Arc::new(FailingSource))
        .with_processor(ProcessorDef::Sort(SortDef::new(vec!["id".into()]).unwrap()));
    let mut stream = pipeline.open(&FlowContext::new()).unwrap();
    // The very first pull fails; no partially sorted prefix leaks out.
    let err = stream.next_row().unwrap_err();
    assert!(matches!(err, FlowError::Upstream { .. }));
    assert!(stream.next_row().unwrap().is_none());
}
