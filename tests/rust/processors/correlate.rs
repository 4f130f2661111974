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

//! Integration tests for the correlated processors: merge, group_concat and
//! dynamic_field over nested pipelines.

use rowflow::{
    collect, DataRow, DynamicFieldDef, FlowContext, FlowError, GroupConcatDef, JoinMode, KeySpec,
    MergeDef, ProcessorDef, RecordsSource, SourcePipeline, Value,
};
use serde_json::json;

fn pipeline_of(records: Vec<serde_json::Value>) -> SourcePipeline {
    SourcePipeline::new(RecordsSource::new(records).unwrap().shared())
}

fn run(pipeline: &SourcePipeline) -> Vec<DataRow> {
    let mut stream = pipeline.open(&FlowContext::new()).unwrap();
    collect(&mut stream).unwrap()
}

fn id_key() -> KeySpec {
    KeySpec::single("id").unwrap()
}

// Merge

fn primary_123() -> SourcePipeline {
    pipeline_of(vec![
        json!({"id": 1, "name": "x"}),
        json!({"id": 2, "name": "y"}),
        json!({"id": 3, "name": "z"}),
    ])
}

fn secondary_13() -> SourcePipeline {
    pipeline_of(vec![
        json!({"id": 1, "extra": "a"}),
        json!({"id": 3, "extra": "c"}),
    ])
}

#[test]
fn merge_outer_keeps_every_primary_row() {
    let merge = MergeDef::new(id_key(), id_key(), secondary_13()).unwrap();
    let pipeline = primary_123().with_processor(ProcessorDef::Merge(merge));
    let out = run(&pipeline);
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].value("extra"), Some(&Value::String("a".into())));
    // Key 2 has no match: the row passes through with the field unset.
    assert_eq!(out[1].value("extra"), None);
    assert_eq!(out[2].value("extra"), Some(&Value::String("c".into())));
}

#[test]
fn merge_inner_drops_unmatched_primary_rows() {
    let merge = MergeDef::new(id_key(), id_key(), secondary_13())
        .unwrap()
        .with_mode(JoinMode::Inner);
    let pipeline = primary_123().with_processor(ProcessorDef::Merge(merge));
    let out = run(&pipeline);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].value("id"), Some(&Value::Integer(1)));
    assert_eq!(out[1].value("id"), Some(&Value::Integer(3)));
}

#[test]
fn consecutive_equal_primary_keys_share_one_secondary_run() {
    let primary = pipeline_of(vec![
        json!({"id": 1, "seq": 1}),
        json!({"id": 1, "seq": 2}),
        json!({"id": 2, "seq": 3}),
    ]);
    let secondary = pipeline_of(vec![
        json!({"id": 1, "extra": "a"}),
        json!({"id": 2, "extra": "b"}),
    ]);
    let merge = MergeDef::new(id_key(), id_key(), secondary).unwrap();
    let pipeline = primary.with_processor(ProcessorDef::Merge(merge));
    let out = run(&pipeline);
    // Both id=1 rows see the cached run even though the secondary stream
    // holds a single id=1 row.
    assert_eq!(out[0].value("extra"), Some(&Value::String("a".into())));
    assert_eq!(out[1].value("extra"), Some(&Value::String("a".into())));
    assert_eq!(out[2].value("extra"), Some(&Value::String("b".into())));
}

#[test]
fn composite_keys_match_column_by_column() {
    let primary = pipeline_of(vec![
        json!({"region": "eu", "id": 1}),
        json!({"region": "eu", "id": 2}),
        json!({"region": "us", "id": 1}),
    ]);
    let secondary = pipeline_of(vec![
        json!({"region": "eu", "id": 2, "extra": "match"}),
        json!({"region": "us", "id": 1, "extra": "other"}),
    ]);
    let keys = KeySpec::new(vec!["region".into(), "id".into()]).unwrap();
    let merge = MergeDef::new(keys.clone(), keys, secondary).unwrap();
    let pipeline = primary.with_processor(ProcessorDef::Merge(merge));
    let out = run(&pipeline);
    assert_eq!(out[0].value("extra"), None);
    assert_eq!(out[1].value("extra"), Some(&Value::String("match".into())));
    assert_eq!(out[2].value("extra"), Some(&Value::String("other".into())));
}

#[test]
fn merge_takes_the_first_matching_row_only() {
    let secondary = pipeline_of(vec![
        json!({"id": 1, "extra": "first"}),
        json!({"id": 1, "extra": "second"}),
    ]);
    let merge = MergeDef::new(id_key(), id_key(), secondary).unwrap();
    let pipeline = primary_123().with_processor(ProcessorDef::Merge(merge));
    let out = run(&pipeline);
    assert_eq!(out[0].value("extra"), Some(&Value::String("first".into())));
}

// GroupConcat

#[test]
fn group_concat_defaults_to_comma_space() {
    let primary = pipeline_of(vec![json!({"id": 1})]);
    let secondary = pipeline_of(vec![
        json!({"id": 1, "tag": "a"}),
        json!({"id": 1, "tag": "b"}),
        json!({"id": 1, "tag": "c"}),
    ]);
    let concat = GroupConcatDef::new(id_key(), id_key(), secondary)
        .unwrap()
        .with_child_value_column("tag")
        .with_parent_value_column("tags");
    let pipeline = primary.with_processor(ProcessorDef::GroupConcat(concat));
    let out = run(&pipeline);
    assert_eq!(out[0].value("tags"), Some(&Value::String("a, b, c".into())));
}

#[test]
fn group_concat_preserves_secondary_row_order() {
    let primary = pipeline_of(vec![json!({"id": 1})]);
    let secondary = pipeline_of(vec![
        json!({"id": 1, "tag": "z"}),
        json!({"id": 1, "tag": "a"}),
    ]);
    let concat = GroupConcatDef::new(id_key(), id_key(), secondary)
        .unwrap()
        .with_child_value_column("tag");
    let pipeline = primary.with_processor(ProcessorDef::GroupConcat(concat));
    let out = run(&pipeline);
    // Stream order, not sorted order.
    assert_eq!(out[0].value("tag"), Some(&Value::String("z, a".into())));
}

#[test]
fn group_concat_without_columns_concatenates_each_non_key_column() {
    let primary = pipeline_of(vec![json!({"id": 1}), json!({"id": 2})]);
    let secondary = pipeline_of(vec![
        json!({"id": 1, "tag": "a", "note": "n1"}),
        json!({"id": 1, "tag": "b", "note": "n2"}),
        json!({"id": 2, "tag": "c", "note": "n3"}),
    ]);
    let concat = GroupConcatDef::new(id_key(), id_key(), secondary).unwrap();
    let pipeline = primary.with_processor(ProcessorDef::GroupConcat(concat));
    let out = run(&pipeline);
    assert_eq!(out[0].value("tag"), Some(&Value::String("a, b".into())));
    assert_eq!(out[0].value("note"), Some(&Value::String("n1, n2".into())));
    assert_eq!(out[1].value("tag"), Some(&Value::String("c".into())));
}

#[test]
fn group_concat_outer_leaves_unmatched_rows_untouched() {
    let primary = pipeline_of(vec![json!({"id": 1}), json!({"id": 9})]);
    let secondary = pipeline_of(vec![json!({"id": 1, "tag": "a"})]);
    let concat = GroupConcatDef::new(id_key(), id_key(), secondary)
        .unwrap()
        .with_child_value_column("tag")
        .with_parent_value_column("tags");
    let pipeline = primary.with_processor(ProcessorDef::GroupConcat(concat));
    let out = run(&pipeline);
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].value("tags"), None);
}

// DynamicField

fn field_defns() -> SourcePipeline {
    pipeline_of(vec![
        json!({"fieldId": "w", "fieldName": "weight", "fieldType": "DOUBLE",
               "fieldValueColumn": "numVal"}),
        json!({"fieldId": "c", "fieldName": "color", "fieldType": "STRING",
               "fieldValueColumn": "textVal"}),
    ])
}

#[test]
fn dynamic_fields_follow_definition_order_not_arrival_order() {
    let primary = pipeline_of(vec![json!({"id": 1, "name": "x"})]);
    let values = pipeline_of(vec![
        // color arrives before weight; output order still follows the
        // definitions feed.
        json!({"id": 1, "fieldId": "c", "textVal": "blue", "numVal": null}),
        json!({"id": 1, "fieldId": "w", "textVal": null, "numVal": 2.5}),
    ]);
    let pivot = DynamicFieldDef::new(id_key(), id_key(), field_defns(), values).unwrap();
    let pipeline = primary.with_processor(ProcessorDef::DynamicField(pivot));
    let out = run(&pipeline);
    let names: Vec<&str> = out[0].names().collect();
    assert_eq!(names, vec!["id", "name", "weight", "color"]);
    assert_eq!(out[0].value("weight"), Some(&Value::Double(2.5)));
    assert_eq!(out[0].value("color"), Some(&Value::String("blue".into())));
}

#[test]
fn values_cast_to_the_declared_field_type() {
    let primary = pipeline_of(vec![json!({"id": 1})]);
    // numVal arrives as an integer; the definition declares DOUBLE.
    let values = pipeline_of(vec![json!({"id": 1, "fieldId": "w", "numVal": 3})]);
    let pivot = DynamicFieldDef::new(id_key(), id_key(), field_defns(), values).unwrap();
    let pipeline = primary.with_processor(ProcessorDef::DynamicField(pivot));
    let out = run(&pipeline);
    assert_eq!(out[0].value("weight"), Some(&Value::Double(3.0)));
}

#[test]
fn unknown_field_id_aborts_the_run() {
    let primary = pipeline_of(vec![json!({"id": 1})]);
    let values = pipeline_of(vec![json!({"id": 1, "fieldId": "nope", "numVal": 1})]);
    let pivot = DynamicFieldDef::new(id_key(), id_key(), field_defns(), values).unwrap();
    let pipeline = primary.with_processor(ProcessorDef::DynamicField(pivot));
    let mut stream = pipeline.open(&FlowContext::new()).unwrap();
    let err = collect(&mut stream).unwrap_err();
    assert!(matches!(err, FlowError::Type { .. }));
}

#[test]
fn dynamic_field_outer_emits_rows_without_values() {
    let primary = pipeline_of(vec![json!({"id": 1}), json!({"id": 2})]);
    let values = pipeline_of(vec![json!({"id": 1, "fieldId": "w", "numVal": 1.0})]);
    let pivot = DynamicFieldDef::new(id_key(), id_key(), field_defns(), values).unwrap();
    let pipeline = primary.with_processor(ProcessorDef::DynamicField(pivot));
    let out = run(&pipeline);
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].value("weight"), None);
    assert_eq!(out[1].value("color"), None);
}

#[test]
fn dynamic_field_inner_drops_rows_without_values() {
    let primary = pipeline_of(vec![json!({"id": 1}), json!({"id": 2})]);
    let values = pipeline_of(vec![json!({"id": 1, "fieldId": "w", "numVal": 1.0})]);
    let pivot = DynamicFieldDef::new(id_key(), id_key(), field_defns(), values)
        .unwrap()
        .with_mode(JoinMode::Inner);
    let pipeline = primary.with_processor(ProcessorDef::DynamicField(pivot));
    let out = run(&pipeline);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].value("id"), Some(&Value::Integer(1)));
}

#[test]
fn deprecated_fallback_columns_resolve_when_no_pointer_exists() {
    let defns = pipeline_of(vec![
        json!({"fieldId": "w", "fieldName": "weight", "fieldType": "DOUBLE",
               "fieldValueColumn": null}),
    ]);
    let values = pipeline_of(vec![
        json!({"id": 1, "fieldId": "w", "legacyA": null, "legacyB": 4.5}),
    ]);
    let primary = pipeline_of(vec![json!({"id": 1})]);
    let pivot = DynamicFieldDef::new(id_key(), id_key(), defns, values)
        .unwrap()
        .with_fallback_value_columns(vec!["legacyA".into(), "legacyB".into()]);
    let pipeline = primary.with_processor(ProcessorDef::DynamicField(pivot));
    let out = run(&pipeline);
    // First non-null candidate wins: legacyA is null, legacyB carries the
    // value.
    assert_eq!(out[0].value("weight"), Some(&Value::Double(4.5)));
}

#[test]
fn case_insensitive_mode_matches_ids_and_columns() {
    let values = pipeline_of(vec![json!({"id": 1, "FIELDID": "W", "NUMVAL": 9.0})]);
    let primary = pipeline_of(vec![json!({"id": 1})]);
    let pivot = DynamicFieldDef::new(id_key(), id_key(), field_defns(), values)
        .unwrap()
        .with_case_insensitive(true);
    let pipeline = primary.with_processor(ProcessorDef::DynamicField(pivot));
    let out = run(&pipeline);
    assert_eq!(out[0].value("weight"), Some(&Value::Double(9.0)));
}

#[test]
fn key_specs_of_different_widths_are_rejected() {
    let wide = KeySpec::new(vec!["id".into(), "sub".into()]).unwrap();
    assert!(MergeDef::new(id_key(), wide.clone(), secondary_13())
        .unwrap_err()
        .is_configuration());
    assert!(GroupConcatDef::new(id_key(), wide.clone(), secondary_13())
        .unwrap_err()
        .is_configuration());
    assert!(
        DynamicFieldDef::new(id_key(), wide, field_defns(), secondary_13())
            .unwrap_err()
            .is_configuration()
    );
}
