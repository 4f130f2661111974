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

//! # Rowflow Value Module
//!
//! Runtime values for pipeline fields, one variant per [`DataType`], plus the
//! three operations the processors build on:
//!
//! - **render**: canonical text form, used when casting to String and when
//!   GroupConcat joins values
//! - **cast**: checked conversion to a target type; widening always succeeds,
//!   narrowing succeeds only when exactly representable, String inputs are
//!   parsed per the target's canonical text format, and conversions with no
//!   direct path fall back to stringify-then-parse with a logged warning
//! - **compare**: DataType-aware total ordering with Null first, resolved
//!   through the common-type rules
//!
//! Casting never wraps or truncates silently; an impossible conversion is a
//! Type error that aborts the pipeline run.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::datatype::{common_type, DataType};
use crate::errors::{FlowError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATETIME_FORMAT_SPACED: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Runtime value of a pipeline field.
///
/// Variants mirror [`DataType`]; keeping the two in sync is an invariant of
/// this module.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl Value {
    /// The data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Integer(_) => DataType::Integer,
            Value::Long(_) => DataType::Long,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Boolean(_) => DataType::Boolean,
            Value::Date(_) => DataType::Date,
            Value::DateTime(_) => DataType::DateTime,
            Value::Time(_) => DataType::Time,
        }
    }

    /// True for the Null variant.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text rendering; Null renders as the empty string.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Boolean(v) => v.to_string(),
            Value::Date(v) => v.format(DATE_FORMAT).to_string(),
            Value::DateTime(v) => v.format(DATETIME_FORMAT).to_string(),
            Value::Time(v) => v.format(TIME_FORMAT).to_string(),
        }
    }

    /// Casts this value to `target`.
    ///
    /// Idempotent for values already of the target type. Null casts to Null
    /// for any target.
    pub fn cast(&self, target: DataType) -> Result<Value> {
        if self.data_type() == target {
            return Ok(self.clone());
        }
        if self.is_null() {
            return Ok(Value::Null);
        }

        match target {
            DataType::Null => Err(FlowError::type_error(format!(
                "cannot cast {} value to NULL",
                self.data_type().name()
            ))),
            DataType::String => Ok(Value::String(self.render())),
            DataType::Integer => self.cast_integer(),
            DataType::Long => self.cast_long(),
            DataType::Float => self.cast_float(),
            DataType::Double => self.cast_double(),
            DataType::Boolean => self.cast_boolean(),
            DataType::Date => self.cast_temporal(target),
            DataType::DateTime => self.cast_temporal(target),
            DataType::Time => self.cast_temporal(target),
        }
    }

    fn cast_integer(&self) -> Result<Value> {
        match self {
            Value::Long(v) => i32::try_from(*v).map(Value::Integer).map_err(|_| {
                FlowError::type_error(format!("LONG value {v} out of INTEGER range"))
            }),
            Value::Float(v) => float_to_integer(f64::from(*v)),
            Value::Double(v) => float_to_integer(*v),
            Value::String(v) => parse_text(v, DataType::Integer),
            other => other.parse_via_text(DataType::Integer),
        }
    }

    fn cast_long(&self) -> Result<Value> {
        match self {
            Value::Integer(v) => Ok(Value::Long(i64::from(*v))),
            Value::Float(v) => float_to_long(f64::from(*v)),
            Value::Double(v) => float_to_long(*v),
            Value::String(v) => parse_text(v, DataType::Long),
            other => other.parse_via_text(DataType::Long),
        }
    }

    fn cast_float(&self) -> Result<Value> {
        match self {
            Value::Integer(v) => Ok(Value::Float(*v as f32)),
            // Long sits below Float in the widening chain; precision loss on
            // very large magnitudes is part of the documented widening rule.
            Value::Long(v) => Ok(Value::Float(*v as f32)),
            Value::Double(v) => {
                let narrowed = *v as f32;
                if f64::from(narrowed) == *v {
                    Ok(Value::Float(narrowed))
                } else {
                    Err(FlowError::type_error(format!(
                        "DOUBLE value {v} not exactly representable as FLOAT"
                    )))
                }
            }
            Value::String(v) => parse_text(v, DataType::Float),
            other => other.parse_via_text(DataType::Float),
        }
    }

    fn cast_double(&self) -> Result<Value> {
        match self {
            Value::Integer(v) => Ok(Value::Double(f64::from(*v))),
            Value::Long(v) => Ok(Value::Double(*v as f64)),
            Value::Float(v) => Ok(Value::Double(f64::from(*v))),
            Value::String(v) => parse_text(v, DataType::Double),
            other => other.parse_via_text(DataType::Double),
        }
    }

    fn cast_boolean(&self) -> Result<Value> {
        match self {
            Value::String(v) => parse_text(v, DataType::Boolean),
            other => other.parse_via_text(DataType::Boolean),
        }
    }

    fn cast_temporal(&self, target: DataType) -> Result<Value> {
        match self {
            Value::String(v) => parse_text(v, target),
            other => other.parse_via_text(target),
        }
    }

    /// Fallback for conversions with no direct path: stringify the value,
    /// warn through the diagnostic sink, and attempt a textual parse. This
    /// normally fails with a Type error, surfacing the incompatible source
    /// class instead of wrapping it.
    fn parse_via_text(&self, target: DataType) -> Result<Value> {
        let text = self.render();
        log::warn!(
            "no direct cast from {} to {}; retrying via text '{}'",
            self.data_type().name(),
            target.name(),
            text
        );
        parse_text(&text, target)
    }
}

/// Parses the canonical text form of `target`.
pub fn parse_text(text: &str, target: DataType) -> Result<Value> {
    let trimmed = text.trim();
    match target {
        DataType::Null => Ok(Value::Null),
        DataType::String => Ok(Value::String(text.to_string())),
        DataType::Integer => trimmed
            .parse::<i32>()
            .map(Value::Integer)
            .map_err(|err| parse_error(trimmed, target, err)),
        DataType::Long => trimmed
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|err| parse_error(trimmed, target, err)),
        DataType::Float => trimmed
            .parse::<f32>()
            .map(Value::Float)
            .map_err(|err| parse_error(trimmed, target, err)),
        DataType::Double => trimmed
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|err| parse_error(trimmed, target, err)),
        DataType::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(Value::Boolean(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(Value::Boolean(false))
            } else {
                Err(FlowError::type_error(format!(
                    "cannot parse '{trimmed}' as BOOLEAN"
                )))
            }
        }
        DataType::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|err| parse_error(trimmed, target, err)),
        DataType::DateTime => NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT_SPACED))
            .map(Value::DateTime)
            .map_err(|err| parse_error(trimmed, target, err)),
        DataType::Time => NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
            .map(Value::Time)
            .map_err(|err| parse_error(trimmed, target, err)),
    }
}

fn parse_error(text: &str, target: DataType, err: impl std::fmt::Display) -> FlowError {
    FlowError::type_error(format!(
        "cannot parse '{text}' as {}: {err}",
        target.name()
    ))
}

fn float_to_integer(v: f64) -> Result<Value> {
    if v.fract() == 0.0 && v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) {
        Ok(Value::Integer(v as i32))
    } else {
        Err(FlowError::type_error(format!(
            "value {v} not exactly representable as INTEGER"
        )))
    }
}

fn float_to_long(v: f64) -> Result<Value> {
    // The upper bound is exclusive: i64::MAX rounds up to 2^63 as f64, so a
    // `<=` comparison would admit 2^63 and let `as` saturate.
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < 9_223_372_036_854_775_808.0 {
        Ok(Value::Long(v as i64))
    } else {
        Err(FlowError::type_error(format!(
            "value {v} not exactly representable as LONG"
        )))
    }
}

/// DataType-aware total ordering.
///
/// Null orders before every non-null value. Both sides are widened to their
/// common type before comparing; a pair with no common type is a Type error.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => return Ok(Ordering::Less),
        (false, true) => return Ok(Ordering::Greater),
        (false, false) => {}
    }

    let target = common_type(a.data_type(), b.data_type())?;
    let left = a.cast(target)?;
    let right = b.cast(target)?;

    let ordering = match (&left, &right) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Long(x), Value::Long(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::Double(x), Value::Double(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Time(x), Value::Time(y)) => x.cmp(y),
        _ => {
            return Err(FlowError::internal(format!(
                "cast to common type {} produced mismatched variants",
                target.name()
            )))
        }
    };
    Ok(ordering)
}
