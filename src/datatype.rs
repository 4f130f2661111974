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

//! # Rowflow DataType Module
//!
//! Canonical value types for every field flowing through a pipeline, plus the
//! two operations the rest of the engine builds on:
//!
//! - **common_type**: the widening partial order used when fields of
//!   different inferred types must coexist (heterogeneous sources, sort keys,
//!   merge keys)
//! - **SqlType mapping**: conversion to and from an external relational type
//!   enumeration, consumed by source connectors
//!
//! Casting of concrete values lives in [`crate::value`]; this module only
//! reasons about the types themselves.
//!
//! ## Widening Rules
//!
//! - `Null` unifies with anything
//! - Numeric types widen along `Integer < Long < Float < Double`
//! - `Date`, `DateTime` and `Time` unify only with themselves, `Null`, or
//!   `String`
//! - Every remaining pair widens to `String`
//! - A temporal type against a numeric type has no common type

use serde::{Deserialize, Serialize};

use crate::errors::{FlowError, Result};

/// Canonical data types for pipeline fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Absence of a value; unifies with every other type.
    Null,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// 32-bit floating point number.
    Float,
    /// 64-bit floating point number.
    Double,
    /// UTF-8 text.
    String,
    /// Boolean type.
    Boolean,
    /// Calendar date without time zone.
    Date,
    /// Date and time without time zone.
    DateTime,
    /// Time of day without time zone.
    Time,
}

/// External relational type enumeration, mirroring the subset of SQL types
/// source connectors report for result columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Null,
    Integer,
    BigInt,
    Real,
    Double,
    Varchar,
    Boolean,
    Date,
    Timestamp,
    Time,
}

impl DataType {
    /// Byte-size hint used for buffer pre-sizing; `-1` when unknown (String).
    pub fn byte_size(&self) -> i32 {
        match self {
            DataType::Null => 0,
            DataType::Integer => 4,
            DataType::Long => 8,
            DataType::Float => 4,
            DataType::Double => 8,
            DataType::String => -1,
            DataType::Boolean => 1,
            DataType::Date => 8,
            DataType::DateTime => 8,
            DataType::Time => 8,
        }
    }

    /// Canonical upper-case name, also accepted by [`DataType::parse_name`].
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::Integer => "INTEGER",
            DataType::Long => "LONG",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::String => "STRING",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::DateTime => "DATETIME",
            DataType::Time => "TIME",
        }
    }

    /// Parses a type name, case-insensitively.
    ///
    /// Used by DynamicField definitions whose type column carries textual
    /// type names.
    pub fn parse_name(name: &str) -> Result<DataType> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NULL" => Ok(DataType::Null),
            "INTEGER" | "INT" => Ok(DataType::Integer),
            "LONG" | "BIGINT" => Ok(DataType::Long),
            "FLOAT" => Ok(DataType::Float),
            "DOUBLE" => Ok(DataType::Double),
            "STRING" | "VARCHAR" | "TEXT" => Ok(DataType::String),
            "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
            "DATE" => Ok(DataType::Date),
            "DATETIME" | "TIMESTAMP" => Ok(DataType::DateTime),
            "TIME" => Ok(DataType::Time),
            other => Err(FlowError::type_error(format!(
                "unknown data type name '{other}'"
            ))),
        }
    }

    /// True for Integer, Long, Float and Double.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::Long | DataType::Float | DataType::Double
        )
    }

    /// True for Date, DateTime and Time.
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime | DataType::Time)
    }

    /// Position in the numeric widening chain; None for non-numeric types.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::Integer => Some(0),
            DataType::Long => Some(1),
            DataType::Float => Some(2),
            DataType::Double => Some(3),
            _ => None,
        }
    }

    /// Maps an external relational type to the engine type.
    pub fn from_sql(sql: SqlType) -> DataType {
        match sql {
            SqlType::Null => DataType::Null,
            SqlType::Integer => DataType::Integer,
            SqlType::BigInt => DataType::Long,
            SqlType::Real => DataType::Float,
            SqlType::Double => DataType::Double,
            SqlType::Varchar => DataType::String,
            SqlType::Boolean => DataType::Boolean,
            SqlType::Date => DataType::Date,
            SqlType::Timestamp => DataType::DateTime,
            SqlType::Time => DataType::Time,
        }
    }

    /// Maps the engine type to the external relational type.
    pub fn to_sql(&self) -> SqlType {
        match self {
            DataType::Null => SqlType::Null,
            DataType::Integer => SqlType::Integer,
            DataType::Long => SqlType::BigInt,
            DataType::Float => SqlType::Real,
            DataType::Double => SqlType::Double,
            DataType::String => SqlType::Varchar,
            DataType::Boolean => SqlType::Boolean,
            DataType::Date => SqlType::Date,
            DataType::DateTime => SqlType::Timestamp,
            DataType::Time => SqlType::Time,
        }
    }
}

/// Resolves the minimal type both inputs can be widened to.
///
/// Symmetric by construction: every rule is written over an unordered pair.
/// Fails when no common type exists (temporal vs. numeric, temporal vs.
/// temporal of a different kind, temporal vs. boolean).
pub fn common_type(a: DataType, b: DataType) -> Result<DataType> {
    if a == b {
        return Ok(a);
    }
    if a == DataType::Null {
        return Ok(b);
    }
    if b == DataType::Null {
        return Ok(a);
    }

    if let (Some(ra), Some(rb)) = (a.numeric_rank(), b.numeric_rank()) {
        return Ok(if ra >= rb { a } else { b });
    }

    // Temporal types admit only String besides themselves and Null.
    if a.is_temporal() || b.is_temporal() {
        if a == DataType::String || b == DataType::String {
            return Ok(DataType::String);
        }
        return Err(FlowError::type_error(format!(
            "no common type for {} and {}",
            a.name(),
            b.name()
        )));
    }

    // Remaining pairs (numeric/boolean against String, numeric against
    // boolean) widen to text.
    Ok(DataType::String)
}
