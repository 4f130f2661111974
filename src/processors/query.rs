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

//! # Query Processor
//!
//! FIQL predicate filter: rows failing the predicate are dropped. The
//! expression is compiled once at build time; a malformed expression is a
//! configuration error, never a per-row failure.
//!
//! ## Supported Grammar
//!
//! ```text
//! or         := and ( ',' and )*            -- OR
//! and        := item ( ';' item )*          -- AND
//! item       := '(' or ')' | comparison
//! comparison := selector op argument
//! op         := '==' | '!=' | '=lt=' | '=le=' | '=gt=' | '=ge='
//! ```
//!
//! Arguments may be single- or double-quoted; `==`/`!=` support `*` prefix
//! and suffix wildcards on textual comparison. Ordering comparisons are
//! DataType-aware: the argument is parsed to the field's type, falling back
//! to plain string comparison when that parse fails. A missing field fails
//! every comparison except `!=`, which succeeds.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::errors::{FlowError, Result};
use crate::row::DataRow;
use crate::stream::{BoxRowStream, RowStream};
use crate::value::{compare, parse_text};

/// Drops rows failing a FIQL predicate.
#[derive(Clone, Debug)]
pub struct QueryDef {
    query: String,
    compiled: Arc<FiqlNode>,
}

impl QueryDef {
    /// Compiles the predicate; malformed input is a configuration error.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        let compiled = Parser::new(&query).parse()?;
        Ok(QueryDef {
            query,
            compiled: Arc::new(compiled),
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream) -> BoxRowStream {
        Box::new(QueryStream {
            predicate: Arc::clone(&self.compiled),
            upstream,
        })
    }
}

struct QueryStream {
    predicate: Arc<FiqlNode>,
    upstream: BoxRowStream,
}

impl RowStream for QueryStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        loop {
            match self.upstream.next_row()? {
                Some(row) => {
                    if self.predicate.matches(&row) {
                        return Ok(Some(row));
                    }
                }
                None => return Ok(None),
            }
        }
    }
}

#[derive(Debug)]
enum FiqlNode {
    Or(Vec<FiqlNode>),
    And(Vec<FiqlNode>),
    Cmp {
        selector: String,
        op: CmpOp,
        argument: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FiqlNode {
    fn matches(&self, row: &DataRow) -> bool {
        match self {
            FiqlNode::Or(nodes) => nodes.iter().any(|n| n.matches(row)),
            FiqlNode::And(nodes) => nodes.iter().all(|n| n.matches(row)),
            FiqlNode::Cmp {
                selector,
                op,
                argument,
            } => compare_field(row, selector, *op, argument),
        }
    }
}

fn compare_field(row: &DataRow, selector: &str, op: CmpOp, argument: &str) -> bool {
    let field = match row.field(selector) {
        Some(field) => field,
        // Absent fields satisfy only the not-equals form.
        None => return op == CmpOp::Ne,
    };

    if matches!(op, CmpOp::Eq | CmpOp::Ne) {
        let starts = argument.starts_with('*');
        let ends = argument.len() > 1 && argument.ends_with('*');
        if starts || ends {
            let needle = argument.trim_matches('*');
            let text = field.value.render();
            let matched = match (starts, ends) {
                (true, true) => text.contains(needle),
                (true, false) => text.ends_with(needle),
                (false, true) => text.starts_with(needle),
                (false, false) => unreachable!(),
            };
            return if op == CmpOp::Eq { matched } else { !matched };
        }
    }

    let ordering = match parse_text(argument, field.data_type) {
        Ok(typed) => compare(&field.value, &typed)
            .unwrap_or_else(|_| field.value.render().cmp(&argument.to_string())),
        Err(_) => field.value.render().cmp(&argument.to_string()),
    };

    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    }
}

/// Recursive-descent FIQL parser over a char buffer.
struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Parser {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<FiqlNode> {
        if self.chars.iter().all(|c| c.is_whitespace()) {
            return Err(FlowError::configuration("empty query expression"));
        }
        let node = self.parse_or()?;
        self.skip_ws();
        if self.pos != self.chars.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(node)
    }

    fn parse_or(&mut self) -> Result<FiqlNode> {
        let mut nodes = vec![self.parse_and()?];
        while self.eat(',') {
            nodes.push(self.parse_and()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.pop().expect("single node")
        } else {
            FiqlNode::Or(nodes)
        })
    }

    fn parse_and(&mut self) -> Result<FiqlNode> {
        let mut nodes = vec![self.parse_item()?];
        while self.eat(';') {
            nodes.push(self.parse_item()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.pop().expect("single node")
        } else {
            FiqlNode::And(nodes)
        })
    }

    fn parse_item(&mut self) -> Result<FiqlNode> {
        self.skip_ws();
        if self.eat('(') {
            let node = self.parse_or()?;
            if !self.eat(')') {
                return Err(self.error("expected ')'"));
            }
            return Ok(node);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<FiqlNode> {
        let selector = self.parse_selector()?;
        let op = self.parse_op()?;
        let argument = self.parse_argument()?;
        Ok(FiqlNode::Cmp {
            selector,
            op,
            argument,
        })
    }

    fn parse_selector(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error("expected a field selector"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_op(&mut self) -> Result<CmpOp> {
        if self.eat_str("==") {
            return Ok(CmpOp::Eq);
        }
        if self.eat_str("!=") {
            return Ok(CmpOp::Ne);
        }
        for (token, op) in [
            ("=lt=", CmpOp::Lt),
            ("=le=", CmpOp::Le),
            ("=gt=", CmpOp::Gt),
            ("=ge=", CmpOp::Ge),
        ] {
            if self.eat_str(token) {
                return Ok(op);
            }
        }
        Err(self.error("expected a comparison operator"))
    }

    fn parse_argument(&mut self) -> Result<String> {
        self.skip_ws();
        match self.chars.get(self.pos) {
            Some(&quote) if quote == '"' || quote == '\'' => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.chars.get(self.pos) {
                        Some(&c) if c == quote => {
                            self.pos += 1;
                            return Ok(out);
                        }
                        Some('\\') => {
                            self.pos += 1;
                            match self.chars.get(self.pos) {
                                Some(&escaped) => {
                                    out.push(escaped);
                                    self.pos += 1;
                                }
                                None => return Err(self.error("dangling escape")),
                            }
                        }
                        Some(&c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("unterminated quoted argument")),
                    }
                }
            }
            _ => {
                let start = self.pos;
                while let Some(&c) = self.chars.get(self.pos) {
                    if c == ',' || c == ';' || c == ')' || c.is_whitespace() {
                        break;
                    }
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(self.error("expected an argument"));
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.get(self.pos), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: char) -> bool {
        self.skip_ws();
        if self.chars.get(self.pos) == Some(&token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, token: &str) -> bool {
        let remaining = &self.chars[self.pos..];
        let token_chars: Vec<char> = token.chars().collect();
        if remaining.starts_with(&token_chars[..]) {
            self.pos += token_chars.len();
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> FlowError {
        FlowError::configuration(format!(
            "malformed query at position {}: {message}",
            self.pos
        ))
    }
}
