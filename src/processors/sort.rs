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

//! # Sort Processor
//!
//! The only processor requiring full materialization: the entire upstream is
//! buffered before the first row is emitted, and an upstream error aborts
//! with nothing emitted.
//!
//! Rows sort ascending by the listed fields in order, using DataType-aware
//! comparison with Null first. The sort is stable: ties keep input order,
//! enforced by a global input sequence number that doubles as the tiebreaker
//! across spilled runs.
//!
//! When the in-memory buffer exceeds the spill threshold, the sorted run is
//! written to an anonymous temporary file as JSON lines and the final output
//! is a k-way merge over all runs. Spill files are private to one stream
//! instance and unlinked when it drops.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::FlowContext;
use crate::datatype::{common_type, DataType};
use crate::errors::{FlowError, Result};
use crate::processors::correlate::compare_keys;
use crate::row::DataRow;
use crate::stream::{BoxRowStream, RowStream};
use crate::value::Value;

/// Fully materializing, stable, DataType-aware sort.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortDef {
    fields: Vec<String>,
    #[serde(default)]
    spill_threshold: Option<usize>,
}

impl SortDef {
    pub fn new(fields: Vec<String>) -> Result<Self> {
        if fields.is_empty() {
            return Err(FlowError::configuration("sort requires at least one field"));
        }
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(FlowError::configuration("sort field name must not be blank"));
        }
        Ok(SortDef {
            fields,
            spill_threshold: None,
        })
    }

    /// Overrides the context's spill threshold for this processor.
    pub fn with_spill_threshold(mut self, rows: usize) -> Self {
        self.spill_threshold = Some(rows.max(1));
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub(crate) fn attach(&self, upstream: BoxRowStream, env: &FlowContext) -> BoxRowStream {
        Box::new(SortStream {
            fields: Arc::new(self.fields.clone()),
            threshold: self
                .spill_threshold
                .unwrap_or_else(|| env.spill_threshold())
                .max(1),
            state: SortState::Filling(upstream),
        })
    }
}

struct SortStream {
    fields: Arc<Vec<String>>,
    threshold: usize,
    state: SortState,
}

enum SortState {
    Filling(BoxRowStream),
    Draining(Merger),
    Done,
}

impl RowStream for SortStream {
    fn next_row(&mut self) -> Result<Option<DataRow>> {
        loop {
            match &mut self.state {
                SortState::Filling(_) => {
                    let upstream = match std::mem::replace(&mut self.state, SortState::Done) {
                        SortState::Filling(upstream) => upstream,
                        _ => unreachable!(),
                    };
                    // An error here leaves the state Done: abort with nothing
                    // emitted.
                    let merger = fill(upstream, &self.fields, self.threshold)?;
                    self.state = SortState::Draining(merger);
                }
                SortState::Draining(merger) => {
                    let row = merger.next_row()?;
                    if row.is_none() {
                        self.state = SortState::Done;
                    }
                    return Ok(row);
                }
                SortState::Done => return Ok(None),
            }
        }
    }
}

type SortKey = Vec<Value>;

fn key_of(row: &DataRow, fields: &[String]) -> SortKey {
    fields
        .iter()
        .map(|f| row.value(f).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Drains the upstream completely, spilling sorted runs as needed.
fn fill(mut upstream: BoxRowStream, fields: &Arc<Vec<String>>, threshold: usize) -> Result<Merger> {
    let mut buffer: Vec<(SortKey, u64, DataRow)> = Vec::new();
    let mut runs: Vec<BufReader<File>> = Vec::new();
    let mut seq: u64 = 0;

    while let Some(row) = upstream.next_row()? {
        let key = key_of(&row, fields);
        buffer.push((key, seq, row));
        seq += 1;
        if buffer.len() >= threshold {
            sort_run(&mut buffer)?;
            runs.push(spill_run(&buffer)?);
            buffer.clear();
        }
    }
    drop(upstream);

    sort_run(&mut buffer)?;

    let mut merger = Merger {
        fields: Arc::clone(fields),
        memory: buffer.into_iter(),
        memory_head: None,
        heads: Vec::with_capacity(runs.len()),
        runs,
    };
    merger.prime()?;
    Ok(merger)
}

/// Stable sort by (key, input sequence). Keys are unified to a common type
/// per column first, so the comparator is a consistent total order and
/// incompatible keys fail as a typed error before the sort runs.
fn sort_run(buffer: &mut [(SortKey, u64, DataRow)]) -> Result<()> {
    unify_key_types(buffer)?;
    let mut failure: Option<FlowError> = None;
    buffer.sort_by(|a, b| match compare_keys(&a.0, &b.0) {
        Ok(Ordering::Equal) => a.1.cmp(&b.1),
        Ok(other) => other,
        // Unreachable after unification; kept so a comparator failure cannot
        // panic the sort.
        Err(err) => {
            if failure.is_none() {
                failure = Some(err);
            }
            Ordering::Equal
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Casts every key column to the run's common type. Null key values stay
/// Null and do not constrain the column type.
fn unify_key_types(buffer: &mut [(SortKey, u64, DataRow)]) -> Result<()> {
    let width = match buffer.first() {
        Some((key, _, _)) => key.len(),
        None => return Ok(()),
    };
    for column in 0..width {
        let mut target: Option<DataType> = None;
        for (key, _, _) in buffer.iter() {
            if key[column].is_null() {
                continue;
            }
            let data_type = key[column].data_type();
            target = Some(match target {
                Some(current) => common_type(current, data_type)?,
                None => data_type,
            });
        }
        if let Some(target) = target {
            for (key, _, _) in buffer.iter_mut() {
                key[column] = key[column].cast(target)?;
            }
        }
    }
    Ok(())
}

/// Writes one sorted run to an anonymous temp file, one JSON line per row.
/// Keys are recomputed on read, so only (sequence, row) is stored.
fn spill_run(buffer: &[(SortKey, u64, DataRow)]) -> Result<BufReader<File>> {
    let file = tempfile::tempfile()?;
    let mut writer = BufWriter::new(file);
    for (_, seq, row) in buffer {
        let line = serde_json::to_string(&(seq, row))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    let mut file = writer
        .into_inner()
        .map_err(|err| FlowError::Io(err.to_string()))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(BufReader::new(file))
}

/// K-way merge over spilled runs plus the final in-memory run.
struct Merger {
    fields: Arc<Vec<String>>,
    memory: std::vec::IntoIter<(SortKey, u64, DataRow)>,
    memory_head: Option<(SortKey, u64, DataRow)>,
    runs: Vec<BufReader<File>>,
    heads: Vec<Option<(SortKey, u64, DataRow)>>,
}

impl Merger {
    fn prime(&mut self) -> Result<()> {
        for index in 0..self.runs.len() {
            let head = self.read_run_row(index)?;
            self.heads.push(head);
        }
        Ok(())
    }

    fn read_run_row(&mut self, index: usize) -> Result<Option<(SortKey, u64, DataRow)>> {
        let mut line = String::new();
        if self.runs[index].read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let (seq, row): (u64, DataRow) = serde_json::from_str(line.trim_end())?;
        let key = key_of(&row, &self.fields);
        Ok(Some((key, seq, row)))
    }

    fn next_row(&mut self) -> Result<Option<DataRow>> {
        if self.runs.is_empty() {
            // Pure in-memory path.
            return Ok(self.memory.next().map(|(_, _, row)| row));
        }

        if self.memory_head.is_none() {
            self.memory_head = self.memory.next();
        }

        // Pick the smallest (key, seq) among run heads and the memory head;
        // run counts are small, so a linear scan is fine. None indexes the
        // memory run.
        let mut best: Option<(Option<usize>, SortKey, u64)> = None;
        let memory_candidate = self
            .memory_head
            .as_ref()
            .map(|(key, seq, _)| (None, key.clone(), *seq));
        let run_candidates: Vec<(Option<usize>, SortKey, u64)> = self
            .heads
            .iter()
            .enumerate()
            .filter_map(|(index, head)| {
                head.as_ref()
                    .map(|(key, seq, _)| (Some(index), key.clone(), *seq))
            })
            .collect();

        for candidate in run_candidates.into_iter().chain(memory_candidate) {
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let ordering = compare_keys(&candidate.1, &current.1)?;
                    if ordering == Ordering::Less
                        || (ordering == Ordering::Equal && candidate.2 < current.2)
                    {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        match best {
            None => Ok(None),
            Some((None, _, _)) => Ok(self.memory_head.take().map(|(_, _, row)| row)),
            Some((Some(index), _, _)) => {
                let (_, _, row) = self.heads[index].take().expect("run head present");
                self.heads[index] = self.read_run_row(index)?;
                Ok(Some(row))
            }
        }
    }
}
