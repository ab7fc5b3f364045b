//! Julius forced-alignment trace parsing.
//!
//! The alignment block looks like
//!
//! ```text
//! === begin forced alignment ===
//! -- phoneme alignment --
//!  id: from  to    n_score    unit
//!  ----------------------------------------
//! [   0   21]  -21.350653  silB
//! [  22   29]  -22.841145  k+o
//! re-computed AM score: -7154.426758
//! === end forced alignment ===
//! ```
//!
//! Only `[`-rows inside the block are alignment data; everything else is
//! diagnostics and is skipped.

use std::collections::HashSet;

use crate::alignment::dictionary::{Dictionary, EntryKind};
use crate::alignment::triphone::{center_phone, is_silence_phone};
use crate::config::UnitGranularity;
use crate::error::SegmentationError;

pub const BEGIN_MARKER: &str = "begin forced alignment";
pub const END_MARKER: &str = "end forced alignment";

/// One `[begin end] score label` row. Frames are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRow {
    pub line_no: usize,
    pub line: String,
    pub begin_frame: u32,
    pub end_frame: u32,
    pub score: f64,
    pub label: String,
    /// Dictionary index from a `w_N` output symbol, when the row carries one.
    pub word_index: Option<usize>,
}

/// A trace row bound to its grammar position.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedUnit {
    /// Unit as the engine reported it (word mode: the transcript word).
    pub label: String,
    /// Boundary silence outside the grammar is bound to the nearest entry.
    pub entry_index: usize,
    pub begin_frame: u32,
    pub end_frame: u32,
    pub is_silence: bool,
}

pub fn parse_trace(trace: &str) -> Result<Vec<TraceRow>, SegmentationError> {
    let mut rows = Vec::new();
    let mut begin_line: Option<usize> = None;
    let mut end_line: Option<usize> = None;

    for (idx, raw_line) in trace.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end();

        if line.contains(BEGIN_MARKER) {
            if begin_line.is_some() {
                return Err(SegmentationError::parse(
                    line_no,
                    Some(line),
                    "second alignment block in one trace",
                ));
            }
            begin_line = Some(line_no);
            continue;
        }
        if line.contains(END_MARKER) {
            if begin_line.is_none() {
                return Err(SegmentationError::parse(
                    line_no,
                    Some(line),
                    "end marker before begin marker",
                ));
            }
            if end_line.is_some() {
                return Err(SegmentationError::parse(
                    line_no,
                    Some(line),
                    "repeated end marker",
                ));
            }
            end_line = Some(line_no);
            continue;
        }

        let inside = begin_line.is_some() && end_line.is_none();
        if inside && line.starts_with('[') {
            rows.push(parse_row(line_no, line)?);
        }
    }

    if begin_line.is_none() {
        return Err(SegmentationError::parse(
            0,
            None,
            "trace has no forced alignment block (engine produced no alignment)",
        ));
    }
    let Some(end_line) = end_line else {
        return Err(SegmentationError::parse(
            trace.lines().count(),
            None,
            "alignment block is not terminated",
        ));
    };
    if rows.is_empty() {
        return Err(SegmentationError::parse(
            end_line,
            None,
            "alignment block contains no units",
        ));
    }
    Ok(rows)
}

fn parse_row(line_no: usize, line: &str) -> Result<TraceRow, SegmentationError> {
    let malformed = |message: &str| SegmentationError::parse(line_no, Some(line), message);

    let close = line
        .find(']')
        .ok_or_else(|| malformed("unterminated frame range"))?;
    let mut frames = line[1..close].split_whitespace();
    let begin_frame = frames
        .next()
        .and_then(|f| f.parse::<u32>().ok())
        .ok_or_else(|| malformed("missing begin frame"))?;
    let end_frame = frames
        .next()
        .and_then(|f| f.parse::<u32>().ok())
        .ok_or_else(|| malformed("missing end frame"))?;
    if frames.next().is_some() {
        return Err(malformed("frame range has more than two fields"));
    }

    let mut fields = line[close + 1..].split_whitespace();
    let score = fields
        .next()
        .and_then(|f| f.parse::<f64>().ok())
        .ok_or_else(|| malformed("missing score"))?;
    let label = fields
        .next()
        .ok_or_else(|| malformed("missing unit label"))?
        .to_string();
    let word_index = std::iter::once(label.as_str())
        .chain(fields)
        .find_map(output_symbol_index);

    Ok(TraceRow {
        line_no,
        line: line.to_string(),
        begin_frame,
        end_frame,
        score,
        label,
        word_index,
    })
}

/// `w_12` or `[w_12]` to `12`.
fn output_symbol_index(token: &str) -> Option<usize> {
    token
        .trim_start_matches('[')
        .trim_end_matches(']')
        .strip_prefix("w_")?
        .parse()
        .ok()
}

/// Checks frame continuity and binds rows to grammar positions.
///
/// When the dictionary has no silB/silE entries, a silence row reported at
/// either end of the trace is kept as an extra silence unit so the assembler
/// can trim it.
pub fn conform(
    rows: &[TraceRow],
    dictionary: &Dictionary,
    granularity: UnitGranularity,
) -> Result<Vec<AlignedUnit>, SegmentationError> {
    if rows.is_empty() {
        return Err(SegmentationError::parse(0, None, "trace contains no units"));
    }
    check_frames(rows)?;

    let (leading, core, trailing) = split_boundary_silence(rows, dictionary);
    let mut units = match granularity {
        UnitGranularity::Word => conform_words(core, dictionary)?,
        UnitGranularity::Phoneme => conform_phonemes(core, dictionary)?,
    };
    if let Some(row) = leading {
        units.insert(0, boundary_silence(row, 0));
    }
    if let Some(row) = trailing {
        units.push(boundary_silence(row, dictionary.len().saturating_sub(1)));
    }
    Ok(units)
}

fn is_silence_row(row: &TraceRow) -> bool {
    is_silence_phone(center_phone(&row.label))
}

fn split_boundary_silence<'r>(
    rows: &'r [TraceRow],
    dictionary: &Dictionary,
) -> (Option<&'r TraceRow>, &'r [TraceRow], Option<&'r TraceRow>) {
    let entries = dictionary.entries();
    let mut core = rows;

    let leading_in_grammar = entries
        .first()
        .is_some_and(|e| e.kind == EntryKind::LeadingSilence);
    let leading = match core.split_first() {
        Some((first, rest)) if !leading_in_grammar && !rest.is_empty() && is_silence_row(first) => {
            core = rest;
            Some(first)
        }
        _ => None,
    };

    let trailing_in_grammar = entries
        .last()
        .is_some_and(|e| e.kind == EntryKind::TrailingSilence);
    let trailing = match core.split_last() {
        Some((last, rest)) if !trailing_in_grammar && !rest.is_empty() && is_silence_row(last) => {
            core = rest;
            Some(last)
        }
        _ => None,
    };

    (leading, core, trailing)
}

fn boundary_silence(row: &TraceRow, entry_index: usize) -> AlignedUnit {
    AlignedUnit {
        label: row.label.clone(),
        entry_index,
        begin_frame: row.begin_frame,
        end_frame: row.end_frame,
        is_silence: true,
    }
}

fn check_frames(rows: &[TraceRow]) -> Result<(), SegmentationError> {
    let mut prev_end: Option<u32> = None;
    for row in rows {
        if row.begin_frame > row.end_frame {
            return Err(SegmentationError::parse(
                row.line_no,
                Some(&row.line),
                "unit ends before it begins",
            ));
        }
        if let Some(prev_end) = prev_end {
            let Some(expected) = prev_end.checked_add(1) else {
                return Err(SegmentationError::parse(
                    row.line_no,
                    Some(&row.line),
                    "unit follows a unit ending at the last representable frame",
                ));
            };
            if row.begin_frame != expected {
                let problem = if row.begin_frame <= prev_end {
                    "overlaps the previous unit"
                } else {
                    "leaves a gap after the previous unit"
                };
                return Err(SegmentationError::parse(
                    row.line_no,
                    Some(&row.line),
                    format!("unit {problem} (expected begin frame {expected})"),
                ));
            }
        }
        prev_end = Some(row.end_frame);
    }
    Ok(())
}

fn conform_words(
    rows: &[TraceRow],
    dictionary: &Dictionary,
) -> Result<Vec<AlignedUnit>, SegmentationError> {
    for (position, row) in rows.iter().enumerate() {
        if position >= dictionary.len() {
            return Err(SegmentationError::parse(
                row.line_no,
                Some(&row.line),
                format!("grammar has only {} words", dictionary.len()),
            ));
        }
        if let Some(index) = row.word_index {
            if index != position {
                return Err(SegmentationError::parse(
                    row.line_no,
                    Some(&row.line),
                    format!("word w_{index} reported at grammar position {position}"),
                ));
            }
        }
    }
    if rows.len() < dictionary.len() {
        let (line_no, line) = rows
            .last()
            .map_or((0, None), |row| (row.line_no, Some(row.line.as_str())));
        return Err(SegmentationError::parse(
            line_no,
            line,
            format!(
                "trace has {} words but the grammar expects {}",
                rows.len(),
                dictionary.len()
            ),
        ));
    }

    Ok(rows
        .iter()
        .zip(dictionary.entries())
        .map(|(row, entry)| AlignedUnit {
            label: entry.label.clone(),
            entry_index: entry.index,
            begin_frame: row.begin_frame,
            end_frame: row.end_frame,
            is_silence: entry.kind.is_silence(),
        })
        .collect())
}

fn conform_phonemes(
    rows: &[TraceRow],
    dictionary: &Dictionary,
) -> Result<Vec<AlignedUnit>, SegmentationError> {
    let mut search = VariantSearch {
        rows,
        dictionary,
        chosen: Vec::with_capacity(dictionary.len()),
        dead_ends: HashSet::new(),
        furthest_row: 0,
    };
    if !search.descend(0, 0) {
        let (line_no, line, message) = match rows.get(search.furthest_row) {
            Some(row) => (
                row.line_no,
                Some(row.line.as_str()),
                format!(
                    "unit '{}' at position {} does not follow the grammar's unit order",
                    row.label, search.furthest_row
                ),
            ),
            None => (
                rows.last().map_or(0, |row| row.line_no),
                rows.last().map(|row| row.line.as_str()),
                "trace ends before the grammar's final unit".to_string(),
            ),
        };
        return Err(SegmentationError::parse(line_no, line, message));
    }

    let mut units = Vec::with_capacity(rows.len());
    let mut row_iter = rows.iter();
    for (entry, &variant_idx) in dictionary.entries().iter().zip(&search.chosen) {
        let variant = &entry.variants[variant_idx];
        for expected in &variant.units {
            let Some(row) = row_iter.next() else {
                break;
            };
            if dictionary.is_triphone() && row.label != *expected {
                tracing::debug!(
                    line_no = row.line_no,
                    engine_label = %row.label,
                    expected_label = %expected,
                    "engine reported a different triphone context"
                );
            }
            units.push(AlignedUnit {
                label: row.label.clone(),
                entry_index: entry.index,
                begin_frame: row.begin_frame,
                end_frame: row.end_frame,
                is_silence: entry.kind.is_silence() || is_silence_row(row),
            });
        }
    }
    Ok(units)
}

/// Depth-first choice of one pronunciation variant per dictionary entry such
/// that the concatenated phones equal the trace's centre phones.
struct VariantSearch<'a> {
    rows: &'a [TraceRow],
    dictionary: &'a Dictionary,
    chosen: Vec<usize>,
    /// `(entry, row)` positions already known not to reach the end.
    dead_ends: HashSet<(usize, usize)>,
    furthest_row: usize,
}

impl VariantSearch<'_> {
    fn descend(&mut self, entry_idx: usize, row_idx: usize) -> bool {
        let Some(entry) = self.dictionary.get(entry_idx) else {
            return row_idx == self.rows.len();
        };
        if self.dead_ends.contains(&(entry_idx, row_idx)) {
            return false;
        }
        for (variant_idx, variant) in entry.variants.iter().enumerate() {
            let phones = variant.pronunciation.phones();
            let matched = phones
                .iter()
                .zip(&self.rows[row_idx..])
                .take_while(|(phone, row)| center_phone(&row.label) == phone.as_str())
                .count();
            self.furthest_row = self.furthest_row.max(row_idx + matched);
            if matched < phones.len() {
                continue;
            }
            self.chosen.push(variant_idx);
            if self.descend(entry_idx + 1, row_idx + phones.len()) {
                return true;
            }
            self.chosen.pop();
        }
        self.dead_ends.insert((entry_idx, row_idx));
        false
    }
}
