// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Note marker files.
//!
//! One line per recorded note: `begin_seconds<TAB>end_seconds<TAB>label`, no header.
//! The label usually holds the MIDI velocity but is opaque here.

use std::fs;
use std::io::Write;
use std::path::Path;

/// A time-ordered note region within a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub begin_secs: f64,
    pub end_secs: f64,
    pub label: String,
}

impl Marker {
    pub fn new(begin_secs: f64, end_secs: f64, label: impl Into<String>) -> Self {
        Self {
            begin_secs,
            end_secs,
            label: label.into(),
        }
    }

    /// Sample index of the note onset.
    pub fn begin_sample(&self, sample_rate: u32) -> usize {
        crate::util::secs_to_samples(self.begin_secs, sample_rate)
    }

    /// Sample index of the note end.
    pub fn end_sample(&self, sample_rate: u32) -> usize {
        crate::util::secs_to_samples(self.end_secs, sample_rate)
    }
}

/// Typed error for marker file failures.
#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    #[error("line {line}: expected 3 tab separated fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: invalid time {value:?}")]
    InvalidTime { line: usize, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses marker text. Any line without exactly three fields is rejected.
pub fn parse_markers(text: &str) -> Result<Vec<Marker>, MarkerError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| parse_line(i + 1, line))
        .collect()
}

fn parse_line(line: usize, text: &str) -> Result<Marker, MarkerError> {
    let fields: Vec<&str> = text.split('\t').collect();
    if fields.len() != 3 {
        return Err(MarkerError::FieldCount {
            line,
            found: fields.len(),
        });
    }

    let time = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| MarkerError::InvalidTime {
                line,
                value: value.to_string(),
            })
    };

    Ok(Marker::new(
        time(fields[0])?,
        time(fields[1])?,
        fields[2].trim_end_matches('\r'),
    ))
}

/// Reads a marker file from disk.
pub fn read_markers<P: AsRef<Path>>(path: P) -> Result<Vec<Marker>, MarkerError> {
    parse_markers(&fs::read_to_string(path)?)
}

/// Writes markers in the same tab separated format.
pub fn write_markers<P: AsRef<Path>>(path: P, markers: &[Marker]) -> Result<(), MarkerError> {
    let mut file = fs::File::create(path)?;
    for marker in markers {
        writeln!(
            file,
            "{}\t{}\t{}",
            marker.begin_secs, marker.end_secs, marker.label
        )?;
    }
    Ok(())
}
