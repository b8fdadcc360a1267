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

//! The dual-phase wavetable oscillator.
//!
//! Two readers scan the same table half a table apart. Each is weighted by a Hann
//! window over the table so the pair sums to unity gain and the table's ends never
//! click. The table itself morphs linearly from one stored snippet to the next over
//! the wavetable interval.

use std::f64::consts::PI;

use crate::bank::WavetableDescriptor;
use crate::util::secs_to_samples;

use super::SynthError;

/// Samples between updates of the morph mix.
const MORPH_BLOCK: usize = 64;

/// A snippet wrapped with one guard sample at each end for wrap-around reads.
fn guarded_table(source: &[f64], descriptor: Option<&WavetableDescriptor>, len: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(len + 2);
    match descriptor {
        Some(d) => {
            let snippet = &source[d.begin..d.end];
            table.push(snippet[len - 1]);
            table.extend_from_slice(snippet);
            table.push(snippet[0]);
        }
        None => table.resize(len + 2, 0.0),
    }
    table
}

/// Hann window of period `len` centered on `len / 2`.
fn hann(phase: f64, len: f64) -> f64 {
    0.5 + 0.5 * (2.0 * PI * (phase - len / 2.0) / len).cos()
}

/// Linear read of a guarded table at a phase in `[0, len)`.
fn read(table: &[f64], phase: f64) -> f64 {
    let i0 = phase.floor() as usize + 1;
    let f = phase - phase.floor();
    table[i0] + (table[i0 + 1] - table[i0]) * f
}

/// Oscillator over the ordered wavetables of one channel of one note.
pub struct WavetableOscillator<'a> {
    source: &'a [f64],
    tables: &'a [WavetableDescriptor],
    len: usize,
    interval: usize,
    index: usize,
    from: Vec<f64>,
    to: Vec<f64>,
    current: Vec<f64>,
    phases: [f64; 2],
    elapsed: usize,
}

impl<'a> WavetableOscillator<'a> {
    /// Creates an oscillator morphing between `tables` every `interval` samples.
    ///
    /// Every table must lie within `source` and share the first table's length.
    pub fn new(
        source: &'a [f64],
        tables: &'a [WavetableDescriptor],
        interval: usize,
    ) -> Result<Self, SynthError> {
        let len = tables.first().map_or(0, WavetableDescriptor::len);
        for table in tables {
            if table.begin >= table.end || table.end > source.len() {
                return Err(SynthError::TableOutOfRange {
                    begin: table.begin,
                    end: table.end,
                    len: source.len(),
                });
            }
            if table.len() != len {
                return Err(SynthError::TableLength {
                    expected: len,
                    found: table.len(),
                });
            }
        }

        let from = guarded_table(source, tables.first(), len);
        let to = guarded_table(source, tables.get(1), len);
        Ok(Self {
            source,
            tables,
            len,
            interval: interval.max(1),
            index: 0,
            current: from.clone(),
            from,
            to,
            phases: [0.0, len as f64 / 2.0],
            elapsed: 0,
        })
    }

    /// Produces the next output sample.
    pub fn next_sample(&mut self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let len = self.len as f64;
        let sample: f64 = self
            .phases
            .iter()
            .map(|&p| hann(p, len) * read(&self.current, p))
            .sum();

        for phase in &mut self.phases {
            *phase += 1.0;
            if *phase >= len {
                *phase -= len;
            }
        }

        self.elapsed += 1;
        if self.elapsed % MORPH_BLOCK == 0 {
            let mix = (self.elapsed as f64 / self.interval as f64).min(1.0);
            for ((c, a), b) in self.current.iter_mut().zip(&self.from).zip(&self.to) {
                *c = (1.0 - mix) * a + mix * b;
            }
        }
        if self.elapsed >= self.interval {
            self.advance();
        }

        sample
    }

    /// Moves on to the next pair of tables. Tables past the end of the list are silent.
    fn advance(&mut self) {
        self.index += 1;
        self.from = std::mem::take(&mut self.to);
        self.to = guarded_table(self.source, self.tables.get(self.index + 1), self.len);
        self.current.clone_from(&self.from);
        self.elapsed = 0;
    }
}

/// Resynthesizes one note of one channel.
///
/// The recording is copied verbatim from `onset` up to the center of the first
/// wavetable, then the oscillator takes over. The result is always
/// `note_duration_secs` long; an empty table list yields silence.
pub fn synthesize(
    source: &[f64],
    onset: usize,
    tables: &[WavetableDescriptor],
    note_duration_secs: f64,
    wavetable_interval_secs: f64,
    sample_rate: u32,
) -> Result<Vec<f64>, SynthError> {
    let note_len = secs_to_samples(note_duration_secs, sample_rate);
    let mut output = vec![0.0; note_len];
    let Some(first) = tables.first() else {
        return Ok(output);
    };
    if onset > source.len() {
        return Err(SynthError::OnsetOutOfRange {
            onset,
            len: source.len(),
        });
    }

    let mut oscillator = WavetableOscillator::new(
        source,
        tables,
        secs_to_samples(wavetable_interval_secs, sample_rate),
    )?;

    let attack_end = first.begin + first.len() / 2;
    let attack_len = attack_end.saturating_sub(onset).min(note_len);
    let copied = attack_len.min(source.len().saturating_sub(onset));
    output[..copied].copy_from_slice(&source[onset..onset + copied]);

    for sample in &mut output[attack_len..] {
        *sample = oscillator.next_sample();
    }
    Ok(output)
}
