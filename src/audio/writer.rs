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
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::debug;

use super::buffer::SampleBuffer;
use super::error::AudioError;

/// Writes a buffer as interleaved 32-bit integer PCM, rescaling normalized
/// samples back to the integer range. Out of range samples are clipped.
pub fn write_samples<P: AsRef<Path>>(path: P, buffer: &SampleBuffer) -> Result<(), AudioError> {
    let path = path.as_ref();
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels: buffer.channel_count() as u16,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 32,
            sample_format: SampleFormat::Int,
        },
    )?;

    for frame in 0..buffer.frame_count() {
        for channel in buffer.channels() {
            writer.write_sample(to_s32(channel[frame]))?;
        }
    }
    writer.finalize()?;

    debug!(
        path = ?path,
        channels = buffer.channel_count(),
        frames = buffer.frame_count(),
        "Wrote recording"
    );
    Ok(())
}

#[inline]
fn to_s32(sample: f64) -> i32 {
    (sample.clamp(-1.0, 1.0) * i32::MAX as f64).round() as i32
}
