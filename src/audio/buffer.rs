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

use super::error::AudioError;

/// A multi-channel recording held in memory as normalized planar samples.
///
/// Every channel has the same number of frames. Samples are in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// One vector of samples per channel.
    channels: Vec<Vec<f64>>,
    /// Sample rate of the recording.
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a new buffer from planar channel data.
    pub fn new(channels: Vec<Vec<f64>>, sample_rate: u32) -> Result<Self, AudioError> {
        let expected = channels.first().ok_or(AudioError::NoChannels)?.len();
        if let Some((channel, samples)) = channels
            .iter()
            .enumerate()
            .find(|(_, samples)| samples.len() != expected)
        {
            return Err(AudioError::ChannelLengthMismatch {
                channel,
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Creates a silent buffer with the given shape.
    pub fn silent(channel_count: usize, frame_count: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frame_count]; channel_count.max(1)],
            sample_rate,
        }
    }

    /// Returns the number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the samples of one channel.
    pub fn channel(&self, index: usize) -> &[f64] {
        &self.channels[index]
    }

    /// Returns the samples of one channel for writing.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f64] {
        &mut self.channels[index]
    }

    /// Returns all channels.
    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// Duration of the buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}
