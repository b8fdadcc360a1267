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

/// Error types for reading and writing sample buffers.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Unsupported audio format in {path}: {reason}")]
    UnsupportedFormat { path: String, reason: String },

    #[error("No audio track found in {0}")]
    NoAudioTrack(String),

    #[error("Audio file {0} contains no samples")]
    Empty(String),

    #[error("Channel {channel} has {actual} frames, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("A sample buffer needs at least one channel")]
    NoChannels,

    #[error("Audio file error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("WAV write error: {0}")]
    Encode(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
