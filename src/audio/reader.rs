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
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{
    Decoder, DecoderOptions, CODEC_TYPE_NULL, CODEC_TYPE_PCM_S32BE, CODEC_TYPE_PCM_S32LE,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::buffer::SampleBuffer;
use super::error::AudioError;

/// The only integer width accepted for source recordings.
const SUPPORTED_BITS_PER_SAMPLE: u32 = 32;

/// Reads a 32-bit integer PCM recording into a normalized [SampleBuffer].
/// Samples are divided by the largest positive 32-bit integer.
pub fn read_samples<P: AsRef<Path>>(path: P) -> Result<SampleBuffer, AudioError> {
    let path = path.as_ref();
    let path_display = path.display().to_string();
    let file = File::open(path).map_err(|e| {
        AudioError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path_display, e)))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::NoAudioTrack(path_display.clone()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if params.codec != CODEC_TYPE_PCM_S32LE && params.codec != CODEC_TYPE_PCM_S32BE {
        return Err(AudioError::UnsupportedFormat {
            path: path_display,
            reason: "only signed integer PCM is supported".to_string(),
        });
    }
    match params.bits_per_sample {
        Some(SUPPORTED_BITS_PER_SAMPLE) => {}
        other => {
            return Err(AudioError::UnsupportedFormat {
                path: path_display,
                reason: format!(
                    "expected {} bits per sample, found {:?}",
                    SUPPORTED_BITS_PER_SAMPLE, other
                ),
            })
        }
    }
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| AudioError::UnsupportedFormat {
            path: path_display.clone(),
            reason: "sample rate not specified".to_string(),
        })?;

    let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;
    let mut channels: Vec<Vec<f64>> = Vec::new();

    while let Some(packet) = next_packet(format_reader.as_mut())? {
        if packet.track_id() != track_id {
            continue;
        }
        append_decoded(decoder.as_mut(), &packet, &mut channels, &path_display)?;
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(AudioError::Empty(path_display));
    }

    let buffer = SampleBuffer::new(channels, sample_rate)?;
    debug!(
        path = %path_display,
        channels = buffer.channel_count(),
        frames = buffer.frame_count(),
        sample_rate,
        "Decoded recording"
    );
    Ok(buffer)
}

/// Reads the next packet. End of stream is reported as `Ok(None)`.
fn next_packet(format_reader: &mut dyn FormatReader) -> Result<Option<Packet>, AudioError> {
    match format_reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(None)
        }
        Err(e) => Err(AudioError::Decode(e)),
    }
}

/// Decodes a packet and appends its frames to the planar channel vectors.
fn append_decoded(
    decoder: &mut dyn Decoder,
    packet: &Packet,
    channels: &mut Vec<Vec<f64>>,
    path_display: &str,
) -> Result<(), AudioError> {
    let decoded = match decoder.decode(packet) {
        Ok(decoded) => decoded,
        Err(SymphoniaError::ResetRequired) => {
            decoder.reset();
            decoder.decode(packet)?
        }
        Err(e) => return Err(AudioError::Decode(e)),
    };

    match decoded {
        AudioBufferRef::S32(buf) => {
            let channel_count = buf.spec().channels.count();
            if channels.is_empty() {
                channels.resize(channel_count, Vec::new());
            }
            for (ch_idx, channel) in channels.iter_mut().enumerate().take(channel_count) {
                channel.extend(buf.chan(ch_idx).iter().map(|&s| scale_s32(s)));
            }
            Ok(())
        }
        _ => Err(AudioError::UnsupportedFormat {
            path: path_display.to_string(),
            reason: "decoder produced non 32-bit integer samples".to_string(),
        }),
    }
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f64 {
    sample as f64 / i32::MAX as f64
}
