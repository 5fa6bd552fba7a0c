//! Sample layout conversion
//!
//! Encode side: [`SampleConverter`] turns interleaved little-endian f32 PCM
//! into the planar buffers a codec wants, without touching the rate.
//! Decode side: [`interleave_to_f32le`] flattens planar decoder output into
//! the interleaved f32 PCM the callbacks deliver.

use dasp_sample::Sample;

use crate::config::{SampleFormat, StreamParams};
use crate::engine::Resampler;
use crate::error::{CodecError, Result, TranscodeError};
use crate::frame::PcmFrame;

/// Pure-Rust layout/format converter (no rate conversion)
#[derive(Debug, Clone)]
pub struct SampleConverter {
    channels: usize,
    dst_format: SampleFormat,
}

impl SampleConverter {
    /// Create a converter from interleaved f32 `src` to planar `dst`.
    pub fn new(src: StreamParams, dst: StreamParams) -> Result<Self> {
        if src.format != SampleFormat::F32Interleaved {
            return Err(CodecError::ResamplerCreate(format!(
                "source format {:?} is not interleaved f32",
                src.format
            ))
            .into());
        }
        if !dst.format.is_planar() {
            return Err(CodecError::ResamplerCreate(format!(
                "destination format {:?} is not planar",
                dst.format
            ))
            .into());
        }
        if src.sample_rate != dst.sample_rate || src.layout != dst.layout {
            return Err(CodecError::ResamplerCreate(format!(
                "rate or layout conversion requested ({} Hz {:?} -> {} Hz {:?})",
                src.sample_rate, src.layout, dst.sample_rate, dst.layout
            ))
            .into());
        }

        Ok(Self {
            channels: src.channels(),
            dst_format: dst.format,
        })
    }
}

impl Resampler for SampleConverter {
    fn convert(&mut self, input: &[u8], samples: usize, output: &mut [&mut [u8]]) -> Result<usize> {
        let width = self.dst_format.bytes_per_sample();
        if output.len() < self.channels {
            return Err(CodecError::Resample(format!(
                "{} output planes for {} channels",
                output.len(),
                self.channels
            ))
            .into());
        }
        if input.len() < samples * self.channels * 4
            || output.iter().any(|plane| plane.len() < samples * width)
        {
            return Err(CodecError::Resample(format!(
                "buffers too small for {} samples",
                samples
            ))
            .into());
        }

        for (s, sample_frame) in input.chunks_exact(4 * self.channels).take(samples).enumerate() {
            for (c, raw) in sample_frame.chunks_exact(4).enumerate() {
                let value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                let dst = &mut output[c][s * width..(s + 1) * width];
                match self.dst_format {
                    SampleFormat::F32Planar => dst.copy_from_slice(&value.to_ne_bytes()),
                    SampleFormat::S16Planar => {
                        let value = i16::from_sample(value.clamp(-1.0, 1.0));
                        dst.copy_from_slice(&value.to_ne_bytes());
                    }
                    SampleFormat::F32Interleaved => unreachable!("checked in new()"),
                }
            }
        }

        Ok(samples)
    }
}

/// Interleave a decoded frame into little-endian f32 PCM.
///
/// Sample `s` of channel `c` lands at index `s * channels + c`. `out` is
/// resized to `samples * channels * 4` bytes and reused across calls.
pub fn interleave_to_f32le<F: PcmFrame + ?Sized>(frame: &F, out: &mut Vec<u8>) -> Result<()> {
    let channels = frame.channels();
    let samples = frame.samples();
    let width = frame.format().bytes_per_sample();

    out.clear();
    out.resize(samples * channels * 4, 0);

    match frame.format() {
        SampleFormat::F32Interleaved => {
            let plane = frame.plane(0);
            if plane.len() < out.len() {
                return Err(short_plane(0, plane.len(), out.len()));
            }
            for (dst, src) in out.chunks_exact_mut(4).zip(plane.chunks_exact(4)) {
                let value = f32::from_ne_bytes([src[0], src[1], src[2], src[3]]);
                dst.copy_from_slice(&value.to_le_bytes());
            }
        }
        SampleFormat::F32Planar | SampleFormat::S16Planar => {
            for c in 0..channels {
                let plane = frame.plane(c);
                if plane.len() < samples * width {
                    return Err(short_plane(c, plane.len(), samples * width));
                }
                for (s, src) in plane.chunks_exact(width).take(samples).enumerate() {
                    let value = match frame.format() {
                        SampleFormat::S16Planar => {
                            i16::from_ne_bytes([src[0], src[1]]).to_sample::<f32>()
                        }
                        _ => f32::from_ne_bytes([src[0], src[1], src[2], src[3]]),
                    };
                    let pos = (s * channels + c) * 4;
                    out[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }

    Ok(())
}

fn short_plane(index: usize, len: usize, needed: usize) -> TranscodeError {
    TranscodeError::UnsupportedFormat(format!(
        "plane {} holds {} bytes, {} expected",
        index, len, needed
    ))
}

/// Decode interleaved little-endian f32 PCM into samples.
pub fn f32le_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Encode samples as interleaved little-endian f32 PCM.
pub fn samples_to_f32le(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
