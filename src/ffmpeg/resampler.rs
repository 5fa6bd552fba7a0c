//! libswresample-backed sample converter
//!
//! Converts interleaved f32 chunks into the planar layout the encoder wants.
//! Rate conversion is never requested, so the context keeps no delay and
//! every call writes exactly the samples it was given.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;

use super::{to_av_layout, to_av_sample};
use crate::config::StreamParams;
use crate::engine::Resampler;
use crate::error::{CodecError, Result};

/// Resampler wrapping FFmpeg's `SwrContext`
pub struct SwrResampler {
    context: resampling::Context,
    src: StreamParams,
    dst: StreamParams,
}

impl SwrResampler {
    /// Create a converter from `src` to `dst` (same rate and layout).
    pub fn new(src: StreamParams, dst: StreamParams) -> Result<Self> {
        if src.sample_rate != dst.sample_rate || src.layout != dst.layout {
            return Err(CodecError::ResamplerCreate(format!(
                "rate or layout conversion requested ({} Hz {:?} -> {} Hz {:?})",
                src.sample_rate, src.layout, dst.sample_rate, dst.layout
            ))
            .into());
        }

        let context = resampling::Context::get(
            to_av_sample(src.format),
            to_av_layout(src.layout),
            src.sample_rate,
            to_av_sample(dst.format),
            to_av_layout(dst.layout),
            dst.sample_rate,
        )
        .map_err(|e| {
            CodecError::ResamplerCreate(format!("Failed to create resampling context: {}", e))
        })?;

        Ok(Self { context, src, dst })
    }
}

impl Resampler for SwrResampler {
    fn convert(&mut self, input: &[u8], samples: usize, output: &mut [&mut [u8]]) -> Result<usize> {
        let in_width = self.src.bytes_per_sample_frame();
        let out_width = self.dst.bytes_per_sample();
        let planes = if self.dst.format.is_planar() {
            self.dst.channels()
        } else {
            1
        };
        let out_plane_len = if self.dst.format.is_planar() {
            samples * out_width
        } else {
            samples * self.dst.bytes_per_sample_frame()
        };

        if input.len() < samples * in_width
            || output.len() < planes
            || output[..planes].iter().any(|p| p.len() < out_plane_len)
        {
            return Err(CodecError::Resample(format!("buffers too small for {} samples", samples)).into());
        }
        if samples == 0 {
            return Ok(0);
        }

        let mut out_ptrs: Vec<*mut u8> = output[..planes].iter_mut().map(|p| p.as_mut_ptr()).collect();
        let mut in_ptrs: Vec<*const u8> = vec![input.as_ptr()];

        let written = unsafe {
            ffmpeg::ffi::swr_convert(
                self.context.as_mut_ptr(),
                out_ptrs.as_mut_ptr(),
                samples as i32,
                in_ptrs.as_mut_ptr(),
                samples as i32,
            )
        };
        if written < 0 {
            return Err(CodecError::Resample(format!(
                "swr_convert: {}",
                ffmpeg::Error::from(written)
            ))
            .into());
        }
        if written as usize != samples {
            tracing::debug!(samples, written, "resample: short conversion");
        }
        Ok(written as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleFormat;
    use crate::convert::samples_to_f32le;
    use crate::frame::{NativeFrame, PcmFrame, PlanarBuffer};

    #[test]
    fn test_deinterleave_matches_layout() {
        crate::ffmpeg::init().unwrap();
        let src = StreamParams::new(44100, 2, SampleFormat::F32Interleaved).unwrap();
        let dst = src.with_format(SampleFormat::F32Planar);
        let mut swr = SwrResampler::new(src, dst).unwrap();

        let input = samples_to_f32le(&[0.25, -0.25, 0.5, -0.5]);
        let mut frame = PlanarBuffer::new(SampleFormat::F32Planar, 2, 2);
        let written = swr.convert(&input, 2, &mut frame.planes_mut()).unwrap();
        assert_eq!(written, 2);
        assert_eq!(&frame.plane(0)[4..8], &0.5f32.to_ne_bytes());
        assert_eq!(&frame.plane(1)[0..4], &(-0.25f32).to_ne_bytes());
    }

    #[test]
    fn test_rejects_rate_change() {
        crate::ffmpeg::init().unwrap();
        let src = StreamParams::new(44100, 2, SampleFormat::F32Interleaved).unwrap();
        let dst = StreamParams::new(48000, 2, SampleFormat::F32Planar).unwrap();
        assert!(SwrResampler::new(src, dst).is_err());
    }
}
