//! `AVFrame` views for the pipelines

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::frame::Audio;

use super::{from_av_sample, to_av_layout, to_av_sample};
use crate::config::{SampleFormat, StreamParams};
use crate::error::{CodecError, Result, TranscodeError};
use crate::frame::{NativeFrame, PcmFrame};

/// Bytes of plane `index` covering `samples` samples, clipped to the allocation.
fn plane_bytes(frame: &Audio, format: SampleFormat, samples: usize, index: usize) -> &[u8] {
    if index >= frame.planes() {
        return &[];
    }
    let data = frame.data(index);
    let len = if format.is_planar() {
        samples * format.bytes_per_sample()
    } else {
        samples * frame.channels() as usize * format.bytes_per_sample()
    };
    &data[..len.min(data.len())]
}

/// Encoder input frame allocated once and refilled for every submission
pub struct AvFrame {
    frame: Audio,
    format: SampleFormat,
    capacity: usize,
}

impl AvFrame {
    /// Allocate a zeroed frame of `capacity` samples in `params`' format.
    pub fn alloc(params: &StreamParams, capacity: usize) -> Result<Self> {
        let mut frame = Audio::new(to_av_sample(params.format), capacity, to_av_layout(params.layout));
        if frame.planes() == 0 {
            return Err(CodecError::Alloc(format!(
                "frame of {} samples in {:?}",
                capacity, params.format
            ))
            .into());
        }
        frame.set_rate(params.sample_rate);
        for plane in 0..frame.planes() {
            frame.data_mut(plane).fill(0);
        }
        Ok(Self {
            frame,
            format: params.format,
            capacity,
        })
    }

    pub fn as_audio(&self) -> &Audio {
        &self.frame
    }
}

impl PcmFrame for AvFrame {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn channels(&self) -> usize {
        self.frame.channels() as usize
    }

    fn samples(&self) -> usize {
        self.frame.samples()
    }

    fn plane(&self, index: usize) -> &[u8] {
        plane_bytes(&self.frame, self.format, self.frame.samples(), index)
    }
}

impl NativeFrame for AvFrame {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn set_samples(&mut self, samples: usize) {
        self.frame.set_samples(samples.min(self.capacity));
    }

    fn pts(&self) -> Option<i64> {
        self.frame.pts()
    }

    fn set_pts(&mut self, pts: i64) {
        self.frame.set_pts(Some(pts));
    }

    fn make_writable(&mut self) -> Result<()> {
        let ret = unsafe { ffmpeg::ffi::av_frame_make_writable(self.frame.as_mut_ptr()) };
        if ret < 0 {
            return Err(CodecError::Alloc(format!(
                "av_frame_make_writable: {}",
                ffmpeg::Error::from(ret)
            ))
            .into());
        }
        Ok(())
    }

    fn planes_mut(&mut self) -> Vec<&mut [u8]> {
        let capacity = self.capacity;
        let format = self.format;
        let channels = self.frame.channels() as usize;
        let planes = self.frame.planes();

        // data_mut borrows the whole frame, so split the planes through raw
        // pointers; each plane is a distinct allocation region.
        let ptr = unsafe { self.frame.as_mut_ptr() };
        (0..planes)
            .map(|index| {
                let len = if format.is_planar() {
                    capacity * format.bytes_per_sample()
                } else {
                    capacity * channels * format.bytes_per_sample()
                };
                unsafe {
                    let data = (*ptr).data[index];
                    let linesize = (*ptr).linesize[0] as usize;
                    std::slice::from_raw_parts_mut(data, len.min(linesize))
                }
            })
            .collect()
    }
}

/// Decoder output frame, received into the same `AVFrame` every time
pub struct DecodedFrame {
    frame: Audio,
    format: SampleFormat,
}

impl DecodedFrame {
    pub fn empty() -> Self {
        Self {
            frame: Audio::empty(),
            format: SampleFormat::F32Planar,
        }
    }

    pub(crate) fn audio_mut(&mut self) -> &mut Audio {
        &mut self.frame
    }

    /// Refresh the cached format after the decoder wrote a new frame.
    pub(crate) fn update_format(&mut self) -> Result<()> {
        let sample = self.frame.format();
        self.format = from_av_sample(sample).ok_or_else(|| {
            TranscodeError::UnsupportedFormat(format!("decoder produced {:?}", sample))
        })?;
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.frame.rate()
    }
}

impl PcmFrame for DecodedFrame {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn channels(&self) -> usize {
        self.frame.channels() as usize
    }

    fn samples(&self) -> usize {
        self.frame.samples()
    }

    fn plane(&self, index: usize) -> &[u8] {
        plane_bytes(&self.frame, self.format, self.frame.samples(), index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_planar_frame() {
        crate::ffmpeg::init().unwrap();
        let params = StreamParams::new(44100, 2, SampleFormat::F32Planar).unwrap();
        let mut frame = AvFrame::alloc(&params, 1024).unwrap();
        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.capacity(), 1024);
        assert_eq!(frame.plane(1).len(), 4096);

        frame.set_samples(10);
        assert_eq!(frame.plane(0).len(), 40);
        let planes = frame.planes_mut();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0].len(), 4096);
    }

    #[test]
    fn test_alloc_s16_frame() {
        crate::ffmpeg::init().unwrap();
        let params = StreamParams::new(48000, 1, SampleFormat::S16Planar).unwrap();
        let mut frame = AvFrame::alloc(&params, 1152).unwrap();
        assert!(frame.make_writable().is_ok());
        assert_eq!(frame.plane(0).len(), 1152 * 2);
        assert!(frame.plane(1).is_empty());
    }
}
