//! Sample buffers shared between the pipelines and the codec engines.
//!
//! A codec engine owns the concrete frame type (an `AVFrame` for FFmpeg, a
//! plain [`PlanarBuffer`] for software engines); the pipelines only see it
//! through these traits.

use crate::config::SampleFormat;
use crate::error::Result;

/// Read access to a block of samples.
pub trait PcmFrame {
    /// Sample layout of the planes
    fn format(&self) -> SampleFormat;

    /// Number of channels carried
    fn channels(&self) -> usize;

    /// Logical number of samples per channel
    fn samples(&self) -> usize;

    /// Logical bytes of plane `index`.
    ///
    /// Planar formats have one plane per channel; interleaved formats only
    /// have plane 0. Out-of-range indices yield an empty slice. The slice
    /// never extends past the logical sample count.
    fn plane(&self, index: usize) -> &[u8];
}

/// A fixed-capacity frame the encoder pipeline fills and resubmits.
pub trait NativeFrame: PcmFrame {
    /// Samples per channel the buffers were allocated for
    fn capacity(&self) -> usize;

    /// Set the logical sample count, at most `capacity()`.
    fn set_samples(&mut self, samples: usize);

    fn pts(&self) -> Option<i64>;

    fn set_pts(&mut self, pts: i64);

    /// Ensure the buffers are not shared with a previous submission.
    fn make_writable(&mut self) -> Result<()> {
        Ok(())
    }

    /// Full-capacity mutable views of every plane.
    fn planes_mut(&mut self) -> Vec<&mut [u8]>;
}

/// Heap-backed frame used by software engines and converters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarBuffer {
    format: SampleFormat,
    channels: usize,
    capacity: usize,
    samples: usize,
    pts: Option<i64>,
    planes: Vec<Vec<u8>>,
}

impl PlanarBuffer {
    /// Allocate zeroed planes for `capacity` samples per channel.
    pub fn new(format: SampleFormat, channels: usize, capacity: usize) -> Self {
        let (plane_count, plane_len) = if format.is_planar() {
            (channels, capacity * format.bytes_per_sample())
        } else {
            (1, capacity * channels * format.bytes_per_sample())
        };
        Self {
            format,
            channels,
            capacity,
            samples: capacity,
            pts: None,
            planes: vec![vec![0u8; plane_len]; plane_count],
        }
    }

    /// Build a full planar f32 buffer from per-channel samples.
    ///
    /// All channels must hold the same number of samples.
    pub fn from_f32_planes(planes: &[Vec<f32>]) -> Self {
        let samples = planes.first().map(Vec::len).unwrap_or(0);
        let mut buffer = Self::new(SampleFormat::F32Planar, planes.len(), samples);
        for (dst, src) in buffer.planes.iter_mut().zip(planes) {
            for (chunk, value) in dst.chunks_exact_mut(4).zip(src) {
                chunk.copy_from_slice(&value.to_ne_bytes());
            }
        }
        buffer
    }

    fn logical_plane_len(&self) -> usize {
        if self.format.is_planar() {
            self.samples * self.format.bytes_per_sample()
        } else {
            self.samples * self.channels * self.format.bytes_per_sample()
        }
    }
}

impl PcmFrame for PlanarBuffer {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn samples(&self) -> usize {
        self.samples
    }

    fn plane(&self, index: usize) -> &[u8] {
        match self.planes.get(index) {
            Some(plane) => &plane[..self.logical_plane_len()],
            None => &[],
        }
    }
}

impl NativeFrame for PlanarBuffer {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn set_samples(&mut self, samples: usize) {
        self.samples = samples.min(self.capacity);
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn set_pts(&mut self, pts: i64) {
        self.pts = Some(pts);
    }

    fn planes_mut(&mut self) -> Vec<&mut [u8]> {
        self.planes.iter_mut().map(Vec::as_mut_slice).collect()
    }
}
