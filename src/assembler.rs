//! Frame assembly for the encode path
//!
//! Splits one PCM chunk into codec-native frames of `frame_size` samples.
//! Nothing is carried between chunks: a chunk that does not end on a frame
//! boundary produces a short final frame instead of waiting for more input,
//! and the short frame is never padded with silence.

use crate::config::StreamParams;

/// One frame's worth of interleaved input, borrowed from the caller's chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan<'a> {
    /// Interleaved bytes covering exactly `samples` sample frames
    pub data: &'a [u8],
    /// Samples per channel in this frame
    pub samples: usize,
}

impl FrameSpan<'_> {
    pub fn is_short(&self, frame_size: usize) -> bool {
        self.samples < frame_size
    }
}

/// Splits interleaved PCM chunks into native-size frames
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame_size: usize,
    bytes_per_sample_frame: usize,
}

impl FrameAssembler {
    /// `frame_size` is the codec's samples per channel per frame and must be
    /// non-zero.
    pub fn new(frame_size: usize, input: &StreamParams) -> Self {
        debug_assert!(frame_size > 0, "codec frame size must be non-zero");
        Self {
            frame_size: frame_size.max(1),
            bytes_per_sample_frame: input.bytes_per_sample_frame(),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Complete sample frames contained in `chunk`
    pub fn available_samples(&self, chunk: &[u8]) -> usize {
        chunk.len() / self.bytes_per_sample_frame
    }

    /// Trailing bytes of `chunk` that do not form a whole sample frame
    pub fn leftover_bytes(&self, chunk: &[u8]) -> usize {
        chunk.len() % self.bytes_per_sample_frame
    }

    /// Number of frames `chunk` will be split into
    pub fn frame_count(&self, chunk: &[u8]) -> usize {
        self.available_samples(chunk).div_ceil(self.frame_size)
    }

    /// Iterate over the frames of `chunk`: full frames first, then at most
    /// one short frame holding the remainder.
    pub fn split<'a>(&self, chunk: &'a [u8]) -> FrameSpans<'a> {
        let usable = self.available_samples(chunk) * self.bytes_per_sample_frame;
        FrameSpans {
            remaining: &chunk[..usable],
            frame_bytes: self.frame_size * self.bytes_per_sample_frame,
            bytes_per_sample_frame: self.bytes_per_sample_frame,
        }
    }
}

/// Iterator returned by [`FrameAssembler::split`]
#[derive(Debug, Clone)]
pub struct FrameSpans<'a> {
    remaining: &'a [u8],
    frame_bytes: usize,
    bytes_per_sample_frame: usize,
}

impl<'a> Iterator for FrameSpans<'a> {
    type Item = FrameSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let take = self.frame_bytes.min(self.remaining.len());
        let (data, rest) = self.remaining.split_at(take);
        self.remaining = rest;
        Some(FrameSpan {
            data,
            samples: data.len() / self.bytes_per_sample_frame,
        })
    }
}
