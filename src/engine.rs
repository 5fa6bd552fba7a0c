//! Codec engine and resampler boundaries.
//!
//! The pipelines drive these traits with the usual send/receive protocol:
//! after a successful `send_*`, call `receive_*` until it returns `None`.
//! After `send_eof`, draining yields the engine's delayed output.

use crate::error::Result;
use crate::frame::{NativeFrame, PcmFrame};

/// One compressed packet, borrowed from the engine until the next receive.
#[derive(Debug, Clone, Copy)]
pub struct PacketRef<'a> {
    pub data: &'a [u8],
    /// Presentation timestamp in samples, when the engine reports one
    pub pts: Option<i64>,
}

/// Encode direction of a codec engine.
pub trait EncodeEngine {
    /// Native frame type this engine consumes
    type Frame: NativeFrame;

    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Samples per channel the codec encodes as one unit
    fn frame_size(&self) -> usize;

    /// Allocate a frame in the codec's input format with `frame_size()` capacity.
    fn alloc_frame(&self) -> Result<Self::Frame>;

    /// Submit one frame; an `Err` here is a rejection of that frame.
    fn send_frame(&mut self, frame: &Self::Frame) -> Result<()>;

    /// Signal end of input so buffered packets can be drained.
    fn send_eof(&mut self) -> Result<()>;

    /// Pull the next packet, or `None` when the engine needs more input.
    fn receive_packet(&mut self) -> Result<Option<PacketRef<'_>>>;
}

/// Decode direction of a codec engine.
pub trait DecodeEngine {
    /// Decoded frame type this engine produces
    type Frame: PcmFrame;

    fn name(&self) -> &'static str;

    /// Submit one complete compressed frame; an `Err` is a rejection.
    fn send_packet(&mut self, data: &[u8]) -> Result<()>;

    fn send_eof(&mut self) -> Result<()>;

    /// Pull the next decoded frame, or `None` when more input is needed.
    fn receive_frame(&mut self) -> Result<Option<&Self::Frame>>;
}

/// Sample layout/format converter used on the encode path.
pub trait Resampler {
    /// Convert `samples` interleaved samples from `input` into `output`.
    ///
    /// `output` holds one plane per channel with room for at least
    /// `samples` samples each. Returns the number of samples written.
    fn convert(&mut self, input: &[u8], samples: usize, output: &mut [&mut [u8]]) -> Result<usize>;
}
