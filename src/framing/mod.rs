//! Elementary-stream framing
//!
//! Two framings are supported:
//! - ADTS (AAC): a 7-byte header with an explicit 13-bit frame length is
//!   synthesized ahead of every payload ([`adts`]).
//! - MPEG audio (MP3): no header is added on encode; frames are recovered by
//!   scanning for the sync word and deriving the length ([`mpa`]).
//!
//! The encode side is a [`BitstreamFramer`]; the decode side is a
//! [`FrameSplitter`] fed with arbitrary slices of the byte stream.

pub mod adts;
pub mod mpa;

use bytes::Bytes;

use crate::error::Result;

pub use adts::{AacProfile, AdtsFramer, AdtsHeader, AdtsSplitter};
pub use mpa::{MpaHeader, MpaSplitter, SyncReject};

/// Encode-side framing strategy.
pub trait BitstreamFramer {
    /// Header bytes to emit ahead of a payload of `payload_len` bytes.
    ///
    /// Returns an empty slice for framings that carry no header.
    fn header_for(&mut self, payload_len: usize) -> Result<&[u8]>;
}

/// Framer for streams whose packets are already self-delimiting.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawFramer;

impl BitstreamFramer for RawFramer {
    fn header_for(&mut self, _payload_len: usize) -> Result<&[u8]> {
        Ok(&[])
    }
}

/// Decode-side scanner recovering frame boundaries from a byte stream.
pub trait FrameSplitter {
    /// Append bytes read from the stream.
    fn push(&mut self, data: &[u8]);

    /// Next complete unit ready for the matching decoder, or `None` until
    /// more bytes are pushed.
    fn next_frame(&mut self) -> Option<Bytes>;

    /// Bytes held back waiting for the rest of a frame
    fn buffered(&self) -> usize;

    /// Sync candidates discarded so far
    fn rejected_syncs(&self) -> usize;
}

/// Push all of `data` and collect every complete frame.
pub fn split_all<S: FrameSplitter + ?Sized>(splitter: &mut S, data: &[u8]) -> Vec<Bytes> {
    splitter.push(data);
    std::iter::from_fn(|| splitter.next_frame()).collect()
}
