//! Sync-word framing for MPEG-1 Layer III streams
//!
//! MP3 packets are written without any added header: every frame already
//! starts with an 11-bit sync word followed by the fields needed to compute
//! its length. Recovering frames means scanning for the sync, decoding the
//! bitrate, sample rate and padding bits, and taking
//! `144 * bitrate / sample_rate + padding` bytes.
//!
//! A byte pattern that merely looks like a sync word is the main corruption
//! hazard, so every candidate is range-checked and a rejection always
//! resumes the scan one byte later, never one frame later.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

use super::FrameSplitter;

/// Bytes needed to read the fields of a frame header
pub const HEADER_LEN: usize = 4;
/// Shortest frame length accepted as genuine
pub const MIN_FRAME_LENGTH: usize = 7;
/// Longest frame length representable with the tables (320 kbps at 32 kHz, padded)
pub const MAX_FRAME_LENGTH: usize = 1441;

/// Bitrates in kbps by 4-bit index; 0 (free format) and 15 are invalid
pub const BITRATES_KBPS: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];

/// Sample rates by 2-bit index; index 3 is reserved
pub const SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];

/// Why a sync candidate was discarded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReject {
    #[error("fewer than 4 bytes")]
    Truncated,

    #[error("no sync word")]
    NoSync,

    #[error("invalid bitrate index {0}")]
    BitrateIndex(u8),

    #[error("invalid sample rate index {0}")]
    SampleRateIndex(u8),

    #[error("frame length {0} outside [7, 1441]")]
    FrameLength(usize),
}

/// Fields decoded from a frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpaHeader {
    /// Bits per second
    pub bitrate: u32,
    pub sample_rate: u32,
    pub padding: bool,
    /// Whole frame in bytes, header included
    pub frame_length: usize,
}

impl MpaHeader {
    /// Decode the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, SyncReject> {
        if bytes.len() < HEADER_LEN {
            return Err(SyncReject::Truncated);
        }
        if bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return Err(SyncReject::NoSync);
        }

        let bitrate_index = (bytes[2] >> 4) & 0x0F;
        let bitrate = match BITRATES_KBPS[bitrate_index as usize] {
            0 => return Err(SyncReject::BitrateIndex(bitrate_index)),
            kbps => kbps * 1000,
        };

        let sample_rate_index = (bytes[2] >> 2) & 0x03;
        let sample_rate = *SAMPLE_RATES
            .get(sample_rate_index as usize)
            .ok_or(SyncReject::SampleRateIndex(sample_rate_index))?;

        let padding = (bytes[2] >> 1) & 0x01 == 1;
        let frame_length = frame_length(bitrate, sample_rate, padding);
        if !(MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH).contains(&frame_length) {
            return Err(SyncReject::FrameLength(frame_length));
        }

        Ok(Self {
            bitrate,
            sample_rate,
            padding,
            frame_length,
        })
    }
}

/// `floor(144 * bitrate / sample_rate) + padding`
pub fn frame_length(bitrate: u32, sample_rate: u32, padding: bool) -> usize {
    (144 * bitrate as u64 / sample_rate as u64) as usize + padding as usize
}

/// Recovers whole MP3 frames (header included) from a byte stream.
#[derive(Debug, Default)]
pub struct MpaSplitter {
    buf: BytesMut,
    rejected: usize,
    consumed: u64,
}

impl MpaSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn skip_byte(&mut self, reason: SyncReject) {
        // Plain non-sync bytes are routine while hunting; only count real candidates
        if reason != SyncReject::NoSync {
            self.rejected += 1;
            tracing::debug!(offset = self.consumed, %reason, "mpa: rejected sync candidate");
        }
        self.buf.advance(1);
        self.consumed += 1;
    }
}

impl FrameSplitter for MpaSplitter {
    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            let header = match MpaHeader::parse(&self.buf) {
                Ok(h) => h,
                Err(SyncReject::Truncated) => return None,
                Err(reason) => {
                    self.skip_byte(reason);
                    continue;
                }
            };
            if self.buf.len() < header.frame_length {
                return None;
            }

            tracing::trace!(
                offset = self.consumed,
                frame_length = header.frame_length,
                bitrate = header.bitrate,
                "mpa: frame"
            );
            self.consumed += header.frame_length as u64;
            return Some(self.buf.split_to(header.frame_length).freeze());
        }
    }

    fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn rejected_syncs(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::split_all;

    #[test]
    fn test_frame_length_formula() {
        // 128 kbps at 44.1 kHz: 417.96 -> 417
        assert_eq!(frame_length(128_000, 44100, false), 417);
        assert_eq!(frame_length(128_000, 44100, true), 418);
        assert_eq!(frame_length(320_000, 44100, false), 1044);
        assert_eq!(frame_length(32_000, 48000, false), 96);
        assert_eq!(frame_length(320_000, 32000, true), MAX_FRAME_LENGTH);
    }

    #[test]
    fn test_parse_header() {
        // 0x92: bitrate index 9 (128 kbps), rate index 0, padding 1
        let header = MpaHeader::parse(&[0xFF, 0xFB, 0x92, 0x64]).unwrap();
        assert_eq!(header.bitrate, 128_000);
        assert_eq!(header.sample_rate, 44100);
        assert!(header.padding);
        assert_eq!(header.frame_length, 418);
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(MpaHeader::parse(&[0xFF, 0xFB]), Err(SyncReject::Truncated));
        assert_eq!(
            MpaHeader::parse(&[0xFF, 0x1B, 0x90, 0x00]),
            Err(SyncReject::NoSync)
        );
        assert_eq!(
            MpaHeader::parse(&[0xFF, 0xFB, 0x00, 0x00]),
            Err(SyncReject::BitrateIndex(0))
        );
        assert_eq!(
            MpaHeader::parse(&[0xFF, 0xFB, 0xF0, 0x00]),
            Err(SyncReject::BitrateIndex(15))
        );
        assert_eq!(
            MpaHeader::parse(&[0xFF, 0xFB, 0x9C, 0x00]),
            Err(SyncReject::SampleRateIndex(3))
        );
    }

    #[test]
    fn test_splitter_resyncs_byte_by_byte() {
        let mut frame = vec![0xFF, 0xFB, 0x10, 0x00];
        frame.resize(frame_length(32_000, 44100, false), 0x55);

        // A candidate with a reserved sample rate right before the real frame
        let mut stream = vec![0x01, 0xFF, 0xE0, 0x1C];
        stream.extend_from_slice(&frame);

        let mut splitter = MpaSplitter::new();
        let frames = split_all(&mut splitter, &stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &frame[..]);
        assert_eq!(splitter.rejected_syncs(), 1);
    }

    #[test]
    fn test_splitter_holds_partial_frame() {
        let mut frame = vec![0xFF, 0xFB, 0x90, 0x00];
        frame.resize(417, 0);

        let mut splitter = MpaSplitter::new();
        splitter.push(&frame[..200]);
        assert!(splitter.next_frame().is_none());
        splitter.push(&frame[200..]);
        assert_eq!(splitter.next_frame().unwrap().len(), 417);
        assert_eq!(splitter.buffered(), 0);
    }
}
