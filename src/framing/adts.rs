//! ADTS framing for AAC elementary streams
//!
//! Header layout (no CRC):
//!
//! ```text
//! byte 0  1111 1111                 sync
//! byte 1  1111 1001                 sync, MPEG-2 id, layer 0, protection absent
//! byte 2  PPFF FF0C                 profile, sampling index, channel config bit 2
//! byte 3  CC00 00LL                 channel config bits 1..0, length bits 12..11
//! byte 4  LLLL LLLL                 length bits 10..3
//! byte 5  LLL1 1111                 length bits 2..0, buffer fullness (0x7FF)
//! byte 6  1111 1100                 buffer fullness, one raw data block
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::{BitstreamFramer, FrameSplitter};
use crate::error::{Result, TranscodeError};

/// Header size without CRC
pub const ADTS_HEADER_LEN: usize = 7;
/// Header size when a CRC follows the fixed fields
pub const ADTS_HEADER_LEN_CRC: usize = 9;
/// Largest value of the 13-bit frame length field
pub const MAX_FRAME_LENGTH: usize = 0x1FFF;

const SYNC_BYTE_0: u8 = 0xFF;
const SYNC_BYTE_1_NO_CRC: u8 = 0xF9;
const FULLNESS_HIGH_BITS: u8 = 0x1F;
const LAST_BYTE: u8 = 0xFC;

/// Sampling frequencies indexed by their ADTS sampling frequency index
pub const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Look up the sampling frequency index of `sample_rate`.
pub fn sampling_frequency_index(sample_rate: u32) -> Option<u8> {
    SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|index| index as u8)
}

/// AAC profiles expressible in the 2-bit ADTS profile field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AacProfile {
    Main,
    #[default]
    Low,
    Ssr,
    Ltp,
}

impl AacProfile {
    /// MPEG-4 audio object type
    pub fn object_type(self) -> u8 {
        match self {
            AacProfile::Main => 1,
            AacProfile::Low => 2,
            AacProfile::Ssr => 3,
            AacProfile::Ltp => 4,
        }
    }

    /// Value of the ADTS profile field (object type minus one)
    pub fn adts_index(self) -> u8 {
        self.object_type() - 1
    }

    pub fn from_adts_index(index: u8) -> Self {
        match index & 0b11 {
            0 => AacProfile::Main,
            1 => AacProfile::Low,
            2 => AacProfile::Ssr,
            _ => AacProfile::Ltp,
        }
    }
}

/// Synthesizes the fixed 7-byte header for each AAC payload.
///
/// Profile, sampling index and channel configuration are resolved once at
/// construction; only the length changes per frame.
#[derive(Debug, Clone)]
pub struct AdtsFramer {
    header: [u8; ADTS_HEADER_LEN],
    profile: AacProfile,
    sampling_frequency_index: u8,
    channel_config: u8,
}

impl AdtsFramer {
    /// Fails with `UnsupportedSampleRate` when `sample_rate` has no ADTS index
    /// and with `UnsupportedChannels` outside mono/stereo.
    pub fn new(profile: AacProfile, sample_rate: u32, channels: u16) -> Result<Self> {
        let sampling_frequency_index = sampling_frequency_index(sample_rate)
            .ok_or(TranscodeError::UnsupportedSampleRate(sample_rate))?;
        if !(1..=2).contains(&channels) {
            return Err(TranscodeError::UnsupportedChannels(channels));
        }

        Ok(Self {
            header: [0u8; ADTS_HEADER_LEN],
            profile,
            sampling_frequency_index,
            channel_config: channels as u8,
        })
    }

    pub fn profile(&self) -> AacProfile {
        self.profile
    }

    pub fn sampling_frequency_index(&self) -> u8 {
        self.sampling_frequency_index
    }

    pub fn channel_config(&self) -> u8 {
        self.channel_config
    }

    /// Rewrite the header for a frame of `total_length` bytes (header plus
    /// payload).
    pub fn synthesize(&mut self, total_length: usize) -> Result<&[u8; ADTS_HEADER_LEN]> {
        if !(ADTS_HEADER_LEN..=MAX_FRAME_LENGTH).contains(&total_length) {
            return Err(TranscodeError::FrameTooLarge(total_length));
        }
        let len = total_length as u16;
        let ch = self.channel_config;

        self.header[0] = SYNC_BYTE_0;
        self.header[1] = SYNC_BYTE_1_NO_CRC;
        self.header[2] =
            (self.profile.adts_index() << 6) | (self.sampling_frequency_index << 2) | (ch >> 2);
        self.header[3] = ((ch & 0b11) << 6) | (len >> 11) as u8;
        self.header[4] = ((len & 0x7FF) >> 3) as u8;
        self.header[5] = (((len & 0b111) as u8) << 5) | FULLNESS_HIGH_BITS;
        self.header[6] = LAST_BYTE;

        Ok(&self.header)
    }
}

impl BitstreamFramer for AdtsFramer {
    fn header_for(&mut self, payload_len: usize) -> Result<&[u8]> {
        let total = payload_len
            .checked_add(ADTS_HEADER_LEN)
            .ok_or(TranscodeError::FrameTooLarge(payload_len))?;
        Ok(self.synthesize(total)?.as_slice())
    }
}

/// Read the 13-bit frame length from bytes 3..=5 of a header.
///
/// No sync check is made; callers positioned on a header use this to find
/// the next one.
pub fn parse_frame_length(header: &[u8]) -> Option<usize> {
    if header.len() < ADTS_HEADER_LEN {
        return None;
    }
    Some(
        ((header[3] as usize & 0b11) << 11)
            | ((header[4] as usize) << 3)
            | ((header[5] as usize & 0xE0) >> 5),
    )
}

/// Fields of a parsed ADTS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub profile: AacProfile,
    pub sampling_frequency_index: u8,
    pub channel_config: u8,
    pub protection_absent: bool,
    /// Header plus payload, in bytes
    pub frame_length: usize,
}

impl AdtsHeader {
    /// Parse a header, returning `None` unless the 12-bit sync is present
    /// and the layer field is zero.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ADTS_HEADER_LEN
            || bytes[0] != 0xFF
            || bytes[1] & 0xF0 != 0xF0
            || bytes[1] & 0x06 != 0
        {
            return None;
        }
        Some(Self {
            profile: AacProfile::from_adts_index(bytes[2] >> 6),
            sampling_frequency_index: (bytes[2] >> 2) & 0x0F,
            channel_config: ((bytes[2] & 0x01) << 2) | (bytes[3] >> 6),
            protection_absent: bytes[1] & 0x01 == 0x01,
            frame_length: parse_frame_length(bytes)?,
        })
    }

    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            ADTS_HEADER_LEN
        } else {
            ADTS_HEADER_LEN_CRC
        }
    }

    /// Raw payload bytes following the header
    pub fn payload_len(&self) -> usize {
        self.frame_length.saturating_sub(self.header_len())
    }

    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLING_FREQUENCIES
            .get(self.sampling_frequency_index as usize)
            .copied()
    }
}

/// Recovers AAC payloads from a stream of back-to-back ADTS frames.
#[derive(Debug, Default)]
pub struct AdtsSplitter {
    buf: BytesMut,
    rejected: usize,
}

impl AdtsSplitter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSplitter for AdtsSplitter {
    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            if self.buf.len() < ADTS_HEADER_LEN {
                return None;
            }
            let header = match AdtsHeader::parse(&self.buf) {
                Some(h) if h.frame_length >= h.header_len() => h,
                _ => {
                    self.rejected += 1;
                    tracing::debug!(buffered = self.buf.len(), "adts: lost sync, skipping one byte");
                    self.buf.advance(1);
                    continue;
                }
            };
            if self.buf.len() < header.frame_length {
                return None;
            }

            let frame = self.buf.split_to(header.frame_length).freeze();
            tracing::trace!(
                frame_length = header.frame_length,
                payload = header.payload_len(),
                "adts: frame"
            );
            return Some(frame.slice(header.header_len()..));
        }
    }

    fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn rejected_syncs(&self) -> usize {
        self.rejected
    }
}
