//! Streaming PCM ⇄ AAC/MP3 transcoding
//!
//! Interleaved f32 PCM chunks are re-chunked into codec-native frames,
//! converted to the codec's planar format, encoded and framed: AAC packets
//! get a 7-byte ADTS header, MP3 packets are left self-delimiting. On the way
//! back, splitters recover frame boundaries from a byte stream and the
//! decoders deliver interleaved f32 PCM.
//!
//! The codec itself sits behind [`engine::EncodeEngine`] and
//! [`engine::DecodeEngine`]; the FFmpeg implementation is enabled with the
//! `ffmpeg` feature.

pub mod assembler;
pub mod config;
pub mod config_file;
pub mod convert;
pub mod engine;
pub mod error;
pub mod frame;
pub mod framing;
pub mod transcode;

#[cfg(feature = "ffmpeg")]
pub mod driver;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

#[cfg(test)]
mod tests;

pub use config::{DecoderConfig, DriverConfig, EncoderConfig, SampleFormat, StreamParams};
pub use error::{CodecError, Result, TranscodeError};
pub use transcode::{AacDecoder, AacEncoder, EncodedPacket, Mp3Decoder, Mp3Encoder};
