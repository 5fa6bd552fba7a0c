//! FFmpeg-backed codec engines and resampler
//!
//! This module handles:
//! - one-time FFmpeg initialization
//! - mapping between crate sample formats and FFmpeg's
//! - the `EncodeEngine`/`DecodeEngine`/`Resampler` implementations

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod resampler;

use std::sync::OnceLock;

pub use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

pub use decoder::FfmpegDecoder;
pub use encoder::FfmpegEncoder;
pub use frame::{AvFrame, DecodedFrame};
pub use resampler::SwrResampler;

use crate::config::{ChannelLayoutTag, SampleFormat};
use crate::error::{CodecError, Result};
use crate::transcode::{AacDecoder, AacEncoder, Mp3Decoder, Mp3Encoder};

pub type FfmpegAacEncoder = AacEncoder<FfmpegEncoder, SwrResampler>;
pub type FfmpegMp3Encoder = Mp3Encoder<FfmpegEncoder, SwrResampler>;
pub type FfmpegAacDecoder = AacDecoder<FfmpegDecoder>;
pub type FfmpegMp3Decoder = Mp3Decoder<FfmpegDecoder>;

static INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Initialize FFmpeg once per process.
///
/// Also lowers FFmpeg's own log level to warnings; later calls return the
/// outcome of the first one.
pub fn init() -> Result<()> {
    INIT.get_or_init(|| {
        ffmpeg::init().map_err(|e| format!("ffmpeg::init() failed: {}", e))?;
        unsafe {
            ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_WARNING as i32);
        }
        tracing::info!(version = %version_info(), "FFmpeg initialized");
        Ok(())
    })
    .clone()
    .map_err(|e| CodecError::InitFailed(e).into())
}

/// libavcodec version as `major.minor.micro`
pub fn version_info() -> String {
    let v = ffmpeg::codec::version();
    format!("libavcodec {}.{}.{}", v >> 16, (v >> 8) & 0xFF, v & 0xFF)
}

/// Check whether this FFmpeg build has an encoder for `id`.
pub fn is_encoder_available(id: ffmpeg::codec::Id) -> bool {
    ffmpeg::codec::encoder::find(id).is_some()
}

/// Check whether this FFmpeg build has a decoder for `id`.
pub fn is_decoder_available(id: ffmpeg::codec::Id) -> bool {
    ffmpeg::codec::decoder::find(id).is_some()
}

pub fn to_av_sample(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::F32Interleaved => Sample::F32(Type::Packed),
        SampleFormat::F32Planar => Sample::F32(Type::Planar),
        SampleFormat::S16Planar => Sample::I16(Type::Planar),
    }
}

pub fn from_av_sample(sample: Sample) -> Option<SampleFormat> {
    match sample {
        Sample::F32(Type::Packed) => Some(SampleFormat::F32Interleaved),
        Sample::F32(Type::Planar) => Some(SampleFormat::F32Planar),
        Sample::I16(Type::Planar) => Some(SampleFormat::S16Planar),
        _ => None,
    }
}

pub fn to_av_layout(layout: ChannelLayoutTag) -> ChannelLayout {
    match layout {
        ChannelLayoutTag::Mono => ChannelLayout::MONO,
        ChannelLayoutTag::Stereo => ChannelLayout::STEREO,
    }
}
