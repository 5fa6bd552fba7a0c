//! FFmpeg encode engine
//!
//! Wraps an opened `AVCodecContext` for AAC or MP3 and the packet it
//! receives into, plus the FFmpeg-backed constructors of the encoder facades.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;

use super::frame::AvFrame;
use super::resampler::SwrResampler;
use super::{to_av_layout, to_av_sample};
use crate::config::{EncoderConfig, SampleFormat, StreamParams};
use crate::engine::{EncodeEngine, PacketRef};
use crate::error::{CodecError, Result};
use crate::transcode::encoder::{check_mp3_sample_rate, AacEncoder, Mp3Encoder};

/// Encoder backed by a real FFmpeg codec context
pub struct FfmpegEncoder {
    encoder: codec::encoder::audio::Encoder,
    name: &'static str,
    params: StreamParams,
    frame_size: usize,
    packet: ffmpeg::Packet,
}

impl FfmpegEncoder {
    /// Open the encoder for `id` taking planar input in `format`.
    pub fn open(id: codec::Id, config: &EncoderConfig, format: SampleFormat) -> Result<Self> {
        super::init()?;

        let codec = codec::encoder::find(id).ok_or_else(|| {
            CodecError::EncoderNotFound(format!("{:?} encoder not found in this FFmpeg build", id))
        })?;
        let params = config.input_params()?.with_format(format);

        // Configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, config.sample_rate as i32));

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            CodecError::EncoderOpen(format!("Cannot get audio encoder handle: {}", e))
        })?;
        audio_enc.set_rate(config.sample_rate as i32);
        audio_enc.set_format(to_av_sample(format));
        audio_enc.set_channel_layout(to_av_layout(params.layout));
        audio_enc.set_bit_rate(config.bitrate as usize);

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            CodecError::EncoderOpen(format!("Failed to open {:?} encoder: {}", id, e))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => default_frame_size(id),
            n => n,
        };
        let name = codec_name(id);

        tracing::info!(
            codec = name,
            sample_rate = config.sample_rate,
            channels = config.channels,
            bitrate = config.bitrate,
            frame_size,
            "encoder opened"
        );

        Ok(Self {
            encoder,
            name,
            params,
            frame_size,
            packet: ffmpeg::Packet::empty(),
        })
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }
}

fn default_frame_size(id: codec::Id) -> usize {
    match id {
        codec::Id::MP3 => crate::transcode::MP3_FRAME_SIZE,
        _ => crate::transcode::AAC_FRAME_SIZE,
    }
}

fn codec_name(id: codec::Id) -> &'static str {
    match id {
        codec::Id::AAC => "aac",
        codec::Id::MP3 => "mp3",
        _ => "ffmpeg",
    }
}

impl EncodeEngine for FfmpegEncoder {
    type Frame = AvFrame;

    fn name(&self) -> &'static str {
        self.name
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn alloc_frame(&self) -> Result<AvFrame> {
        AvFrame::alloc(&self.params, self.frame_size)
    }

    fn send_frame(&mut self, frame: &AvFrame) -> Result<()> {
        self.encoder.send_frame(frame.as_audio()).map_err(|e| {
            CodecError::SendFrame(format!("{} encoder send_frame error: {}", self.name, e)).into()
        })
    }

    fn send_eof(&mut self) -> Result<()> {
        self.encoder.send_eof().map_err(|e| {
            CodecError::SendFrame(format!("{} encoder send_eof error: {}", self.name, e)).into()
        })
    }

    fn receive_packet(&mut self) -> Result<Option<PacketRef<'_>>> {
        match self.encoder.receive_packet(&mut self.packet) {
            Ok(()) => Ok(Some(PacketRef {
                data: self.packet.data().unwrap_or(&[]),
                pts: self.packet.pts(),
            })),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(CodecError::ReceivePacket(format!(
                "{} encoder receive_packet error: {}",
                self.name, e
            ))
            .into()),
        }
    }
}

impl AacEncoder<FfmpegEncoder, SwrResampler> {
    /// Open an FFmpeg AAC-LC encoder taking interleaved f32 PCM.
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let engine = FfmpegEncoder::open(codec::Id::AAC, config, SampleFormat::F32Planar)?;
        let input = config.input_params()?;
        let resampler = SwrResampler::new(input, *engine.params())?;
        Self::with_engine(config, engine, resampler)
    }
}

impl Mp3Encoder<FfmpegEncoder, SwrResampler> {
    /// Open an FFmpeg MP3 encoder (libmp3lame) taking interleaved f32 PCM.
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        check_mp3_sample_rate(config.sample_rate)?;
        let engine = FfmpegEncoder::open(codec::Id::MP3, config, SampleFormat::S16Planar)?;
        let input = config.input_params()?;
        let resampler = SwrResampler::new(input, *engine.params())?;
        Self::with_engine(config, engine, resampler)
    }
}
