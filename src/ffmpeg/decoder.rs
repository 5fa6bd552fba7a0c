//! FFmpeg decode engine

use std::ptr;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;

use super::frame::DecodedFrame;
use crate::config::DecoderConfig;
use crate::engine::DecodeEngine;
use crate::error::{CodecError, Result, TranscodeError};
use crate::framing::adts::{sampling_frequency_index, AacProfile};
use crate::transcode::decoder::{AacDecoder, Mp3Decoder};

/// Two-byte AudioSpecificConfig: object type, frequency index, channel config.
pub fn audio_specific_config(profile: AacProfile, sample_rate: u32, channels: u16) -> Result<[u8; 2]> {
    let sfi = sampling_frequency_index(sample_rate)
        .ok_or(TranscodeError::UnsupportedSampleRate(sample_rate))?;
    if !(1..=2).contains(&channels) {
        return Err(TranscodeError::UnsupportedChannels(channels));
    }
    let asc = ((profile.object_type() as u16) << 11) | ((sfi as u16) << 7) | (channels << 3);
    Ok(asc.to_be_bytes())
}

/// Decoder backed by a real FFmpeg codec context
pub struct FfmpegDecoder {
    decoder: codec::decoder::Audio,
    name: &'static str,
    frame: DecodedFrame,
}

impl FfmpegDecoder {
    /// Open an MP3 decoder; the stream describes itself in every frame header.
    pub fn open_mp3() -> Result<Self> {
        super::init()?;
        let codec = codec::decoder::find(codec::Id::MP3).ok_or_else(|| not_found(codec::Id::MP3))?;
        let context = codec::Context::new_with_codec(codec);
        Self::finish_open(context, "mp3")
    }

    /// Open an AAC decoder for raw (header-stripped) payloads.
    ///
    /// Raw payloads carry no stream parameters, so the context is primed with
    /// an AudioSpecificConfig built from `config`.
    pub fn open_aac(config: &DecoderConfig) -> Result<Self> {
        super::init()?;
        let asc = audio_specific_config(AacProfile::Low, config.sample_rate, config.channels)?;
        let codec = codec::decoder::find(codec::Id::AAC).ok_or_else(|| not_found(codec::Id::AAC))?;
        let mut context = codec::Context::new_with_codec(codec);

        unsafe {
            let ctx = context.as_mut_ptr();
            let size = asc.len() + ffmpeg::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
            let extradata = ffmpeg::ffi::av_mallocz(size) as *mut u8;
            if extradata.is_null() {
                return Err(CodecError::Alloc("AAC extradata".into()).into());
            }
            ptr::copy_nonoverlapping(asc.as_ptr(), extradata, asc.len());
            // Freed by avcodec_free_context along with the context
            (*ctx).extradata = extradata;
            (*ctx).extradata_size = asc.len() as i32;
            (*ctx).sample_rate = config.sample_rate as i32;
            ffmpeg::ffi::av_channel_layout_default(&mut (*ctx).ch_layout, config.channels as i32);
        }

        Self::finish_open(context, "aac")
    }

    fn finish_open(context: codec::Context, name: &'static str) -> Result<Self> {
        let decoder = context.decoder().audio().map_err(|e| {
            CodecError::DecoderOpen(format!("Failed to open {} decoder: {}", name, e))
        })?;
        tracing::info!(codec = name, "decoder opened");
        Ok(Self {
            decoder,
            name,
            frame: DecodedFrame::empty(),
        })
    }
}

fn not_found(id: codec::Id) -> TranscodeError {
    CodecError::DecoderNotFound(format!("{:?} decoder not found in this FFmpeg build", id)).into()
}

impl DecodeEngine for FfmpegDecoder {
    type Frame = DecodedFrame;

    fn name(&self) -> &'static str {
        self.name
    }

    fn send_packet(&mut self, data: &[u8]) -> Result<()> {
        let packet = ffmpeg::Packet::copy(data);
        self.decoder.send_packet(&packet).map_err(|e| {
            CodecError::SendPacket(format!("{} decoder send_packet error: {}", self.name, e)).into()
        })
    }

    fn send_eof(&mut self) -> Result<()> {
        self.decoder.send_eof().map_err(|e| {
            CodecError::SendPacket(format!("{} decoder send_eof error: {}", self.name, e)).into()
        })
    }

    fn receive_frame(&mut self) -> Result<Option<&DecodedFrame>> {
        match self.decoder.receive_frame(self.frame.audio_mut()) {
            Ok(()) => {
                self.frame.update_format()?;
                Ok(Some(&self.frame))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(CodecError::ReceiveFrame(format!(
                "{} decoder receive_frame error: {}",
                self.name, e
            ))
            .into()),
        }
    }
}

impl AacDecoder<FfmpegDecoder> {
    /// Open an FFmpeg AAC decoder fed with ADTS payloads.
    pub fn new(config: &DecoderConfig) -> Result<Self> {
        Self::with_engine(config, FfmpegDecoder::open_aac(config)?)
    }
}

impl Mp3Decoder<FfmpegDecoder> {
    /// Open an FFmpeg MP3 decoder fed with whole frames.
    pub fn new(config: &DecoderConfig) -> Result<Self> {
        Self::with_engine(config, FfmpegDecoder::open_mp3()?)
    }
}
