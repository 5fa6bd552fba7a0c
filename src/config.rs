//! Stream and pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TranscodeError};

/// Sample layouts understood by the pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// Interleaved 32-bit float (`flt`), the PCM input/output contract
    F32Interleaved,
    /// One plane of 32-bit floats per channel (`fltp`), AAC encoder input
    F32Planar,
    /// One plane of 16-bit signed integers per channel (`s16p`), MP3 encoder input
    S16Planar,
}

impl SampleFormat {
    /// Size of one sample of one channel in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::F32Interleaved | SampleFormat::F32Planar => 4,
            SampleFormat::S16Planar => 2,
        }
    }

    pub fn is_planar(self) -> bool {
        !matches!(self, SampleFormat::F32Interleaved)
    }
}

/// Channel layout tag derived from the channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayoutTag {
    Mono,
    Stereo,
}

impl ChannelLayoutTag {
    /// Map a channel count to its layout; only 1 and 2 are accepted.
    pub fn from_channels(channels: u16) -> Result<Self> {
        match channels {
            1 => Ok(ChannelLayoutTag::Mono),
            2 => Ok(ChannelLayoutTag::Stereo),
            n => Err(TranscodeError::UnsupportedChannels(n)),
        }
    }

    pub fn channels(self) -> u16 {
        match self {
            ChannelLayoutTag::Mono => 1,
            ChannelLayoutTag::Stereo => 2,
        }
    }
}

/// Immutable description of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Mono or stereo
    pub layout: ChannelLayoutTag,
    /// Sample layout and width
    pub format: SampleFormat,
}

impl StreamParams {
    /// Validate and build stream parameters.
    pub fn new(sample_rate: u32, channels: u16, format: SampleFormat) -> Result<Self> {
        if sample_rate == 0 {
            return Err(TranscodeError::UnsupportedSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            layout: ChannelLayoutTag::from_channels(channels)?,
            format,
        })
    }

    pub fn channels(&self) -> usize {
        self.layout.channels() as usize
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.format.bytes_per_sample()
    }

    /// Bytes occupied by one sample of every channel
    pub fn bytes_per_sample_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels()
    }

    /// Same rate and layout in a different sample format
    pub fn with_format(&self, format: SampleFormat) -> Self {
        Self { format, ..*self }
    }
}

/// Encoder construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Target bitrate in bps
    pub bitrate: u64,

    /// Sample rate of the incoming PCM
    pub sample_rate: u32,

    /// Channel count of the incoming PCM (1 or 2)
    pub channels: u16,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            bitrate: 128_000,
            sample_rate: 44100,
            channels: 2,
        }
    }
}

impl EncoderConfig {
    pub fn new(bitrate: u64, sample_rate: u32, channels: u16) -> Self {
        Self {
            bitrate,
            sample_rate,
            channels,
        }
    }

    /// Parameters of the interleaved f32 PCM this encoder accepts
    pub fn input_params(&self) -> Result<StreamParams> {
        if self.bitrate == 0 {
            return Err(TranscodeError::Config("bitrate must be positive".into()));
        }
        StreamParams::new(
            self.sample_rate,
            self.channels,
            SampleFormat::F32Interleaved,
        )
    }
}

/// Decoder construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Sample rate of the compressed stream
    pub sample_rate: u32,

    /// Channel count of the compressed stream (1 or 2)
    pub channels: u16,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
        }
    }
}

impl DecoderConfig {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Parameters of the interleaved f32 PCM this decoder produces
    pub fn output_params(&self) -> Result<StreamParams> {
        StreamParams::new(
            self.sample_rate,
            self.channels,
            SampleFormat::F32Interleaved,
        )
    }
}

/// Settings for one file-to-file demo run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Interleaved little-endian f32 input
    pub pcm_path: PathBuf,

    /// Directory receiving the encoded streams and decoded PCM
    pub output_dir: PathBuf,

    /// Samples per channel read from the input per encode call
    pub chunk_samples: usize,

    /// AAC encoder settings (rate and channels describe the input)
    pub aac: EncoderConfig,

    /// MP3 encoder settings (rate and channels describe the input)
    pub mp3: EncoderConfig,

    pub log_level: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            pcm_path: PathBuf::from("f32le_ar44100_ac2.pcm"),
            output_dir: PathBuf::from("."),
            chunk_samples: 1024,
            aac: EncoderConfig::new(80_000, 44100, 2),
            mp3: EncoderConfig::new(320_000, 44100, 2),
            log_level: "info".to_string(),
        }
    }
}

impl DriverConfig {
    /// Check what the pipelines would otherwise only reject after opening a codec.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_samples == 0 {
            return Err(TranscodeError::Config("chunk_samples must be positive".into()));
        }
        if self.aac.sample_rate != self.mp3.sample_rate || self.aac.channels != self.mp3.channels {
            return Err(TranscodeError::Config(
                "aac and mp3 encoders must share the input rate and channel count".into(),
            ));
        }
        self.aac.input_params()?;
        self.mp3.input_params()?;
        Ok(())
    }

    /// Bytes of interleaved f32 PCM read per encode call
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_samples * self.aac.channels as usize * 4
    }

    pub fn aac_output(&self) -> PathBuf {
        self.output_dir.join("output.aac")
    }

    pub fn mp3_output(&self) -> PathBuf {
        self.output_dir.join("output.mp3")
    }

    /// Decoded PCM path for the stream tagged `codec`, named after its format
    pub fn decoded_output(&self, codec: &str) -> PathBuf {
        self.output_dir.join(decoded_name(codec, self.aac.sample_rate, self.aac.channels))
    }
}

fn decoded_name(codec: &str, sample_rate: u32, channels: u16) -> String {
    format!("{}_f32le_ar{}_ac{}.pcm", codec, sample_rate, channels)
}

/// True when `path` looks like raw interleaved f32 PCM by extension
pub fn is_pcm_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pcm") || e.eq_ignore_ascii_case("raw"))
        .unwrap_or(false)
}
