//! Transcoding pipelines
//!
//! - [`encoder`]: interleaved PCM chunks → framed compressed packets
//! - [`decoder`]: isolated compressed frames → interleaved PCM
//!
//! Both are generic over the codec engine; the FFmpeg-backed constructors
//! live in [`crate::ffmpeg`].

pub mod decoder;
pub mod encoder;

pub use decoder::{AacDecoder, DecoderPipeline, DecoderStats, Mp3Decoder};
pub use encoder::{
    AacEncoder, EncodedPacket, EncoderPipeline, EncoderStats, Mp3Encoder, AAC_FRAME_SIZE,
    MP3_FRAME_SIZE,
};
