//! Decoder pipeline
//!
//! Takes one already-isolated compressed frame per call, drains whatever the
//! engine decodes from it and delivers interleaved little-endian f32 PCM.

use crate::config::{DecoderConfig, StreamParams};
use crate::convert::interleave_to_f32le;
use crate::engine::DecodeEngine;
use crate::error::{Result, TranscodeError};
use crate::frame::PcmFrame;

type PcmCallback = Box<dyn FnMut(&[u8])>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Closed,
}

/// Counters reported by [`DecoderPipeline::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Compressed frames accepted by the engine
    pub packets: u64,
    /// Decoded frames delivered
    pub frames: u64,
    /// Samples per channel delivered
    pub samples: u64,
    /// Interleaved PCM bytes delivered
    pub bytes: u64,
}

/// Generic compressed frame → PCM pipeline
pub struct DecoderPipeline<D: DecodeEngine> {
    engine: D,
    output: StreamParams,
    pcm: Vec<u8>,
    callback: Option<PcmCallback>,
    state: State,
    stats: DecoderStats,
    mismatch_logged: bool,
}

impl<D: DecodeEngine> DecoderPipeline<D> {
    pub fn new(output: StreamParams, engine: D) -> Self {
        tracing::debug!(
            engine = engine.name(),
            sample_rate = output.sample_rate,
            channels = output.channels(),
            "decoder pipeline ready"
        );
        Self {
            engine,
            output,
            pcm: Vec::new(),
            callback: None,
            state: State::Ready,
            stats: DecoderStats::default(),
            mismatch_logged: false,
        }
    }

    /// Install the PCM sink, replacing any previous one.
    pub fn install_callback<C>(&mut self, callback: C)
    where
        C: FnMut(&[u8]) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Decode exactly one compressed frame.
    ///
    /// Producing no PCM is not an error; decoders hold frames back. A frame
    /// the engine refuses is reported through [`TranscodeError::is_rejection`].
    pub fn decode(&mut self, frame: &[u8]) -> Result<()> {
        if self.state == State::Closed {
            return Err(TranscodeError::PipelineClosed);
        }
        if frame.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.engine.send_packet(frame) {
            tracing::warn!(
                engine = self.engine.name(),
                bytes = frame.len(),
                error = %e,
                "decode: packet rejected"
            );
            return Err(e);
        }
        self.stats.packets += 1;
        self.drain()
    }

    /// Flush frames the engine is still holding and close the pipeline.
    pub fn finish(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        self.engine.send_eof()?;
        self.drain()?;
        tracing::debug!(
            engine = self.engine.name(),
            packets = self.stats.packets,
            frames = self.stats.frames,
            "decoder pipeline finished"
        );
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(frame) = self.engine.receive_frame()? {
            if frame.channels() != self.output.channels() && !self.mismatch_logged {
                tracing::warn!(
                    decoded = frame.channels(),
                    configured = self.output.channels(),
                    "decode: channel count differs from configuration"
                );
                self.mismatch_logged = true;
            }

            interleave_to_f32le(frame, &mut self.pcm)?;
            tracing::trace!(samples = frame.samples(), bytes = self.pcm.len(), "decode: frame");

            self.stats.frames += 1;
            self.stats.samples += frame.samples() as u64;
            self.stats.bytes += self.pcm.len() as u64;
            if let Some(callback) = self.callback.as_mut() {
                callback(&self.pcm);
            }
        }
        Ok(())
    }

    pub fn output_params(&self) -> &StreamParams {
        &self.output
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn engine(&self) -> &D {
        &self.engine
    }
}

macro_rules! decoder_facade {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<D: DecodeEngine> {
            pipeline: DecoderPipeline<D>,
        }

        impl<D: DecodeEngine> $name<D> {
            pub fn with_engine(config: &DecoderConfig, engine: D) -> Result<Self> {
                Ok(Self {
                    pipeline: DecoderPipeline::new(config.output_params()?, engine),
                })
            }

            /// Install the sink receiving interleaved f32 PCM.
            pub fn install_callback<C>(&mut self, callback: C)
            where
                C: FnMut(&[u8]) + 'static,
            {
                self.pipeline.install_callback(callback);
            }

            pub fn decode(&mut self, frame: &[u8]) -> Result<()> {
                self.pipeline.decode(frame)
            }

            pub fn finish(&mut self) -> Result<()> {
                self.pipeline.finish()
            }

            pub fn pipeline(&self) -> &DecoderPipeline<D> {
                &self.pipeline
            }
        }
    };
}

decoder_facade!(
    /// AAC decoder fed with ADTS payloads (header already stripped)
    AacDecoder
);

decoder_facade!(
    /// MP3 decoder fed with whole frames, sync header included
    Mp3Decoder
);
