//! Encoder pipeline
//!
//! `EncoderPipeline` drives interleaved f32 PCM through
//! `FrameAssembler` → `Resampler` → `EncodeEngine` → `BitstreamFramer` and
//! hands each framed packet to the installed callback. [`AacEncoder`] and
//! [`Mp3Encoder`] pin the framer and callback shape for each codec.

use crate::assembler::FrameAssembler;
use crate::config::{EncoderConfig, StreamParams};
use crate::engine::{EncodeEngine, Resampler};
use crate::error::{Result, TranscodeError};
use crate::frame::{NativeFrame, PcmFrame};
use crate::framing::adts::{AacProfile, AdtsFramer};
use crate::framing::mpa;
use crate::framing::{BitstreamFramer, RawFramer};

/// AAC encoder frame size (samples per channel per frame)
pub const AAC_FRAME_SIZE: usize = 1024;
/// MPEG-1 Layer III frame size (samples per channel per frame)
pub const MP3_FRAME_SIZE: usize = 1152;

/// One framed packet handed to the callback
#[derive(Debug, Clone, Copy)]
pub struct EncodedPacket<'a> {
    /// Framing header, empty when the codec's packets are self-delimiting
    pub header: &'a [u8],
    pub payload: &'a [u8],
    /// Presentation timestamp in samples
    pub pts: i64,
}

impl EncodedPacket<'_> {
    /// Header plus payload length in bytes
    pub fn len(&self) -> usize {
        self.header.len() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type PacketCallback = Box<dyn FnMut(EncodedPacket<'_>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Closed,
}

/// Counters reported by [`EncoderPipeline::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    /// Frames accepted by the engine
    pub frames: u64,
    /// Frames submitted with fewer than the native sample count
    pub short_frames: u64,
    /// Frames the engine refused; their samples are dropped
    pub rejected: u64,
    /// Packets delivered to the callback
    pub packets: u64,
    /// Header plus payload bytes delivered
    pub bytes: u64,
}

/// Generic PCM → framed packet pipeline
pub struct EncoderPipeline<E: EncodeEngine, R: Resampler> {
    engine: E,
    resampler: R,
    framer: Box<dyn BitstreamFramer>,
    frame: E::Frame,
    assembler: FrameAssembler,
    input: StreamParams,
    frame_index: i64,
    last_pts: i64,
    callback: Option<PacketCallback>,
    state: State,
    stats: EncoderStats,
}

impl<E: EncodeEngine, R: Resampler> EncoderPipeline<E, R> {
    /// Assemble a pipeline around an opened engine.
    ///
    /// The native frame is allocated here and reused for every submission.
    pub fn new(
        input: StreamParams,
        engine: E,
        resampler: R,
        framer: Box<dyn BitstreamFramer>,
    ) -> Result<Self> {
        let frame_size = engine.frame_size();
        if frame_size == 0 {
            return Err(TranscodeError::Config(format!(
                "{} reported a zero frame size",
                engine.name()
            )));
        }
        let frame = engine.alloc_frame()?;
        if frame.channels() != input.channels() {
            return Err(TranscodeError::Config(format!(
                "{} frame has {} channels, input has {}",
                engine.name(),
                frame.channels(),
                input.channels()
            )));
        }

        tracing::debug!(
            engine = engine.name(),
            frame_size,
            sample_rate = input.sample_rate,
            channels = input.channels(),
            "encoder pipeline ready"
        );

        Ok(Self {
            engine,
            resampler,
            framer,
            frame,
            assembler: FrameAssembler::new(frame_size, &input),
            input,
            frame_index: 0,
            last_pts: 0,
            callback: None,
            state: State::Ready,
            stats: EncoderStats::default(),
        })
    }

    /// Install the packet sink, replacing any previous one.
    pub fn install_callback<C>(&mut self, callback: C)
    where
        C: FnMut(EncodedPacket<'_>) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Encode one chunk of interleaved f32 PCM.
    ///
    /// The chunk is split into native frames (the last one possibly short);
    /// packets the engine produces are delivered before this returns.
    ///
    /// A frame the engine refuses is dropped and the rest of the chunk is still
    /// submitted, so every accepted sample is consumed exactly once. The call
    /// then returns the first refusal, for which
    /// [`TranscodeError::is_rejection`] is true; `stats().rejected` counts
    /// them all. The pipeline stays usable.
    pub fn encode(&mut self, pcm: &[u8]) -> Result<()> {
        if self.state == State::Closed {
            return Err(TranscodeError::PipelineClosed);
        }

        let leftover = self.assembler.leftover_bytes(pcm);
        if leftover != 0 {
            tracing::warn!(
                leftover,
                chunk = pcm.len(),
                "encode: ignoring trailing bytes that do not form a whole sample"
            );
        }

        let frame_size = self.assembler.frame_size();
        let mut rejection = None;
        for span in self.assembler.split(pcm) {
            if span.is_short(frame_size) {
                tracing::debug!(
                    samples = span.samples,
                    frame_size,
                    "encode: incomplete frame, submitting short frame"
                );
            }

            self.frame.make_writable()?;
            self.frame.set_samples(span.samples);
            self.resampler
                .convert(span.data, span.samples, &mut self.frame.planes_mut())?;

            let pts = self.frame_index * frame_size as i64;
            self.frame.set_pts(pts);

            if let Err(e) = self.engine.send_frame(&self.frame) {
                self.frame.set_samples(frame_size);
                if !e.is_rejection() {
                    return Err(e);
                }
                tracing::warn!(engine = self.engine.name(), pts, error = %e, "encode: frame rejected");
                self.stats.rejected += 1;
                if rejection.is_none() {
                    rejection = Some(e);
                }
                continue;
            }
            self.frame_index += 1;
            self.last_pts = pts;
            self.stats.frames += 1;
            if span.is_short(frame_size) {
                self.stats.short_frames += 1;
            }
            self.frame.set_samples(frame_size);

            self.drain()?;
        }

        match rejection {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush the engine's delayed packets through the callback and close the
    /// pipeline. Calling it again is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        self.engine.send_eof()?;
        self.drain()?;
        tracing::debug!(
            engine = self.engine.name(),
            frames = self.stats.frames,
            packets = self.stats.packets,
            "encoder pipeline finished"
        );
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(packet) = self.engine.receive_packet()? {
            let header = self.framer.header_for(packet.data.len())?;
            let encoded = EncodedPacket {
                header,
                payload: packet.data,
                pts: packet.pts.unwrap_or(self.last_pts),
            };
            tracing::trace!(pts = encoded.pts, bytes = encoded.len(), "encode: packet");

            self.stats.packets += 1;
            self.stats.bytes += encoded.len() as u64;
            if let Some(callback) = self.callback.as_mut() {
                callback(encoded);
            }
        }
        Ok(())
    }

    /// Samples per channel of one native frame
    pub fn frame_size(&self) -> usize {
        self.assembler.frame_size()
    }

    /// Frames accepted so far; the next frame's pts is this times the frame size
    pub fn frame_index(&self) -> i64 {
        self.frame_index
    }

    pub fn input_params(&self) -> &StreamParams {
        &self.input
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

/// AAC encoder emitting ADTS-framed packets
pub struct AacEncoder<E: EncodeEngine, R: Resampler> {
    pipeline: EncoderPipeline<E, R>,
}

impl<E: EncodeEngine, R: Resampler> AacEncoder<E, R> {
    /// Wrap an opened AAC engine. The ADTS header fields are fixed here, so an
    /// unsupported sample rate fails now rather than on the first frame.
    pub fn with_engine(config: &EncoderConfig, engine: E, resampler: R) -> Result<Self> {
        let input = config.input_params()?;
        let framer = AdtsFramer::new(AacProfile::Low, config.sample_rate, config.channels)?;
        tracing::debug!(
            profile = ?framer.profile(),
            sampling_frequency_index = framer.sampling_frequency_index(),
            channel_config = framer.channel_config(),
            "aac: adts header fields"
        );
        Ok(Self {
            pipeline: EncoderPipeline::new(input, engine, resampler, Box::new(framer))?,
        })
    }

    /// Install the sink receiving `(adts_header, payload)` per frame.
    pub fn install_callback<C>(&mut self, mut callback: C)
    where
        C: FnMut(&[u8], &[u8]) + 'static,
    {
        self.pipeline
            .install_callback(move |packet| callback(packet.header, packet.payload));
    }

    /// Install a sink that also receives the packet timestamp.
    pub fn install_packet_callback<C>(&mut self, callback: C)
    where
        C: FnMut(EncodedPacket<'_>) + 'static,
    {
        self.pipeline.install_callback(callback);
    }

    pub fn encode(&mut self, pcm: &[u8]) -> Result<()> {
        self.pipeline.encode(pcm)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.pipeline.finish()
    }

    pub fn pipeline(&self) -> &EncoderPipeline<E, R> {
        &self.pipeline
    }
}

/// MP3 encoder emitting self-delimiting MPEG audio frames
pub struct Mp3Encoder<E: EncodeEngine, R: Resampler> {
    pipeline: EncoderPipeline<E, R>,
}

impl<E: EncodeEngine, R: Resampler> Mp3Encoder<E, R> {
    /// Wrap an opened MP3 engine.
    ///
    /// Only the MPEG-1 sample rates are accepted since the sync scanner on the
    /// decode side only knows those.
    pub fn with_engine(config: &EncoderConfig, engine: E, resampler: R) -> Result<Self> {
        check_mp3_sample_rate(config.sample_rate)?;
        let input = config.input_params()?;
        Ok(Self {
            pipeline: EncoderPipeline::new(input, engine, resampler, Box::new(RawFramer))?,
        })
    }

    /// Install the sink receiving each MP3 frame.
    pub fn install_callback<C>(&mut self, mut callback: C)
    where
        C: FnMut(&[u8]) + 'static,
    {
        self.pipeline
            .install_callback(move |packet| callback(packet.payload));
    }

    pub fn install_packet_callback<C>(&mut self, callback: C)
    where
        C: FnMut(EncodedPacket<'_>) + 'static,
    {
        self.pipeline.install_callback(callback);
    }

    pub fn encode(&mut self, pcm: &[u8]) -> Result<()> {
        self.pipeline.encode(pcm)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.pipeline.finish()
    }

    pub fn pipeline(&self) -> &EncoderPipeline<E, R> {
        &self.pipeline
    }
}

pub(crate) fn check_mp3_sample_rate(sample_rate: u32) -> Result<()> {
    if mpa::SAMPLE_RATES.contains(&sample_rate) {
        Ok(())
    } else {
        Err(TranscodeError::UnsupportedSampleRate(sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SampleFormat;
    use crate::convert::{samples_to_f32le, SampleConverter};
    use crate::framing::adts::parse_frame_length;
    use crate::tests::mock::{MockEncoder, MockEncoderOptions};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn aac_config() -> EncoderConfig {
        EncoderConfig::new(80_000, 44100, 2)
    }

    fn converter(config: &EncoderConfig, format: SampleFormat) -> SampleConverter {
        let input = config.input_params().unwrap();
        SampleConverter::new(input, input.with_format(format)).unwrap()
    }

    fn aac_with(options: MockEncoderOptions) -> AacEncoder<MockEncoder, SampleConverter> {
        let config = aac_config();
        let engine = MockEncoder::new(SampleFormat::F32Planar, 2, AAC_FRAME_SIZE, options);
        AacEncoder::with_engine(&config, engine, converter(&config, SampleFormat::F32Planar))
            .unwrap()
    }

    fn silence(samples: usize, channels: usize) -> Vec<u8> {
        samples_to_f32le(&vec![0.0; samples * channels])
    }

    #[test]
    fn test_one_frame_of_silence_gives_one_adts_frame() {
        let mut enc = aac_with(MockEncoderOptions::default());
        let frames = Rc::new(RefCell::new(Vec::new()));
        let sink = frames.clone();
        enc.install_callback(move |header, payload| {
            sink.borrow_mut().push((header.to_vec(), payload.len()));
        });

        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();

        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        let (header, payload_len) = &frames[0];
        assert_eq!(header.len(), 7);
        assert_eq!(header[5] & 0x1F, 0x1F);
        assert_eq!(parse_frame_length(header), Some(7 + payload_len));
    }

    #[test]
    fn test_pts_counts_frames_not_packets() {
        // Engine holds two frames back before emitting anything
        let mut enc = aac_with(MockEncoderOptions {
            delay: 2,
            ..Default::default()
        });
        let pts = Rc::new(RefCell::new(Vec::new()));
        let sink = pts.clone();
        enc.install_packet_callback(move |packet| sink.borrow_mut().push(packet.pts));

        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        assert!(pts.borrow().is_empty());
        assert_eq!(enc.pipeline().frame_index(), 2);

        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        assert_eq!(*pts.borrow(), vec![0]);

        enc.finish().unwrap();
        assert_eq!(*pts.borrow(), vec![0, 1024, 2048]);
    }

    #[test]
    fn test_short_final_chunk_is_encoded() {
        let mut enc = aac_with(MockEncoderOptions::default());
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let sink = sizes.clone();
        enc.install_callback(move |_, payload| sink.borrow_mut().push(payload.len()));

        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        enc.encode(&silence(100, 2)).unwrap();

        let stats = enc.pipeline().stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.short_frames, 1);
        assert_eq!(sizes.borrow().len(), 2);
        // The mock payload length tracks the sample count it was given
        assert!(sizes.borrow()[1] < sizes.borrow()[0]);
    }

    #[test]
    fn test_short_frame_does_not_shrink_later_frames() {
        let mut enc = aac_with(MockEncoderOptions::default());
        enc.encode(&silence(10, 2)).unwrap();
        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        let seen = enc.pipeline().engine().submitted_samples();
        assert_eq!(seen, vec![10, AAC_FRAME_SIZE]);
    }

    #[test]
    fn test_large_chunk_is_rechunked() {
        let mut enc = aac_with(MockEncoderOptions::default());
        enc.encode(&silence(AAC_FRAME_SIZE * 3 + 5, 2)).unwrap();
        assert_eq!(
            enc.pipeline().engine().submitted_samples(),
            vec![AAC_FRAME_SIZE, AAC_FRAME_SIZE, AAC_FRAME_SIZE, 5]
        );
    }

    #[test]
    fn test_samples_reach_engine_planar() {
        let mut enc = aac_with(MockEncoderOptions::default());
        let mut pcm = Vec::new();
        for s in 0..AAC_FRAME_SIZE {
            pcm.push(s as f32 / 2048.0);
            pcm.push(-(s as f32) / 2048.0);
        }
        enc.encode(&samples_to_f32le(&pcm)).unwrap();

        let planes = enc.pipeline().engine().last_planes_f32();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0][3], 3.0 / 2048.0);
        assert_eq!(planes[1][3], -3.0 / 2048.0);
    }

    #[test]
    fn test_rejection_is_reported_and_recoverable() {
        let mut enc = aac_with(MockEncoderOptions {
            reject_frames: vec![1],
            ..Default::default()
        });
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        enc.install_callback(move |_, _| *sink.borrow_mut() += 1);

        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        let err = enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(enc.pipeline().frame_index(), 1);

        // Not retried internally; the caller resubmits
        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        assert_eq!(enc.pipeline().frame_index(), 2);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_rejection_inside_chunk_does_not_stop_the_chunk() {
        let mut enc = aac_with(MockEncoderOptions {
            reject_frames: vec![1],
            ..Default::default()
        });
        let pts = Rc::new(RefCell::new(Vec::new()));
        let sink = pts.clone();
        enc.install_packet_callback(move |packet| sink.borrow_mut().push(packet.pts));

        let err = enc.encode(&silence(AAC_FRAME_SIZE * 3, 2)).unwrap_err();
        assert!(err.is_rejection());

        // Frames 0 and 2 went through once each; frame 1 was dropped
        let stats = enc.pipeline().stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(
            enc.pipeline().engine().submitted_samples(),
            vec![AAC_FRAME_SIZE, AAC_FRAME_SIZE]
        );
        assert_eq!(*pts.borrow(), vec![0, 1024]);

        // The next chunk continues from the accepted frame count
        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        assert_eq!(enc.pipeline().engine().submitted_samples().len(), 3);
        assert_eq!(*pts.borrow(), vec![0, 1024, 2048]);
    }

    #[test]
    fn test_callback_replacement() {
        let mut enc = aac_with(MockEncoderOptions::default());
        let first = Rc::new(RefCell::new(0));
        let second = Rc::new(RefCell::new(0));
        let a = first.clone();
        enc.install_callback(move |_, _| *a.borrow_mut() += 1);
        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();

        let b = second.clone();
        enc.install_callback(move |_, _| *b.borrow_mut() += 1);
        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();

        assert_eq!(*first.borrow(), 1);
        assert_eq!(*second.borrow(), 1);
    }

    #[test]
    fn test_no_callback_still_encodes() {
        let mut enc = aac_with(MockEncoderOptions::default());
        enc.encode(&silence(AAC_FRAME_SIZE, 2)).unwrap();
        assert_eq!(enc.pipeline().stats().packets, 1);
    }

    #[test]
    fn test_closed_pipeline_refuses_input() {
        let mut enc = aac_with(MockEncoderOptions::default());
        enc.finish().unwrap();
        enc.finish().unwrap();
        assert!(enc.pipeline().is_closed());
        assert!(matches!(
            enc.encode(&silence(AAC_FRAME_SIZE, 2)),
            Err(TranscodeError::PipelineClosed)
        ));
    }

    #[test]
    fn test_aac_rejects_unsupported_rate() {
        let config = EncoderConfig::new(80_000, 44000, 2);
        let input = StreamParams::new(44000, 2, SampleFormat::F32Interleaved).unwrap();
        let conv = SampleConverter::new(input, input.with_format(SampleFormat::F32Planar)).unwrap();
        let engine = MockEncoder::new(
            SampleFormat::F32Planar,
            2,
            AAC_FRAME_SIZE,
            MockEncoderOptions::default(),
        );
        assert!(matches!(
            AacEncoder::with_engine(&config, engine, conv),
            Err(TranscodeError::UnsupportedSampleRate(44000))
        ));
    }

    #[test]
    fn test_mp3_packets_have_no_header() {
        let config = EncoderConfig::new(320_000, 44100, 2);
        let engine = MockEncoder::new(
            SampleFormat::S16Planar,
            2,
            MP3_FRAME_SIZE,
            MockEncoderOptions::default(),
        );
        let mut enc =
            Mp3Encoder::with_engine(&config, engine, converter(&config, SampleFormat::S16Planar))
                .unwrap();
        let packets = Rc::new(RefCell::new(Vec::new()));
        let sink = packets.clone();
        enc.install_packet_callback(move |p| {
            sink.borrow_mut().push((p.header.len(), p.payload.len()))
        });

        enc.encode(&silence(MP3_FRAME_SIZE, 2)).unwrap();
        let packets = packets.borrow();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].0, 0);
        assert!(packets[0].1 > 0);
    }

    #[test]
    fn test_mp3_rejects_mpeg2_rate() {
        assert!(check_mp3_sample_rate(44100).is_ok());
        assert!(check_mp3_sample_rate(32000).is_ok());
        assert!(matches!(
            check_mp3_sample_rate(22050),
            Err(TranscodeError::UnsupportedSampleRate(22050))
        ));
    }

    #[test]
    fn test_channel_mismatch_fails_construction() {
        let config = aac_config();
        let engine = MockEncoder::new(
            SampleFormat::F32Planar,
            1,
            AAC_FRAME_SIZE,
            MockEncoderOptions::default(),
        );
        let result =
            AacEncoder::with_engine(&config, engine, converter(&config, SampleFormat::F32Planar));
        assert!(matches!(result, Err(TranscodeError::Config(_))));
    }
}
