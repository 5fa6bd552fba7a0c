//! Encoder → framing → splitter → decoder over mock engines

use std::cell::RefCell;
use std::rc::Rc;

use super::mock::{MockDecoder, MockDecoderOptions, MockEncoder, MockEncoderOptions};
use crate::config::{DecoderConfig, EncoderConfig, SampleFormat};
use crate::convert::{samples_to_f32le, SampleConverter};
use crate::framing::adts::parse_frame_length;
use crate::framing::{split_all, AdtsSplitter, FrameSplitter, MpaSplitter};
use crate::transcode::{
    AacDecoder, AacEncoder, Mp3Decoder, Mp3Encoder, AAC_FRAME_SIZE, MP3_FRAME_SIZE,
};

fn sine(samples: usize, channels: usize) -> Vec<u8> {
    let pcm: Vec<f32> = (0..samples)
        .flat_map(|s| {
            let v = (s as f32 * 0.05).sin() * 0.5;
            std::iter::repeat(v).take(channels)
        })
        .collect();
    samples_to_f32le(&pcm)
}

fn aac_encoder(
    config: &EncoderConfig,
    options: MockEncoderOptions,
) -> AacEncoder<MockEncoder, SampleConverter> {
    let input = config.input_params().unwrap();
    let conv = SampleConverter::new(input, input.with_format(SampleFormat::F32Planar)).unwrap();
    let engine = MockEncoder::new(
        SampleFormat::F32Planar,
        config.channels as usize,
        AAC_FRAME_SIZE,
        options,
    );
    AacEncoder::with_engine(config, engine, conv).unwrap()
}

#[test]
fn test_single_silent_frame_after_flush() {
    // AAC 44100 Hz stereo at 80 kbps, engine with one frame of delay
    let config = EncoderConfig::new(80_000, 44100, 2);
    let mut enc = aac_encoder(
        &config,
        MockEncoderOptions {
            delay: 1,
            ..Default::default()
        },
    );
    let frames = Rc::new(RefCell::new(Vec::new()));
    let sink = frames.clone();
    enc.install_callback(move |header, payload| {
        sink.borrow_mut().push((header.to_vec(), payload.to_vec()));
    });

    enc.encode(&samples_to_f32le(&vec![0.0; AAC_FRAME_SIZE * 2]))
        .unwrap();
    assert!(frames.borrow().is_empty());
    enc.finish().unwrap();

    let frames = frames.borrow();
    assert_eq!(frames.len(), 1);
    let (header, payload) = &frames[0];
    assert_eq!(header[5] & 0x1F, 0x1F);
    assert_eq!(parse_frame_length(header), Some(7 + payload.len()));
}

#[test]
fn test_aac_stream_through_splitter_and_decoder() {
    let config = EncoderConfig::new(128_000, 48000, 2);
    let mut enc = aac_encoder(&config, MockEncoderOptions::default());

    let stream = Rc::new(RefCell::new(Vec::new()));
    let payloads = Rc::new(RefCell::new(Vec::new()));
    let (s, p) = (stream.clone(), payloads.clone());
    enc.install_callback(move |header, payload| {
        s.borrow_mut().extend_from_slice(header);
        s.borrow_mut().extend_from_slice(payload);
        p.borrow_mut().push(payload.to_vec());
    });

    // Uneven chunk sizes, including one that spans several frames
    for samples in [AAC_FRAME_SIZE, 500, AAC_FRAME_SIZE * 3, 1] {
        enc.encode(&sine(samples, 2)).unwrap();
    }
    enc.finish().unwrap();
    assert_eq!(
        enc.pipeline().engine().submitted_samples(),
        vec![1024, 500, 1024, 1024, 1024, 1]
    );

    let mut splitter = AdtsSplitter::new();
    let recovered: Vec<Vec<u8>> = split_all(&mut splitter, &stream.borrow())
        .into_iter()
        .map(|b| b.to_vec())
        .collect();
    assert_eq!(recovered, *payloads.borrow());

    let dec_config = DecoderConfig::new(48000, 2);
    let mut dec = AacDecoder::with_engine(
        &dec_config,
        MockDecoder::new(2, AAC_FRAME_SIZE, MockDecoderOptions::default()),
    )
    .unwrap();
    let pcm_bytes = Rc::new(RefCell::new(0usize));
    let sink = pcm_bytes.clone();
    dec.install_callback(move |pcm| *sink.borrow_mut() += pcm.len());
    for payload in &recovered {
        dec.decode(payload).unwrap();
    }
    dec.finish().unwrap();

    assert_eq!(*pcm_bytes.borrow(), recovered.len() * AAC_FRAME_SIZE * 2 * 4);
}

#[test]
fn test_mp3_stream_through_splitter_and_decoder() {
    let config = EncoderConfig::new(128_000, 44100, 1);
    let input = config.input_params().unwrap();
    let conv = SampleConverter::new(input, input.with_format(SampleFormat::S16Planar)).unwrap();
    let engine = MockEncoder::new(
        SampleFormat::S16Planar,
        1,
        MP3_FRAME_SIZE,
        MockEncoderOptions {
            delay: 3,
            mpa_payload: true,
            ..Default::default()
        },
    );
    let mut enc = Mp3Encoder::with_engine(&config, engine, conv).unwrap();

    let stream = Rc::new(RefCell::new(Vec::new()));
    let s = stream.clone();
    enc.install_callback(move |frame| s.borrow_mut().extend_from_slice(frame));

    for _ in 0..5 {
        enc.encode(&sine(MP3_FRAME_SIZE, 1)).unwrap();
    }
    enc.finish().unwrap();
    assert_eq!(enc.pipeline().stats().packets, 5);

    let mut splitter = MpaSplitter::new();
    let frames = split_all(&mut splitter, &stream.borrow());
    assert_eq!(frames.len(), 5);
    assert_eq!(splitter.rejected_syncs(), 0);

    let mut dec = Mp3Decoder::with_engine(
        &DecoderConfig::new(44100, 1),
        MockDecoder::new(1, MP3_FRAME_SIZE, MockDecoderOptions::default()),
    )
    .unwrap();
    for frame in &frames {
        // The sync header travels with the frame
        assert_eq!(&frame[..2], &[0xFF, 0xFB]);
        dec.decode(frame).unwrap();
    }
    dec.finish().unwrap();
    assert_eq!(dec.pipeline().stats().samples, 5 * MP3_FRAME_SIZE as u64);
}

#[test]
fn test_mono_and_stereo_have_matching_timestamps() {
    for channels in [1u16, 2] {
        let config = EncoderConfig::new(64_000, 22050, channels);
        let mut enc = aac_encoder(&config, MockEncoderOptions::default());
        let pts = Rc::new(RefCell::new(Vec::new()));
        let sink = pts.clone();
        enc.install_packet_callback(move |p| sink.borrow_mut().push(p.pts));

        enc.encode(&sine(AAC_FRAME_SIZE * 2 + 10, channels as usize))
            .unwrap();
        assert_eq!(*pts.borrow(), vec![0, 1024, 2048]);
    }
}
