//! Splitter behaviour over synthetic elementary streams

use crate::framing::adts::{AacProfile, AdtsFramer, MAX_FRAME_LENGTH as ADTS_MAX};
use crate::framing::mpa::{self, MpaSplitter};
use crate::framing::{split_all, AdtsSplitter, FrameSplitter};

fn adts_stream(payloads: &[Vec<u8>]) -> Vec<u8> {
    let mut framer = AdtsFramer::new(AacProfile::Low, 44100, 2).unwrap();
    let mut stream = Vec::new();
    for payload in payloads {
        stream.extend_from_slice(framer.synthesize(7 + payload.len()).unwrap());
        stream.extend_from_slice(payload);
    }
    stream
}

fn adts_payloads() -> Vec<Vec<u8>> {
    // Includes an empty payload and one at the 13-bit limit
    let mut lengths = vec![0usize, 1, 6, 7, 100, 371, 1024, ADTS_MAX - 7];
    lengths.extend((0..20).map(|i| 50 + i * 37));
    lengths
        .into_iter()
        .enumerate()
        .map(|(i, len)| vec![(i as u8) & 0x7F; len])
        .collect()
}

/// Push `stream` in pieces of `step` bytes, draining after every push.
fn split_in_steps<S: FrameSplitter>(splitter: &mut S, stream: &[u8], step: usize) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for piece in stream.chunks(step) {
        splitter.push(piece);
        while let Some(frame) = splitter.next_frame() {
            out.push(frame.to_vec());
        }
    }
    out
}

#[test]
fn test_adts_back_to_back_any_granularity() {
    let payloads = adts_payloads();
    let stream = adts_stream(&payloads);

    for step in [1, 2, 3, 7, 64, 1000, stream.len()] {
        let mut splitter = AdtsSplitter::new();
        let recovered = split_in_steps(&mut splitter, &stream, step);
        assert_eq!(recovered, payloads, "push step {}", step);
        assert_eq!(splitter.buffered(), 0);
        assert_eq!(splitter.rejected_syncs(), 0);
    }
}

#[test]
fn test_adts_skips_leading_garbage() {
    let payloads = adts_payloads();
    let mut stream = vec![0x00, 0x42, 0x13, 0x37];
    stream.extend(adts_stream(&payloads));

    let mut splitter = AdtsSplitter::new();
    let recovered: Vec<Vec<u8>> = split_all(&mut splitter, &stream)
        .into_iter()
        .map(|b| b.to_vec())
        .collect();
    assert_eq!(recovered, payloads);
    assert_eq!(splitter.rejected_syncs(), 4);
}

fn mpa_frame(bitrate_index: u8, rate_index: u8, padding: bool) -> Vec<u8> {
    let b2 = (bitrate_index << 4) | (rate_index << 2) | ((padding as u8) << 1);
    let mut frame = vec![0xFF, 0xFB, b2, 0x00];
    let length = mpa::frame_length(
        mpa::BITRATES_KBPS[bitrate_index as usize] * 1000,
        mpa::SAMPLE_RATES[rate_index as usize],
        padding,
    );
    frame.resize(length, 0x00);
    frame
}

fn all_mpa_frames() -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    for bitrate_index in 1..=14u8 {
        for rate_index in 0..=2u8 {
            for padding in [false, true] {
                frames.push(mpa_frame(bitrate_index, rate_index, padding));
            }
        }
    }
    frames
}

#[test]
fn test_mpa_every_valid_header_round_trips() {
    let frames = all_mpa_frames();
    assert_eq!(frames.len(), 14 * 3 * 2);
    let stream = frames.concat();

    for step in [1, 4, 417, stream.len()] {
        let mut splitter = MpaSplitter::new();
        let recovered = split_in_steps(&mut splitter, &stream, step);
        assert_eq!(recovered, frames, "push step {}", step);
        assert_eq!(splitter.rejected_syncs(), 0);
        assert_eq!(splitter.buffered(), 0);
    }
}

#[test]
fn test_mpa_resyncs_after_any_single_byte_flip() {
    let frames: Vec<Vec<u8>> = (0..10).map(|_| mpa_frame(9, 0, false)).collect();
    let clean = frames.concat();
    let corrupt_start = 2 * frames[0].len();
    let corrupt_end = corrupt_start + frames[2].len();

    for pos in corrupt_start..corrupt_end {
        for mask in [0xFF, 0x01, 0x10, 0x80] {
            let mut stream = clean.clone();
            stream[pos] ^= mask;

            let mut splitter = MpaSplitter::new();
            let recovered: Vec<Vec<u8>> = split_all(&mut splitter, &stream)
                .into_iter()
                .map(|b| b.to_vec())
                .collect();

            // A damaged header may swallow at most 1441 bytes; frames past that
            // must come through untouched
            assert!(
                recovered.ends_with(&frames[6..]),
                "flip {:#04x} at {} lost sync",
                mask,
                pos
            );
            assert!(recovered.starts_with(&frames[..2]));
        }
    }
}

#[test]
fn test_mpa_ignores_trailing_partial_frame() {
    let frame = mpa_frame(9, 0, true);
    let mut stream = frame.clone();
    stream.extend_from_slice(&frame[..100]);

    let mut splitter = MpaSplitter::new();
    let recovered = split_all(&mut splitter, &stream);
    assert_eq!(recovered.len(), 1);
    assert_eq!(splitter.buffered(), 100);
}

#[test]
fn test_mpa_random_noise_never_panics() {
    // Small LCG so the input is reproducible
    let mut state: u32 = 0x1234_5678;
    let noise: Vec<u8> = (0..64 * 1024)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect();

    let mut splitter = MpaSplitter::new();
    for frame in split_all(&mut splitter, &noise) {
        assert!((mpa::MIN_FRAME_LENGTH..=mpa::MAX_FRAME_LENGTH).contains(&frame.len()));
    }
    assert!(splitter.buffered() < mpa::MAX_FRAME_LENGTH);
}
