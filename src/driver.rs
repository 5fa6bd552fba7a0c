//! File-to-file demo run
//!
//! Encodes one raw PCM file to an ADTS AAC stream and an MP3 stream, then
//! reads both streams back through their splitters and decoders and writes
//! the decoded PCM next to them.

use serde::Serialize;
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::rc::Rc;

use crate::config::{is_pcm_path, DecoderConfig, DriverConfig};
use crate::error::Result;
use crate::ffmpeg::{FfmpegAacDecoder, FfmpegAacEncoder, FfmpegMp3Decoder, FfmpegMp3Encoder};
use crate::framing::{AdtsSplitter, FrameSplitter, MpaSplitter};

/// Read size used when scanning the encoded streams back
const STREAM_READ_SIZE: usize = 4096;

/// Counters for one codec's round trip
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamReport {
    pub frames_encoded: u64,
    pub short_frames: u64,
    pub packets: u64,
    pub stream_bytes: u64,
    pub rejected_frames: u64,
    pub frames_split: u64,
    pub rejected_syncs: usize,
    pub rejected_packets: u64,
    pub decoded_samples: u64,
    pub decoded_bytes: u64,
}

/// Summary of a [`run`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriverReport {
    pub input_bytes: u64,
    pub chunks: u64,
    pub aac: StreamReport,
    pub mp3: StreamReport,
}

/// Run the full encode → split → decode cycle described by `config`.
pub fn run(config: &DriverConfig) -> Result<DriverReport> {
    config.validate()?;
    crate::ffmpeg::init()?;
    fs::create_dir_all(&config.output_dir)?;
    if !is_pcm_path(&config.pcm_path) {
        tracing::warn!(path = %config.pcm_path.display(), "input is read as raw f32le PCM");
    }

    let mut report = DriverReport::default();
    encode_file(config, &mut report)?;

    let decoder_config = DecoderConfig::new(config.aac.sample_rate, config.aac.channels);
    decode_aac(config, &decoder_config, &mut report.aac)?;
    decode_mp3(config, &decoder_config, &mut report.mp3)?;

    tracing::info!(
        input_bytes = report.input_bytes,
        aac_packets = report.aac.packets,
        mp3_packets = report.mp3.packets,
        "run complete"
    );
    Ok(report)
}

fn encode_file(config: &DriverConfig, report: &mut DriverReport) -> Result<()> {
    let mut aac = FfmpegAacEncoder::new(&config.aac)?;
    let mut mp3 = FfmpegMp3Encoder::new(&config.mp3)?;

    let aac_buf = Rc::new(RefCell::new(Vec::new()));
    let sink = aac_buf.clone();
    aac.install_callback(move |header, payload| {
        let mut buf = sink.borrow_mut();
        buf.extend_from_slice(header);
        buf.extend_from_slice(payload);
    });

    let mp3_buf = Rc::new(RefCell::new(Vec::new()));
    let sink = mp3_buf.clone();
    mp3.install_callback(move |frame| sink.borrow_mut().extend_from_slice(frame));

    let mut input = BufReader::new(File::open(&config.pcm_path)?);
    let mut aac_out = BufWriter::new(File::create(config.aac_output())?);
    let mut mp3_out = BufWriter::new(File::create(config.mp3_output())?);

    let sample_frame = config.aac.input_params()?.bytes_per_sample_frame();
    let mut aac_feed = FrameFeed::new(aac.pipeline().frame_size() * sample_frame);
    let mut mp3_feed = FrameFeed::new(mp3.pipeline().frame_size() * sample_frame);

    let mut chunk = vec![0u8; config.chunk_bytes()];
    loop {
        let n = read_full(&mut input, &mut chunk)?;
        if n == 0 {
            break;
        }
        report.input_bytes += n as u64;
        report.chunks += 1;

        aac_feed.push(&chunk[..n], |pcm| tolerate_rejection(aac.encode(pcm)))?;
        mp3_feed.push(&chunk[..n], |pcm| tolerate_rejection(mp3.encode(pcm)))?;
        report.aac.stream_bytes += drain_into(&aac_buf, &mut aac_out)?;
        report.mp3.stream_bytes += drain_into(&mp3_buf, &mut mp3_out)?;
    }

    // Only the end of input may produce a short frame
    aac_feed.flush(|pcm| tolerate_rejection(aac.encode(pcm)))?;
    mp3_feed.flush(|pcm| tolerate_rejection(mp3.encode(pcm)))?;
    aac.finish()?;
    mp3.finish()?;
    report.aac.stream_bytes += drain_into(&aac_buf, &mut aac_out)?;
    report.mp3.stream_bytes += drain_into(&mp3_buf, &mut mp3_out)?;
    aac_out.flush()?;
    mp3_out.flush()?;

    for (stream, stats) in [
        (&mut report.aac, aac.pipeline().stats()),
        (&mut report.mp3, mp3.pipeline().stats()),
    ] {
        stream.frames_encoded = stats.frames;
        stream.short_frames = stats.short_frames;
        stream.packets = stats.packets;
        stream.rejected_frames = stats.rejected;
    }
    tracing::info!(
        chunks = report.chunks,
        aac_bytes = report.aac.stream_bytes,
        mp3_bytes = report.mp3.stream_bytes,
        "encoding finished"
    );
    Ok(())
}

fn decode_aac(config: &DriverConfig, decoder_config: &DecoderConfig, report: &mut StreamReport) -> Result<()> {
    let mut decoder = FfmpegAacDecoder::new(decoder_config)?;
    let pcm = Rc::new(RefCell::new(Vec::new()));
    let sink = pcm.clone();
    decoder.install_callback(move |data| sink.borrow_mut().extend_from_slice(data));

    let mut splitter = AdtsSplitter::new();
    let out = config.decoded_output("aac");
    let written = decode_stream(&config.aac_output(), &out, &mut splitter, &pcm, report, |frame| {
        decoder.decode(frame)
    })?;
    decoder.finish()?;
    report.decoded_bytes = written + append_pcm(&out, &pcm)?;
    report.decoded_samples = decoder.pipeline().stats().samples;
    Ok(())
}

fn decode_mp3(config: &DriverConfig, decoder_config: &DecoderConfig, report: &mut StreamReport) -> Result<()> {
    let mut decoder = FfmpegMp3Decoder::new(decoder_config)?;
    let pcm = Rc::new(RefCell::new(Vec::new()));
    let sink = pcm.clone();
    decoder.install_callback(move |data| sink.borrow_mut().extend_from_slice(data));

    let mut splitter = MpaSplitter::new();
    let out = config.decoded_output("mp3");
    let written = decode_stream(&config.mp3_output(), &out, &mut splitter, &pcm, report, |frame| {
        decoder.decode(frame)
    })?;
    decoder.finish()?;
    report.decoded_bytes = written + append_pcm(&out, &pcm)?;
    report.decoded_samples = decoder.pipeline().stats().samples;
    Ok(())
}

/// Scan `input` with `splitter`, decode every frame and write the PCM
/// collected in `pcm` to `output`. Returns the PCM bytes written.
fn decode_stream<S, F>(
    input: &Path,
    output: &Path,
    splitter: &mut S,
    pcm: &RefCell<Vec<u8>>,
    report: &mut StreamReport,
    mut decode: F,
) -> Result<u64>
where
    S: FrameSplitter,
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    let mut block = vec![0u8; STREAM_READ_SIZE];
    let mut written = 0;

    loop {
        let n = reader.read(&mut block)?;
        if n == 0 {
            break;
        }
        splitter.push(&block[..n]);
        while let Some(frame) = splitter.next_frame() {
            report.frames_split += 1;
            if let Err(e) = decode(&frame[..]) {
                if !e.is_rejection() {
                    return Err(e);
                }
                report.rejected_packets += 1;
            }
        }
        written += drain_into(pcm, &mut writer)?;
    }
    writer.flush()?;

    if splitter.buffered() > 0 {
        tracing::warn!(
            path = %input.display(),
            bytes = splitter.buffered(),
            "stream ends inside a frame"
        );
    }
    report.rejected_syncs = splitter.rejected_syncs();
    Ok(written)
}

/// Holds back the tail of each input chunk so an encoder only ever sees
/// whole native frames until the input ends.
struct FrameFeed {
    pending: Vec<u8>,
    frame_bytes: usize,
}

impl FrameFeed {
    fn new(frame_bytes: usize) -> Self {
        Self {
            pending: Vec::with_capacity(frame_bytes * 2),
            frame_bytes,
        }
    }

    /// Append `chunk` and pass on every whole frame buffered so far.
    fn push<F>(&mut self, chunk: &[u8], mut encode: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        self.pending.extend_from_slice(chunk);
        let whole = self.pending.len() - self.pending.len() % self.frame_bytes;
        if whole == 0 {
            return Ok(());
        }
        let result = encode(&self.pending[..whole]);
        self.pending.drain(..whole);
        result
    }

    /// Pass on whatever is left, at most one short frame.
    fn flush<F>(&mut self, mut encode: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        if self.pending.is_empty() {
            return Ok(());
        }
        let result = encode(&self.pending);
        self.pending.clear();
        result
    }
}

/// Rejected frames are counted by the pipeline; only hard errors stop the run.
fn tolerate_rejection(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_rejection() => Ok(()),
        other => other,
    }
}

/// Move everything the callbacks collected into `out`.
fn drain_into<W: Write>(buf: &RefCell<Vec<u8>>, out: &mut W) -> Result<u64> {
    let mut buf = buf.borrow_mut();
    out.write_all(&buf)?;
    let n = buf.len() as u64;
    buf.clear();
    Ok(n)
}

fn append_pcm(path: &Path, pcm: &RefCell<Vec<u8>>) -> Result<u64> {
    let mut file = fs::OpenOptions::new().append(true).open(path)?;
    let n = drain_into(pcm, &mut file)?;
    file.flush()?;
    Ok(n)
}

/// Fill `buf` as far as the reader allows; a short count means end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
