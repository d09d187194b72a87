// Builds small, hand-verifiable native FLAC streams in memory so the
// integration tests can check decoder behaviour without shipping binary
// fixtures or shelling out to a reference encoder/decoder.
//
// Every subframe this module emits is VERBATIM, so the expected sample
// values are exactly the input and no prediction or residual coding needs
// to be reproduced here to compute them. Frame and header checksums are
// computed for real with `flacon::crc`, so a stream built here also
// exercises `ChecksumPolicy::Validate`.

use flacon::crc::{Crc16, Crc8};

pub struct BitWriter {
    bytes: Vec<u8>,
    cur: u8,
    nbits: u8,
}

impl BitWriter {
    pub fn new() -> BitWriter {
        BitWriter { bytes: Vec::new(), cur: 0, nbits: 0 }
    }

    pub fn push_bits(&mut self, value: u64, n: u32) {
        for i in (0..n).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.cur |= bit << (7 - self.nbits);
            self.nbits += 1;
            if self.nbits == 8 {
                self.bytes.push(self.cur);
                self.cur = 0;
                self.nbits = 0;
            }
        }
    }

    pub fn align(&mut self) {
        if self.nbits > 0 {
            self.bytes.push(self.cur);
            self.cur = 0;
            self.nbits = 0;
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.align();
        self.bytes
    }
}

fn push_block_header(w: &mut BitWriter, is_last: bool, block_type: u8, length: u32) {
    w.push_bits(is_last as u64, 1);
    w.push_bits(block_type as u64, 7);
    w.push_bits(length as u64, 24);
}

fn push_streaminfo(w: &mut BitWriter, min_bs: u16, max_bs: u16, sample_rate: u32, channels: u8, bits_per_sample: u8, total_samples: u64) {
    w.push_bits(min_bs as u64, 16);
    w.push_bits(max_bs as u64, 16);
    w.push_bits(0, 24); // min frame size unknown
    w.push_bits(0, 24); // max frame size unknown
    w.push_bits(sample_rate as u64, 20);
    w.push_bits((channels - 1) as u64, 3);
    w.push_bits((bits_per_sample - 1) as u64, 5);
    w.push_bits(total_samples, 36);
    for _ in 0..16 {
        w.push_bits(0, 8); // md5sum, left zero
    }
}

fn sample_rate_code(rate: u32) -> u64 {
    match rate {
        44_100 => 0b1001,
        48_000 => 0b1010,
        96_000 => 0b1011,
        _ => panic!("fixture builder only knows a few fixed-table sample rates"),
    }
}

fn bps_code(bits: u8) -> u64 {
    match bits {
        8 => 0b001,
        16 => 0b100,
        24 => 0b110,
        _ => panic!("fixture builder only knows a few fixed-table bit depths"),
    }
}

/// One PCM frame's worth of VERBATIM-encoded audio: `channels[ch][i]`.
pub struct FrameData {
    pub channels: Vec<Vec<i64>>,
}

/// Builds one native FLAC frame, fixed blocking strategy, using an
/// 8-bit extended block-size code (so block sizes up to 256 work without a
/// lookup table) and independent channel coding throughout.
fn build_frame(frame_number: u32, sample_rate: u32, bits_per_sample: u8, frame: &FrameData) -> Vec<u8> {
    assert!(frame_number < 128, "fixture builder only emits single-byte frame numbers");
    let block_size = frame.channels[0].len();
    assert!((1..=256).contains(&block_size), "fixture builder only emits 8-bit extended block sizes");
    let channel_count = frame.channels.len() as u8;
    assert!(channel_count >= 1 && channel_count <= 8);

    let mut w = BitWriter::new();
    w.push_bits(0b11_1111_1111_1110, 14); // sync code
    w.push_bits(0, 1); // reserved
    w.push_bits(0, 1); // fixed blocking strategy
    w.push_bits(0b0110, 4); // block size code: read an 8-bit extension
    w.push_bits(sample_rate_code(sample_rate), 4);
    w.push_bits((channel_count - 1) as u64, 4); // independent, n channels
    w.push_bits(bps_code(bits_per_sample), 3);
    w.push_bits(0, 1); // reserved
    w.push_bits(frame_number as u64, 8); // frame number, single-byte UTF-8-style
    w.push_bits((block_size - 1) as u64, 8); // extended block size byte

    let mut crc8 = Crc8::new();
    crc8.update_slice(w.bytes());
    w.push_bits(crc8.finish() as u64, 8);

    let mask = if bits_per_sample == 32 { u64::MAX } else { (1u64 << bits_per_sample) - 1 };
    for ch in frame.channels.iter() {
        assert_eq!(ch.len(), block_size);
        w.push_bits(0x02, 8); // subframe header: pad 0, type VERBATIM, no wasted bits
        for &s in ch {
            w.push_bits((s as u64) & mask, bits_per_sample as u32);
        }
    }
    w.align();

    let mut crc16 = Crc16::new();
    crc16.update_slice(w.bytes());
    w.push_bits(crc16.finish() as u64, 16);

    w.into_bytes()
}

/// A complete synthetic native FLAC stream, plus everything an integration
/// test needs to check the decoder's output against what went in.
pub struct StreamFixture {
    pub bytes: Vec<u8>,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub sample_rate: u32,
    /// Samples interleaved by PCM frame, exactly as `FlacReader::read_*`
    /// should produce them.
    pub expected: Vec<i64>,
    /// Byte offset of each frame, relative to the first frame's header.
    pub frame_offsets: Vec<u64>,
    /// First sample number of each frame.
    pub frame_first_samples: Vec<u64>,
    pub frame_sizes: Vec<u16>,
}

/// Assembles a `fLaC` stream (STREAMINFO, optionally a SEEKTABLE, then the
/// given frames back to back) and records everything needed to check a
/// decode or a seek against it.
pub fn build_stream(channels: u8, bits_per_sample: u8, sample_rate: u32, frames: &[FrameData], with_seektable: bool) -> StreamFixture {
    let frame_sizes: Vec<u16> = frames.iter().map(|f| f.channels[0].len() as u16).collect();
    let min_bs = *frame_sizes.iter().min().unwrap();
    let max_bs = *frame_sizes.iter().max().unwrap();
    assert!(min_bs >= 16, "a STREAMINFO/frame header rejects block sizes below 16");
    let total_samples: u64 = frame_sizes.iter().map(|&b| b as u64).sum();

    let mut frame_bytes = Vec::with_capacity(frames.len());
    let mut frame_offsets = Vec::with_capacity(frames.len());
    let mut frame_first_samples = Vec::with_capacity(frames.len());
    let mut offset = 0u64;
    let mut first_sample = 0u64;
    for (i, frame) in frames.iter().enumerate() {
        let bytes = build_frame(i as u32, sample_rate, bits_per_sample, frame);
        frame_offsets.push(offset);
        frame_first_samples.push(first_sample);
        offset += bytes.len() as u64;
        first_sample += frame.channels[0].len() as u64;
        frame_bytes.push(bytes);
    }

    let mut expected = Vec::new();
    for frame in frames {
        let block_size = frame.channels[0].len();
        for i in 0..block_size {
            for ch in frame.channels.iter() {
                expected.push(ch[i]);
            }
        }
    }

    let mut meta = BitWriter::new();
    push_block_header(&mut meta, !with_seektable, 0, 34);
    push_streaminfo(&mut meta, min_bs, max_bs, sample_rate, channels, bits_per_sample, total_samples);

    if with_seektable {
        let point_count = frame_offsets.len() as u32;
        push_block_header(&mut meta, true, 3, point_count * 18);
        for i in 0..frame_offsets.len() {
            meta.push_bits(frame_first_samples[i], 64);
            meta.push_bits(frame_offsets[i], 64);
            meta.push_bits(frame_sizes[i] as u64, 16);
        }
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"fLaC");
    bytes.extend_from_slice(&meta.into_bytes());
    for f in frame_bytes {
        bytes.extend_from_slice(&f);
    }

    StreamFixture {
        bytes,
        channels,
        bits_per_sample,
        sample_rate,
        expected,
        frame_offsets,
        frame_first_samples,
        frame_sizes,
    }
}

/// A ramp of `count` values per channel, channel `ch` offset by `ch * 17`
/// so that channels are never accidentally interchangeable in a test.
pub fn ramp_frame(channels: u8, count: usize, bits_per_sample: u8, start: i64) -> FrameData {
    let max = (1i64 << (bits_per_sample - 1)) - 1;
    let min = -(1i64 << (bits_per_sample - 1));
    let span = max - min + 1;
    let mut chans = Vec::with_capacity(channels as usize);
    for ch in 0..channels as i64 {
        let mut v = Vec::with_capacity(count);
        for i in 0..count as i64 {
            let raw = start + i + ch * 17;
            let wrapped = ((raw - min).rem_euclid(span)) + min;
            v.push(wrapped);
        }
        chans.push(v);
    }
    FrameData { channels: chans }
}

/// A `Read` adapter that returns at most one byte per call, to exercise the
/// bit reader's L2 refill path under the most adversarial chunking a byte
/// source can offer.
pub struct OneByteAtATime<R> {
    inner: R,
}

impl<R> OneByteAtATime<R> {
    pub fn new(inner: R) -> OneByteAtATime<R> {
        OneByteAtATime { inner }
    }
}

impl<R: std::io::Read> std::io::Read for OneByteAtATime<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.inner.read(&mut buf[..1])
    }
}
