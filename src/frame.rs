// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Frames: the self-delimiting units audio is actually coded in.
//!
//! A frame carries one block of samples for every channel, preceded by a
//! header that repeats the stream's sample rate and bit depth (so a frame
//! can in principle be decoded without the STREAMINFO block, though this
//! decoder always reads STREAMINFO first) and followed by a CRC-16 over the
//! whole frame.

use log::warn;
use std::io::Read;

use crate::bitstream::BitReader;
use crate::channels;
use crate::crc::Crc8;
use crate::error::{Error, Result};
use crate::subframe;
use crate::ChecksumPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockingStrategy {
    Fixed,
    Variable,
}

/// Whether a frame header carries a frame number or a sample number,
/// depending on [`BlockingStrategy`].
#[derive(Clone, Copy, Debug)]
pub enum BlockTime {
    FrameNumber(u32),
    SampleNumber(u64),
}

/// How the two channels of a stereo frame are coded.
///
/// Decorrelated pairs always code one "side" channel with one extra bit of
/// precision over the nominal bit depth, recovered during recomposition in
/// [`crate::channels`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelAssignment {
    /// `n` channels, coded independently (no stereo decorrelation).
    Independent(u8),
    /// Channel 0 is left, channel 1 is (left - right).
    LeftSide,
    /// Channel 0 is (left - right), channel 1 is right.
    RightSide,
    /// Channel 0 is ((left + right) >> 1 with a parity fixup), channel 1 is (left - right).
    MidSide,
}

impl ChannelAssignment {
    pub fn channels(&self) -> u8 {
        match *self {
            ChannelAssignment::Independent(n) => n,
            ChannelAssignment::LeftSide | ChannelAssignment::RightSide | ChannelAssignment::MidSide => 2,
        }
    }
}

/// A parsed frame header.
#[derive(Clone, Copy, Debug)]
pub struct FrameHeader {
    pub block_time: BlockTime,
    pub block_size: u32,
    pub sample_rate: Option<u32>,
    pub channel_assignment: ChannelAssignment,
    pub bits_per_sample: Option<u32>,
}

impl FrameHeader {
    pub fn channels(&self) -> u8 {
        self.channel_assignment.channels()
    }
}

/// Reads a byte through the bit reader (which must be byte-aligned) and
/// folds it into a running CRC-8.
fn read_u8_crc<R: Read>(reader: &mut BitReader<R>, crc: &mut Crc8) -> Result<u8> {
    let byte = reader.read_uint(8)? as u8;
    crc.update(byte);
    Ok(byte)
}

fn read_u16_crc<R: Read>(reader: &mut BitReader<R>, crc: &mut Crc8) -> Result<u16> {
    let hi = read_u8_crc(reader, crc)?;
    let lo = read_u8_crc(reader, crc)?;
    Ok(((hi as u16) << 8) | lo as u16)
}

/// Decodes the FLAC "UTF-8-style" variable-length integer while folding
/// every consumed byte into `crc`. See [`BitReader::read_utf8_number`] for
/// the checksum-free version used elsewhere.
fn read_var_length_int_crc<R: Read>(reader: &mut BitReader<R>, crc: &mut Crc8) -> Result<u64> {
    let first = read_u8_crc(reader, crc)?;
    let mut extra_bytes = 0u32;
    let mut mask_data = 0b0111_1111u8;
    let mut mask_mark = 0b1000_0000u8;

    while first & mask_mark != 0 {
        extra_bytes += 1;
        mask_data >>= 1;
        mask_mark >>= 1;
    }

    if extra_bytes == 1 {
        return Err(Error::BadSyncCode("invalid variable-length integer"));
    }
    if extra_bytes > 1 {
        extra_bytes -= 1;
    }

    let mut result = ((first & mask_data) as u64) << (6 * extra_bytes);
    for i in (0..extra_bytes).rev() {
        let byte = read_u8_crc(reader, crc)?;
        if byte & 0b1100_0000 != 0b1000_0000 {
            return Err(Error::BadSyncCode("invalid variable-length integer continuation byte"));
        }
        result |= ((byte & 0b0011_1111) as u64) << (6 * i);
    }

    Ok(result)
}

/// Parses a frame header, validating its CRC-8 per `policy`.
pub fn read_frame_header<R: Read>(
    reader: &mut BitReader<R>,
    policy: ChecksumPolicy,
) -> Result<FrameHeader> {
    debug_assert!(reader.is_byte_aligned());
    let mut crc = Crc8::new();

    let sync_res_block = read_u16_crc(reader, &mut crc)?;

    let sync_code = sync_res_block & 0b1111_1111_1111_1100;
    if sync_code != 0b1111_1111_1111_1000 {
        return Err(Error::BadSyncCode("frame sync code missing"));
    }
    if sync_res_block & 0b0000_0000_0000_0010 != 0 {
        return Err(Error::BadSubframeHeader("reserved frame header bit is set"));
    }
    let blocking_strategy = if sync_res_block & 1 == 0 {
        BlockingStrategy::Fixed
    } else {
        BlockingStrategy::Variable
    };

    let bs_sr = read_u8_crc(reader, &mut crc)?;
    let mut block_size = 0u32;
    let mut read_8bit_bs = false;
    let mut read_16bit_bs = false;

    match bs_sr >> 4 {
        0b0000 => return Err(Error::BadSubframeHeader("reserved block size code")),
        0b0001 => block_size = 192,
        n if (0b0010..=0b0101).contains(&n) => block_size = 576 * (1 << (n - 2)),
        0b0110 => read_8bit_bs = true,
        0b0111 => read_16bit_bs = true,
        n => block_size = 256 * (1 << (n - 8)),
    }

    let mut sample_rate = None;
    let mut read_8bit_sr = false;
    let mut read_16bit_sr = false;
    let mut read_16bit_sr_ten = false;

    match bs_sr & 0b0000_1111 {
        0b0000 => sample_rate = None,
        0b0001 => sample_rate = Some(88_200),
        0b0010 => sample_rate = Some(176_400),
        0b0011 => sample_rate = Some(192_000),
        0b0100 => sample_rate = Some(8_000),
        0b0101 => sample_rate = Some(16_000),
        0b0110 => sample_rate = Some(22_050),
        0b0111 => sample_rate = Some(24_000),
        0b1000 => sample_rate = Some(32_000),
        0b1001 => sample_rate = Some(44_100),
        0b1010 => sample_rate = Some(48_000),
        0b1011 => sample_rate = Some(96_000),
        0b1100 => read_8bit_sr = true,
        0b1101 => read_16bit_sr = true,
        0b1110 => read_16bit_sr_ten = true,
        // 0b1111 is invalid to avoid fooling sync-code scans.
        _ => return Err(Error::BadSubframeHeader("invalid sample rate code")),
    }

    let chan_bps_res = read_u8_crc(reader, &mut crc)?;

    let channel_assignment = match chan_bps_res >> 4 {
        n if n < 8 => ChannelAssignment::Independent(n + 1),
        0b1000 => ChannelAssignment::LeftSide,
        0b1001 => ChannelAssignment::RightSide,
        0b1010 => ChannelAssignment::MidSide,
        _ => return Err(Error::BadSubframeHeader("reserved channel assignment")),
    };

    let bits_per_sample = match (chan_bps_res & 0b0000_1110) >> 1 {
        0b000 => None,
        0b001 => Some(8),
        0b010 => Some(12),
        0b100 => Some(16),
        0b101 => Some(20),
        0b110 => Some(24),
        _ => return Err(Error::BadSubframeHeader("reserved bits-per-sample code")),
    };

    if chan_bps_res & 1 != 0 {
        return Err(Error::BadSubframeHeader("reserved frame header bit is set"));
    }

    let block_time = match blocking_strategy {
        BlockingStrategy::Variable => {
            let sample = read_var_length_int_crc(reader, &mut crc)?;
            BlockTime::SampleNumber(sample)
        }
        BlockingStrategy::Fixed => {
            let frame = read_var_length_int_crc(reader, &mut crc)?;
            if frame > 0x7fff_ffff {
                return Err(Error::BadSubframeHeader("frame number exceeds 31 bits"));
            }
            BlockTime::FrameNumber(frame as u32)
        }
    };

    if read_8bit_bs {
        block_size = read_u8_crc(reader, &mut crc)? as u32 + 1;
    }
    if read_16bit_bs {
        let bs = read_u16_crc(reader, &mut crc)?;
        if bs == 0xffff {
            return Err(Error::BadSubframeHeader("block size exceeds 65535"));
        }
        block_size = bs as u32 + 1;
    }
    if block_size < 16 {
        return Err(Error::BadSubframeHeader("block size below the 16-sample minimum"));
    }

    if read_8bit_sr {
        sample_rate = Some(read_u8_crc(reader, &mut crc)? as u32 * 1000);
    }
    if read_16bit_sr {
        sample_rate = Some(read_u16_crc(reader, &mut crc)? as u32);
    }
    if read_16bit_sr_ten {
        sample_rate = Some(read_u16_crc(reader, &mut crc)? as u32 * 10);
    }
    if (read_8bit_sr || read_16bit_sr || read_16bit_sr_ten) && sample_rate == Some(0) {
        return Err(Error::BadSubframeHeader("inline sample rate is zero"));
    }

    let computed = crc.finish();
    let presumed = reader.read_uint(8)? as u8;
    if computed != presumed {
        match policy {
            ChecksumPolicy::Validate => {
                return Err(Error::BadSyncCode("frame header CRC mismatch"));
            }
            ChecksumPolicy::Ignore => {
                warn!("frame header CRC mismatch (computed {:#04x}, stored {:#04x})", computed, presumed);
            }
        }
    }

    Ok(FrameHeader { block_time, block_size, sample_rate, channel_assignment, bits_per_sample })
}

/// A decoded block of audio: one slab of `block_size * channels` samples,
/// channels stored consecutively (channel 0 in full, then channel 1, ...).
pub struct Block<'b> {
    first_sample_number: u64,
    block_size: u32,
    channels: u8,
    samples: &'b [i64],
}

impl<'b> Block<'b> {
    fn new(time: u64, block_size: u32, channels: u8, samples: &'b [i64]) -> Block<'b> {
        Block { first_sample_number: time, block_size, channels, samples }
    }

    /// Sample number of the first sample in this block.
    pub fn time(&self) -> u64 {
        self.first_sample_number
    }

    /// Number of inter-channel samples in the block.
    pub fn len(&self) -> u32 {
        self.block_size
    }

    pub fn is_empty(&self) -> bool {
        self.block_size == 0
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Returns the (zero-based) `ch`-th channel as a slice of full-precision
    /// samples. Use [`crate::output`] to convert to an output format.
    pub fn channel(&self, ch: u8) -> &[i64] {
        let bs = self.block_size as usize;
        &self.samples[ch as usize * bs..(ch as usize + 1) * bs]
    }
}

/// Reads frames from a bit reader and exposes decoded blocks.
///
/// The reader is assumed to be positioned at a frame header; this type does
/// not itself search for a sync code after losing alignment (that is what
/// the seek engine's brute-force scan is for).
pub struct FrameReader {
    buffer: Vec<i64>,
    sample_rate_hint: u32,
    bits_per_sample_hint: u32,
    checksum_policy: ChecksumPolicy,
}

impl FrameReader {
    pub fn new(sample_rate_hint: u32, bits_per_sample_hint: u32, checksum_policy: ChecksumPolicy) -> FrameReader {
        FrameReader { buffer: Vec::new(), sample_rate_hint, bits_per_sample_hint, checksum_policy }
    }

    fn ensure_buffer_len(&mut self, len: usize) {
        if self.buffer.len() < len {
            self.buffer.resize(len, 0);
        }
    }

    /// Decodes the next frame, returning the block of samples it contains.
    pub fn read_next<'s, R: Read>(&'s mut self, input: &mut BitReader<R>) -> Result<Block<'s>> {
        input.start_crc16();
        let header = read_frame_header(input, self.checksum_policy)?;
        let bps = header.bits_per_sample.unwrap_or(self.bits_per_sample_hint);
        let _sample_rate = header.sample_rate.unwrap_or(self.sample_rate_hint);

        let bs = header.block_size as usize;
        let channels = header.channels();
        let total = bs * channels as usize;
        self.ensure_buffer_len(total);

        match header.channel_assignment {
            ChannelAssignment::Independent(n) => {
                for ch in 0..n as usize {
                    subframe::decode(input, bps, &mut self.buffer[ch * bs..(ch + 1) * bs])?;
                }
            }
            ChannelAssignment::LeftSide => {
                subframe::decode(input, bps, &mut self.buffer[..bs])?;
                subframe::decode(input, bps + 1, &mut self.buffer[bs..bs * 2])?;
                channels::decode_left_side(&mut self.buffer[..bs * 2]);
            }
            ChannelAssignment::RightSide => {
                subframe::decode(input, bps + 1, &mut self.buffer[..bs])?;
                subframe::decode(input, bps, &mut self.buffer[bs..bs * 2])?;
                channels::decode_right_side(&mut self.buffer[..bs * 2]);
            }
            ChannelAssignment::MidSide => {
                subframe::decode(input, bps, &mut self.buffer[..bs])?;
                subframe::decode(input, bps + 1, &mut self.buffer[bs..bs * 2])?;
                channels::decode_mid_side(&mut self.buffer[..bs * 2]);
            }
        }

        input.align_to_byte();
        let computed_crc = input.take_crc16();
        let stored_crc = input.read_uint(16)? as u16;

        if computed_crc != stored_crc {
            match self.checksum_policy {
                ChecksumPolicy::Validate => {
                    return Err(Error::BadSyncCode("frame footer CRC-16 mismatch"));
                }
                ChecksumPolicy::Ignore => {
                    warn!("frame footer CRC-16 mismatch (computed {:#06x}, stored {:#06x})", computed_crc, stored_crc);
                }
            }
        }

        let time = match header.block_time {
            BlockTime::FrameNumber(fnr) => header.block_size as u64 * fnr as u64,
            BlockTime::SampleNumber(snr) => snr,
        };

        Ok(Block::new(time, header.block_size, channels, &self.buffer[..total]))
    }
}
