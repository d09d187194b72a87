// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Metadata that precedes the audio frames: `STREAMINFO`, the seek table,
//! and a location-only index of every other block so embedders and the
//! seek engine can find them without holding their payload in memory.

use std::io::Read;

use log::trace;

use crate::bitstream::BitReader;
use crate::error::{Error, Result};

/// The type tag of a metadata block, as it appears on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    Reserved(u8),
}

impl BlockType {
    fn from_tag(tag: u8) -> Result<BlockType> {
        match tag {
            0 => Ok(BlockType::StreamInfo),
            1 => Ok(BlockType::Padding),
            2 => Ok(BlockType::Application),
            3 => Ok(BlockType::SeekTable),
            4 => Ok(BlockType::VorbisComment),
            5 => Ok(BlockType::CueSheet),
            6 => Ok(BlockType::Picture),
            127 => Err(Error::BadMetadata("block type 127 is reserved to avoid clashing with a frame sync code")),
            other => Ok(BlockType::Reserved(other)),
        }
    }
}

/// The `STREAMINFO` block: the one block every valid FLAC stream has, and
/// the only one the decoder depends on to produce samples.
#[derive(Clone, Copy, Debug)]
pub struct StreamInfo {
    /// The minimum block size (in inter-channel samples) used in the stream.
    pub min_block_size: u16,
    /// The maximum block size (in inter-channel samples) used in the stream.
    pub max_block_size: u16,
    /// The minimum frame size in bytes, if known.
    pub min_frame_size: Option<u32>,
    /// The maximum frame size in bytes, if known.
    pub max_frame_size: Option<u32>,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The number of channels, 1 through 8.
    pub channels: u32,
    /// The number of bits per sample, 4 through 32.
    pub bits_per_sample: u32,
    /// The total number of inter-channel samples in the stream, if known.
    ///
    /// Streams written by an encoder that does not know the length up
    /// front (a live encode, for instance) leave this as `None`.
    pub samples: Option<u64>,
    /// The MD5 signature of the unencoded audio data, all zero if absent.
    pub md5sum: [u8; 16],
}

impl StreamInfo {
    /// The block size to use before the first frame header has been read.
    pub fn max_block_size_samples(&self) -> usize {
        self.max_block_size as usize
    }
}

fn read_streaminfo<R: Read>(reader: &mut BitReader<R>) -> Result<StreamInfo> {
    let min_block_size = reader.read_uint(16)? as u16;
    let max_block_size = reader.read_uint(16)? as u16;
    let min_frame_size = reader.read_uint(24)?;
    let max_frame_size = reader.read_uint(24)?;
    let sample_rate = reader.read_uint(20)?;
    let channels = reader.read_uint(3)? + 1;
    let bits_per_sample = reader.read_uint(5)? + 1;
    let samples = reader.read_uint64(36)?;

    let mut md5sum = [0u8; 16];
    for byte in md5sum.iter_mut() {
        *byte = reader.read_uint(8)? as u8;
    }

    if min_block_size > max_block_size {
        return Err(Error::BadMetadata("minimum block size exceeds maximum block size"));
    }
    if min_block_size < 16 {
        return Err(Error::BadMetadata("block size below the 16-sample minimum"));
    }
    if max_frame_size != 0 && min_frame_size > max_frame_size {
        return Err(Error::BadMetadata("minimum frame size exceeds maximum frame size"));
    }
    // The sample rate field is 20 bits wide, but the frame header can only
    // represent rates up to 655350 Hz through its sample rate code table.
    if sample_rate == 0 || sample_rate > 655_350 {
        return Err(Error::BadMetadata("sample rate is zero or exceeds the frame header's range"));
    }

    Ok(StreamInfo {
        min_block_size,
        max_block_size,
        min_frame_size: if min_frame_size == 0 { None } else { Some(min_frame_size) },
        max_frame_size: if max_frame_size == 0 { None } else { Some(max_frame_size) },
        sample_rate,
        channels,
        bits_per_sample,
        samples: if samples == 0 { None } else { Some(samples) },
        md5sum,
    })
}

/// One entry of a `SEEKTABLE` metadata block.
#[derive(Clone, Copy, Debug)]
pub struct SeekPoint {
    /// Sample number of the first sample in the target frame, or
    /// `0xffff_ffff_ffff_ffff` for a placeholder point that encoders pad
    /// the table with and the seek engine must skip.
    pub sample: u64,
    /// Byte offset from the first byte of the first frame header to the
    /// first byte of the target frame's header.
    pub offset: u64,
    /// Number of samples in the target frame.
    pub frame_samples: u16,
}

impl SeekPoint {
    const PLACEHOLDER_SAMPLE: u64 = 0xffff_ffff_ffff_ffff;

    pub fn is_placeholder(&self) -> bool {
        self.sample == SeekPoint::PLACEHOLDER_SAMPLE
    }
}

/// A parsed `SEEKTABLE` block: seek points sorted by ascending sample number,
/// with placeholder points filtered out.
#[derive(Clone, Debug, Default)]
pub struct SeekTable {
    points: Vec<SeekPoint>,
}

impl SeekTable {
    fn from_raw(mut points: Vec<SeekPoint>) -> SeekTable {
        points.retain(|p| !p.is_placeholder());
        points.sort_by_key(|p| p.sample);
        SeekTable { points }
    }

    /// All non-placeholder seek points, in ascending sample order.
    pub fn points(&self) -> &[SeekPoint] {
        &self.points
    }

    /// The seek point with the greatest sample number not exceeding
    /// `target_sample`, if any precede it.
    pub fn floor(&self, target_sample: u64) -> Option<&SeekPoint> {
        match self.points.binary_search_by_key(&target_sample, |p| p.sample) {
            Ok(index) => Some(&self.points[index]),
            Err(0) => None,
            Err(index) => Some(&self.points[index - 1]),
        }
    }
}

fn read_seektable<R: Read>(reader: &mut BitReader<R>, length: u32) -> Result<SeekTable> {
    if length % 18 != 0 {
        return Err(Error::BadMetadata("seek table length is not a multiple of 18 bytes"));
    }
    let count = length / 18;
    let mut points = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let sample = reader.read_uint64(64)?;
        let offset = reader.read_uint64(64)?;
        let frame_samples = reader.read_uint(16)? as u16;
        points.push(SeekPoint { sample, offset, frame_samples });
    }
    Ok(SeekTable::from_raw(points))
}

/// Location and type of a metadata block, recorded without decoding its
/// payload.
///
/// This is all the seek engine and a tag-listing embedder need: where a
/// block lives and how large it is. Blocks whose payload the decoder never
/// interprets on its own -- application data, Vorbis comments, pictures,
/// cue sheets -- are only ever exposed this way; see
/// [`crate::error::Error`] for why the decoder does not parse their
/// contents (semantic tag lookup is outside its scope).
#[derive(Clone, Copy, Debug)]
pub struct MetadataBlockDescriptor {
    pub block_type: BlockType,
    /// Byte offset of the block's payload (after its 4-byte header).
    pub offset: u64,
    /// Length of the payload in bytes.
    pub size: u32,
}

/// Everything read from the metadata section ahead of the first frame.
pub struct MetadataSummary {
    pub streaminfo: StreamInfo,
    pub blocks: Vec<MetadataBlockDescriptor>,
    pub seektable: Option<SeekTable>,
    /// Absolute byte offset of the first audio frame.
    pub first_frame_offset: u64,
}

struct BlockHeader {
    is_last: bool,
    block_type: BlockType,
    length: u32,
}

fn read_block_header<R: Read>(reader: &mut BitReader<R>) -> Result<BlockHeader> {
    let is_last = reader.read_uint(1)? == 1;
    let tag = reader.read_uint(7)? as u8;
    let length = reader.read_uint(24)?;
    Ok(BlockHeader { is_last, block_type: BlockType::from_tag(tag)?, length })
}

/// Reads every metadata block up to and including the last one, returning
/// the STREAMINFO, a location index of all blocks, and the eagerly-decoded
/// seek table (if the stream carries one).
///
/// The caller is expected to have already consumed the 4-byte `fLaC`
/// marker (or, for Ogg FLAC, to be positioned at the first packet's payload
/// after its own one-byte header); this only reads block headers onward.
pub fn read_metadata<R: Read>(reader: &mut BitReader<R>) -> Result<MetadataSummary> {
    debug_assert!(reader.is_byte_aligned());

    let header = read_block_header(reader)?;
    if header.block_type != BlockType::StreamInfo {
        return Err(Error::BadMetadata("the first metadata block must be STREAMINFO"));
    }
    if header.length != 34 {
        return Err(Error::BadMetadata("STREAMINFO block has the wrong length"));
    }
    let streaminfo = read_streaminfo(reader)?;
    trace!("streaminfo: {} Hz, {} channel(s), {} bit(s)", streaminfo.sample_rate, streaminfo.channels, streaminfo.bits_per_sample);

    let mut blocks = Vec::new();
    let mut seektable = None;
    let mut is_last = header.is_last;

    while !is_last {
        let header = read_block_header(reader)?;
        let offset = reader.byte_position();

        match header.block_type {
            BlockType::SeekTable if seektable.is_none() => {
                seektable = Some(read_seektable(reader, header.length)?);
            }
            _ => {
                reader.seek_bits(header.length * 8)?;
            }
        }

        blocks.push(MetadataBlockDescriptor {
            block_type: header.block_type,
            offset,
            size: header.length,
        });

        is_last = header.is_last;
    }

    let first_frame_offset = reader.byte_position();

    Ok(MetadataSummary { streaminfo, blocks, seektable, first_frame_offset })
}
