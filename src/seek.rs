// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Locating a target PCM-frame index's byte offset, independent of which of
//! the three strategies [`crate::FlacReader`] ends up trying.
//!
//! This module only finds offsets; decoding from the found offset back up
//! to the exact target sample is the caller's job (it needs the frame
//! reader and its own workspace, which this module has no business owning).

use std::io::{Read, Seek, SeekFrom};

use crate::bitstream::BitReader;
use crate::error::Result;
use crate::frame::{self, BlockTime, FrameHeader};
use crate::ChecksumPolicy;

/// Which of the three seek strategies are permitted, in priority order.
///
/// Disabling all but one is how a profiling harness isolates a single
/// strategy's cost; the default has all three enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeekStrategies {
    pub seek_table: bool,
    pub binary_search: bool,
    pub brute_force: bool,
}

impl Default for SeekStrategies {
    fn default() -> SeekStrategies {
        SeekStrategies { seek_table: true, binary_search: true, brute_force: true }
    }
}

impl SeekStrategies {
    pub const ALL: SeekStrategies = SeekStrategies { seek_table: true, binary_search: true, brute_force: true };
    pub const BRUTE_FORCE_ONLY: SeekStrategies = SeekStrategies { seek_table: false, binary_search: false, brute_force: true };
    pub const BINARY_SEARCH_ONLY: SeekStrategies = SeekStrategies { seek_table: false, binary_search: true, brute_force: false };
    pub const SEEK_TABLE_ONLY: SeekStrategies = SeekStrategies { seek_table: true, binary_search: false, brute_force: false };
}

/// Starting byte position and the first sample number of the frame found
/// there -- the seek engine's deliverable, regardless of which strategy
/// produced it. The caller still has to decode forward from `frame_start`
/// to land exactly on the target sample.
pub struct Landing {
    pub frame_start: u64,
    pub frame_first_sample: u64,
}

/// Scans forward from `start` for the next frame sync code (14 ones
/// followed by the reserved and blocking-strategy bits, which this scan
/// ignores), parses its header, and reports where it landed.
///
/// Used by both the binary-search bisection and, as a fallback, by brute
/// force once it is already positioned at a plausible frame boundary.
pub fn scan_for_frame<R: Read + Seek>(
    source: &mut R,
    start: u64,
    limit: u64,
    sample_rate_hint: u32,
    bits_per_sample_hint: u32,
) -> Result<Option<Landing>> {
    let mut pos = start;
    source.seek(SeekFrom::Start(pos))?;
    let mut prev = 0u8;
    let mut have_prev = false;
    let mut byte = [0u8; 1];

    while pos < limit {
        let n = source.read(&mut byte)?;
        if n == 0 {
            return Ok(None);
        }
        pos += 1;

        if have_prev && prev == 0xff && byte[0] & 0b1111_1100 == 0b1111_1000 {
            let header_start = pos - 2;
            source.seek(SeekFrom::Start(header_start))?;
            let mut reader = BitReader::new(&mut *source);
            match frame::read_frame_header(&mut reader, ChecksumPolicy::Ignore) {
                Ok(header) => {
                    let first_sample = frame_first_sample(&header, sample_rate_hint, bits_per_sample_hint);
                    return Ok(Some(Landing { frame_start: header_start, frame_first_sample: first_sample }));
                }
                Err(_) => {
                    // False positive sync pattern inside sample data; resume
                    // scanning one byte past where we started looking.
                    source.seek(SeekFrom::Start(pos))?;
                }
            }
        }

        prev = byte[0];
        have_prev = true;
    }

    Ok(None)
}

fn frame_first_sample(header: &FrameHeader, _sample_rate_hint: u32, _bits_per_sample_hint: u32) -> u64 {
    match header.block_time {
        BlockTime::SampleNumber(s) => s,
        // Fixed blocking: every frame carries the same block size, so the
        // frame number times that size gives the first sample directly.
        BlockTime::FrameNumber(n) => header.block_size as u64 * n as u64,
    }
}
