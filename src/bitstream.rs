// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! A big-endian bit reader with a two-level cache.
//!
//! Calling back into the byte source for every bit -- or even for every
//! sample -- is far too slow; residual decoding alone issues millions of bit
//! reads per second of audio. Two caches absorb that cost:
//!
//! - L1 is a single 64-bit register (`cache`). Reads that fit entirely
//!   within the bits already cached are pure arithmetic: a shift and a mask,
//!   no branch on the source.
//! - L2 (`staging`) is a byte buffer refilled in one large `read()` call
//!   against the byte source. L1 is topped up from L2 a byte at a time,
//!   which needs no I/O until the staging buffer itself runs dry.
//!
//! `cache` holds its `bits_left` valid, not-yet-consumed bits right-aligned
//! (i.e. in its low bits); consuming always takes from the top of that
//! region. Because every read this decoder performs is at most 32 bits wide,
//! `bits_left` never needs to exceed about 39, so growing the cache by
//! shifting in a further byte can never overflow it.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Size of the L2 staging buffer, refilled in one `read()` call when empty.
const STAGING_SIZE: usize = 4096;

/// A big-endian bit reader over a byte source, with a two-level cache.
pub struct BitReader<R> {
    input: R,
    /// Right-aligned cache of the next `bits_left` unread bits.
    cache: u64,
    bits_left: u32,
    /// L2 staging buffer, bulk-refilled from `input`.
    staging: Box<[u8; STAGING_SIZE]>,
    staging_pos: usize,
    staging_len: usize,
    /// Total number of bits consumed from the logical stream so far.
    bit_pos: u64,
    /// Sticky flag: once the source runs out mid-read, every further read
    /// fails without touching the source again.
    exhausted: bool,
    /// Running CRC-16, fed one byte at a time while armed. Used to verify a
    /// frame footer without needing the cache to retain consumed bytes.
    crc16: Option<crate::crc::Crc16>,
}

impl<R: Read> BitReader<R> {
    /// Wraps `input`, starting at its current byte-aligned position.
    pub fn new(input: R) -> BitReader<R> {
        BitReader {
            input,
            cache: 0,
            bits_left: 0,
            staging: Box::new([0u8; STAGING_SIZE]),
            staging_pos: 0,
            staging_len: 0,
            bit_pos: 0,
            exhausted: false,
            crc16: None,
        }
    }

    /// Starts accumulating a CRC-16 over every byte subsequently pulled
    /// from the byte source. Must be called at a byte boundary.
    pub fn start_crc16(&mut self) {
        debug_assert!(self.is_byte_aligned());
        self.crc16 = Some(crate::crc::Crc16::new());
    }

    /// Stops accumulating and returns the checksum of the bytes consumed
    /// since [`BitReader::start_crc16`]. Must be called at a byte boundary.
    pub fn take_crc16(&mut self) -> u16 {
        debug_assert!(self.is_byte_aligned());
        self.crc16.take().map(|c| c.finish()).unwrap_or(0)
    }

    /// Total number of bits consumed since this reader was created (or last
    /// reset by a seek).
    pub fn bits_consumed(&self) -> u64 {
        self.bit_pos
    }

    /// Discards the cache and returns the wrapped byte source.
    pub fn into_inner(self) -> R {
        self.input
    }

    /// The absolute byte position of the next unread byte.
    ///
    /// Only meaningful when byte-aligned; callers that ask mid-byte get a
    /// nonsensical answer, which is their own fault.
    pub fn byte_position(&self) -> u64 {
        (self.bit_pos + 7) / 8
    }

    /// Whether the reader is currently at a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    /// Advances to the next byte boundary, discarding any partial byte.
    pub fn align_to_byte(&mut self) {
        let skip = self.bits_left % 8;
        self.bits_left -= skip;
        self.bit_pos += skip as u64;
    }

    fn next_byte(&mut self) -> Result<u8> {
        if self.staging_pos == self.staging_len {
            self.staging_len = self.input.read(&mut *self.staging)?;
            self.staging_pos = 0;
            if self.staging_len == 0 {
                self.exhausted = true;
                return Err(Error::TruncatedInput("byte source exhausted"));
            }
        }
        let byte = self.staging[self.staging_pos];
        self.staging_pos += 1;
        if let Some(ref mut crc) = self.crc16 {
            crc.update(byte);
        }
        Ok(byte)
    }

    /// Ensures at least `n` bits (n <= 32) are available in `cache`.
    #[inline]
    fn ensure(&mut self, n: u32) -> Result<()> {
        if self.exhausted {
            return Err(Error::TruncatedInput("read past exhausted input"));
        }
        while self.bits_left < n {
            let byte = self.next_byte()?;
            self.cache = (self.cache << 8) | byte as u64;
            self.bits_left += 8;
        }
        Ok(())
    }

    #[inline]
    fn take(&mut self, n: u32) -> u64 {
        debug_assert!(n <= self.bits_left);
        let shift = self.bits_left - n;
        let mask = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
        let result = (self.cache >> shift) & mask;
        self.bits_left -= n;
        self.bit_pos += n as u64;
        result
    }

    /// Reads the next `n` bits (1 <= n <= 32) as an unsigned integer.
    #[inline]
    pub fn read_uint(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n >= 1 && n <= 32);
        self.ensure(n)?;
        Ok(self.take(n) as u32)
    }

    /// Reads the next `n` bits (1 <= n <= 32) as a two's-complement signed
    /// integer, sign-extended into a 32-bit register.
    #[inline]
    pub fn read_int(&mut self, n: u32) -> Result<i32> {
        let u = self.read_uint(n)?;
        Ok(sign_extend(u, n))
    }

    /// Reads the next `n` bits (33 <= n <= 64) as an unsigned integer, by
    /// concatenating two `read_uint` calls.
    pub fn read_uint64(&mut self, n: u32) -> Result<u64> {
        debug_assert!(n >= 33 && n <= 64);
        let hi_bits = n - 32;
        let hi = self.read_uint(hi_bits)? as u64;
        let lo = self.read_uint(32)? as u64;
        Ok((hi << 32) | lo)
    }

    /// Counts zero bits up to and including the next set bit, returning the
    /// number of zeros. This is the hot path for Rice quotients: the
    /// zero-run is found with one `leading_zeros` bit-scan per cache
    /// refill rather than a bit-at-a-time loop.
    #[inline]
    pub fn read_unary(&mut self) -> Result<u32> {
        let mut count = 0u32;
        loop {
            if self.bits_left == 0 {
                self.ensure(1)?;
            }
            // Left-align the valid region to the top of a 64-bit word so a
            // single `leading_zeros` scan finds the first set bit.
            let region = self.cache << (64 - self.bits_left);
            if region == 0 {
                count += self.bits_left;
                self.bit_pos += self.bits_left as u64;
                self.bits_left = 0;
                continue;
            }
            let lz = region.leading_zeros();
            count += lz;
            let consumed = lz + 1;
            self.bits_left -= consumed;
            self.bit_pos += consumed as u64;
            return Ok(count);
        }
    }

    /// Reads a Rice-coded residual with parameter `k`: a unary quotient
    /// followed by a `k`-bit remainder, assembled and zig-zag decoded.
    /// Fuses the two reads the reference, non-fused path performs
    /// separately (`read_unary` then `read_uint`).
    #[inline]
    pub fn read_rice(&mut self, k: u32) -> Result<i64> {
        let q = self.read_unary()? as u64;
        let r = if k == 0 { 0 } else { self.read_uint(k)? as u64 };
        let u = (q << k) | r;
        Ok(zigzag_decode(u))
    }

    /// Advances exactly `n` bits without returning a value.
    pub fn seek_bits(&mut self, mut n: u32) -> Result<()> {
        while n > 32 {
            self.read_uint(32)?;
            n -= 32;
        }
        if n > 0 {
            self.read_uint(n)?;
        }
        Ok(())
    }

    /// Decodes a FLAC "UTF-8-style" variable-length integer (1-7 bytes, up
    /// to 36 bits). Only valid when the reader is byte-aligned.
    pub fn read_utf8_number(&mut self) -> Result<u64> {
        debug_assert!(self.is_byte_aligned());

        let first = self.read_uint(8)? as u8;
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
            let byte = self.read_uint(8)? as u8;
            if byte & 0b1100_0000 != 0b1000_0000 {
                return Err(Error::BadSyncCode(
                    "invalid variable-length integer continuation byte",
                ));
            }
            result |= ((byte & 0b0011_1111) as u64) << (6 * i);
        }

        Ok(result)
    }
}

impl<R: Read + Seek> BitReader<R> {
    /// Discards the cache and repositions the underlying source at absolute
    /// byte offset `pos`. Used by the seek engine and the Ogg demultiplexer
    /// when jumping to a new frame or page.
    pub fn seek_to_byte(&mut self, pos: u64) -> io::Result<()> {
        self.input.seek(SeekFrom::Start(pos))?;
        self.cache = 0;
        self.bits_left = 0;
        self.staging_pos = 0;
        self.staging_len = 0;
        self.bit_pos = pos * 8;
        self.exhausted = false;
        Ok(())
    }

    /// Exposes the underlying source for operations the bit reader itself
    /// doesn't need, such as reading the byte-aligned frame footer CRC.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.input
    }
}

/// Sign-extends the `bits`-wide two's-complement value `val` to `i32`.
#[inline]
pub fn sign_extend(val: u32, bits: u32) -> i32 {
    if bits >= 32 {
        val as i32
    } else {
        let shift = 32 - bits;
        ((val << shift) as i32) >> shift
    }
}

/// Maps a Rice-coded unsigned value to its signed residual:
/// 0, 1, 2, 3, 4, ... <-> 0, -1, 1, -2, 2, ...
#[inline]
pub fn zigzag_decode(u: u64) -> i64 {
    if u & 1 == 1 {
        -((u >> 1) as i64) - 1
    } else {
        (u >> 1) as i64
    }
}
