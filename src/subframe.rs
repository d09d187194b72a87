// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Subframes: one channel's worth of a block, coded by one of four methods.
//!
//! Every sample in this decoder's internal workspace is an `i64`, wide
//! enough for the 32-bit nominal depth plus the extra bit a side channel
//! carries plus the headroom an LPC accumulation needs, so there is no
//! narrow/wide sample-type split to thread through this module.

use std::io::Read;

use crate::bitstream::BitReader;
use crate::error::{Error, Result};
use crate::residual;

#[derive(Clone, Copy, Debug)]
enum SubframeType {
    Constant,
    Verbatim,
    Fixed(u32),
    Lpc(u32),
}

struct SubframeHeader {
    sf_type: SubframeType,
    wasted_bits: u32,
}

fn read_subframe_header<R: Read>(reader: &mut BitReader<R>) -> Result<SubframeHeader> {
    if reader.read_uint(1)? != 0 {
        return Err(Error::BadSubframeHeader("subframe padding bit must be 0"));
    }

    let tag = reader.read_uint(6)?;
    let sf_type = match tag {
        0 => SubframeType::Constant,
        1 => SubframeType::Verbatim,
        n if (n & 0b111_110 == 0b000_010) || (n & 0b111_100 == 0b000_100) || (n & 0b110_000 == 0b010_000) => {
            return Err(Error::BadSubframeHeader("reserved subframe type"));
        }
        n if n & 0b111_000 == 0b001_000 => {
            let order = n & 0b000_111;
            if order > 4 {
                return Err(Error::BadSubframeHeader("fixed predictor order above 4"));
            }
            SubframeType::Fixed(order)
        }
        n => SubframeType::Lpc((n & 0b011_111) + 1),
    };

    let wasted_bits = if reader.read_uint(1)? == 0 {
        0
    } else {
        let mut count = 1;
        while reader.read_uint(1)? == 0 {
            count += 1;
        }
        count
    };

    Ok(SubframeHeader { sf_type, wasted_bits })
}

/// Decodes one subframe into `buffer`, whose length is the frame's block
/// size. `bps` is the *effective* bit depth for this channel, already
/// adjusted for the extra bit a side channel carries.
pub fn decode<R: Read>(reader: &mut BitReader<R>, bps: u32, buffer: &mut [i64]) -> Result<()> {
    let header = read_subframe_header(reader)?;
    let effective_bps = bps - header.wasted_bits;

    match header.sf_type {
        SubframeType::Constant => decode_constant(reader, effective_bps, buffer)?,
        SubframeType::Verbatim => decode_verbatim(reader, effective_bps, buffer)?,
        SubframeType::Fixed(order) => decode_fixed(reader, effective_bps, order, buffer)?,
        SubframeType::Lpc(order) => decode_lpc(reader, effective_bps, order, buffer)?,
    }

    if header.wasted_bits > 0 {
        for s in buffer.iter_mut() {
            *s <<= header.wasted_bits;
        }
    }

    Ok(())
}

fn decode_constant<R: Read>(reader: &mut BitReader<R>, bps: u32, buffer: &mut [i64]) -> Result<()> {
    let value = reader.read_int(bps)? as i64;
    for s in buffer.iter_mut() {
        *s = value;
    }
    Ok(())
}

fn decode_verbatim<R: Read>(reader: &mut BitReader<R>, bps: u32, buffer: &mut [i64]) -> Result<()> {
    for s in buffer.iter_mut() {
        *s = reader.read_int(bps)? as i64;
    }
    Ok(())
}

/// The four fixed predictors FLAC defines, indexed by order. Order 0 is
/// the identity (no prediction, residual equals the sample).
fn predict_fixed(order: u32, history: &[i64]) -> i64 {
    match order {
        0 => 0,
        1 => history[0],
        2 => 2 * history[0] - history[1],
        3 => 3 * history[0] - 3 * history[1] + history[2],
        4 => 4 * history[0] - 6 * history[1] + 4 * history[2] - history[3],
        _ => unreachable!("fixed predictor order is validated to be at most 4"),
    }
}

fn decode_fixed<R: Read>(reader: &mut BitReader<R>, bps: u32, order: u32, buffer: &mut [i64]) -> Result<()> {
    let order_usize = order as usize;
    decode_verbatim(reader, bps, &mut buffer[..order_usize])?;

    residual::decode_into(reader, order, buffer, |prefix| {
        // `history` is the `order` most recent reconstructed samples,
        // most recent first.
        let n = prefix.len();
        let mut history = [0i64; 4];
        for (k, h) in history.iter_mut().enumerate().take(order_usize) {
            *h = prefix[n - 1 - k];
        }
        predict_fixed(order, &history)
    })
}

fn decode_lpc<R: Read>(reader: &mut BitReader<R>, bps: u32, order: u32, buffer: &mut [i64]) -> Result<()> {
    let order_usize = order as usize;
    decode_verbatim(reader, bps, &mut buffer[..order_usize])?;

    let precision = reader.read_uint(4)? + 1;
    if precision - 1 == 0b1111 {
        return Err(Error::BadSubframeHeader("LPC coefficient precision of 15 is reserved"));
    }

    let shift = crate::bitstream::sign_extend(reader.read_uint(5)?, 5);
    if shift < 0 {
        // Negative shifts appear in the format but every known encoder
        // emits non-negative ones; decode them as a left shift rather than
        // rejecting the stream outright.
        log::warn!("LPC subframe uses a negative quantization shift ({shift})");
    }

    let mut coefficients = Vec::with_capacity(order_usize);
    for _ in 0..order_usize {
        let coef = crate::bitstream::sign_extend(reader.read_uint(precision)?, precision);
        coefficients.push(coef as i64);
    }

    residual::decode_into(reader, order, buffer, |prefix| {
        let n = prefix.len();
        let mut prediction: i64 = 0;
        for (j, &coef) in coefficients.iter().enumerate() {
            prediction += coef * prefix[n - 1 - j];
        }
        if shift >= 0 { prediction >> shift } else { prediction << (-shift) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_fixed_matches_reference_formulas() {
        let history = [10i64, 7, 3, 0];
        assert_eq!(predict_fixed(0, &history), 0);
        assert_eq!(predict_fixed(1, &history), 10);
        assert_eq!(predict_fixed(2, &history), 2 * 10 - 7);
        assert_eq!(predict_fixed(3, &history), 3 * 10 - 3 * 7 + 3);
        assert_eq!(predict_fixed(4, &history), 4 * 10 - 6 * 7 + 4 * 3 - 0);
    }

    #[test]
    fn fixed_order_zero_passes_residual_through() {
        use std::io::Cursor;
        // Subframe header (pad=0, type=001000 fixed/order0, wasted=0), then a
        // plain-Rice residual (method 00, partition order 0, k=0) carrying
        // two samples: 1 and -1.
        let mut reader = BitReader::new(Cursor::new(vec![0x10, 0x00, 0x0a]));
        let mut buffer = vec![0i64; 2];
        decode(&mut reader, 16, &mut buffer).unwrap();
        assert_eq!(buffer, vec![1, -1]);
    }

    #[test]
    fn lpc_accumulates_without_overflow_at_max_order_and_precision() {
        // Worst case: order 32, coefficients and samples near i32::MAX/MIN,
        // precision 15 bits signed (max magnitude ~16384). The accumulator
        // must not need more than i64 to hold the dot product.
        let coefficients = vec![16_383i64; 32];
        let mut buffer = vec![(1i64 << 31) - 1; 40];
        let order = 32usize;
        for i in order..buffer.len() {
            let mut prediction: i64 = 0;
            for (j, &coef) in coefficients.iter().enumerate() {
                prediction += coef * buffer[i - 1 - j];
            }
            // This would panic on overflow in debug builds if i64 were too narrow.
            let _ = prediction >> 0;
        }
    }
}
