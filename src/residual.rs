// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Partitioned Rice coding of the prediction residual.
//!
//! A residual splits its samples into `2^order` equally-sized partitions
//! (the first partition is short by the number of warm-up samples the
//! predictor already consumed), each with its own Rice parameter. Two
//! coding methods exist, differing only in how wide the parameter and its
//! escape code are: method 0 uses a 4-bit parameter (max 14, escape 15),
//! method 1 uses a 5-bit parameter (max 30, escape 31) for the rare stream
//! that needs it.
//!
//! [`decode_into`] is the hot path the subframe decoders use: it folds the
//! predictor accumulation into the very loop that performs the Rice
//! bit-scan, so reconstructing a block is one pass over its samples rather
//! than a residual-only pass followed by a separate correction pass.
//! [`decode_partitioned_rice`] (test-only) is kept as the slower, unfused
//! reference decomposition -- residuals only, no predictor -- and is used
//! in this module's tests to cross-check the fused path.

use std::io::Read;

use crate::bitstream::BitReader;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RiceMethod {
    /// 4-bit Rice parameters, escape code 0b1111.
    Rice1,
    /// 5-bit Rice parameters, escape code 0b11111.
    Rice2,
}

impl RiceMethod {
    fn param_bits(self) -> u32 {
        match self {
            RiceMethod::Rice1 => 4,
            RiceMethod::Rice2 => 5,
        }
    }

    fn escape_code(self) -> u32 {
        match self {
            RiceMethod::Rice1 => 0b1111,
            RiceMethod::Rice2 => 0b1_1111,
        }
    }
}

/// Decodes the residual coding method selector and dispatches to the fused
/// partitioned Rice reader. `buffer` is the whole subframe, including the
/// `predictor_order` warm-up samples already written at its front; each
/// reconstructed sample is `residual + predict(already-reconstructed prefix)`,
/// computed in the same iteration that reads its Rice code.
pub(crate) fn decode_into<R: Read>(
    reader: &mut BitReader<R>,
    predictor_order: u32,
    buffer: &mut [i64],
    predict: impl FnMut(&[i64]) -> i64,
) -> Result<()> {
    let method = reader.read_uint(2)?;
    let rice_method = match method {
        0b00 => RiceMethod::Rice1,
        0b01 => RiceMethod::Rice2,
        _ => return Err(Error::BadResidual("reserved residual coding method")),
    };
    decode_partitioned_rice_into(reader, rice_method, predictor_order, buffer, predict)
}

fn decode_partitioned_rice_into<R: Read>(
    reader: &mut BitReader<R>,
    method: RiceMethod,
    predictor_order: u32,
    buffer: &mut [i64],
    mut predict: impl FnMut(&[i64]) -> i64,
) -> Result<()> {
    let order = reader.read_uint(4)?;
    let n_partitions = 1u32 << order;
    let block_size = buffer.len() as u32;

    if block_size % n_partitions != 0 {
        return Err(Error::BadResidual("block size is not a multiple of the partition count"));
    }
    let partition_len = block_size / n_partitions;
    if predictor_order > partition_len {
        return Err(Error::BadResidual("predictor order exceeds the first partition's length"));
    }

    let mut i = predictor_order as usize;
    for p in 0..n_partitions {
        let len = partition_len - if p == 0 { predictor_order } else { 0 };
        let param = reader.read_uint(method.param_bits())?;

        if param == method.escape_code() {
            let sample_bits = reader.read_uint(5)?;
            if sample_bits > 32 {
                return Err(Error::BadResidual("escaped residual sample width exceeds 32 bits"));
            }
            for _ in 0..len {
                let residual = if sample_bits == 0 { 0 } else { reader.read_int(sample_bits)? as i64 };
                buffer[i] = residual + predict(&buffer[..i]);
                i += 1;
            }
        } else {
            // Bit-scan, remainder extract and zig-zag all happen inside
            // `read_rice`; the predictor MAC runs right after, in the same
            // iteration, so there is no second traversal of `buffer`.
            for _ in 0..len {
                let residual = reader.read_rice(param)?;
                buffer[i] = residual + predict(&buffer[..i]);
                i += 1;
            }
        }
    }

    Ok(())
}

/// The reference decomposition: plain partitioned Rice decoding with no
/// predictor fusion. `buffer` holds the samples to be filled with
/// residuals, i.e. the block excluding the predictor's warm-up samples.
/// Used directly by this module's tests as an independent check on
/// [`decode_into`]'s fused output.
#[cfg(test)]
fn decode_partitioned_rice<R: Read>(
    reader: &mut BitReader<R>,
    method: RiceMethod,
    block_size: u32,
    predictor_order: u32,
    buffer: &mut [i64],
) -> Result<()> {
    let order = reader.read_uint(4)?;
    let n_partitions = 1u32 << order;

    if block_size % n_partitions != 0 {
        return Err(Error::BadResidual("block size is not a multiple of the partition count"));
    }
    let partition_len = block_size / n_partitions;
    if predictor_order > partition_len {
        return Err(Error::BadResidual("predictor order exceeds the first partition's length"));
    }

    let mut start = 0usize;
    for i in 0..n_partitions {
        let len = partition_len - if i == 0 { predictor_order } else { 0 };
        decode_rice_partition(reader, method, &mut buffer[start..start + len as usize])?;
        start += len as usize;
    }

    Ok(())
}

#[cfg(test)]
fn decode_rice_partition<R: Read>(reader: &mut BitReader<R>, method: RiceMethod, buffer: &mut [i64]) -> Result<()> {
    let param = reader.read_uint(method.param_bits())?;

    if param == method.escape_code() {
        decode_escaped_partition(reader, buffer)
    } else {
        for sample in buffer.iter_mut() {
            *sample = reader.read_rice(param)?;
        }
        Ok(())
    }
}

/// Reads a partition coded as raw, unencoded two's-complement integers --
/// the escape hatch for partitions where no Rice parameter compresses well
/// (near-silent sections with a handful of impulses, for instance).
#[cfg(test)]
fn decode_escaped_partition<R: Read>(reader: &mut BitReader<R>, buffer: &mut [i64]) -> Result<()> {
    let sample_bits = reader.read_uint(5)?;
    if sample_bits == 0 {
        // Zero-width escape: the whole partition is silence.
        for sample in buffer.iter_mut() {
            *sample = 0;
        }
        return Ok(());
    }
    if sample_bits > 32 {
        return Err(Error::BadResidual("escaped residual sample width exceeds 32 bits"));
    }
    for sample in buffer.iter_mut() {
        *sample = reader.read_int(sample_bits)? as i64;
    }
    Ok(())
}
