// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Stereo decorrelation recomposition.
//!
//! Left/side, right/side and mid/side coding each store one decoded channel
//! ("side") as the difference of left and right, which compresses better
//! than storing both channels independently for typical stereo material.
//! These functions undo that in place on a buffer laid out as
//! `[channel 0 samples][channel 1 samples]`.

/// Recovers left ++ right from a buffer holding left ++ side.
pub fn decode_left_side(buffer: &mut [i64]) {
    let block_size = buffer.len() / 2;
    for i in 0..block_size {
        let left = buffer[i];
        let side = buffer[i + block_size];
        // side = left - right, so right = left - side.
        buffer[block_size + i] = left - side;
    }
}

/// Recovers left ++ right from a buffer holding side ++ right.
pub fn decode_right_side(buffer: &mut [i64]) {
    let block_size = buffer.len() / 2;
    for i in 0..block_size {
        let side = buffer[i];
        let right = buffer[block_size + i];
        // side = left - right, so left = side + right.
        buffer[i] = side + right;
    }
}

/// Recovers left ++ right from a buffer holding mid ++ side.
pub fn decode_mid_side(buffer: &mut [i64]) {
    let block_size = buffer.len() / 2;
    for i in 0..block_size {
        let mid = buffer[i];
        let side = buffer[i + block_size];

        // The encoder stores floor((left + right) / 2) as mid, which
        // discards the bit that distinguishes odd sums; that bit survives
        // as the parity of `side` (left - right has the same parity as
        // left + right), so shifting mid back up and OR-ing it in recovers
        // the original sum exactly before halving again.
        let mid = (mid << 1) | (side & 1);
        buffer[i] = (mid + side) >> 1;
        buffer[block_size + i] = (mid - side) >> 1;
    }
}
