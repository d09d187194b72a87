// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Converts decoded samples, which carry the stream's native bit depth,
//! into one of three fixed output representations.
//!
//! Every conversion is a pure left/right shift or a linear scale; none of
//! them can fail, so these take plain values rather than threading a
//! `Result` through. `FlacReader::read_s16`/`read_s32`/`read_f32` call these
//! per sample while appending to the caller's output buffer.

/// Converts one native-depth sample to a left-justified 32-bit integer.
#[inline]
pub fn to_s32(sample: i64, bits_per_sample: u32) -> i32 {
    let shift = 32 - bits_per_sample;
    ((sample as i32) << shift) as i32
}

/// Converts one native-depth sample to 16 bits by truncating a left-justified
/// 32-bit value, i.e. keeping its most significant 16 bits.
#[inline]
pub fn to_s16(sample: i64, bits_per_sample: u32) -> i16 {
    (to_s32(sample, bits_per_sample) >> 16) as i16
}

/// Converts one native-depth sample to a float in [-1.0, 1.0).
#[inline]
pub fn to_f32(sample: i64, bits_per_sample: u32) -> f32 {
    const INV_2_POW_31: f32 = 1.0 / 2_147_483_648.0;
    to_s32(sample, bits_per_sample) as f32 * INV_2_POW_31
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_16_bit_sample_maps_to_extremes() {
        assert_eq!(to_s16(i16::MAX as i64, 16), i16::MAX);
        assert_eq!(to_s16(i16::MIN as i64, 16), i16::MIN);
    }

    #[test]
    fn eight_bit_sample_is_left_justified_into_s32() {
        assert_eq!(to_s32(1, 8), 1 << 24);
        assert_eq!(to_s32(-1, 8), -1i32 << 24);
    }

    #[test]
    fn f32_conversion_stays_within_unit_range() {
        let max = to_f32((1i64 << 15) - 1, 16);
        let min = to_f32(-(1i64 << 15), 16);
        assert!(max < 1.0 && max > 0.99);
        assert!((min - (-1.0)).abs() < 1e-6);
    }
}
