//! Whole-stream decode properties: bit-exact output, re-entrant chunked
//! reads, adversarial byte sources, and agreement between the three output
//! formats.

mod common;

use std::io::Cursor;

use common::{build_stream, ramp_frame, OneByteAtATime};
use flacon::output::{to_f32, to_s16, to_s32};
use flacon::{ChecksumPolicy, FlacReader};

fn stereo_fixture() -> common::StreamFixture {
    let frames = vec![
        ramp_frame(2, 16, 16, -200),
        ramp_frame(2, 16, 16, 0),
        ramp_frame(2, 16, 16, 1000),
    ];
    build_stream(2, 16, 44_100, &frames, false)
}

#[test]
fn decodes_stereo_stream_bit_exact() {
    let fixture = stereo_fixture();
    let mut reader = FlacReader::new(Cursor::new(fixture.bytes)).unwrap();
    assert_eq!(reader.streaminfo().channels, 2);
    assert_eq!(reader.streaminfo().bits_per_sample, 16);
    assert_eq!(reader.streaminfo().samples, Some(fixture.expected.len() as u64 / 2));

    let total_frames = fixture.expected.len() / 2;
    let mut out = Vec::new();
    let produced = reader.read_s32(total_frames, &mut out).unwrap();
    assert_eq!(produced, total_frames);

    let expected: Vec<i32> = fixture.expected.iter().map(|&s| to_s32(s, 16)).collect();
    assert_eq!(out, expected);
}

#[test]
fn chunked_reads_reassemble_to_the_same_stream() {
    let fixture = stereo_fixture();
    let total_frames = fixture.expected.len() / 2;

    let mut whole = FlacReader::new(Cursor::new(fixture.bytes.clone())).unwrap();
    let mut whole_out = Vec::new();
    whole.read_s16(total_frames, &mut whole_out).unwrap();

    for chunk in [1usize, 3, 7, 100] {
        let mut reader = FlacReader::new(Cursor::new(fixture.bytes.clone())).unwrap();
        let mut out = Vec::new();
        loop {
            let produced = reader.read_s16(chunk, &mut out).unwrap();
            if produced == 0 {
                break;
            }
        }
        assert_eq!(out, whole_out, "chunk size {chunk} diverged from a single-shot read");
    }
}

#[test]
fn byte_at_a_time_source_matches_buffered_source() {
    let fixture = stereo_fixture();
    let total_frames = fixture.expected.len() / 2;

    let mut buffered = FlacReader::new(Cursor::new(fixture.bytes.clone())).unwrap();
    let mut buffered_out = Vec::new();
    buffered.read_s16(total_frames, &mut buffered_out).unwrap();

    let mut slow = FlacReader::new(OneByteAtATime::new(Cursor::new(fixture.bytes))).unwrap();
    let mut slow_out = Vec::new();
    slow.read_s16(total_frames, &mut slow_out).unwrap();

    assert_eq!(slow_out, buffered_out);
}

#[test]
fn output_formats_agree_by_their_defined_linear_transform() {
    let fixture = stereo_fixture();
    let total_frames = fixture.expected.len() / 2;

    let mut r16 = FlacReader::new(Cursor::new(fixture.bytes.clone())).unwrap();
    let mut r32 = FlacReader::new(Cursor::new(fixture.bytes.clone())).unwrap();
    let mut rf32 = FlacReader::new(Cursor::new(fixture.bytes)).unwrap();

    let mut s16 = Vec::new();
    let mut s32 = Vec::new();
    let mut f32s = Vec::new();
    r16.read_s16(total_frames, &mut s16).unwrap();
    r32.read_s32(total_frames, &mut s32).unwrap();
    rf32.read_f32(total_frames, &mut f32s).unwrap();

    for i in 0..s32.len() {
        assert_eq!(s16[i], (s32[i] >> 16) as i16);
        let expected_f32 = s32[i] as f32 * (1.0 / 2_147_483_648.0);
        assert!((f32s[i] - expected_f32).abs() < 1e-9);
    }

    // Cross-check against the free functions directly, not just against
    // each other, so a shared mistake in all three read paths would show.
    for (i, &native) in fixture_native_samples().iter().enumerate() {
        assert_eq!(s16[i], to_s16(native, 16));
        assert_eq!(s32[i], to_s32(native, 16));
        assert_eq!(f32s[i], to_f32(native, 16));
    }
}

fn fixture_native_samples() -> Vec<i64> {
    stereo_fixture().expected
}

#[test]
fn checksum_validate_accepts_a_correctly_computed_stream() {
    let fixture = stereo_fixture();
    let mut reader = FlacReader::with_checksum_policy(Cursor::new(fixture.bytes), ChecksumPolicy::Validate).unwrap();
    let total_frames = fixture.expected.len() / 2;
    let mut out = Vec::new();
    let produced = reader.read_s32(total_frames, &mut out).unwrap();
    assert_eq!(produced, total_frames);
    assert!(reader.last_error().is_none());
}

#[test]
fn mono_8_and_24_bit_depths_round_trip() {
    for bits in [8u8, 24u8] {
        let frames = vec![ramp_frame(1, 32, bits, -10), ramp_frame(1, 32, bits, 50)];
        let fixture = build_stream(1, bits, 48_000, &frames, false);
        let total_frames = fixture.expected.len();
        let mut reader = FlacReader::new(Cursor::new(fixture.bytes)).unwrap();
        let mut out = Vec::new();
        reader.read_s32(total_frames, &mut out).unwrap();
        let expected: Vec<i32> = fixture.expected.iter().map(|&s| to_s32(s, bits as u32)).collect();
        assert_eq!(out, expected, "{bits}-bit round trip failed");
    }
}

#[test]
fn eight_channel_stream_keeps_channels_independent() {
    let frames = vec![ramp_frame(8, 16, 16, 0)];
    let fixture = build_stream(8, 16, 96_000, &frames, false);
    let mut reader = FlacReader::new(Cursor::new(fixture.bytes)).unwrap();
    assert_eq!(reader.streaminfo().channels, 8);

    let mut out = Vec::new();
    reader.read_s32(16, &mut out).unwrap();
    let expected: Vec<i32> = fixture.expected.iter().map(|&s| to_s32(s, 16)).collect();
    assert_eq!(out, expected);
}

#[test]
fn callback_source_decodes_like_a_cursor() {
    use flacon::source::CallbackSource;

    let fixture = stereo_fixture();
    let data = fixture.bytes.clone();
    let mut offset = 0usize;
    let src = CallbackSource::new(
        move |buf: &mut [u8]| {
            let n = buf.len().min(data.len() - offset);
            buf[..n].copy_from_slice(&data[offset..offset + n]);
            offset += n;
            n
        },
        |_delta, _origin| false,
    );

    let total_frames = fixture.expected.len() / 2;
    let mut reader = FlacReader::new(src).unwrap();
    let mut out = Vec::new();
    let produced = reader.read_s32(total_frames, &mut out).unwrap();
    assert_eq!(produced, total_frames);
    let expected: Vec<i32> = fixture.expected.iter().map(|&s| to_s32(s, 16)).collect();
    assert_eq!(out, expected);
}
