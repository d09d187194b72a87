//! Seek-strategy equivalence: `seek(target, S); read(k)` must reproduce the
//! tail of `read(target + k)` from a fresh reader, for each strategy in
//! isolation and for the default combination.

mod common;

use std::io::Cursor;

use common::{build_stream, ramp_frame};
use flacon::output::to_s32;
use flacon::seek::SeekStrategies;
use flacon::FlacReader;

fn multi_frame_fixture() -> common::StreamFixture {
    let frames = vec![
        ramp_frame(2, 16, 16, -500),
        ramp_frame(2, 16, 16, -100),
        ramp_frame(2, 16, 16, 300),
        ramp_frame(2, 16, 16, 900),
    ];
    build_stream(2, 16, 44_100, &frames, true)
}

fn sequential_tail(bytes: &[u8], target: u64, k: usize) -> Vec<i32> {
    let mut reader = FlacReader::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut all = Vec::new();
    reader.read_s32(target as usize + k, &mut all).unwrap();
    let channels = reader.streaminfo().channels as usize;
    all.split_off(target as usize * channels)
}

fn seeked_read(bytes: &[u8], target: u64, k: usize, strategies: SeekStrategies) -> Vec<i32> {
    let mut reader = FlacReader::new(Cursor::new(bytes.to_vec())).unwrap();
    reader.seek(target, strategies).unwrap();
    assert_eq!(reader.position(), target);
    let mut out = Vec::new();
    reader.read_s32(k, &mut out).unwrap();
    out
}

#[test]
fn seek_table_strategy_matches_sequential_read() {
    let fixture = multi_frame_fixture();
    let target = 40u64; // lands inside the third frame (frames at 0, 16, 32, 48)
    let expected = sequential_tail(&fixture.bytes, target, 10);
    let got = seeked_read(&fixture.bytes, target, 10, SeekStrategies::SEEK_TABLE_ONLY);
    assert_eq!(got, expected);
}

#[test]
fn binary_search_strategy_matches_sequential_read() {
    let fixture = multi_frame_fixture();
    let target = 40u64;
    let expected = sequential_tail(&fixture.bytes, target, 10);
    let got = seeked_read(&fixture.bytes, target, 10, SeekStrategies::BINARY_SEARCH_ONLY);
    assert_eq!(got, expected);
}

#[test]
fn brute_force_strategy_matches_sequential_read() {
    let fixture = multi_frame_fixture();
    let target = 40u64;
    let expected = sequential_tail(&fixture.bytes, target, 10);
    let got = seeked_read(&fixture.bytes, target, 10, SeekStrategies::BRUTE_FORCE_ONLY);
    assert_eq!(got, expected);
}

#[test]
fn every_strategy_lands_on_an_exact_frame_boundary() {
    let fixture = multi_frame_fixture();
    // Frame 1 starts at sample 16 exactly; every strategy should be able to
    // recognize that without needing to decode forward at all.
    for strategies in [SeekStrategies::SEEK_TABLE_ONLY, SeekStrategies::BINARY_SEARCH_ONLY, SeekStrategies::BRUTE_FORCE_ONLY] {
        let got = seeked_read(&fixture.bytes, 16, 4, strategies);
        let expected = sequential_tail(&fixture.bytes, 16, 4);
        assert_eq!(got, expected);
    }
}

#[test]
fn seeking_to_zero_after_reading_reproduces_the_start() {
    let fixture = multi_frame_fixture();
    let mut reader = FlacReader::new(Cursor::new(fixture.bytes.clone())).unwrap();

    let mut first = Vec::new();
    reader.read_s32(20, &mut first).unwrap();

    reader.seek(0, SeekStrategies::ALL).unwrap();
    assert_eq!(reader.position(), 0);

    let mut second = Vec::new();
    reader.read_s32(20, &mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn seeking_past_the_end_of_stream_is_an_error_and_leaves_reader_usable() {
    let fixture = multi_frame_fixture();
    let mut reader = FlacReader::new(Cursor::new(fixture.bytes)).unwrap();
    let total = reader.streaminfo().samples.unwrap();

    assert!(reader.seek(total, SeekStrategies::ALL).is_err());

    // The reader is still usable afterwards: a normal read from wherever it
    // landed should not panic or return a hard error.
    let mut out = Vec::new();
    assert!(reader.read_s32(1, &mut out).is_ok());
}

#[test]
fn repeated_seeks_to_the_same_target_are_idempotent() {
    let fixture = multi_frame_fixture();
    let mut reader = FlacReader::new(Cursor::new(fixture.bytes)).unwrap();

    reader.seek(32, SeekStrategies::ALL).unwrap();
    let mut first = Vec::new();
    reader.read_s32(8, &mut first).unwrap();

    reader.seek(32, SeekStrategies::ALL).unwrap();
    let mut second = Vec::new();
    reader.read_s32(8, &mut second).unwrap();

    assert_eq!(first, second);
}

#[test]
fn seeked_samples_match_native_depth_conversion() {
    let fixture = multi_frame_fixture();
    let got = seeked_read(&fixture.bytes, 48, 16, SeekStrategies::ALL);
    let expected: Vec<i32> = fixture.expected[48 * 2..].iter().map(|&s| to_s32(s, 16)).collect();
    assert_eq!(got, expected);
}
