// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

#![no_main]

use std::io::Cursor;

use flacon::seek::SeekStrategies;
use libfuzzer_sys::fuzz_target;

fn decode_all(reader: &mut flacon::FlacReader<Cursor<&[u8]>>) -> Option<Vec<i32>> {
    let mut out = Vec::new();
    loop {
        match reader.read_s32(4096, &mut out) {
            Ok(0) => return Some(out),
            Ok(..) => {}
            Err(..) => return None,
        }
    }
}

// Decoding the same stream twice must produce the same samples: once
// straight through, once after seeking back to the start. A divergence here
// points at state the decoder fails to reset on seek.
fuzz_target!(|data: &[u8]| {
    let mut reader = match flacon::FlacReader::new(Cursor::new(data)) {
        Ok(r) => r,
        Err(..) => return,
    };

    let first = match decode_all(&mut reader) {
        Some(samples) => samples,
        None => return,
    };

    if reader.seek(0, SeekStrategies::ALL).is_err() {
        return;
    }

    let second = match decode_all(&mut reader) {
        Some(samples) => samples,
        None => panic!("decoded fine before seeking, failed after seeking back to 0"),
    };

    assert_eq!(first, second);
});
