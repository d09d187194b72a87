// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

#![no_main]

use std::io::Cursor;

use flacon::seek::SeekStrategies;
use libfuzzer_sys::fuzz_target;

// Exercises the seek engine against arbitrary (likely malformed) streams:
// a bogus target or a corrupt seek table/frame must produce an `Err`, never
// a panic, and the reader must remain usable for a plain read afterwards.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let target = u64::from_le_bytes(data[..8].try_into().unwrap());
    let rest = &data[8..];

    let mut reader = match flacon::FlacReader::new(Cursor::new(rest)) {
        Ok(r) => r,
        Err(..) => return,
    };

    let _ = reader.seek(target, SeekStrategies::ALL);

    let mut out = Vec::new();
    let _ = reader.read_s32(64, &mut out);
});
