// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = match flacon::FlacReader::new(Cursor::new(data)) {
        Ok(r) => r,
        Err(..) => return,
    };

    let mut out = Vec::new();
    loop {
        out.clear();
        match reader.read_s32(4096, &mut out) {
            Ok(0) => break,
            Ok(..) => {}
            Err(..) => return,
        }
    }
});
