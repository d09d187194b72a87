// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Demultiplexes a FLAC-in-Ogg logical stream into a plain byte stream.
//!
//! A FLAC-in-Ogg file is a sequence of Ogg pages, each holding one or more
//! packets, possibly multiplexed with unrelated logical streams. The first
//! packet of the FLAC logical stream carries a small mapping header (`\x7f`,
//! `FLAC`, a 2-byte version, a 2-byte header-packet count) directly followed
//! by the usual `fLaC` signature and `STREAMINFO` block, so once this module
//! has located and stripped that mapping header, everything downstream sees
//! exactly the same byte stream a native FLAC file would produce.
//!
//! Only a single logical stream is supported: the first one whose leading
//! packet identifies as FLAC. Any other multiplexed stream is ignored.

use std::io::{self, Read};

// Leading `::` disambiguates from this crate's own `ogg` module, which
// otherwise shadows the extern crate of the same name at path resolution.
use ::ogg::reading::PacketReader;

use crate::error::{Error, Result};

const MAPPING_HEADER_LEN: usize = 9;

/// Reads FLAC packet payloads out of an Ogg container, presenting them to
/// its caller as one contiguous byte stream starting at the `fLaC` marker.
pub struct OggFlacSource<R: Read> {
    packets: PacketReader<R>,
    serial: u32,
    current: io::Cursor<Vec<u8>>,
}

impl<R: Read> OggFlacSource<R> {
    /// Locates the first FLAC logical stream in `inner` and returns a source
    /// that yields its packet payloads concatenated, beginning at `fLaC`.
    pub fn new(inner: R) -> Result<OggFlacSource<R>> {
        let mut packets = PacketReader::new(inner);

        loop {
            let packet = packets
                .read_packet()
                .map_err(|_| Error::Unsupported("malformed Ogg page"))?
                .ok_or(Error::Unsupported("no FLAC logical stream found in Ogg container"))?;

            let is_flac_header = packet.data.len() > MAPPING_HEADER_LEN
                && packet.data[0] == 0x7f
                && &packet.data[1..5] == b"FLAC";

            if is_flac_header {
                let remainder = packet.data[MAPPING_HEADER_LEN..].to_vec();
                return Ok(OggFlacSource {
                    packets,
                    serial: packet.stream_serial,
                    current: io::Cursor::new(remainder),
                });
            }
            // Not our stream's first packet; keep scanning. Other logical
            // streams multiplexed into the same pages are skipped this way
            // without needing to inspect their serials up front.
        }
    }
}

impl<R: Read> Read for OggFlacSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.current.read(buf)?;
            if n > 0 {
                return Ok(n);
            }

            match self.packets.read_packet().map_err(|e| io::Error::new(io::ErrorKind::Other, e))? {
                None => return Ok(0),
                Some(packet) => {
                    if packet.stream_serial != self.serial {
                        continue;
                    }
                    self.current = io::Cursor::new(packet.data);
                }
            }
        }
    }
}
