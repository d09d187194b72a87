// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Byte source adapters.
//!
//! The decoder only ever requires [`std::io::Read`], and additionally
//! [`std::io::Seek`] for the seek engine. Any type that implements those
//! standard traits -- a file, an in-memory cursor, a caller's own reader --
//! already satisfies the decoder. This module adds one convenience on top: a
//! pull-style callback adapter for embedders that hand the decoder a pair of
//! `read`/`seek` functions instead of a `Read` value.

use std::io::{self, Read, Seek, SeekFrom};

/// Where a [`seek`](CallbackSource) offset is measured from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Offset is relative to the start of the stream.
    Start,
    /// Offset is relative to the current position; may be negative.
    Current,
}

/// Adapts a pair of `read`/`seek` closures into [`Read`] + [`Seek`].
///
/// Built for callers that supply raw pull callbacks (a `read` that may
/// return short reads, and a `seek` that reports success or failure rather
/// than an absolute position) rather than an `io::Read` implementation
/// directly.
pub struct CallbackSource<F, G> {
    read_fn: F,
    seek_fn: G,
    pos: u64,
}

impl<F, G> CallbackSource<F, G>
where
    F: FnMut(&mut [u8]) -> usize,
    G: FnMut(i64, SeekOrigin) -> bool,
{
    /// Wraps `read_fn`/`seek_fn` as a byte source starting at position 0.
    pub fn new(read_fn: F, seek_fn: G) -> CallbackSource<F, G> {
        CallbackSource { read_fn, seek_fn, pos: 0 }
    }
}

impl<F, G> Read for CallbackSource<F, G>
where
    F: FnMut(&mut [u8]) -> usize,
    G: FnMut(i64, SeekOrigin) -> bool,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (self.read_fn)(buf);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<F, G> Seek for CallbackSource<F, G>
where
    F: FnMut(&mut [u8]) -> usize,
    G: FnMut(i64, SeekOrigin) -> bool,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (delta, origin, target) = match pos {
            SeekFrom::Start(offset) => (offset as i64, SeekOrigin::Start, offset),
            SeekFrom::Current(delta) => {
                let target = (self.pos as i64 + delta).max(0) as u64;
                (delta, SeekOrigin::Current, target)
            }
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "callback source cannot seek from the end",
                ))
            }
        };

        if (self.seek_fn)(delta, origin) {
            self.pos = target;
            Ok(self.pos)
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "callback source refused the seek",
            ))
        }
    }
}
