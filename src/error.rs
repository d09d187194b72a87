// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Error and result types returned by the decoder.

use std::io;

/// An error that prevents successful decoding of the FLAC stream.
///
/// With the exception of [`Error::Seek`], every variant is terminal: once
/// returned, the [`crate::FlacReader`] that produced it must be discarded. A
/// failed seek leaves the reader positioned either where it was before the
/// seek, or at the start of the stream; further reads remain legal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The 4-byte stream signature was neither `fLaC` nor a FLAC-in-Ogg page.
    #[error("not a FLAC stream: {0}")]
    NotAFlacStream(&'static str),

    /// The `STREAMINFO` block was missing, malformed, or not the first block.
    #[error("invalid metadata: {0}")]
    BadMetadata(&'static str),

    /// The byte source returned fewer bytes than the format required.
    ///
    /// If this occurs in the middle of a frame, any samples decoded so far
    /// from that frame are discarded; completed frames from earlier in the
    /// stream remain valid.
    #[error("unexpected end of stream: {0}")]
    TruncatedInput(&'static str),

    /// The expected frame sync code was not present.
    #[error("bad sync code: {0}")]
    BadSyncCode(&'static str),

    /// A subframe header used a reserved bit pattern.
    #[error("bad subframe header: {0}")]
    BadSubframeHeader(&'static str),

    /// The residual used an unsupported coding method, or its partitioning
    /// is incompatible with the frame's block size.
    #[error("bad residual: {0}")]
    BadResidual(&'static str),

    /// A seek could not complete.
    ///
    /// Non-terminal: the reader's cursor is left either at its pre-seek
    /// position or at the start of the stream.
    #[error("seek failed: {0}")]
    Seek(&'static str),

    /// A feature the stream requires is not implemented by this decoder.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// The underlying byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// A terse tag identifying the error kind, independent of its message.
    ///
    /// Intended for callers that want to branch on the kind of failure
    /// without matching on the full enum (e.g. the decoder's `last_error`
    /// query described for embedders that are not themselves Rust).
    pub fn kind(&self) -> &'static str {
        match *self {
            Error::NotAFlacStream(_) => "not_a_flac_stream",
            Error::BadMetadata(_) => "bad_metadata",
            Error::TruncatedInput(_) => "truncated_input",
            Error::BadSyncCode(_) => "bad_sync_code",
            Error::BadSubframeHeader(_) => "bad_subframe_header",
            Error::BadResidual(_) => "bad_residual",
            Error::Seek(_) => "seek_failed",
            Error::Unsupported(_) => "unsupported",
            Error::Io(_) => "io",
        }
    }

    /// Whether this error is recoverable: the reader remains usable after it.
    pub fn is_recoverable(&self) -> bool {
        matches!(*self, Error::Seek(_))
    }
}

/// Either `T` on success, or an [`Error`] on failure.
pub type Result<T> = std::result::Result<T, Error>;
