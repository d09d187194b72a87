//! A streaming, seekable decoder for the Free Lossless Audio Codec, reading
//! either native FLAC framing or a FLAC-in-Ogg logical stream from anything
//! that implements [`std::io::Read`] (and, for seeking, [`std::io::Seek`]).
//!
//! ```no_run
//! # fn main() -> flacon::error::Result<()> {
//! let mut reader = flacon::FlacReader::open("example.flac")?;
//! println!("{} Hz, {} channel(s)", reader.streaminfo().sample_rate, reader.streaminfo().channels);
//!
//! let mut samples = Vec::new();
//! reader.read_s16(reader.streaminfo().max_block_size as usize, &mut samples)?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{self, BufReader, Chain, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

pub mod bitstream;
pub mod channels;
pub mod crc;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod ogg;
pub mod output;
pub mod residual;
pub mod seek;
pub mod source;
pub mod subframe;

use bitstream::BitReader;
use error::{Error, Result};
use frame::FrameReader;
use metadata::{MetadataBlockDescriptor, SeekTable, StreamInfo};
use output::{to_f32, to_s16, to_s32};
use seek::SeekStrategies;

/// Whether a mismatched frame-header CRC-8 or frame-footer CRC-16 is a hard
/// error or merely logged.
///
/// The wire format carries both checksums regardless of this setting; this
/// only controls what the decoder does with a mismatch once computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Log a mismatch via the `log` crate and keep the decoded samples.
    Ignore,
    /// Treat a mismatch as a terminal [`Error::BadSyncCode`].
    Validate,
}

impl Default for ChecksumPolicy {
    fn default() -> ChecksumPolicy {
        ChecksumPolicy::Ignore
    }
}

const NATIVE_SIGNATURE: [u8; 4] = *b"fLaC";
const OGG_SIGNATURE: [u8; 4] = *b"OggS";

/// The byte stream a [`FlacReader`] actually decodes, after signature
/// detection has stripped away the container-specific framing.
///
/// A tagged owner handle rather than a trait object: the two variants need
/// different inner types (a plain reader for native FLAC, an Ogg page
/// demultiplexer for FLAC-in-Ogg) and `match`-dispatching `read`/`seek` over
/// them avoids both dynamic dispatch and an enum-free generic parameter that
/// would have to be chosen at the call site.
enum Transport<R: Read> {
    Native(R),
    Ogg(ogg::OggFlacSource<Chain<Cursor<Vec<u8>>, R>>),
}

impl<R: Read> Read for Transport<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Native(r) => r.read(buf),
            Transport::Ogg(o) => o.read(buf),
        }
    }
}

impl<R: Read + Seek> Seek for Transport<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Transport::Native(r) => r.seek(pos),
            Transport::Ogg(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "seeking is not supported on a FLAC-in-Ogg source",
            )),
        }
    }
}

/// Returns the detected transport along with whether it is the Ogg variant
/// (and therefore still has a `fLaC` marker waiting to be consumed from the
/// bit stream, unlike the native case which already consumed it here).
fn detect_transport<R: Read>(mut source: R) -> Result<(Transport<R>, bool)> {
    let mut sig = [0u8; 4];
    source.read_exact(&mut sig).map_err(Error::Io)?;

    if sig == NATIVE_SIGNATURE {
        Ok((Transport::Native(source), false))
    } else if sig == OGG_SIGNATURE {
        let chained = Cursor::new(sig.to_vec()).chain(source);
        Ok((Transport::Ogg(ogg::OggFlacSource::new(chained)?), true))
    } else {
        Err(Error::NotAFlacStream("missing fLaC or OggS signature"))
    }
}

/// A decoded block of audio still buffered in a [`FlacReader`], interleaved
/// by PCM frame (`[ch0, ch1, ..., ch0, ch1, ...]`) and not yet consumed.
struct PendingBlock {
    samples: Vec<i64>,
    block_size: u32,
    channels: u8,
    consumed: u32,
}

/// A FLAC decoder over a byte source `R`.
///
/// Construct one with [`FlacReader::open`] (for a file path) or
/// [`FlacReader::new`] (for any [`Read`] source, e.g. an in-memory buffer).
/// Seeking ([`FlacReader::seek`]) additionally requires `R: Seek`.
pub struct FlacReader<R: Read> {
    reader: BitReader<Transport<R>>,
    streaminfo: StreamInfo,
    blocks: Vec<MetadataBlockDescriptor>,
    seektable: Option<SeekTable>,
    first_frame_offset: u64,
    frame_reader: FrameReader,
    checksum_policy: ChecksumPolicy,
    cursor: u64,
    pending: Option<PendingBlock>,
    failed: bool,
    last_error: Option<Error>,
}

impl<R: Read> FlacReader<R> {
    /// Wraps `source`, reading the signature and every metadata block up to
    /// and including the first audio frame's header position.
    pub fn new(source: R) -> Result<FlacReader<R>> {
        Self::with_checksum_policy(source, ChecksumPolicy::default())
    }

    pub fn with_checksum_policy(source: R, checksum_policy: ChecksumPolicy) -> Result<FlacReader<R>> {
        let (transport, is_ogg) = detect_transport(source)?;
        let mut reader = BitReader::new(transport);

        if is_ogg {
            // The Ogg demultiplexer already stripped everything up to and
            // including the mapping header; what follows is the familiar
            // `fLaC` signature plus STREAMINFO, exactly like a native file.
            let marker = reader.read_uint(32)?;
            if marker != u32::from_be_bytes(NATIVE_SIGNATURE) {
                return Err(Error::NotAFlacStream("missing fLaC marker after Ogg mapping header"));
            }
        }

        let summary = metadata::read_metadata(&mut reader)?;

        let frame_reader = FrameReader::new(summary.streaminfo.sample_rate, summary.streaminfo.bits_per_sample, checksum_policy);

        Ok(FlacReader {
            reader,
            streaminfo: summary.streaminfo,
            blocks: summary.blocks,
            seektable: summary.seektable,
            first_frame_offset: summary.first_frame_offset,
            frame_reader,
            checksum_policy,
            cursor: 0,
            pending: None,
            failed: false,
            last_error: None,
        })
    }

    /// The stream's `STREAMINFO` block.
    pub fn streaminfo(&self) -> &StreamInfo {
        &self.streaminfo
    }

    /// Location and type of every metadata block after `STREAMINFO`.
    pub fn metadata_blocks(&self) -> &[MetadataBlockDescriptor] {
        &self.blocks
    }

    /// The most recent error, if any read or seek has failed.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// The 0-based PCM-frame cursor: the index of the next sample `read_*`
    /// will produce.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Decodes one more frame into `self.pending`. Returns `false` at a
    /// clean end of stream, or propagates a harder error.
    fn advance_frame(&mut self) -> Result<bool> {
        match self.frame_reader.read_next(&mut self.reader) {
            Ok(block) => {
                let bs = block.len();
                let channels = block.channels();
                let mut samples = Vec::with_capacity(bs as usize * channels as usize);
                for i in 0..bs as usize {
                    for ch in 0..channels {
                        samples.push(block.channel(ch)[i]);
                    }
                }
                self.pending = Some(PendingBlock { samples, block_size: bs, channels, consumed: 0 });
                Ok(true)
            }
            Err(Error::TruncatedInput(msg)) => {
                self.last_error = Some(Error::TruncatedInput(msg));
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Ensures a block with unconsumed samples is available, fetching the
    /// next frame if the current one is exhausted. Returns `false` at EOF.
    fn ensure_pending(&mut self) -> Result<bool> {
        loop {
            if let Some(p) = &self.pending {
                if p.consumed < p.block_size {
                    return Ok(true);
                }
            }
            if !self.advance_frame()? {
                return Ok(false);
            }
        }
    }

    /// Core read loop shared by the three output formats and the discard
    /// path: pulls up to `frames` PCM frames, calling `emit` once per
    /// sample with its channel-interleaved index and native-depth value.
    fn read_frames_with<F: FnMut(i64)>(&mut self, frames: usize, mut emit: F) -> Result<usize> {
        if self.failed {
            return Ok(0);
        }

        let mut produced = 0usize;
        while produced < frames {
            match self.ensure_pending() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    self.last_error = Some(e);
                    self.failed = true;
                    break;
                }
            }

            let p = self.pending.as_mut().expect("ensure_pending guarantees a pending block");
            let available = (p.block_size - p.consumed) as usize;
            let take = available.min(frames - produced);
            let start = p.consumed as usize * p.channels as usize;
            let end = start + take * p.channels as usize;
            for &s in &p.samples[start..end] {
                emit(s);
            }
            p.consumed += take as u32;
            produced += take;
            self.cursor += take as u64;
        }

        Ok(produced)
    }

    /// Reads up to `frames` PCM frames as signed 16-bit samples, appending
    /// them interleaved to `out`. Returns the number of PCM frames actually
    /// produced, which is less than `frames` only at end of stream or after
    /// an error (see [`FlacReader::last_error`]).
    pub fn read_s16(&mut self, frames: usize, out: &mut Vec<i16>) -> Result<usize> {
        let bps = self.streaminfo.bits_per_sample;
        self.read_frames_with(frames, |s| out.push(to_s16(s, bps)))
    }

    /// As [`FlacReader::read_s16`], but left-justified into the full 32-bit
    /// range rather than truncated to 16 bits.
    pub fn read_s32(&mut self, frames: usize, out: &mut Vec<i32>) -> Result<usize> {
        let bps = self.streaminfo.bits_per_sample;
        self.read_frames_with(frames, |s| out.push(to_s32(s, bps)))
    }

    /// As [`FlacReader::read_s32`], scaled to a float in `[-1.0, 1.0)`.
    pub fn read_f32(&mut self, frames: usize, out: &mut Vec<f32>) -> Result<usize> {
        let bps = self.streaminfo.bits_per_sample;
        self.read_frames_with(frames, |s| out.push(to_f32(s, bps)))
    }

    /// Decodes and discards up to `frames` PCM frames without converting
    /// them to an output format. Used by the brute-force seek path to
    /// advance the cursor without a second "decode but don't keep" loop.
    pub fn skip(&mut self, frames: usize) -> Result<usize> {
        self.read_frames_with(frames, |_| {})
    }

    /// Consumes this reader, returning the underlying byte source.
    ///
    /// Only available for a native (non-Ogg) container, since the Ogg
    /// demultiplexer owns a page reader with no reverse adapter back to the
    /// caller's original source.
    pub fn into_inner(self) -> std::result::Result<R, Error> {
        match self.reader.into_inner() {
            Transport::Native(r) => Ok(r),
            Transport::Ogg(_) => Err(Error::Unsupported("cannot recover the inner reader of a FLAC-in-Ogg source")),
        }
    }
}

impl<R: Read + Seek> FlacReader<R> {
    /// Seeks so that the next `read_*` call's first sample is PCM-frame
    /// index `target`, trying the seek table, then binary search, then
    /// brute force, in that order, per `strategies`.
    ///
    /// On failure the cursor is left either where it was before the call or
    /// at the start of the stream; a subsequent read remains legal.
    pub fn seek(&mut self, target: u64, strategies: SeekStrategies) -> Result<()> {
        if let Some(total) = self.streaminfo.samples {
            if target >= total {
                return Err(Error::Seek("target sample is beyond the end of the stream"));
            }
        }

        let saved_cursor = self.cursor;

        // Each strategy falls through to the next on failure, whether it
        // declined to run (`None`) or ran and hit a recoverable error
        // (`Some(Err(..))`, e.g. an I/O failure bisecting the stream) --
        // only a genuine landing short-circuits the chain.
        let landing = self
            .try_seek_table(target, strategies)
            .filter(|r| r.is_ok())
            .or_else(|| self.try_binary_search(target, strategies).filter(|r| r.is_ok()))
            .or_else(|| self.try_brute_force(target, strategies));

        match landing {
            Some(Ok(())) => Ok(()),
            _ => {
                self.cursor = saved_cursor;
                self.reset_to_first_frame().ok();
                Err(Error::Seek("no seek strategy located the target sample"))
            }
        }
    }

    fn reset_to_first_frame(&mut self) -> io::Result<()> {
        self.reader.seek_to_byte(self.first_frame_offset)?;
        self.pending = None;
        self.cursor = 0;
        self.failed = false;
        Ok(())
    }

    fn land_and_settle(&mut self, frame_start: u64, frame_first_sample: u64, target: u64) -> Result<()> {
        self.reader.seek_to_byte(frame_start).map_err(Error::Io)?;
        self.pending = None;
        self.cursor = frame_first_sample;
        self.failed = false;
        let skip = (target - frame_first_sample) as usize;
        self.skip(skip)?;
        Ok(())
    }

    fn try_seek_table(&mut self, target: u64, strategies: SeekStrategies) -> Option<Result<()>> {
        if !strategies.seek_table {
            return None;
        }
        let point = *self.seektable.as_ref()?.floor(target)?;
        let frame_start = self.first_frame_offset + point.offset;
        let frame_first_sample = point.sample;
        Some(self.land_and_settle(frame_start, frame_first_sample, target))
    }

    /// Bisects the byte range between the first frame and end of stream,
    /// at each midpoint scanning forward for the next frame sync and
    /// narrowing based on that frame's first sample. Not guaranteed to find
    /// the tightest-possible bracketing frame within the iteration budget,
    /// but always converges on *some* frame at or before `target`, which
    /// [`FlacReader::land_and_settle`] then walks forward from exactly.
    fn try_binary_search(&mut self, target: u64, strategies: SeekStrategies) -> Option<Result<()>> {
        if !strategies.binary_search {
            return None;
        }
        self.streaminfo.samples?;
        let end = self.reader.inner_mut().seek(SeekFrom::End(0)).ok()?;

        let mut lo = self.first_frame_offset;
        let mut hi = end;
        let mut best: Option<seek::Landing> = None;

        for _ in 0..48 {
            if lo >= hi {
                break;
            }
            let mid = lo + (hi - lo) / 2;
            let scanned = seek::scan_for_frame(
                self.reader.inner_mut(),
                mid,
                end,
                self.streaminfo.sample_rate,
                self.streaminfo.bits_per_sample,
            );
            let landing = match scanned {
                Ok(Some(landing)) => landing,
                _ => break,
            };

            if landing.frame_first_sample <= target {
                let next_lo = landing.frame_start + 1;
                best = Some(landing);
                lo = next_lo;
            } else {
                hi = landing.frame_start;
            }
        }

        let landing = best?;
        Some(self.land_and_settle(landing.frame_start, landing.frame_first_sample, target))
    }

    /// Rewinds to the first frame and decodes forward one frame at a time
    /// until `target` samples have been skipped, reusing [`FlacReader::skip`]
    /// rather than a second "decode but discard" loop.
    fn try_brute_force(&mut self, target: u64, strategies: SeekStrategies) -> Option<Result<()>> {
        if !strategies.brute_force {
            return None;
        }
        Some((|| {
            self.reset_to_first_frame().map_err(Error::Io)?;
            self.skip(target as usize)?;
            Ok(())
        })())
    }
}

impl FlacReader<BufReader<File>> {
    /// Opens a file at `path` and reads its header and metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FlacReader<BufReader<File>>> {
        let file = File::open(path).map_err(Error::Io)?;
        FlacReader::new(BufReader::new(file))
    }
}
