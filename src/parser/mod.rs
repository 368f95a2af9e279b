//! The MP3 parser: stream parameters, tags and time based seeking.
//!
//! [`Mp3Parser::parse`] walks the start of a stream once. It reads the ID3
//! tags, skips any stacked ID3v2 blocks, synchronises on the first audio
//! frames and either takes the stream parameters from a Xing/VBRI header or
//! votes them out of the first frames. Afterwards [`Mp3Parser::seek_to_time`]
//! maps playback positions to byte offsets.
//!
//! # Example
//!
//! ```no_run
//! use mp3parse::Mp3Parser;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut parser = Mp3Parser::open("song.mp3")?;
//!     parser.parse()?;
//!
//!     let info = parser.track_info();
//!     println!("{} Hz, {} bit/s, {} ms", info.sample_rate, info.bit_rate, info.total_time_ms);
//!
//!     let mut ms = 30_000;
//!     parser.seek_to_time(&mut ms)?;
//!     println!("now at {ms} ms, byte {}", parser.current_offset());
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::common::{assert_error_traits, log_debug, BitRate, ChannelCount, SampleRate};
use crate::constants::BITS_PER_SAMPLE;
use crate::frame::{Layer, Version};
use crate::metadata::Metadata;
use crate::pipe::{ContentPipe, ReadSeekPipe};
use crate::vbr::{VbrHeader, VbrType};

mod builder;
mod seek;
mod track;

pub use builder::{ParserBuilder, Settings};

/// Errors that can happen while parsing or reading an MP3 stream.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ParserError {
    /// The content pipe failed.
    #[error("Failed to read from the content pipe")]
    Io(#[source] Arc<io::Error>),

    /// There is no more data to read.
    #[error("End of stream")]
    EndOfStream,

    /// No usable MPEG audio frames were found.
    #[error("The stream is corrupted or not an MP3 stream")]
    CorruptedStream,

    /// A metadata frame could not be decoded.
    #[error("Failed to get data from a metadata frame")]
    FailedToGetData,

    /// The ID3v2 tag has a major version other than 2, 3 or 4.
    #[error("Unsupported ID3v2 tag version 2.{major}")]
    UnsupportedTag { major: u8 },

    /// The caller's buffer is too small for the requested data.
    #[error("Buffer too small, {required} bytes are required")]
    InsufficientBufferSize { required: usize },

    /// A seek failed and will be retried on the next read.
    #[error("Seek deferred to the next read")]
    DeferredSeek,
}
assert_error_traits!(ParserError);

impl From<io::Error> for ParserError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => ParserError::EndOfStream,
            _ => ParserError::Io(Arc::new(err)),
        }
    }
}

/// Stream parameters established by [`Mp3Parser::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    /// Bits per second. For streams without a VBR header whose bit rate
    /// keeps changing this is the mean over all frames.
    pub bit_rate: BitRate,
    pub sample_rate: SampleRate,
    /// Duration in milliseconds.
    pub total_time_ms: u64,
    pub channels: ChannelCount,
    /// Bits per decoded sample, always 16.
    pub sample_size: u16,
    /// Byte offset of the first audio frame.
    pub data_offset: u64,
    pub layer: Layer,
    pub version: Version,
    pub vbr_type: VbrType,
    pub padded_frames: u32,
    pub unpadded_frames: u32,
    /// Start of the most recently decoded frame.
    pub frame_start: u64,
    /// Size of the most recently decoded frame.
    pub frame_size: u32,
}

impl Default for TrackInfo {
    fn default() -> Self {
        Self {
            bit_rate: 128_000,
            sample_rate: 44_100,
            total_time_ms: 0,
            channels: 2,
            sample_size: BITS_PER_SAMPLE,
            data_offset: 0,
            layer: Layer::Layer3,
            version: Version::Mpeg1,
            vbr_type: VbrType::None,
            padded_frames: 0,
            unpadded_frames: 0,
            frame_start: 0,
            frame_size: 0,
        }
    }
}

impl TrackInfo {
    /// Clears the fields a caller uses to tell a playable stream from a
    /// broken one.
    fn invalidate(&mut self) {
        self.bit_rate = 0;
        self.sample_rate = 0;
        self.total_time_ms = 0;
        self.layer = Layer::Unknown;
        self.channels = 0;
    }

    /// Whether any field needed for playback is unset.
    fn is_incomplete(&self) -> bool {
        self.total_time_ms == 0
            || self.layer == Layer::Unknown
            || self.sample_rate == 0
            || self.bit_rate == 0
            || self.channels == 0
    }
}

/// Parser over a single MP3 stream read through a [`ContentPipe`].
pub struct Mp3Parser<P: ContentPipe> {
    pipe: P,
    settings: Settings,
    file_size: u64,
    track: TrackInfo,
    vbr: VbrHeader,
    metadata: Metadata,
    /// End of the audio data, trailing ID3v1 tag excluded.
    last_frame_boundary: u64,
    curr_file_offset: u64,
    /// Frames to drop after a Xing seek to land on the exact time.
    frame_skip: i32,
    /// An ID3v1 trailer was found.
    tag_detected: bool,
}

impl Mp3Parser<ReadSeekPipe<BufReader<File>>> {
    /// Opens the file at `path`. The stream is not parsed yet, call
    /// [`parse`](Self::parse) for that.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParserError> {
        let pipe = ReadSeekPipe::open(path).map_err(Arc::new).map_err(ParserError::Io)?;
        Ok(Self::new(pipe))
    }
}

impl<P: ContentPipe> Mp3Parser<P> {
    /// Creates a parser for a local, seekable stream with default settings.
    pub fn new(pipe: P) -> Self {
        Self::with_settings(pipe, Settings::default())
    }

    /// Creates a new parser builder.
    ///
    /// # Examples
    /// ```
    /// use std::io::Cursor;
    /// use mp3parse::Mp3Parser;
    ///
    /// let parser = Mp3Parser::builder()
    ///     .with_pipe(Cursor::new(vec![0u8; 16]))
    ///     .with_streaming(true)
    ///     .build()
    ///     .unwrap();
    /// assert!(parser.is_streaming());
    /// ```
    pub fn builder() -> ParserBuilder<P> {
        ParserBuilder::new()
    }

    pub(crate) fn with_settings(pipe: P, settings: Settings) -> Self {
        Self {
            pipe,
            settings,
            file_size: 0,
            track: TrackInfo::default(),
            vbr: VbrHeader::None,
            metadata: Metadata::default(),
            last_frame_boundary: 0,
            curr_file_offset: 0,
            frame_skip: 0,
            tag_detected: false,
        }
    }

    /// Reads tags and stream parameters, then positions the pipe at the
    /// first audio frame.
    ///
    /// Missing or broken tags never fail the parse. When no audio frames
    /// can be found, or the frames found disagree too much to be trusted,
    /// this returns [`ParserError::CorruptedStream`] and the track info has
    /// its rate, time, layer and channel fields zeroed.
    pub fn parse(&mut self) -> Result<(), ParserError> {
        self.read_track_info()?;
        if let Err(err) = self.read_vbr_header() {
            log_debug!("failed to re-read the vbr header: {err}");
        }
        let mut ms = 0;
        if let Err(err) = self.seek_to_time(&mut ms) {
            log_debug!("initial seek failed: {err}");
        }
        Ok(())
    }

    /// Second look at the first frame once the data offset is known.
    ///
    /// Re-reads the VBR header at the data offset and repairs the Xing
    /// table of contents so that seeking never moves backwards.
    fn read_vbr_header(&mut self) -> Result<(), ParserError> {
        let frame = self.read_vbr_frame(self.track.data_offset)?;
        self.vbr = match VbrHeader::detect(&frame, self.track.sample_rate) {
            VbrHeader::Xing(mut xing) => {
                xing.repair_toc();
                VbrHeader::Xing(xing)
            }
            other => other,
        };
        self.pipe.rewind()?;
        Ok(())
    }

    pub fn track_info(&self) -> &TrackInfo {
        &self.track
    }

    /// The VBR header found at the start of the audio data.
    pub fn vbr_header(&self) -> &VbrHeader {
        &self.vbr
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Total size of the stream in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// An MP3 stream always holds one track.
    pub fn number_of_tracks(&self) -> u32 {
        1
    }

    /// Byte offset where the audio data ends. Zero until a non-streaming
    /// parse has located it.
    pub fn last_frame_boundary(&self) -> u64 {
        self.last_frame_boundary
    }

    /// Byte offset the pipe was last positioned at by a seek, moved on by
    /// the audio read since.
    pub fn current_offset(&self) -> u64 {
        self.curr_file_offset
    }

    pub(crate) fn advance_offset(&mut self, len: u64) {
        self.curr_file_offset += len;
    }

    /// Whole frames the caller should drop after the last seek to reach the
    /// requested time exactly.
    pub fn frame_skip(&self) -> i32 {
        self.frame_skip
    }

    /// Whether an ID3v1 trailer was found.
    pub fn has_id3v1(&self) -> bool {
        self.tag_detected
    }

    pub fn is_streaming(&self) -> bool {
        self.settings.streaming
    }

    /// ShoutCast metadata interval, zero when not in use.
    pub fn meta_interval(&self) -> u32 {
        self.settings.meta_interval
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn pipe_mut(&mut self) -> &mut P {
        &mut self.pipe
    }

    /// Unwraps the parser, returning the content pipe.
    pub fn into_inner(self) -> P {
        self.pipe
    }
}
