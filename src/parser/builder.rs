//! Builder for configuring and constructing parsers.
//!
//! # Examples
//!
//! ```no_run
//! use std::fs::File;
//! use mp3parse::{Mp3Parser, ReadSeekPipe};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = File::open("radio.mp3")?;
//!
//!     let mut stream = Mp3Parser::builder()
//!         .with_pipe(ReadSeekPipe::new(file, None))
//!         .with_meta_interval(16_000) // ShoutCast titles every 16000 bytes
//!         .with_read_size(1024)
//!         .build_stream()?;
//!
//!     let mut buf = vec![0; 1024];
//!     let unit = stream.next_work_unit(&mut buf)?;
//!     println!("{unit:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Settings
//!
//! - `streaming` - The source is a live stream rather than a local file
//! - `meta_interval` - ShoutCast metadata interval in bytes
//! - `read_size` - Bytes handed out per work unit

use std::io;
use std::sync::Arc;

use crate::constants::DEFAULT_READ_SIZE;
use crate::pipe::ContentPipe;
use crate::stream::Mp3Stream;

use super::{Mp3Parser, ParserError};

/// Parser configuration settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Whether the source is a live stream.
    /// Streams have no usable end, so the scan for the last frame is
    /// skipped and caching hints are never sent to the pipe.
    pub(crate) streaming: bool,

    /// ShoutCast metadata interval in bytes, zero when the stream carries
    /// no ICY metadata.
    pub(crate) meta_interval: u32,

    /// Bytes handed out per work unit by [`Mp3Stream`].
    pub(crate) read_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            streaming: false,
            meta_interval: 0,
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

impl Settings {
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn meta_interval(&self) -> u32 {
        self.meta_interval
    }

    pub fn read_size(&self) -> usize {
        self.read_size
    }
}

/// Builder for configuring and creating a parser.
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use mp3parse::parser::ParserBuilder;
///
/// let parser = ParserBuilder::new()
///     .with_pipe(Cursor::new(Vec::<u8>::new()))
///     .with_read_size(512)
///     .build()
///     .unwrap();
/// assert_eq!(parser.settings().read_size(), 512);
/// ```
#[derive(Clone, Debug)]
pub struct ParserBuilder<P> {
    /// The content pipe to parse.
    pipe: Option<P>,
    /// Configuration settings for the parser.
    settings: Settings,
}

impl<P> Default for ParserBuilder<P> {
    fn default() -> Self {
        Self {
            pipe: None,
            settings: Settings::default(),
        }
    }
}

impl<P: ContentPipe> ParserBuilder<P> {
    /// Creates a new parser builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the content pipe to parse.
    pub fn with_pipe(mut self, pipe: P) -> Self {
        self.pipe = Some(pipe);
        self
    }

    /// Marks the source as a live stream.
    ///
    /// Streaming sources skip the search for the last frame at the end of
    /// the data, and a stream opened with
    /// [`build_stream`](Self::build_stream) tolerates a failed parse, since
    /// a live stream may start in the middle of garbage.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.settings.streaming = streaming;
        self
    }

    /// Sets the ShoutCast metadata interval.
    ///
    /// A server that honours `Icy-MetaData: 1` inserts a metadata block
    /// after every `interval` bytes of audio. The block is stripped from
    /// the audio and a new `StreamTitle` is reported as
    /// [`WorkUnit::Metadata`](crate::WorkUnit::Metadata).
    ///
    /// A non-zero interval implies [`with_streaming(true)`](Self::with_streaming).
    pub fn with_meta_interval(mut self, interval: u32) -> Self {
        self.settings.meta_interval = interval;
        if interval > 0 {
            self.settings.streaming = true;
        }
        self
    }

    /// Sets how many bytes each work unit carries. Defaults to 2048.
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.settings.read_size = read_size.max(1);
        self
    }

    /// Creates the parser without parsing the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::Io`] if no content pipe was provided.
    pub fn build(self) -> Result<Mp3Parser<P>, ParserError> {
        let pipe = self.pipe.ok_or_else(|| {
            ParserError::Io(Arc::new(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no content pipe was provided",
            )))
        })?;
        Ok(Mp3Parser::with_settings(pipe, self.settings))
    }

    /// Creates the parser, parses the stream and wraps it for reading work
    /// units.
    pub fn build_stream(self) -> Result<Mp3Stream<P>, ParserError> {
        Mp3Stream::from_parser(self.build()?)
    }
}
