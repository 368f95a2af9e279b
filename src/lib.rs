//! MPEG audio stream parsing.
//!
//! This crate reads MPEG-1, MPEG-2 and MPEG-2.5 audio streams (Layer I, II
//! and III, in practice mostly MP3) without decoding them. It finds out what
//! a player needs to know before the first sample is decoded:
//!
//! - the stream parameters: bit rate, sample rate, channels, duration,
//! - the tags: ID3v2 at the start, ID3v1 at the end, ShoutCast titles in
//!   live streams, cover art,
//! - where to seek to for a given time, using Xing or VBRI seek tables when
//!   the encoder wrote one,
//! - where the audio data ends, so trailing tags never reach a decoder.
//!
//! [`Mp3Parser`] holds the parsing logic. [`Mp3Stream`] wraps a parsed
//! stream and hands its audio data out in [`WorkUnit`]s, each stamped with
//! its presentation time after a seek.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use mp3parse::{MetadataKind, Mp3Stream, WorkUnit};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut stream = Mp3Stream::open("song.mp3")?;
//!
//!     let info = stream.stream_info();
//!     println!("{} Hz, {} channels, {:?}", info.sample_rate, info.channels, info.total_time);
//!     if let Some(title) = stream.metadata_entry(MetadataKind::Title) {
//!         println!("title: {:?}", title.to_string_lossy());
//!     }
//!
//!     stream.set_position(Duration::from_secs(30))?;
//!     let mut buf = vec![0; stream.buffer_requirements().buffer_size];
//!     while let Ok(unit) = stream.next_work_unit(&mut buf) {
//!         if let WorkUnit::Data { len, timestamp, .. } = unit {
//!             // hand `buf[..len]` to a decoder
//!             println!("{len} bytes at {timestamp:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Content pipes
//!
//! Parsers read through a [`ContentPipe`]: a [`Read`](std::io::Read) +
//! [`Seek`](std::io::Seek) source that knows its length. In-memory buffers
//! work as they are through [`std::io::Cursor`], anything else can be
//! wrapped in a [`ReadSeekPipe`].
//!
//! # Optional features
//!
//! - `tracing` (default): log the parser's decisions through the
//!   [`tracing`](https://docs.rs/tracing) crate.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;
mod utils;

pub mod constants;
pub mod frame;
pub mod metadata;
pub mod parser;
pub mod pipe;
pub mod stream;
pub mod vbr;

pub use common::{BitRate, ChannelCount, SampleRate};
pub use frame::{ChannelMode, FrameHeader, HeaderError, Layer, Version};
pub use metadata::{Metadata, MetadataEntry, MetadataKind, TextEncoding};
pub use parser::{Mp3Parser, ParserBuilder, ParserError, Settings, TrackInfo};
pub use pipe::{ContentPipe, ReadSeekPipe};
pub use stream::{BufferFlags, BufferRequirements, Mp3Stream, StreamInfo, StreamType, WorkUnit};
pub use vbr::{VbrHeader, VbrType, VbriHeader, XingHeader};
