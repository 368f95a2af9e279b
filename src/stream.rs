//! Hands out a parsed MP3 stream as timestamped work units.
//!
//! [`Mp3Stream`] sits between a parser and a decoder. It reads the audio
//! data in fixed size pieces, stamps the first piece after every seek with
//! its presentation time, holds back the trailing tag of local files and,
//! for ShoutCast streams, strips the ICY metadata blocks out of the audio.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use crate::common::{log_debug, log_trace, BitRate, ChannelCount, SampleRate};
use crate::constants::{
    BITS_PER_SAMPLE, BUFFER_ALIGNMENT, BUFFER_SIZE, MAX_BUFFERS, MIN_BUFFERS, NORMAL_RATE,
};
use crate::frame::Layer;
use crate::metadata::{MetadataEntry, MetadataKind, TextEncoding};
use crate::parser::{Mp3Parser, ParserError};
use crate::pipe::{ContentPipe, ReadSeekPipe};

/// Timestamps count in units of 100 ns.
const UNITS_PER_MS: u64 = 10_000;
const UNITS_PER_SECOND: u64 = 10_000_000;

const STREAM_TITLE: &[u8] = b"StreamTitle=";

/// Kind of elementary stream, as a decoder would need to know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// MPEG audio Layer I or II.
    Mp2,
    /// MPEG audio Layer III.
    Mp3,
}

/// Properties of the single audio stream in an MP3 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub stream_type: StreamType,
    pub total_time: Duration,
    pub sample_rate: SampleRate,
    pub bit_rate: BitRate,
    pub channels: ChannelCount,
    pub bits_per_sample: u16,
}

/// Buffers a consumer should allocate for work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRequirements {
    pub min_buffers: u32,
    pub max_buffers: u32,
    /// Size of each buffer in bytes.
    pub buffer_size: usize,
    /// Required alignment of each buffer in bytes.
    pub alignment: usize,
}

/// Flags attached to a data work unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferFlags {
    /// The unit reaches the end of the audio data and was cut short there.
    pub gapless: bool,
    /// First unit of a local file: the decoder may trim silence.
    pub enable_gapless: bool,
}

/// One step of reading a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkUnit {
    /// `len` bytes of audio were written to the caller's buffer.
    Data {
        len: usize,
        /// Presentation time of the first byte. Only set for the first unit
        /// after a seek.
        timestamp: Option<Duration>,
        flags: BufferFlags,
    },
    /// A new ShoutCast title is available, see
    /// [`Metadata::shoutcast_title`](crate::Metadata::shoutcast_title).
    /// No audio was read.
    Metadata,
}

/// A parsed MP3 stream that hands out its audio data in work units.
pub struct Mp3Stream<P: ContentPipe> {
    parser: Mp3Parser<P>,
    /// Seek time, plus the time of the units read since, in 100 ns.
    parser_ts: u64,
    /// Position reported by [`position`](Self::position), in 100 ns.
    position: u64,
    update_timestamp: bool,
    eof: bool,
    /// Target of a failed seek in milliseconds, retried on the next read.
    deferred_seek: Option<u32>,
    first_unit: bool,
    rate: i32,
    /// Audio bytes read since the last ICY metadata block.
    sc_offset: u64,
}

impl Mp3Stream<ReadSeekPipe<BufReader<File>>> {
    /// Opens and parses the local file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParserError> {
        Self::from_parser(Mp3Parser::open(path)?)
    }
}

impl<P: ContentPipe> Mp3Stream<P> {
    /// Parses the stream behind `parser`.
    ///
    /// A local file that fails to parse is an error. A live stream is
    /// handed out anyway, with whatever the parser managed to find.
    pub fn from_parser(mut parser: Mp3Parser<P>) -> Result<Self, ParserError> {
        if let Err(err) = parser.parse() {
            if !parser.is_streaming() {
                return Err(err);
            }
            log_debug!("streaming source failed to parse, continuing: {err}");
        }

        Ok(Self {
            parser,
            parser_ts: 0,
            position: 0,
            update_timestamp: false,
            eof: false,
            deferred_seek: None,
            first_unit: true,
            rate: NORMAL_RATE,
            sc_offset: 0,
        })
    }

    pub fn parser(&self) -> &Mp3Parser<P> {
        &self.parser
    }

    /// An MP3 file always holds a single stream.
    pub fn number_of_streams(&self) -> usize {
        1
    }

    pub fn stream_info(&self) -> StreamInfo {
        let track = self.parser.track_info();
        StreamInfo {
            stream_type: match track.layer {
                Layer::Layer1 | Layer::Layer2 => StreamType::Mp2,
                Layer::Layer3 | Layer::Unknown => StreamType::Mp3,
            },
            total_time: Duration::from_millis(track.total_time_ms),
            sample_rate: track.sample_rate,
            bit_rate: track.bit_rate,
            channels: track.channels,
            bits_per_sample: BITS_PER_SAMPLE,
        }
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_millis(self.parser.track_info().total_time_ms)
    }

    pub fn buffer_requirements(&self) -> BufferRequirements {
        BufferRequirements {
            min_buffers: MIN_BUFFERS,
            max_buffers: MAX_BUFFERS,
            buffer_size: BUFFER_SIZE,
            alignment: BUFFER_ALIGNMENT,
        }
    }

    /// Playback rate in thousandths, 1000 being normal speed.
    pub fn rate(&self) -> i32 {
        self.rate
    }

    /// Stores the playback rate. The stream itself reads at the same pace
    /// whatever the rate.
    pub fn set_rate(&mut self, rate: i32) {
        self.rate = rate;
    }

    /// Position of the last seek.
    pub fn position(&self) -> Duration {
        from_units(self.position)
    }

    /// Seeks to `position` and returns the position actually reached.
    ///
    /// Seeking past the end marks the stream as finished and reports the
    /// total time.
    ///
    /// # Errors
    ///
    /// If the pipe cannot seek, [`ParserError::DeferredSeek`] is returned
    /// and the seek is retried before the next work unit is read.
    pub fn set_position(&mut self, position: Duration) -> Result<Duration, ParserError> {
        self.eof = false;

        let requested = to_units(position);
        let total = self.parser.track_info().total_time_ms * UNITS_PER_MS;
        if requested > total {
            self.eof = true;
            self.position = total;
            return Ok(from_units(total));
        }

        let mut ms = u32::try_from(requested / UNITS_PER_MS).unwrap_or(u32::MAX);
        match self.parser.seek_to_time(&mut ms) {
            Ok(()) => {}
            Err(ParserError::EndOfStream) => self.eof = true,
            Err(err) => {
                log_debug!("seek to {ms} ms failed, deferring: {err}");
                self.deferred_seek = Some(ms);
                return Err(ParserError::DeferredSeek);
            }
        }

        let reached = u64::from(ms) * UNITS_PER_MS;
        self.parser_ts = reached;
        self.position = reached;
        self.update_timestamp = true;
        Ok(from_units(reached))
    }

    /// Reads the next piece of audio into `buf`.
    ///
    /// # Errors
    ///
    /// - [`ParserError::EndOfStream`] once all audio was handed out.
    /// - [`ParserError::InsufficientBufferSize`] if `buf` is shorter than
    ///   the configured read size.
    pub fn next_work_unit(&mut self, buf: &mut [u8]) -> Result<WorkUnit, ParserError> {
        if self.eof {
            return Err(ParserError::EndOfStream);
        }

        let meta_interval = u64::from(self.parser.meta_interval());
        let read_size = self.parser.settings().read_size();
        if buf.len() < read_size {
            return Err(ParserError::InsufficientBufferSize {
                required: read_size,
            });
        }

        let mut ask = read_size;
        if meta_interval > 0 {
            let left = meta_interval.saturating_sub(self.sc_offset);
            if left > 0 {
                ask = ask.min(left as usize);
            }
        }

        let bit_rate = u64::from(self.parser.track_info().bit_rate);
        let unit_time = (8 * ask as u64 * UNITS_PER_SECOND)
            .checked_div(bit_rate)
            .unwrap_or(0);
        self.parser_ts += unit_time;

        if let Some(mut ms) = self.deferred_seek.take() {
            if let Err(err) = self.parser.seek_to_time(&mut ms) {
                log_debug!("deferred seek to {ms} ms failed again: {err}");
            }
        }

        if meta_interval > 0 && self.sc_offset >= meta_interval {
            self.sc_offset = 0;
            if self.read_icy_metadata()? {
                return Ok(WorkUnit::Metadata);
            }
        }

        let mut flags = BufferFlags::default();
        if !self.parser.is_streaming() {
            if self.first_unit {
                flags.enable_gapless = true;
                self.first_unit = false;
            }
            let boundary = self.parser.last_frame_boundary();
            let offset = self.parser.current_offset();
            if boundary > 0 {
                if offset >= boundary {
                    self.eof = true;
                    return Err(ParserError::EndOfStream);
                }
                if offset + ask as u64 > boundary {
                    flags.gapless = true;
                    ask = (boundary - offset) as usize;
                }
            }
        }

        let len = read_up_to(self.parser.pipe_mut(), &mut buf[..ask])?;
        if len == 0 {
            self.eof = true;
            return Err(ParserError::EndOfStream);
        }
        if !self.parser.is_streaming() {
            self.parser.advance_offset(len as u64);
        }
        if meta_interval > 0 {
            self.sc_offset += len as u64;
        }

        let timestamp = if self.update_timestamp {
            self.update_timestamp = false;
            let stamp = self.parser_ts - unit_time;
            self.parser_ts = 0;
            Some(from_units(stamp))
        } else {
            None
        };
        log_trace!("work unit of {len} bytes, timestamp {timestamp:?}");

        Ok(WorkUnit::Data {
            len,
            timestamp,
            flags,
        })
    }

    /// Reads one ICY metadata block. Returns whether it carried a title.
    fn read_icy_metadata(&mut self) -> Result<bool, ParserError> {
        let pipe = self.parser.pipe_mut();
        let mut len = [0u8; 1];
        pipe.read_exact(&mut len)?;
        if len[0] == 0 {
            return Ok(false);
        }

        let mut block = vec![0u8; usize::from(len[0]) * 16];
        pipe.read_exact(&mut block)?;
        let Some(title) = stream_title(&block) else {
            log_debug!("icy metadata block without a stream title");
            return Ok(false);
        };

        log_debug!("new stream title: {}", String::from_utf8_lossy(title));
        let entry = MetadataEntry::new(title, TextEncoding::Utf8);
        self.parser.metadata_mut().set_shoutcast_title(entry);
        Ok(true)
    }

    /// The entry a metadata attribute request for `kind` reads. With ICY
    /// metadata in use the title is the current stream title.
    pub fn metadata_entry(&self, kind: MetadataKind) -> Option<&MetadataEntry> {
        let metadata = self.parser.metadata();
        if kind == MetadataKind::Title && self.parser.meta_interval() > 0 {
            metadata.shoutcast_title()
        } else {
            metadata.get(kind)
        }
    }

    /// Copies the entry for `kind` into `buf`, followed by a NUL terminator
    /// sized for its encoding.
    ///
    /// Returns the bytes written and the encoding, or `None` if there is no
    /// such entry.
    ///
    /// # Errors
    ///
    /// [`ParserError::InsufficientBufferSize`] with the size needed if `buf`
    /// is too small.
    pub fn copy_metadata(
        &self,
        kind: MetadataKind,
        buf: &mut [u8],
    ) -> Result<Option<(usize, TextEncoding)>, ParserError> {
        self.metadata_entry(kind)
            .map(|entry| copy_entry(entry, buf))
            .transpose()
    }

    /// Copies the cover art image into `buf`.
    pub fn copy_cover_art(
        &self,
        buf: &mut [u8],
    ) -> Result<Option<(usize, TextEncoding)>, ParserError> {
        self.parser
            .metadata()
            .cover_art()
            .map(|entry| copy_entry(entry, buf))
            .transpose()
    }

    /// Unwraps the stream, returning the parser.
    pub fn into_inner(self) -> Mp3Parser<P> {
        self.parser
    }
}

fn copy_entry(
    entry: &MetadataEntry,
    buf: &mut [u8],
) -> Result<(usize, TextEncoding), ParserError> {
    let required = entry.data.len() + entry.encoding.terminator_len();
    if buf.len() < required {
        return Err(ParserError::InsufficientBufferSize { required });
    }
    buf[..entry.data.len()].copy_from_slice(&entry.data);
    buf[entry.data.len()..required].fill(0);
    Ok((required, entry.encoding))
}

/// Value of `StreamTitle='...';` in an ICY metadata block, matched without
/// regard to case. The block ends at its first NUL.
fn stream_title(block: &[u8]) -> Option<&[u8]> {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    let block = &block[..end];
    let start = block
        .windows(STREAM_TITLE.len())
        .position(|w| w.eq_ignore_ascii_case(STREAM_TITLE))?
        + STREAM_TITLE.len();

    let value = &block[start..];
    let value = match value.iter().position(|&b| b == b';') {
        Some(semicolon) => &value[..semicolon],
        None => value,
    };
    let value = value.strip_prefix(b"'").unwrap_or(value);
    Some(value.strip_suffix(b"'").unwrap_or(value))
}

/// Reads until `buf` is full or the pipe runs dry.
fn read_up_to(pipe: &mut impl Read, buf: &mut [u8]) -> Result<usize, ParserError> {
    let mut filled = 0;
    while filled < buf.len() {
        match pipe.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}

fn to_units(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos() / 100).unwrap_or(u64::MAX)
}

fn from_units(units: u64) -> Duration {
    Duration::from_nanos(units.saturating_mul(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"StreamTitle='Artist - Song';StreamUrl='';", Some(&b"Artist - Song"[..]))]
    #[case(b"streamtitle='lower';", Some(&b"lower"[..]))]
    #[case(b"StreamTitle='';\0\0\0", Some(&b""[..]))]
    #[case(b"StreamUrl='http://example.com';", None)]
    #[case(b"\0StreamTitle='after nul';", None)]
    fn finds_stream_title(#[case] block: &[u8], #[case] expected: Option<&[u8]>) {
        assert_eq!(stream_title(block), expected);
    }

    #[test]
    fn copies_with_terminator() {
        let entry = MetadataEntry::new(vec![b'a', 0, b'b', 0], TextEncoding::Utf16);
        let mut buf = [0xffu8; 8];
        assert_eq!(copy_entry(&entry, &mut buf).unwrap(), (6, TextEncoding::Utf16));
        assert_eq!(&buf[..6], &[b'a', 0, b'b', 0, 0, 0]);
        assert_eq!(buf[6], 0xff);
    }

    #[test]
    fn reports_required_size() {
        let entry = MetadataEntry::new("title", TextEncoding::Ascii);
        let mut buf = [0u8; 5];
        assert!(matches!(
            copy_entry(&entry, &mut buf),
            Err(ParserError::InsufficientBufferSize { required: 6 })
        ));
    }

    #[test]
    fn images_have_no_terminator() {
        let entry = MetadataEntry::new(vec![0x89, b'P', b'N', b'G'], TextEncoding::Png);
        let mut buf = [0u8; 4];
        assert_eq!(copy_entry(&entry, &mut buf).unwrap(), (4, TextEncoding::Png));
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(to_units(Duration::from_millis(1)), UNITS_PER_MS);
        assert_eq!(from_units(UNITS_PER_SECOND), Duration::from_secs(1));
    }
}
