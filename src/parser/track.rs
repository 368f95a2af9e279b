//! Establishing the stream parameters.
//!
//! A single frame header is not trustworthy: random data passes the header
//! check now and then and VBR streams change their bit rate every frame. So
//! the first frames are compared with their predecessors and every
//! attribute is voted on. Attributes that stay put long enough settle, and
//! the first pair of back to back frames that roughly agree marks the start
//! of the audio data.

use std::io::SeekFrom;

use crate::common::{log_debug, log_trace, log_warn};
use crate::constants::{
    BUFFER_CHUNK_SIZE, BUFFER_MAX_CHUNK_SIZE, BUFFER_MIN_CHUNK_SIZE, ID3V1_TAG_SIZE,
    ID3V2_HEADER_SIZE, LAYER_CHANGE_COUNT, MAXIMUM_VALID_FRAME_COUNT, MAX_BITRATE_CHANGE_COUNT,
    MAX_BITRATE_NO_CHANGE_COUNT, MAX_HEADER_PARSING_SIZE, MAX_ID3_TAG_COUNT,
    MAX_LAYER_NO_CHANGE_COUNT, MAX_SAMPLE_RATE_NO_CHANGE_COUNT, MAX_SYNC_NOT_FOUND_COUNT,
    MAX_VERSION_NO_CHANGE_COUNT, SAMPLE_RATE_CHANGE_COUNT, VBR_HEADER_READ_SIZE,
    VERSION_CHANGE_COUNT,
};
use crate::frame::{
    check_frame_header, frame_duration, FrameHeader, Layer, Version, FRAME_HEADER_SIZE,
};
use crate::metadata::id3v2::Id3v2Header;
use crate::metadata::{id3v1, id3v2};
use crate::pipe::ContentPipe;
use crate::vbr::{VbrHeader, VbrType};

use super::{Mp3Parser, ParserError, TrackInfo};

/// Change counter for one frame attribute.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally<T> {
    pub changes: u32,
    pub unchanged: u32,
    /// Value locked in once the attribute stayed the same for long enough.
    pub settled: T,
}

impl<T: PartialEq + Copy> Tally<T> {
    /// Counts a change or a repeat of the attribute. Once more than `cap`
    /// repeats were seen, every further repeat settles the value. Returns
    /// `true` if the attribute changed.
    fn record(&mut self, current: T, previous: T, cap: u32) -> bool {
        if current != previous {
            self.changes += 1;
            return true;
        }
        if self.unchanged <= cap {
            self.unchanged += 1;
        } else {
            self.settled = current;
        }
        false
    }
}

/// Votes collected while comparing consecutive frames.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FrameCompare {
    pub layer: Tally<Layer>,
    pub sample_rate: Tally<u32>,
    pub version: Tally<Version>,
    pub bit_rate: Tally<u32>,
    /// Back to back frame pairs that agree on layer, sample rate or version.
    pub matches: u32,
    /// Start of the audio data as far as the votes can tell.
    pub data_offset: u64,
}

impl FrameCompare {
    /// Compares frame number `counter` with the frame before it.
    pub(crate) fn compare(&mut self, counter: u32, current: &TrackInfo, previous: &TrackInfo) {
        if counter <= 1 {
            self.data_offset = current.frame_start;
            return;
        }

        if self.layer.record(current.layer, previous.layer, MAX_LAYER_NO_CHANGE_COUNT) {
            log_debug!(
                "layer changed in frame {counter} from {:?} to {:?}",
                previous.layer,
                current.layer
            );
        }
        if self.sample_rate.record(
            current.sample_rate,
            previous.sample_rate,
            MAX_SAMPLE_RATE_NO_CHANGE_COUNT,
        ) {
            log_debug!(
                "sample rate changed in frame {counter} from {} to {}",
                previous.sample_rate,
                current.sample_rate
            );
        }
        if self.version.record(current.version, previous.version, MAX_VERSION_NO_CHANGE_COUNT) {
            log_debug!(
                "version changed in frame {counter} from {:?} to {:?}",
                previous.version,
                current.version
            );
        }
        if self.bit_rate.record(current.bit_rate, previous.bit_rate, MAX_BITRATE_NO_CHANGE_COUNT) {
            log_debug!(
                "bit rate changed in frame {counter} from {} to {}",
                previous.bit_rate,
                current.bit_rate
            );
        }

        let expected = previous.frame_start + u64::from(previous.frame_size);
        if current.frame_start != expected {
            log_debug!(
                "frame {counter} expected at byte {expected}, found at byte {}",
                current.frame_start
            );
        } else if current.layer == previous.layer
            || current.sample_rate == previous.sample_rate
            || current.version == previous.version
        {
            self.matches += 1;
            if self.matches == 1 {
                self.data_offset = previous.frame_start;
            }
        }
    }

    /// Whether no attribute changed more than `limit` times.
    fn changes_at_most(&self, limit: u32) -> bool {
        self.layer.changes <= limit
            && self.sample_rate.changes <= limit
            && self.version.changes <= limit
            && self.bit_rate.changes <= limit
    }

    /// Layer, version and sample rate all keep flipping, which real
    /// streams other than Layer III never do.
    fn is_hopeless(&self) -> bool {
        self.layer.changes > LAYER_CHANGE_COUNT
            && self.version.changes > VERSION_CHANGE_COUNT
            && self.sample_rate.changes > SAMPLE_RATE_CHANGE_COUNT
    }
}

/// How the frame scan came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanEnd {
    /// The first frame carries a Xing or VBRI header.
    VbrHeader,
    /// The first frames agree on every attribute.
    Stable,
    /// End of data, or no sync within the search budget.
    Exhausted,
}

struct Scan {
    counter: u32,
    total_kbps: u64,
    current: TrackInfo,
    previous: TrackInfo,
    votes: FrameCompare,
    /// Frame count reported by the VBR header.
    vbr_frames: u32,
}

impl Scan {
    fn new(initial: TrackInfo) -> Self {
        Self {
            counter: 0,
            total_kbps: 0,
            current: initial,
            previous: initial,
            votes: FrameCompare::default(),
            vbr_frames: 0,
        }
    }

    fn mean_bit_rate(&self) -> u32 {
        (self.total_kbps * 1000 / u64::from(self.counter.max(1))) as u32
    }

    /// Picks the bit rate of a stream without VBR header from the votes.
    fn settle_bit_rate(&mut self) {
        let mean = self.mean_bit_rate();
        if self.counter <= MAXIMUM_VALID_FRAME_COUNT {
            if self.votes.changes_at_most(0) {
                self.current.vbr_type = VbrType::None;
                self.votes.bit_rate.settled = self.current.bit_rate;
            } else if self.votes.bit_rate.changes < MAX_BITRATE_CHANGE_COUNT {
                self.current.vbr_type = VbrType::Other;
                self.votes.bit_rate.settled = mean;
            }
        }

        if self.votes.bit_rate.changes > MAX_BITRATE_CHANGE_COUNT {
            self.current.vbr_type = VbrType::Other;
            self.current.bit_rate = mean;
        } else {
            self.current.bit_rate = self.votes.bit_rate.settled;
        }
    }
}

impl TrackInfo {
    fn apply(&mut self, header: &FrameHeader) {
        self.version = header.version;
        self.layer = header.layer;
        self.bit_rate = header.bit_rate;
        self.sample_rate = header.sample_rate;
        self.channels = header.channels;
        self.frame_size = header.frame_size;
        if header.padded {
            self.padded_frames += 1;
        } else {
            self.unpadded_frames += 1;
        }
    }
}

impl<P: ContentPipe> Mp3Parser<P> {
    pub(super) fn read_track_info(&mut self) -> Result<(), ParserError> {
        self.file_size = self.pipe.byte_len()?;
        self.track = TrackInfo::default();
        self.vbr = VbrHeader::None;
        self.read_metadata();

        let mut scan = Scan::new(self.track);
        let end = match self.scan_frames(&mut scan) {
            Err(ParserError::EndOfStream) => ScanEnd::Exhausted,
            other => other?,
        };

        if end == ScanEnd::Exhausted {
            let previous_end = scan.previous.frame_start + u64::from(scan.previous.frame_size);
            self.last_frame_boundary = if previous_end < self.file_size {
                log_debug!(
                    "free space or unknown tag after frame {}, bytes {previous_end}-{}",
                    scan.counter,
                    self.file_size
                );
                previous_end
            } else {
                self.file_size
            };
        }

        if end != ScanEnd::VbrHeader {
            if scan.counter == 0 {
                log_debug!("no frames found");
                self.track.invalidate();
                return Err(ParserError::CorruptedStream);
            }
            scan.settle_bit_rate();
        }

        scan.current.data_offset = scan.votes.data_offset;
        if scan.counter >= MAX_LAYER_NO_CHANGE_COUNT
            && scan.counter >= MAX_VERSION_NO_CHANGE_COUNT
            && scan.counter >= MAX_SAMPLE_RATE_NO_CHANGE_COUNT
        {
            scan.current.layer = scan.votes.layer.settled;
            scan.current.version = scan.votes.version.settled;
            scan.current.sample_rate = scan.votes.sample_rate.settled;
        }
        self.track = scan.current;

        let frames = match self.track.vbr_type {
            VbrType::Xing | VbrType::Fhg => {
                if scan.vbr_frames == 0 {
                    self.track.total_time_ms = self.cbr_total_time();
                }
                scan.vbr_frames
            }
            VbrType::Other => {
                self.track.total_time_ms = u64::from(scan.counter)
                    * u64::from(frame_duration(self.track.sample_rate, self.track.layer))
                    / 1000;
                scan.counter
            }
            VbrType::None => {
                self.track.total_time_ms = self.cbr_total_time();
                scan.counter
            }
        };
        log_debug!(
            "track info: {:?} {:?} {:?}, {frames} frames, {} bit/s, {} Hz, {} ms, {} channels, \
             data at byte {}, {} padded and {} unpadded frames",
            self.track.version,
            self.track.layer,
            self.track.vbr_type,
            self.track.bit_rate,
            self.track.sample_rate,
            self.track.total_time_ms,
            self.track.channels,
            self.track.data_offset,
            self.track.padded_frames,
            self.track.unpadded_frames
        );

        if !self.settings.streaming {
            if let Err(err) = self.find_last_frame_boundary() {
                log_warn!("failed to find the last frame boundary: {err}");
            }
        }
        self.pipe.seek(SeekFrom::Start(self.track.data_offset))?;

        let mut result = Ok(());
        if self.track.is_incomplete() {
            log_debug!("track info is incomplete: {:?}", self.track);
            result = Err(ParserError::CorruptedStream);
        }
        if scan.votes.is_hopeless() && self.track.layer != Layer::Layer3 {
            log_debug!(
                "frames disagree too much to be trusted: {} layer, {} version and {} sample rate changes",
                scan.votes.layer.changes,
                scan.votes.version.changes,
                scan.votes.sample_rate.changes
            );
            self.track.invalidate();
            result = Err(ParserError::CorruptedStream);
        }
        result
    }

    /// Duration of the audio data at the track's bit rate.
    fn cbr_total_time(&self) -> u64 {
        (self.file_size.saturating_sub(self.track.data_offset) * 8000)
            .checked_div(u64::from(self.track.bit_rate))
            .unwrap_or(0)
    }

    /// Walks frame by frame from the end of the ID3v2 tags.
    fn scan_frames(&mut self, scan: &mut Scan) -> Result<ScanEnd, ParserError> {
        let mut pos = self.skip_id3v2_tags()?;
        self.track.data_offset = pos;
        log_debug!("searching for frames from byte {pos}");

        let mut misses = 0;
        loop {
            let Some(bytes) = self.find_sync(&mut pos, &mut misses)? else {
                log_debug!("no frame sync within {MAX_SYNC_NOT_FOUND_COUNT} bytes");
                return Ok(ScanEnd::Exhausted);
            };

            scan.counter += 1;
            scan.previous = scan.current;
            scan.current.frame_start = pos;
            scan.current.apply(&FrameHeader::decode(bytes));
            pos += u64::from(scan.current.frame_size);
            log_trace!(
                "frame {}: start {}, size {}",
                scan.counter,
                scan.current.frame_start,
                scan.current.frame_size
            );

            if scan.counter == 1 {
                let frame = self.read_vbr_frame(scan.current.frame_start)?;
                let vbr = VbrHeader::detect(&frame, scan.current.sample_rate);
                if vbr != VbrHeader::None {
                    log_debug!("found {:?} header in frame at byte {}", vbr.vbr_type(), scan.current.frame_start);
                    scan.votes.data_offset = scan.current.frame_start;
                    scan.current.vbr_type = vbr.vbr_type();
                    scan.current.total_time_ms = vbr.total_time_ms();
                    scan.vbr_frames = vbr.frames();
                    self.vbr = vbr;
                    return Ok(ScanEnd::VbrHeader);
                }
            }

            self.pipe.seek(SeekFrom::Start(pos))?;
            scan.total_kbps += u64::from(scan.current.bit_rate / 1000);
            scan.votes.compare(scan.counter, &scan.current, &scan.previous);

            if scan.counter > MAXIMUM_VALID_FRAME_COUNT && scan.votes.changes_at_most(1) {
                scan.current.vbr_type = VbrType::None;
                scan.votes.bit_rate.settled = scan.current.bit_rate;
                return Ok(ScanEnd::Stable);
            }
        }
    }

    /// Searches forward from the pipe position for a valid frame header.
    ///
    /// Reads fixed size windows, keeping the last three bytes of a window
    /// so headers straddling two windows are found. `pos` follows the
    /// candidate offset and ends up at the header. Returns `None` once
    /// more than [`MAX_SYNC_NOT_FOUND_COUNT`] candidates were rejected.
    fn find_sync(
        &mut self,
        pos: &mut u64,
        misses: &mut u32,
    ) -> Result<Option<[u8; FRAME_HEADER_SIZE]>, ParserError> {
        let mut window = [0u8; MAX_HEADER_PARSING_SIZE];
        self.pipe.read_exact(&mut window)?;
        loop {
            for candidate in window.windows(FRAME_HEADER_SIZE) {
                let bytes = [candidate[0], candidate[1], candidate[2], candidate[3]];
                if check_frame_header(bytes).is_ok() {
                    return Ok(Some(bytes));
                }
                *misses += 1;
                if *misses > MAX_SYNC_NOT_FOUND_COUNT {
                    return Ok(None);
                }
                *pos += 1;
            }
            window.copy_within(MAX_HEADER_PARSING_SIZE - 3.., 0);
            self.pipe.read_exact(&mut window[3..])?;
        }
    }

    /// Skips up to [`MAX_ID3_TAG_COUNT`] stacked ID3v2 tags at the start of
    /// the stream and returns the offset just past them.
    fn skip_id3v2_tags(&mut self) -> Result<u64, ParserError> {
        self.pipe.rewind()?;
        let mut offset = 0;
        for _ in 0..MAX_ID3_TAG_COUNT {
            let mut bytes = [0u8; ID3V2_HEADER_SIZE];
            self.pipe.read_exact(&mut bytes)?;
            let Some(header) = Id3v2Header::parse(&bytes) else {
                break;
            };
            offset += header.total_size();
            self.pipe.seek(SeekFrom::Start(offset))?;
        }
        self.pipe.seek(SeekFrom::Start(offset))?;
        Ok(offset)
    }

    /// Reads the start of the frame at `start`, enough to hold any VBR
    /// header, or up to the end of the stream if that comes first.
    pub(super) fn read_vbr_frame(&mut self, start: u64) -> Result<Vec<u8>, ParserError> {
        let len = (VBR_HEADER_READ_SIZE as u64).min(self.file_size.saturating_sub(start));
        let mut frame = vec![0; len as usize];
        self.pipe.seek(SeekFrom::Start(start))?;
        self.pipe.read_exact(&mut frame)?;
        Ok(frame)
    }

    /// Reads the ID3v2 tag at the start and the ID3v1 tag at the end of the
    /// stream. A missing or broken tag is not an error.
    fn read_metadata(&mut self) {
        if let Err(err) = self.read_id3v2() {
            log_debug!("no usable id3v2 tag: {err}");
        }
        match self.read_id3v1() {
            Ok(found) => self.tag_detected = found,
            Err(err) => log_debug!("no usable id3v1 tag: {err}"),
        }
    }

    fn read_id3v2(&mut self) -> Result<(), ParserError> {
        self.pipe.rewind()?;
        let mut bytes = [0u8; ID3V2_HEADER_SIZE];
        self.pipe.read_exact(&mut bytes)?;
        let Some(header) = Id3v2Header::parse(&bytes) else {
            return Ok(());
        };

        let available = self.file_size.saturating_sub(ID3V2_HEADER_SIZE as u64);
        let mut body = vec![0; u64::from(header.size).min(available) as usize];
        self.pipe.read_exact(&mut body)?;
        id3v2::parse(&header, &body, &mut self.metadata)
    }

    fn read_id3v1(&mut self) -> Result<bool, ParserError> {
        if self.file_size < ID3V1_TAG_SIZE {
            return Ok(false);
        }
        self.pipe.seek(SeekFrom::Start(self.file_size - ID3V1_TAG_SIZE))?;
        let mut tag = [0u8; id3v1::TAG_LEN];
        self.pipe.read_exact(&mut tag)?;
        Ok(id3v1::parse(&tag, &mut self.metadata))
    }

    /// Locates the end of the audio data, before any ID3v1 trailer.
    ///
    /// Scans chunks backwards from the end until one holds a frame header.
    /// For streams with a VBR header the boundary is the last header found.
    /// Otherwise it is the end of the last frame the chunk holds in full,
    /// reached by hopping from frame to frame.
    fn find_last_frame_boundary(&mut self) -> Result<(), ParserError> {
        let limit = if self.tag_detected {
            self.file_size.saturating_sub(ID3V1_TAG_SIZE)
        } else {
            self.file_size
        };
        let chunk = if limit >= BUFFER_CHUNK_SIZE {
            BUFFER_CHUNK_SIZE
        } else if limit >= BUFFER_MIN_CHUNK_SIZE {
            BUFFER_MIN_CHUNK_SIZE
        } else {
            return Err(ParserError::CorruptedStream);
        };

        self.pipe.stop_caching();
        let boundary = self.scan_backwards(limit, chunk);
        self.pipe.start_caching();

        self.last_frame_boundary = boundary?;
        log_debug!("last frame boundary at byte {}", self.last_frame_boundary);
        Ok(())
    }

    fn scan_backwards(&mut self, limit: u64, chunk: u64) -> Result<u64, ParserError> {
        let headers_only = matches!(self.track.vbr_type, VbrType::Xing | VbrType::Fhg);
        let mut buf = vec![0u8; chunk as usize];
        let mut offset = limit - chunk;

        while limit - offset < BUFFER_MAX_CHUNK_SIZE {
            self.pipe.seek(SeekFrom::Start(offset))?;
            self.pipe.read_exact(&mut buf)?;

            let mut found = None;
            let mut pos = 0;
            while pos + FRAME_HEADER_SIZE <= buf.len() {
                let bytes = [buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]];
                match FrameHeader::parse(bytes) {
                    Ok(_) if headers_only => {
                        found = Some(pos as u64);
                        pos += 1;
                    }
                    Ok(header) => {
                        let end = pos as u64 + u64::from(header.frame_size);
                        found = Some(end);
                        pos += (header.frame_size as usize).max(1);
                    }
                    Err(_) => pos += 1,
                }
            }

            if let Some(found) = found {
                return Ok(if headers_only {
                    offset + found
                } else {
                    (offset + found).min(limit)
                });
            }
            if offset == 0 {
                break;
            }
            offset = offset.saturating_sub(chunk);
        }
        Err(ParserError::CorruptedStream)
    }
}
