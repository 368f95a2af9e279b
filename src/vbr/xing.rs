use crate::common::{log_debug, SampleRate};
use crate::constants::{XING_TOC_SIZE, XING_TOC_TABLE_ZEROS_MAX_SIZE};
use crate::utils::ByteCursor;

const FLAG_FRAMES: u32 = 0x1;
const FLAG_BYTES: u32 = 0x2;
const FLAG_TOC: u32 = 0x4;
const FLAG_SCALE: u32 = 0x8;

/// Duration of one frame in milliseconds as assumed for Xing streams.
pub fn xing_frame_duration(sample_rate: SampleRate) -> f64 {
    match sample_rate {
        48000 | 24000 => 24.0,
        32000 | 16000 => 36.0,
        12000 => 48.0,
        11025 => 52.24,
        8000 => 72.0,
        _ => 26.12,
    }
}

/// A Xing VBR header.
///
/// All fields after the flags word are optional. They are stored in a fixed
/// order, so each one's offset depends on which of the earlier ones exist.
#[derive(Debug, Clone, PartialEq)]
pub struct XingHeader {
    pub flags: u32,
    /// Frames in the stream, zero when absent.
    pub frames: u32,
    /// Bytes in the stream.
    pub bytes: Option<u32>,
    /// Seek table: entry `i` is the byte position at `i` percent of the
    /// duration, in 1/256 of the stream size.
    pub toc: Option<[u8; XING_TOC_SIZE]>,
    /// Encoder quality, -1 when absent.
    pub vbr_scale: i32,
    /// Duration of one frame in milliseconds.
    pub frame_duration: f64,
    /// The TOC is missing or holds too many zero entries to seek with.
    pub corrupted: bool,
    /// The first TOC entry was not zero.
    pub first_toc_error: bool,
    /// A decreasing TOC entry was found and repaired.
    pub toc_error: bool,
}

impl XingHeader {
    /// Parses the header from a buffer starting at the frame header.
    pub fn parse(frame: &[u8], sample_rate: SampleRate) -> Option<Self> {
        if frame.len() < 4 {
            return None;
        }
        let mpeg1 = (frame[1] >> 3) & 1 == 1;
        let mono = (frame[3] >> 6) & 3 == 3;
        // side information size plus the frame header
        let offset = match (mpeg1, mono) {
            (true, false) => 32 + 4,
            (true, true) | (false, false) => 17 + 4,
            (false, true) => 9 + 4,
        };

        let mut cursor = ByteCursor::at(frame, offset)?;
        if cursor.bytes(4)? != b"Xing" {
            return None;
        }

        let flags = cursor.be_u32()?;
        let frames = if flags & FLAG_FRAMES != 0 {
            cursor.be_u32()?
        } else {
            0
        };
        let bytes = if flags & FLAG_BYTES != 0 {
            Some(cursor.be_u32()?)
        } else {
            None
        };
        let toc = if flags & FLAG_TOC != 0 {
            Some(cursor.array::<XING_TOC_SIZE>()?)
        } else {
            None
        };
        let vbr_scale = if flags & FLAG_SCALE != 0 {
            cursor.be_i32()?
        } else {
            -1
        };

        let corrupted = toc_is_corrupted(toc.as_ref());
        log_debug!("xing header: {frames} frames, corrupted toc: {corrupted}");

        Some(Self {
            flags,
            frames,
            bytes,
            toc,
            vbr_scale,
            frame_duration: xing_frame_duration(sample_rate),
            corrupted,
            first_toc_error: false,
            toc_error: false,
        })
    }

    /// Stream duration in whole milliseconds.
    pub fn total_time_ms(&self) -> u64 {
        (f64::from(self.frames) * self.frame_duration) as u64
    }

    /// Flags a non-zero first entry and smooths out entries that are larger
    /// than their successor.
    ///
    /// A decreasing entry is replaced by its successor minus the average of
    /// the next one or two rising steps, kept between its neighbours. When
    /// even its predecessor lies above the successor, the predecessors are
    /// lowered too, so the repaired part of the table never decreases.
    pub(crate) fn repair_toc(&mut self) {
        let Some(toc) = self.toc.as_mut() else {
            return;
        };
        self.first_toc_error = toc[0] != 0;

        for i in 0..XING_TOC_SIZE - 4 {
            if toc[i] <= toc[i + 1] {
                continue;
            }
            let (next, after, last) = (
                i32::from(toc[i + 1]),
                i32::from(toc[i + 2]),
                i32::from(toc[i + 3]),
            );
            let mut step1 = 0;
            let mut step2 = 0;
            if next < after {
                step1 = after - next;
                if after < last {
                    step2 = last - after;
                }
            }
            let floor = if i == 0 { 0 } else { i32::from(toc[i - 1]) };
            toc[i] = (next - (step1 + step2) / 2).clamp(floor.min(next), next) as u8;
            let mut j = i;
            while j > 0 && toc[j - 1] > toc[j] {
                toc[j - 1] = toc[j];
                j -= 1;
            }
            self.toc_error = true;
        }
        if self.toc_error || self.first_toc_error {
            log_debug!(
                "xing toc repaired: first entry error {}, order error {}",
                self.first_toc_error,
                self.toc_error
            );
        }
    }

    /// Interpolates the TOC: byte offset of `percent` of the stream, for a
    /// stream of `stream_bytes` bytes.
    pub(crate) fn seek_point(&self, percent: f64, stream_bytes: u64) -> u64 {
        let Some(toc) = self.toc.as_ref() else {
            return 0;
        };
        let percent = percent.clamp(0.0, 100.0);
        let a = (percent as usize).min(XING_TOC_SIZE - 1);
        let fa = f64::from(toc[a]);
        let fb = if a < XING_TOC_SIZE - 1 {
            f64::from(toc[a + 1])
        } else {
            256.0
        };
        let fx = fa + (fb - fa) * (percent - a as f64);
        (fx / 256.0 * stream_bytes as f64) as u64
    }
}

fn toc_is_corrupted(toc: Option<&[u8; XING_TOC_SIZE]>) -> bool {
    match toc {
        Some(toc) => toc.iter().filter(|&&b| b == 0).count() > XING_TOC_TABLE_ZEROS_MAX_SIZE,
        None => true,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn linear_toc() -> [u8; XING_TOC_SIZE] {
        std::array::from_fn(|i| (i * 256 / 100) as u8)
    }

    /// First frame of an MPEG-1 Layer III stereo stream carrying a Xing
    /// header with every optional field.
    pub(crate) fn xing_frame(frames: u32, bytes: u32, toc: &[u8; XING_TOC_SIZE]) -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xff, 0xfb, 0x90, 0x00]);
        let mut pos = 36;
        frame[pos..pos + 4].copy_from_slice(b"Xing");
        pos += 4;
        frame[pos..pos + 4].copy_from_slice(&0xfu32.to_be_bytes());
        pos += 4;
        frame[pos..pos + 4].copy_from_slice(&frames.to_be_bytes());
        pos += 4;
        frame[pos..pos + 4].copy_from_slice(&bytes.to_be_bytes());
        pos += 4;
        frame[pos..pos + XING_TOC_SIZE].copy_from_slice(toc);
        pos += XING_TOC_SIZE;
        frame[pos..pos + 4].copy_from_slice(&50i32.to_be_bytes());
        frame
    }

    #[test]
    fn parses_all_fields() {
        let frame = xing_frame(100, 42_117, &linear_toc());
        let xing = XingHeader::parse(&frame, 44_100).unwrap();
        assert_eq!(xing.frames, 100);
        assert_eq!(xing.bytes, Some(42_117));
        assert_eq!(xing.vbr_scale, 50);
        assert!(!xing.corrupted);
        assert_relative_eq!(xing.frame_duration, 26.12);
        assert_eq!(xing.total_time_ms(), 2612);
    }

    #[test]
    fn optional_fields_shift_offsets() {
        let mut frame = vec![0u8; 64];
        frame[..4].copy_from_slice(&[0xff, 0xfb, 0x90, 0xc0]);
        // mono MPEG-1: marker after 17 bytes of side information
        frame[21..25].copy_from_slice(b"Xing");
        frame[25..29].copy_from_slice(&(FLAG_BYTES | FLAG_SCALE).to_be_bytes());
        frame[29..33].copy_from_slice(&1234u32.to_be_bytes());
        frame[33..37].copy_from_slice(&(-7i32).to_be_bytes());

        let xing = XingHeader::parse(&frame, 48_000).unwrap();
        assert_eq!(xing.frames, 0);
        assert_eq!(xing.bytes, Some(1234));
        assert_eq!(xing.toc, None);
        assert_eq!(xing.vbr_scale, -7);
        assert!(xing.corrupted);
        assert_relative_eq!(xing.frame_duration, 24.0);
    }

    #[test]
    fn info_marker_is_not_accepted() {
        let mut frame = xing_frame(100, 42_117, &linear_toc());
        frame[36..40].copy_from_slice(b"Info");
        assert!(XingHeader::parse(&frame, 44_100).is_none());
    }

    #[test]
    fn truncated_header_is_rejected() {
        let frame = xing_frame(100, 42_117, &linear_toc());
        assert!(XingHeader::parse(&frame[..100], 44_100).is_none());
    }

    #[test]
    fn zero_entries_mark_corruption() {
        let mut toc = linear_toc();
        toc[10] = 0;
        assert!(toc_is_corrupted(Some(&toc)));
        assert!(!toc_is_corrupted(Some(&linear_toc())));
        assert!(toc_is_corrupted(None));
    }

    #[test]
    fn repairs_decreasing_entry() {
        let mut toc = linear_toc();
        toc[40] = 250;
        let mut xing = XingHeader::parse(&xing_frame(100, 42_117, &toc), 44_100).unwrap();
        xing.repair_toc();
        let toc = xing.toc.unwrap();
        assert!(xing.toc_error);
        assert!(!xing.first_toc_error);
        assert!(toc[40] >= toc[39]);
        assert!(toc[40] <= toc[41]);
    }

    #[test]
    fn repair_lowers_predecessors_above_successor() {
        let mut toc = linear_toc();
        toc[39] = 200;
        toc[40] = 250;
        let mut xing = XingHeader::parse(&xing_frame(100, 42_117, &toc), 44_100).unwrap();
        xing.repair_toc();
        let toc = xing.toc.unwrap();
        assert!(xing.toc_error);
        assert_eq!(toc[39], toc[41]);
        assert_eq!(toc[40], toc[41]);
        assert!(toc.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn monotonic_toc_is_left_alone() {
        let mut xing = XingHeader::parse(&xing_frame(100, 42_117, &linear_toc()), 44_100).unwrap();
        xing.repair_toc();
        assert!(!xing.toc_error);
        assert_eq!(xing.toc, Some(linear_toc()));
    }

    #[test]
    fn interpolates_seek_points() {
        let xing = XingHeader::parse(&xing_frame(100, 42_117, &linear_toc()), 44_100).unwrap();
        assert_eq!(xing.seek_point(0.0, 42_117), 0);
        assert_eq!(xing.seek_point(50.0, 42_117), 21_058);
        // between the last entry and the end of the stream
        assert_eq!(xing.seek_point(99.5, 256), 254);
    }
}
