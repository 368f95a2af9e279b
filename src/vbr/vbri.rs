use crate::common::{log_debug, SampleRate};
use crate::constants::VBRI_MAX_TABLE_SIZE;
use crate::utils::ByteCursor;

/// Offset of the `VBRI` marker from the frame header: the header itself
/// plus 32 bytes that would otherwise hold silence.
const VBRI_MARKER_OFFSET: usize = 4 + 32;

/// A Fraunhofer VBRI header with its seek table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbriHeader {
    pub sample_rate: SampleRate,
    pub version: u16,
    pub delay: u16,
    pub quality: u16,
    /// Bytes in the stream.
    pub bytes: u32,
    /// Frames in the stream.
    pub frames: u32,
    pub table_scale: u16,
    /// Width of one table entry in bytes.
    pub entry_bytes: u16,
    /// Frames covered by one table entry.
    pub entry_frames: u16,
    /// Byte length of each table segment, scale applied.
    pub table: Vec<u32>,
}

// Sample rate from the MPEG frame header: version bits then rate index.
fn sample_rate(frame: &[u8]) -> Option<SampleRate> {
    let id = ((frame[1] << 3) & 0xc0) >> 4;
    let idx = ((frame[2] << 4) & 0xc0) >> 6;
    match id | idx {
        0 => Some(11025),
        1 => Some(12000),
        2 => Some(8000),
        8 => Some(22050),
        9 => Some(24000),
        10 => Some(16000),
        12 => Some(44100),
        13 => Some(48000),
        14 => Some(32000),
        _ => None,
    }
}

impl VbriHeader {
    /// Parses the header from a buffer starting at the frame header.
    ///
    /// Tables with more than 512 entries or an entry width other than
    /// 1, 2 or 4 bytes are rejected.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 4 {
            return None;
        }
        let sample_rate = sample_rate(frame)?;

        let mut cursor = ByteCursor::at(frame, VBRI_MARKER_OFFSET)?;
        if cursor.bytes(4)? != b"VBRI" {
            return None;
        }
        let version = cursor.be_u16()?;
        let delay = cursor.be_u16()?;
        let quality = cursor.be_u16()?;
        let bytes = cursor.be_u32()?;
        let frames = cursor.be_u32()?;
        let table_size = usize::from(cursor.be_u16()?);
        let table_scale = cursor.be_u16()?;
        let entry_bytes = cursor.be_u16()?;
        let entry_frames = cursor.be_u16()?;

        if table_size > VBRI_MAX_TABLE_SIZE {
            log_debug!("vbri table of {table_size} entries is too large");
            return None;
        }
        let scale = u32::from(table_scale);
        let table = (0..table_size)
            .map(|_| {
                let entry = match entry_bytes {
                    1 => cursor.u8().map(u32::from),
                    2 => cursor.be_u16().map(u32::from),
                    4 => cursor.be_u32(),
                    _ => None,
                };
                entry.map(|e| e.wrapping_mul(scale))
            })
            .collect::<Option<Vec<u32>>>()?;

        log_debug!("vbri header: {frames} frames, {table_size} table entries");
        Some(Self {
            sample_rate,
            version,
            delay,
            quality,
            bytes,
            frames,
            table_scale,
            entry_bytes,
            entry_frames,
            table,
        })
    }

    pub fn samples_per_frame(&self) -> u32 {
        if self.sample_rate >= 32000 {
            1152
        } else {
            576
        }
    }

    /// Stream duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        f64::from(self.frames) * f64::from(self.samples_per_frame()) * 1000.0
            / f64::from(self.sample_rate)
    }

    /// Stream duration in whole milliseconds.
    pub fn total_time_ms(&self) -> u64 {
        self.duration_ms() as u64
    }

    /// Duration covered by one table entry, in milliseconds.
    pub fn entry_duration_ms(&self) -> f64 {
        self.duration_ms() / (self.table.len() + 1) as f64
    }

    /// Byte offset, relative to the first frame, of the time `ms`.
    ///
    /// Walks the table until the accumulated time passes `ms`, then steps
    /// back by the part of the last segment that lies past the target.
    pub(crate) fn seek_point(&self, ms: f64) -> u64 {
        let total = self.duration_ms();
        let per_entry = self.entry_duration_ms();
        let target = ms.min(total);

        let mut point: i64 = 0;
        let mut elapsed = 0.0;
        let mut i = 0;
        while elapsed <= target && i <= self.table.len() {
            point += i64::from(self.table.get(i).copied().unwrap_or(0));
            elapsed += per_entry;
            i += 1;
        }

        if self.entry_frames > 0 && per_entry > 0.0 && i > 0 {
            let entry_frames = f64::from(self.entry_frames);
            let fraction =
                (((elapsed - target) / per_entry + 1.0 / (2.0 * entry_frames)) * entry_frames) as i64;
            let last = f64::from(self.table.get(i - 1).copied().unwrap_or(0));
            point -= (last * fraction as f64 / entry_frames) as i64;
        }
        point.max(0) as u64
    }
}
