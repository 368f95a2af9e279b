use std::io::SeekFrom;

use crate::common::log_debug;
use crate::pipe::ContentPipe;
use crate::vbr::{xing_frame_duration, VbrHeader};

use super::{Mp3Parser, ParserError};

impl<P: ContentPipe> Mp3Parser<P> {
    /// Positions the pipe at the audio belonging to `ms` milliseconds.
    ///
    /// With an intact Xing table of contents the position is interpolated
    /// from the table at whole percent steps, and `ms` is overwritten with
    /// the time that position really stands for. The rest of the requested
    /// time is reported as whole frames through
    /// [`frame_skip`](Self::frame_skip). A VBRI table is walked entry by
    /// entry. Everything else is treated as constant bit rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe cannot seek. The offset is still
    /// recorded in [`current_offset`](Self::current_offset).
    pub fn seek_to_time(&mut self, ms: &mut u32) -> Result<(), ParserError> {
        let requested = *ms;
        let point = match &self.vbr {
            VbrHeader::Xing(xing) if !xing.corrupted && xing.frames > 0 => {
                let stream_ms = f64::from(xing.frames) * xing.frame_duration;
                let exact = f64::from(requested) / stream_ms * 100.0;
                let percent = exact.floor();
                let fraction = exact - percent;

                let stream_bytes = xing.bytes.map_or_else(
                    || self.file_size.saturating_sub(self.track.data_offset),
                    u64::from,
                );
                let mut point = xing.seek_point(percent, stream_bytes);

                let fraction_ms = fraction * stream_ms / 100.0;
                if fraction_ms > xing.frame_duration {
                    let frames = (fraction_ms / xing.frame_duration) as i32;
                    self.frame_skip = if self.frame_skip > 0 {
                        self.frame_skip + frames
                    } else {
                        frames
                    };
                } else {
                    self.frame_skip = 0;
                }

                if requested == 0 && (xing.first_toc_error || xing.toc_error) {
                    point = 0;
                }
                *ms = (percent * stream_ms / 100.0) as u32;
                log_debug!("xing seek to {percent}% for {requested} ms");
                point
            }
            VbrHeader::Vbri(vbri) => {
                let frame_duration = xing_frame_duration(self.track.sample_rate);
                let entry_ms = vbri.entry_duration_ms() as u32;
                self.frame_skip = match requested.checked_rem(entry_ms) {
                    Some(left) => (f64::from(left) / frame_duration) as i32,
                    None => 0,
                };
                vbri.seek_point(f64::from(requested))
            }
            _ => self.cbr_seek_point(requested),
        };

        let offset = self.track.data_offset + point;
        self.curr_file_offset = offset;
        log_debug!("seek to {requested} ms lands at byte {offset}");
        self.pipe.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn cbr_seek_point(&self, ms: u32) -> u64 {
        u64::from(ms) * u64::from(self.track.bit_rate / 1000) / 8
    }
}
