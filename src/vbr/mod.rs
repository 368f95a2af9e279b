//! VBR headers: Xing/Info and Fraunhofer VBRI.
//!
//! Encoders put one of these into the first frame of a VBR stream. It gives
//! the frame and byte count of the whole stream plus a table for mapping a
//! time to a byte position, so neither duration nor seeking needs a full
//! scan of the file.

mod vbri;
mod xing;

pub use vbri::VbriHeader;
pub use xing::{xing_frame_duration, XingHeader};

use crate::common::SampleRate;

/// How a stream's bit rate varies, and where that knowledge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VbrType {
    /// Constant bit rate.
    #[default]
    None,
    /// Xing or Info header.
    Xing,
    /// Fraunhofer VBRI header.
    Fhg,
    /// Variable bit rate found by sampling frames, no header.
    Other,
}

/// The VBR header found in the first frame, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum VbrHeader {
    #[default]
    None,
    Xing(XingHeader),
    Vbri(VbriHeader),
}

impl VbrHeader {
    /// Looks for a Xing header and then for a VBRI header in `frame`, which
    /// starts with the frame header of the first audio frame.
    pub fn detect(frame: &[u8], sample_rate: SampleRate) -> Self {
        if let Some(xing) = XingHeader::parse(frame, sample_rate) {
            return VbrHeader::Xing(xing);
        }
        match VbriHeader::parse(frame) {
            Some(vbri) => VbrHeader::Vbri(vbri),
            None => VbrHeader::None,
        }
    }

    pub fn vbr_type(&self) -> VbrType {
        match self {
            VbrHeader::None => VbrType::None,
            VbrHeader::Xing(_) => VbrType::Xing,
            VbrHeader::Vbri(_) => VbrType::Fhg,
        }
    }

    /// Frame count the header claims for the stream.
    pub fn frames(&self) -> u32 {
        match self {
            VbrHeader::None => 0,
            VbrHeader::Xing(xing) => xing.frames,
            VbrHeader::Vbri(vbri) => vbri.frames,
        }
    }

    /// Stream duration in milliseconds according to the header.
    pub fn total_time_ms(&self) -> u64 {
        match self {
            VbrHeader::None => 0,
            VbrHeader::Xing(xing) => xing.total_time_ms(),
            VbrHeader::Vbri(vbri) => vbri.total_time_ms(),
        }
    }
}
