//! MPEG audio frame header codec.
//!
//! Every MPEG audio frame starts with a 32 bit big endian header:
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A sync (all ones)   B version   C layer   D protection
//! E bit rate index    F sample rate index   G padding   H private
//! I channel mode      J mode extension      K copyright L original
//! M emphasis
//! ```
//!
//! [`check_frame_header`] decides whether four bytes can start a frame,
//! [`FrameHeader::decode`] turns them into stream parameters and a frame size.

use crate::common::{BitRate, ChannelCount, SampleRate};

/// Size of an MPEG audio frame header.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Frame size reported when the header carries no usable sample rate.
const FALLBACK_FRAME_SIZE: u32 = 417;

// [version][sample rate index]
const SAMPLE_RATES: [[SampleRate; 4]; 3] = [
    [44100, 48000, 32000, 0],
    [22050, 24000, 16000, 0],
    [11025, 12000, 8000, 0],
];

// [MPEG1, MPEG2 and 2.5][layer][bit rate index], kbit/s
const BIT_RATES: [[[u16; 15]; 3]; 2] = [
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    ],
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    ],
];

// MPEG1 Layer II: [bit rate index][stereo allowed, mono allowed]
const LAYER2_ALLOWED_MODES: [[bool; 2]; 15] = [
    [true, true],
    [false, true],
    [false, true],
    [false, true],
    [true, true],
    [false, true],
    [true, true],
    [true, true],
    [true, true],
    [true, true],
    [true, true],
    [true, false],
    [true, false],
    [true, false],
    [true, false],
];

const DURATION_SAMPLE_RATES: [SampleRate; 9] =
    [48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000];

// [layer][sample rate], in 1/1000 ms
const FRAME_DURATIONS: [[u32; 9]; 3] = [
    [8000, 8707, 12000, 16000, 17414, 24000, 32000, 34829, 48000],
    [24000, 26120, 36000, 48000, 52244, 72000, 96000, 104489, 144000],
    [24000, 26120, 36000, 24000, 26120, 36000, 48000, 52240, 72000],
];

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// MPEG-1 (ISO/IEC 11172-3).
    #[default]
    Mpeg1,
    /// MPEG-2 LSF (ISO/IEC 13818-3).
    Mpeg2,
    /// MPEG-2.5, the unofficial low sample rate extension.
    Mpeg25,
}

impl Version {
    fn index(self) -> usize {
        match self {
            Version::Mpeg1 => 0,
            Version::Mpeg2 => 1,
            Version::Mpeg25 => 2,
        }
    }
}

/// MPEG audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layer {
    Layer1,
    Layer2,
    #[default]
    Layer3,
    /// No layer known, as in a zeroed track.
    Unknown,
}

impl Layer {
    fn index(self) -> Option<usize> {
        match self {
            Layer::Layer1 => Some(0),
            Layer::Layer2 => Some(1),
            Layer::Layer3 => Some(2),
            Layer::Unknown => None,
        }
    }
}

/// Channel mode of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        }
    }

    /// Number of channels carried by frames in this mode.
    pub fn channels(self) -> ChannelCount {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

/// Reason four bytes were rejected as a frame header.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("frame sync not found")]
    NoSync,
    #[error("free format or invalid bit rate index")]
    BadBitRate,
    #[error("reserved sample rate index")]
    BadSampleRate,
    #[error("reserved layer")]
    BadLayer,
    #[error("reserved MPEG version")]
    BadVersion,
    #[error("channel mode not allowed at this Layer II bit rate")]
    ModeNotAllowed,
}
crate::common::assert_error_traits!(HeaderError);

#[inline]
fn sync(h: u32) -> u32 {
    (h >> 21) & 0x7ff
}
#[inline]
fn version_bits(h: u32) -> u32 {
    (h >> 19) & 3
}
#[inline]
fn layer_bits(h: u32) -> u32 {
    (h >> 17) & 3
}
#[inline]
fn bit_rate_index(h: u32) -> usize {
    ((h >> 12) & 0xf) as usize
}
#[inline]
fn sample_rate_index(h: u32) -> usize {
    ((h >> 10) & 3) as usize
}
#[inline]
fn emphasis(h: u32) -> u32 {
    h & 3
}

/// Checks whether `bytes` can be the header of an MPEG audio frame.
///
/// Free format and reserved fields are rejected, as are MPEG-1 Layer II
/// channel modes the standard forbids at the given bit rate. A reserved
/// emphasis value (2) is accepted and skips the Layer II mode check.
pub fn check_frame_header(bytes: [u8; 4]) -> Result<(), HeaderError> {
    let h = u32::from_be_bytes(bytes);

    if sync(h) != 0x7ff {
        return Err(HeaderError::NoSync);
    }
    let bit_rate_index = bit_rate_index(h);
    if bit_rate_index == 0 || bit_rate_index == 0xf {
        return Err(HeaderError::BadBitRate);
    }
    if sample_rate_index(h) == 3 {
        return Err(HeaderError::BadSampleRate);
    }
    if layer_bits(h) == 0 {
        return Err(HeaderError::BadLayer);
    }
    if version_bits(h) == 1 {
        return Err(HeaderError::BadVersion);
    }
    if emphasis(h) == 2 {
        return Ok(());
    }

    if layer_bits(h) == 2 && version_bits(h) == 3 {
        let mono = ChannelMode::from_bits(h >> 6) == ChannelMode::Mono;
        if !LAYER2_ALLOWED_MODES[bit_rate_index][usize::from(mono)] {
            return Err(HeaderError::ModeNotAllowed);
        }
    }
    Ok(())
}

/// Stream parameters carried by one frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: Version,
    pub layer: Layer,
    pub bit_rate: BitRate,
    pub sample_rate: SampleRate,
    pub channel_mode: ChannelMode,
    pub channels: ChannelCount,
    /// Raw protection bit. Zero means a CRC follows the header.
    pub protection_bit: u8,
    pub padded: bool,
    pub emphasis: u8,
    /// Frame length in bytes, header included.
    pub frame_size: u32,
}

impl FrameHeader {
    /// Decodes a header without validating it.
    ///
    /// Use [`check_frame_header`] first; invalid input still decodes to
    /// something, with a reserved layer read as Layer III and an unknown
    /// sample rate producing a fixed 417 byte frame.
    pub fn decode(bytes: [u8; 4]) -> Self {
        let h = u32::from_be_bytes(bytes);

        let version = match version_bits(h) {
            0 => Version::Mpeg25,
            2 => Version::Mpeg2,
            _ => Version::Mpeg1,
        };
        let layer = match layer_bits(h) {
            3 => Layer::Layer1,
            2 => Layer::Layer2,
            _ => Layer::Layer3,
        };

        let sample_rate = SAMPLE_RATES[version.index()][sample_rate_index(h)];
        let rate_class = usize::from(version != Version::Mpeg1);
        let layer_index = layer.index().unwrap_or(2);
        let bit_rate = BIT_RATES[rate_class][layer_index]
            .get(bit_rate_index(h))
            .map_or(0, |&kbps| BitRate::from(kbps) * 1000);

        let channel_mode = ChannelMode::from_bits(h >> 6);
        let padded = (h >> 9) & 1 == 1;

        let frame_size = frame_size(version, layer, bit_rate, sample_rate, padded);

        FrameHeader {
            version,
            layer,
            bit_rate,
            sample_rate,
            channel_mode,
            channels: channel_mode.channels(),
            protection_bit: ((h >> 16) & 1) as u8,
            padded,
            emphasis: emphasis(h) as u8,
            frame_size,
        }
    }

    /// Validates and decodes in one go.
    pub fn parse(bytes: [u8; 4]) -> Result<Self, HeaderError> {
        check_frame_header(bytes).map(|()| Self::decode(bytes))
    }
}

fn frame_size(
    version: Version,
    layer: Layer,
    bit_rate: BitRate,
    sample_rate: SampleRate,
    padded: bool,
) -> u32 {
    if sample_rate == 0 {
        return FALLBACK_FRAME_SIZE;
    }
    let pad = u32::from(padded);
    match layer {
        Layer::Layer1 => (bit_rate * 12 / sample_rate + pad) * 4,
        Layer::Layer3 if version != Version::Mpeg1 => bit_rate * 72 / sample_rate + pad,
        _ => bit_rate * 144 / sample_rate + pad,
    }
}

/// Duration of one frame in 1/1000 ms.
///
/// Unknown sample rates are looked up as 44.1 kHz.
pub fn frame_duration(sample_rate: SampleRate, layer: Layer) -> u32 {
    let rate = DURATION_SAMPLE_RATES
        .iter()
        .position(|&r| r == sample_rate)
        .unwrap_or(1);
    let layer = match layer {
        Layer::Layer1 => 0,
        Layer::Layer2 => 1,
        _ => 2,
    };
    FRAME_DURATIONS[layer][rate]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use quickcheck::{quickcheck, TestResult};
    use rstest::rstest;

    pub(crate) fn header(
        version: u32,
        layer: u32,
        bit_rate: u32,
        sample_rate: u32,
        padding: u32,
        mode: u32,
    ) -> [u8; 4] {
        let h = 0xffe0_0000
            | version << 19
            | layer << 17
            | 1 << 16
            | bit_rate << 12
            | sample_rate << 10
            | padding << 9
            | mode << 6;
        h.to_be_bytes()
    }

    #[rstest]
    #[case::mpeg1_l3_128k(3, 1, 9, 0, 0, 417)]
    #[case::mpeg1_l3_128k_padded(3, 1, 9, 0, 1, 418)]
    #[case::mpeg1_l1_384k(3, 3, 12, 1, 0, 384)]
    #[case::mpeg1_l2_192k(3, 2, 10, 1, 0, 576)]
    #[case::mpeg2_l3_64k(2, 1, 8, 0, 0, 208)]
    #[case::mpeg25_l3_32k(0, 1, 4, 0, 0, 208)]
    #[case::mpeg2_l1_128k(2, 3, 8, 1, 0, 256)]
    #[case::mpeg2_l2_64k(2, 2, 8, 2, 0, 576)]
    #[case::mpeg25_l1_32k(0, 3, 1, 2, 0, 192)]
    #[case::mpeg25_l2_8k(0, 2, 1, 2, 0, 144)]
    fn frame_sizes(
        #[case] version: u32,
        #[case] layer: u32,
        #[case] bit_rate: u32,
        #[case] sample_rate: u32,
        #[case] padding: u32,
        #[case] expected: u32,
    ) {
        let bytes = header(version, layer, bit_rate, sample_rate, padding, 0);
        let frame = FrameHeader::parse(bytes).unwrap();
        assert_eq!(frame.frame_size, expected);
    }

    #[test]
    fn decodes_common_header() {
        let frame = FrameHeader::parse([0xff, 0xfb, 0x90, 0x64]).unwrap();
        assert_eq!(frame.version, Version::Mpeg1);
        assert_eq!(frame.layer, Layer::Layer3);
        assert_eq!(frame.bit_rate, 128_000);
        assert_eq!(frame.sample_rate, 44_100);
        assert_eq!(frame.channel_mode, ChannelMode::JointStereo);
        assert_eq!(frame.channels, 2);
        assert_eq!(frame.protection_bit, 1);
        assert_eq!(frame.frame_size, 417);
    }

    #[rstest]
    #[case::no_sync([0xff, 0x7b, 0x90, 0x00], HeaderError::NoSync)]
    #[case::free_format(header(3, 1, 0, 0, 0, 0), HeaderError::BadBitRate)]
    #[case::bad_bit_rate(header(3, 1, 15, 0, 0, 0), HeaderError::BadBitRate)]
    #[case::reserved_rate(header(3, 1, 9, 3, 0, 0), HeaderError::BadSampleRate)]
    #[case::reserved_layer(header(3, 0, 9, 0, 0, 0), HeaderError::BadLayer)]
    #[case::reserved_version(header(1, 1, 9, 0, 0, 0), HeaderError::BadVersion)]
    #[case::layer2_stereo_at_32k(header(3, 2, 1, 0, 0, 0), HeaderError::ModeNotAllowed)]
    #[case::layer2_mono_at_384k(header(3, 2, 14, 0, 0, 3), HeaderError::ModeNotAllowed)]
    fn rejects(#[case] bytes: [u8; 4], #[case] expected: HeaderError) {
        assert_eq!(check_frame_header(bytes), Err(expected));
    }

    #[test]
    fn layer2_mode_rules() {
        assert!(check_frame_header(header(3, 2, 1, 0, 0, 3)).is_ok());
        assert!(check_frame_header(header(3, 2, 14, 0, 0, 1)).is_ok());
        // only MPEG-1 is restricted
        assert!(check_frame_header(header(2, 2, 1, 0, 0, 0)).is_ok());
    }

    #[test]
    fn reserved_emphasis_is_accepted() {
        let mut bytes = header(3, 2, 1, 0, 0, 0);
        bytes[3] |= 2;
        assert!(check_frame_header(bytes).is_ok());
    }

    #[test]
    fn frame_durations() {
        assert_eq!(frame_duration(44_100, Layer::Layer3), 26_120);
        assert_eq!(frame_duration(8_000, Layer::Layer1), 48_000);
        assert_eq!(frame_duration(22_050, Layer::Layer2), 52_244);
        assert_eq!(frame_duration(0, Layer::Unknown), 26_120);
    }

    quickcheck! {
        fn valid_headers_have_sane_frames(h: u32) -> TestResult {
            let bytes = (h | 0xffe0_0000).to_be_bytes();
            if check_frame_header(bytes).is_err() {
                return TestResult::discard();
            }
            let frame = FrameHeader::decode(bytes);
            TestResult::from_bool(
                frame.sample_rate > 0
                    && frame.bit_rate > 0
                    && frame.layer != Layer::Unknown
                    && frame.frame_size > FRAME_HEADER_SIZE as u32,
            )
        }
    }
}
