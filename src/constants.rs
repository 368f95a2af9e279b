//! Tuning constants of the frame scanner, tag reader and stream adapter.
//!
//! The thresholds are part of the observable behaviour: changing any of them
//! changes how real world files get classified.

/// Frames sampled before a stream with stable attributes is declared CBR.
pub const MAXIMUM_VALID_FRAME_COUNT: u32 = 16;

/// Unchanged layer observations before the final layer is locked.
pub const MAX_LAYER_NO_CHANGE_COUNT: u32 = 64;
/// Unchanged sample rate observations before the final sample rate is locked.
pub const MAX_SAMPLE_RATE_NO_CHANGE_COUNT: u32 = 16;
/// Unchanged version observations before the final version is locked.
pub const MAX_VERSION_NO_CHANGE_COUNT: u32 = 16;
/// Unchanged bit rate observations before the final bit rate is locked.
pub const MAX_BITRATE_NO_CHANGE_COUNT: u32 = 16;

/// Bit rate changes tolerated before a stream is treated as VBR.
pub const MAX_BITRATE_CHANGE_COUNT: u32 = 16;

/// Layer changes above which a stream counts as severely corrupted.
pub const LAYER_CHANGE_COUNT: u32 = 512;
/// Version changes above which a stream counts as severely corrupted.
pub const VERSION_CHANGE_COUNT: u32 = 512;
/// Sample rate changes above which a stream counts as severely corrupted.
pub const SAMPLE_RATE_CHANGE_COUNT: u32 = 512;

/// Bytes scanned without finding a frame header before giving up.
pub const MAX_SYNC_NOT_FOUND_COUNT: u32 = 640 * 1024;

/// Size of the window searched for a frame header.
pub const MAX_HEADER_PARSING_SIZE: usize = 64;

/// Stacked ID3v2 tags skipped in front of the audio data.
pub const MAX_ID3_TAG_COUNT: usize = 5;

/// Size of the ID3v1 trailer.
pub const ID3V1_TAG_SIZE: u64 = 128;

/// Size of an ID3v2 tag header.
pub const ID3V2_HEADER_SIZE: usize = 10;

/// Chunk read per step of the backward last frame scan.
pub const BUFFER_CHUNK_SIZE: u64 = 2048;
/// Smallest chunk the backward scan works with.
pub const BUFFER_MIN_CHUNK_SIZE: u64 = 32;
/// Span from the end of the file the backward scan may cover.
pub const BUFFER_MAX_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Entries in a Xing TOC.
pub const XING_TOC_SIZE: usize = 100;
/// Zero entries a Xing TOC may hold before it is deemed corrupted.
pub const XING_TOC_TABLE_ZEROS_MAX_SIZE: usize = 1;

/// Largest VBRI seek table accepted.
pub const VBRI_MAX_TABLE_SIZE: usize = 512;

/// Bytes read from the first frame when probing for a VBR header. Large
/// enough for a full VBRI table.
pub const VBR_HEADER_READ_SIZE: usize = 4096;

/// Bytes handed out per work unit.
pub const DEFAULT_READ_SIZE: usize = 2 * 1024;

/// Smallest number of buffers a consumer must provide.
pub const MIN_BUFFERS: u32 = 4;
/// Largest number of buffers a consumer may provide.
pub const MAX_BUFFERS: u32 = 16;
/// Size of each work unit buffer.
pub const BUFFER_SIZE: usize = 4096;
/// Alignment of each work unit buffer.
pub const BUFFER_ALIGNMENT: usize = 4;

/// Sample size reported for decoded output.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Playback rate that means "normal speed".
pub const NORMAL_RATE: i32 = 1000;
