#![allow(dead_code)]
//! Shared by the integration tests, kept in a directory so cargo does not
//! build it as a test of its own.
//!
//! Builders for synthetic MP3 streams. Frames carry a valid header and a
//! silent (all zero) body, which is all the parser looks at.

use std::io::Cursor;

use mp3parse::{Mp3Parser, Mp3Stream};

/// MPEG-1 Layer III, 44.1 kHz, stereo.
pub const HEADER_128K: [u8; 4] = [0xff, 0xfb, 0x90, 0x00];
pub const HEADER_160K: [u8; 4] = [0xff, 0xfb, 0xa0, 0x00];
pub const FRAME_128K: usize = 417;
pub const FRAME_160K: usize = 522;

pub const XING_TOC_SIZE: usize = 100;

pub fn frame(header: [u8; 4], size: usize) -> Vec<u8> {
    let mut frame = vec![0u8; size];
    frame[..4].copy_from_slice(&header);
    frame
}

/// `count` frames of 128 kbit/s.
pub fn cbr_frames(count: usize) -> Vec<u8> {
    (0..count).flat_map(|_| frame(HEADER_128K, FRAME_128K)).collect()
}

/// `count` frames switching between 128 and 160 kbit/s.
pub fn alternating_frames(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| {
            if i % 2 == 0 {
                frame(HEADER_128K, FRAME_128K)
            } else {
                frame(HEADER_160K, FRAME_160K)
            }
        })
        .collect()
}

/// Seek table with entry `i` at `i` percent of the stream.
pub fn linear_toc() -> [u8; XING_TOC_SIZE] {
    std::array::from_fn(|i| (i * 256 / 100) as u8)
}

/// 128 kbit/s frame carrying a Xing header with every optional field.
pub fn xing_frame(frames: u32, bytes: u32, toc: &[u8; XING_TOC_SIZE]) -> Vec<u8> {
    let mut frame = frame(HEADER_128K, FRAME_128K);
    let mut body = b"Xing".to_vec();
    body.extend_from_slice(&0xfu32.to_be_bytes());
    body.extend_from_slice(&frames.to_be_bytes());
    body.extend_from_slice(&bytes.to_be_bytes());
    body.extend_from_slice(toc);
    body.extend_from_slice(&50i32.to_be_bytes());
    // stereo MPEG-1 has 32 bytes of side information
    frame[36..36 + body.len()].copy_from_slice(&body);
    frame
}

/// 128 kbit/s frame carrying a VBRI header with `entries` table segments of
/// `segment` bytes, each covering `entry_frames` frames.
pub fn vbri_frame(frames: u32, entries: u16, segment: u32, entry_frames: u16) -> Vec<u8> {
    let mut frame = frame(HEADER_128K, FRAME_128K);
    let mut body = b"VBRI".to_vec();
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&75u16.to_be_bytes());
    body.extend_from_slice(&(u32::from(entries) * segment).to_be_bytes());
    body.extend_from_slice(&frames.to_be_bytes());
    body.extend_from_slice(&entries.to_be_bytes());
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&4u16.to_be_bytes());
    body.extend_from_slice(&entry_frames.to_be_bytes());
    for _ in 0..entries {
        body.extend_from_slice(&segment.to_be_bytes());
    }
    frame[36..36 + body.len()].copy_from_slice(&body);
    frame
}

/// Xing frame followed by `frames - 1` audio frames.
pub fn xing_stream(frames: u32) -> Vec<u8> {
    let bytes = frames * FRAME_128K as u32;
    let mut data = xing_frame(frames, bytes, &linear_toc());
    data.extend(cbr_frames(frames as usize - 1));
    data
}

fn synchsafe(size: u32) -> [u8; 4] {
    [
        ((size >> 21) & 0x7f) as u8,
        ((size >> 14) & 0x7f) as u8,
        ((size >> 7) & 0x7f) as u8,
        (size & 0x7f) as u8,
    ]
}

/// ID3v2.3 tag with one UTF-8 text frame per `(id, text)` pair and some
/// padding.
pub fn id3v2_tag(frames: &[(&[u8; 4], &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, text) in frames {
        body.extend_from_slice(*id);
        body.extend_from_slice(&(text.len() as u32 + 1).to_be_bytes());
        body.extend_from_slice(&[0, 0, 0]);
        body.extend_from_slice(text.as_bytes());
    }
    body.extend_from_slice(&[0u8; 32]);

    let mut tag = b"ID3\x03\x00\x00".to_vec();
    tag.extend_from_slice(&synchsafe(body.len() as u32));
    tag.extend(body);
    tag
}

/// ID3v1.1 trailer.
pub fn id3v1_tag(title: &str, artist: &str, track: u8, genre: u8) -> Vec<u8> {
    let mut tag = vec![0u8; 128];
    tag[..3].copy_from_slice(b"TAG");
    tag[3..3 + title.len()].copy_from_slice(title.as_bytes());
    tag[33..33 + artist.len()].copy_from_slice(artist.as_bytes());
    tag[93..97].copy_from_slice(b"2001");
    tag[126] = track;
    tag[127] = genre;
    tag
}

/// ICY metadata block announcing `title`.
pub fn icy_block(title: &str) -> Vec<u8> {
    let text = format!("StreamTitle='{title}';");
    let blocks = text.len().div_ceil(16);
    let mut block = vec![blocks as u8];
    block.extend_from_slice(text.as_bytes());
    block.resize(1 + blocks * 16, 0);
    block
}

pub fn parse(data: Vec<u8>) -> Mp3Parser<Cursor<Vec<u8>>> {
    let mut parser = Mp3Parser::new(Cursor::new(data));
    parser.parse().unwrap();
    parser
}

pub fn stream(data: Vec<u8>) -> Mp3Stream<Cursor<Vec<u8>>> {
    Mp3Parser::builder()
        .with_pipe(Cursor::new(data))
        .build_stream()
        .unwrap()
}
