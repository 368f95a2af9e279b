/// MPEG-1 Layer III, 44.1 kHz, stereo.
const HEADER_128K: [u8; 4] = [0xff, 0xfb, 0x90, 0x00];
const HEADER_192K: [u8; 4] = [0xff, 0xfb, 0xb0, 0x00];
const FRAME_128K: usize = 417;
const FRAME_192K: usize = 626;

/// About three minutes of audio.
const FRAMES: usize = 7000;

fn frame(header: [u8; 4], size: usize) -> impl Iterator<Item = u8> {
    header.into_iter().chain(std::iter::repeat_n(0, size - 4))
}

pub fn cbr_stream() -> Vec<u8> {
    (0..FRAMES).flat_map(|_| frame(HEADER_128K, FRAME_128K)).collect()
}

/// Bit rate changing every few frames and no VBR header, so every frame
/// up to the end has to be visited.
pub fn vbr_stream() -> Vec<u8> {
    (0..FRAMES)
        .flat_map(|i| {
            let (header, size) = if i % 3 == 0 {
                (HEADER_192K, FRAME_192K)
            } else {
                (HEADER_128K, FRAME_128K)
            };
            frame(header, size)
        })
        .collect()
}

pub fn xing_stream() -> Vec<u8> {
    let mut data = cbr_stream();
    let toc: Vec<u8> = (0..100).map(|i| (i * 256 / 100) as u8).collect();
    let mut body = b"Xing".to_vec();
    body.extend_from_slice(&0x7u32.to_be_bytes());
    body.extend_from_slice(&(FRAMES as u32).to_be_bytes());
    body.extend_from_slice(&(data.len() as u32).to_be_bytes());
    body.extend_from_slice(&toc);
    data[36..36 + body.len()].copy_from_slice(&body);
    data
}
