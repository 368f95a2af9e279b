use crate::common::log_debug;
use crate::constants::ID3V2_HEADER_SIZE;
use crate::parser::ParserError;
use crate::utils::{synchsafe_u32, ByteCursor};

use super::{Metadata, MetadataEntry, MetadataKind, TextEncoding};

const FLAG_EXTENDED_HEADER: u8 = 1 << 6;

/// The ten byte header in front of every ID3v2 tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Id3v2Header {
    pub major: u8,
    pub flags: u8,
    /// Size of the tag body, header excluded.
    pub size: u32,
}

impl Id3v2Header {
    /// Returns `None` when `bytes` do not start with the `ID3` marker.
    pub(crate) fn parse(bytes: &[u8; ID3V2_HEADER_SIZE]) -> Option<Self> {
        if &bytes[..3] != b"ID3" {
            return None;
        }
        Some(Self {
            major: bytes[3],
            flags: bytes[5],
            size: synchsafe_u32([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }

    /// Header and body together.
    pub(crate) fn total_size(&self) -> u64 {
        u64::from(self.size) + ID3V2_HEADER_SIZE as u64
    }
}

/// Reads the frames of a tag body into `meta`.
///
/// Frames that cannot be decoded are skipped. Parsing stops at the first
/// padding (all zero) frame id or at a frame claiming more bytes than the
/// tag has left.
pub(crate) fn parse(header: &Id3v2Header, body: &[u8], meta: &mut Metadata) -> Result<(), ParserError> {
    if !(2..=4).contains(&header.major) {
        return Err(ParserError::UnsupportedTag { major: header.major });
    }
    let v22 = header.major == 2;
    let mut cursor = ByteCursor::new(body);

    if header.flags & FLAG_EXTENDED_HEADER != 0 && !v22 {
        let skip = if header.major == 3 {
            cursor.be_u32()
        } else {
            cursor.synchsafe_u32().map(|size| size.saturating_sub(4))
        };
        skip.and_then(|n| cursor.skip(n as usize))
            .ok_or(ParserError::FailedToGetData)?;
    }

    while let Some((id, size)) = frame_header(&mut cursor, header.major) {
        if id.iter().all(|&b| b == 0) {
            break;
        }
        let Some(data) = cursor.bytes(size) else {
            log_debug!(
                "id3v2 frame {:?} at byte {} claims {size} bytes, only {} left",
                String::from_utf8_lossy(id),
                cursor.position(),
                cursor.remaining()
            );
            break;
        };
        if let Err(err) = read_frame(id, data, v22, meta) {
            log_debug!("skipping id3v2 frame {:?}: {err}", String::from_utf8_lossy(id));
        }
    }
    Ok(())
}

fn frame_header<'a>(cursor: &mut ByteCursor<'a>, major: u8) -> Option<(&'a [u8], usize)> {
    let mut ahead = cursor.clone();
    let parsed = match major {
        2 => {
            let id = ahead.bytes(3)?;
            (id, ahead.be_u24()?)
        }
        3 => {
            let id = ahead.bytes(4)?;
            let size = ahead.be_u32()?;
            ahead.skip(2)?;
            (id, size)
        }
        _ => {
            let id = ahead.bytes(4)?;
            let size = ahead.synchsafe_u32()?;
            ahead.skip(2)?;
            (id, size)
        }
    };
    *cursor = ahead;
    Some((parsed.0, parsed.1 as usize))
}

fn read_frame(id: &[u8], data: &[u8], v22: bool, meta: &mut Metadata) -> Result<(), ParserError> {
    match (id, v22) {
        (b"APIC", false) => return read_picture(data, meta),
        (b"PIC", true) => return read_picture_v22(data, meta),
        _ => {}
    }
    let Some(kind) = MetadataKind::from_frame_id(id, v22) else {
        return Ok(());
    };

    let (start, encoding) = match data {
        [0, ..] => (1, TextEncoding::Utf8),
        [1, 0xff, 0xfe, ..] => (3, TextEncoding::Utf16),
        _ => return Err(ParserError::FailedToGetData),
    };
    meta.set_if_empty(kind, MetadataEntry::new(&data[start..], encoding));
    Ok(())
}

// Description strings are NUL terminated in the frame's text encoding.
fn skip_description(cursor: &mut ByteCursor<'_>, text_encoding: u8) -> Option<()> {
    if text_encoding == 1 {
        while cursor.be_u16()? != 0 {}
        Some(())
    } else {
        cursor.until_nul().map(|_| ())
    }
}

fn read_picture(data: &[u8], meta: &mut Metadata) -> Result<(), ParserError> {
    let picture = apic(data).ok_or(ParserError::FailedToGetData)?;
    meta.set_cover_art_if_empty(picture);
    Ok(())
}

fn read_picture_v22(data: &[u8], meta: &mut Metadata) -> Result<(), ParserError> {
    let picture = pic(data).ok_or(ParserError::FailedToGetData)?;
    meta.set_cover_art_if_empty(picture);
    Ok(())
}

// encoding, mime type, picture type, description, data
fn apic(data: &[u8]) -> Option<MetadataEntry> {
    let mut cursor = ByteCursor::new(data);
    let text_encoding = cursor.u8().filter(|&e| e <= 1)?;
    let mime = cursor.until_nul()?;
    let _picture_type = cursor.u8()?;
    skip_description(&mut cursor, text_encoding)?;

    let encoding = if mime.eq_ignore_ascii_case(b"image/jpeg")
        || mime.eq_ignore_ascii_case(b"image/jpg")
    {
        TextEncoding::Jpeg
    } else if mime.eq_ignore_ascii_case(b"image/png") {
        TextEncoding::Png
    } else {
        TextEncoding::Other
    };
    Some(MetadataEntry::new(cursor.rest(), encoding))
}

// encoding, three letter image format, picture type, description, data
fn pic(data: &[u8]) -> Option<MetadataEntry> {
    let mut cursor = ByteCursor::new(data);
    let text_encoding = cursor.u8().filter(|&e| e <= 1)?;
    let format = cursor.bytes(3)?;
    let _picture_type = cursor.u8()?;
    skip_description(&mut cursor, text_encoding)?;

    let encoding = match format {
        b"JPG" => TextEncoding::Jpeg,
        b"PNG" => TextEncoding::Png,
        _ => TextEncoding::Other,
    };
    Some(MetadataEntry::new(cursor.rest(), encoding))
}
