//! Tag metadata recovered from ID3v1 and ID3v2 tags and ShoutCast streams.
//!
//! Each [`MetadataKind`] has one slot. Slots are filled at most once:
//! the ID3v2 tag is read before the ID3v1 trailer, so v1 only fills in
//! what v2 left empty. The ShoutCast slot is the exception and always holds
//! the latest stream title.

use std::fmt;

mod genre;
pub(crate) mod id3v1;
pub(crate) mod id3v2;

pub use genre::{genre_name, GENRES};

/// Kinds of textual metadata a track can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    Title,
    Album,
    Artist,
    TrackNumber,
    Year,
    Genre,
    Comment,
    Composer,
    Copyright,
    Url,
    EncodedBy,
    Bpm,
    Publisher,
    OriginalArtist,
    AlbumArtist,
}

impl MetadataKind {
    /// Every kind, in slot order.
    pub const ALL: [MetadataKind; 15] = [
        MetadataKind::Title,
        MetadataKind::Album,
        MetadataKind::Artist,
        MetadataKind::TrackNumber,
        MetadataKind::Year,
        MetadataKind::Genre,
        MetadataKind::Comment,
        MetadataKind::Composer,
        MetadataKind::Copyright,
        MetadataKind::Url,
        MetadataKind::EncodedBy,
        MetadataKind::Bpm,
        MetadataKind::Publisher,
        MetadataKind::OriginalArtist,
        MetadataKind::AlbumArtist,
    ];

    /// ID3v2 frame identifier: three characters for v2.2, four otherwise.
    pub fn frame_id(self, v22: bool) -> &'static [u8] {
        let (short, long): (&[u8], &[u8]) = match self {
            MetadataKind::Title => (b"TT2", b"TIT2"),
            MetadataKind::Album => (b"TAL", b"TALB"),
            MetadataKind::Artist => (b"TP1", b"TPE1"),
            MetadataKind::TrackNumber => (b"TRK", b"TRCK"),
            MetadataKind::Year => (b"TYE", b"TYER"),
            MetadataKind::Genre => (b"TCO", b"TCON"),
            MetadataKind::Comment => (b"COM", b"COMM"),
            MetadataKind::Composer => (b"TCM", b"TCOM"),
            MetadataKind::Copyright => (b"TCR", b"TCOP"),
            MetadataKind::Url => (b"WXX", b"WXXX"),
            MetadataKind::EncodedBy => (b"TEN", b"TENC"),
            MetadataKind::Bpm => (b"TBP", b"TBPM"),
            MetadataKind::Publisher => (b"TPB", b"TPUB"),
            MetadataKind::OriginalArtist => (b"TOA", b"TOPE"),
            MetadataKind::AlbumArtist => (b"TP2", b"TPE2"),
        };
        if v22 {
            short
        } else {
            long
        }
    }

    /// Looks up the kind an ID3v2 frame identifier stores.
    pub fn from_frame_id(id: &[u8], v22: bool) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.frame_id(v22) == id)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// How the bytes of a [`MetadataEntry`] are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Ascii,
    Utf8,
    /// Little endian UTF-16, byte order mark stripped.
    Utf16,
    /// JPEG image data.
    Jpeg,
    /// PNG image data.
    Png,
    /// Image data of another type.
    Other,
}

impl TextEncoding {
    /// Terminator bytes appended when the entry is copied out as a C string.
    pub fn terminator_len(self) -> usize {
        match self {
            TextEncoding::Ascii | TextEncoding::Utf8 => 1,
            TextEncoding::Utf16 => 2,
            TextEncoding::Jpeg | TextEncoding::Png | TextEncoding::Other => 0,
        }
    }
}

/// One metadata value and its encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub data: Vec<u8>,
    pub encoding: TextEncoding,
}

impl MetadataEntry {
    pub fn new(data: impl Into<Vec<u8>>, encoding: TextEncoding) -> Self {
        Self {
            data: data.into(),
            encoding,
        }
    }

    /// Decodes textual entries, replacing invalid sequences. Images give `None`.
    pub fn to_string_lossy(&self) -> Option<String> {
        match self.encoding {
            TextEncoding::Ascii | TextEncoding::Utf8 => {
                Some(String::from_utf8_lossy(&self.data).into_owned())
            }
            TextEncoding::Utf16 => {
                let units: Vec<u16> = self
                    .data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                Some(String::from_utf16_lossy(&units))
            }
            TextEncoding::Jpeg | TextEncoding::Png | TextEncoding::Other => None,
        }
    }
}

impl fmt::Debug for MetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MetadataEntry");
        s.field("encoding", &self.encoding);
        match self.to_string_lossy() {
            Some(text) => s.field("text", &text),
            None => s.field("len", &self.data.len()),
        };
        s.finish()
    }
}

/// All metadata slots of one track.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: [Option<MetadataEntry>; 15],
    cover_art: Option<MetadataEntry>,
    shoutcast: Option<MetadataEntry>,
}

impl Metadata {
    pub fn get(&self, kind: MetadataKind) -> Option<&MetadataEntry> {
        self.entries[kind.index()].as_ref()
    }

    pub fn cover_art(&self) -> Option<&MetadataEntry> {
        self.cover_art.as_ref()
    }

    /// Latest ShoutCast stream title.
    pub fn shoutcast_title(&self) -> Option<&MetadataEntry> {
        self.shoutcast.as_ref()
    }

    pub fn is_set(&self, kind: MetadataKind) -> bool {
        self.entries[kind.index()].is_some()
    }

    /// Stores `entry` unless the slot is taken or the entry is empty.
    /// Returns whether it was stored.
    pub(crate) fn set_if_empty(&mut self, kind: MetadataKind, entry: MetadataEntry) -> bool {
        let slot = &mut self.entries[kind.index()];
        if slot.is_some() || entry.data.is_empty() {
            return false;
        }
        *slot = Some(entry);
        true
    }

    pub(crate) fn set_cover_art_if_empty(&mut self, entry: MetadataEntry) -> bool {
        if self.cover_art.is_some() || entry.data.is_empty() {
            return false;
        }
        self.cover_art = Some(entry);
        true
    }

    /// Replaces the ShoutCast title. An empty title clears it.
    pub(crate) fn set_shoutcast_title(&mut self, entry: MetadataEntry) {
        self.shoutcast = (!entry.data.is_empty()).then_some(entry);
    }

    /// Iterates over the filled text slots.
    pub fn iter(&self) -> impl Iterator<Item = (MetadataKind, &MetadataEntry)> {
        MetadataKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|entry| (kind, entry)))
    }
}
