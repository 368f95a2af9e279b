use super::{genre_name, Metadata, MetadataEntry, MetadataKind, TextEncoding};

/// Length of the fixed ID3v1 trailer.
pub(crate) const TAG_LEN: usize = 128;

fn field(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn ascii(bytes: &[u8]) -> MetadataEntry {
    MetadataEntry::new(field(bytes), TextEncoding::Ascii)
}

/// Fills the slots of `meta` that are still empty from an ID3v1 trailer.
///
/// Returns `false` when `tag` does not start with the `TAG` marker.
pub(crate) fn parse(tag: &[u8], meta: &mut Metadata) -> bool {
    if tag.len() < TAG_LEN || &tag[..3] != b"TAG" {
        return false;
    }

    meta.set_if_empty(MetadataKind::Title, ascii(&tag[3..33]));
    meta.set_if_empty(MetadataKind::Artist, ascii(&tag[33..63]));
    meta.set_if_empty(MetadataKind::Album, ascii(&tag[63..93]));
    meta.set_if_empty(MetadataKind::Year, ascii(&tag[93..97]));

    // ID3v1.1 steals the last two comment bytes for a track number
    let track = (tag[125] == 0 && tag[126] != 0).then_some(tag[126]);
    let comment_len = if track.is_some() { 28 } else { 30 };
    meta.set_if_empty(MetadataKind::Comment, ascii(&tag[97..97 + comment_len]));

    if let Some(track) = track {
        meta.set_if_empty(
            MetadataKind::TrackNumber,
            MetadataEntry::new(track.to_string(), TextEncoding::Ascii),
        );
    }
    if let Some(genre) = genre_name(tag[127]) {
        meta.set_if_empty(
            MetadataKind::Genre,
            MetadataEntry::new(genre, TextEncoding::Ascii),
        );
    }
    true
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn tag(title: &str, artist: &str, comment: &str, track: u8, genre: u8) -> Vec<u8> {
        let mut tag = vec![0u8; TAG_LEN];
        tag[..3].copy_from_slice(b"TAG");
        tag[3..3 + title.len()].copy_from_slice(title.as_bytes());
        tag[33..33 + artist.len()].copy_from_slice(artist.as_bytes());
        tag[93..97].copy_from_slice(b"1999");
        tag[97..97 + comment.len()].copy_from_slice(comment.as_bytes());
        if track != 0 {
            tag[125] = 0;
            tag[126] = track;
        }
        tag[127] = genre;
        tag
    }

    fn text(meta: &Metadata, kind: MetadataKind) -> Option<String> {
        meta.get(kind).and_then(MetadataEntry::to_string_lossy)
    }

    #[test]
    fn reads_v11_fields() {
        let mut meta = Metadata::default();
        assert!(parse(&tag("Song", "Band", "nice", 7, 17), &mut meta));
        assert_eq!(text(&meta, MetadataKind::Title).as_deref(), Some("Song"));
        assert_eq!(text(&meta, MetadataKind::Artist).as_deref(), Some("Band"));
        assert_eq!(text(&meta, MetadataKind::Year).as_deref(), Some("1999"));
        assert_eq!(text(&meta, MetadataKind::Comment).as_deref(), Some("nice"));
        assert_eq!(text(&meta, MetadataKind::TrackNumber).as_deref(), Some("7"));
        assert_eq!(text(&meta, MetadataKind::Genre).as_deref(), Some("Rock"));
        assert!(!meta.is_set(MetadataKind::Album));
    }

    #[test]
    fn v10_comment_uses_full_field() {
        let comment = "abcdefghijklmnopqrstuvwxyz0123";
        let mut meta = Metadata::default();
        assert!(parse(&tag("", "", comment, 0, 200), &mut meta));
        assert_eq!(text(&meta, MetadataKind::Comment).as_deref(), Some(comment));
        assert!(!meta.is_set(MetadataKind::TrackNumber));
        assert!(!meta.is_set(MetadataKind::Genre));
        assert!(!meta.is_set(MetadataKind::Title));
    }

    #[test]
    fn keeps_existing_entries() {
        let mut meta = Metadata::default();
        meta.set_if_empty(
            MetadataKind::Title,
            MetadataEntry::new("From v2", TextEncoding::Utf8),
        );
        assert!(parse(&tag("From v1", "", "", 0, 0), &mut meta));
        assert_eq!(text(&meta, MetadataKind::Title).as_deref(), Some("From v2"));
    }

    #[test]
    fn rejects_missing_marker() {
        let mut meta = Metadata::default();
        assert!(!parse(&[0u8; TAG_LEN], &mut meta));
        assert!(!parse(b"TAG", &mut meta));
    }
}
