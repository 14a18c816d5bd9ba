use crate::common::error::{ProbeError, Result};
use crate::common::properties::PropertyMap;
use crate::common::text::TextDecoder;
use crate::id3::keys;
use crate::id3::specs;

pub const TAG_LEN: usize = 128;

/// Check if file data ends with an ID3v1 tag.
/// Returns the offset of the TAG if found.
pub fn find_id3v1(data: &[u8]) -> Option<usize> {
    if data.len() < TAG_LEN {
        return None;
    }
    let tag_offset = data.len() - TAG_LEN;
    if &data[tag_offset..tag_offset + 3] == b"TAG" {
        Some(tag_offset)
    } else {
        None
    }
}

/// Fixed fields of the 128-byte trailer: key and byte range.
const TEXT_FIELDS: [(&str, usize, usize); 5] = [
    (keys::TITLE, 3, 33),
    (keys::AUTHOR, 33, 63),
    (keys::ALBUM, 63, 93),
    (keys::DATE, 93, 97),
    (keys::COMMENT, 97, 126),
];

/// Parse an ID3v1 tag. `data` must start with "TAG".
///
/// A field that cannot be read is left out; empty values are never stored.
pub fn parse_id3v1(data: &[u8], decoder: &TextDecoder) -> Result<PropertyMap> {
    if data.get(..3) != Some(b"TAG".as_slice()) {
        return Err(ProbeError::TruncatedTag {
            offset: 0,
            needed: 3,
        });
    }

    let mut fields = PropertyMap::new();
    for (key, start, end) in TEXT_FIELDS {
        match data.get(start..end) {
            Some(raw) => {
                let value = decode_v1_string(raw, decoder);
                if !value.is_empty() {
                    fields.insert(key, value);
                }
            }
            None => log::debug!("ID3v1 field {} out of range", key),
        }
    }

    if let Some(&track) = data.get(126) {
        fields.insert(keys::TRACK, itoa::Buffer::new().format(track).to_string());
    }
    if let Some(genre) = data.get(127).and_then(|&g| specs::genre_name(g)) {
        fields.insert(keys::GENRE, genre);
    }

    Ok(fields)
}

/// Decode an ID3v1 fixed-length string, cut at the first NUL and trimmed.
fn decode_v1_string(data: &[u8], decoder: &TextDecoder) -> String {
    specs::trim_value(&decoder.decode(data)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(text: &[u8], width: usize) -> Vec<u8> {
        let mut out = text.to_vec();
        out.resize(width, 0);
        out
    }

    fn make_tag(title: &[u8], artist: &[u8], album: &[u8], year: &[u8], comment: &[u8], track: u8, genre: u8) -> Vec<u8> {
        let mut tag = b"TAG".to_vec();
        tag.extend(field(title, 30));
        tag.extend(field(artist, 30));
        tag.extend(field(album, 30));
        tag.extend(field(year, 4));
        tag.extend(field(comment, 29));
        tag.push(track);
        tag.push(genre);
        assert_eq!(tag.len(), TAG_LEN);
        tag
    }

    #[test]
    fn fixed_offsets() {
        let tag = make_tag(b"Title  ", b"Artist", b"Album", b"1984", b"Comment\0junk", 7, 13);
        let fields = parse_id3v1(&tag, &TextDecoder::default()).unwrap();
        assert_eq!(fields.get_text(keys::TITLE), Some("Title"));
        assert_eq!(fields.get_text(keys::AUTHOR), Some("Artist"));
        assert_eq!(fields.get_text(keys::ALBUM), Some("Album"));
        assert_eq!(fields.get_text(keys::DATE), Some("1984"));
        assert_eq!(fields.get_text(keys::COMMENT), Some("Comment"));
        assert_eq!(fields.get_text(keys::TRACK), Some("7"));
        assert_eq!(fields.get_text(keys::GENRE), Some("Pop"));
    }

    #[test]
    fn out_of_table_genre_is_ignored() {
        let tag = make_tag(b"T", b"", b"", b"", b"", 0, 255);
        let fields = parse_id3v1(&tag, &TextDecoder::default()).unwrap();
        assert!(!fields.contains_key(keys::GENRE));
        assert!(!fields.contains_key(keys::AUTHOR));
        assert_eq!(fields.get_text(keys::TRACK), Some("0"));
    }

    #[test]
    fn short_buffer_keeps_readable_fields() {
        let tag = make_tag(b"Only title", b"Artist", b"", b"", b"", 1, 1);
        let fields = parse_id3v1(&tag[..50], &TextDecoder::default()).unwrap();
        assert_eq!(fields.get_text(keys::TITLE), Some("Only title"));
        assert!(!fields.contains_key(keys::AUTHOR));
        assert!(!fields.contains_key(keys::TRACK));
    }

    #[test]
    fn find_at_end() {
        let mut data = vec![0u8; 300];
        data.extend(make_tag(b"x", b"", b"", b"", b"", 0, 0));
        assert_eq!(find_id3v1(&data), Some(300));
        assert_eq!(find_id3v1(&data[..200]), None);
    }
}
