use memchr::memchr;

use crate::common::error::{ProbeError, Result};
use crate::common::properties::PropertyMap;
use crate::common::text::TextDecoder;
use crate::id3::header::{BitPaddedInt, HEADER_LEN};
use crate::id3::specs::{self, Encoding};
use crate::id3::TagVersion;

/// Byte layout of a frame header for one ID3v2 revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub id_len: usize,
    pub size_len: usize,
    /// Identifier, size and (v2.3+) two flag bytes.
    pub header_len: usize,
}

impl FrameLayout {
    pub fn for_version(version: TagVersion) -> Self {
        match version {
            TagVersion::V2_2 => FrameLayout {
                id_len: 3,
                size_len: 3,
                header_len: 6,
            },
            _ => FrameLayout {
                id_len: 4,
                size_len: 4,
                header_len: 10,
            },
        }
    }
}

/// Bounds-checked sub-slice of a tag.
fn slice(tag: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    tag.get(offset..offset.saturating_add(len)).ok_or(ProbeError::TruncatedTag {
        offset,
        needed: offset.saturating_add(len).saturating_sub(tag.len()),
    })
}

/// Read the interpreted frames of a whole ID3v2 tag (header included).
///
/// Parsing stops quietly at the first malformed frame; everything read up to
/// that point is kept. The first frame mapped to a key wins.
pub fn read_frames(tag: &[u8], version: TagVersion, decoder: &TextDecoder) -> PropertyMap {
    let mut fields = PropertyMap::new();
    if let Err(e) = read_frames_into(tag, version, decoder, &mut fields) {
        log::debug!("cannot parse ID3v2 frames: {}", e);
    }
    fields
}

fn read_frames_into(
    tag: &[u8],
    version: TagVersion,
    decoder: &TextDecoder,
    fields: &mut PropertyMap,
) -> Result<()> {
    let layout = FrameLayout::for_version(version);
    let mut pos = HEADER_LEN;

    while pos < tag.len() && (1..=0x7F).contains(&tag[pos]) {
        let header = slice(tag, pos, layout.header_len)?;
        let id = &header[..layout.id_len];
        // Frame sizes are plain big-endian in every revision.
        let size = BitPaddedInt::normal(&header[layout.id_len..layout.id_len + layout.size_len]) as i32;
        if size <= 0 {
            log::trace!("frame {:?} has size {}, stopping", String::from_utf8_lossy(id), size);
            break;
        }
        let size = size as usize;
        pos += layout.header_len;

        let key = match version {
            TagVersion::V2_2 => specs::v22_key(id),
            _ => specs::v23_key(id),
        };
        if let Some(key) = key {
            let skip = match id {
                b"COMM" => comment_skip(tag, pos, 4)?,
                b"COM" => 5,
                _ => 1,
            };
            let value = parse_text(tag, pos, size, skip, decoder)?;
            log::trace!("frame {}: {:?}", String::from_utf8_lossy(id), value);
            if !value.is_empty() && !fields.contains_key(key) {
                fields.insert(key, value);
            }
        }
        pos += size;
    }
    Ok(())
}

/// Offset just past the NUL that ends a comment's language and description.
fn comment_skip(tag: &[u8], pos: usize, prefix: usize) -> Result<usize> {
    let start = pos + prefix;
    let rest = tag.get(start..).unwrap_or(&[]);
    match memchr(0, rest) {
        Some(nul) => Ok(prefix + nul + 1),
        None => Err(ProbeError::TruncatedTag {
            offset: start,
            needed: 1,
        }),
    }
}

/// Decode the text payload of a frame starting at `pos`.
///
/// An encoding byte of 0 sends the bytes after `skip` through the text
/// decoder. Otherwise the declared charset is used, after the encoding
/// byte and an optional "eng" + BOM + double NUL prefix.
pub fn parse_text(tag: &[u8], pos: usize, size: usize, skip: usize, decoder: &TextDecoder) -> Result<String> {
    let payload = slice(tag, pos, size)?;
    let value = if payload[0] == 0 {
        let length = size - specs::trailing_nuls(payload, 1);
        if length < skip {
            return Err(ProbeError::TruncatedTag {
                offset: pos + length,
                needed: skip - length,
            });
        }
        decoder.decode(&payload[skip..length])
    } else {
        let encoding = Encoding::from_byte(payload[0]).ok_or(ProbeError::InvalidTextEncoding(payload[0]))?;
        let mut extra = 1;
        if payload.get(1..4) == Some(b"eng".as_slice()) {
            extra += 3 + 2 + 2;
        }
        let zeros = specs::trailing_nuls(payload.get(extra..).unwrap_or(&[]), 2);
        let length = size.saturating_sub(extra + zeros);
        if length == 0 {
            String::new()
        } else {
            specs::decode_text(&payload[extra..extra + length], encoding)
        }
    };
    Ok(specs::trim_value(&value).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3::keys;

    fn v23_frame(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut frame = id.to_vec();
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(payload);
        frame
    }

    fn v22_frame(id: &[u8; 3], payload: &[u8]) -> Vec<u8> {
        let mut frame = id.to_vec();
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
        frame.extend_from_slice(payload);
        frame
    }

    fn tag(major: u8, frames: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = frames.concat();
        let mut tag = vec![b'I', b'D', b'3', major, 0, 0, 0, 0, 0, 0];
        tag.extend_from_slice(&body);
        tag.extend_from_slice(&[0u8; 16]);
        tag
    }

    #[test]
    fn latin1_title_with_terminator() {
        let data = tag(3, &[v23_frame(b"TIT2", b"\0Pop\0")]);
        let fields = read_frames(&data, TagVersion::V2_3, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::TITLE), Some("Pop"));
    }

    #[test]
    fn v22_and_v23_produce_the_same_keys() {
        let v23 = tag(3, &[v23_frame(b"TIT2", b"\0Song"), v23_frame(b"TPE1", b"\0Band")]);
        let v22 = tag(2, &[v22_frame(b"TT2", b"\0Song"), v22_frame(b"TP1", b"\0Band")]);
        let decoder = TextDecoder::default();
        let a = read_frames(&v23, TagVersion::V2_3, &decoder);
        let b = read_frames(&v22, TagVersion::V2_2, &decoder);
        assert_eq!(a, b);
        assert_eq!(a.get_text(keys::AUTHOR), Some("Band"));
    }

    #[test]
    fn utf16_with_bom() {
        let mut payload = vec![1, 0xFF, 0xFE];
        for unit in "Héllo".encode_utf16() {
            payload.extend_from_slice(&unit.to_le_bytes());
        }
        payload.extend_from_slice(&[0, 0]);
        let data = tag(4, &[v23_frame(b"TALB", &payload)]);
        let fields = read_frames(&data, TagVersion::V2_4, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::ALBUM), Some("Héllo"));
    }

    #[test]
    fn utf8_and_utf16be() {
        let data = tag(
            4,
            &[
                v23_frame(b"TCOM", "\u{3}Dvořák\0".as_bytes()),
                v23_frame(b"TPUB", &[2, 0, b'L', 0, b'a', 0, b'b', 0, 0]),
            ],
        );
        let fields = read_frames(&data, TagVersion::V2_4, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::COMPOSER), Some("Dvořák"));
        assert_eq!(fields.get_text(keys::PUBLISHER), Some("Lab"));
    }

    #[test]
    fn comment_skips_language_and_description() {
        let data = tag(3, &[v23_frame(b"COMM", b"\0engdesc\0Nice track\0")]);
        let fields = read_frames(&data, TagVersion::V2_3, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::COMMENT), Some("Nice track"));

        let data = tag(2, &[v22_frame(b"COM", b"\0eng\0Short\0")]);
        let fields = read_frames(&data, TagVersion::V2_2, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::COMMENT), Some("Short"));
    }

    #[test]
    fn utf16_comment_with_eng_prefix() {
        let mut payload = vec![1, b'e', b'n', b'g', 0xFF, 0xFE, 0, 0, 0xFF, 0xFE];
        for unit in "Hi".encode_utf16() {
            payload.extend_from_slice(&unit.to_le_bytes());
        }
        payload.extend_from_slice(&[0, 0]);
        let data = tag(3, &[v23_frame(b"COMM", &payload)]);
        let fields = read_frames(&data, TagVersion::V2_3, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::COMMENT), Some("Hi"));
    }

    #[test]
    fn first_value_wins_and_unknown_frames_are_skipped() {
        let data = tag(
            3,
            &[
                v23_frame(b"TYER", b"\x001999"),
                v23_frame(b"APIC", &[0xAA; 40]),
                v23_frame(b"TDRC", b"\x002001"),
            ],
        );
        let fields = read_frames(&data, TagVersion::V2_3, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::DATE), Some("1999"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn truncated_frame_keeps_earlier_tags() {
        let mut data = tag(3, &[v23_frame(b"TIT2", b"\0Kept")]);
        data.truncate(data.len() - 16);
        let mut broken = v23_frame(b"TALB", b"\0Lost album");
        broken.truncate(14);
        data.extend_from_slice(&broken);
        let fields = read_frames(&data, TagVersion::V2_3, &TextDecoder::default());
        assert_eq!(fields.get_text(keys::TITLE), Some("Kept"));
        assert!(!fields.contains_key(keys::ALBUM));
    }

    #[test]
    fn zero_size_or_bad_encoding_stops_the_loop() {
        let data = tag(3, &[v23_frame(b"TIT2", b""), v23_frame(b"TALB", b"\0After")]);
        let fields = read_frames(&data, TagVersion::V2_3, &TextDecoder::default());
        assert!(fields.is_empty());

        let data = tag(3, &[v23_frame(b"TIT2", b"\x09Bad"), v23_frame(b"TALB", b"\0After")]);
        let fields = read_frames(&data, TagVersion::V2_3, &TextDecoder::default());
        assert!(fields.is_empty());
    }

    #[test]
    fn size_high_bit_reads_as_negative() {
        let mut frame = b"TIT2".to_vec();
        frame.extend_from_slice(&[0x80, 0, 0, 5, 0, 0]);
        frame.extend_from_slice(b"\0Nope");
        let data = tag(4, &[frame]);
        assert!(read_frames(&data, TagVersion::V2_4, &TextDecoder::default()).is_empty());
    }
}
