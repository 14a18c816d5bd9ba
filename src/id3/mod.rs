pub mod frames;
pub mod header;
pub mod id3v1;
pub mod specs;

use crate::common::error::{ProbeError, Result};
use crate::common::properties::PropertyMap;
use crate::common::text::TextDecoder;
use crate::id3::header::ID3Header;

/// Property keys written by the tag parsers.
pub mod keys {
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const ALBUM: &str = "album";
    pub const DATE: &str = "date";
    pub const COMMENT: &str = "comment";
    pub const COPYRIGHT: &str = "copyright";
    pub const GENRE: &str = "mp3.id3tag.genre";
    pub const TRACK: &str = "mp3.id3tag.track";
    pub const DISC: &str = "mp3.id3tag.disc";
    pub const COMPOSER: &str = "mp3.id3tag.composer";
    pub const GROUPING: &str = "mp3.id3tag.grouping";
    pub const ENCODED: &str = "mp3.id3tag.encoded";
    pub const PUBLISHER: &str = "mp3.id3tag.publisher";
    pub const ORCHESTRA: &str = "mp3.id3tag.orchestra";
    pub const LENGTH: &str = "mp3.id3tag.length";
}

/// Tag revision a parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagVersion {
    V1,
    V2_2,
    V2_3,
    V2_4,
}

impl TagVersion {
    /// Identify the tag at the start of `data`.
    pub fn detect(data: &[u8]) -> Result<Option<Self>> {
        if let Some(header) = ID3Header::parse(data) {
            return header.tag_version().map(Some);
        }
        if data.starts_with(b"TAG") {
            return Ok(Some(TagVersion::V1));
        }
        Ok(None)
    }
}

/// Fields read from one tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Id3Tag {
    pub version: TagVersion,
    pub fields: PropertyMap,
}

impl Id3Tag {
    /// Copy fields into `target` without replacing values it already has.
    pub fn merge_into(&self, target: &mut PropertyMap) {
        for (key, value) in &self.fields {
            if !target.insert_if_empty(key, value.clone()) {
                log::trace!("keeping existing {}", key);
            }
        }
    }
}

/// Reads one family of tag layouts.
pub trait TagParser {
    /// Parse a complete tag starting at `data[0]`.
    ///
    /// Malformed frames end parsing early and keep what was read; only a tag
    /// that cannot be identified at all is an error.
    fn parse_tag(&self, data: &[u8]) -> Result<Id3Tag>;
}

/// The 128-byte "TAG" trailer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3v1Parser {
    decoder: TextDecoder,
}

impl Id3v1Parser {
    pub fn new(decoder: TextDecoder) -> Self {
        Id3v1Parser { decoder }
    }
}

impl TagParser for Id3v1Parser {
    fn parse_tag(&self, data: &[u8]) -> Result<Id3Tag> {
        Ok(Id3Tag {
            version: TagVersion::V1,
            fields: id3v1::parse_id3v1(data, &self.decoder)?,
        })
    }
}

/// ID3v2.2, 2.3 and 2.4 tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3v2Parser {
    decoder: TextDecoder,
}

impl Id3v2Parser {
    pub fn new(decoder: TextDecoder) -> Self {
        Id3v2Parser { decoder }
    }
}

impl TagParser for Id3v2Parser {
    fn parse_tag(&self, data: &[u8]) -> Result<Id3Tag> {
        let header = ID3Header::parse(data).ok_or(ProbeError::TruncatedTag {
            offset: 0,
            needed: header::HEADER_LEN,
        })?;
        let version = header.tag_version()?;
        if header.flags.unsynchronisation {
            log::trace!("ID3v2.{} tag is unsynchronised, reading frames as stored", header.major);
        }
        Ok(Id3Tag {
            version,
            fields: frames::read_frames(data, version, &self.decoder),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_versions() {
        assert_eq!(TagVersion::detect(b"ID3\x02\0\0\0\0\0\0").unwrap(), Some(TagVersion::V2_2));
        assert_eq!(TagVersion::detect(b"ID3\x04\0\0\0\0\0\0").unwrap(), Some(TagVersion::V2_4));
        assert_eq!(TagVersion::detect(b"TAGxyz").unwrap(), Some(TagVersion::V1));
        assert_eq!(TagVersion::detect(b"\xFF\xFB\x90\x64").unwrap(), None);
        assert!(TagVersion::detect(b"ID3\x01\0\0\0\0\0\0").unwrap_err().is_tag_version());
    }

    #[test]
    fn v2_values_win_over_v1() {
        let mut v2 = PropertyMap::new();
        v2.insert(keys::TITLE, "From v2");
        v2.insert(keys::ALBUM, "");

        let mut v1 = PropertyMap::new();
        v1.insert(keys::TITLE, "From v1");
        v1.insert(keys::ALBUM, "Album v1");
        v1.insert(keys::DATE, "1999");
        Id3Tag { version: TagVersion::V1, fields: v1 }.merge_into(&mut v2);

        assert_eq!(v2.get_text(keys::TITLE), Some("From v2"));
        assert_eq!(v2.get_text(keys::ALBUM), Some("Album v1"));
        assert_eq!(v2.get_text(keys::DATE), Some("1999"));
    }

    #[test]
    fn v2_parser_rejects_unknown_major() {
        let data = b"ID3\x05\0\0\0\0\0\x0aTIT2\0\0\0\x02\0\0\0x";
        let err = Id3v2Parser::default().parse_tag(data).unwrap_err();
        assert!(matches!(err, ProbeError::UnsupportedTagVersion(5)));
    }
}
