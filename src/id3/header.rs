use crate::common::error::{ProbeError, Result};
use crate::id3::TagVersion;

/// Big-endian integers with a configurable number of significant bits per byte.
pub struct BitPaddedInt;

impl BitPaddedInt {
    /// `bits` is the number of significant bits per byte (7 for syncsafe, 8 for normal).
    pub fn decode(data: &[u8], bits: u8) -> u32 {
        let mut result: u32 = 0;
        let mask = (1u32 << bits) - 1;
        for &b in data {
            result = (result << bits) | (b as u32 & mask);
        }
        result
    }

    /// Decode standard syncsafe (7 bits per byte).
    pub fn syncsafe(data: &[u8]) -> u32 {
        Self::decode(data, 7)
    }

    /// Decode as normal integer (8 bits per byte).
    pub fn normal(data: &[u8]) -> u32 {
        Self::decode(data, 8)
    }
}

/// ID3v2 header flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ID3Flags {
    pub unsynchronisation: bool,
    pub extended: bool,
    pub experimental: bool,
    pub footer: bool,
}

/// Parsed ID3v2 header (10 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ID3Header {
    /// Major version byte, e.g. 3 for ID3v2.3. Not validated here.
    pub major: u8,
    pub revision: u8,
    pub flags: ID3Flags,
    /// Tag size excluding the 10 header bytes.
    pub size: u32,
}

pub const HEADER_LEN: usize = 10;

impl ID3Header {
    /// Parse the header at the start of `data`. `None` when there is no "ID3" marker.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN || &data[0..3] != b"ID3" {
            return None;
        }
        let major = data[3];
        let flag_byte = data[5];
        Some(ID3Header {
            major,
            revision: data[4],
            flags: ID3Flags {
                unsynchronisation: flag_byte & 0x80 != 0,
                extended: flag_byte & 0x40 != 0,
                experimental: flag_byte & 0x20 != 0,
                footer: major == 4 && (flag_byte & 0x10 != 0),
            },
            // Size is always syncsafe in the header
            size: BitPaddedInt::syncsafe(&data[6..10]),
        })
    }

    /// Header plus tag body, the span that precedes the audio.
    pub fn span_len(&self) -> usize {
        self.size as usize + HEADER_LEN
    }

    pub fn tag_version(&self) -> Result<TagVersion> {
        match self.major {
            2 => Ok(TagVersion::V2_2),
            3 => Ok(TagVersion::V2_3),
            4 => Ok(TagVersion::V2_4),
            other => Err(ProbeError::UnsupportedTagVersion(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syncsafe_size() {
        assert_eq!(BitPaddedInt::syncsafe(&[0x00, 0x00, 0x02, 0x01]), 257);
        assert_eq!(BitPaddedInt::normal(&[0x00, 0x00, 0x02, 0x01]), 513);
        assert_eq!(BitPaddedInt::syncsafe(&[0x7F, 0x7F, 0x7F, 0x7F]), 0x0FFF_FFFF);
    }

    #[test]
    fn header_span_and_version() {
        let data = [b'I', b'D', b'3', 3, 0, 0x80, 0, 0, 0x01, 0x00];
        let header = ID3Header::parse(&data).unwrap();
        assert_eq!(header.size, 128);
        assert_eq!(header.span_len(), 138);
        assert!(header.flags.unsynchronisation);
        assert_eq!(header.tag_version().unwrap(), TagVersion::V2_3);
    }

    #[test]
    fn unsupported_major_version() {
        let data = [b'I', b'D', b'3', 5, 0, 0, 0, 0, 0, 0];
        let header = ID3Header::parse(&data).unwrap();
        assert!(matches!(header.tag_version(), Err(ProbeError::UnsupportedTagVersion(5))));
    }

    #[test]
    fn missing_marker() {
        assert_eq!(ID3Header::parse(b"TAG_______"), None);
        assert_eq!(ID3Header::parse(b"ID3"), None);
    }
}
