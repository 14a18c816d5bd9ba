use crate::id3::keys;

/// Text encoding selected by the first payload byte of an ID3v2 text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    Latin1 = 0,
    Utf16 = 1,
    Utf16Be = 2,
    Utf8 = 3,
}

impl Encoding {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Encoding::Latin1),
            1 => Some(Encoding::Utf16),
            2 => Some(Encoding::Utf16Be),
            3 => Some(Encoding::Utf8),
            _ => None,
        }
    }
}

/// Decode text from bytes using the specified encoding.
/// Malformed sequences become U+FFFD.
pub fn decode_text(data: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Latin1 => {
            // Fast path: if all bytes are ASCII, avoid per-char conversion
            if data.is_ascii() {
                String::from_utf8_lossy(data).into_owned()
            } else {
                data.iter().map(|&b| b as char).collect()
            }
        }
        Encoding::Utf16 => {
            // BOM decides; without one the text is big-endian
            let (decoder, start) = match data {
                [0xFF, 0xFE, ..] => (encoding_rs::UTF_16LE, 2),
                [0xFE, 0xFF, ..] => (encoding_rs::UTF_16BE, 2),
                _ => (encoding_rs::UTF_16BE, 0),
            };
            let (result, _) = decoder.decode_without_bom_handling(&data[start..]);
            result.into_owned()
        }
        Encoding::Utf16Be => {
            let (result, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(data);
            result.into_owned()
        }
        Encoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
    }
}

/// Count NUL bytes at the end of `data`, stopping at `max`.
pub fn trailing_nuls(data: &[u8], max: usize) -> usize {
    data.iter().rev().take(max).take_while(|&&b| b == 0).count()
}

/// Trim whitespace and control characters from both ends.
pub fn trim_value(text: &str) -> &str {
    text.trim_matches(|c: char| c <= ' ')
}

/// Property key for an interpreted ID3v2.3/2.4 frame.
pub fn v23_key(id: &[u8]) -> Option<&'static str> {
    let key = match id {
        b"TALB" => keys::ALBUM,
        b"TIT2" => keys::TITLE,
        b"TYER" | b"TDRC" => keys::DATE,
        b"TPE1" => keys::AUTHOR,
        b"TCOP" => keys::COPYRIGHT,
        b"COMM" => keys::COMMENT,
        b"TCON" => keys::GENRE,
        b"TRCK" => keys::TRACK,
        b"TPOS" => keys::DISC,
        b"TCOM" => keys::COMPOSER,
        b"TIT1" => keys::GROUPING,
        b"TENC" => keys::ENCODED,
        b"TPUB" => keys::PUBLISHER,
        b"TPE2" => keys::ORCHESTRA,
        b"TLEN" => keys::LENGTH,
        _ => return None,
    };
    Some(key)
}

/// Property key for an interpreted ID3v2.2 frame.
pub fn v22_key(id: &[u8]) -> Option<&'static str> {
    let key = match id {
        b"TAL" => keys::ALBUM,
        b"TT2" => keys::TITLE,
        b"TYE" => keys::DATE,
        b"TP1" => keys::AUTHOR,
        b"TCR" => keys::COPYRIGHT,
        b"COM" => keys::COMMENT,
        b"TCO" => keys::GENRE,
        b"TRK" => keys::TRACK,
        b"TPA" => keys::DISC,
        b"TCM" => keys::COMPOSER,
        b"TT1" => keys::GROUPING,
        b"TEN" => keys::ENCODED,
        b"TPB" => keys::PUBLISHER,
        b"TP2" => keys::ORCHESTRA,
        b"TLE" => keys::LENGTH,
        _ => return None,
    };
    Some(key)
}

/// ID3v1 genre list, indexed by the genre byte.
pub const GENRES: &[&str] = &[
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge",
    "Hip-Hop", "Jazz", "Metal", "New Age", "Oldies", "Other", "Pop", "R&B",
    "Rap", "Reggae", "Rock", "Techno", "Industrial", "Alternative", "Ska",
    "Death Metal", "Pranks", "Soundtrack", "Euro-Techno", "Ambient",
    "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical",
    "Instrumental", "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise",
    "AlternRock", "Bass", "Soul", "Punk", "Space", "Meditative",
    "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic", "Darkwave",
    "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap",
    "Pop/Funk", "Jungle", "Native American", "Cabaret", "New Wave",
    "Psychedelic", "Rave", "Showtunes", "Trailer", "Lo-Fi", "Tribal",
    "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll",
    "Hard Rock", "Folk", "Folk-Rock", "National Folk", "Swing", "Fast Fusion",
    "Bebop", "Latin", "Revival", "Celtic", "Bluegrass", "Avantgarde",
    "Gothic Rock", "Progressive Rock", "Psychedelic Rock", "Symphonic Rock",
    "Slow Rock", "Big Band", "Chorus", "Easy Listening", "Acoustic", "Humour",
    "Speech", "Chanson", "Opera", "Chamber Music", "Sonata", "Symphony",
    "Booty Bass", "Primus", "Porn Groove", "Satire", "Slow Jam", "Club",
    "Tango", "Samba", "Folklore", "Ballad", "Power Ballad", "Rhythmic Soul",
    "Freestyle", "Duet", "Punk Rock", "Drum Solo", "A capella", "Euro-House",
    "Dance Hall", "Goa", "Drum & Bass", "Club-House", "Hardcore Techno",
    "Terror", "Indie", "BritPop", "Negerpunk", "Polsk Punk", "Beat",
    "Christian Gangsta Rap", "Heavy Metal", "Black Metal", "Crossover",
    "Contemporary Christian", "Christian Rock", "Merengue", "Salsa",
    "Thrash Metal", "Anime", "Jpop", "Synthpop", "Abstract", "Art Rock",
    "Baroque", "Bhangra", "Big Beat", "Breakbeat", "Chillout", "Downtempo",
    "Dub", "EBM", "Eclectic", "Electro", "Electroclash", "Emo", "Experimental",
    "Garage", "Global", "IDM", "Illbient", "Industro-Goth", "Jam Band",
    "Krautrock", "Leftfield", "Lounge", "Math Rock", "New Romantic",
    "Nu-Breakz", "Post-Punk", "Post-Rock", "Psytrance", "Shoegaze",
    "Space Rock", "Trop Rock", "World Music", "Neoclassical", "Audiobook",
    "Audio Theatre", "Neue Deutsche Welle", "Podcast", "Indie Rock",
    "G-Funk", "Dubstep", "Garage Rock", "Psybient",
];

pub fn genre_name(index: u8) -> Option<&'static str> {
    GENRES.get(index as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_without_bom_is_big_endian() {
        assert_eq!(decode_text(&[0x00, b'H', 0x00, b'i'], Encoding::Utf16), "Hi");
        assert_eq!(decode_text(&[0xFF, 0xFE, b'H', 0x00, b'i', 0x00], Encoding::Utf16), "Hi");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, b'H'], Encoding::Utf16), "H");
    }

    #[test]
    fn latin1_maps_high_bytes_to_code_points() {
        assert_eq!(decode_text(b"Caf\xe9", Encoding::Latin1), "Caf\u{e9}");
    }

    #[test]
    fn trailing_nuls_is_capped() {
        assert_eq!(trailing_nuls(b"ab\0\0\0", 2), 2);
        assert_eq!(trailing_nuls(b"ab\0", 2), 1);
        assert_eq!(trailing_nuls(b"\0\0", 1), 1);
        assert_eq!(trailing_nuls(b"ab", 2), 0);
    }

    #[test]
    fn v22_and_v23_share_keys() {
        assert_eq!(v22_key(b"TT2"), v23_key(b"TIT2"));
        assert_eq!(v22_key(b"COM"), v23_key(b"COMM"));
        assert_eq!(v23_key(b"TDRC"), Some(keys::DATE));
        assert_eq!(v23_key(b"APIC"), None);
    }

    #[test]
    fn genre_table_bounds() {
        assert_eq!(GENRES.len(), 192);
        assert_eq!(genre_name(13), Some("Pop"));
        assert_eq!(genre_name(255), None);
    }
}
