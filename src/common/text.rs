//! Decoding of tag text that carries no reliable charset marker.
//!
//! ID3v1 fields and encoding-byte-0 ID3v2 frames are written in whatever
//! regional encoding the tagger happened to use. Decoding tries the
//! configured default first, then a statistical guess, then lossy UTF-8.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, Copy)]
pub struct TextDecoder {
    default: &'static Encoding,
    detect: bool,
}

impl Default for TextDecoder {
    fn default() -> Self {
        TextDecoder::new(encoding_rs::WINDOWS_1252)
    }
}

impl TextDecoder {
    pub fn new(default: &'static Encoding) -> Self {
        TextDecoder { default, detect: true }
    }

    /// Turn the charset guess between the default and lossy UTF-8 on or off.
    pub fn with_detection(mut self, detect: bool) -> Self {
        self.detect = detect;
        self
    }

    pub fn default_encoding(&self) -> &'static Encoding {
        self.default
    }

    /// Decode `data`, cutting the result at the first NUL character.
    pub fn decode(&self, data: &[u8]) -> String {
        let text = match self.default.decode_without_bom_handling_and_without_replacement(data) {
            Some(text) => text.into_owned(),
            None => {
                log::debug!("{} could not decode {} bytes", self.default.name(), data.len());
                match self.detect.then(|| detect(data)).flatten() {
                    Some(text) => text,
                    None => String::from_utf8_lossy(data).into_owned(),
                }
            }
        };
        truncate_at_nul(text)
    }
}

/// Decode with a statistically guessed encoding, `None` if the guess also fails.
fn detect(data: &[u8]) -> Option<String> {
    let mut detector = EncodingDetector::new();
    detector.feed(data, true);
    let guess = detector.guess(None, true);
    log::trace!("detected charset {}", guess.name());
    let (text, had_errors) = guess.decode_without_bom_handling(data);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn truncate_at_nul(mut text: String) -> String {
    if let Some(pos) = text.find('\0') {
        text.truncate(pos);
    }
    text
}
