//! Magic-byte classification of the stream head.

use std::fmt;
use std::io::Read;

use crate::common::error::{ProbeError, Result};
use crate::common::util::PushbackReader;

/// Number of bytes inspected at the start of a stream.
pub const HEAD_LEN: usize = 22;

/// `WAVE_FORMAT_PCM` in the RIFF `fmt ` chunk.
pub const WAV_FORMAT_PCM: u16 = 1;

/// What the stream head looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav { format_tag: u16 },
    Au,
    Aiff,
    Ape,
    Flac,
    Ogg,
    /// Shoutcast/Icecast response banner.
    Icy,
    /// Nothing recognised; assumed to be raw MPEG audio.
    Unknown,
}

impl Container {
    /// Rejected unless validation is relaxed.
    ///
    /// A WAV is only foreign when it carries linear PCM; any other format tag
    /// may wrap MPEG audio.
    pub fn is_foreign(&self) -> bool {
        match self {
            Container::Wav { format_tag } => *format_tag == WAV_FORMAT_PCM,
            Container::Au | Container::Aiff | Container::Ape | Container::Flac | Container::Ogg => true,
            Container::Icy | Container::Unknown => false,
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Container::Wav { format_tag: WAV_FORMAT_PCM } => "WAV PCM",
            Container::Wav { .. } => "WAV",
            Container::Au => "AU",
            Container::Aiff => "AIFF",
            Container::Ape => "APE",
            Container::Flac => "FLAC",
            Container::Ogg => "Ogg",
            Container::Icy => "Shoutcast",
            Container::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies a stream from its first bytes.
pub trait StreamClassifier {
    /// `head` holds up to `HEAD_LEN` bytes; shorter only for short streams.
    fn classify(&self, head: &[u8]) -> Container;
}

/// Fixed magic numbers of the containers an MPEG reader must step aside for.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

fn has_at(head: &[u8], offset: usize, magic: &[u8]) -> bool {
    head.get(offset..offset + magic.len()) == Some(magic)
}

fn has_ignore_case(head: &[u8], magic: &[u8]) -> bool {
    head.get(..magic.len()).is_some_and(|h| h.eq_ignore_ascii_case(magic))
}

impl StreamClassifier for MagicSniffer {
    fn classify(&self, head: &[u8]) -> Container {
        if has_at(head, 0, b"RIFF") && has_at(head, 8, b"WAVE") {
            let format_tag = match head.get(20..22) {
                Some(tag) => u16::from_le_bytes([tag[0], tag[1]]),
                None => 0,
            };
            Container::Wav { format_tag }
        } else if has_at(head, 0, b".snd") {
            Container::Au
        } else if has_at(head, 0, b"FORM") && has_at(head, 8, b"AIFF") {
            Container::Aiff
        } else if has_ignore_case(head, b"MAC") {
            Container::Ape
        } else if has_ignore_case(head, b"fLaC") {
            Container::Flac
        } else if has_ignore_case(head, b"ICY") {
            Container::Icy
        } else if has_ignore_case(head, b"OGG") {
            Container::Ogg
        } else {
            Container::Unknown
        }
    }
}

/// Classify the head of `reader` without consuming it.
///
/// Foreign containers are an error unless `relaxed` is set. Every peeked
/// byte stays in `reader` for the next consumer.
pub fn sniff<R: Read, C: StreamClassifier + ?Sized>(
    reader: &mut PushbackReader<R>,
    classifier: &C,
    relaxed: bool,
) -> Result<Container> {
    let head = reader.peek(HEAD_LEN)?;
    let container = classifier.classify(head);
    match container {
        Container::Unknown => {}
        Container::Icy => log::trace!("Shoutcast stream found"),
        other => log::trace!("{} stream found", other),
    }
    if container.is_foreign() && !relaxed {
        return Err(ProbeError::UnsupportedContainer(container));
    }
    Ok(container)
}
