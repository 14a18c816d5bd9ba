//! MPEG audio stream probing.
//!
//! Classifies the head of a byte stream, unwraps Shoutcast/Icecast metadata,
//! decodes the first MPEG audio frame header and reads ID3v1/ID3v2 tags into
//! string-keyed property maps. The [`format`] module decides which conversions
//! between wildcard audio formats an MPEG decoder or an MP3 encoder offers.

pub mod common;
pub mod container;
pub mod format;
pub mod icy;
pub mod id3;
pub mod mp3;
pub mod probe;

#[cfg(target_arch = "x86_64")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub use common::config::ProbeOptions;
pub use common::error::{NotMpegReason, ProbeError, Result};
pub use common::properties::{PropertyMap, PropertyValue};
pub use common::text::TextDecoder;
pub use container::{Container, MagicSniffer, StreamClassifier};
pub use format::negotiate::{FormatNegotiator, Mp3EncodeNegotiator, MpegDecodeNegotiator};
pub use format::{AudioEncoding, AudioFormatSpec, MpegEncoding};
pub use id3::{Id3Tag, Id3v1Parser, Id3v2Parser, TagParser, TagVersion};
pub use probe::{probe_bytes, probe_path, probe_paths, probe_reader, probe_url_stream, ProbeResult, Prober};
