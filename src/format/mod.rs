//! Audio format descriptions with wildcard fields, and the negotiators that
//! decide which conversions between them are possible.
//!
//! A field set to `None` is "not specified" and matches any value on the
//! other side. Encodings are always concrete.

pub mod encoder;
pub mod negotiate;

use std::fmt;

use crate::common::properties::PropertyMap;

/// One of the nine MPEG audio version/layer combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegEncoding {
    Mpeg1L1,
    Mpeg1L2,
    Mpeg1L3,
    Mpeg2L1,
    Mpeg2L2,
    Mpeg2L3,
    Mpeg25L1,
    Mpeg25L2,
    Mpeg25L3,
}

impl MpegEncoding {
    pub const ALL: [MpegEncoding; 9] = [
        MpegEncoding::Mpeg1L1,
        MpegEncoding::Mpeg1L2,
        MpegEncoding::Mpeg1L3,
        MpegEncoding::Mpeg2L1,
        MpegEncoding::Mpeg2L2,
        MpegEncoding::Mpeg2L3,
        MpegEncoding::Mpeg25L1,
        MpegEncoding::Mpeg25L2,
        MpegEncoding::Mpeg25L3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MpegEncoding::Mpeg1L1 => "MPEG1L1",
            MpegEncoding::Mpeg1L2 => "MPEG1L2",
            MpegEncoding::Mpeg1L3 => "MPEG1L3",
            MpegEncoding::Mpeg2L1 => "MPEG2L1",
            MpegEncoding::Mpeg2L2 => "MPEG2L2",
            MpegEncoding::Mpeg2L3 => "MPEG2L3",
            MpegEncoding::Mpeg25L1 => "MPEG2DOT5L1",
            MpegEncoding::Mpeg25L2 => "MPEG2DOT5L2",
            MpegEncoding::Mpeg25L3 => "MPEG2DOT5L3",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.name() == name)
    }
}

impl fmt::Display for MpegEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sample encoding of an audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioEncoding {
    PcmSigned,
    PcmUnsigned,
    /// Generic "MP3" with version and layer left open.
    Mp3,
    Mpeg(MpegEncoding),
}

impl AudioEncoding {
    /// A concrete MPEG version/layer encoding.
    pub fn is_mpeg(&self) -> bool {
        matches!(self, AudioEncoding::Mpeg(_))
    }

    pub fn is_pcm(&self) -> bool {
        matches!(self, AudioEncoding::PcmSigned | AudioEncoding::PcmUnsigned)
    }
}

impl From<MpegEncoding> for AudioEncoding {
    fn from(e: MpegEncoding) -> Self {
        AudioEncoding::Mpeg(e)
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioEncoding::PcmSigned => f.write_str("PCM_SIGNED"),
            AudioEncoding::PcmUnsigned => f.write_str("PCM_UNSIGNED"),
            AudioEncoding::Mp3 => f.write_str("MP3"),
            AudioEncoding::Mpeg(e) => f.write_str(e.name()),
        }
    }
}

/// An audio format where every numeric field may be a wildcard.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFormatSpec {
    pub encoding: AudioEncoding,
    pub sample_rate: Option<f32>,
    pub sample_size_bits: Option<u32>,
    pub channels: Option<u32>,
    /// Bytes per frame.
    pub frame_size: Option<u32>,
    /// Frames per second.
    pub frame_rate: Option<f32>,
    pub big_endian: bool,
    pub properties: PropertyMap,
}

impl AudioFormatSpec {
    /// A format with every field but the encoding unspecified.
    pub fn new(encoding: impl Into<AudioEncoding>) -> Self {
        AudioFormatSpec {
            encoding: encoding.into(),
            sample_rate: None,
            sample_size_bits: None,
            channels: None,
            frame_size: None,
            frame_rate: None,
            big_endian: false,
            properties: PropertyMap::new(),
        }
    }

    /// Linear PCM with frame size and frame rate derived from the other fields.
    pub fn pcm(sample_rate: f32, sample_size_bits: u32, channels: u32, signed: bool, big_endian: bool) -> Self {
        let encoding = if signed {
            AudioEncoding::PcmSigned
        } else {
            AudioEncoding::PcmUnsigned
        };
        AudioFormatSpec {
            encoding,
            sample_rate: Some(sample_rate),
            sample_size_bits: Some(sample_size_bits),
            channels: Some(channels),
            frame_size: Some(sample_size_bits.div_ceil(8) * channels),
            frame_rate: Some(sample_rate),
            big_endian,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_sample_rate(mut self, rate: f32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_sample_size(mut self, bits: u32) -> Self {
        self.sample_size_bits = Some(bits);
        self
    }

    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_frame_size(mut self, bytes: u32) -> Self {
        self.frame_size = Some(bytes);
        self
    }

    pub fn with_frame_rate(mut self, rate: f32) -> Self {
        self.frame_rate = Some(rate);
        self
    }

    pub fn with_big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    /// Field-wise wildcard equality. Properties are not compared.
    ///
    /// Byte order only counts when both sides declare the same sample size
    /// above 8 bits.
    pub fn matches(&self, other: &AudioFormatSpec) -> bool {
        let byte_order_matters = match (self.sample_size_bits, other.sample_size_bits) {
            (Some(a), Some(b)) => a > 8 || b > 8,
            _ => false,
        };
        self.encoding == other.encoding
            && (!byte_order_matters || self.big_endian == other.big_endian)
            && do_match(self.channels, other.channels)
            && do_match(self.sample_size_bits, other.sample_size_bits)
            && do_match(self.frame_size, other.frame_size)
            && do_match(self.sample_rate, other.sample_rate)
            && do_match(self.frame_rate, other.frame_rate)
    }
}

impl fmt::Display for AudioFormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field<T: fmt::Display>(v: Option<T>) -> String {
            v.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string())
        }
        write!(
            f,
            "{} {} Hz, {} bit, {} channels, {} bytes/frame, {} frames/s, {}",
            self.encoding,
            field(self.sample_rate),
            field(self.sample_size_bits),
            field(self.channels),
            field(self.frame_size),
            field(self.frame_rate),
            if self.big_endian { "big-endian" } else { "little-endian" }
        )
    }
}

/// Either side unspecified, or both equal.
pub fn do_match<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}
