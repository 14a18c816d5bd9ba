use std::fmt;

use thiserror::Error;

use crate::container::Container;

/// Why a stream was judged not to be MPEG audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotMpegReason {
    /// No frame sync pattern inside the lookahead window.
    NoSync,
    /// Version field holds the reserved value `01`.
    WrongVersion,
    /// Sampling-rate index holds the reserved value `3`.
    WrongSamplingRate,
    /// Computed frame size came out negative (free-format or bad bitrate index).
    InvalidFrameSize(i32),
    /// Computed frame rate came out negative.
    InvalidFrameRate,
}

impl fmt::Display for NotMpegReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotMpegReason::NoSync => f.write_str("can't sync to MPEG frame"),
            NotMpegReason::WrongVersion => f.write_str("wrong version"),
            NotMpegReason::WrongSamplingRate => f.write_str("wrong sampling rate"),
            NotMpegReason::InvalidFrameSize(size) => write!(f, "Invalid frameSize : {}", size),
            NotMpegReason::InvalidFrameRate => f.write_str("Invalid FrameRate"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} stream found")]
    UnsupportedContainer(Container),

    #[error("not a MPEG stream: {0}")]
    NotMpegStream(NotMpegReason),

    #[error("ID3 unsupported version: ID3v2.{0}")]
    UnsupportedTagVersion(u8),

    #[error("ID3 tag truncated: {needed} bytes needed at offset {offset}")]
    TruncatedTag { offset: usize, needed: usize },

    #[error("ID3 invalid text encoding: {0}")]
    InvalidTextEncoding(u8),

    #[error("{0}")]
    IllegalFormatRequest(String),

    #[error("conversion not supported")]
    ConversionNotSupported,

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("illegal value for {key} property: {value}")]
    InvalidProperty { key: &'static str, value: String },
}

impl ProbeError {
    /// The stream was recognised as a foreign container.
    pub fn is_container_rejection(&self) -> bool {
        matches!(self, ProbeError::UnsupportedContainer(_))
    }

    /// The stream failed MPEG frame validation.
    pub fn is_not_mpeg(&self) -> bool {
        matches!(self, ProbeError::NotMpegStream(_))
    }

    pub fn is_tag_version(&self) -> bool {
        matches!(self, ProbeError::UnsupportedTagVersion(_))
    }

    /// The specific MPEG check that failed, if this is an MPEG rejection.
    pub fn not_mpeg_reason(&self) -> Option<NotMpegReason> {
        match self {
            ProbeError::NotMpegStream(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<NotMpegReason> for ProbeError {
    fn from(reason: NotMpegReason) -> Self {
        ProbeError::NotMpegStream(reason)
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
