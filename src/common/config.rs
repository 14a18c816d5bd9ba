use encoding_rs::Encoding;

/// Default bound on how far a parse will buffer while looking for the first
/// frame sync or the trailing ID3v1 tag.
pub const INITIAL_READ_LENGTH: usize = 1024 * 1024 * 20;

/// Environment variable enabling relaxed container validation.
pub const ENV_WEAK: &str = "MPEG_PROBE_WEAK";

/// Environment variable naming the default encoding of unmarked tag text.
pub const ENV_TAG_ENCODING: &str = "MPEG_PROBE_TAG_ENCODING";

/// Options threaded into a single probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOptions {
    /// Skip foreign-container rejection (WAV/AU/AIFF/APE/FLAC/OGG).
    pub relaxed: bool,
    /// Encoding tried first for tag text that carries no charset marker.
    pub tag_encoding: &'static Encoding,
    /// Maximum number of bytes buffered for sync search and tail probing.
    pub lookahead_limit: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            relaxed: false,
            tag_encoding: encoding_rs::WINDOWS_1252,
            lookahead_limit: INITIAL_READ_LENGTH,
        }
    }
}

impl ProbeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MPEG_PROBE_WEAK` and `MPEG_PROBE_TAG_ENCODING`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(weak) = std::env::var(ENV_WEAK) {
            options.relaxed = !weak.is_empty();
        }
        if let Ok(label) = std::env::var(ENV_TAG_ENCODING) {
            match Encoding::for_label(label.trim().as_bytes()) {
                Some(encoding) => options.tag_encoding = encoding,
                None => log::warn!("unknown tag encoding label {:?}, keeping {}", label, options.tag_encoding.name()),
            }
        }
        options
    }

    pub fn with_relaxed(mut self, relaxed: bool) -> Self {
        self.relaxed = relaxed;
        self
    }

    pub fn with_tag_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.tag_encoding = encoding;
        self
    }

    pub fn with_lookahead_limit(mut self, limit: usize) -> Self {
        self.lookahead_limit = limit;
        self
    }
}
