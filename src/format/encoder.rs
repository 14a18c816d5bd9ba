use std::io::{self, Read};

use crate::common::error::{ProbeError, Result};
use crate::common::properties::{PropertyMap, PropertyValue};
use crate::format::negotiate::{FormatNegotiator, Mp3EncodeNegotiator};
use crate::format::{AudioFormatSpec, MpegEncoding};

pub const QUALITY_LOWEST: i32 = 9;
pub const QUALITY_LOW: i32 = 7;
pub const QUALITY_MIDDLE: i32 = 5;
pub const QUALITY_HIGH: i32 = 2;
pub const QUALITY_HIGHEST: i32 = 1;

pub const CHANNEL_MODE_STEREO: i32 = 0;
pub const CHANNEL_MODE_JOINT_STEREO: i32 = 1;
pub const CHANNEL_MODE_DUAL_CHANNEL: i32 = 2;
pub const CHANNEL_MODE_MONO: i32 = 3;
/// Channel mode has no influence on mono sources.
pub const CHANNEL_MODE_AUTO: i32 = -1;

pub const BITRATE_AUTO: i32 = -1;

/// Highest bitrate (kbit/s) MPEG-2 and MPEG-2.5 layer III can carry.
const LSF_MAX_BITRATE: i32 = 160;

pub const P_QUALITY: &str = "quality";
pub const P_BITRATE: &str = "bitrate";
pub const P_CHMODE: &str = "chmode";
pub const P_VBR: &str = "vbr";

/// External MP3 encoder driven buffer by buffer.
pub trait Mp3Encoder {
    /// Preferred number of PCM bytes per `encode_buffer` call.
    fn pcm_buffer_size(&self) -> usize;

    /// Output buffer size large enough for one `encode_buffer` call.
    fn mp3_buffer_size(&self) -> usize;

    /// Encode `pcm`, writing MP3 bytes to `out`. Returns the count written, possibly 0.
    fn encode_buffer(&mut self, pcm: &[u8], out: &mut [u8]) -> Result<usize>;

    /// Flush the remaining frames. Called once, after the last `encode_buffer`.
    fn encode_finish(&mut self, out: &mut [u8]) -> Result<usize>;

    fn version(&self) -> String;
}

/// Encoder parameters read from a target format's properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub quality: i32,
    /// kbit/s, or `BITRATE_AUTO`.
    pub bitrate: i32,
    pub channel_mode: i32,
    pub vbr: bool,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        EncoderSettings {
            quality: QUALITY_MIDDLE,
            bitrate: BITRATE_AUTO,
            channel_mode: CHANNEL_MODE_AUTO,
            vbr: false,
        }
    }
}

impl EncoderSettings {
    /// Read `quality`, `bitrate`, `chmode` and `vbr`; absent keys keep their defaults.
    pub fn from_properties(props: &PropertyMap, source: &AudioFormatSpec) -> Result<Self> {
        let mut settings = EncoderSettings::default();

        match props.get(P_QUALITY) {
            None => {}
            Some(PropertyValue::Text(s)) => settings.quality = string_to_quality(&s.to_lowercase(), settings.quality),
            Some(PropertyValue::Int(q)) => settings.quality = *q as i32,
            Some(other) => return Err(invalid(P_QUALITY, other)),
        }

        match props.get(P_BITRATE) {
            None => {}
            Some(PropertyValue::Text(s)) => {
                settings.bitrate = s.trim().parse().map_err(|_| invalid(P_BITRATE, &PropertyValue::Text(s.clone())))?
            }
            Some(PropertyValue::Int(b)) => settings.bitrate = *b as i32,
            Some(other) => return Err(invalid(P_BITRATE, other)),
        }

        match props.get(P_CHMODE) {
            None => {}
            Some(PropertyValue::Text(s)) => {
                settings.channel_mode = string_to_chmode(&s.to_lowercase(), settings.channel_mode)
            }
            Some(other) => return Err(invalid(P_CHMODE, other)),
        }

        match props.get(P_VBR) {
            None => {}
            Some(PropertyValue::Text(s)) => settings.vbr = string_to_bool(s)?,
            Some(PropertyValue::Bool(b)) => settings.vbr = *b,
            Some(other) => return Err(invalid(P_VBR, other)),
        }

        if source.sample_rate.is_some_and(|rate| rate < 32000.0) && settings.bitrate > LSF_MAX_BITRATE {
            log::debug!("bitrate {} too high below 32 kHz, using {}", settings.bitrate, LSF_MAX_BITRATE);
            settings.bitrate = LSF_MAX_BITRATE;
        }
        Ok(settings)
    }

    /// Quality rounded down to one of the five named levels.
    pub fn effective_quality(&self) -> i32 {
        match self.quality {
            q if q >= QUALITY_LOWEST => QUALITY_LOWEST,
            q if q >= QUALITY_LOW => QUALITY_LOW,
            q if q >= QUALITY_MIDDLE => QUALITY_MIDDLE,
            q if q >= QUALITY_HIGH => QUALITY_HIGH,
            _ => QUALITY_HIGHEST,
        }
    }

    /// Format the encoder emits for `source`.
    pub fn effective_format(&self, source: &AudioFormatSpec, encoder_version: &str) -> AudioFormatSpec {
        let rate = source.sample_rate.unwrap_or(44100.0);
        let mut props = PropertyMap::new();
        props.insert(P_QUALITY, self.effective_quality());
        props.insert(P_BITRATE, self.bitrate);
        props.insert(P_CHMODE, chmode_to_string(self.channel_mode));
        props.insert(P_VBR, self.vbr);
        props.insert("encoder.name", "LAME");
        props.insert("encoder.version", encoder_version);

        let channels = if self.channel_mode == CHANNEL_MODE_MONO { 1 } else { 2 };
        AudioFormatSpec::new(effective_encoding(rate))
            .with_sample_rate(rate)
            .with_channels(channels)
            .with_properties(props)
    }
}

/// Layer III version LAME writes at `sample_rate`.
pub fn effective_encoding(sample_rate: f32) -> MpegEncoding {
    if sample_rate < 16000.0 {
        MpegEncoding::Mpeg25L3
    } else if sample_rate < 32000.0 {
        MpegEncoding::Mpeg2L3
    } else {
        MpegEncoding::Mpeg1L3
    }
}

fn invalid(key: &'static str, value: &PropertyValue) -> ProbeError {
    ProbeError::InvalidProperty {
        key,
        value: value.to_string(),
    }
}

fn string_to_quality(s: &str, default: i32) -> i32 {
    match s {
        "lowest" => QUALITY_LOWEST,
        "low" => QUALITY_LOW,
        "middle" => QUALITY_MIDDLE,
        "high" => QUALITY_HIGH,
        "highest" => QUALITY_HIGHEST,
        _ => default,
    }
}

fn string_to_chmode(s: &str, default: i32) -> i32 {
    match s {
        "stereo" => CHANNEL_MODE_STEREO,
        "jointstereo" => CHANNEL_MODE_JOINT_STEREO,
        "dual" => CHANNEL_MODE_DUAL_CHANNEL,
        "mono" => CHANNEL_MODE_MONO,
        "auto" => CHANNEL_MODE_AUTO,
        _ => default,
    }
}

pub fn chmode_to_string(mode: i32) -> &'static str {
    match mode {
        CHANNEL_MODE_STEREO => "stereo",
        CHANNEL_MODE_JOINT_STEREO => "jointstereo",
        CHANNEL_MODE_DUAL_CHANNEL => "dual",
        CHANNEL_MODE_MONO => "mono",
        _ => "auto",
    }
}

/// "t…", "y…" and "on" are true; "f…", "n…" and "off" are false.
fn string_to_bool(s: &str) -> Result<bool> {
    if s.starts_with('f') || s.starts_with('n') || s == "off" {
        return Ok(false);
    }
    if s.starts_with('t') || s.starts_with('y') || s == "on" {
        return Ok(true);
    }
    Err(ProbeError::InvalidProperty {
        key: P_VBR,
        value: s.to_string(),
    })
}

/// `Read` adapter that pumps PCM from `source` through an encoder.
pub struct EncodingReader<R, E: Mp3Encoder> {
    source: R,
    encoder: Option<E>,
    format: AudioFormatSpec,
    pcm: Vec<u8>,
    encoded: Vec<u8>,
    pos: usize,
    len: usize,
}

impl<R: Read, E: Mp3Encoder> EncodingReader<R, E> {
    pub fn new(source: R, encoder: E, format: AudioFormatSpec) -> Self {
        let pcm = vec![0u8; encoder.pcm_buffer_size().max(1)];
        // The final flush may need more room than a regular call.
        let encoded = vec![0u8; encoder.mp3_buffer_size().max(pcm.len())];
        EncodingReader {
            source,
            encoder: Some(encoder),
            format,
            pcm,
            encoded,
            pos: 0,
            len: 0,
        }
    }

    /// Format of the bytes this reader yields.
    pub fn format(&self) -> &AudioFormatSpec {
        &self.format
    }

    /// Run one encoder step. Returns false once the encoder has been flushed.
    fn fill(&mut self) -> io::Result<bool> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(false);
        };
        let read = loop {
            match self.source.read(&mut self.pcm) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.len = if read > 0 {
            encoder.encode_buffer(&self.pcm[..read], &mut self.encoded).map_err(io::Error::other)?
        } else {
            let written = encoder.encode_finish(&mut self.encoded).map_err(io::Error::other)?;
            self.encoder = None;
            written
        };
        self.pos = 0;
        Ok(true)
    }
}

impl<R: Read, E: Mp3Encoder> Read for EncodingReader<R, E> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.len {
            if !self.fill()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.len - self.pos);
        buf[..n].copy_from_slice(&self.encoded[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl<R, E: Mp3Encoder> Drop for EncodingReader<R, E> {
    fn drop(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            if let Err(e) = encoder.encode_finish(&mut []) {
                log::debug!("encoder finish on drop failed: {}", e);
            }
        }
    }
}

/// Start encoding `source` (in `source_format`) toward `target`.
pub fn encode_stream<R: Read, E: Mp3Encoder>(
    negotiator: &Mp3EncodeNegotiator,
    target: &AudioFormatSpec,
    source_format: &AudioFormatSpec,
    source: R,
    encoder: E,
) -> Result<EncodingReader<R, E>> {
    if !negotiator.is_conversion_supported(target, source_format) {
        return Err(ProbeError::ConversionNotSupported);
    }
    let target = negotiator.default_target_format(target, source_format, false)?;
    let settings = EncoderSettings::from_properties(&target.properties, source_format)?;
    let format = settings.effective_format(source_format, &encoder.version());
    log::trace!("encoding {} -> {}", source_format, format);
    Ok(EncodingReader::new(source, encoder, format))
}
