use crate::common::error::{ProbeError, Result};
use crate::format::{do_match, AudioEncoding, AudioFormatSpec, MpegEncoding};

/// Decides which conversions a codec offers between its input and output formats.
pub trait FormatNegotiator {
    /// Formats accepted as conversion sources.
    fn inputs(&self) -> &[AudioFormatSpec];

    /// Formats that can be produced.
    fn outputs(&self) -> &[AudioFormatSpec];

    /// Some registered input matches `source` and some output matches `target`.
    fn is_conversion_supported(&self, target: &AudioFormatSpec, source: &AudioFormatSpec) -> bool {
        self.inputs().iter().any(|f| f.matches(source)) && self.outputs().iter().any(|f| f.matches(target))
    }

    /// `source` is accepted and something with `encoding` can be produced from it.
    fn is_encoding_supported(&self, encoding: AudioEncoding, source: &AudioFormatSpec) -> bool {
        self.inputs().iter().any(|f| f.matches(source)) && self.outputs().iter().any(|f| f.encoding == encoding)
    }

    /// Concrete formats with `encoding` that `source` can be converted to.
    fn target_formats(&self, encoding: AudioEncoding, source: &AudioFormatSpec) -> Vec<AudioFormatSpec>;
}

/// MPEG audio to 16-bit PCM.
#[derive(Debug, Clone)]
pub struct MpegDecodeNegotiator {
    inputs: Vec<AudioFormatSpec>,
    outputs: Vec<AudioFormatSpec>,
}

impl Default for MpegDecodeNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl MpegDecodeNegotiator {
    pub fn new() -> Self {
        let mut inputs = Vec::with_capacity(4);
        let mut outputs = Vec::with_capacity(4);
        for channels in [1, 2] {
            for big_endian in [false, true] {
                inputs.push(
                    AudioFormatSpec::new(AudioEncoding::Mp3)
                        .with_channels(channels)
                        .with_big_endian(big_endian),
                );
                outputs.push(
                    AudioFormatSpec::new(AudioEncoding::PcmSigned)
                        .with_sample_size(16)
                        .with_channels(channels)
                        .with_frame_size(2 * channels)
                        .with_big_endian(big_endian),
                );
            }
        }
        MpegDecodeNegotiator { inputs, outputs }
    }

    /// A concrete MPEG source whose frame timing is known can be decoded to
    /// any target with a compatible channel count.
    fn is_decodable_mpeg(target: &AudioFormatSpec, source: &AudioFormatSpec) -> bool {
        source.encoding.is_mpeg()
            && (source.frame_rate.is_some() || source.frame_size.is_some())
            && do_match(source.channels, target.channels)
    }
}

impl FormatNegotiator for MpegDecodeNegotiator {
    fn inputs(&self) -> &[AudioFormatSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[AudioFormatSpec] {
        &self.outputs
    }

    fn is_conversion_supported(&self, target: &AudioFormatSpec, source: &AudioFormatSpec) -> bool {
        let registered = self.inputs.iter().any(|f| f.matches(source)) && self.outputs.iter().any(|f| f.matches(target));
        registered || Self::is_decodable_mpeg(target, source)
    }

    fn is_encoding_supported(&self, encoding: AudioEncoding, source: &AudioFormatSpec) -> bool {
        let decodable = self.inputs.iter().any(|f| f.matches(source))
            || (source.encoding.is_mpeg() && (source.frame_rate.is_some() || source.frame_size.is_some()));
        decodable && self.outputs.iter().any(|f| f.encoding == encoding)
    }

    /// Outputs for the source's channel count, with the sample rate taken from
    /// the source and one PCM frame per sample.
    fn target_formats(&self, encoding: AudioEncoding, source: &AudioFormatSpec) -> Vec<AudioFormatSpec> {
        if !self.is_encoding_supported(encoding, source) {
            return Vec::new();
        }
        self.outputs
            .iter()
            .filter(|f| f.encoding == encoding && do_match(f.channels, source.channels))
            .map(|f| {
                let mut target = f.clone();
                if target.sample_rate.is_none() {
                    target.sample_rate = source.sample_rate;
                }
                if target.frame_rate.is_none() {
                    target.frame_rate = target.sample_rate;
                }
                target
            })
            .collect()
    }
}

/// Sample rates the LAME encoder produces, with the layer III encoding it
/// picks for each.
const LAME_RATES: [(f32, MpegEncoding); 9] = [
    (8000.0, MpegEncoding::Mpeg25L3),
    (11025.0, MpegEncoding::Mpeg25L3),
    (12000.0, MpegEncoding::Mpeg25L3),
    (16000.0, MpegEncoding::Mpeg2L3),
    (22050.0, MpegEncoding::Mpeg2L3),
    (24000.0, MpegEncoding::Mpeg2L3),
    (32000.0, MpegEncoding::Mpeg1L3),
    (44100.0, MpegEncoding::Mpeg1L3),
    (48000.0, MpegEncoding::Mpeg1L3),
];

/// 16-bit PCM to MPEG layer III through an external LAME-style encoder.
#[derive(Debug, Clone)]
pub struct Mp3EncodeNegotiator {
    inputs: Vec<AudioFormatSpec>,
    outputs: Vec<AudioFormatSpec>,
}

impl Default for Mp3EncodeNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl Mp3EncodeNegotiator {
    pub fn new() -> Self {
        let mut inputs = Vec::with_capacity(36);
        for channels in [1, 2] {
            for (rate, _) in LAME_RATES {
                for big_endian in [false, true] {
                    inputs.push(AudioFormatSpec::pcm(rate, 16, channels, true, big_endian));
                }
            }
        }

        // Every rate is reachable as MPEG1L3 too; the encoder switches to
        // the lower-rate version on its own.
        let mut outputs = Vec::with_capacity(60);
        let mut push = |encoding: MpegEncoding, rate: f32| {
            for big_endian in [false, true] {
                for channels in [1, 2] {
                    outputs.push(
                        AudioFormatSpec::new(encoding)
                            .with_sample_rate(rate)
                            .with_channels(channels)
                            .with_big_endian(big_endian),
                    );
                }
            }
        };
        for (rate, native) in LAME_RATES {
            if native != MpegEncoding::Mpeg1L3 {
                push(native, rate);
            }
        }
        for (rate, _) in LAME_RATES {
            push(MpegEncoding::Mpeg1L3, rate);
        }

        Mp3EncodeNegotiator { inputs, outputs }
    }

    /// Resolve `requested` against `source` into the format the encoder will emit.
    ///
    /// Sample rate and channel count come from the request when given, else
    /// from the source. Sample size, frame size and frame rate are left
    /// unspecified; the request's properties are kept.
    pub fn default_target_format(
        &self,
        requested: &AudioFormatSpec,
        source: &AudioFormatSpec,
        allow_wildcard: bool,
    ) -> Result<AudioFormatSpec> {
        let sample_rate = requested.sample_rate.or(source.sample_rate);
        let rate_conflict = matches!((sample_rate, source.sample_rate), (Some(t), Some(s)) if t != s);
        if (!allow_wildcard && sample_rate.is_none()) || rate_conflict {
            return Err(ProbeError::IllegalFormatRequest(format!(
                "Illegal sample rate ({}) !",
                sample_rate.unwrap_or(-1.0)
            )));
        }

        let channels = requested.channels.or(source.channels);
        let channel_conflict = matches!((channels, source.channels), (Some(t), Some(s)) if t != s);
        if (!allow_wildcard && channels.is_none()) || channel_conflict {
            return Err(ProbeError::IllegalFormatRequest(format!(
                "Illegal number of channels ({}) !",
                channels.map(i64::from).unwrap_or(-1)
            )));
        }

        Ok(AudioFormatSpec {
            encoding: requested.encoding,
            sample_rate,
            sample_size_bits: None,
            channels,
            frame_size: None,
            frame_rate: None,
            big_endian: false,
            properties: requested.properties.clone(),
        })
    }
}

impl FormatNegotiator for Mp3EncodeNegotiator {
    fn inputs(&self) -> &[AudioFormatSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[AudioFormatSpec] {
        &self.outputs
    }

    fn target_formats(&self, encoding: AudioEncoding, source: &AudioFormatSpec) -> Vec<AudioFormatSpec> {
        if !self.is_encoding_supported(encoding, source) {
            return Vec::new();
        }
        let mut result: Vec<AudioFormatSpec> = Vec::new();
        for output in &self.outputs {
            if output.encoding != encoding
                || !do_match(output.sample_rate, source.sample_rate)
                || !do_match(output.channels, source.channels)
            {
                continue;
            }
            match self.default_target_format(output, source, true) {
                Ok(target) if !result.contains(&target) => result.push(target),
                Ok(_) => {}
                Err(e) => log::debug!("skipping {}: {}", output, e),
            }
        }
        result
    }
}
