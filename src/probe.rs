//! One probe pass: container check, optional ICY unwrapping, first frame,
//! ID3v2 and ID3v1 tags, collected into a [`ProbeResult`].

use std::io::{Cursor, Read};
use std::path::Path;

use rayon::prelude::*;

use crate::common::config::ProbeOptions;
use crate::common::error::{NotMpegReason, ProbeError, Result};
use crate::common::properties::PropertyMap;
use crate::common::text::TextDecoder;
use crate::common::util::{map_file, read_up_to, PushbackReader};
use crate::container::{self, Container, MagicSniffer, StreamClassifier, HEAD_LEN};
use crate::format::AudioFormatSpec;
use crate::icy::IcyReader;
use crate::id3::id3v1::{find_id3v1, TAG_LEN};
use crate::id3::{Id3v1Parser, TagParser};
use crate::mp3::{FrameScanner, StreamContext};

const READ_CHUNK: usize = 64 * 1024;

/// What one probe learned about a stream.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Technical facts and tags.
    pub file_properties: PropertyMap,
    /// `vbr` and `bitrate`.
    pub format_properties: PropertyMap,
    /// Encoding, sample rate, channels and frame rate of the audio.
    pub format: AudioFormatSpec,
    /// Estimated number of frames; known only with the stream length.
    pub frame_length: Option<u64>,
    pub byte_length: Option<u64>,
}

impl ProbeResult {
    fn build(mut file_properties: PropertyMap, ctx: &StreamContext, v1_tail: Option<&[u8]>, decoder: &TextDecoder) -> Self {
        for (key, value) in &ctx.file_properties() {
            file_properties.insert(key.as_str(), value.clone());
        }
        if let Some(tag) = &ctx.id3v2 {
            for (key, value) in &tag.fields {
                file_properties.insert(key.as_str(), value.clone());
            }
        }
        if let Some(tail) = v1_tail {
            match Id3v1Parser::new(*decoder).parse_tag(tail) {
                Ok(tag) => tag.merge_into(&mut file_properties),
                Err(e) => log::debug!("ignoring ID3v1 tag: {}", e),
            }
        }

        let format_properties = ctx.format_properties();
        let format = AudioFormatSpec::new(ctx.encoding)
            .with_sample_rate(ctx.sample_rate as f32)
            .with_channels(ctx.channels)
            .with_frame_rate(ctx.frame_rate)
            .with_big_endian(true)
            .with_properties(format_properties.clone());

        ProbeResult {
            file_properties,
            format_properties,
            format,
            frame_length: ctx.total_frames,
            byte_length: ctx.length,
        }
    }
}

/// Runs probes with one set of options and one container classifier.
#[derive(Debug, Clone)]
pub struct Prober<C = MagicSniffer> {
    options: ProbeOptions,
    classifier: C,
}

impl Prober<MagicSniffer> {
    pub fn new(options: ProbeOptions) -> Self {
        Prober {
            options,
            classifier: MagicSniffer,
        }
    }
}

impl Default for Prober<MagicSniffer> {
    fn default() -> Self {
        Self::new(ProbeOptions::default())
    }
}

impl<C: StreamClassifier> Prober<C> {
    pub fn with_classifier(options: ProbeOptions, classifier: C) -> Self {
        Prober { options, classifier }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    fn decoder(&self) -> TextDecoder {
        TextDecoder::new(self.options.tag_encoding)
    }

    /// Probe a complete stream held in memory. The length is known, so the
    /// duration is computed and the ID3v1 trailer is always checked.
    pub fn probe_bytes(&self, data: &[u8]) -> Result<ProbeResult> {
        let head = &data[..data.len().min(HEAD_LEN)];
        let container = self.classifier.classify(head);
        if container.is_foreign() && !self.options.relaxed {
            log::trace!("{} stream found", container);
            return Err(ProbeError::UnsupportedContainer(container));
        }
        if container == Container::Icy {
            return self.probe_reader(Cursor::new(data), Some(data.len() as u64));
        }

        let mut scanner = FrameScanner::new(self.options.lookahead_limit);
        let location = scanner
            .scan(data, true)?
            .ok_or(ProbeError::NotMpegStream(NotMpegReason::NoSync))?;
        let decoder = self.decoder();
        let ctx = StreamContext::from_frame(data, &location, Some(data.len() as u64), &decoder);
        let tail = find_id3v1(data).map(|offset| &data[offset..]);
        Ok(ProbeResult::build(PropertyMap::new(), &ctx, tail, &decoder))
    }

    /// Probe a stream read sequentially. `length` is the total byte count if
    /// the caller knows it.
    ///
    /// At most `lookahead_limit` bytes past any ID3v2 tag are buffered while
    /// looking for the first frame. The rest of the stream is read only to
    /// reach an ID3v1 trailer, which needs a known length no larger than the
    /// limit. Streams of unknown length, ICY streams included, may never end
    /// and are left alone after the first frame.
    pub fn probe_reader<R: Read>(&self, reader: R, length: Option<u64>) -> Result<ProbeResult> {
        let mut reader = PushbackReader::new(reader);
        match container::sniff(&mut reader, &self.classifier, self.options.relaxed)? {
            Container::Icy => {
                let icy = IcyReader::new(reader)?;
                let seed = icy.properties();
                if length.is_some() {
                    log::trace!("ICY stream, declared length does not count audio bytes");
                }
                self.probe_stream(icy, None, seed)
            }
            _ => self.probe_stream(reader, length, PropertyMap::new()),
        }
    }

    /// Probe a stream whose metadata interval was announced outside the
    /// stream, as an HTTP `icy-metaint` header does.
    ///
    /// A stream that opens with an `ICY` banner is read like any other ICY
    /// stream; `metaint` then only applies if the banner announces none.
    pub fn probe_url_stream<R: Read>(&self, reader: R, metaint: Option<usize>) -> Result<ProbeResult> {
        let mut reader = PushbackReader::new(reader);
        let icy = match container::sniff(&mut reader, &self.classifier, self.options.relaxed)? {
            Container::Icy => IcyReader::new(reader)?.or_metaint(metaint),
            _ => IcyReader::with_metaint(reader, metaint),
        };
        let seed = icy.properties();
        self.probe_stream(icy, None, seed)
    }

    /// Memory-map and probe one file.
    pub fn probe_path(&self, path: impl AsRef<Path>) -> Result<ProbeResult> {
        let path = path.as_ref();
        log::trace!("probing {}", path.display());
        let data = map_file(path)?;
        self.probe_bytes(&data)
    }

    fn probe_stream<R: Read>(&self, mut reader: R, length: Option<u64>, seed: PropertyMap) -> Result<ProbeResult> {
        let limit = self.options.lookahead_limit;
        let mut scanner = FrameScanner::new(limit);
        let mut head = Vec::new();
        let mut at_eof = false;

        let location = loop {
            if let Some(location) = scanner.scan(&head, at_eof)? {
                break location;
            }
            let start = head.len();
            head.resize(start + READ_CHUNK, 0);
            let n = read_up_to(&mut reader, &mut head[start..])?;
            head.truncate(start + n);
            at_eof = n < READ_CHUNK;
        };

        let decoder = self.decoder();
        let ctx = StreamContext::from_frame(&head, &location, length, &decoder);

        let tail = match length {
            Some(len) if len > limit as u64 => {
                log::trace!("larger than limit {}, skip id3v1", limit);
                None
            }
            Some(_) => read_tail(&mut reader, &head, limit)?,
            None => {
                log::trace!("length unknown, skip id3v1");
                None
            }
        };
        let tail = tail.filter(|t| t.len() == TAG_LEN && t.starts_with(b"TAG"));

        Ok(ProbeResult::build(seed, &ctx, tail.as_deref(), &decoder))
    }
}

impl<C: StreamClassifier + Sync> Prober<C> {
    /// Probe independent files in parallel. One result per path, in order.
    pub fn probe_paths<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Vec<Result<ProbeResult>> {
        paths.par_iter().map(|path| self.probe_path(path)).collect()
    }
}

fn last_bytes(data: &[u8], n: usize) -> &[u8] {
    &data[data.len().saturating_sub(n)..]
}

/// Read to the end keeping only the last `TAG_LEN` bytes. `None` when the
/// stream runs past `limit` bytes in total.
fn read_tail<R: Read>(reader: &mut R, head: &[u8], limit: usize) -> Result<Option<Vec<u8>>> {
    let mut tail = last_bytes(head, TAG_LEN).to_vec();
    let mut total = head.len();
    if total > limit {
        log::trace!("larger than limit {}, skip id3v1", limit);
        return Ok(None);
    }
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = read_up_to(reader, &mut buf)?;
        if n == 0 {
            return Ok(Some(tail));
        }
        total += n;
        if total > limit {
            log::trace!("larger than limit {}, skip id3v1", limit);
            return Ok(None);
        }
        tail.extend_from_slice(&buf[..n]);
        let excess = tail.len().saturating_sub(TAG_LEN);
        tail.drain(..excess);
    }
}

/// [`Prober::probe_bytes`] with the given options.
pub fn probe_bytes(data: &[u8], options: &ProbeOptions) -> Result<ProbeResult> {
    Prober::new(*options).probe_bytes(data)
}

/// [`Prober::probe_reader`] with the given options.
pub fn probe_reader<R: Read>(reader: R, length: Option<u64>, options: &ProbeOptions) -> Result<ProbeResult> {
    Prober::new(*options).probe_reader(reader, length)
}

/// [`Prober::probe_path`] with the given options.
pub fn probe_path(path: impl AsRef<Path>, options: &ProbeOptions) -> Result<ProbeResult> {
    Prober::new(*options).probe_path(path)
}

/// [`Prober::probe_paths`] with the given options.
pub fn probe_paths<P: AsRef<Path> + Sync>(paths: &[P], options: &ProbeOptions) -> Vec<Result<ProbeResult>> {
    Prober::new(*options).probe_paths(paths)
}

/// [`Prober::probe_url_stream`] with the given options.
pub fn probe_url_stream<R: Read>(reader: R, metaint: Option<usize>, options: &ProbeOptions) -> Result<ProbeResult> {
    Prober::new(*options).probe_url_stream(reader, metaint)
}
