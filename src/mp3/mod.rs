pub mod header;
pub mod xing;

use crate::common::error::{NotMpegReason, Result};
use crate::common::properties::PropertyMap;
use crate::common::text::TextDecoder;
use crate::format::MpegEncoding;
use crate::id3::header::{ID3Header, HEADER_LEN};
use crate::id3::{Id3Tag, Id3v2Parser, TagParser};
use crate::mp3::header::{find_sync, ChannelMode, FrameHeader, MpegLayer, MpegVersion};
use crate::mp3::xing::VbrInfo;

/// Where the first audio frame sits in the stream head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLocation {
    /// Bytes taken by a leading ID3v2 tag, header included. 0 without one.
    pub id3v2_len: usize,
    /// Offset of the first frame's sync word.
    pub offset: usize,
    pub header: FrameHeader,
}

/// Incremental search for the first frame in a growing buffer.
///
/// The sync search covers at most `limit` bytes past the ID3v2 tag.
#[derive(Debug, Clone)]
pub struct FrameScanner {
    limit: usize,
    searched: usize,
    /// Why the first sync candidate failed to decode.
    rejected: Option<NotMpegReason>,
}

impl FrameScanner {
    pub fn new(limit: usize) -> Self {
        FrameScanner {
            limit,
            searched: 0,
            rejected: None,
        }
    }

    /// Look for the first frame in `head`, the leading bytes of the stream.
    ///
    /// `Ok(None)` asks for more bytes. `at_eof` says `head` is all there is.
    /// Sync words whose header does not decode are skipped. If none in the
    /// window decodes, the stream is rejected with the first one's reason.
    pub fn scan(&mut self, head: &[u8], at_eof: bool) -> Result<Option<FrameLocation>> {
        if head.len() < HEADER_LEN && !at_eof {
            return Ok(None);
        }
        let id3v2_len = ID3Header::parse(head).map_or(0, |h| h.span_len());
        if head.len() < id3v2_len {
            if at_eof {
                return Err(NotMpegReason::NoSync.into());
            }
            return Ok(None);
        }

        let window_end = id3v2_len.saturating_add(self.limit);
        let mut start = self.searched.max(id3v2_len);
        let (offset, header) = loop {
            let Some((offset, raw)) = find_sync(head, start, window_end) else {
                if at_eof || head.len() >= window_end {
                    log::trace!("no frame sync within {} bytes", self.limit);
                    return Err(self.rejected.unwrap_or(NotMpegReason::NoSync).into());
                }
                // A sync word may straddle the end of what we have.
                self.searched = head.len().saturating_sub(3).max(start);
                return Ok(None);
            };
            match FrameHeader::parse(raw) {
                Ok(header) => break (offset, header),
                Err(reason) => {
                    log::trace!("skipping sync at {} ({:#010x}): {}", offset, raw, reason);
                    self.rejected.get_or_insert(reason);
                    start = offset + 1;
                }
            }
        };
        self.searched = offset;

        let frame_end = offset + 4 + header.frame_size() as usize;
        if head.len() < frame_end && !at_eof {
            return Ok(None);
        }
        log::trace!("frame sync at {} ({:#010x}), ID3v2 span {}", offset, header.raw, id3v2_len);
        Ok(Some(FrameLocation {
            id3v2_len,
            offset,
            header,
        }))
    }
}

/// Everything learned from the first frame of one stream.
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Declared total stream length in bytes.
    pub length: Option<u64>,
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub channel_mode: ChannelMode,
    pub channels: u32,
    pub vbr: bool,
    pub vbr_scale: i32,
    /// Excludes the 4 header bytes.
    pub frame_size: i32,
    pub sample_rate: u32,
    pub frame_rate: f32,
    /// Bits per second; the average for VBR streams.
    pub bitrate: u32,
    pub total_frames: Option<u64>,
    pub total_ms: Option<u64>,
    /// Raw sync header bits.
    pub sync_header: u32,
    pub encoding: MpegEncoding,
    pub header: FrameHeader,
    pub id3v2_len: usize,
    pub id3v2_raw: Option<Vec<u8>>,
    pub id3v2: Option<Id3Tag>,
}

impl StreamContext {
    /// Build the context from the head bytes holding the frame at `location`.
    pub fn from_frame(head: &[u8], location: &FrameLocation, length: Option<u64>, decoder: &TextDecoder) -> Self {
        let header = location.header;
        let frame = head.get(location.offset..).unwrap_or_default();
        let vbr_info = VbrInfo::detect(frame, &header);
        let ms_per_frame = header.ms_per_frame();

        let vbr_frames = (vbr_info.vbr && vbr_info.frames > 0).then_some(u64::from(vbr_info.frames));
        let bitrate = match vbr_frames {
            Some(frames) if vbr_info.bytes > 0 => {
                let average = (f64::from(vbr_info.bytes) * 8.0 / (f64::from(ms_per_frame) * frames as f64)) as u32;
                average * 1000
            }
            _ => header.bitrate(),
        };

        let total_frames = length.map(|len| vbr_frames.unwrap_or_else(|| header.max_frames(len)));
        let total_ms = total_frames.map(|frames| (frames as f64 * f64::from(ms_per_frame)).round() as u64);

        let (id3v2_raw, id3v2) = if location.id3v2_len > 0 {
            let span = &head[..location.id3v2_len.min(head.len())];
            let tag = match Id3v2Parser::new(*decoder).parse_tag(span) {
                Ok(tag) => Some(tag),
                Err(e) => {
                    log::debug!("ignoring ID3v2 tag: {}", e);
                    None
                }
            };
            (Some(span.to_vec()), tag)
        } else {
            (None, None)
        };

        StreamContext {
            length,
            version: header.version,
            layer: header.layer,
            channel_mode: header.channel_mode,
            channels: header.channels(),
            vbr: vbr_info.vbr,
            vbr_scale: vbr_info.scale,
            frame_size: header.frame_size(),
            sample_rate: header.sample_rate(),
            frame_rate: header.frame_rate(),
            bitrate,
            total_frames,
            total_ms,
            sync_header: header.raw,
            encoding: header.encoding(),
            header,
            id3v2_len: location.id3v2_len,
            id3v2_raw,
            id3v2,
        }
    }

    /// File-scope technical properties. Tags are merged by the caller.
    pub fn file_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("mp3.header.pos", self.id3v2_len as i64);
        props.insert("mp3.version.mpeg", self.version.label());
        props.insert("mp3.version.layer", itoa::Buffer::new().format(self.layer.as_u8()));
        props.insert("mp3.version.encoding", self.encoding.name());
        props.insert("mp3.mode", u32::from(self.channel_mode.code()));
        props.insert("mp3.channels", self.channels);
        props.insert("mp3.vbr", self.vbr);
        props.insert("mp3.vbr.scale", self.vbr_scale);
        props.insert("mp3.framesize.bytes", self.frame_size);
        props.insert("mp3.frequency.hz", self.sample_rate);
        props.insert("mp3.framerate.fps", self.frame_rate);
        if let Some(length) = self.length {
            props.insert("mp3.length.bytes", length as i64);
        }
        if let Some(frames) = self.total_frames {
            props.insert("mp3.length.frames", frames as i64);
        }
        props.insert("mp3.bitrate.nominal.bps", self.bitrate);
        if let Some(ms) = self.total_ms {
            props.insert("duration", ms as i64 * 1000);
        }
        props.insert("mp3.copyright", self.header.copyright);
        props.insert("mp3.original", self.header.original);
        props.insert("mp3.crc", self.header.has_crc());
        props.insert("mp3.padding", self.header.padding);
        if let Some(raw) = &self.id3v2_raw {
            props.insert("mp3.id3tag.v2", raw.clone());
            if let Some(tag_header) = ID3Header::parse(raw) {
                props.insert("mp3.id3tag.v2.version", itoa::Buffer::new().format(tag_header.major));
            }
        }
        props
    }

    /// Format-scope properties: `vbr` and `bitrate`.
    pub fn format_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("vbr", self.vbr);
        props.insert("bitrate", self.bitrate);
        props
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::error::ProbeError;
    use crate::id3::keys;

    /// MPEG1 Layer III, 128 kbit/s, 44.1 kHz, joint stereo, no padding.
    pub(crate) const CBR_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
    pub(crate) const CBR_FRAME_LEN: usize = 417;

    pub(crate) fn cbr_frames(count: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(count * CBR_FRAME_LEN);
        for _ in 0..count {
            out.extend_from_slice(&CBR_HEADER);
            out.resize(out.len() + CBR_FRAME_LEN - 4, 0);
        }
        out
    }

    fn id3v23_title(title: &str) -> Vec<u8> {
        let mut body = b"TIT2".to_vec();
        body.extend_from_slice(&(title.len() as u32 + 1).to_be_bytes());
        body.extend_from_slice(&[0, 0, 0]);
        body.extend_from_slice(title.as_bytes());
        let mut tag = b"ID3\x03\x00\x00".to_vec();
        let size = body.len() as u32;
        tag.extend_from_slice(&[(size >> 21) as u8 & 0x7F, (size >> 14) as u8 & 0x7F, (size >> 7) as u8 & 0x7F, size as u8 & 0x7F]);
        tag.extend(body);
        tag
    }

    fn locate(data: &[u8]) -> Result<FrameLocation> {
        FrameScanner::new(1 << 20).scan(data, true).map(|l| l.expect("frame at eof"))
    }

    #[test]
    fn cbr_stream_properties() {
        let data = cbr_frames(10);
        let location = locate(&data).unwrap();
        assert_eq!(location.offset, 0);
        let ctx = StreamContext::from_frame(&data, &location, Some(data.len() as u64), &TextDecoder::default());
        assert_eq!(ctx.total_frames, Some(10));
        assert_eq!(ctx.total_ms, Some(261));

        let props = ctx.file_properties();
        assert_eq!(props.get_int("mp3.header.pos"), Some(0));
        assert_eq!(props.get_text("mp3.version.mpeg"), Some("1"));
        assert_eq!(props.get_text("mp3.version.layer"), Some("3"));
        assert_eq!(props.get_text("mp3.version.encoding"), Some("MPEG1L3"));
        assert_eq!(props.get_int("mp3.mode"), Some(1));
        assert_eq!(props.get_int("mp3.channels"), Some(2));
        assert_eq!(props.get_bool("mp3.vbr"), Some(false));
        assert_eq!(props.get_int("mp3.framesize.bytes"), Some(413));
        assert_eq!(props.get_int("mp3.frequency.hz"), Some(44100));
        assert_eq!(props.get_int("mp3.bitrate.nominal.bps"), Some(128000));
        assert_eq!(props.get_int("mp3.length.bytes"), Some(4170));
        assert_eq!(props.get_int("duration"), Some(261_000));
        assert_eq!(props.get_bool("mp3.crc"), Some(false));
        assert_eq!(props.get_bool("mp3.original"), Some(true));
        assert!(!props.contains_key("mp3.id3tag.v2"));

        let fps = props.get_float("mp3.framerate.fps").unwrap();
        assert!((fps - 38.28125).abs() < 1e-3);

        let format = ctx.format_properties();
        assert_eq!(format.get_bool("vbr"), Some(false));
        assert_eq!(format.get_int("bitrate"), Some(128000));
    }

    #[test]
    fn unknown_length_has_no_duration() {
        let data = cbr_frames(2);
        let location = locate(&data).unwrap();
        let props = StreamContext::from_frame(&data, &location, None, &TextDecoder::default()).file_properties();
        assert!(!props.contains_key("duration"));
        assert!(!props.contains_key("mp3.length.frames"));
    }

    #[test]
    fn leading_junk_and_id3v2() {
        let mut data = id3v23_title("Pop");
        let tag_len = data.len();
        data.extend_from_slice(b"junk");
        data.extend(cbr_frames(3));

        let location = locate(&data).unwrap();
        assert_eq!(location.id3v2_len, tag_len);
        assert_eq!(location.offset, tag_len + 4);

        let ctx = StreamContext::from_frame(&data, &location, None, &TextDecoder::default());
        let tag = ctx.id3v2.as_ref().unwrap();
        assert_eq!(tag.fields.get_text(keys::TITLE), Some("Pop"));

        let props = ctx.file_properties();
        assert_eq!(props.get_int("mp3.header.pos"), Some(tag_len as i64));
        assert_eq!(props.get_text("mp3.id3tag.v2.version"), Some("3"));
        assert_eq!(props.get("mp3.id3tag.v2").and_then(|v| v.as_bytes()).map(<[u8]>::len), Some(tag_len));
    }

    #[test]
    fn reserved_fields_reject() {
        let mut data = vec![0xFF, 0xEB, 0x90, 0x64];
        data.resize(500, 0);
        let err = locate(&data).unwrap_err();
        assert_eq!(err.not_mpeg_reason(), Some(NotMpegReason::WrongVersion));

        let mut data = vec![0xFF, 0xFB, 0x9C, 0x64];
        data.resize(500, 0);
        let err = locate(&data).unwrap_err();
        assert_eq!(err.to_string(), "not a MPEG stream: wrong sampling rate");
    }

    #[test]
    fn false_syncs_are_skipped() {
        let mut data = vec![0xFF; 4];
        data.extend(cbr_frames(10));
        let location = locate(&data).unwrap();
        assert_eq!(location.offset, 4);
        assert_eq!(location.header.sample_rate(), 44100);

        let ctx = StreamContext::from_frame(&data, &location, Some(data.len() as u64), &TextDecoder::default());
        assert_eq!(ctx.total_frames, Some(10));
    }

    #[test]
    fn first_bad_sync_names_the_rejection() {
        let mut data = vec![0xFF, 0xEB, 0x90, 0x64, 0x00, 0xFF, 0xFB, 0x9C, 0x64];
        data.resize(600, 0);
        let err = locate(&data).unwrap_err();
        assert_eq!(err.not_mpeg_reason(), Some(NotMpegReason::WrongVersion));
    }

    #[test]
    fn no_sync_within_limit() {
        let mut data = vec![0u8; 64];
        data.extend(cbr_frames(1));
        let err = FrameScanner::new(32).scan(&data, false).unwrap_err();
        assert!(matches!(err, ProbeError::NotMpegStream(NotMpegReason::NoSync)));
    }

    #[test]
    fn scanner_asks_for_more() {
        let data = cbr_frames(1);
        let mut scanner = FrameScanner::new(1 << 20);
        assert!(scanner.scan(&data[..2], false).unwrap().is_none());
        assert!(scanner.scan(&data[..100], false).unwrap().is_none());
        assert!(scanner.scan(&data, false).unwrap().is_some());
    }

    #[test]
    fn xing_frame_count_wins() {
        let mut data = cbr_frames(1);
        // Side info for MPEG1 stereo is 32 bytes.
        let xing = 4 + 32;
        data[xing..xing + 4].copy_from_slice(b"Xing");
        data[xing + 4..xing + 8].copy_from_slice(&0x03u32.to_be_bytes());
        data[xing + 8..xing + 12].copy_from_slice(&1000u32.to_be_bytes());
        data[xing + 12..xing + 16].copy_from_slice(&2_000_000u32.to_be_bytes());

        let location = locate(&data).unwrap();
        let ctx = StreamContext::from_frame(&data, &location, Some(5_000_000), &TextDecoder::default());
        assert!(ctx.vbr);
        assert_eq!(ctx.vbr_scale, -1);
        assert_eq!(ctx.total_frames, Some(1000));
        // 2e6 * 8 / (26.122449 * 1000) = 612.5 -> 612 kbit/s
        assert_eq!(ctx.bitrate, 612_000);
        assert_eq!(ctx.format_properties().get_bool("vbr"), Some(true));
    }
}
