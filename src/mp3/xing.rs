use byteorder::{BigEndian, ByteOrder};

use crate::mp3::header::{ChannelMode, FrameHeader, MpegVersion};

const XING_FRAMES: u32 = 0x01;
const XING_BYTES: u32 = 0x02;
const XING_TOC: u32 = 0x04;
const XING_SCALE: u32 = 0x08;

/// Parsed Xing/Info header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XingHeader {
    pub frames: Option<u32>,
    pub bytes: Option<u32>,
    pub toc: Option<Vec<u8>>,
    pub scale: Option<u32>,
    /// "Info" marks a CBR stream, "Xing" a VBR one.
    pub is_info: bool,
}

/// Parsed VBRI (Fraunhofer) header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VbriHeader {
    pub version: u16,
    pub delay: u16,
    pub quality: u16,
    pub bytes: u32,
    pub frames: u32,
}

/// VBR facts taken from whichever header the first frame carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VbrInfo {
    pub vbr: bool,
    pub scale: i32,
    pub frames: u32,
    pub bytes: u32,
}

/// Bytes of side information between the header (and CRC) and the main data.
fn side_info_len(version: MpegVersion, mode: ChannelMode) -> usize {
    match (version, mode) {
        (MpegVersion::Mpeg1, ChannelMode::Mono) => 17,
        (MpegVersion::Mpeg1, _) => 32,
        (_, ChannelMode::Mono) => 9,
        (_, _) => 17,
    }
}

impl XingHeader {
    /// `frame` starts at the sync word of the first frame.
    pub fn parse(frame: &[u8], header: &FrameHeader) -> Option<Self> {
        let offset = 4 + side_info_len(header.version, header.channel_mode);
        let tag = frame.get(offset..offset + 4)?;
        let is_info = match tag {
            b"Xing" => false,
            b"Info" => true,
            _ => return None,
        };

        let mut pos = offset + 4;
        let flags = BigEndian::read_u32(frame.get(pos..pos + 4)?);
        pos += 4;

        let read_u32 = |pos: &mut usize| -> Option<u32> {
            let value = BigEndian::read_u32(frame.get(*pos..*pos + 4)?);
            *pos += 4;
            Some(value)
        };

        let frames = if flags & XING_FRAMES != 0 { Some(read_u32(&mut pos)?) } else { None };
        let bytes = if flags & XING_BYTES != 0 { Some(read_u32(&mut pos)?) } else { None };
        let toc = if flags & XING_TOC != 0 {
            let toc = frame.get(pos..pos + 100)?.to_vec();
            pos += 100;
            Some(toc)
        } else {
            None
        };
        let scale = if flags & XING_SCALE != 0 { Some(read_u32(&mut pos)?) } else { None };

        Some(XingHeader {
            frames,
            bytes,
            toc,
            scale,
            is_info,
        })
    }
}

impl VbriHeader {
    /// VBRI always sits 32 bytes after the frame header.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let offset = 36;
        let data = frame.get(offset..offset + 18)?;
        if &data[..4] != b"VBRI" {
            return None;
        }
        Some(VbriHeader {
            version: BigEndian::read_u16(&data[4..6]),
            delay: BigEndian::read_u16(&data[6..8]),
            quality: BigEndian::read_u16(&data[8..10]),
            bytes: BigEndian::read_u32(&data[10..14]),
            frames: BigEndian::read_u32(&data[14..18]),
        })
    }
}

impl VbrInfo {
    /// Look for a Xing, then a VBRI header in the first frame.
    pub fn detect(frame: &[u8], header: &FrameHeader) -> Self {
        if let Some(xing) = XingHeader::parse(frame, header) {
            log::trace!("xing header found, info={}", xing.is_info);
            if xing.is_info {
                return VbrInfo::default();
            }
            return VbrInfo {
                vbr: true,
                scale: xing.scale.map(|s| s as i32).unwrap_or(-1),
                frames: xing.frames.unwrap_or(0),
                bytes: xing.bytes.unwrap_or(0),
            };
        }
        if let Some(vbri) = VbriHeader::parse(frame) {
            log::trace!("VBRI header found, version {}", vbri.version);
            return VbrInfo {
                vbr: true,
                scale: i32::from(vbri.quality),
                frames: vbri.frames,
                bytes: vbri.bytes,
            };
        }
        VbrInfo::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mpeg1_stereo() -> FrameHeader {
        FrameHeader::parse(0xFFFB_9064).unwrap()
    }

    fn frame_with_xing(tag: &[u8; 4], flags: u32, fields: &[u32]) -> Vec<u8> {
        let mut frame = 0xFFFB_9064u32.to_be_bytes().to_vec();
        frame.resize(36, 0);
        frame.extend_from_slice(tag);
        frame.extend_from_slice(&flags.to_be_bytes());
        for field in fields {
            frame.extend_from_slice(&field.to_be_bytes());
        }
        frame.resize(417, 0);
        frame
    }

    #[test]
    fn xing_frames_bytes_and_scale() {
        let frame = frame_with_xing(b"Xing", XING_FRAMES | XING_BYTES | XING_SCALE, &[1000, 400_000, 78]);
        let xing = XingHeader::parse(&frame, &mpeg1_stereo()).unwrap();
        assert_eq!(xing.frames, Some(1000));
        assert_eq!(xing.bytes, Some(400_000));
        assert_eq!(xing.scale, Some(78));
        assert!(!xing.is_info);

        let info = VbrInfo::detect(&frame, &mpeg1_stereo());
        assert_eq!(info, VbrInfo { vbr: true, scale: 78, frames: 1000, bytes: 400_000 });
    }

    #[test]
    fn info_tag_is_not_vbr() {
        let frame = frame_with_xing(b"Info", XING_FRAMES, &[10]);
        assert!(XingHeader::parse(&frame, &mpeg1_stereo()).unwrap().is_info);
        assert!(!VbrInfo::detect(&frame, &mpeg1_stereo()).vbr);
    }

    #[test]
    fn vbri_at_fixed_offset() {
        let mut frame = 0xFFFB_9064u32.to_be_bytes().to_vec();
        frame.resize(36, 0);
        frame.extend_from_slice(b"VBRI");
        frame.extend_from_slice(&1u16.to_be_bytes());
        frame.extend_from_slice(&0x0300u16.to_be_bytes());
        frame.extend_from_slice(&75u16.to_be_bytes());
        frame.extend_from_slice(&123_456u32.to_be_bytes());
        frame.extend_from_slice(&321u32.to_be_bytes());
        let info = VbrInfo::detect(&frame, &mpeg1_stereo());
        assert_eq!(info, VbrInfo { vbr: true, scale: 75, frames: 321, bytes: 123_456 });
    }

    #[test]
    fn truncated_xing_is_ignored() {
        let mut frame = frame_with_xing(b"Xing", XING_FRAMES | XING_BYTES, &[]);
        frame.truncate(44);
        assert_eq!(XingHeader::parse(&frame, &mpeg1_stereo()), None);
    }
}
