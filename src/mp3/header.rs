use crate::common::error::NotMpegReason;
use crate::format::MpegEncoding;

/// MPEG audio version, numbered by the decoder's version index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg2 = 0,
    Mpeg1 = 1,
    Mpeg25 = 2,
}

impl MpegVersion {
    /// Decode the 2-bit version field. `01` is reserved.
    fn from_bits(bits: u32) -> Result<Self, NotMpegReason> {
        match bits {
            0 => Ok(MpegVersion::Mpeg25),
            2 => Ok(MpegVersion::Mpeg2),
            3 => Ok(MpegVersion::Mpeg1),
            _ => Err(NotMpegReason::WrongVersion),
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// "1", "2" or "2.5".
    pub fn label(&self) -> &'static str {
        match self {
            MpegVersion::Mpeg1 => "1",
            MpegVersion::Mpeg2 => "2",
            MpegVersion::Mpeg25 => "2.5",
        }
    }

    /// MPEG-2 and MPEG-2.5 are the low sampling frequency extensions.
    pub fn is_lsf(&self) -> bool {
        !matches!(self, MpegVersion::Mpeg1)
    }
}

/// MPEG audio layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    Layer1 = 1,
    Layer2 = 2,
    Layer3 = 3,
}

impl MpegLayer {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(MpegLayer::Layer3),
            2 => Some(MpegLayer::Layer2),
            3 => Some(MpegLayer::Layer1),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Channel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo = 0,
    JointStereo = 1,
    DualChannel = 2,
    Mono = 3,
}

impl ChannelMode {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x03 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn num_channels(&self) -> u32 {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

// Bitrates in kbit/s, [lsf][layer - 1][bitrate_index].
// Index 0 is free format and 15 is "bad"; both map to 0.
const BITRATES: [[[u32; 16]; 3]; 2] = [
    // MPEG1
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
    ],
    // MPEG2, MPEG2.5
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
    ],
];

// [version index][sample rate index]
const FREQUENCIES: [[u32; 3]; 3] = [
    // MPEG2
    [22050, 24000, 16000],
    // MPEG1
    [44100, 48000, 32000],
    // MPEG2.5
    [11025, 12000, 8000],
];

// [version index][layer - 1]
const ENCODINGS: [[MpegEncoding; 3]; 3] = [
    [MpegEncoding::Mpeg2L1, MpegEncoding::Mpeg2L2, MpegEncoding::Mpeg2L3],
    [MpegEncoding::Mpeg1L1, MpegEncoding::Mpeg1L2, MpegEncoding::Mpeg1L3],
    [MpegEncoding::Mpeg25L1, MpegEncoding::Mpeg25L2, MpegEncoding::Mpeg25L3],
];

/// A decoded MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    /// The 32 header bits as read from the stream.
    pub raw: u32,
    pub version: MpegVersion,
    pub layer: MpegLayer,
    /// Protection bit as stored; `false` means a CRC follows the header.
    pub protection_bit: bool,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: bool,
    pub private: bool,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: u8,
}

impl FrameHeader {
    /// Decode and validate the header bits.
    pub fn parse(raw: u32) -> Result<Self, NotMpegReason> {
        if !is_sync_mark(raw) {
            return Err(NotMpegReason::NoSync);
        }
        let version = MpegVersion::from_bits((raw >> 19) & 0x03)?;
        let layer = MpegLayer::from_bits((raw >> 17) & 0x03).ok_or(NotMpegReason::NoSync)?;
        let sample_rate_index = ((raw >> 10) & 0x03) as u8;
        if sample_rate_index == 3 {
            return Err(NotMpegReason::WrongSamplingRate);
        }

        let header = FrameHeader {
            raw,
            version,
            layer,
            protection_bit: (raw >> 16) & 0x01 != 0,
            bitrate_index: ((raw >> 12) & 0x0F) as u8,
            sample_rate_index,
            padding: (raw >> 9) & 0x01 != 0,
            private: (raw >> 8) & 0x01 != 0,
            channel_mode: ChannelMode::from_bits(raw >> 6),
            mode_extension: ((raw >> 4) & 0x03) as u8,
            copyright: (raw >> 3) & 0x01 != 0,
            original: (raw >> 2) & 0x01 != 0,
            emphasis: (raw & 0x03) as u8,
        };

        // A zero bitrate can still give a non-negative size for padded Layer I.
        let frame_size = header.frame_size();
        if frame_size < 0 || header.bitrate() == 0 {
            return Err(NotMpegReason::InvalidFrameSize(frame_size));
        }
        if header.frame_rate() < 0.0 {
            return Err(NotMpegReason::InvalidFrameRate);
        }
        Ok(header)
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Result<Self, NotMpegReason> {
        Self::parse(u32::from_be_bytes(bytes))
    }

    /// Nominal bitrate in bits per second.
    pub fn bitrate(&self) -> u32 {
        let lsf = usize::from(self.version.is_lsf());
        BITRATES[lsf][self.layer as usize - 1][self.bitrate_index as usize] * 1000
    }

    pub fn sample_rate(&self) -> u32 {
        FREQUENCIES[self.version.index()][self.sample_rate_index as usize]
    }

    pub fn channels(&self) -> u32 {
        self.channel_mode.num_channels()
    }

    /// A CRC word follows the header.
    pub fn has_crc(&self) -> bool {
        !self.protection_bit
    }

    pub fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (MpegLayer::Layer1, _) => 384,
            (MpegLayer::Layer2, _) => 1152,
            (MpegLayer::Layer3, MpegVersion::Mpeg1) => 1152,
            (MpegLayer::Layer3, _) => 576,
        }
    }

    /// Frame length in bytes, not counting the 4 header bytes.
    pub fn frame_size(&self) -> i32 {
        let bitrate = self.bitrate() as i32;
        let frequency = self.sample_rate() as i32;
        let pad = i32::from(self.padding);
        let size = match self.layer {
            MpegLayer::Layer1 => (12 * bitrate / frequency + pad) << 2,
            _ => {
                let mut size = 144 * bitrate / frequency;
                if self.version.is_lsf() {
                    size >>= 1;
                }
                size + pad
            }
        };
        size - 4
    }

    pub fn ms_per_frame(&self) -> f32 {
        self.samples_per_frame() as f32 * 1000.0 / self.sample_rate() as f32
    }

    pub fn frame_rate(&self) -> f32 {
        1000.0 / self.ms_per_frame()
    }

    /// Frames a stream of `stream_len` bytes holds at this header's frame size.
    pub fn max_frames(&self, stream_len: u64) -> u64 {
        let stride = self.frame_size() as i64 + 4 - i64::from(self.padding);
        if stride <= 0 {
            return 0;
        }
        stream_len / stride as u64
    }

    pub fn encoding(&self) -> MpegEncoding {
        ENCODINGS[self.version.index()][self.layer as usize - 1]
    }
}

/// 11 sync bits set and a layer other than the reserved `00`.
#[inline]
pub fn is_sync_mark(raw: u32) -> bool {
    raw & 0xFFE0_0000 == 0xFFE0_0000 && (raw >> 17) & 0x03 != 0
}

/// Scan `data[start..limit]` for the first frame sync.
/// Returns the offset and the raw header bits.
#[inline]
pub fn find_sync(data: &[u8], start: usize, limit: usize) -> Option<(usize, u32)> {
    use memchr::memchr;

    let end = data.len().min(limit);
    let mut pos = start;
    while pos + 4 <= end {
        // Use SIMD-accelerated search for 0xFF
        match memchr(0xFF, &data[pos..end]) {
            Some(offset) => {
                pos += offset;
                if pos + 4 > end {
                    return None;
                }
                let raw = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
                if is_sync_mark(raw) {
                    return Some((pos, raw));
                }
                pos += 1;
            }
            None => return None,
        }
    }
    None
}
