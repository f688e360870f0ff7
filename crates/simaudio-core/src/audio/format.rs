//! Stream format description
//!
//! The device exposes linear PCM, 16-bit signed, native-endian mono at one of
//! the two [`SUPPORTED_SAMPLE_RATES`](crate::SUPPORTED_SAMPLE_RATES).

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Sample encoding of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatId {
    /// Uncompressed linear PCM
    LinearPcm,
}

/// Bit flags qualifying a [`FormatId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatFlags(u32);

impl FormatFlags {
    pub const IS_FLOAT: FormatFlags = FormatFlags(1 << 0);
    pub const IS_BIG_ENDIAN: FormatFlags = FormatFlags(1 << 1);
    pub const IS_SIGNED_INTEGER: FormatFlags = FormatFlags(1 << 2);
    pub const IS_PACKED: FormatFlags = FormatFlags(1 << 3);

    /// Endianness flag matching the target the crate was built for
    #[cfg(target_endian = "big")]
    pub const NATIVE_ENDIAN: FormatFlags = FormatFlags::IS_BIG_ENDIAN;
    #[cfg(target_endian = "little")]
    pub const NATIVE_ENDIAN: FormatFlags = FormatFlags(0);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: FormatFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FormatFlags {
    type Output = FormatFlags;

    fn bitor(self, rhs: FormatFlags) -> FormatFlags {
        FormatFlags(self.0 | rhs.0)
    }
}

/// Basic description of a stream's sample layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Frames per second
    pub sample_rate: f64,
    pub format_id: FormatId,
    pub format_flags: FormatFlags,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl StreamFormat {
    /// Signed 16-bit native-endian linear PCM
    pub fn pcm_i16(sample_rate: f64, channels_per_frame: u32) -> Self {
        let bytes_per_frame = std::mem::size_of::<i16>() as u32 * channels_per_frame;
        Self {
            sample_rate,
            format_id: FormatId::LinearPcm,
            format_flags: FormatFlags::IS_SIGNED_INTEGER | FormatFlags::NATIVE_ENDIAN,
            bytes_per_packet: bytes_per_frame,
            frames_per_packet: 1,
            bytes_per_frame,
            channels_per_frame,
            bits_per_channel: 16,
        }
    }

    /// Bytes occupied by a single channel sample
    pub fn bytes_per_sample(&self) -> u32 {
        self.bits_per_channel / 8
    }

    /// Checks the frame layout invariant
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0.0
            && self.channels_per_frame > 0
            && self.bits_per_channel % 8 == 0
            && self.bytes_per_frame == self.bytes_per_sample() * self.channels_per_frame
            && self.bytes_per_packet == self.bytes_per_frame * self.frames_per_packet
    }

    /// Whether two rates denote the same integral rate
    pub fn same_rate(a: f64, b: f64) -> bool {
        a as u64 == b as u64
    }
}

/// Every format the device advertises on both streams
pub fn supported_formats() -> Vec<StreamFormat> {
    crate::SUPPORTED_SAMPLE_RATES
        .iter()
        .map(|&rate| StreamFormat::pcm_i16(rate, crate::CHANNELS_PER_FRAME))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_i16_layout() {
        let format = StreamFormat::pcm_i16(44100.0, 1);
        assert_eq!(format.bytes_per_frame, 2);
        assert_eq!(format.bytes_per_sample(), 2);
        assert_eq!(format.bits_per_channel, 16);
        assert!(format.format_flags.contains(FormatFlags::IS_SIGNED_INTEGER));
        assert!(!format.format_flags.contains(FormatFlags::IS_FLOAT));
        assert!(format.is_valid());
    }

    #[test]
    fn test_invalid_frame_layout() {
        let mut format = StreamFormat::pcm_i16(48000.0, 2);
        assert!(format.is_valid());
        format.bytes_per_frame = 2;
        assert!(!format.is_valid());
    }

    #[test]
    fn test_supported_formats() {
        let formats = supported_formats();
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0].sample_rate, 44100.0);
        assert_eq!(formats[1].sample_rate, 48000.0);
        assert!(formats.iter().all(|f| f.channels_per_frame == 1));
    }

    #[test]
    fn test_same_rate_ignores_fraction() {
        assert!(StreamFormat::same_rate(48000.0, 48000.4));
        assert!(!StreamFormat::same_rate(44100.0, 48000.0));
    }
}
