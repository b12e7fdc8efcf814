//! Property identifiers and values.
//!
//! Properties are addressed by four-character codes so that any id can be
//! expressed, including ones a converter does not recognize.

use std::fmt;

use crate::AudioFormat;

/// A four-character property code.
///
/// # Example
///
/// ```
/// use audio_converter::PropertyId;
///
/// assert_eq!(PropertyId::from_fourcc(*b"brat"), PropertyId::ENCODE_BIT_RATE);
/// assert_eq!(PropertyId::ENCODE_BIT_RATE.to_string(), "'brat'");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(u32);

impl PropertyId {
    /// Target bit rate of the encoder, in bits per second. Read/write,
    /// compressed destinations only.
    pub const ENCODE_BIT_RATE: Self = Self::from_fourcc(*b"brat");
    /// Bytes per source frame. Read-only.
    pub const FRAME_SIZE: Self = Self::from_fourcc(*b"fsiz");
    /// Upper bound on the size of one output packet. Read-only.
    pub const MAXIMUM_OUTPUT_PACKET_SIZE: Self = Self::from_fourcc(*b"xops");
    /// The source format. Read-only.
    pub const CURRENT_INPUT_STREAM_DESCRIPTION: Self = Self::from_fourcc(*b"acid");
    /// The destination format. Read-only.
    pub const CURRENT_OUTPUT_STREAM_DESCRIPTION: Self = Self::from_fourcc(*b"acod");
    /// Packets skipped because they failed to decode. Read-only.
    pub const DECODE_ERROR_COUNT: Self = Self::from_fourcc(*b"derr");

    /// Builds an id from its four-character code.
    pub const fn from_fourcc(code: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(code))
    }

    /// Returns the four-character code.
    pub const fn fourcc(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.fourcc();
        if code.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "'{}'", String::from_utf8_lossy(&code))
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

/// A property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValue {
    /// A 32-bit unsigned value.
    U32(u32),
    /// A 64-bit unsigned value.
    U64(u64),
    /// A stream format.
    Format(AudioFormat),
}

impl PropertyValue {
    /// Returns the value if it is a `U32`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value if it is a `U64`, widening `U32`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(value) => Some(*value),
            Self::U32(value) => Some(u64::from(*value)),
            Self::Format(_) => None,
        }
    }

    /// Returns the value if it is a `Format`.
    pub fn as_format(&self) -> Option<&AudioFormat> {
        match self {
            Self::Format(format) => Some(format),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_roundtrip() {
        assert_eq!(PropertyId::FRAME_SIZE.fourcc(), *b"fsiz");
        assert_ne!(PropertyId::FRAME_SIZE, PropertyId::ENCODE_BIT_RATE);
    }

    #[test]
    fn test_display_non_printable() {
        let id = PropertyId::from_fourcc([0, 0, 0, 1]);
        assert_eq!(id.to_string(), "0x00000001");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(PropertyValue::U32(7).as_u32(), Some(7));
        assert_eq!(PropertyValue::U32(7).as_u64(), Some(7));
        assert_eq!(PropertyValue::U64(7).as_u32(), None);

        let format = AudioFormat::pcm_i16(8000, 1);
        assert_eq!(PropertyValue::Format(format).as_format(), Some(&format));
        assert_eq!(PropertyValue::Format(format).as_u64(), None);
    }
}
