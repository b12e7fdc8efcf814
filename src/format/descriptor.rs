//! Audio stream format descriptors.

use std::fmt;

use crate::ConverterError;

/// Identifies the encoding of an audio stream.
///
/// Everything except [`FormatId::LinearPcm`] is a compressed codec tag.
/// Which tags can actually be decoded or encoded depends on the
/// [`EngineFactory`](crate::engine::EngineFactory) in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// Uncompressed linear PCM.
    LinearPcm,
    /// G.711 µ-law.
    ULaw,
    /// G.711 A-law.
    ALaw,
    /// MPEG-1/2 Layer III.
    Mp3,
    /// MPEG-4 AAC.
    Aac,
    /// Apple Lossless.
    Alac,
    /// Free Lossless Audio Codec.
    Flac,
    /// Opus.
    Opus,
    /// Dolby Digital.
    Ac3,
    /// GSM 06.10.
    Gsm,
    /// AMR narrowband.
    AmrNb,
    /// Internet Low Bitrate Codec.
    Ilbc,
}

impl FormatId {
    /// Returns the four-character code conventionally used for this format.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Self::LinearPcm => *b"lpcm",
            Self::ULaw => *b"ulaw",
            Self::ALaw => *b"alaw",
            Self::Mp3 => *b".mp3",
            Self::Aac => *b"aac ",
            Self::Alac => *b"alac",
            Self::Flac => *b"flac",
            Self::Opus => *b"opus",
            Self::Ac3 => *b"ac-3",
            Self::Gsm => *b"agsm",
            Self::AmrNb => *b"samr",
            Self::Ilbc => *b"ilbc",
        }
    }

    /// Returns `true` for linear PCM.
    pub fn is_pcm(self) -> bool {
        self == Self::LinearPcm
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.fourcc();
        write!(f, "'{}'", String::from_utf8_lossy(&code))
    }
}

/// Sample layout flags for linear PCM formats.
///
/// Ignored for compressed formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FormatFlags {
    /// Samples are IEEE floats.
    pub is_float: bool,
    /// Integer samples are signed (unsigned is only valid for 8-bit).
    pub is_signed_integer: bool,
    /// Samples are big-endian.
    pub is_big_endian: bool,
    /// Samples fill all bits of their container.
    pub is_packed: bool,
    /// Each channel lives in its own buffer.
    pub is_non_interleaved: bool,
}

/// Describes one side of a conversion.
///
/// Mirrors the classic stream basic description: a PCM format has one frame
/// per packet and `bytes_per_frame` covers every channel (or one channel for
/// non-interleaved layouts). Compressed formats set `frames_per_packet`
/// (0 = variable) and `bytes_per_packet` (0 = variable bit rate).
///
/// # Example
///
/// ```
/// use audio_converter::AudioFormat;
///
/// let cd = AudioFormat::pcm_i16(44100, 2);
/// assert_eq!(cd.bytes_per_frame, 4);
/// assert!(cd.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Encoding of the stream.
    pub format_id: FormatId,
    /// PCM layout flags.
    pub flags: FormatFlags,
    /// Bytes in one packet, or 0 if packets vary in size.
    pub bytes_per_packet: u32,
    /// Frames in one packet, or 0 if packets vary in length.
    pub frames_per_packet: u32,
    /// Bytes in one frame (per buffer for non-interleaved PCM), 0 if compressed.
    pub bytes_per_frame: u32,
    /// Number of channels.
    pub channels_per_frame: u16,
    /// Bits per sample, 0 if compressed.
    pub bits_per_channel: u16,
}

impl AudioFormat {
    /// Creates a linear PCM format.
    ///
    /// `bits` must be 8, 16, 24 or 32 for integers and 32 or 64 for floats.
    pub fn pcm(
        sample_rate: u32,
        channels: u16,
        bits: u16,
        is_float: bool,
        interleaved: bool,
    ) -> Self {
        let bytes_per_sample = u32::from(bits.div_ceil(8));
        let bytes_per_frame = if interleaved {
            bytes_per_sample * u32::from(channels)
        } else {
            bytes_per_sample
        };
        Self {
            sample_rate,
            format_id: FormatId::LinearPcm,
            flags: FormatFlags {
                is_float,
                is_signed_integer: !is_float && bits > 8,
                is_big_endian: false,
                is_packed: true,
                is_non_interleaved: !interleaved,
            },
            bytes_per_packet: bytes_per_frame,
            frames_per_packet: 1,
            bytes_per_frame,
            channels_per_frame: channels,
            bits_per_channel: bits,
        }
    }

    /// Creates an interleaved signed 16-bit little-endian PCM format.
    pub fn pcm_i16(sample_rate: u32, channels: u16) -> Self {
        Self::pcm(sample_rate, channels, 16, false, true)
    }

    /// Creates an interleaved 32-bit float little-endian PCM format.
    pub fn pcm_f32(sample_rate: u32, channels: u16) -> Self {
        Self::pcm(sample_rate, channels, 32, true, true)
    }

    /// Creates a G.711 µ-law format with the given packet length in frames.
    pub fn ulaw(sample_rate: u32, channels: u16, frames_per_packet: u32) -> Self {
        Self::g711(FormatId::ULaw, sample_rate, channels, frames_per_packet)
    }

    /// Creates a G.711 A-law format with the given packet length in frames.
    pub fn alaw(sample_rate: u32, channels: u16, frames_per_packet: u32) -> Self {
        Self::g711(FormatId::ALaw, sample_rate, channels, frames_per_packet)
    }

    fn g711(format_id: FormatId, sample_rate: u32, channels: u16, frames_per_packet: u32) -> Self {
        Self {
            sample_rate,
            format_id,
            flags: FormatFlags::default(),
            bytes_per_packet: frames_per_packet * u32::from(channels),
            frames_per_packet,
            bytes_per_frame: u32::from(channels),
            channels_per_frame: channels,
            bits_per_channel: 8,
        }
    }

    /// Creates a variable-bit-rate compressed format.
    pub fn compressed(
        format_id: FormatId,
        sample_rate: u32,
        channels: u16,
        frames_per_packet: u32,
    ) -> Self {
        Self {
            sample_rate,
            format_id,
            flags: FormatFlags::default(),
            bytes_per_packet: 0,
            frames_per_packet,
            bytes_per_frame: 0,
            channels_per_frame: channels,
            bits_per_channel: 0,
        }
    }

    /// Returns the same format with big-endian samples.
    #[must_use]
    pub fn big_endian(mut self) -> Self {
        self.flags.is_big_endian = true;
        self
    }

    /// Returns `true` for linear PCM.
    pub fn is_pcm(&self) -> bool {
        self.format_id.is_pcm()
    }

    /// Returns `true` unless this is non-interleaved PCM.
    pub fn is_interleaved(&self) -> bool {
        !(self.is_pcm() && self.flags.is_non_interleaved)
    }

    /// Number of buffers a buffer list for this format must have.
    pub fn buffer_count(&self) -> usize {
        if self.is_interleaved() {
            1
        } else {
            usize::from(self.channels_per_frame)
        }
    }

    /// Bytes in one sample of one channel (PCM only).
    pub fn bytes_per_sample(&self) -> u32 {
        u32::from(self.bits_per_channel.div_ceil(8))
    }

    /// Returns `true` if packets vary in size.
    pub fn is_variable_bit_rate(&self) -> bool {
        self.bytes_per_packet == 0
    }

    /// Returns `true` if packets vary in frame count.
    pub fn is_variable_framing(&self) -> bool {
        self.frames_per_packet == 0
    }

    /// Checks the descriptor for internal consistency.
    pub fn validate(&self) -> Result<(), ConverterError> {
        if self.channels_per_frame == 0 {
            return Err(ConverterError::format(format!(
                "{} has zero channels",
                self.format_id
            )));
        }
        if self.sample_rate == 0 {
            return Err(ConverterError::format(format!(
                "{} has zero sample rate",
                self.format_id
            )));
        }
        if !self.is_pcm() {
            return Ok(());
        }

        let valid_bits = if self.flags.is_float {
            matches!(self.bits_per_channel, 32 | 64)
        } else {
            matches!(self.bits_per_channel, 8 | 16 | 24 | 32)
        };
        if !valid_bits {
            return Err(ConverterError::format(format!(
                "{} bits per channel is not a valid {} PCM width",
                self.bits_per_channel,
                if self.flags.is_float {
                    "float"
                } else {
                    "integer"
                }
            )));
        }
        if self.frames_per_packet != 1 {
            return Err(ConverterError::format(format!(
                "linear PCM must have 1 frame per packet, got {}",
                self.frames_per_packet
            )));
        }

        let channels_in_buffer = if self.flags.is_non_interleaved {
            1
        } else {
            u32::from(self.channels_per_frame)
        };
        let expected = self.bytes_per_sample() * channels_in_buffer;
        if self.bytes_per_frame != expected || self.bytes_per_packet != expected {
            return Err(ConverterError::format(format!(
                "bytes per frame/packet {}/{} inconsistent with {} channels of {} bits",
                self.bytes_per_frame,
                self.bytes_per_packet,
                channels_in_buffer,
                self.bits_per_channel
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}Hz {}ch",
            self.format_id, self.sample_rate, self.channels_per_frame
        )?;
        if self.is_pcm() {
            write!(
                f,
                " {}-bit{}{}{}",
                self.bits_per_channel,
                if self.flags.is_float { " float" } else { "" },
                if self.flags.is_big_endian { " BE" } else { "" },
                if self.flags.is_non_interleaved {
                    " planar"
                } else {
                    ""
                }
            )?;
        }
        Ok(())
    }
}

/// Position and size of one packet inside a buffer.
///
/// Used for variable-size input packets and for the output description
/// array written by [`Converter::fill`](crate::Converter::fill).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketDescription {
    /// Byte offset of the packet from the start of the buffer.
    pub start_offset: u64,
    /// Frames in the packet, or 0 when the format has a fixed frame count.
    pub variable_frames_in_packet: u32,
    /// Length of the packet in bytes.
    pub data_byte_size: u32,
}

impl PacketDescription {
    /// Creates a description for a packet with a fixed frame count.
    pub fn new(start_offset: u64, data_byte_size: u32) -> Self {
        Self {
            start_offset,
            variable_frames_in_packet: 0,
            data_byte_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_i16_layout() {
        let format = AudioFormat::pcm_i16(48000, 2);
        assert_eq!(format.bytes_per_frame, 4);
        assert_eq!(format.bytes_per_packet, 4);
        assert_eq!(format.frames_per_packet, 1);
        assert!(format.flags.is_signed_integer);
        assert!(format.validate().is_ok());
    }

    #[test]
    fn test_planar_layout() {
        let format = AudioFormat::pcm(44100, 6, 32, true, false);
        assert_eq!(format.bytes_per_frame, 4);
        assert_eq!(format.buffer_count(), 6);
        assert!(!format.is_interleaved());
        assert!(format.validate().is_ok());
    }

    #[test]
    fn test_ulaw_layout() {
        let format = AudioFormat::ulaw(8000, 1, 160);
        assert_eq!(format.bytes_per_packet, 160);
        assert!(!format.is_variable_bit_rate());
        assert!(format.validate().is_ok());
    }

    #[test]
    fn test_zero_channels_rejected() {
        let format = AudioFormat::pcm_i16(48000, 0);
        assert!(matches!(
            format.validate(),
            Err(ConverterError::Format { .. })
        ));
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let format = AudioFormat::ulaw(0, 1, 160);
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_inconsistent_frame_size_rejected() {
        let mut format = AudioFormat::pcm_i16(48000, 2);
        format.bytes_per_frame = 3;
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_odd_bit_depth_rejected() {
        let format = AudioFormat::pcm(48000, 2, 20, false, true);
        assert!(format.validate().is_err());

        let format = AudioFormat::pcm(48000, 2, 16, true, true);
        assert!(format.validate().is_err());
    }

    #[test]
    fn test_display() {
        let format = AudioFormat::pcm_f32(44100, 2);
        assert_eq!(format.to_string(), "'lpcm' 44100Hz 2ch 32-bit float");
    }
}
