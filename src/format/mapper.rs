//! Translation from format descriptors to engine identifiers.
//!
//! Everything here is a pure lookup: codec tags to [`EngineCodec`], PCM
//! flags to [`SampleFormat`], channel counts to [`ChannelLayout`].

use std::fmt;

use crate::engine::PcmSpec;
use crate::format::{AudioFormat, FormatId};
use crate::ConverterError;

/// Codec identifiers understood by engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EngineCodec {
    PcmU8,
    PcmS16Le,
    PcmS16Be,
    PcmS24Le,
    PcmS24Be,
    PcmS32Le,
    PcmS32Be,
    PcmF32Le,
    PcmF32Be,
    PcmF64Le,
    PcmF64Be,
    PcmMulaw,
    PcmAlaw,
    Mp3,
    Aac,
    Alac,
    Flac,
    Opus,
    Ac3,
    GsmMs,
    AmrNb,
    Ilbc,
}

/// Numeric type of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// Unsigned 8-bit, centered on 128.
    U8,
    /// Signed 16-bit.
    S16,
    /// Signed 24-bit in three bytes.
    S24,
    /// Signed 32-bit.
    S32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl SampleType {
    /// Size of one sample in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// Sample type plus memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    /// Numeric type.
    pub sample_type: SampleType,
    /// One buffer per channel instead of interleaved frames.
    pub planar: bool,
    /// Multi-byte samples are big-endian.
    pub big_endian: bool,
}

impl SampleFormat {
    /// Interleaved little-endian samples of the given type.
    pub fn packed(sample_type: SampleType) -> Self {
        Self {
            sample_type,
            planar: false,
            big_endian: false,
        }
    }

    /// The same format with interleaved samples.
    #[must_use]
    pub fn to_packed(self) -> Self {
        Self {
            planar: false,
            ..self
        }
    }

    /// Size of one sample in bytes.
    pub fn bytes_per_sample(self) -> usize {
        self.sample_type.bytes()
    }
}

/// Bitmask of speaker positions present in a stream.
///
/// Channels are stored in ascending bit order, so the mask also fixes the
/// order of interleaved samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLayout(u64);

impl ChannelLayout {
    /// Front left speaker.
    pub const FRONT_LEFT: u64 = 0x1;
    /// Front right speaker.
    pub const FRONT_RIGHT: u64 = 0x2;
    /// Front center speaker.
    pub const FRONT_CENTER: u64 = 0x4;
    /// Low-frequency effects.
    pub const LOW_FREQUENCY: u64 = 0x8;
    /// Back left speaker.
    pub const BACK_LEFT: u64 = 0x10;
    /// Back right speaker.
    pub const BACK_RIGHT: u64 = 0x20;
    /// Front left of center.
    pub const FRONT_LEFT_OF_CENTER: u64 = 0x40;
    /// Front right of center.
    pub const FRONT_RIGHT_OF_CENTER: u64 = 0x80;
    /// Back center speaker.
    pub const BACK_CENTER: u64 = 0x100;
    /// Side left speaker.
    pub const SIDE_LEFT: u64 = 0x200;
    /// Side right speaker.
    pub const SIDE_RIGHT: u64 = 0x400;

    /// Mono.
    pub const MONO: Self = Self(Self::FRONT_CENTER);
    /// Stereo.
    pub const STEREO: Self = Self(Self::FRONT_LEFT | Self::FRONT_RIGHT);
    /// 3.0 surround.
    pub const SURROUND: Self = Self(Self::STEREO.0 | Self::FRONT_CENTER);
    /// Quadraphonic.
    pub const QUAD: Self = Self(Self::STEREO.0 | Self::BACK_LEFT | Self::BACK_RIGHT);
    /// 5.0 with back speakers.
    pub const FIVE_POINT_ZERO: Self = Self(Self::QUAD.0 | Self::FRONT_CENTER);
    /// 5.1 with back speakers.
    pub const FIVE_POINT_ONE: Self = Self(Self::FIVE_POINT_ZERO.0 | Self::LOW_FREQUENCY);
    /// 6.1.
    pub const SIX_POINT_ONE: Self = Self(
        Self::SURROUND.0
            | Self::LOW_FREQUENCY
            | Self::BACK_CENTER
            | Self::SIDE_LEFT
            | Self::SIDE_RIGHT,
    );
    /// 7.1.
    pub const SEVEN_POINT_ONE: Self =
        Self(Self::FIVE_POINT_ONE.0 | Self::SIDE_LEFT | Self::SIDE_RIGHT);

    /// Wraps a raw speaker mask.
    pub const fn from_mask(mask: u64) -> Self {
        Self(mask)
    }

    /// Returns the raw speaker mask.
    pub const fn mask(self) -> u64 {
        self.0
    }

    /// Number of channels in the layout.
    pub fn channel_count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns `true` if the layout includes the given speaker bit.
    pub fn contains(self, speaker: u64) -> bool {
        self.0 & speaker != 0
    }

    /// Speaker bits in channel order.
    pub fn speakers(self) -> impl Iterator<Item = u64> {
        let mask = self.0;
        (0..64).map(|bit| 1u64 << bit).filter(move |s| mask & s != 0)
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Maps a descriptor to the engine codec that handles it.
pub fn engine_codec(format: &AudioFormat) -> Result<EngineCodec, ConverterError> {
    let codec = match format.format_id {
        FormatId::LinearPcm => pcm_codec(format)?,
        FormatId::ULaw => EngineCodec::PcmMulaw,
        FormatId::ALaw => EngineCodec::PcmAlaw,
        FormatId::Mp3 => EngineCodec::Mp3,
        FormatId::Aac => EngineCodec::Aac,
        FormatId::Alac => EngineCodec::Alac,
        FormatId::Flac => EngineCodec::Flac,
        FormatId::Opus => EngineCodec::Opus,
        FormatId::Ac3 => EngineCodec::Ac3,
        FormatId::Gsm => EngineCodec::GsmMs,
        FormatId::AmrNb => EngineCodec::AmrNb,
        FormatId::Ilbc => EngineCodec::Ilbc,
    };
    Ok(codec)
}

fn pcm_codec(format: &AudioFormat) -> Result<EngineCodec, ConverterError> {
    let big_endian = format.flags.is_big_endian;
    let codec = match (format.flags.is_float, format.bits_per_channel, big_endian) {
        (false, 8, _) if !format.flags.is_signed_integer => EngineCodec::PcmU8,
        (false, 16, false) => EngineCodec::PcmS16Le,
        (false, 16, true) => EngineCodec::PcmS16Be,
        (false, 24, false) => EngineCodec::PcmS24Le,
        (false, 24, true) => EngineCodec::PcmS24Be,
        (false, 32, false) => EngineCodec::PcmS32Le,
        (false, 32, true) => EngineCodec::PcmS32Be,
        (true, 32, false) => EngineCodec::PcmF32Le,
        (true, 32, true) => EngineCodec::PcmF32Be,
        (true, 64, false) => EngineCodec::PcmF64Le,
        (true, 64, true) => EngineCodec::PcmF64Be,
        _ => return Err(ConverterError::unsupported_format(format.to_string())),
    };
    Ok(codec)
}

/// Maps a descriptor to the sample format engines exchange for it.
///
/// Compressed formats map to packed native S16, the format the built-in
/// engines decode to and encode from.
pub fn sample_format(format: &AudioFormat) -> Result<SampleFormat, ConverterError> {
    if !format.is_pcm() {
        return Ok(SampleFormat::packed(SampleType::S16));
    }

    let sample_type = match pcm_codec(format)? {
        EngineCodec::PcmU8 => SampleType::U8,
        EngineCodec::PcmS16Le | EngineCodec::PcmS16Be => SampleType::S16,
        EngineCodec::PcmS24Le | EngineCodec::PcmS24Be => SampleType::S24,
        EngineCodec::PcmS32Le | EngineCodec::PcmS32Be => SampleType::S32,
        EngineCodec::PcmF32Le | EngineCodec::PcmF32Be => SampleType::F32,
        _ => SampleType::F64,
    };
    Ok(SampleFormat {
        sample_type,
        planar: format.flags.is_non_interleaved,
        big_endian: format.flags.is_big_endian,
    })
}

/// Maps a channel count to its standard speaker layout.
///
/// Counts without a standard layout get the lowest `channels` bits.
pub fn channel_layout(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        3 => ChannelLayout::SURROUND,
        4 => ChannelLayout::QUAD,
        5 => ChannelLayout::FIVE_POINT_ZERO,
        6 => ChannelLayout::FIVE_POINT_ONE,
        7 => ChannelLayout::SIX_POINT_ONE,
        8 => ChannelLayout::SEVEN_POINT_ONE,
        n if n >= 64 => ChannelLayout::from_mask(u64::MAX),
        n => ChannelLayout::from_mask((1u64 << n) - 1),
    }
}

/// Describes the PCM an engine produces or consumes for a descriptor.
pub fn pcm_spec(format: &AudioFormat) -> Result<PcmSpec, ConverterError> {
    Ok(PcmSpec {
        sample_rate: format.sample_rate,
        channels: format.channels_per_frame,
        layout: channel_layout(format.channels_per_frame),
        sample_format: sample_format(format)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_codec_pcm() {
        let format = AudioFormat::pcm_i16(48000, 2);
        assert_eq!(engine_codec(&format).unwrap(), EngineCodec::PcmS16Le);

        let format = AudioFormat::pcm_f32(48000, 2).big_endian();
        assert_eq!(engine_codec(&format).unwrap(), EngineCodec::PcmF32Be);

        let format = AudioFormat::pcm(8000, 1, 8, false, true);
        assert_eq!(engine_codec(&format).unwrap(), EngineCodec::PcmU8);
    }

    #[test]
    fn test_engine_codec_compressed() {
        assert_eq!(
            engine_codec(&AudioFormat::ulaw(8000, 1, 160)).unwrap(),
            EngineCodec::PcmMulaw
        );
        assert_eq!(
            engine_codec(&AudioFormat::compressed(FormatId::Aac, 44100, 2, 1024)).unwrap(),
            EngineCodec::Aac
        );
    }

    #[test]
    fn test_signed_8_bit_unsupported() {
        let mut format = AudioFormat::pcm(8000, 1, 8, false, true);
        format.flags.is_signed_integer = true;
        assert!(matches!(
            engine_codec(&format),
            Err(ConverterError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_sample_format_planar() {
        let format = AudioFormat::pcm(48000, 2, 24, false, false);
        let sf = sample_format(&format).unwrap();
        assert_eq!(sf.sample_type, SampleType::S24);
        assert!(sf.planar);
        assert_eq!(sf.bytes_per_sample(), 3);
    }

    #[test]
    fn test_sample_format_compressed_is_s16() {
        let sf = sample_format(&AudioFormat::alaw(8000, 1, 1)).unwrap();
        assert_eq!(sf, SampleFormat::packed(SampleType::S16));
    }

    #[test]
    fn test_channel_layout_table() {
        assert_eq!(channel_layout(1), ChannelLayout::MONO);
        assert_eq!(channel_layout(2), ChannelLayout::STEREO);
        assert_eq!(channel_layout(6), ChannelLayout::FIVE_POINT_ONE);
        for channels in 1..=8 {
            assert_eq!(channel_layout(channels).channel_count(), usize::from(channels));
        }
    }

    #[test]
    fn test_channel_layout_synthesized() {
        let layout = channel_layout(10);
        assert_eq!(layout.mask(), 0x3FF);
        assert_eq!(layout.channel_count(), 10);
    }

    #[test]
    fn test_speakers_in_order() {
        let speakers: Vec<u64> = ChannelLayout::SURROUND.speakers().collect();
        assert_eq!(
            speakers,
            vec![
                ChannelLayout::FRONT_LEFT,
                ChannelLayout::FRONT_RIGHT,
                ChannelLayout::FRONT_CENTER
            ]
        );
    }
}
