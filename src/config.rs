//! Configuration types for converters.

/// Tuning knobs for a [`Converter`](crate::Converter).
///
/// Use [`ConverterConfig::default()`] for sensible defaults, or customize as
/// needed.
///
/// # Example
///
/// ```
/// use audio_converter::ConverterConfig;
///
/// let config = ConverterConfig {
///     bit_rate: 96_000,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Target bit rate for compressed destinations, in bits per second.
    ///
    /// Passed to the encoder when it opens; fixed-rate codecs ignore it.
    /// Default: 128 kbit/s
    pub bit_rate: u32,

    /// Capacity of the PCM reservoir in frames.
    ///
    /// Raised automatically to twice the encoder's packet size if smaller.
    /// Default: 4096
    pub reservoir_frames: usize,

    /// Frames per packet handed to encoders that accept any frame count.
    ///
    /// Default: 1024
    pub variable_packet_frames: usize,

    /// Packets requested from the input source per call, for compressed
    /// sources.
    ///
    /// Default: 1
    pub input_packets_per_request: u32,

    /// Frames requested from the input source per call, for PCM sources.
    ///
    /// Default: 1024
    pub pcm_input_frames: u32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            bit_rate: 128_000,
            reservoir_frames: 4096,
            variable_packet_frames: 1024,
            input_packets_per_request: 1,
            pcm_input_frames: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_config_defaults() {
        let config = ConverterConfig::default();
        assert_eq!(config.bit_rate, 128_000);
        assert_eq!(config.reservoir_frames, 4096);
        assert_eq!(config.variable_packet_frames, 1024);
        assert_eq!(config.input_packets_per_request, 1);
        assert_eq!(config.pcm_input_frames, 1024);
    }
}
