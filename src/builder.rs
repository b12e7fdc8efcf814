//! Builder pattern for `Converter`.

use std::sync::Arc;

use crate::engine::{BuiltinEngines, EngineFactory};
use crate::{AudioFormat, Converter, ConverterConfig, ConverterError};

/// Builder for configuring and creating a [`Converter`].
///
/// Use [`Converter::builder()`] to create a new builder.
///
/// # Example
///
/// ```
/// use audio_converter::{AudioFormat, Converter};
///
/// let source = AudioFormat::pcm_i16(48000, 2);
/// let converter = Converter::builder(source, AudioFormat::ulaw(8000, 1, 160))
///     .bit_rate(64_000)
///     .reservoir_frames(8192)
///     .build()
///     .unwrap();
/// assert_eq!(converter.frame_size(), 4);
/// ```
#[must_use]
pub struct ConverterBuilder {
    source: AudioFormat,
    destination: AudioFormat,
    config: ConverterConfig,
    /// Engine provider; the built-in engines when unset.
    engines: Option<Arc<dyn EngineFactory>>,
}

impl ConverterBuilder {
    /// Creates a builder with default settings.
    pub fn new(source: AudioFormat, destination: AudioFormat) -> Self {
        Self {
            source,
            destination,
            config: ConverterConfig::default(),
            engines: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ConverterConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the target bit rate for compressed destinations.
    ///
    /// Default: 128 kbit/s
    pub fn bit_rate(mut self, bit_rate: u32) -> Self {
        self.config.bit_rate = bit_rate;
        self
    }

    /// Sets the reservoir capacity in frames.
    ///
    /// Default: 4096
    pub fn reservoir_frames(mut self, frames: usize) -> Self {
        self.config.reservoir_frames = frames;
        self
    }

    /// Uses `engines` to open decoders, encoders and resamplers instead of
    /// the built-in ones.
    pub fn engines(mut self, engines: Arc<dyn EngineFactory>) -> Self {
        self.engines = Some(engines);
        self
    }

    /// Validates both formats and the codec path, then creates the converter.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either format is self-inconsistent
    /// - A format has no engine mapping
    /// - No decoder or encoder is available for the format pair
    pub fn build(self) -> Result<Converter, ConverterError> {
        let engines = self.engines.unwrap_or_else(|| Arc::new(BuiltinEngines));
        Converter::open(self.source, self.destination, self.config, engines)
    }
}
