//! Resample stage: decoded PCM to destination-shaped PCM.


use crate::engine::{EngineFactory, PcmFrame, PcmSpec, Resampler};
use crate::{ConverterError, EngineError};

/// Lazily opened resampler.
///
/// The input side is only known once the first decoded frame arrives, so
/// the engine is opened then and never re-opened.
pub(crate) enum ResampleStage {
    Uninitialized,
    Ready(Box<dyn Resampler>),
}

impl ResampleStage {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Opens the engine from `input` to `output`.
    ///
    /// Fails if the stage is already initialized.
    pub fn initialize(
        &mut self,
        input: &PcmSpec,
        output: &PcmSpec,
        engines: &dyn EngineFactory,
    ) -> Result<(), ConverterError> {
        if self.is_ready() {
            return Err(ConverterError::Resample(EngineError::failed(
                "resampler already initialized",
            )));
        }
        let resampler = engines
            .open_resampler(input, output)
            .map_err(ConverterError::Resample)?;
        tracing::debug!(
            in_rate = input.sample_rate,
            in_channels = input.channels,
            out_rate = output.sample_rate,
            out_channels = output.channels,
            "opened resampler"
        );
        *self = Self::Ready(resampler);
        Ok(())
    }

    pub fn convert(&mut self, frame: &PcmFrame) -> Result<(), ConverterError> {
        match self {
            Self::Ready(resampler) => resampler.push(frame).map_err(ConverterError::Resample),
            Self::Uninitialized => Err(ConverterError::Resample(EngineError::failed(
                "resampler used before initialization",
            ))),
        }
    }

    /// Frames ready to be read.
    pub fn available(&self) -> usize {
        match self {
            Self::Ready(resampler) => resampler.available(),
            Self::Uninitialized => 0,
        }
    }

    pub fn read(&mut self, out: &mut [u8]) -> usize {
        match self {
            Self::Ready(resampler) => resampler.read(out),
            Self::Uninitialized => 0,
        }
    }

    /// Releases the interpolation tail. A no-op before initialization.
    pub fn flush(&mut self) -> Result<(), ConverterError> {
        match self {
            Self::Ready(resampler) => resampler.flush().map_err(ConverterError::Resample),
            Self::Uninitialized => Ok(()),
        }
    }

    /// Discards queued output but keeps the engine open.
    pub fn reset(&mut self) {
        if let Self::Ready(resampler) = self {
            resampler.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::engine::BuiltinEngines;
    use crate::format::{channel_layout, SampleFormat, SampleType};

    fn s16(sample_rate: u32) -> PcmSpec {
        PcmSpec {
            sample_rate,
            channels: 1,
            layout: channel_layout(1),
            sample_format: SampleFormat::packed(SampleType::S16),
        }
    }

    #[test]
    fn test_uninitialized_is_empty_and_flushable() {
        let mut stage = ResampleStage::Uninitialized;
        assert!(!stage.is_ready());
        assert_eq!(stage.available(), 0);
        assert!(stage.flush().is_ok());
        stage.reset();
    }

    #[test]
    fn test_convert_before_initialize_fails() {
        let mut stage = ResampleStage::Uninitialized;
        let frame = PcmFrame::packed(s16(8000), Bytes::from_static(&[0, 0]));
        assert!(matches!(stage.convert(&frame), Err(ConverterError::Resample(_))));
    }

    #[test]
    fn test_initialize_once() {
        let mut stage = ResampleStage::Uninitialized;
        stage.initialize(&s16(8000), &s16(16000), &BuiltinEngines).unwrap();
        assert!(stage.is_ready());
        assert!(stage.initialize(&s16(8000), &s16(16000), &BuiltinEngines).is_err());
    }

    #[test]
    fn test_convert_and_read() {
        let mut stage = ResampleStage::Uninitialized;
        stage.initialize(&s16(8000), &s16(8000), &BuiltinEngines).unwrap();
        stage
            .convert(&PcmFrame::packed(s16(8000), Bytes::from_static(&[1, 0, 2, 0])))
            .unwrap();
        assert_eq!(stage.available(), 2);

        let mut out = [0u8; 4];
        assert_eq!(stage.read(&mut out), 2);
        assert_eq!(out, [1, 0, 2, 0]);
    }
}
