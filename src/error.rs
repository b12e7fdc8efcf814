//! Error types for audio-converter.
//!
//! Errors are split into two layers:
//! - **Converter errors** ([`ConverterError`]): returned to the caller from
//!   construction, [`fill`](crate::Converter::fill) and the property interface
//! - **Engine errors** ([`EngineError`]): reported by decoder, encoder and
//!   resampler engines and wrapped by the stage that called them

use crate::property::PropertyId;

/// Errors returned by a [`Converter`](crate::Converter).
///
/// Decode failures are recoverable: the driver skips the packet and counts
/// it (see [`PropertyId::DECODE_ERROR_COUNT`]) instead of returning the
/// error. Resample, encode and input failures abort the current `fill` call.
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    /// A format descriptor is self-inconsistent, or no codec/resampler path
    /// connects the source and destination formats.
    #[error("invalid format: {reason}")]
    Format {
        /// What was wrong with the format pair.
        reason: String,
    },

    /// The format has no mapping to an engine codec or sample format.
    #[error("unsupported format: {format}")]
    UnsupportedFormat {
        /// Description of the unmapped format.
        format: String,
    },

    /// A packet could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[source] EngineError),

    /// The resampler rejected a frame or failed to initialize.
    #[error("resample failed: {0}")]
    Resample(#[source] EngineError),

    /// The encoder rejected frames or failed to initialize.
    #[error("encode failed: {0}")]
    Encode(#[source] EngineError),

    /// The input source reported a failure.
    #[error("input source failed: {reason}")]
    Input {
        /// Why the source failed.
        reason: String,
    },

    /// The caller's output buffer list does not match the destination format.
    #[error("invalid output buffer: {reason}")]
    InvalidOutputBuffer {
        /// What was wrong with the buffer list.
        reason: String,
    },

    /// The property id is not recognized by this converter.
    #[error("unsupported property: {id}")]
    UnsupportedProperty {
        /// The unrecognized property.
        id: PropertyId,
    },

    /// The property can be read but not written.
    #[error("property {id} is read-only")]
    ReadOnlyProperty {
        /// The read-only property.
        id: PropertyId,
    },

    /// The value passed to `set_property` has the wrong type or range.
    #[error("invalid value for property {id}: {reason}")]
    InvalidPropertyValue {
        /// The property being set.
        id: PropertyId,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConverterError {
    /// Creates a format error with the given reason.
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates an input error, for use by [`InputSource`](crate::InputSource)
    /// implementations.
    pub fn input(reason: impl Into<String>) -> Self {
        Self::Input {
            reason: reason.into(),
        }
    }

    /// Creates an invalid output buffer error.
    pub fn invalid_output(reason: impl Into<String>) -> Self {
        Self::InvalidOutputBuffer {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the converter remains usable after this error.
    ///
    /// Construction errors never produce an instance. Resample, encode and
    /// input errors leave partially processed audio behind; call
    /// [`flush`](crate::Converter::flush) before feeding again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Decode(_)
            | Self::InvalidOutputBuffer { .. }
            | Self::UnsupportedProperty { .. }
            | Self::ReadOnlyProperty { .. }
            | Self::InvalidPropertyValue { .. }
            | Self::UnsupportedFormat { .. } => true,
            Self::Format { .. } | Self::Resample(_) | Self::Encode(_) | Self::Input { .. } => {
                false
            }
        }
    }
}

/// Errors reported by decoder, encoder and resampler engines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine was handed data it cannot process.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of the malformed input.
        reason: String,
    },

    /// The engine does not support the requested configuration.
    #[error("unsupported: {what}")]
    Unsupported {
        /// The unsupported feature or parameter.
        what: String,
    },

    /// Internal engine failure (allocation, state corruption).
    #[error("engine failure: {reason}")]
    Failed {
        /// Description of the failure.
        reason: String,
    },
}

impl EngineError {
    /// Creates an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates an unsupported configuration error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }

    /// Creates an internal failure error.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}
