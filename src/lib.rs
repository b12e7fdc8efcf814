//! # audio-converter
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Pull-driven audio format conversion.
//!
//! `audio-converter` turns audio in one format into another: it decodes
//! compressed input, resamples and remixes the PCM to the destination rate
//! and channel layout, and re-encodes it when the destination is compressed.
//! The caller asks for output packets; the converter asks a producer for
//! input whenever it runs short.
//!
//! ## Quick Start
//!
//! ```rust
//! use audio_converter::{AudioBufferList, AudioFormat, Converter, MockSource};
//!
//! // 10 ms packets of 8 kHz mono µ-law
//! let source = AudioFormat::ulaw(8000, 1, 80);
//! let destination = AudioFormat::pcm_f32(16000, 1);
//!
//! let mut mock = MockSource::new(8000, 1);
//! mock.generate_sine(440.0, 50);
//! let mut input = mock.into_packets(&source)?;
//!
//! let mut converter = Converter::new(source, destination)?;
//! let mut output = AudioBufferList::for_format(&destination, 4096);
//!
//! let mut frames = 0;
//! loop {
//!     let written = converter.fill(&mut input, 1024, &mut output, None)?;
//!     frames += written;
//!     if written < 1024 {
//!         break;
//!     }
//! }
//! assert_eq!(frames, 800);
//! # Ok::<(), audio_converter::ConverterError>(())
//! ```
//!
//! ## Architecture
//!
//! Each [`fill`](Converter::fill) call runs on the caller's thread:
//!
//! - **Decode**: input packets become PCM frames (passthrough for PCM input)
//! - **Resample**: frames are converted to the destination rate, layout and
//!   sample format
//! - **Reservoir**: resampled PCM waits in a ring buffer until a whole
//!   output packet can be produced
//! - **Encode**: reservoir PCM becomes output packets (a plain copy for PCM
//!   output)
//!
//! Engines sit behind the traits in [`engine`]; supply your own through
//! [`ConverterBuilder::engines`].

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod buffer;
mod builder;
mod config;
mod converter;
pub mod engine;
mod error;
pub mod format;
mod pipeline;
mod property;
pub mod source;

pub use buffer::{AudioBuffer, AudioBufferList};
pub use builder::ConverterBuilder;
pub use config::ConverterConfig;
pub use converter::{Converter, ConverterStats};
pub use error::{ConverterError, EngineError};
pub use format::{AudioFormat, PacketDescription};
pub use property::{PropertyId, PropertyValue};
pub use source::{input_fn, Input, InputBatch, InputSource, MockSource, PacketSource};
