//! Audio format descriptors and PCM conversion.
//!
//! This module provides:
//! - Stream descriptors ([`AudioFormat`], [`PacketDescription`])
//! - Mapping from descriptors to engine identifiers ([`engine_codec`],
//!   [`sample_format`], [`channel_layout`])
//! - Sample format and channel conversion ([`RemixMatrix`])
//! - Sample rate conversion ([`LinearResampler`])

mod convert;
mod descriptor;
mod mapper;
mod resample;

pub use convert::{
    deinterleave, f32_to_i16, f32_to_packed, i16_to_f32, interleave, planes_to_f32, read_sample,
    write_sample, RemixMatrix,
};
pub use descriptor::{AudioFormat, FormatFlags, FormatId, PacketDescription};
pub use mapper::{
    channel_layout, engine_codec, pcm_spec, sample_format, ChannelLayout, EngineCodec, SampleFormat,
    SampleType,
};
pub use resample::LinearResampler;
