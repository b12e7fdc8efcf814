//! The decode → resample → encode stages and the reservoir between them.

mod decode;
mod encode;
mod resample;
mod reservoir;

pub(crate) use decode::{DecodeStage, Decoded};
pub(crate) use encode::EncodeStage;
pub(crate) use resample::ResampleStage;
pub(crate) use reservoir::Reservoir;
