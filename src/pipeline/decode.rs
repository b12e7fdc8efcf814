//! Decode stage: input packets to PCM frames.

use bytes::Bytes;

use crate::engine::{Decoder, EngineFactory, PcmFrame, PcmSpec};
use crate::format::{engine_codec, pcm_spec};
use crate::source::InputBatch;
use crate::{AudioFormat, ConverterError, EngineError};

/// Frames decoded from one batch, plus the packets that failed.
#[derive(Default)]
pub(crate) struct Decoded {
    pub frames: Vec<PcmFrame>,
    pub errors: Vec<ConverterError>,
}

impl Decoded {
    fn push(&mut self, result: Result<Vec<PcmFrame>, EngineError>) {
        match result {
            Ok(frames) => self.frames.extend(frames),
            Err(err) => self.errors.push(ConverterError::Decode(err)),
        }
    }
}

pub(crate) enum DecodeStage {
    /// Linear PCM source: each batch becomes one frame without copying.
    Passthrough {
        spec: PcmSpec,
        /// Bytes per frame in each buffer.
        bytes_per_frame: usize,
        buffers: usize,
    },
    Engine {
        decoder: Box<dyn Decoder>,
        /// Constant packet size, 0 when packets are described individually.
        bytes_per_packet: usize,
    },
}

impl DecodeStage {
    pub fn new(source: &AudioFormat, engines: &dyn EngineFactory) -> Result<Self, ConverterError> {
        if source.is_pcm() {
            return Ok(Self::Passthrough {
                spec: pcm_spec(source)?,
                bytes_per_frame: source.bytes_per_frame as usize,
                buffers: source.buffer_count(),
            });
        }

        let codec = engine_codec(source)?;
        if !engines.supports_decoder(codec) {
            return Err(ConverterError::format(format!("no decoder for {}", source.format_id)));
        }
        let decoder = engines.open_decoder(codec, source).map_err(ConverterError::Decode)?;
        tracing::debug!(?codec, "opened decoder");

        Ok(Self::Engine {
            decoder,
            bytes_per_packet: source.bytes_per_packet as usize,
        })
    }

    /// Decodes every packet in `batch`.
    ///
    /// Failures are collected per packet; the remaining packets are still
    /// decoded.
    pub fn decode(&mut self, batch: &InputBatch) -> Decoded {
        let mut decoded = Decoded::default();
        match self {
            Self::Passthrough {
                spec,
                bytes_per_frame,
                buffers,
            } => decoded.push(passthrough_frame(*spec, *bytes_per_frame, *buffers, batch)),
            Self::Engine {
                decoder,
                bytes_per_packet,
            } => {
                for packet in split_packets(batch, *bytes_per_packet) {
                    decoded.push(packet.and_then(|packet| decoder.decode(&packet)));
                }
            }
        }
        decoded
    }

    /// Collects frames held back until end of input.
    pub fn drain(&mut self) -> Decoded {
        let mut decoded = Decoded::default();
        if let Self::Engine { decoder, .. } = self {
            decoded.push(decoder.drain());
        }
        decoded
    }

    pub fn reset(&mut self) {
        if let Self::Engine { decoder, .. } = self {
            decoder.reset();
        }
    }
}

fn passthrough_frame(
    spec: PcmSpec,
    bytes_per_frame: usize,
    buffers: usize,
    batch: &InputBatch,
) -> Result<Vec<PcmFrame>, EngineError> {
    if batch.buffers.len() != buffers {
        return Err(EngineError::invalid_input(format!(
            "expected {buffers} buffers, got {}",
            batch.buffers.len()
        )));
    }

    let frames = batch.packet_count as usize;
    let bytes = frames * bytes_per_frame;
    if let Some(short) = batch.buffers.iter().find(|buffer| buffer.len() < bytes) {
        return Err(EngineError::invalid_input(format!(
            "{} byte buffer cannot hold {frames} frames of {bytes_per_frame} bytes",
            short.len()
        )));
    }

    let planes = batch.buffers.iter().map(|buffer| buffer.slice(..bytes)).collect();
    Ok(vec![PcmFrame { spec, frames, planes }])
}

fn split_packets(batch: &InputBatch, bytes_per_packet: usize) -> Vec<Result<Bytes, EngineError>> {
    let Some(data) = batch.buffers.first() else {
        return vec![Err(EngineError::invalid_input("batch has no buffers"))];
    };

    if let Some(descriptions) = &batch.descriptions {
        return descriptions
            .iter()
            .map(|description| {
                let size = description.data_byte_size as usize;
                let range = usize::try_from(description.start_offset)
                    .ok()
                    .and_then(|start| Some(start..start.checked_add(size)?))
                    .filter(|range| range.end <= data.len());
                range.map(|range| data.slice(range)).ok_or_else(|| {
                    EngineError::invalid_input(format!(
                        "packet at {} of {} bytes outside {} byte buffer",
                        description.start_offset,
                        description.data_byte_size,
                        data.len()
                    ))
                })
            })
            .collect();
    }

    if bytes_per_packet == 0 {
        return vec![Ok(data.clone())];
    }

    let mut packets = Vec::with_capacity(data.len().div_ceil(bytes_per_packet));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + bytes_per_packet).min(data.len());
        packets.push(Ok(data.slice(offset..end)));
        offset = end;
    }
    packets
}
