//! Encode stage: destination-shaped PCM to output packets.


use crate::buffer::AudioBufferList;
use crate::engine::{EncodedPacket, Encoder, EngineFactory, PcmSpec};
use crate::format::{deinterleave, engine_codec, pcm_spec, EngineCodec};
use crate::{AudioFormat, ConverterError};

pub(crate) enum EncodeStage {
    /// Linear PCM destination: frames are copied straight to the output.
    Passthrough { spec: PcmSpec, bytes_per_packet: usize },
    Engine(EncoderState),
}

pub(crate) enum EncoderState {
    /// Not opened yet; opened when the first frame reaches the pipeline.
    Closed { codec: EngineCodec, format: AudioFormat },
    Open(Box<dyn Encoder>),
}

impl EncodeStage {
    pub fn new(
        destination: &AudioFormat,
        engines: &dyn EngineFactory,
    ) -> Result<Self, ConverterError> {
        if destination.is_pcm() {
            return Ok(Self::Passthrough {
                spec: pcm_spec(destination)?,
                bytes_per_packet: destination.bytes_per_packet as usize,
            });
        }

        let codec = engine_codec(destination)?;
        if !engines.supports_encoder(codec) {
            return Err(ConverterError::format(format!(
                "no encoder for {}",
                destination.format_id
            )));
        }
        Ok(Self::Engine(EncoderState::Closed {
            codec,
            format: *destination,
        }))
    }

    /// Opens the encoder if needed and returns the packed PCM spec the stage
    /// consumes.
    pub fn prepare(
        &mut self,
        engines: &dyn EngineFactory,
        bit_rate: u32,
    ) -> Result<PcmSpec, ConverterError> {
        match self {
            Self::Passthrough { spec, .. } => Ok(spec.to_packed()),
            Self::Engine(state) => {
                let encoder = match state {
                    EncoderState::Open(encoder) => return Ok(encoder.input_spec()),
                    EncoderState::Closed { codec, format } => {
                        let encoder = engines
                            .open_encoder(*codec, format, bit_rate)
                            .map_err(ConverterError::Encode)?;
                        tracing::debug!(?codec, bit_rate = encoder.bit_rate(), "opened encoder");
                        encoder
                    }
                };
                let spec = encoder.input_spec();
                *state = EncoderState::Open(encoder);
                Ok(spec)
            }
        }
    }

    fn encoder(&self) -> Option<&dyn Encoder> {
        match self {
            Self::Engine(EncoderState::Open(encoder)) => Some(&**encoder),
            _ => None,
        }
    }

    fn encoder_mut(&mut self) -> Option<&mut Box<dyn Encoder>> {
        match self {
            Self::Engine(EncoderState::Open(encoder)) => Some(encoder),
            _ => None,
        }
    }

    /// Frames per packet the encoder requires, if it has a fixed size.
    pub fn frame_size(&self) -> Option<usize> {
        self.encoder().and_then(|encoder| encoder.frame_size())
    }

    pub fn send(&mut self, pcm: &[u8], frames: usize) -> Result<(), ConverterError> {
        match self.encoder_mut() {
            Some(encoder) => encoder.send_frames(pcm, frames).map_err(ConverterError::Encode),
            None => Ok(()),
        }
    }

    pub fn receive(&mut self) -> Result<Option<EncodedPacket>, ConverterError> {
        match self.encoder_mut() {
            Some(encoder) => encoder.receive_packet().map_err(ConverterError::Encode),
            None => Ok(None),
        }
    }

    pub fn finish(&mut self) -> Result<(), ConverterError> {
        match self.encoder_mut() {
            Some(encoder) => encoder.finish().map_err(ConverterError::Encode),
            None => Ok(()),
        }
    }

    /// Flushes look-ahead and throws the resulting packets away. Pass
    /// `finish = false` if the encoder has already been told input ended.
    pub fn discard(&mut self, finish: bool) -> Result<(), ConverterError> {
        let Some(encoder) = self.encoder_mut() else {
            return Ok(());
        };
        if finish {
            encoder.finish().map_err(ConverterError::Encode)?;
        }
        let mut discarded = 0usize;
        while encoder
            .receive_packet()
            .map_err(ConverterError::Encode)?
            .is_some()
        {
            discarded += 1;
        }
        encoder.reset();
        tracing::debug!(discarded, "discarded encoder tail");
        Ok(())
    }

    /// The encoder's bit rate once open.
    pub fn bit_rate(&self) -> Option<u32> {
        self.encoder().map(|encoder| encoder.bit_rate())
    }

    /// Forwards a bit rate change to an open encoder.
    pub fn set_bit_rate(&mut self, bit_rate: u32) -> Result<(), ConverterError> {
        match self.encoder_mut() {
            Some(encoder) => encoder.set_bit_rate(bit_rate).map_err(ConverterError::Encode),
            None => Ok(()),
        }
    }

    /// Upper bound on one output packet in bytes.
    ///
    /// Before a variable-bit-rate encoder opens, the bound is the packet's
    /// frames as 16-bit PCM.
    pub fn max_packet_size(&self, variable_packet_frames: usize) -> usize {
        match self {
            Self::Passthrough { bytes_per_packet, .. } => *bytes_per_packet,
            Self::Engine(EncoderState::Open(encoder)) => encoder.max_packet_size(),
            Self::Engine(EncoderState::Closed { format, .. }) => {
                if format.is_variable_bit_rate() {
                    let frames = match format.frames_per_packet {
                        0 => variable_packet_frames,
                        n => n as usize,
                    };
                    frames * usize::from(format.channels_per_frame) * 2
                } else {
                    format.bytes_per_packet as usize
                }
            }
        }
    }

    /// Copies packed PCM into the output buffers starting at frame
    /// `frame_offset`, deinterleaving for planar destinations.
    pub fn copy_pcm(
        &self,
        packed: &[u8],
        frames: usize,
        output: &mut AudioBufferList,
        frame_offset: usize,
    ) {
        let Self::Passthrough { spec, .. } = self else {
            return;
        };

        if spec.sample_format.planar {
            let width = spec.bytes_per_sample();
            let start = frame_offset * width;
            let end = start + frames * width;
            let mut planes: Vec<&mut [u8]> = output
                .buffers_mut()
                .iter_mut()
                .map(|buffer| &mut buffer.data_mut()[start..end])
                .collect();
            deinterleave(&packed[..frames * spec.bytes_per_frame()], width, &mut planes);
            for buffer in output.buffers_mut() {
                buffer.set_byte_size(end);
            }
        } else {
            let bytes_per_frame = spec.bytes_per_frame();
            let start = frame_offset * bytes_per_frame;
            let end = start + frames * bytes_per_frame;
            if let Some(buffer) = output.buffers_mut().first_mut() {
                buffer.data_mut()[start..end].copy_from_slice(&packed[..end - start]);
                buffer.set_byte_size(end);
            }
        }
    }

    pub fn reset(&mut self) {
        if let Some(encoder) = self.encoder_mut() {
            encoder.reset();
        }
    }
}
