//! Codec and resampler engines.
//!
//! The converter never touches compressed bitstreams or rate-conversion math
//! itself. It drives three kinds of engine through the traits below and opens
//! them through an [`EngineFactory`]:
//!
//! - [`Decoder`]: packet bytes → PCM frames
//! - [`Resampler`]: PCM frames in one spec → packed PCM in another
//! - [`Encoder`]: packed PCM → packets, with internal look-ahead
//!
//! [`BuiltinEngines`] provides G.711 µ-law/A-law and a linear-interpolation
//! resampler. Supply your own factory through
//! [`ConverterBuilder::engines`](crate::ConverterBuilder::engines) to plug in
//! other codecs.

mod g711;

use bytes::Bytes;

use crate::format::{AudioFormat, ChannelLayout, EngineCodec, LinearResampler, SampleFormat};
use crate::EngineError;

pub use g711::{
    alaw_compress, alaw_expand, ulaw_compress, ulaw_expand, G711Decoder, G711Encoder, G711Law,
};

/// Describes PCM exchanged with an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmSpec {
    /// Frames per second.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Speaker positions, one bit per channel.
    pub layout: ChannelLayout,
    /// Sample type and memory layout.
    pub sample_format: SampleFormat,
}

impl PcmSpec {
    /// Bytes in one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes_per_sample()
    }

    /// Bytes in one interleaved frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// The same spec with interleaved samples.
    #[must_use]
    pub fn to_packed(self) -> Self {
        Self {
            sample_format: self.sample_format.to_packed(),
            ..self
        }
    }
}

/// A block of decoded PCM.
///
/// Packed frames carry one plane; planar frames carry one plane per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmFrame {
    /// Format of the samples, as produced by the decoder.
    pub spec: PcmSpec,
    /// Number of frames (samples per channel).
    pub frames: usize,
    /// Sample data.
    pub planes: Vec<Bytes>,
}

impl PcmFrame {
    /// Creates a packed frame from interleaved bytes.
    pub fn packed(spec: PcmSpec, data: Bytes) -> Self {
        let frames = data.len() / spec.bytes_per_frame().max(1);
        Self {
            spec,
            frames,
            planes: vec![data],
        }
    }

    /// Returns `true` if the frame holds no samples.
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }
}

/// A packet produced by an [`Encoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Packet bytes.
    pub data: Bytes,
    /// Frames of audio the packet represents.
    pub frames: u32,
}

/// Turns packets into PCM.
pub trait Decoder: Send {
    /// Decodes one packet into zero or more frames.
    ///
    /// Zero frames is normal while a decoder primes.
    fn decode(&mut self, packet: &[u8]) -> Result<Vec<PcmFrame>, EngineError>;

    /// Returns frames held back until end of input.
    fn drain(&mut self) -> Result<Vec<PcmFrame>, EngineError> {
        Ok(Vec::new())
    }

    /// Discards all internal state.
    fn reset(&mut self);
}

/// Converts PCM between specs, buffering output internally.
pub trait Resampler: Send {
    /// Converts a frame and queues the result.
    fn push(&mut self, frame: &PcmFrame) -> Result<(), EngineError>;

    /// Frames ready to be read.
    fn available(&self) -> usize;

    /// Moves up to `out.len() / bytes_per_frame` ready frames into `out`,
    /// returning the number of frames written.
    fn read(&mut self, out: &mut [u8]) -> usize;

    /// Releases samples held back for look-ahead, as at end of input.
    fn flush(&mut self) -> Result<(), EngineError>;

    /// Discards queued output and look-ahead.
    fn reset(&mut self);

    /// The packed spec written by [`read`](Resampler::read).
    fn output_spec(&self) -> PcmSpec;
}

/// Turns packed PCM into packets.
///
/// Frames are pushed with [`send_frames`](Encoder::send_frames) and packets
/// pulled with [`receive_packet`](Encoder::receive_packet). The two do not
/// correspond one to one: an encoder may need several pushes before it emits
/// a packet.
pub trait Encoder: Send {
    /// The packed PCM spec the encoder accepts.
    fn input_spec(&self) -> PcmSpec;

    /// Frames per packet, or `None` if any count is accepted.
    fn frame_size(&self) -> Option<usize>;

    /// Queues `frames` frames of packed PCM.
    fn send_frames(&mut self, pcm: &[u8], frames: usize) -> Result<(), EngineError>;

    /// Returns the next finished packet, if any.
    fn receive_packet(&mut self) -> Result<Option<EncodedPacket>, EngineError>;

    /// Signals end of input; buffered frames become packets.
    fn finish(&mut self) -> Result<(), EngineError>;

    /// Discards all buffered frames and packets.
    fn reset(&mut self);

    /// Current target bit rate in bits per second.
    fn bit_rate(&self) -> u32;

    /// Changes the target bit rate.
    fn set_bit_rate(&mut self, bit_rate: u32) -> Result<(), EngineError>;

    /// Upper bound on the size of one packet in bytes.
    fn max_packet_size(&self) -> usize;
}

/// Opens engines for a converter.
pub trait EngineFactory: Send + Sync {
    /// Returns `true` if packets of `codec` can be decoded.
    fn supports_decoder(&self, codec: EngineCodec) -> bool;

    /// Returns `true` if packets of `codec` can be encoded.
    fn supports_encoder(&self, codec: EngineCodec) -> bool;

    /// Opens a decoder for the given source format.
    fn open_decoder(
        &self,
        codec: EngineCodec,
        format: &AudioFormat,
    ) -> Result<Box<dyn Decoder>, EngineError>;

    /// Opens an encoder for the given destination format.
    fn open_encoder(
        &self,
        codec: EngineCodec,
        format: &AudioFormat,
        bit_rate: u32,
    ) -> Result<Box<dyn Encoder>, EngineError>;

    /// Opens a resampler from `input` to the packed form of `output`.
    fn open_resampler(
        &self,
        input: &PcmSpec,
        output: &PcmSpec,
    ) -> Result<Box<dyn Resampler>, EngineError>;
}

/// Engines that ship with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEngines;

impl EngineFactory for BuiltinEngines {
    fn supports_decoder(&self, codec: EngineCodec) -> bool {
        matches!(codec, EngineCodec::PcmMulaw | EngineCodec::PcmAlaw)
    }

    fn supports_encoder(&self, codec: EngineCodec) -> bool {
        matches!(codec, EngineCodec::PcmMulaw | EngineCodec::PcmAlaw)
    }

    fn open_decoder(
        &self,
        codec: EngineCodec,
        format: &AudioFormat,
    ) -> Result<Box<dyn Decoder>, EngineError> {
        let law = G711Law::for_codec(codec)
            .ok_or_else(|| EngineError::unsupported(format!("no decoder for {codec:?}")))?;
        Ok(Box::new(G711Decoder::new(law, format.sample_rate, format.channels_per_frame)))
    }

    fn open_encoder(
        &self,
        codec: EngineCodec,
        format: &AudioFormat,
        _bit_rate: u32,
    ) -> Result<Box<dyn Encoder>, EngineError> {
        let law = G711Law::for_codec(codec)
            .ok_or_else(|| EngineError::unsupported(format!("no encoder for {codec:?}")))?;
        let frame_size =
            (format.frames_per_packet > 0).then_some(format.frames_per_packet as usize);
        Ok(Box::new(G711Encoder::new(
            law,
            format.sample_rate,
            format.channels_per_frame,
            frame_size,
        )))
    }

    fn open_resampler(
        &self,
        input: &PcmSpec,
        output: &PcmSpec,
    ) -> Result<Box<dyn Resampler>, EngineError> {
        Ok(Box::new(LinearResampler::new(*input, *output)?))
    }
}
