//! G.711 µ-law and A-law engines.
//!
//! Companding follows the ITU-T G.711 reference algorithm. Both laws carry
//! one byte per sample at 8 bits, so the bit rate is fixed at
//! `8 * sample_rate * channels`.

use std::collections::VecDeque;

use bytes::BytesMut;

use crate::engine::{Decoder, EncodedPacket, Encoder, PcmFrame, PcmSpec};
use crate::format::{channel_layout, EngineCodec, SampleFormat, SampleType};
use crate::EngineError;

/// Which G.711 companding law to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum G711Law {
    /// µ-law (North America, Japan).
    ULaw,
    /// A-law (Europe, rest of world).
    ALaw,
}

impl G711Law {
    /// Returns the law for a G.711 engine codec.
    pub fn for_codec(codec: EngineCodec) -> Option<Self> {
        match codec {
            EngineCodec::PcmMulaw => Some(Self::ULaw),
            EngineCodec::PcmAlaw => Some(Self::ALaw),
            _ => None,
        }
    }

    fn compress(self, sample: i16) -> u8 {
        match self {
            Self::ULaw => ulaw_compress(sample),
            Self::ALaw => alaw_compress(sample),
        }
    }

    fn expand(self, code: u8) -> i16 {
        match self {
            Self::ULaw => ulaw_expand(code),
            Self::ALaw => alaw_expand(code),
        }
    }
}

/// Compresses a 16-bit linear sample to A-law.
pub fn alaw_compress(sample: i16) -> u8 {
    let mut ix = if sample < 0 {
        ((!sample) as u16 >> 4) as i16
    } else {
        sample >> 4
    };

    if ix > 15 {
        let mut exponent = 1;
        while ix > 16 + 15 {
            ix >>= 1;
            exponent += 1;
        }
        ix -= 16;
        ix += exponent << 4;
    }

    if sample >= 0 {
        ix |= 0x0080;
    }

    (ix ^ 0x0055) as u8
}

/// Expands an A-law code to a 16-bit linear sample.
pub fn alaw_expand(code: u8) -> i16 {
    let ix = i16::from(code ^ 0x55) & 0x7F;
    let exponent = ix >> 4;
    let mut mantissa = ix & 0x0F;

    if exponent > 0 {
        mantissa += 16;
    }
    mantissa = (mantissa << 4) + 0x08;
    if exponent > 1 {
        mantissa <<= exponent - 1;
    }

    if code > 127 {
        mantissa
    } else {
        -mantissa
    }
}

/// Compresses a 16-bit linear sample to µ-law.
pub fn ulaw_compress(sample: i16) -> u8 {
    let magnitude = if sample < 0 {
        ((!sample) as u16 >> 2) as i16 + 33
    } else {
        (sample >> 2) + 33
    };
    let magnitude = magnitude.min(0x1FFF);

    let mut i = magnitude >> 6;
    let mut segment = 1;
    while i != 0 {
        segment += 1;
        i >>= 1;
    }

    let high = 0x08 - segment;
    let low = 0x0F - ((magnitude >> segment) & 0x0F);
    let mut code = (high << 4) | low;
    if sample >= 0 {
        code |= 0x80;
    }
    code as u8
}

/// Expands a µ-law code to a 16-bit linear sample.
pub fn ulaw_expand(code: u8) -> i16 {
    let sign = if code < 0x80 { -1 } else { 1 };
    let inverted = i16::from(!code);
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = inverted & 0x0F;
    let step = 4 << (exponent + 1);

    sign * ((0x80 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

fn s16_spec(sample_rate: u32, channels: u16) -> PcmSpec {
    PcmSpec {
        sample_rate,
        channels,
        layout: channel_layout(channels),
        sample_format: SampleFormat::packed(SampleType::S16),
    }
}

/// G.711 packet decoder producing packed little-endian S16.
pub struct G711Decoder {
    law: G711Law,
    spec: PcmSpec,
}

impl G711Decoder {
    /// Creates a decoder for the given law and stream shape.
    pub fn new(law: G711Law, sample_rate: u32, channels: u16) -> Self {
        Self {
            law,
            spec: s16_spec(sample_rate, channels),
        }
    }
}

impl Decoder for G711Decoder {
    fn decode(&mut self, packet: &[u8]) -> Result<Vec<PcmFrame>, EngineError> {
        let channels = usize::from(self.spec.channels);
        if packet.len() % channels != 0 {
            return Err(EngineError::invalid_input(format!(
                "{} byte packet is not a whole number of {channels}-channel frames",
                packet.len()
            )));
        }
        if packet.is_empty() {
            return Ok(Vec::new());
        }

        let mut pcm = BytesMut::with_capacity(packet.len() * 2);
        for &code in packet {
            pcm.extend_from_slice(&self.law.expand(code).to_le_bytes());
        }
        Ok(vec![PcmFrame::packed(self.spec, pcm.freeze())])
    }

    fn reset(&mut self) {}
}

/// G.711 encoder consuming packed little-endian S16.
///
/// With a fixed frame size, frames accumulate until a full packet is
/// available; [`finish`](Encoder::finish) turns the remainder into a short
/// final packet. Without one, every push becomes a packet.
pub struct G711Encoder {
    law: G711Law,
    spec: PcmSpec,
    frame_size: Option<usize>,
    pending: BytesMut,
    packets: VecDeque<EncodedPacket>,
}

impl G711Encoder {
    /// Creates an encoder for the given law and stream shape.
    pub fn new(law: G711Law, sample_rate: u32, channels: u16, frame_size: Option<usize>) -> Self {
        Self {
            law,
            spec: s16_spec(sample_rate, channels),
            frame_size,
            pending: BytesMut::new(),
            packets: VecDeque::new(),
        }
    }

    fn emit(&mut self, bytes: usize) {
        let pcm = self.pending.split_to(bytes);
        let mut data = BytesMut::with_capacity(bytes / 2);
        for sample in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([sample[0], sample[1]]);
            data.extend_from_slice(&[self.law.compress(sample)]);
        }
        let frames = (data.len() / usize::from(self.spec.channels)) as u32;
        self.packets.push_back(EncodedPacket {
            data: data.freeze(),
            frames,
        });
    }
}

impl Encoder for G711Encoder {
    fn input_spec(&self) -> PcmSpec {
        self.spec
    }

    fn frame_size(&self) -> Option<usize> {
        self.frame_size
    }

    fn send_frames(&mut self, pcm: &[u8], frames: usize) -> Result<(), EngineError> {
        let bytes = frames * self.spec.bytes_per_frame();
        if pcm.len() < bytes {
            return Err(EngineError::invalid_input(format!(
                "{frames} frames need {bytes} bytes, got {}",
                pcm.len()
            )));
        }
        self.pending.extend_from_slice(&pcm[..bytes]);

        match self.frame_size {
            Some(size) => {
                let packet_bytes = size * self.spec.bytes_per_frame();
                while self.pending.len() >= packet_bytes {
                    self.emit(packet_bytes);
                }
            }
            None if !self.pending.is_empty() => self.emit(self.pending.len()),
            None => {}
        }
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Option<EncodedPacket>, EngineError> {
        Ok(self.packets.pop_front())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        if !self.pending.is_empty() {
            self.emit(self.pending.len());
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.packets.clear();
    }

    fn bit_rate(&self) -> u32 {
        8 * self.spec.sample_rate * u32::from(self.spec.channels)
    }

    fn set_bit_rate(&mut self, _bit_rate: u32) -> Result<(), EngineError> {
        // fixed-rate codec
        Ok(())
    }

    fn max_packet_size(&self) -> usize {
        self.frame_size.unwrap_or(1024) * usize::from(self.spec.channels)
    }
}
