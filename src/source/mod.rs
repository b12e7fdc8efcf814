//! Producer side of the conversion: where input packets come from.
//!
//! The converter pulls input on demand through [`InputSource`]. Each request
//! names how many packets the converter would like; the source may hand back
//! more or fewer, or signal [`Input::EndOfStream`].

mod mock;

pub use mock::{MockSource, PacketSource};

use bytes::Bytes;

use crate::{ConverterError, PacketDescription};

/// A batch of input packets handed to the converter.
///
/// Interleaved and compressed input uses a single buffer. Non-interleaved
/// PCM uses one buffer per channel. Variable-size compressed packets carry
/// one [`PacketDescription`] per packet, locating it inside the first buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBatch {
    /// Packet data.
    pub buffers: Vec<Bytes>,
    /// Packet boundaries for variable-size packets.
    pub descriptions: Option<Vec<PacketDescription>>,
    /// Number of packets in the batch (frames, for PCM).
    pub packet_count: u32,
}

impl InputBatch {
    /// A batch of interleaved PCM frames or constant-size packets.
    pub fn interleaved(data: impl Into<Bytes>, packet_count: u32) -> Self {
        Self {
            buffers: vec![data.into()],
            descriptions: None,
            packet_count,
        }
    }

    /// A batch of non-interleaved PCM, one buffer per channel.
    pub fn planar(planes: Vec<Bytes>, frames: u32) -> Self {
        Self {
            buffers: planes,
            descriptions: None,
            packet_count: frames,
        }
    }

    /// A batch of variable-size packets located by `descriptions`.
    pub fn with_descriptions(data: impl Into<Bytes>, descriptions: Vec<PacketDescription>) -> Self {
        Self {
            buffers: vec![data.into()],
            packet_count: descriptions.len() as u32,
            descriptions: Some(descriptions),
        }
    }

    /// Returns `true` if the batch holds no packets.
    ///
    /// The converter treats an empty batch as end of input.
    pub fn is_empty(&self) -> bool {
        self.packet_count == 0
    }
}

/// Creates an [`InputSource`] from a closure.
///
/// Fixes the closure's signature so its argument and error types need no
/// annotations.
///
/// # Example
///
/// ```
/// use audio_converter::{input_fn, Input};
///
/// let source = input_fn(|_requested| Ok(Input::EndOfStream));
/// ```
pub fn input_fn<F>(f: F) -> F
where
    F: FnMut(u32) -> Result<Input, ConverterError>,
{
    f
}

/// The answer to one input request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// More input.
    Packets(InputBatch),
    /// No more input will ever be supplied for this stream.
    EndOfStream,
}

/// Supplies input packets to a converter.
///
/// Called synchronously from [`Converter::fill`](crate::Converter::fill),
/// and may block. Closures of the form
/// `FnMut(u32) -> Result<Input, ConverterError>` implement this trait, so
/// captured variables stand in for a callback context.
///
/// # Example
///
/// ```
/// use audio_converter::{input_fn, Input, InputBatch, InputSource};
///
/// let mut sent = false;
/// let mut source = input_fn(move |_requested| {
///     if std::mem::replace(&mut sent, true) {
///         Ok(Input::EndOfStream)
///     } else {
///         Ok(Input::Packets(InputBatch::interleaved(vec![0u8; 8], 2)))
///     }
/// });
/// assert!(matches!(source.next_input(1), Ok(Input::Packets(_))));
/// assert_eq!(source.next_input(1).unwrap(), Input::EndOfStream);
/// ```
pub trait InputSource {
    /// Returns the next batch of input, ideally `requested_packets` long.
    ///
    /// An error aborts the current `fill` call and is returned to its caller.
    fn next_input(&mut self, requested_packets: u32) -> Result<Input, ConverterError>;
}

impl<F> InputSource for F
where
    F: FnMut(u32) -> Result<Input, ConverterError>,
{
    fn next_input(&mut self, requested_packets: u32) -> Result<Input, ConverterError> {
        self(requested_packets)
    }
}
