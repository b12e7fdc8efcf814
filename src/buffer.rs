//! Caller-owned output storage.

use crate::AudioFormat;

/// One output buffer: a fixed-capacity byte region plus the number of bytes
/// the last [`fill`](crate::Converter::fill) wrote into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    channels: u16,
    data: Vec<u8>,
    byte_size: usize,
}

impl AudioBuffer {
    /// Creates a zeroed buffer holding up to `capacity` bytes of audio with
    /// `channels` interleaved channels.
    pub fn with_capacity(channels: u16, capacity: usize) -> Self {
        Self {
            channels,
            data: vec![0; capacity],
            byte_size: 0,
        }
    }

    /// Interleaved channels in this buffer.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Maximum number of bytes a fill may write.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written by the last fill.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// The bytes written by the last fill.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.byte_size]
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn set_byte_size(&mut self, byte_size: usize) {
        self.byte_size = byte_size.min(self.data.len());
    }
}

/// The set of buffers one fill writes into.
///
/// Interleaved and compressed destinations use one buffer; non-interleaved
/// PCM uses one buffer per channel.
///
/// # Example
///
/// ```
/// use audio_converter::{AudioBufferList, AudioFormat};
///
/// let planar = AudioFormat::pcm(48000, 2, 32, true, false);
/// let list = AudioBufferList::for_format(&planar, 4096);
/// assert_eq!(list.len(), 2);
/// assert_eq!(list.buffers()[0].channels(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioBufferList {
    buffers: Vec<AudioBuffer>,
}

impl AudioBufferList {
    /// Wraps an explicit set of buffers.
    pub fn new(buffers: Vec<AudioBuffer>) -> Self {
        Self { buffers }
    }

    /// Creates the buffer layout `format` requires, each buffer holding
    /// `capacity` bytes.
    pub fn for_format(format: &AudioFormat, capacity: usize) -> Self {
        let buffers = if format.is_interleaved() {
            vec![AudioBuffer::with_capacity(format.channels_per_frame, capacity)]
        } else {
            (0..format.channels_per_frame)
                .map(|_| AudioBuffer::with_capacity(1, capacity))
                .collect()
        };
        Self { buffers }
    }

    /// Number of buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if the list has no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// The buffers, in channel order.
    pub fn buffers(&self) -> &[AudioBuffer] {
        &self.buffers
    }

    /// Total bytes written by the last fill, across all buffers.
    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(AudioBuffer::byte_size).sum()
    }

    pub(crate) fn buffers_mut(&mut self) -> &mut [AudioBuffer] {
        &mut self.buffers
    }

    pub(crate) fn clear_sizes(&mut self) {
        for buffer in &mut self.buffers {
            buffer.byte_size = 0;
        }
    }
}
