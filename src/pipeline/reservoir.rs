//! Ring buffer of resampled PCM awaiting output.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Frame-addressed ring buffer between the resample and encode stages.
///
/// Holds packed destination-format PCM. The producer half is the write
/// cursor and the consumer half the read cursor; both only move in whole
/// frames, so partially written frames never become visible.
pub(crate) struct Reservoir {
    producer: HeapProd<u8>,
    consumer: HeapCons<u8>,
    bytes_per_frame: usize,
    capacity: usize,
}

impl Reservoir {
    /// Creates a reservoir holding `capacity` frames of `bytes_per_frame`.
    pub fn new(capacity: usize, bytes_per_frame: usize) -> Self {
        let capacity = capacity.max(1);
        let bytes_per_frame = bytes_per_frame.max(1);
        let ring_buffer = HeapRb::<u8>::new(capacity * bytes_per_frame);
        let (producer, consumer) = ring_buffer.split();

        Self {
            producer,
            consumer,
            bytes_per_frame,
            capacity,
        }
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_frame
    }

    /// Frames ready to be read.
    pub fn frames_available(&self) -> usize {
        self.consumer.occupied_len() / self.bytes_per_frame
    }

    /// Frames that can be written without overwriting unread data.
    pub fn free_frames(&self) -> usize {
        self.producer.vacant_len() / self.bytes_per_frame
    }

    /// Appends as many whole frames from `data` as fit, returning the number
    /// of frames written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let frames = (data.len() / self.bytes_per_frame).min(self.free_frames());
        let bytes = frames * self.bytes_per_frame;
        let pushed = self.producer.push_slice(&data[..bytes]);
        debug_assert_eq!(pushed, bytes);
        frames
    }

    /// Moves up to `out.len() / bytes_per_frame` frames into `out`,
    /// returning the number of frames read.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let frames = (out.len() / self.bytes_per_frame).min(self.frames_available());
        let bytes = frames * self.bytes_per_frame;
        let popped = self.consumer.pop_slice(&mut out[..bytes]);
        debug_assert_eq!(popped, bytes);
        frames
    }

    /// Discards all buffered frames.
    pub fn clear(&mut self) {
        self.consumer.clear();
    }
}
