//! Synthetic input for testing without real audio files.

use std::time::Duration;

use bytes::{Bytes, BytesMut};

use crate::engine::{alaw_compress, ulaw_compress};
use crate::format::{i16_to_f32, sample_format, write_sample, FormatId};
use crate::source::{Input, InputBatch, InputSource};
use crate::{AudioFormat, ConverterError};

/// A mock audio source that generates synthetic audio for testing.
///
/// Samples are kept as interleaved 16-bit PCM and encoded into any
/// interleaved PCM or G.711 format on demand with
/// [`into_packets`](MockSource::into_packets).
///
/// # Example
///
/// ```
/// use audio_converter::{AudioFormat, MockSource};
///
/// let mut mock = MockSource::new(8000, 1);
///
/// // Generate 100ms of silence
/// mock.generate_silence(100);
///
/// // Generate 100ms of a 440Hz sine wave
/// mock.generate_sine(440.0, 100);
///
/// // Replay as 20ms µ-law packets
/// let source = mock.into_packets(&AudioFormat::ulaw(8000, 1, 160)).unwrap();
/// assert_eq!(source.remaining(), 1600);
/// ```
pub struct MockSource {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl MockSource {
    /// Creates a new mock source with the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Generates silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let num_samples = self.samples_for_duration(duration_ms);
        self.samples.extend(std::iter::repeat(0i16).take(num_samples));
    }

    /// Generates a sine wave at the given frequency for the given duration.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let num_frames = self.samples_for_duration(duration_ms) / self.channels as usize;
        let sample_rate = f64::from(self.sample_rate);

        for i in 0..num_frames {
            let t = i as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
            let sample = (value * 32767.0) as i16;

            for _ in 0..self.channels {
                self.samples.push(sample);
            }
        }
    }

    /// Generates white noise for the given duration.
    pub fn generate_noise(&mut self, duration_ms: u64, amplitude: f64) {
        let num_samples = self.samples_for_duration(duration_ms);
        let amplitude = (amplitude * 32767.0) as i16;

        // LCG, so the noise is the same on every run
        let mut seed: u32 = 12345;
        for _ in 0..num_samples {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let random = ((seed >> 16) as i32 - 32768) as i16;
            let sample = (i32::from(random) * i32::from(amplitude) / 32767) as i16;
            self.samples.push(sample);
        }
    }

    /// Adds raw interleaved samples directly.
    pub fn add_samples(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    /// Takes all accumulated samples, clearing the internal buffer.
    pub fn take_samples(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.samples)
    }

    /// Returns a reference to the accumulated samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Returns the duration of accumulated samples.
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Encodes the accumulated samples in `format`.
    ///
    /// Supports interleaved linear PCM of any sample type, µ-law and A-law.
    /// The format's rate and channel count must match the mock's.
    pub fn encode(&self, format: &AudioFormat) -> Result<Bytes, ConverterError> {
        format.validate()?;
        if format.sample_rate != self.sample_rate || format.channels_per_frame != self.channels {
            return Err(ConverterError::format(format!(
                "mock is {}Hz {}ch, cannot encode as {format}",
                self.sample_rate, self.channels
            )));
        }

        let encoded = match format.format_id {
            FormatId::LinearPcm if format.is_interleaved() => {
                let sample_format = sample_format(format)?;
                let mut out =
                    BytesMut::with_capacity(self.samples.len() * sample_format.bytes_per_sample());
                for &sample in &self.samples {
                    write_sample(&mut out, i16_to_f32(sample), sample_format);
                }
                out.freeze()
            }
            FormatId::ULaw => self.samples.iter().map(|&s| ulaw_compress(s)).collect(),
            FormatId::ALaw => self.samples.iter().map(|&s| alaw_compress(s)).collect(),
            _ => return Err(ConverterError::unsupported_format(format.to_string())),
        };
        Ok(encoded)
    }

    /// Encodes the accumulated samples and wraps them in a [`PacketSource`]
    /// that replays them one packet (one frame, for PCM) at a time.
    pub fn into_packets(self, format: &AudioFormat) -> Result<PacketSource, ConverterError> {
        let data = self.encode(format)?;
        let bytes_per_packet = if format.bytes_per_packet > 0 {
            format.bytes_per_packet
        } else {
            format.bytes_per_frame
        };
        Ok(PacketSource::new(data, bytes_per_packet as usize))
    }

    fn samples_for_duration(&self, duration_ms: u64) -> usize {
        let frames = (self.sample_rate as u64 * duration_ms / 1000) as usize;
        frames * self.channels as usize
    }
}

/// An [`InputSource`] that replays a byte stream as constant-size packets.
///
/// Each request is answered with the number of packets asked for (or a
/// fixed batch size, see [`with_batch_size`](PacketSource::with_batch_size)),
/// then [`Input::EndOfStream`] once the data runs out. A trailing partial
/// packet is delivered as-is.
#[derive(Debug, Clone)]
pub struct PacketSource {
    data: Bytes,
    bytes_per_packet: usize,
    batch_size: Option<u32>,
    requests: usize,
}

impl PacketSource {
    /// Creates a source over `data` split into `bytes_per_packet` packets.
    pub fn new(data: impl Into<Bytes>, bytes_per_packet: usize) -> Self {
        Self {
            data: data.into(),
            bytes_per_packet: bytes_per_packet.max(1),
            batch_size: None,
            requests: 0,
        }
    }

    /// Answers every request with `packets` packets regardless of the
    /// requested count.
    #[must_use]
    pub fn with_batch_size(mut self, packets: u32) -> Self {
        self.batch_size = Some(packets.max(1));
        self
    }

    /// Number of times the converter has asked for input.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl InputSource for PacketSource {
    fn next_input(&mut self, requested_packets: u32) -> Result<Input, ConverterError> {
        self.requests += 1;
        if self.data.is_empty() {
            return Ok(Input::EndOfStream);
        }

        let packets = self.batch_size.unwrap_or(requested_packets).max(1) as usize;
        let bytes = (packets * self.bytes_per_packet).min(self.data.len());
        let count = bytes.div_ceil(self.bytes_per_packet) as u32;
        Ok(Input::Packets(InputBatch::interleaved(self.data.split_to(bytes), count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_silence() {
        let mut mock = MockSource::new(16000, 1);
        mock.generate_silence(100);

        let samples = mock.take_samples();
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mock_source_sine() {
        let mut mock = MockSource::new(16000, 1);
        mock.generate_sine(440.0, 100);

        let samples = mock.take_samples();
        assert_eq!(samples.len(), 1600);
        assert!(samples.iter().any(|&s| s > 0));
        assert!(samples.iter().any(|&s| s < 0));
    }

    #[test]
    fn test_mock_source_noise_is_deterministic() {
        let mut a = MockSource::new(8000, 1);
        let mut b = MockSource::new(8000, 1);
        a.generate_noise(50, 0.5);
        b.generate_noise(50, 0.5);
        assert_eq!(a.samples(), b.samples());
        assert!(a.samples().iter().all(|s| s.unsigned_abs() <= 16384));
    }

    #[test]
    fn test_mock_source_duration() {
        let mut mock = MockSource::new(16000, 1);
        mock.generate_silence(500);
        assert_eq!(mock.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_encode_pcm_f32() {
        let mut mock = MockSource::new(8000, 2);
        mock.add_samples(&[16384, -16384]);
        let data = mock.encode(&AudioFormat::pcm_f32(8000, 2)).unwrap();
        assert_eq!(data.len(), 8);
        assert_eq!(f32::from_le_bytes([data[0], data[1], data[2], data[3]]), 0.5);
    }

    #[test]
    fn test_encode_ulaw_silence() {
        let mut mock = MockSource::new(8000, 1);
        mock.add_samples(&[0, 0]);
        let data = mock.encode(&AudioFormat::ulaw(8000, 1, 160)).unwrap();
        assert_eq!(&data[..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_rejects_mismatched_rate() {
        let mock = MockSource::new(8000, 1);
        assert!(matches!(
            mock.encode(&AudioFormat::pcm_i16(16000, 1)),
            Err(ConverterError::Format { .. })
        ));
    }

    #[test]
    fn test_packet_source_splits_and_ends() {
        let mut source = PacketSource::new(vec![1u8, 2, 3, 4, 5], 2);

        let Input::Packets(first) = source.next_input(2).unwrap() else {
            panic!("expected packets");
        };
        assert_eq!(first.packet_count, 2);
        assert_eq!(&first.buffers[0][..], &[1, 2, 3, 4]);

        let Input::Packets(tail) = source.next_input(2).unwrap() else {
            panic!("expected packets");
        };
        assert_eq!(tail.packet_count, 1);
        assert_eq!(&tail.buffers[0][..], &[5]);

        assert_eq!(source.next_input(2).unwrap(), Input::EndOfStream);
        assert_eq!(source.requests(), 3);
    }

    #[test]
    fn test_packet_source_fixed_batch() {
        let mut source = PacketSource::new(vec![0u8; 100], 10).with_batch_size(3);
        let Input::Packets(batch) = source.next_input(1).unwrap() else {
            panic!("expected packets");
        };
        assert_eq!(batch.packet_count, 3);
        assert_eq!(source.remaining(), 70);
    }
}
