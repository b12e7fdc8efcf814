//! Sample rate conversion.
//!
//! [`LinearResampler`] converts sample format, channel layout and rate in
//! one pass using linear interpolation. It is fast but may introduce
//! artifacts for large rate changes; plug a dedicated engine in through
//! [`EngineFactory`](crate::engine::EngineFactory) when quality matters.

use bytes::BytesMut;

use crate::engine::{PcmFrame, PcmSpec, Resampler};
use crate::format::{f32_to_packed, interleave, planes_to_f32, write_sample, RemixMatrix};
use crate::EngineError;

/// Streaming linear-interpolation resampler.
///
/// Output frame `k` sits at input position `k * in_rate / out_rate`. The
/// position is kept as an exact rational, so chunk boundaries never shift
/// the output. The last input frame is held back until the next push or
/// [`flush`](Resampler::flush), because interpolating toward it needs its
/// successor. After a flush, `N` input frames have produced exactly
/// `ceil(N * out_rate / in_rate)` output frames.
pub struct LinearResampler {
    input: PcmSpec,
    output: PcmSpec,
    remix: Option<RemixMatrix>,
    /// Input and output differ at most in planar vs packed layout, so
    /// samples are moved as raw bytes.
    passthrough: bool,
    /// Interleaved f32 frames in the output layout, not yet consumed.
    history: Vec<f32>,
    /// Input frames dropped from the front of `history` so far.
    dropped: u64,
    /// Output frames produced so far.
    emitted: u64,
    pending: BytesMut,
}

impl LinearResampler {
    /// Creates a resampler from `input` to the packed form of `output`.
    pub fn new(input: PcmSpec, output: PcmSpec) -> Result<Self, EngineError> {
        let output = output.to_packed();
        if input.sample_rate == 0 || output.sample_rate == 0 {
            return Err(EngineError::unsupported("zero sample rate"));
        }
        if input.channels == 0 || output.channels == 0 {
            return Err(EngineError::unsupported("zero channels"));
        }
        if input.layout.channel_count() != usize::from(input.channels)
            || output.layout.channel_count() != usize::from(output.channels)
        {
            return Err(EngineError::unsupported(format!(
                "layouts {} -> {} do not match channel counts {} -> {}",
                input.layout, output.layout, input.channels, output.channels
            )));
        }

        Ok(Self {
            input,
            output,
            remix: RemixMatrix::new(input.layout, output.layout),
            passthrough: input.to_packed() == output,
            history: Vec::new(),
            dropped: 0,
            emitted: 0,
            pending: BytesMut::new(),
        })
    }

    fn channels(&self) -> usize {
        usize::from(self.output.channels)
    }

    /// Input position of the next output frame, relative to `history`,
    /// plus the fractional offset toward the following frame.
    fn next_position(&self) -> (usize, f32) {
        let in_rate = u64::from(self.input.sample_rate);
        let out_rate = u64::from(self.output.sample_rate);
        let numerator = self.emitted * in_rate;
        let index = numerator / out_rate - self.dropped;
        let frac = (numerator % out_rate) as f32 / out_rate as f32;
        (index as usize, frac)
    }

    fn history_frames(&self) -> usize {
        self.history.len() / self.channels()
    }

    fn emit(&mut self, index: usize, frac: f32, hold: bool) {
        let channels = self.channels();
        let format = self.output.sample_format;
        for channel in 0..channels {
            let a = self.history[index * channels + channel];
            let sample = if hold {
                a
            } else {
                let b = self.history[(index + 1) * channels + channel];
                a + (b - a) * frac
            };
            write_sample(&mut self.pending, sample, format);
        }
        self.emitted += 1;
    }

    fn interpolate(&mut self) {
        let frames = self.history_frames();
        loop {
            let (index, frac) = self.next_position();
            if index + 1 >= frames {
                break;
            }
            self.emit(index, frac, false);
        }

        let (next, _) = self.next_position();
        let consumed = next.min(frames);
        self.history.drain(..consumed * self.channels());
        self.dropped += consumed as u64;
    }
}

impl Resampler for LinearResampler {
    fn push(&mut self, frame: &PcmFrame) -> Result<(), EngineError> {
        if frame.spec != self.input {
            return Err(EngineError::invalid_input(format!(
                "frame spec {:?} differs from resampler input {:?}",
                frame.spec, self.input
            )));
        }
        if frame.is_empty() {
            return Ok(());
        }

        let expected_planes = if self.input.sample_format.planar {
            usize::from(self.input.channels)
        } else {
            1
        };
        let plane_bytes = if self.input.sample_format.planar {
            frame.frames * self.input.bytes_per_sample()
        } else {
            frame.frames * self.input.bytes_per_frame()
        };
        if frame.planes.len() < expected_planes
            || frame.planes.iter().any(|p| p.len() < plane_bytes)
        {
            return Err(EngineError::invalid_input(format!(
                "expected {expected_planes} planes of {plane_bytes} bytes"
            )));
        }

        if self.passthrough {
            if self.input.sample_format.planar {
                let width = self.input.bytes_per_sample();
                let planes = &frame.planes[..expected_planes];
                interleave(planes, width, frame.frames, &mut self.pending);
            } else {
                self.pending.extend_from_slice(&frame.planes[0][..plane_bytes]);
            }
            return Ok(());
        }

        let mut samples = planes_to_f32(
            &frame.planes,
            self.input.sample_format,
            usize::from(self.input.channels),
            frame.frames,
        );
        if let Some(remix) = &self.remix {
            samples = remix.apply(&samples);
        }

        if self.input.sample_rate == self.output.sample_rate {
            f32_to_packed(&samples, self.output.sample_format, &mut self.pending);
        } else {
            self.history.extend_from_slice(&samples);
            self.interpolate();
        }
        Ok(())
    }

    fn available(&self) -> usize {
        self.pending.len() / self.output.bytes_per_frame()
    }

    fn read(&mut self, out: &mut [u8]) -> usize {
        let bytes_per_frame = self.output.bytes_per_frame();
        let frames = self.available().min(out.len() / bytes_per_frame);
        let bytes = frames * bytes_per_frame;
        let chunk = self.pending.split_to(bytes);
        out[..bytes].copy_from_slice(&chunk);
        frames
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        let frames = self.history_frames();
        loop {
            let (index, frac) = self.next_position();
            if index >= frames {
                break;
            }
            self.emit(index, frac, index + 1 >= frames);
        }
        self.history.clear();
        self.dropped = 0;
        self.emitted = 0;
        Ok(())
    }

    fn reset(&mut self) {
        self.history.clear();
        self.dropped = 0;
        self.emitted = 0;
        self.pending.clear();
    }

    fn output_spec(&self) -> PcmSpec {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::format::{channel_layout, i16_to_f32, SampleFormat, SampleType};

    fn spec(sample_rate: u32, channels: u16, sample_type: SampleType) -> PcmSpec {
        PcmSpec {
            sample_rate,
            channels,
            layout: channel_layout(channels),
            sample_format: SampleFormat::packed(sample_type),
        }
    }

    fn i16_frame(spec: PcmSpec, samples: &[i16]) -> PcmFrame {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        PcmFrame::packed(spec, Bytes::from(data))
    }

    fn read_i16(resampler: &mut LinearResampler) -> Vec<i16> {
        let mut out = vec![0u8; resampler.available() * resampler.output_spec().bytes_per_frame()];
        let frames = resampler.read(&mut out);
        assert_eq!(out.len(), frames * resampler.output_spec().bytes_per_frame());
        out.chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_same_spec_is_passthrough() {
        let s = spec(16000, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(s, s).unwrap();
        resampler.push(&i16_frame(s, &[100, 200, 300])).unwrap();
        assert_eq!(resampler.available(), 3);
        assert_eq!(read_i16(&mut resampler), vec![100, 200, 300]);
    }

    #[test]
    fn test_sample_format_only() {
        let input = spec(8000, 1, SampleType::S16);
        let output = spec(8000, 1, SampleType::F32);
        let mut resampler = LinearResampler::new(input, output).unwrap();
        resampler.push(&i16_frame(input, &[16384, -16384])).unwrap();

        let mut out = [0u8; 8];
        assert_eq!(resampler.read(&mut out), 2);
        assert_eq!(f32::from_le_bytes([out[0], out[1], out[2], out[3]]), 0.5);
        assert_eq!(f32::from_le_bytes([out[4], out[5], out[6], out[7]]), -0.5);
    }

    #[test]
    fn test_upsample_interpolates() {
        let input = spec(1, 1, SampleType::S16);
        let output = spec(2, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(input, output).unwrap();
        resampler.push(&i16_frame(input, &[0, 100, 200, 300])).unwrap();

        // the last input frame is held for look-ahead
        assert_eq!(read_i16(&mut resampler), vec![0, 50, 100, 150, 200, 250]);

        resampler.flush().unwrap();
        assert_eq!(read_i16(&mut resampler), vec![300, 300]);
    }

    #[test]
    fn test_downsample_frame_count() {
        let input = spec(48000, 1, SampleType::S16);
        let output = spec(16000, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(input, output).unwrap();
        let samples: Vec<i16> = (0..480).map(|i| (i * 10) as i16).collect();
        resampler.push(&i16_frame(input, &samples)).unwrap();
        resampler.flush().unwrap();
        assert_eq!(resampler.available(), 160);
    }

    #[test]
    fn test_flush_rounds_up() {
        let input = spec(44100, 1, SampleType::S16);
        let output = spec(48000, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(input, output).unwrap();
        resampler.push(&i16_frame(input, &[0; 1000])).unwrap();
        resampler.flush().unwrap();
        // ceil(1000 * 48000 / 44100) = 1089
        assert_eq!(resampler.available(), 1089);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let input = spec(44100, 2, SampleType::S16);
        let output = spec(32000, 2, SampleType::S16);
        let samples: Vec<i16> = (0..2000).map(|i| ((i * 37) % 20000) as i16).collect();

        let mut whole = LinearResampler::new(input, output).unwrap();
        whole.push(&i16_frame(input, &samples)).unwrap();
        whole.flush().unwrap();
        let expected = read_i16(&mut whole);

        let mut chunked = LinearResampler::new(input, output).unwrap();
        for chunk in samples.chunks(14) {
            chunked.push(&i16_frame(input, chunk)).unwrap();
        }
        chunked.flush().unwrap();
        assert_eq!(read_i16(&mut chunked), expected);
    }

    #[test]
    fn test_stereo_to_mono_remix() {
        let input = spec(8000, 2, SampleType::S16);
        let output = spec(8000, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(input, output).unwrap();
        resampler.push(&i16_frame(input, &[1000, 3000, -2000, 2000])).unwrap();
        assert_eq!(read_i16(&mut resampler), vec![2000, 0]);
    }

    #[test]
    fn test_planar_input_packed_output() {
        let input = PcmSpec {
            sample_format: SampleFormat {
                planar: true,
                ..SampleFormat::packed(SampleType::S16)
            },
            ..spec(8000, 2, SampleType::S16)
        };
        let output = spec(8000, 2, SampleType::S16);
        let mut resampler = LinearResampler::new(input, output).unwrap();

        let left: Vec<u8> = [1i16, 2].iter().flat_map(|s| s.to_le_bytes()).collect();
        let right: Vec<u8> = [-1i16, -2].iter().flat_map(|s| s.to_le_bytes()).collect();
        let frame = PcmFrame {
            spec: input,
            frames: 2,
            planes: vec![Bytes::from(left), Bytes::from(right)],
        };
        resampler.push(&frame).unwrap();
        assert_eq!(read_i16(&mut resampler), vec![1, -1, 2, -2]);
    }

    #[test]
    fn test_planar_s32_interleaves_losslessly() {
        let output = spec(8000, 2, SampleType::S32);
        let input = PcmSpec {
            sample_format: SampleFormat {
                planar: true,
                ..output.sample_format
            },
            ..output
        };
        let mut resampler = LinearResampler::new(input, output).unwrap();

        let left: Vec<u8> = [0x7FFF_FFFFi32, 0x1234_5679]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let right: Vec<u8> = [-3i32, 0x0100_0001]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let frame = PcmFrame {
            spec: input,
            frames: 2,
            planes: vec![Bytes::from(left), Bytes::from(right)],
        };
        resampler.push(&frame).unwrap();

        let mut out = [0u8; 16];
        assert_eq!(resampler.read(&mut out), 2);
        let samples: Vec<i32> = out
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(samples, vec![0x7FFF_FFFF, -3, 0x1234_5679, 0x0100_0001]);
    }

    #[test]
    fn test_partial_read() {
        let s = spec(8000, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(s, s).unwrap();
        resampler.push(&i16_frame(s, &[1, 2, 3])).unwrap();

        let mut out = [0u8; 5];
        assert_eq!(resampler.read(&mut out), 2);
        assert_eq!(resampler.available(), 1);
    }

    #[test]
    fn test_reset_discards_everything() {
        let input = spec(8000, 1, SampleType::S16);
        let output = spec(16000, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(input, output).unwrap();
        resampler.push(&i16_frame(input, &[5, 6, 7])).unwrap();
        resampler.reset();
        resampler.flush().unwrap();
        assert_eq!(resampler.available(), 0);
    }

    #[test]
    fn test_mismatched_frame_rejected() {
        let input = spec(8000, 1, SampleType::S16);
        let other = spec(16000, 1, SampleType::S16);
        let mut resampler = LinearResampler::new(input, input).unwrap();
        let result = resampler.push(&i16_frame(other, &[1]));
        assert!(matches!(result, Err(EngineError::InvalidInput { .. })));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let input = spec(0, 1, SampleType::S16);
        assert!(LinearResampler::new(input, spec(8000, 1, SampleType::S16)).is_err());
    }

    #[test]
    fn test_interpolated_value_precision() {
        let input = spec(1, 1, SampleType::S16);
        let output = spec(4, 1, SampleType::F32);
        let mut resampler = LinearResampler::new(input, output).unwrap();
        resampler.push(&i16_frame(input, &[0, 4096])).unwrap();

        let mut out = [0u8; 16];
        assert_eq!(resampler.read(&mut out), 4);
        let quarter = f32::from_le_bytes([out[4], out[5], out[6], out[7]]);
        assert!((quarter - i16_to_f32(1024)).abs() < 1e-6);
    }
}
