//! Sample format and channel conversion.
//!
//! All conversion goes through interleaved `f32` in the range [-1.0, 1.0].
//! Integer scaling is symmetric around a power of two, so converting an
//! integer sample to `f32` and back is exact.

use bytes::{BufMut, BytesMut};

use crate::format::{ChannelLayout, SampleFormat, SampleType};

const HALF_AMPLITUDE: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Converts f32 samples to i16.
///
/// Values outside [-1.0, 1.0) are clamped.
///
/// Scales by 32768 (not 32767) so that `i16_to_f32` followed by
/// `f32_to_i16` returns the original sample.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// Converts i16 samples to f32.
///
/// Output will be in the range [-1.0, 1.0).
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Reads one sample from `bytes`, which must hold at least one sample.
pub fn read_sample(bytes: &[u8], format: SampleFormat) -> f32 {
    let be = format.big_endian;
    match format.sample_type {
        SampleType::U8 => (f32::from(bytes[0]) - 128.0) / 128.0,
        SampleType::S16 => {
            let raw = [bytes[0], bytes[1]];
            let value = if be {
                i16::from_be_bytes(raw)
            } else {
                i16::from_le_bytes(raw)
            };
            i16_to_f32(value)
        }
        SampleType::S24 => {
            let (hi, mid, lo) = if be {
                (bytes[0], bytes[1], bytes[2])
            } else {
                (bytes[2], bytes[1], bytes[0])
            };
            // sign-extend through the top byte of an i32
            let value = i32::from_be_bytes([hi, mid, lo, 0]) >> 8;
            value as f32 / 8_388_608.0
        }
        SampleType::S32 => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            let value = if be {
                i32::from_be_bytes(raw)
            } else {
                i32::from_le_bytes(raw)
            };
            (f64::from(value) / 2_147_483_648.0) as f32
        }
        SampleType::F32 => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            if be {
                f32::from_be_bytes(raw)
            } else {
                f32::from_le_bytes(raw)
            }
        }
        SampleType::F64 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[..8]);
            let value = if be {
                f64::from_be_bytes(raw)
            } else {
                f64::from_le_bytes(raw)
            };
            value as f32
        }
    }
}

/// Appends one sample in the given format.
pub fn write_sample(out: &mut BytesMut, sample: f32, format: SampleFormat) {
    let be = format.big_endian;
    match format.sample_type {
        SampleType::U8 => out.put_u8((sample * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8),
        SampleType::S16 => {
            let value = f32_to_i16(sample);
            if be {
                out.put_i16(value);
            } else {
                out.put_i16_le(value);
            }
        }
        SampleType::S24 => {
            let value = (sample * 8_388_608.0).round().clamp(-8_388_608.0, 8_388_607.0) as i32;
            let [_, hi, mid, lo] = value.to_be_bytes();
            if be {
                out.put_slice(&[hi, mid, lo]);
            } else {
                out.put_slice(&[lo, mid, hi]);
            }
        }
        SampleType::S32 => {
            let value = (f64::from(sample) * 2_147_483_648.0)
                .round()
                .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
            if be {
                out.put_i32(value);
            } else {
                out.put_i32_le(value);
            }
        }
        SampleType::F32 => {
            if be {
                out.put_f32(sample);
            } else {
                out.put_f32_le(sample);
            }
        }
        SampleType::F64 => {
            if be {
                out.put_f64(f64::from(sample));
            } else {
                out.put_f64_le(f64::from(sample));
            }
        }
    }
}

/// Decodes raw PCM planes into interleaved f32.
///
/// Packed formats pass a single plane; planar formats pass one plane per
/// channel.
pub fn planes_to_f32<P: AsRef<[u8]>>(
    planes: &[P],
    format: SampleFormat,
    channels: usize,
    frames: usize,
) -> Vec<f32> {
    let width = format.bytes_per_sample();
    let mut samples = Vec::with_capacity(frames * channels);
    if format.planar {
        for frame in 0..frames {
            for plane in planes.iter().take(channels) {
                let offset = frame * width;
                samples.push(read_sample(&plane.as_ref()[offset..offset + width], format));
            }
        }
    } else if let Some(plane) = planes.first() {
        for sample in plane.as_ref()[..frames * channels * width].chunks_exact(width) {
            samples.push(read_sample(sample, format));
        }
    }
    samples
}

/// Encodes interleaved f32 into packed samples of the given format.
pub fn f32_to_packed(samples: &[f32], format: SampleFormat, out: &mut BytesMut) {
    out.reserve(samples.len() * format.bytes_per_sample());
    for &sample in samples {
        write_sample(out, sample, format);
    }
}

/// Splits interleaved bytes into one slice per channel.
///
/// `planes` must hold `frames * sample_width` bytes each.
pub fn deinterleave(packed: &[u8], sample_width: usize, planes: &mut [&mut [u8]]) {
    let channels = planes.len();
    for (frame, chunk) in packed.chunks_exact(sample_width * channels).enumerate() {
        for (channel, plane) in planes.iter_mut().enumerate() {
            let src = channel * sample_width;
            let dst = frame * sample_width;
            plane[dst..dst + sample_width].copy_from_slice(&chunk[src..src + sample_width]);
        }
    }
}

/// Joins one slice per channel into interleaved bytes, copying samples
/// without decoding them.
///
/// Each plane must hold `frames * sample_width` bytes.
pub fn interleave<P: AsRef<[u8]>>(
    planes: &[P],
    sample_width: usize,
    frames: usize,
    out: &mut BytesMut,
) {
    out.reserve(planes.len() * frames * sample_width);
    for frame in 0..frames {
        let offset = frame * sample_width;
        for plane in planes {
            out.put_slice(&plane.as_ref()[offset..offset + sample_width]);
        }
    }
}

/// Channel mixing weights from one layout to another.
///
/// Speakers present on both sides are copied. A mono source fans out to
/// every non-LFE output, a mono destination averages every non-LFE input,
/// and other unmatched inputs fold into the front pair at -3 dB. Rows whose
/// weights sum above 1.0 are normalized to avoid clipping.
#[derive(Debug, Clone, PartialEq)]
pub struct RemixMatrix {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>,
}

impl RemixMatrix {
    /// Builds the matrix, or returns `None` when the layouts are identical.
    pub fn new(input: ChannelLayout, output: ChannelLayout) -> Option<Self> {
        if input == output {
            return None;
        }

        let in_speakers: Vec<u64> = input.speakers().collect();
        let out_speakers: Vec<u64> = output.speakers().collect();
        let inputs = in_speakers.len();
        let outputs = out_speakers.len();
        let mut weights = vec![0.0f32; inputs * outputs];

        for (o, speaker) in out_speakers.iter().enumerate() {
            if let Some(i) = in_speakers.iter().position(|s| s == speaker) {
                weights[o * inputs + i] = 1.0;
            }
        }

        if inputs == 1 {
            for (o, &speaker) in out_speakers.iter().enumerate() {
                if speaker != ChannelLayout::LOW_FREQUENCY {
                    weights[o * inputs] = 1.0;
                }
            }
        } else if outputs == 1 {
            for (i, &speaker) in in_speakers.iter().enumerate() {
                if speaker != ChannelLayout::LOW_FREQUENCY {
                    weights[i] = 1.0;
                }
            }
        } else {
            let left = out_speakers.iter().position(|&s| s == ChannelLayout::FRONT_LEFT);
            let right = out_speakers.iter().position(|&s| s == ChannelLayout::FRONT_RIGHT);
            for (i, &speaker) in in_speakers.iter().enumerate() {
                if output.contains(speaker) || speaker == ChannelLayout::LOW_FREQUENCY {
                    continue;
                }
                let targets = match fold_side(speaker) {
                    Side::Left => [left, None],
                    Side::Right => [right, None],
                    Side::Center => [left, right],
                };
                for o in targets.into_iter().flatten() {
                    weights[o * inputs + i] += HALF_AMPLITUDE;
                }
            }
        }

        for row in weights.chunks_exact_mut(inputs) {
            let sum: f32 = row.iter().sum();
            if sum > 1.0 {
                row.iter_mut().for_each(|w| *w /= sum);
            }
        }

        Some(Self {
            inputs,
            outputs,
            weights,
        })
    }

    /// Number of output channels.
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    /// Mixes interleaved input frames into interleaved output frames.
    pub fn apply(&self, samples: &[f32]) -> Vec<f32> {
        let frames = samples.len() / self.inputs;
        let mut mixed = Vec::with_capacity(frames * self.outputs);
        for frame in samples.chunks_exact(self.inputs) {
            for row in self.weights.chunks_exact(self.inputs) {
                mixed.push(row.iter().zip(frame).map(|(w, s)| w * s).sum::<f32>());
            }
        }
        mixed
    }
}

enum Side {
    Left,
    Right,
    Center,
}

fn fold_side(speaker: u64) -> Side {
    match speaker {
        ChannelLayout::FRONT_LEFT
        | ChannelLayout::FRONT_LEFT_OF_CENTER
        | ChannelLayout::BACK_LEFT
        | ChannelLayout::SIDE_LEFT => Side::Left,
        ChannelLayout::FRONT_RIGHT
        | ChannelLayout::FRONT_RIGHT_OF_CENTER
        | ChannelLayout::BACK_RIGHT
        | ChannelLayout::SIDE_RIGHT => Side::Right,
        _ => Side::Center,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s16() -> SampleFormat {
        SampleFormat::packed(SampleType::S16)
    }

    #[test]
    fn test_f32_to_i16_full_range() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32768);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn test_f32_to_i16_clamping() {
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_i16_roundtrip_exact() {
        for original in [0i16, 1, -1, 1000, -1000, 32767, -32768] {
            assert_eq!(f32_to_i16(i16_to_f32(original)), original);
        }
    }

    #[test]
    fn test_s24_sign_extension() {
        let format = SampleFormat::packed(SampleType::S24);
        let mut out = BytesMut::new();
        write_sample(&mut out, -0.5, format);
        assert_eq!(&out[..], &[0x00, 0x00, 0xC0]);
        assert!((read_sample(&out, format) + 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_big_endian_s16() {
        let format = SampleFormat {
            big_endian: true,
            ..s16()
        };
        let mut out = BytesMut::new();
        write_sample(&mut out, i16_to_f32(0x0102), format);
        assert_eq!(&out[..], &[0x01, 0x02]);
    }

    #[test]
    fn test_u8_midpoint() {
        let format = SampleFormat::packed(SampleType::U8);
        assert_eq!(read_sample(&[128], format), 0.0);
        let mut out = BytesMut::new();
        write_sample(&mut out, 0.0, format);
        assert_eq!(&out[..], &[128]);
    }

    #[test]
    fn test_planes_to_f32_planar() {
        let format = SampleFormat {
            planar: true,
            ..s16()
        };
        let left = 16384i16.to_le_bytes();
        let right = (-16384i16).to_le_bytes();
        let samples = planes_to_f32(&[&left[..], &right[..]], format, 2, 1);
        assert_eq!(samples, vec![0.5, -0.5]);
    }

    #[test]
    fn test_deinterleave() {
        let packed = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut left = [0u8; 4];
        let mut right = [0u8; 4];
        deinterleave(&packed, 2, &mut [&mut left[..], &mut right[..]]);
        assert_eq!(left, [1, 2, 5, 6]);
        assert_eq!(right, [3, 4, 7, 8]);
    }

    #[test]
    fn test_interleave_inverts_deinterleave() {
        let mut out = BytesMut::new();
        interleave(&[[1u8, 2, 5, 6], [3, 4, 7, 8]], 2, 2, &mut out);
        assert_eq!(&out[..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_identical_layouts_need_no_matrix() {
        assert!(RemixMatrix::new(ChannelLayout::STEREO, ChannelLayout::STEREO).is_none());
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let matrix = RemixMatrix::new(ChannelLayout::STEREO, ChannelLayout::MONO).unwrap();
        let mixed = matrix.apply(&[0.25, 0.75, 0.5, -0.5]);
        assert_eq!(mixed, vec![0.5, 0.0]);
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let matrix = RemixMatrix::new(ChannelLayout::MONO, ChannelLayout::STEREO).unwrap();
        let mixed = matrix.apply(&[0.25, -0.5]);
        assert_eq!(mixed, vec![0.25, 0.25, -0.5, -0.5]);
    }

    #[test]
    fn test_surround_downmix_stays_in_range() {
        let matrix =
            RemixMatrix::new(ChannelLayout::FIVE_POINT_ONE, ChannelLayout::STEREO).unwrap();
        assert_eq!(matrix.outputs(), 2);
        let mixed = matrix.apply(&[1.0; 6]);
        assert!(mixed.iter().all(|s| *s <= 1.0 + f32::EPSILON));
        assert!(mixed.iter().all(|s| *s > 0.9));
    }
}
