//! The conversion driver.

use std::fmt;
use std::sync::Arc;

use crate::buffer::AudioBufferList;
use crate::engine::{EncodedPacket, EngineFactory, PcmFrame};
use crate::format::{channel_layout, ChannelLayout};
use crate::pipeline::{DecodeStage, Decoded, EncodeStage, ResampleStage, Reservoir};
use crate::property::{PropertyId, PropertyValue};
use crate::source::{Input, InputSource};
use crate::{AudioFormat, ConverterBuilder, ConverterConfig, ConverterError, PacketDescription};

/// Where the driver is in the input protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    /// Between calls, input still expected.
    Idle,
    /// Inside `fill`, pulling input from the producer.
    Feeding,
    /// The producer signalled end of input; remaining audio is being flushed.
    Draining,
    /// Everything has been delivered. `fill` returns 0 until `flush`.
    Exhausted,
}

/// Counters describing what a converter has processed since it was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConverterStats {
    /// Input packets (frames, for PCM sources) received from the producer.
    pub packets_in: u64,
    /// Output packets written to caller buffers.
    pub packets_out: u64,
    /// Output frames written to caller buffers.
    pub frames_out: u64,
    /// Input packets skipped because they failed to decode.
    pub decode_errors: u64,
}

/// Converts audio from one format to another.
///
/// A converter is created for one source and one destination format and
/// pulls its input from an [`InputSource`] each time the caller asks for
/// output with [`fill`](Converter::fill). PCM that does not fit the current
/// request is kept in an internal reservoir for the next call.
///
/// # Lifecycle
///
/// 1. Created by [`Converter::new`] or [`ConverterBuilder::build`]
/// 2. [`fill`](Converter::fill) until it returns fewer packets than asked
/// 3. [`flush`](Converter::flush) before converting an unrelated stream
/// 4. Dropped, or released explicitly with [`dispose`](Converter::dispose)
///
/// # Example
///
/// ```
/// use audio_converter::{AudioBufferList, AudioFormat, Converter, MockSource};
///
/// let source_format = AudioFormat::pcm_i16(8000, 1);
/// let destination = AudioFormat::ulaw(8000, 1, 160);
///
/// let mut mock = MockSource::new(8000, 1);
/// mock.generate_sine(440.0, 100);
/// let mut input = mock.into_packets(&source_format).unwrap();
///
/// let mut converter = Converter::new(source_format, destination).unwrap();
/// let mut output = AudioBufferList::for_format(&destination, 160 * 4);
/// let packets = converter.fill(&mut input, 4, &mut output, None).unwrap();
/// assert_eq!(packets, 4);
/// assert_eq!(output.total_bytes(), 640);
/// ```
pub struct Converter {
    source: AudioFormat,
    destination: AudioFormat,
    input_layout: ChannelLayout,
    output_layout: ChannelLayout,
    config: ConverterConfig,
    engines: Arc<dyn EngineFactory>,
    decode: DecodeStage,
    resample: ResampleStage,
    encode: EncodeStage,
    reservoir: Option<Reservoir>,
    scratch: Vec<u8>,
    state: DriverState,
    tail_flushed: bool,
    encoder_finished: bool,
    pending_packet: Option<EncodedPacket>,
    stats: ConverterStats,
}

impl Converter {
    /// Creates a converter with the default configuration and the built-in
    /// engines.
    pub fn new(source: AudioFormat, destination: AudioFormat) -> Result<Self, ConverterError> {
        Self::builder(source, destination).build()
    }

    /// Returns a builder for a converter from `source` to `destination`.
    pub fn builder(source: AudioFormat, destination: AudioFormat) -> ConverterBuilder {
        ConverterBuilder::new(source, destination)
    }

    pub(crate) fn open(
        source: AudioFormat,
        destination: AudioFormat,
        config: ConverterConfig,
        engines: Arc<dyn EngineFactory>,
    ) -> Result<Self, ConverterError> {
        source.validate()?;
        destination.validate()?;

        let decode = DecodeStage::new(&source, &*engines)?;
        let encode = EncodeStage::new(&destination, &*engines)?;

        tracing::debug!(%source, %destination, "created converter");

        Ok(Self {
            input_layout: channel_layout(source.channels_per_frame),
            output_layout: channel_layout(destination.channels_per_frame),
            source,
            destination,
            config,
            engines,
            decode,
            resample: ResampleStage::Uninitialized,
            encode,
            reservoir: None,
            scratch: Vec::new(),
            state: DriverState::Idle,
            tail_flushed: false,
            encoder_finished: false,
            pending_packet: None,
            stats: ConverterStats::default(),
        })
    }

    /// Writes up to `packets` output packets into `output`, pulling input
    /// from `source` as needed.
    ///
    /// Returns the number of packets written. Fewer than `packets` means
    /// input ran out (or the output buffers filled up); once input is
    /// exhausted every further call returns 0 until [`flush`](Self::flush).
    ///
    /// For PCM destinations one packet is one frame. When `descriptions` is
    /// given, one [`PacketDescription`] per written packet is stored in it,
    /// in output order; it must hold at least `packets` entries.
    ///
    /// Packets that fail to decode are skipped and counted rather than
    /// returned as errors.
    pub fn fill<S>(
        &mut self,
        source: &mut S,
        packets: u32,
        output: &mut AudioBufferList,
        descriptions: Option<&mut [PacketDescription]>,
    ) -> Result<u32, ConverterError>
    where
        S: InputSource + ?Sized,
    {
        output.clear_sizes();
        self.check_output(packets, output, descriptions.as_deref())?;

        if packets == 0 || self.state == DriverState::Exhausted {
            return Ok(0);
        }

        let written = if self.destination.is_pcm() {
            self.fill_pcm(source, packets, output, descriptions)?
        } else {
            self.fill_packets(source, packets, output, descriptions)?
        };

        if self.state == DriverState::Feeding {
            self.state = DriverState::Idle;
        }
        self.stats.packets_out += u64::from(written);
        tracing::trace!(requested = packets, written, state = ?self.state, "fill complete");
        Ok(written)
    }

    fn check_output(
        &self,
        packets: u32,
        output: &AudioBufferList,
        descriptions: Option<&[PacketDescription]>,
    ) -> Result<(), ConverterError> {
        let expected = self.destination.buffer_count();
        if output.len() != expected {
            return Err(ConverterError::invalid_output(format!(
                "{} needs {expected} buffers, got {}",
                self.destination,
                output.len()
            )));
        }

        let channels = if self.destination.is_interleaved() {
            self.destination.channels_per_frame
        } else {
            1
        };
        if let Some(buffer) = output.buffers().iter().find(|b| b.channels() != channels) {
            return Err(ConverterError::invalid_output(format!(
                "buffer has {} channels, expected {channels}",
                buffer.channels()
            )));
        }

        match descriptions {
            Some(descriptions) if descriptions.len() < packets as usize => {
                Err(ConverterError::invalid_output(format!(
                    "{} packet descriptions cannot describe {packets} packets",
                    descriptions.len()
                )))
            }
            _ => Ok(()),
        }
    }

    fn fill_pcm<S>(
        &mut self,
        source: &mut S,
        packets: u32,
        output: &mut AudioBufferList,
        mut descriptions: Option<&mut [PacketDescription]>,
    ) -> Result<u32, ConverterError>
    where
        S: InputSource + ?Sized,
    {
        let bytes_per_frame = self.destination.bytes_per_frame as usize;
        let capacity = output
            .buffers()
            .iter()
            .map(|buffer| buffer.capacity() / bytes_per_frame)
            .min()
            .unwrap_or(0);
        let wanted = (packets as usize).min(capacity);
        if wanted == 0 {
            return Err(ConverterError::invalid_output(format!(
                "buffers cannot hold one {bytes_per_frame} byte frame"
            )));
        }

        let mut written = 0;
        while written < wanted {
            if !self.ensure_frames(source, wanted - written)? {
                self.state = DriverState::Exhausted;
                break;
            }
            let frames = self.read_reservoir(wanted - written);
            let bytes = frames * self.reservoir_bytes_per_frame();
            self.encode
                .copy_pcm(&self.scratch[..bytes], frames, output, written);
            written += frames;
        }

        if let Some(descriptions) = &mut descriptions {
            for (index, description) in descriptions.iter_mut().take(written).enumerate() {
                let offset = (index * bytes_per_frame) as u64;
                *description = PacketDescription::new(offset, bytes_per_frame as u32);
            }
        }
        self.stats.frames_out += written as u64;
        Ok(written as u32)
    }

    fn fill_packets<S>(
        &mut self,
        source: &mut S,
        packets: u32,
        output: &mut AudioBufferList,
        mut descriptions: Option<&mut [PacketDescription]>,
    ) -> Result<u32, ConverterError>
    where
        S: InputSource + ?Sized,
    {
        let variable_framing = self.destination.is_variable_framing();
        let mut offset = 0;
        let mut written = 0;

        while written < packets as usize {
            let Some(packet) = self.next_packet(source)? else {
                self.state = DriverState::Exhausted;
                break;
            };

            let Some(buffer) = output.buffers_mut().first_mut() else {
                break;
            };
            let size = packet.data.len();
            if offset + size > buffer.capacity() {
                let capacity = buffer.capacity();
                self.pending_packet = Some(packet);
                if written == 0 {
                    return Err(ConverterError::invalid_output(format!(
                        "{size} byte packet does not fit a {capacity} byte buffer"
                    )));
                }
                break;
            }

            buffer.data_mut()[offset..offset + size].copy_from_slice(&packet.data);
            if let Some(descriptions) = &mut descriptions {
                let variable_frames = if variable_framing { packet.frames } else { 0 };
                descriptions[written] = PacketDescription {
                    start_offset: offset as u64,
                    variable_frames_in_packet: variable_frames,
                    data_byte_size: size as u32,
                };
            }
            offset += size;
            written += 1;
            self.stats.frames_out += u64::from(packet.frames);
        }

        if let Some(buffer) = output.buffers_mut().first_mut() {
            buffer.set_byte_size(offset);
        }
        Ok(written as u32)
    }

    /// Returns the next encoded packet, feeding the encoder from the
    /// reservoir as needed. `None` once the encoder is drained after end of
    /// input.
    fn next_packet<S>(&mut self, source: &mut S) -> Result<Option<EncodedPacket>, ConverterError>
    where
        S: InputSource + ?Sized,
    {
        if let Some(packet) = self.pending_packet.take() {
            return Ok(Some(packet));
        }

        loop {
            if let Some(packet) = self.encode.receive()? {
                return Ok(Some(packet));
            }
            if self.encoder_finished {
                return Ok(None);
            }

            let needed = self
                .encode
                .frame_size()
                .unwrap_or(self.config.variable_packet_frames)
                .max(1);
            if self.ensure_frames(source, needed)? {
                let frames = self.read_reservoir(needed);
                let bytes = frames * self.reservoir_bytes_per_frame();
                self.encode.send(&self.scratch[..bytes], frames)?;
            } else {
                self.encode.finish()?;
                self.encoder_finished = true;
                tracing::debug!("encoder drained");
            }
        }
    }

    /// Makes at least `needed` frames (capped at the reservoir capacity)
    /// available in the reservoir, feeding input as required.
    ///
    /// After end of input, returns `true` while any frames remain and
    /// `false` once the reservoir and resampler are both empty.
    fn ensure_frames<S>(&mut self, source: &mut S, needed: usize) -> Result<bool, ConverterError>
    where
        S: InputSource + ?Sized,
    {
        loop {
            let (available, capacity) = self
                .reservoir
                .as_ref()
                .map_or((0, usize::MAX), |r| (r.frames_available(), r.capacity()));
            if available >= needed.min(capacity).max(1) {
                return Ok(true);
            }
            if self.refill_reservoir() > 0 {
                continue;
            }

            match self.state {
                DriverState::Draining | DriverState::Exhausted => {
                    if !self.tail_flushed {
                        self.tail_flushed = true;
                        self.resample.flush()?;
                        tracing::trace!("flushed resampler tail");
                        continue;
                    }
                    return Ok(available > 0);
                }
                DriverState::Idle | DriverState::Feeding => self.feed(source)?,
            }
        }
    }

    /// Moves resampled frames into the reservoir, returning how many moved.
    fn refill_reservoir(&mut self) -> usize {
        let Some(reservoir) = self.reservoir.as_mut() else {
            return 0;
        };
        let frames = self.resample.available().min(reservoir.free_frames());
        if frames == 0 {
            return 0;
        }

        let bytes_per_frame = reservoir.bytes_per_frame();
        self.scratch.resize(frames * bytes_per_frame, 0);
        let read = self.resample.read(&mut self.scratch);
        reservoir.write(&self.scratch[..read * bytes_per_frame])
    }

    /// Reads up to `max` frames from the reservoir into the scratch buffer.
    fn read_reservoir(&mut self, max: usize) -> usize {
        let Some(reservoir) = self.reservoir.as_mut() else {
            return 0;
        };
        self.scratch.resize(max * reservoir.bytes_per_frame(), 0);
        reservoir.read(&mut self.scratch)
    }

    fn reservoir_bytes_per_frame(&self) -> usize {
        self.reservoir.as_ref().map_or(0, Reservoir::bytes_per_frame)
    }

    /// Makes one producer call and pushes whatever it yields through decode
    /// and resample.
    fn feed<S>(&mut self, source: &mut S) -> Result<(), ConverterError>
    where
        S: InputSource + ?Sized,
    {
        self.state = DriverState::Feeding;
        let requested = if self.source.is_pcm() {
            self.config.pcm_input_frames
        } else {
            self.config.input_packets_per_request
        }
        .max(1);

        match source.next_input(requested)? {
            Input::Packets(batch) if !batch.is_empty() => {
                tracing::trace!(requested, packets = batch.packet_count, "received input");
                self.stats.packets_in += u64::from(batch.packet_count);
                let decoded = self.decode.decode(&batch);
                self.absorb(decoded)
            }
            _ => {
                self.state = DriverState::Draining;
                tracing::debug!(packets_in = self.stats.packets_in, "end of input, draining");
                let decoded = self.decode.drain();
                self.absorb(decoded)
            }
        }
    }

    fn absorb(&mut self, decoded: Decoded) -> Result<(), ConverterError> {
        for err in decoded.errors {
            self.stats.decode_errors += 1;
            tracing::warn!(
                error = %err,
                total = self.stats.decode_errors,
                "skipped undecodable packet"
            );
        }
        for frame in &decoded.frames {
            self.push_frame(frame)?;
        }
        Ok(())
    }

    fn push_frame(&mut self, frame: &PcmFrame) -> Result<(), ConverterError> {
        if frame.is_empty() {
            return Ok(());
        }
        if !self.resample.is_ready() {
            self.initialize(frame)?;
        }
        self.resample.convert(frame)
    }

    /// Opens the encoder and resampler from the first real frame and sizes
    /// the reservoir.
    fn initialize(&mut self, frame: &PcmFrame) -> Result<(), ConverterError> {
        let output = self.encode.prepare(&*self.engines, self.config.bit_rate)?;
        self.resample.initialize(&frame.spec, &output, &*self.engines)?;

        let packet_frames = if self.destination.is_pcm() {
            1
        } else {
            self.encode
                .frame_size()
                .unwrap_or(self.config.variable_packet_frames)
        };
        let capacity = self.config.reservoir_frames.max(packet_frames * 2);
        self.reservoir = Some(Reservoir::new(capacity, output.bytes_per_frame()));
        tracing::debug!(capacity, packet_frames, "initialized pipeline");
        Ok(())
    }

    /// Discards all buffered audio and returns to the initial state, ready
    /// for an unrelated stream in the same formats.
    ///
    /// The resampler tail and encoder look-ahead are flushed as if input had
    /// ended and thrown away. Engines stay open and configuration is kept.
    pub fn flush(&mut self) -> Result<(), ConverterError> {
        self.decode.reset();

        let resampled = if self.tail_flushed {
            Ok(())
        } else {
            self.resample.flush()
        };
        self.resample.reset();

        let encoded = self.encode.discard(!self.encoder_finished);
        self.encode.reset();

        if let Some(reservoir) = &mut self.reservoir {
            reservoir.clear();
        }
        self.pending_packet = None;
        self.state = DriverState::Idle;
        self.tail_flushed = false;
        self.encoder_finished = false;

        tracing::debug!("flushed converter");
        resampled.and(encoded)
    }

    /// Reads a property.
    pub fn get_property(&self, id: PropertyId) -> Result<PropertyValue, ConverterError> {
        let value = match id {
            PropertyId::ENCODE_BIT_RATE => {
                let bit_rate = self
                    .bit_rate()
                    .ok_or(ConverterError::UnsupportedProperty { id })?;
                PropertyValue::U32(bit_rate)
            }
            PropertyId::FRAME_SIZE => PropertyValue::U32(self.frame_size()),
            PropertyId::MAXIMUM_OUTPUT_PACKET_SIZE => {
                PropertyValue::U32(self.maximum_output_packet_size())
            }
            PropertyId::CURRENT_INPUT_STREAM_DESCRIPTION => PropertyValue::Format(self.source),
            PropertyId::CURRENT_OUTPUT_STREAM_DESCRIPTION => {
                PropertyValue::Format(self.destination)
            }
            PropertyId::DECODE_ERROR_COUNT => PropertyValue::U64(self.stats.decode_errors),
            _ => return Err(ConverterError::UnsupportedProperty { id }),
        };
        Ok(value)
    }

    /// Writes a property. Only [`PropertyId::ENCODE_BIT_RATE`] is writable.
    pub fn set_property(
        &mut self,
        id: PropertyId,
        value: PropertyValue,
    ) -> Result<(), ConverterError> {
        match id {
            PropertyId::ENCODE_BIT_RATE => {
                let bit_rate = value.as_u32().ok_or_else(|| ConverterError::InvalidPropertyValue {
                    id,
                    reason: format!("expected U32, got {value:?}"),
                })?;
                self.set_bit_rate(bit_rate)
            }
            PropertyId::FRAME_SIZE
            | PropertyId::MAXIMUM_OUTPUT_PACKET_SIZE
            | PropertyId::CURRENT_INPUT_STREAM_DESCRIPTION
            | PropertyId::CURRENT_OUTPUT_STREAM_DESCRIPTION
            | PropertyId::DECODE_ERROR_COUNT => Err(ConverterError::ReadOnlyProperty { id }),
            _ => Err(ConverterError::UnsupportedProperty { id }),
        }
    }

    /// The encoder's bit rate, or the configured one before the encoder
    /// opens. `None` for PCM destinations.
    pub fn bit_rate(&self) -> Option<u32> {
        if self.destination.is_pcm() {
            return None;
        }
        Some(self.encode.bit_rate().unwrap_or(self.config.bit_rate))
    }

    /// Sets the encoder's target bit rate.
    ///
    /// Applies from the next encoded packet if the encoder is already open.
    pub fn set_bit_rate(&mut self, bit_rate: u32) -> Result<(), ConverterError> {
        let id = PropertyId::ENCODE_BIT_RATE;
        if self.destination.is_pcm() {
            return Err(ConverterError::UnsupportedProperty { id });
        }
        if bit_rate == 0 {
            return Err(ConverterError::InvalidPropertyValue {
                id,
                reason: "bit rate must be non-zero".to_string(),
            });
        }

        self.encode.set_bit_rate(bit_rate)?;
        self.config.bit_rate = bit_rate;
        tracing::debug!(bit_rate, "set encoder bit rate");
        Ok(())
    }

    /// Bytes per source frame.
    pub fn frame_size(&self) -> u32 {
        self.source.bytes_per_frame
    }

    /// Upper bound on the size of one output packet in bytes.
    pub fn maximum_output_packet_size(&self) -> u32 {
        self.encode.max_packet_size(self.config.variable_packet_frames) as u32
    }

    /// Input packets skipped because they failed to decode.
    pub fn decode_error_count(&self) -> u64 {
        self.stats.decode_errors
    }

    /// Returns the converter's counters.
    pub fn stats(&self) -> ConverterStats {
        self.stats.clone()
    }

    /// The source format.
    pub fn source_format(&self) -> &AudioFormat {
        &self.source
    }

    /// The destination format.
    pub fn destination_format(&self) -> &AudioFormat {
        &self.destination
    }

    /// Speaker layout of the source channels.
    pub fn source_layout(&self) -> ChannelLayout {
        self.input_layout
    }

    /// Speaker layout of the destination channels.
    pub fn destination_layout(&self) -> ChannelLayout {
        self.output_layout
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Releases the converter and every engine it opened.
    ///
    /// Equivalent to dropping it.
    #[allow(clippy::needless_pass_by_value)]
    pub fn dispose(self) {}
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Drop for Converter {
    fn drop(&mut self) {
        tracing::debug!(
            packets_in = self.stats.packets_in,
            packets_out = self.stats.packets_out,
            "released converter"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::input_fn;
    use crate::{InputBatch, MockSource, PacketSource};

    fn end_of_stream() -> impl FnMut(u32) -> Result<Input, ConverterError> {
        input_fn(|_| Ok(Input::EndOfStream))
    }

    fn pcm_input(frames: usize) -> PacketSource {
        PacketSource::new(vec![0x11u8; frames * 2], 2)
    }

    #[test]
    fn test_new_rejects_zero_channels() {
        let result = Converter::new(AudioFormat::pcm_i16(8000, 0), AudioFormat::pcm_i16(8000, 1));
        assert!(matches!(result, Err(ConverterError::Format { .. })));
    }

    #[test]
    fn test_converter_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Converter>();
    }

    #[test]
    fn test_end_of_stream_on_first_call() {
        let format = AudioFormat::pcm_i16(8000, 1);
        let mut converter = Converter::new(format, format).unwrap();
        let mut output = AudioBufferList::for_format(&format, 64);

        assert_eq!(converter.fill(&mut end_of_stream(), 8, &mut output, None).unwrap(), 0);
        assert_eq!(converter.state, DriverState::Exhausted);
        assert!(converter.reservoir.is_none());
        assert!(!converter.resample.is_ready());
    }

    #[test]
    fn test_exhausted_until_flush() {
        let format = AudioFormat::pcm_i16(8000, 1);
        let mut converter = Converter::new(format, format).unwrap();
        let mut output = AudioBufferList::for_format(&format, 64);

        converter.fill(&mut end_of_stream(), 8, &mut output, None).unwrap();

        let mut input = pcm_input(8);
        assert_eq!(converter.fill(&mut input, 8, &mut output, None).unwrap(), 0);
        assert_eq!(input.requests(), 0);

        converter.flush().unwrap();
        assert_eq!(converter.state, DriverState::Idle);
        assert_eq!(converter.fill(&mut input, 8, &mut output, None).unwrap(), 8);
    }

    #[test]
    fn test_surplus_stays_buffered() {
        let format = AudioFormat::pcm_i16(8000, 1);
        let mut converter = Converter::new(format, format).unwrap();
        let mut output = AudioBufferList::for_format(&format, 64);
        let mut input = pcm_input(100);

        assert_eq!(converter.fill(&mut input, 10, &mut output, None).unwrap(), 10);
        assert_eq!(converter.state, DriverState::Idle);
        let buffered = converter.reservoir.as_ref().map_or(0, Reservoir::frames_available);
        assert_eq!(buffered, 90);

        assert_eq!(converter.fill(&mut input, 32, &mut output, None).unwrap(), 32);
        assert_eq!(input.requests(), 1);
    }

    #[test]
    fn test_input_error_aborts_fill() {
        let format = AudioFormat::pcm_i16(8000, 1);
        let mut converter = Converter::new(format, format).unwrap();
        let mut output = AudioBufferList::for_format(&format, 64);
        let mut failing = input_fn(|_| Err(ConverterError::input("device unplugged")));

        let err = converter.fill(&mut failing, 4, &mut output, None).unwrap_err();
        assert!(matches!(err, ConverterError::Input { .. }));
    }

    #[test]
    fn test_wrong_buffer_count() {
        let destination = AudioFormat::pcm(8000, 2, 16, false, false);
        let mut converter = Converter::new(AudioFormat::pcm_i16(8000, 2), destination).unwrap();
        let mut output = AudioBufferList::for_format(&AudioFormat::pcm_i16(8000, 2), 64);

        let err = converter
            .fill(&mut end_of_stream(), 4, &mut output, None)
            .unwrap_err();
        assert!(matches!(err, ConverterError::InvalidOutputBuffer { .. }));
    }

    #[test]
    fn test_short_description_array() {
        let format = AudioFormat::pcm_i16(8000, 1);
        let mut converter = Converter::new(format, format).unwrap();
        let mut output = AudioBufferList::for_format(&format, 64);
        let mut descriptions = [PacketDescription::default(); 2];

        let err = converter
            .fill(&mut end_of_stream(), 4, &mut output, Some(&mut descriptions))
            .unwrap_err();
        assert!(matches!(err, ConverterError::InvalidOutputBuffer { .. }));
    }

    #[test]
    fn test_pcm_descriptions() {
        let format = AudioFormat::pcm_i16(8000, 1);
        let mut converter = Converter::new(format, format).unwrap();
        let mut output = AudioBufferList::for_format(&format, 64);
        let mut descriptions = [PacketDescription::default(); 4];

        let written = converter
            .fill(&mut pcm_input(3), 4, &mut output, Some(&mut descriptions))
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(descriptions[2], PacketDescription::new(4, 2));
        assert_eq!(descriptions[3], PacketDescription::default());
    }

    #[test]
    fn test_oversized_packet_is_held() {
        let source = AudioFormat::pcm_i16(8000, 1);
        let destination = AudioFormat::ulaw(8000, 1, 160);
        let mut converter = Converter::new(source, destination).unwrap();

        let mut mock = MockSource::new(8000, 1);
        mock.generate_sine(440.0, 40);
        let mut input = mock.into_packets(&source).unwrap();

        let mut small = AudioBufferList::for_format(&destination, 100);
        let err = converter.fill(&mut input, 1, &mut small, None).unwrap_err();
        assert!(matches!(err, ConverterError::InvalidOutputBuffer { .. }));
        assert!(converter.pending_packet.is_some());

        let mut large = AudioBufferList::for_format(&destination, 320);
        assert_eq!(converter.fill(&mut input, 2, &mut large, None).unwrap(), 2);
        assert_eq!(large.total_bytes(), 320);
        assert!(converter.pending_packet.is_none());
    }

    #[test]
    fn test_packet_that_does_not_fit_waits_for_next_call() {
        let source = AudioFormat::pcm_i16(8000, 1);
        let destination = AudioFormat::ulaw(8000, 1, 160);
        let mut converter = Converter::new(source, destination).unwrap();
        let mut input = pcm_input(480);

        let mut output = AudioBufferList::for_format(&destination, 250);
        assert_eq!(converter.fill(&mut input, 3, &mut output, None).unwrap(), 1);
        assert_eq!(output.total_bytes(), 160);
        assert_eq!(converter.fill(&mut input, 3, &mut output, None).unwrap(), 1);
        assert_eq!(converter.stats().frames_out, 320);
    }

    #[test]
    fn test_decode_errors_are_counted() {
        let source = AudioFormat::ulaw(8000, 2, 0);
        let destination = AudioFormat::pcm_i16(8000, 2);
        let mut converter = Converter::new(source, destination).unwrap();
        let mut output = AudioBufferList::for_format(&destination, 64);

        let mut sent = false;
        let mut input = input_fn(move |_| {
            if std::mem::replace(&mut sent, true) {
                return Ok(Input::EndOfStream);
            }
            Ok(Input::Packets(InputBatch::with_descriptions(
                vec![0xFFu8; 7],
                vec![PacketDescription::new(0, 3), PacketDescription::new(3, 4)],
            )))
        });

        assert_eq!(converter.fill(&mut input, 16, &mut output, None).unwrap(), 2);
        assert_eq!(converter.decode_error_count(), 1);
        assert_eq!(
            converter.get_property(PropertyId::DECODE_ERROR_COUNT).unwrap(),
            PropertyValue::U64(1)
        );
    }

    #[test]
    fn test_flush_before_any_input() {
        let mut converter =
            Converter::new(AudioFormat::pcm_i16(8000, 1), AudioFormat::ulaw(8000, 1, 160)).unwrap();
        assert!(converter.flush().is_ok());
        assert_eq!(converter.state, DriverState::Idle);
    }

    #[test]
    fn test_layouts_cached() {
        let converter =
            Converter::new(AudioFormat::pcm_i16(8000, 2), AudioFormat::pcm_i16(8000, 1)).unwrap();
        assert_eq!(converter.source_layout(), channel_layout(2));
        assert_eq!(converter.destination_layout(), channel_layout(1));
    }

    #[test]
    fn test_set_bit_rate_before_open() {
        let mut converter =
            Converter::new(AudioFormat::pcm_i16(8000, 1), AudioFormat::ulaw(8000, 1, 160)).unwrap();
        converter.set_bit_rate(32_000).unwrap();
        assert_eq!(converter.bit_rate(), Some(32_000));
        assert_eq!(converter.config().bit_rate, 32_000);
        assert!(matches!(
            converter.set_bit_rate(0),
            Err(ConverterError::InvalidPropertyValue { .. })
        ));
    }
}
