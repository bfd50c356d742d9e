use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::{Instant, SystemTime};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex64;

use crate::dsp::{DType, InputPorts, PlotError, ScalarKind};

/// One batch of raw samples, one native-endian byte vector per channel.
#[derive(Clone, Debug)]
pub struct SampleBatch {
    pub started_at: SystemTime,
    pub channels: Vec<Vec<u8>>,
}

impl SampleBatch {
    pub fn new(channels: Vec<Vec<u8>>) -> Self {
        Self {
            started_at: SystemTime::now(),
            channels,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Appends each channel's bytes to the matching port.
    pub fn deliver(&self, ports: &mut InputPorts) -> Result<(), PlotError> {
        if self.num_channels() != ports.len() {
            return Err(PlotError::ChannelMismatch {
                expected: ports.len(),
                actual: self.num_channels(),
            });
        }
        for (port, raw) in ports.iter_mut().zip(&self.channels) {
            port.push_raw(raw);
        }
        Ok(())
    }
}

/// Something that can yield sample batches on demand.
pub trait SampleSource: Send {
    fn next_batch(&mut self) -> Result<Option<SampleBatch>, PlotError>;
}

/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<SampleBatch>,
}

impl ManualSource {
    pub fn new(batches: impl IntoIterator<Item = SampleBatch>) -> Self {
        Self {
            queue: batches.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl SampleSource for ManualSource {
    fn next_batch(&mut self) -> Result<Option<SampleBatch>, PlotError> {
        Ok(self.queue.pop_front())
    }
}

fn push_scalar(kind: ScalarKind, value: f64, out: &mut Vec<u8>) {
    match kind {
        ScalarKind::Float64 => out.extend_from_slice(&value.to_ne_bytes()),
        ScalarKind::Float32 => out.extend_from_slice(&(value as f32).to_ne_bytes()),
        ScalarKind::Int64 => out.extend_from_slice(&(value as i64).to_ne_bytes()),
        ScalarKind::Uint64 => out.extend_from_slice(&(value as u64).to_ne_bytes()),
        ScalarKind::Int32 => out.extend_from_slice(&(value as i32).to_ne_bytes()),
        ScalarKind::Uint32 => out.extend_from_slice(&(value as u32).to_ne_bytes()),
        ScalarKind::Int16 => out.extend_from_slice(&(value as i16).to_ne_bytes()),
        ScalarKind::Uint16 => out.extend_from_slice(&(value as u16).to_ne_bytes()),
        ScalarKind::Int8 | ScalarKind::Char => out.extend_from_slice(&(value as i8).to_ne_bytes()),
        ScalarKind::Uint8 => out.push(value as u8),
        ScalarKind::Bool => out.push(u8::from(value != 0.0)),
    }
}

/// Appends `value` to `out` in the layout of `dtype`, saturating integers.
pub fn encode_sample(dtype: DType, value: Complex64, out: &mut Vec<u8>) -> Result<(), PlotError> {
    match dtype {
        DType::Scalar(kind) => push_scalar(kind, value.re, out),
        DType::Complex(kind) => {
            push_scalar(kind, value.re, out);
            push_scalar(kind, value.im, out);
        }
        DType::Opaque { .. } => return Err(PlotError::UnsupportedType(dtype)),
    }
    Ok(())
}

fn is_unsigned(dtype: DType) -> bool {
    matches!(
        dtype,
        DType::Scalar(ScalarKind::Uint64 | ScalarKind::Uint32 | ScalarKind::Uint16 | ScalarKind::Uint8)
            | DType::Complex(
                ScalarKind::Uint64 | ScalarKind::Uint32 | ScalarKind::Uint16 | ScalarKind::Uint8
            )
    )
}

#[derive(Clone, Debug)]
struct ToneChannel {
    dtype: DType,
    freq_hz: f64,
    amplitude: f64,
}

/// Generates one sinusoid per channel, encoded in each channel's element type.
/// Real channels carry a cosine, complex channels a complex exponential.
pub struct ToneSource {
    sample_rate: f64,
    batch_len: usize,
    noise: f64,
    channels: Vec<ToneChannel>,
    sample_index: u64,
    rng: StdRng,
    started: Option<Instant>,
    realtime: bool,
}

impl ToneSource {
    pub fn new(sample_rate: f64, batch_len: usize) -> Self {
        Self {
            sample_rate,
            batch_len,
            noise: 0.0,
            channels: Vec::new(),
            sample_index: 0,
            rng: StdRng::seed_from_u64(0x5eed),
            started: None,
            realtime: false,
        }
    }

    /// Only hand out batches once the wall clock has caught up with them.
    pub fn realtime(mut self) -> Self {
        self.realtime = true;
        self
    }

    pub fn with_channel(mut self, dtype: DType, freq_hz: f64, amplitude: f64) -> Self {
        self.channels.push(ToneChannel {
            dtype,
            freq_hz,
            amplitude,
        });
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.abs();
        self
    }

    pub fn dtypes(&self) -> Vec<DType> {
        self.channels.iter().map(|c| c.dtype).collect()
    }

    fn next_value(&mut self, channel: usize, n: u64) -> Complex64 {
        let tone = &self.channels[channel];
        let phase = 2.0 * PI * tone.freq_hz * n as f64 / self.sample_rate;
        let mut value = Complex64::from_polar(tone.amplitude, phase);
        if !tone.dtype.is_complex() {
            value.im = 0.0;
        }
        if is_unsigned(tone.dtype) {
            value += Complex64::new(tone.amplitude, tone.amplitude);
        }
        if self.noise > 0.0 {
            value += Complex64::new(
                self.rng.gen_range(-self.noise..self.noise),
                self.rng.gen_range(-self.noise..self.noise),
            );
        }
        value
    }
}

impl SampleSource for ToneSource {
    fn next_batch(&mut self) -> Result<Option<SampleBatch>, PlotError> {
        if self.realtime {
            let started = *self.started.get_or_insert_with(Instant::now);
            let due = (started.elapsed().as_secs_f64() * self.sample_rate) as u64;
            if due < self.sample_index + self.batch_len as u64 {
                return Ok(None);
            }
        }
        let mut channels = Vec::with_capacity(self.channels.len());
        for channel in 0..self.channels.len() {
            let dtype = self.channels[channel].dtype;
            let mut raw = Vec::with_capacity(self.batch_len * dtype.size());
            for offset in 0..self.batch_len as u64 {
                let value = self.next_value(channel, self.sample_index + offset);
                encode_sample(dtype, value, &mut raw)?;
            }
            channels.push(raw);
        }
        self.sample_index += self.batch_len as u64;
        Ok(Some(SampleBatch::new(channels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::converter_for;

    #[test]
    fn manual_source_drains_in_order() {
        let mut source = ManualSource::new(vec![
            SampleBatch::new(vec![vec![1u8]]),
            SampleBatch::new(vec![vec![2u8]]),
        ]);
        assert_eq!(source.next_batch().unwrap().unwrap().channels, vec![vec![1u8]]);
        assert_eq!(source.next_batch().unwrap().unwrap().channels, vec![vec![2u8]]);
        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn batches_must_match_port_count() {
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Uint8)]);
        let batch = SampleBatch::new(vec![vec![1u8], vec![2u8]]);
        assert_eq!(
            batch.deliver(&mut ports).unwrap_err(),
            PlotError::ChannelMismatch {
                expected: 1,
                actual: 2
            }
        );
        SampleBatch::new(vec![vec![7u8, 8]]).deliver(&mut ports).unwrap();
        assert_eq!(ports.min_elements(), 2);
    }

    #[test]
    fn tones_encode_into_each_dtype() {
        let dtypes = [
            DType::Scalar(ScalarKind::Int16),
            DType::Complex(ScalarKind::Float32),
            DType::Scalar(ScalarKind::Uint8),
        ];
        let mut source = ToneSource::new(1000.0, 16);
        for dtype in dtypes {
            source = source.with_channel(dtype, 125.0, 100.0);
        }
        let batch = source.next_batch().unwrap().unwrap();
        for (dtype, raw) in dtypes.iter().zip(&batch.channels) {
            assert_eq!(raw.len(), 16 * dtype.size());
            let values = converter_for(*dtype).unwrap().to_complex(raw, 16);
            assert!((values[0].re - if is_unsigned(*dtype) { 200.0 } else { 100.0 }).abs() < 1.0);
        }
        let next = source.next_batch().unwrap().unwrap();
        assert_ne!(next.channels[0], batch.channels[0]);
    }

    #[test]
    fn realtime_source_waits_for_the_clock() {
        let mut source = ToneSource::new(1000.0, 10_000)
            .with_channel(DType::Scalar(ScalarKind::Float32), 50.0, 1.0)
            .realtime();
        assert!(source.next_batch().unwrap().is_none());
    }

    #[test]
    fn opaque_elements_cannot_be_encoded() {
        let mut raw = Vec::new();
        assert!(encode_sample(DType::Opaque { size: 4 }, Complex64::new(1.0, 0.0), &mut raw).is_err());
    }
}
