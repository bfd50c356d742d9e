use std::f64::consts::PI;

use std::collections::HashMap;
use std::sync::Arc;

use rustfft::{num_complex::Complex64, Fft, FftPlanner};

use crate::dsp::{PlotError, Point};

/// Hann weight for index `n` of a `len`-point window.
pub fn hann(n: usize, len: usize) -> f64 {
    if len < 2 {
        return 1.0;
    }
    0.5 * (1.0 - (2.0 * PI * n as f64 / (len - 1) as f64).cos())
}

/// Swaps the lower and upper halves so the zero bin lands in the middle.
/// Applying it twice restores the original order.
pub fn fftshift<T>(bins: &mut [T]) {
    let half = bins.len() / 2;
    for i in 0..half {
        bins.swap(i, i + half);
    }
}

/// Frequency of shifted bin `i` out of `len` bins.
///
/// The span is divided by `len - 1`, so both ends land exactly on
/// `-sample_rate / 2` and `+sample_rate / 2`.
pub fn bin_frequency(i: usize, len: usize, sample_rate: f64) -> f64 {
    sample_rate * i as f64 / (len - 1) as f64 - sample_rate / 2.0
}

/// Windowed power spectrum calculator. Keeps one FFT plan per size.
pub struct SpectrumEngine {
    plans: HashMap<usize, Arc<dyn Fft<f64>>>,
}

impl Default for SpectrumEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumEngine {
    pub fn new() -> Self {
        Self {
            plans: HashMap::new(),
        }
    }

    fn plan(&mut self, len: usize) -> Arc<dyn Fft<f64>> {
        self.plans
            .entry(len)
            .or_insert_with(|| FftPlanner::new().plan_fft_forward(len))
            .clone()
    }

    /// Applies a Hann window in place and returns the mean squared weight.
    pub fn apply_window(bins: &mut [Complex64]) -> f64 {
        let len = bins.len();
        let mut window_power = 0.0;
        for (n, bin) in bins.iter_mut().enumerate() {
            let w = hann(n, len);
            window_power += w * w;
            *bin *= w;
        }
        window_power / len as f64
    }

    /// Window, transform and convert `bins` to centered power in dB.
    pub fn power_spectrum(&mut self, bins: &mut [Complex64]) -> Result<Vec<f64>, PlotError> {
        let len = bins.len();
        if len < 2 {
            return Err(PlotError::InvalidWindowSize(len));
        }
        let window_power = Self::apply_window(bins);
        // A two-point Hann window is all zeros.
        if window_power <= 0.0 {
            return Err(PlotError::InvalidWindowSize(len));
        }

        let fft = self.plan(len);
        fft.process(bins);

        let offset = 20.0 * (len as f64).log10() + 10.0 * window_power.log10();
        let mut power: Vec<f64> = bins
            .iter()
            .map(|bin| 10.0 * bin.norm_sqr().max(f64::MIN_POSITIVE).log10() - offset)
            .collect();
        fftshift(&mut power);
        Ok(power)
    }

    /// Full pipeline from converted samples to `(frequency, dB)` points.
    pub fn spectrum_points(
        &mut self,
        bins: &mut [Complex64],
        sample_rate: f64,
    ) -> Result<Vec<Point>, PlotError> {
        let power = self.power_spectrum(bins)?;
        let len = power.len();
        Ok(power
            .into_iter()
            .enumerate()
            .map(|(i, db)| Point::new(bin_frequency(i, len, sample_rate), db))
            .collect())
    }
}
