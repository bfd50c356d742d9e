use rustfft::num_complex::Complex64;

use crate::dsp::{converter_for, DType, PlotError, Point};

/// Samples shown per channel in the time view.
pub const POINTS_PER_PLOT: usize = 1024;

/// Builds the point arrays for one channel: `[values]` for real input,
/// `[real, imaginary]` for complex input.
pub type CurveUpdater = Box<dyn Fn(&[u8], usize, f64) -> Vec<Vec<Point>> + Send>;

/// Start and length of the most recent `min(available, limit)` elements.
pub fn recent_window(available: usize, limit: usize) -> (usize, usize) {
    let count = available.min(limit);
    (available - count, count)
}

/// Lays samples on an elapsed-time axis starting at zero.
pub fn trace_points(samples: &[Complex64], complex: bool, elem_rate: f64) -> Vec<Vec<Point>> {
    let time = |i: usize| i as f64 / elem_rate;
    let re = samples
        .iter()
        .enumerate()
        .map(|(i, s)| Point::new(time(i), s.re))
        .collect();
    if !complex {
        return vec![re];
    }
    let im = samples
        .iter()
        .enumerate()
        .map(|(i, s)| Point::new(time(i), s.im))
        .collect();
    vec![re, im]
}

/// Binds the converter for `dtype` into a per-channel updater.
pub fn curve_updater(dtype: DType) -> Result<CurveUpdater, PlotError> {
    let converter = converter_for(dtype)?;
    let complex = dtype.is_complex();
    Ok(Box::new(move |raw: &[u8], count: usize, elem_rate: f64| {
        let samples = converter.to_complex(raw, count);
        trace_points(&samples, complex, elem_rate)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::ScalarKind;

    #[test]
    fn window_keeps_the_newest_samples() {
        assert_eq!(recent_window(3000, POINTS_PER_PLOT), (3000 - 1024, 1024));
        assert_eq!(recent_window(10, POINTS_PER_PLOT), (0, 10));
        assert_eq!(recent_window(0, POINTS_PER_PLOT), (0, 0));
    }

    #[test]
    fn real_channel_yields_one_trace() {
        let updater = curve_updater(DType::Scalar(ScalarKind::Int16)).unwrap();
        let raw: Vec<u8> = bytemuck::cast_slice(&[3i16, -4, 5]).to_vec();
        let traces = updater(&raw, 3, 2.0);
        assert_eq!(traces.len(), 1);
        assert_eq!(
            traces[0],
            vec![Point::new(0.0, 3.0), Point::new(0.5, -4.0), Point::new(1.0, 5.0)]
        );
    }

    #[test]
    fn complex_channel_yields_real_and_imaginary() {
        let updater = curve_updater(DType::Complex(ScalarKind::Float32)).unwrap();
        let raw: Vec<u8> = bytemuck::cast_slice(&[1.0f32, -1.0, 2.0, -2.0]).to_vec();
        let traces = updater(&raw, 2, 4.0);
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0], vec![Point::new(0.0, 1.0), Point::new(0.25, 2.0)]);
        assert_eq!(traces[1], vec![Point::new(0.0, -1.0), Point::new(0.25, -2.0)]);
    }

    #[test]
    fn unsupported_channel_has_no_updater() {
        assert!(matches!(
            curve_updater(DType::Scalar(ScalarKind::Bool)),
            Err(PlotError::UnsupportedType(_))
        ));
    }
}
