use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat};
use plotters::prelude::*;

use crate::dsp::PlotError;
use crate::widgets::{PlotFrame, Rgb};

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: Rgb,
    pub margin: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: Rgb::new(10, 10, 10),
            margin: 10,
        }
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        (-1.0, 1.0)
    } else if (hi - lo).abs() < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

fn rgb(color: Rgb) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

/// Draws every curve of `frame` into a PNG. Axes auto-fit the finite points.
pub fn render_frame_png(frame: &PlotFrame, style: &PlotStyle) -> Result<Vec<u8>, PlotError> {
    if frame.curves.iter().all(|c| c.points.is_empty()) {
        return Err(PlotError::Plot(format!("{:?} has nothing to draw", frame.title)));
    }
    let points = || frame.curves.iter().flat_map(|c| c.points.iter());
    let (x_min, x_max) = bounds(points().map(|p| p.x));
    let (y_min, y_max) = bounds(points().map(|p| p.y));

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&rgb(style.background))?;
        let mut chart = ChartBuilder::on(&root)
            .margin(style.margin)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        for curve in &frame.curves {
            let series = curve
                .points
                .iter()
                .filter(|p| p.x.is_finite() && p.y.is_finite())
                .map(|p| (p.x, p.y));
            chart.draw_series(LineSeries::new(series, &rgb(curve.color)))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PlotError> {
    let image = ImageBuffer::<image::Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| PlotError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
