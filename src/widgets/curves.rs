use std::collections::BTreeMap;

use serde::Serialize;

use crate::dsp::{DType, PlotError, Point};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Hue in degrees, saturation and value in `[0, 1]`.
    pub fn to_hsv(self) -> (f64, f64, f64) {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let saturation = if max == 0.0 { 0.0 } else { delta / max };
        (hue, saturation, max)
    }

    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        let chroma = value * saturation;
        let sector = hue.rem_euclid(360.0) / 60.0;
        let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r, g, b) = match sector as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = value - chroma;
        let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::new(channel(r), channel(g), channel(b))
    }
}

/// Base curve colors, cycled by creation order.
pub const BASE_PALETTE: [Rgb; 12] = [
    Rgb::new(0, 0, 255),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 0, 128),
    Rgb::new(0, 128, 0),
    Rgb::new(128, 0, 0),
    Rgb::new(0, 128, 128),
    Rgb::new(128, 0, 128),
    Rgb::new(128, 128, 0),
];

pub fn default_curve_color(which: usize) -> Rgb {
    BASE_PALETTE[which % BASE_PALETTE.len()]
}

/// Same hue, saturation halved, value squeezed into the top quarter.
pub fn pastelize(color: Rgb) -> Rgb {
    let (hue, saturation, value) = color.to_hsv();
    let saturation = (saturation * 128.0).floor() / 255.0;
    let value = ((value * 64.0).floor() + 191.0) / 255.0;
    Rgb::from_hsv(hue, saturation, value)
}

#[derive(Clone, Debug)]
pub struct Curve {
    name: String,
    color: Rgb,
    points: Vec<Point>,
}

impl Curve {
    fn new(name: String) -> Self {
        Self {
            name,
            color: BASE_PALETTE[0],
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Replaces every point at once.
    pub fn set_samples(&mut self, points: Vec<Point>) {
        self.points = points;
    }

    pub fn snapshot(&self) -> CurveSnapshot {
        CurveSnapshot {
            name: self.name.clone(),
            color: self.color,
            points: self.points.clone(),
        }
    }
}

/// Immutable copy of a curve handed to the render layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CurveSnapshot {
    pub name: String,
    pub color: Rgb,
    pub points: Vec<Point>,
}

/// Everything the render layer needs to redraw one plot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlotFrame {
    pub title: String,
    pub legend: bool,
    pub curves: Vec<CurveSnapshot>,
}

/// How a channel maps onto curves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveLayout {
    /// One power curve per channel.
    Spectrum,
    /// One curve per real channel, `.Re`/`.Im` pair per complex channel.
    Components,
}

impl CurveLayout {
    fn curve_names(self, index: usize, dtype: DType) -> Vec<String> {
        match self {
            CurveLayout::Components if dtype.is_complex() => {
                vec![format!("Ch{index}.Re"), format!("Ch{index}.Im")]
            }
            _ => vec![format!("Ch{index}")],
        }
    }
}

pub struct Channel<B> {
    index: usize,
    dtype: DType,
    curves: Vec<Curve>,
    binding: B,
}

impl<B> Channel<B> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebuildSummary {
    pub channels: usize,
    pub curves: usize,
    pub legend: bool,
}

/// Channel index -> curves and converter binding. The worker is the only
/// writer; the render layer only ever sees [`PlotFrame`] copies.
pub struct CurveRegistry<B> {
    layout: CurveLayout,
    channels: BTreeMap<usize, Channel<B>>,
}

impl<B> CurveRegistry<B> {
    pub fn new(layout: CurveLayout) -> Self {
        Self {
            layout,
            channels: BTreeMap::new(),
        }
    }

    /// Drops every channel and rebinds from `inputs`. On failure the registry
    /// is left empty.
    pub fn rebuild<I, F>(&mut self, inputs: I, bind: F) -> Result<RebuildSummary, PlotError>
    where
        I: IntoIterator<Item = (usize, DType)>,
        F: Fn(DType) -> Result<B, PlotError>,
    {
        self.channels.clear();
        let mut fresh = BTreeMap::new();
        for (index, dtype) in inputs {
            let binding = bind(dtype)?;
            let curves = self
                .layout
                .curve_names(index, dtype)
                .into_iter()
                .map(Curve::new)
                .collect();
            fresh.insert(
                index,
                Channel {
                    index,
                    dtype,
                    curves,
                    binding,
                },
            );
        }

        let mut which = 0;
        for channel in fresh.values_mut() {
            for curve in &mut channel.curves {
                curve.color = pastelize(default_curve_color(which));
                which += 1;
            }
        }
        self.channels = fresh;
        Ok(RebuildSummary {
            channels: self.channels.len(),
            curves: which,
            legend: self.legend(),
        })
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// True when the registry holds exactly `inputs`, with the same types.
    pub fn is_built_for<I>(&self, inputs: I) -> bool
    where
        I: IntoIterator<Item = (usize, DType)>,
    {
        let mut count = 0;
        for (index, dtype) in inputs {
            match self.channels.get(&index) {
                Some(channel) if channel.dtype == dtype => count += 1,
                _ => return false,
            }
        }
        count > 0 && count == self.channels.len()
    }

    pub fn summary(&self) -> RebuildSummary {
        RebuildSummary {
            channels: self.channels.len(),
            curves: self.curve_count(),
            legend: self.legend(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn layout(&self) -> CurveLayout {
        self.layout
    }

    pub fn channel(&self, index: usize) -> Option<&Channel<B>> {
        self.channels.get(&index)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel<B>> {
        self.channels.values()
    }

    pub fn binding(&self, index: usize) -> Result<&B, PlotError> {
        self.channels
            .get(&index)
            .map(Channel::binding)
            .ok_or(PlotError::UnknownChannel(index))
    }

    /// Replaces the points of a channel's curves, one array per curve.
    pub fn set_points(&mut self, index: usize, traces: Vec<Vec<Point>>) -> Result<(), PlotError> {
        let channel = self
            .channels
            .get_mut(&index)
            .ok_or(PlotError::UnknownChannel(index))?;
        for (curve, points) in channel.curves.iter_mut().zip(traces) {
            curve.set_samples(points);
        }
        Ok(())
    }

    pub fn curve_count(&self) -> usize {
        self.channels.values().map(|c| c.curves.len()).sum()
    }

    /// A legend is shown once more than one channel is plotted.
    pub fn legend(&self) -> bool {
        self.channels.len() > 1
    }

    pub fn snapshot(&self, title: &str) -> PlotFrame {
        PlotFrame {
            title: title.to_string(),
            legend: self.legend(),
            curves: self
                .channels
                .values()
                .flat_map(|channel| channel.curves.iter().map(Curve::snapshot))
                .collect(),
        }
    }
}
