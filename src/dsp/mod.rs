//! Sample conversion, spectral analysis and the buffered input model the
//! plot blocks read from.

pub mod dtype;
pub mod error;
pub mod fft;
pub mod point;
pub mod port;
pub mod source;
pub mod timeseries;

pub use dtype::{converter_for, ConvertFn, Converter, DType, Sample, ScalarKind};
pub use error::PlotError;
pub use fft::{bin_frequency, fftshift, hann, SpectrumEngine};
pub use point::Point;
pub use port::{InputPort, InputPorts};
pub use source::{encode_sample, ManualSource, SampleBatch, SampleSource, ToneSource};
pub use timeseries::{curve_updater, recent_window, trace_points, CurveUpdater, POINTS_PER_PLOT};
