use thiserror::Error;

use crate::dsp::DType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlotError {
    #[error("element type {0} has no registered converter")]
    UnsupportedType(DType),
    #[error("invalid option format: {0}")]
    InvalidOptionFormat(String),
    #[error("window size {0} is too small for a Hann-windowed FFT")]
    InvalidWindowSize(usize),
    #[error("display rate must be positive and finite, got {0}")]
    InvalidDisplayRate(f64),
    #[error("sample rate {0} is out of range")]
    InvalidSampleRate(f64),
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("no channel bound at index {0}")]
    UnknownChannel(usize),
    #[error("unknown element type name {0:?}")]
    UnknownTypeName(String),
    #[error("worker is no longer running")]
    WorkerStopped,
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PlotError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PlotError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for PlotError {
    fn from(value: image::ImageError) -> Self {
        PlotError::Plot(value.to_string())
    }
}
