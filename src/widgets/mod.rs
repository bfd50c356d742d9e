//! Plot and selector blocks plus the curve bookkeeping they share.

pub mod curves;
pub mod drop_down;
pub mod freq_plot;
pub mod render;
pub mod scheduler;
pub mod time_plot;

pub use curves::{
    default_curve_color, pastelize, CurveLayout, CurveRegistry, CurveSnapshot, PlotFrame, Rgb,
};
pub use drop_down::{parse_options, DropDown, SelectorOption};
pub use freq_plot::FreqDomainPlot;
pub use render::{render_frame_png, PlotStyle};
pub use scheduler::UpdateScheduler;
pub use time_plot::TimeDomainPlot;
