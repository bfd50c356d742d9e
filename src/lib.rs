//! Streaming spectrum and oscilloscope plot blocks, plus a drop-down value
//! selector, each driven by its own worker thread.

pub mod config;
pub mod dsp;
pub mod engine;
pub mod types;
pub mod widgets;

pub use engine::{spawn_worker, Block, Control, Receipt, WorkerHandle};
