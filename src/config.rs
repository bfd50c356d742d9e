use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dsp::{DType, PlotError, ScalarKind};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreqPlotConfig {
    pub title: String,
    pub display_rate: f64,
    pub sample_rate: f64,
    pub num_fft_bins: usize,
}

impl Default for FreqPlotConfig {
    fn default() -> Self {
        Self {
            title: "Frequency Domain".into(),
            display_rate: 10.0,
            sample_rate: 1.0,
            num_fft_bins: 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimePlotConfig {
    pub title: String,
    pub display_rate: f64,
    pub sample_rate: f64,
}

impl Default for TimePlotConfig {
    fn default() -> Self {
        Self {
            title: "Time Domain".into(),
            display_rate: 10.0,
            sample_rate: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropDownConfig {
    pub title: String,
    pub value: Value,
    /// `[label, value]` pairs.
    pub options: Vec<Value>,
}

impl Default for DropDownConfig {
    fn default() -> Self {
        Self {
            title: "My Menu Value".into(),
            value: json!(42),
            options: vec![json!(["Opt0", 42]), json!(["Opt1", "xyz"])],
        }
    }
}

/// One generated test tone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub dtype: DType,
    pub freq_hz: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

fn default_amplitude() -> f64 {
    100.0
}

/// Demo setup. `sample_rate` drives the tone source and both plots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sample_rate: f64,
    pub batch_len: usize,
    pub noise: f64,
    pub channels: Vec<ChannelConfig>,
    pub freq: FreqPlotConfig,
    pub time: TimePlotConfig,
    pub drop_down: DropDownConfig,
    pub run_seconds: f64,
    pub output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let sample_rate = 48_000.0;
        Self {
            sample_rate,
            batch_len: 512,
            noise: 1.0,
            channels: vec![
                ChannelConfig {
                    dtype: DType::Scalar(ScalarKind::Int16),
                    freq_hz: 1_000.0,
                    amplitude: default_amplitude(),
                },
                ChannelConfig {
                    dtype: DType::Complex(ScalarKind::Float32),
                    freq_hz: -6_000.0,
                    amplitude: default_amplitude(),
                },
            ],
            freq: FreqPlotConfig {
                sample_rate,
                ..FreqPlotConfig::default()
            },
            time: TimePlotConfig {
                sample_rate,
                ..TimePlotConfig::default()
            },
            drop_down: DropDownConfig::default(),
            run_seconds: 3.0,
            output_dir: PathBuf::from("frames"),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlotError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(PlotError::InvalidSampleRate(self.sample_rate));
        }
        Ok(())
    }

    pub fn dtypes(&self) -> Vec<DType> {
        self.channels.iter().map(|c| c.dtype).collect()
    }
}
