// src/main.rs
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};
use serde_json::json;

use streamscope::config::AppConfig;
use streamscope::dsp::{ManualSource, ToneSource};
use streamscope::spawn_worker;
use streamscope::types::{
    DropDownCommand, EventSink, FreqPlotCommand, PlotEvent, TimePlotCommand, WidgetEvent,
};
use streamscope::widgets::{render_frame_png, DropDown, FreqDomainPlot, PlotStyle, TimeDomainPlot};

#[derive(Parser)]
#[command(name = "streamscope", version, about = "Render live spectrum and scope frames of generated tones")]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// How long to run
    #[arg(long)]
    seconds: Option<f64>,
    /// Directory receiving one PNG per plot
    #[arg(long)]
    out: Option<PathBuf>,
}

fn tone_source(config: &AppConfig) -> ToneSource {
    config
        .channels
        .iter()
        .fold(
            ToneSource::new(config.sample_rate, config.batch_len),
            |source, channel| source.with_channel(channel.dtype, channel.freq_hz, channel.amplitude),
        )
        .with_noise(config.noise)
        .realtime()
}

// Stands in for the GUI thread: keeps the newest frame of every plot on disk.
fn spawn_renderer(rx: Receiver<WidgetEvent>, dir: PathBuf) -> JoinHandle<usize> {
    thread::spawn(move || {
        let style = PlotStyle::default();
        let mut written = 0;
        for WidgetEvent { widget, event } in rx {
            match event {
                PlotEvent::Replot(frame) => {
                    let path = dir.join(format!("{widget}.png"));
                    match render_frame_png(&frame, &style) {
                        Ok(png) => match fs::write(&path, png) {
                            Ok(()) => written += 1,
                            Err(err) => warn!("{widget}: writing {}: {err}", path.display()),
                        },
                        Err(err) => warn!("{widget}: {err}"),
                    }
                }
                PlotEvent::InstallLegend => info!("{widget}: legend installed"),
                PlotEvent::TitleChanged(markup) => info!("{widget}: title {markup}"),
                PlotEvent::ValueChanged(value) => info!("{widget}: value {value}"),
            }
        }
        written
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(seconds) = cli.seconds {
        config.run_seconds = seconds;
    }
    if let Some(out) = cli.out {
        config.output_dir = out;
    }
    config.freq.sample_rate = config.sample_rate;
    config.time.sample_rate = config.sample_rate;
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    let (tx, rx) = channel();
    let renderer = spawn_renderer(rx, config.output_dir.clone());
    let dtypes = config.dtypes();

    let freq = spawn_worker(
        "freq",
        FreqDomainPlot::new(&config.freq, EventSink::new("freq", tx.clone()))?,
        &dtypes,
        Box::new(tone_source(&config)),
    );
    let time = spawn_worker(
        "time",
        TimeDomainPlot::new(&config.time, EventSink::new("time", tx.clone()))?,
        &dtypes,
        Box::new(tone_source(&config)),
    );
    let menu = spawn_worker(
        "menu",
        DropDown::from_config(&config.drop_down, EventSink::new("menu", tx.clone()))?,
        &[],
        Box::new(ManualSource::empty()),
    );
    drop(tx);

    freq.activate().context("activating frequency plot")?;
    time.activate().context("activating time plot")?;
    time.call(TimePlotCommand::SetupCurves)
        .context("building time plot curves")?;
    menu.activate().context("activating selector")?;
    info!("running for {:.1} s", config.run_seconds);

    let half = Duration::from_secs_f64(config.run_seconds.max(0.0) / 2.0);
    thread::sleep(half);
    let receipts = [
        freq.send(FreqPlotCommand::SetNumFftBins(config.freq.num_fft_bins / 2)),
        freq.send(FreqPlotCommand::SetTitle(format!("{} (half size)", config.freq.title))),
    ];
    for receipt in receipts {
        if let Err(err) = receipt.wait() {
            warn!("freq: {err}");
        }
    }
    if let Err(err) = menu.call(DropDownCommand::SetValue(json!("xyz"))) {
        warn!("menu: {err}");
    }
    thread::sleep(half);

    freq.shutdown()?;
    time.shutdown()?;
    menu.shutdown()?;
    let written = renderer
        .join()
        .map_err(|_| anyhow!("render thread panicked"))?;
    info!("wrote {written} frame(s) to {}", config.output_dir.display());
    Ok(())
}
