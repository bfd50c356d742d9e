use std::time::Instant;

use log::{debug, info};

use crate::config::FreqPlotConfig;
use crate::dsp::{
    converter_for, recent_window, Converter, InputPorts, PlotError, Point, SpectrumEngine,
};
use crate::engine::Block;
use crate::types::{EventSink, FreqPlotCommand, PlotEvent};
use crate::widgets::curves::{CurveLayout, CurveRegistry, PlotFrame, RebuildSummary};
use crate::widgets::UpdateScheduler;

/// Power spectrum plot: one Hann-windowed FFT curve per input channel.
pub struct FreqDomainPlot {
    title: String,
    sample_rate: f64,
    num_fft_bins: usize,
    scheduler: UpdateScheduler,
    engine: SpectrumEngine,
    registry: CurveRegistry<Converter>,
    events: EventSink,
}

impl FreqDomainPlot {
    pub fn new(config: &FreqPlotConfig, events: EventSink) -> Result<Self, PlotError> {
        let mut plot = Self {
            title: config.title.clone(),
            sample_rate: 1.0,
            num_fft_bins: config.num_fft_bins,
            scheduler: UpdateScheduler::new(config.display_rate)?,
            engine: SpectrumEngine::new(),
            registry: CurveRegistry::new(CurveLayout::Spectrum),
            events,
        };
        plot.set_sample_rate(config.sample_rate)?;
        Ok(plot)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
    }

    pub fn display_rate(&self) -> f64 {
        self.scheduler.display_rate()
    }

    pub fn set_display_rate(&mut self, rate: f64) -> Result<(), PlotError> {
        self.scheduler.set_display_rate(rate)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Zero is accepted and collapses the frequency axis.
    pub fn set_sample_rate(&mut self, rate: f64) -> Result<(), PlotError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(PlotError::InvalidSampleRate(rate));
        }
        self.sample_rate = rate;
        Ok(())
    }

    pub fn num_fft_bins(&self) -> usize {
        self.num_fft_bins
    }

    /// Also asks every port to hold a full FFT's worth of elements.
    pub fn set_num_fft_bins(&mut self, ports: &mut InputPorts, bins: usize) {
        self.num_fft_bins = bins;
        for port in ports.iter_mut() {
            port.set_reserve(bins);
        }
    }

    pub fn setup_curves(&mut self, ports: &InputPorts) -> Result<RebuildSummary, PlotError> {
        let summary = self.registry.rebuild(
            ports.iter().map(|port| (port.index(), port.dtype())),
            converter_for,
        )?;
        info!(
            "{}: {} spectrum curve(s) for {} channel(s)",
            self.events.widget(),
            summary.curves,
            summary.channels
        );
        if summary.legend {
            self.events.emit(PlotEvent::InstallLegend);
        }
        Ok(summary)
    }

    pub fn frame(&self) -> PlotFrame {
        self.registry.snapshot(&self.title)
    }

    fn channel_points(
        &mut self,
        ports: &InputPorts,
        available: usize,
    ) -> Result<Vec<(usize, Vec<Point>)>, PlotError> {
        // Newest samples of the cycle's window, matching the time plot.
        let (start, count) = recent_window(available, self.num_fft_bins);
        let mut updates = Vec::with_capacity(ports.len());
        for port in ports.iter() {
            let converter = *self.registry.binding(port.index())?;
            let mut bins = converter.to_complex(port.window(start, count), count);
            let points = self.engine.spectrum_points(&mut bins, self.sample_rate)?;
            updates.push((port.index(), points));
        }
        Ok(updates)
    }
}

impl Block for FreqDomainPlot {
    type Command = FreqPlotCommand;

    fn activate(&mut self, ports: &mut InputPorts) -> Result<(), PlotError> {
        self.set_num_fft_bins(ports, self.num_fft_bins);
        self.scheduler.reset();
        self.setup_curves(ports).map(|_| ())
    }

    fn deactivate(&mut self) {
        self.registry.clear();
    }

    fn apply(&mut self, ports: &mut InputPorts, command: FreqPlotCommand) -> Result<(), PlotError> {
        match command {
            FreqPlotCommand::SetTitle(title) => self.set_title(title),
            FreqPlotCommand::SetDisplayRate(rate) => self.set_display_rate(rate)?,
            FreqPlotCommand::SetSampleRate(rate) => self.set_sample_rate(rate)?,
            FreqPlotCommand::SetNumFftBins(bins) => self.set_num_fft_bins(ports, bins),
            FreqPlotCommand::SetupCurves => {
                self.setup_curves(ports)?;
            }
        }
        Ok(())
    }

    fn work(&mut self, ports: &mut InputPorts, now: Instant) -> Result<(), PlotError> {
        let do_update = self.scheduler.due(now) && !self.registry.is_empty();
        let nsamps = ports.min_elements();

        // Every channel is computed before any curve changes, so a failing
        // channel leaves the previous frame intact.
        let updates = if do_update {
            self.scheduler.mark(now);
            Some(self.channel_points(ports, nsamps))
        } else {
            None
        };

        for port in ports.iter_mut() {
            port.consume(nsamps);
        }

        if let Some(updates) = updates {
            for (index, points) in updates? {
                self.registry.set_points(index, vec![points])?;
            }
            debug!("{}: replot from {} samples", self.events.widget(), nsamps);
            self.events.emit(PlotEvent::Replot(self.frame()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{DType, ScalarKind};
    use crate::types::WidgetEvent;
    use std::f64::consts::PI;
    use std::sync::mpsc::{channel, Receiver};
    use std::time::Duration;

    fn plot_with(config: FreqPlotConfig) -> (FreqDomainPlot, Receiver<WidgetEvent>) {
        let (tx, rx) = channel();
        let plot = FreqDomainPlot::new(&config, EventSink::new("fft", tx)).unwrap();
        (plot, rx)
    }

    fn config(bins: usize) -> FreqPlotConfig {
        FreqPlotConfig {
            title: "Spectrum".into(),
            display_rate: 10.0,
            sample_rate: 1000.0,
            num_fft_bins: bins,
        }
    }

    fn replots(rx: &Receiver<WidgetEvent>) -> Vec<PlotFrame> {
        rx.try_iter()
            .filter_map(|e| match e.event {
                PlotEvent::Replot(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn activation_sets_reserve_and_legend() {
        let (mut plot, rx) = plot_with(config(64));
        let mut ports = InputPorts::from_dtypes(&[
            DType::Scalar(ScalarKind::Int32),
            DType::Complex(ScalarKind::Float32),
        ]);
        plot.activate(&mut ports).unwrap();
        assert!(ports.iter().all(|p| p.reserve() == 64));
        let events: Vec<PlotEvent> = rx.try_iter().map(|e| e.event).collect();
        assert_eq!(events, vec![PlotEvent::InstallLegend]);
        assert_eq!(plot.frame().curves.len(), 2);
    }

    #[test]
    fn single_channel_has_no_legend() {
        let (mut plot, rx) = plot_with(config(64));
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Int32)]);
        plot.activate(&mut ports).unwrap();
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn unsupported_input_fails_activation() {
        let (mut plot, _rx) = plot_with(config(64));
        let mut ports = InputPorts::from_dtypes(&[DType::Opaque { size: 3 }]);
        assert_eq!(
            plot.activate(&mut ports).unwrap_err(),
            PlotError::UnsupportedType(DType::Opaque { size: 3 })
        );
        assert!(plot.frame().curves.is_empty());
    }

    #[test]
    fn work_plots_fft_size_points_and_consumes_everything() {
        let (mut plot, rx) = plot_with(config(128));
        let mut ports = InputPorts::from_dtypes(&[DType::Complex(ScalarKind::Float64)]);
        plot.activate(&mut ports).unwrap();
        let tone: Vec<f64> = (0..300)
            .flat_map(|n| {
                let phase = 2.0 * PI * 125.0 * n as f64 / 1000.0;
                [phase.cos(), phase.sin()]
            })
            .collect();
        ports.get_mut(0).unwrap().push(&tone);

        plot.work(&mut ports, Instant::now()).unwrap();
        assert_eq!(ports.get(0).unwrap().elements(), 0);
        assert_eq!(ports.get(0).unwrap().total_consumed(), 300);

        let frames = replots(&rx);
        assert_eq!(frames.len(), 1);
        let points = &frames[0].curves[0].points;
        assert_eq!(points.len(), 128);
        let top = points
            .iter()
            .copied()
            .fold(Point::new(0.0, f64::NEG_INFINITY), |a, b| if b.y > a.y { b } else { a });
        assert!((top.x - 125.0).abs() <= 1000.0 / 127.0);
    }

    #[test]
    fn skipped_cycles_still_consume() {
        let (mut plot, rx) = plot_with(config(16));
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Int16)]);
        plot.activate(&mut ports).unwrap();
        let start = Instant::now();
        for step in 0..5u64 {
            ports.begin_cycle();
            ports.get_mut(0).unwrap().push(&[1i16; 40]);
            plot.work(&mut ports, start + Duration::from_millis(step * 10))
                .unwrap();
            assert_eq!(ports.get(0).unwrap().consume_calls(), 1);
            assert_eq!(ports.get(0).unwrap().elements(), 0);
        }
        assert_eq!(replots(&rx).len(), 1);
        assert_eq!(ports.get(0).unwrap().total_consumed(), 200);
    }

    #[test]
    fn tiny_window_aborts_cycle_but_keeps_frame() {
        let (mut plot, rx) = plot_with(config(32));
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Float32)]);
        plot.activate(&mut ports).unwrap();
        ports.get_mut(0).unwrap().push(&[0.5f32; 32]);
        let start = Instant::now();
        plot.work(&mut ports, start).unwrap();
        let before = plot.frame();
        assert_eq!(before.curves[0].points.len(), 32);
        rx.try_iter().count();

        plot.apply(&mut ports, FreqPlotCommand::SetNumFftBins(1)).unwrap();
        ports.get_mut(0).unwrap().push(&[0.5f32; 8]);
        let err = plot.work(&mut ports, start + Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, PlotError::InvalidWindowSize(1));
        assert_eq!(ports.get(0).unwrap().elements(), 0);
        assert_eq!(plot.frame(), before);
        assert!(replots(&rx).is_empty());
    }

    #[test]
    fn tiny_display_rate_plots_once() {
        let (mut plot, rx) = plot_with(FreqPlotConfig {
            display_rate: 1e-20,
            ..config(16)
        });
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Float32)]);
        plot.activate(&mut ports).unwrap();
        let start = Instant::now();
        for step in 0..3u64 {
            ports.get_mut(0).unwrap().push(&[0.25f32; 16]);
            plot.work(&mut ports, start + Duration::from_secs(step)).unwrap();
        }
        assert_eq!(replots(&rx).len(), 1);
        assert_eq!(ports.get(0).unwrap().total_consumed(), 48);
    }

    #[test]
    fn rejects_bad_rates() {
        let (mut plot, _rx) = plot_with(config(32));
        let mut ports = InputPorts::default();
        assert!(plot
            .apply(&mut ports, FreqPlotCommand::SetSampleRate(-1.0))
            .is_err());
        assert!(plot
            .apply(&mut ports, FreqPlotCommand::SetDisplayRate(0.0))
            .is_err());
        plot.apply(&mut ports, FreqPlotCommand::SetSampleRate(0.0)).unwrap();
        assert_eq!(plot.sample_rate(), 0.0);
        assert_eq!(plot.display_rate(), 10.0);
    }
}
