use std::time::Instant;

use log::{debug, info, warn};

use crate::config::TimePlotConfig;
use crate::dsp::{
    converter_for, curve_updater, recent_window, CurveUpdater, InputPorts, PlotError, Point,
    POINTS_PER_PLOT,
};
use crate::engine::Block;
use crate::types::{EventSink, PlotEvent, TimePlotCommand};
use crate::widgets::curves::{CurveLayout, CurveRegistry, PlotFrame, RebuildSummary};
use crate::widgets::UpdateScheduler;

/// Oscilloscope-style plot of the newest samples on each channel.
pub struct TimeDomainPlot {
    title: String,
    sample_rate: f64,
    scheduler: UpdateScheduler,
    registry: CurveRegistry<CurveUpdater>,
    needs_setup: bool,
    events: EventSink,
}

impl TimeDomainPlot {
    pub fn new(config: &TimePlotConfig, events: EventSink) -> Result<Self, PlotError> {
        let mut plot = Self {
            title: config.title.clone(),
            sample_rate: 1.0,
            scheduler: UpdateScheduler::new(config.display_rate)?,
            registry: CurveRegistry::new(CurveLayout::Components),
            needs_setup: true,
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

    /// The time axis divides by this, so it must be positive.
    pub fn set_sample_rate(&mut self, rate: f64) -> Result<(), PlotError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlotError::InvalidSampleRate(rate));
        }
        self.sample_rate = rate;
        Ok(())
    }

    /// Builds curves for `ports`. Curves already built for the same inputs
    /// are kept as they are.
    pub fn setup_curves(&mut self, ports: &InputPorts) -> Result<RebuildSummary, PlotError> {
        self.needs_setup = false;
        let inputs = || ports.iter().map(|port| (port.index(), port.dtype()));
        if self.registry.is_built_for(inputs()) {
            return Ok(self.registry.summary());
        }
        let summary = self.registry.rebuild(inputs(), curve_updater)?;
        info!(
            "{}: {} trace(s) for {} channel(s)",
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

    fn channel_traces(
        &self,
        ports: &InputPorts,
        available: usize,
    ) -> Result<Vec<(usize, Vec<Vec<Point>>)>, PlotError> {
        let (start, count) = recent_window(available, POINTS_PER_PLOT);
        ports
            .iter()
            .map(|port| {
                let updater = self.registry.binding(port.index())?;
                Ok((
                    port.index(),
                    updater(port.window(start, count), count, self.sample_rate),
                ))
            })
            .collect()
    }
}

impl Block for TimeDomainPlot {
    type Command = TimePlotCommand;

    /// Curves are built on the first cycle, but every input type is checked here.
    fn activate(&mut self, ports: &mut InputPorts) -> Result<(), PlotError> {
        self.registry.clear();
        self.scheduler.reset();
        for port in ports.iter() {
            converter_for(port.dtype())?;
        }
        for port in ports.iter_mut() {
            port.set_reserve(POINTS_PER_PLOT);
        }
        self.needs_setup = true;
        Ok(())
    }

    fn deactivate(&mut self) {
        self.registry.clear();
    }

    fn apply(&mut self, ports: &mut InputPorts, command: TimePlotCommand) -> Result<(), PlotError> {
        match command {
            TimePlotCommand::SetTitle(title) => self.set_title(title),
            TimePlotCommand::SetDisplayRate(rate) => self.set_display_rate(rate)?,
            TimePlotCommand::SetSampleRate(rate) => self.set_sample_rate(rate)?,
            TimePlotCommand::SetupCurves => {
                self.setup_curves(ports)?;
            }
        }
        Ok(())
    }

    fn work(&mut self, ports: &mut InputPorts, now: Instant) -> Result<(), PlotError> {
        let setup = if self.needs_setup {
            self.setup_curves(ports).map(|_| ())
        } else {
            Ok(())
        };
        if let Err(err) = &setup {
            warn!("{}: curve setup failed: {err}", self.events.widget());
        }

        let do_update = setup.is_ok() && self.scheduler.due(now) && !self.registry.is_empty();
        let nsamps = ports.min_elements();
        let traces = if do_update {
            self.scheduler.mark(now);
            Some(self.channel_traces(ports, nsamps))
        } else {
            None
        };

        for port in ports.iter_mut() {
            port.consume(nsamps);
        }
        setup?;

        if let Some(traces) = traces {
            for (index, channel_traces) in traces? {
                self.registry.set_points(index, channel_traces)?;
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
    use std::sync::mpsc::{channel, Receiver};
    use std::time::Duration;

    fn plot() -> (TimeDomainPlot, Receiver<WidgetEvent>) {
        let (tx, rx) = channel();
        let config = TimePlotConfig {
            title: "Scope".into(),
            display_rate: 20.0,
            sample_rate: 1000.0,
        };
        (TimeDomainPlot::new(&config, EventSink::new("scope", tx)).unwrap(), rx)
    }

    fn last_frame(rx: &Receiver<WidgetEvent>) -> Option<PlotFrame> {
        rx.try_iter()
            .filter_map(|e| match e.event {
                PlotEvent::Replot(frame) => Some(frame),
                _ => None,
            })
            .last()
    }

    #[test]
    fn activation_reserves_a_full_plot() {
        let (mut plot, _rx) = plot();
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Uint16)]);
        plot.activate(&mut ports).unwrap();
        assert_eq!(ports.get(0).unwrap().reserve(), POINTS_PER_PLOT);
        assert!(plot.frame().curves.is_empty());
    }

    #[test]
    fn first_cycle_builds_curves_and_plots_newest_samples() {
        let (mut plot, rx) = plot();
        let mut ports = InputPorts::from_dtypes(&[
            DType::Scalar(ScalarKind::Int32),
            DType::Complex(ScalarKind::Float32),
        ]);
        plot.activate(&mut ports).unwrap();
        let reals: Vec<i32> = (0..1500).collect();
        let complex: Vec<f32> = (0..1500).flat_map(|n| [n as f32, -(n as f32)]).collect();
        ports.get_mut(0).unwrap().push(&reals);
        ports.get_mut(1).unwrap().push(&complex);

        plot.work(&mut ports, Instant::now()).unwrap();
        let events: Vec<PlotEvent> = rx.try_iter().map(|e| e.event).collect();
        assert_eq!(events[0], PlotEvent::InstallLegend);
        let PlotEvent::Replot(frame) = &events[1] else {
            panic!("expected a replot, got {:?}", events[1]);
        };
        let names: Vec<&str> = frame.curves.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ch0", "Ch1.Re", "Ch1.Im"]);
        for curve in &frame.curves {
            assert_eq!(curve.points.len(), POINTS_PER_PLOT);
        }
        let newest = 1500 - POINTS_PER_PLOT;
        assert_eq!(frame.curves[0].points[0], Point::new(0.0, newest as f64));
        assert_eq!(frame.curves[1].points[1], Point::new(0.001, (newest + 1) as f64));
        assert_eq!(frame.curves[2].points[1], Point::new(0.001, -((newest + 1) as f64)));
        assert!(ports.iter().all(|p| p.elements() == 0));
    }

    #[test]
    fn short_batches_plot_what_is_available() {
        let (mut plot, rx) = plot();
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Float64)]);
        plot.apply(&mut ports, TimePlotCommand::SetupCurves).unwrap();
        ports.get_mut(0).unwrap().push(&[1.0f64, 2.0, 3.0]);
        plot.work(&mut ports, Instant::now()).unwrap();
        let frame = last_frame(&rx).unwrap();
        assert_eq!(frame.curves[0].points.len(), 3);
        assert!(!frame.legend);
    }

    #[test]
    fn rate_limited_cycles_do_not_replot() {
        let (mut plot, rx) = plot();
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Int8)]);
        plot.activate(&mut ports).unwrap();
        let start = Instant::now();
        let mut replots = 0;
        for step in 0..100u64 {
            ports.get_mut(0).unwrap().push(&[step as i8; 16]);
            plot.work(&mut ports, start + Duration::from_millis(step)).unwrap();
            replots += rx
                .try_iter()
                .filter(|e| matches!(e.event, PlotEvent::Replot(_)))
                .count();
        }
        // 20 Hz over 100 ms: t = 0 and t = 51 ms.
        assert_eq!(replots, 2);
        assert_eq!(ports.get(0).unwrap().total_consumed(), 1600);
    }

    #[test]
    fn unsupported_channel_fails_activation() {
        let (mut plot, _rx) = plot();
        let mut ports = InputPorts::from_dtypes(&[
            DType::Scalar(ScalarKind::Int16),
            DType::Scalar(ScalarKind::Bool),
        ]);
        assert_eq!(
            plot.activate(&mut ports),
            Err(PlotError::UnsupportedType(DType::Scalar(ScalarKind::Bool)))
        );
        assert!(plot.frame().curves.is_empty());
    }

    #[test]
    fn failed_lazy_setup_still_consumes() {
        let (mut plot, rx) = plot();
        let mut ports = InputPorts::from_dtypes(&[DType::Scalar(ScalarKind::Bool)]);
        ports.get_mut(0).unwrap().push(&[1u8; 10]);
        let err = plot.work(&mut ports, Instant::now()).unwrap_err();
        assert!(matches!(err, PlotError::UnsupportedType(_)));
        assert_eq!(ports.get(0).unwrap().elements(), 0);

        // Setup is not retried every cycle.
        ports.get_mut(0).unwrap().push(&[1u8; 10]);
        plot.work(&mut ports, Instant::now()).unwrap();
        assert!(last_frame(&rx).is_none());
    }

    #[test]
    fn explicit_setup_after_lazy_setup_keeps_curves() {
        let (mut plot, rx) = plot();
        let mut ports = InputPorts::from_dtypes(&[
            DType::Scalar(ScalarKind::Int16),
            DType::Complex(ScalarKind::Int16),
        ]);
        plot.activate(&mut ports).unwrap();
        ports.get_mut(0).unwrap().push(&[3i16; 8]);
        ports.get_mut(1).unwrap().push(&[3i16; 16]);
        plot.work(&mut ports, Instant::now()).unwrap();
        let before = plot.frame();

        let summary = plot.apply(&mut ports, TimePlotCommand::SetupCurves);
        assert_eq!(summary, Ok(()));
        assert_eq!(plot.frame(), before);
        let legends = rx
            .try_iter()
            .filter(|e| e.event == PlotEvent::InstallLegend)
            .count();
        assert_eq!(legends, 1);
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let (mut plot, _rx) = plot();
        let mut ports = InputPorts::default();
        assert_eq!(
            plot.apply(&mut ports, TimePlotCommand::SetSampleRate(0.0)),
            Err(PlotError::InvalidSampleRate(0.0))
        );
        assert_eq!(plot.sample_rate(), 1000.0);
    }
}
