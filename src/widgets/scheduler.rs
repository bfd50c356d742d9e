use std::time::{Duration, Instant};

use crate::dsp::PlotError;

/// Decides once per cycle whether the conversion and redraw pipeline runs.
#[derive(Clone, Debug)]
pub struct UpdateScheduler {
    display_rate: f64,
    last_update: Option<Instant>,
}

impl UpdateScheduler {
    pub fn new(display_rate: f64) -> Result<Self, PlotError> {
        let mut scheduler = Self {
            display_rate: 1.0,
            last_update: None,
        };
        scheduler.set_display_rate(display_rate)?;
        Ok(scheduler)
    }

    pub fn display_rate(&self) -> f64 {
        self.display_rate
    }

    pub fn set_display_rate(&mut self, display_rate: f64) -> Result<(), PlotError> {
        if !display_rate.is_finite() || display_rate <= 0.0 {
            return Err(PlotError::InvalidDisplayRate(display_rate));
        }
        self.display_rate = display_rate;
        Ok(())
    }

    /// Saturates at `Duration::MAX` for rates too small to represent.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.display_rate).unwrap_or(Duration::MAX)
    }

    /// True when strictly more than one period has passed since the last pass.
    pub fn due(&self, now: Instant) -> bool {
        match self.last_update {
            None => true,
            Some(last) => {
                now.saturating_duration_since(last).as_secs_f64() > 1.0 / self.display_rate
            }
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_update = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_update = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passes_over(rate: f64, span: Duration, step: Duration) -> usize {
        let mut scheduler = UpdateScheduler::new(rate).unwrap();
        let start = Instant::now();
        let mut passes = 0;
        let mut elapsed = Duration::ZERO;
        while elapsed < span {
            let now = start + elapsed;
            if scheduler.due(now) {
                scheduler.mark(now);
                passes += 1;
            }
            elapsed += step;
        }
        passes
    }

    #[test]
    fn pass_count_tracks_display_rate() {
        for (rate, span_ms, step_us) in [
            (10.0, 2_000, 1_000),
            (10.0, 5_000, 250),
            (30.0, 3_000, 500),
            (4.0, 10_000, 2_000),
        ] {
            let span = Duration::from_millis(span_ms);
            let expected = (span.as_secs_f64() * rate).floor() as i64;
            let passes = passes_over(rate, span, Duration::from_micros(step_us)) as i64;
            assert!(
                (passes - expected).abs() <= 1,
                "rate {rate}: {passes} passes, expected about {expected}"
            );
        }
    }

    #[test]
    fn first_cycle_runs_immediately() {
        let scheduler = UpdateScheduler::new(1.0).unwrap();
        assert!(scheduler.due(Instant::now()));
    }

    #[test]
    fn exact_period_is_not_yet_due() {
        let mut scheduler = UpdateScheduler::new(10.0).unwrap();
        let start = Instant::now();
        scheduler.mark(start);
        assert!(!scheduler.due(start + Duration::from_millis(100)));
        assert!(scheduler.due(start + Duration::from_millis(101)));
        scheduler.reset();
        assert!(scheduler.due(start));
    }

    #[test]
    fn tiny_rates_never_come_due_again() {
        let mut scheduler = UpdateScheduler::new(1e-20).unwrap();
        let start = Instant::now();
        assert!(scheduler.due(start));
        scheduler.mark(start);
        assert!(!scheduler.due(start + Duration::from_secs(1)));
        assert!(!scheduler.due(start + Duration::from_secs(86_400 * 365)));
        assert_eq!(scheduler.period(), Duration::MAX);
    }

    #[test]
    fn rejects_unusable_rates() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                UpdateScheduler::new(rate),
                Err(PlotError::InvalidDisplayRate(_))
            ));
        }
    }
}
