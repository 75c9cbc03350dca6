//! Loop performance telemetry.
//!
//! [`PerformanceTracker`] keeps an exponential moving average of how long
//! each tick took and of the interval between tick starts.  The scheduler
//! publishes the resulting [`PerformanceRecord`] under
//! `runtime_performance` every tick.
//!
//! Tuning knobs are read from settings on every tick, so they can be changed
//! at runtime:
//!
//! | Setting | Default |
//! |---|---|
//! | `performance.runtime_ema_alpha` | `0.2` |
//! | `performance.runtime_tick_warn_s` | `1.5 ×` target period |

use std::time::{Duration, Instant};

use houndmind_types::RuntimeContext;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMA_ALPHA: f64 = 0.2;

/// Overrun warning threshold as a multiple of the target period.
pub const DEFAULT_WARN_FACTOR: f64 = 1.5;

/// One tick's timing, as published into the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub tick_hz_target: f64,
    /// `1 / tick_interval_avg_s`, or `0` before the second tick.
    pub tick_hz_actual: f64,
    pub tick_duration_s: f64,
    pub tick_duration_avg_s: f64,
    /// Time since the previous tick started; `0` on the first tick.
    pub tick_interval_s: f64,
    pub tick_interval_avg_s: f64,
    pub tick_overrun_s: f64,
    /// How long the loop will sleep before the next tick.
    pub loop_delay_s: f64,
}

impl PerformanceRecord {
    pub fn loop_delay(&self) -> Duration {
        Duration::from_secs_f64(self.loop_delay_s.max(0.0))
    }
}

/// Exponential moving average; the first sample seeds the average.
pub fn ema(previous: Option<f64>, sample: f64, alpha: f64) -> f64 {
    match previous {
        None => sample,
        Some(prev) => alpha * sample + (1.0 - alpha) * prev,
    }
}

/// Smoothing factor from settings, falling back to [`DEFAULT_EMA_ALPHA`]
/// when absent or outside `(0, 1]`.
pub fn ema_alpha(ctx: &RuntimeContext) -> f64 {
    ctx.setting_f64("performance.runtime_ema_alpha")
        .filter(|a| *a > 0.0 && *a <= 1.0)
        .unwrap_or(DEFAULT_EMA_ALPHA)
}

/// Tick duration above which the scheduler logs a warning.
pub fn warn_threshold(ctx: &RuntimeContext, period: Duration) -> Duration {
    ctx.setting_f64("performance.runtime_tick_warn_s")
        .filter(|s| *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .unwrap_or_else(|| period.mul_f64(DEFAULT_WARN_FACTOR))
}

#[derive(Debug, Default)]
pub struct PerformanceTracker {
    duration_avg: Option<f64>,
    interval_avg: Option<f64>,
    last_tick_start: Option<Instant>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick into the averages.
    ///
    /// `tick_start` is when the tick began, `elapsed` how long its work took,
    /// `period` the target tick period.
    pub fn record(
        &mut self,
        tick_start: Instant,
        elapsed: Duration,
        period: Duration,
        alpha: f64,
    ) -> PerformanceRecord {
        let duration_s = elapsed.as_secs_f64();
        self.duration_avg = Some(ema(self.duration_avg, duration_s, alpha));

        let interval_s = match self.last_tick_start {
            Some(prev) => {
                let interval = tick_start.saturating_duration_since(prev).as_secs_f64();
                self.interval_avg = Some(ema(self.interval_avg, interval, alpha));
                interval
            }
            None => 0.0,
        };
        self.last_tick_start = Some(tick_start);

        let period_s = period.as_secs_f64();
        let interval_avg_s = self.interval_avg.unwrap_or(0.0);
        let tick_hz_actual = if interval_avg_s > 0.0 {
            1.0 / interval_avg_s
        } else {
            0.0
        };

        PerformanceRecord {
            tick_hz_target: if period_s > 0.0 { 1.0 / period_s } else { 0.0 },
            tick_hz_actual,
            tick_duration_s: duration_s,
            tick_duration_avg_s: self.duration_avg.unwrap_or(duration_s),
            tick_interval_s: interval_s,
            tick_interval_avg_s: interval_avg_s,
            tick_overrun_s: (duration_s - period_s).max(0.0),
            loop_delay_s: (period_s - duration_s).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use houndmind_types::keys;
    use serde_json::json;

    const EPS: f64 = 1e-9;

    #[test]
    fn ema_seeds_then_smooths() {
        assert!((ema(None, 4.0, 0.2) - 4.0).abs() < EPS);
        assert!((ema(Some(4.0), 9.0, 0.2) - 5.0).abs() < EPS);
    }

    #[test]
    fn first_tick_has_no_interval() {
        let mut tracker = PerformanceTracker::new();
        let rec = tracker.record(
            Instant::now(),
            Duration::from_millis(20),
            Duration::from_millis(100),
            0.2,
        );
        assert!((rec.tick_hz_target - 10.0).abs() < 1e-6);
        assert_eq!(rec.tick_interval_s, 0.0);
        assert_eq!(rec.tick_hz_actual, 0.0);
        assert!((rec.tick_duration_avg_s - 0.02).abs() < EPS);
        assert!((rec.loop_delay_s - 0.08).abs() < 1e-6);
        assert_eq!(rec.tick_overrun_s, 0.0);
    }

    #[test]
    fn interval_average_drives_actual_rate() {
        let mut tracker = PerformanceTracker::new();
        let t0 = Instant::now();
        let period = Duration::from_millis(100);
        tracker.record(t0, Duration::from_millis(10), period, 0.5);
        let rec = tracker.record(t0 + Duration::from_millis(200), Duration::from_millis(10), period, 0.5);
        assert!((rec.tick_interval_s - 0.2).abs() < 1e-6);
        assert!((rec.tick_interval_avg_s - 0.2).abs() < 1e-6);
        assert!((rec.tick_hz_actual - 5.0).abs() < 1e-3);

        let rec = tracker.record(t0 + Duration::from_millis(300), Duration::from_millis(10), period, 0.5);
        assert!((rec.tick_interval_avg_s - 0.15).abs() < 1e-6);
    }

    #[test]
    fn overrun_and_no_delay_when_tick_exceeds_period() {
        let mut tracker = PerformanceTracker::new();
        let rec = tracker.record(
            Instant::now(),
            Duration::from_millis(250),
            Duration::from_millis(100),
            0.2,
        );
        assert!((rec.tick_overrun_s - 0.15).abs() < 1e-6);
        assert_eq!(rec.loop_delay_s, 0.0);
        assert_eq!(rec.loop_delay(), Duration::ZERO);
    }

    #[test]
    fn alpha_and_warn_threshold_from_settings() {
        let mut ctx = RuntimeContext::new();
        assert_eq!(ema_alpha(&ctx), DEFAULT_EMA_ALPHA);
        let default_warn = warn_threshold(&ctx, Duration::from_millis(100));
        assert!((default_warn.as_secs_f64() - 0.15).abs() < 1e-6);

        ctx.set(
            keys::SETTINGS,
            json!({"performance": {"runtime_ema_alpha": 0.5, "runtime_tick_warn_s": 0.25}}),
        );
        assert_eq!(ema_alpha(&ctx), 0.5);
        assert_eq!(
            warn_threshold(&ctx, Duration::from_millis(100)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn unrepresentable_warn_threshold_falls_back() {
        let mut ctx = RuntimeContext::new();
        let period = Duration::from_millis(100);
        for bad in [json!(1e20), json!(-1.0), json!(0.0), json!("slow")] {
            ctx.set(keys::SETTINGS, json!({"performance": {"runtime_tick_warn_s": bad}}));
            let warn = warn_threshold(&ctx, period);
            assert!((warn.as_secs_f64() - 0.15).abs() < 1e-6);
        }
    }

    #[test]
    fn out_of_range_alpha_falls_back() {
        let mut ctx = RuntimeContext::new();
        ctx.set(keys::SETTINGS, json!({"performance": {"runtime_ema_alpha": 1.5}}));
        assert_eq!(ema_alpha(&ctx), DEFAULT_EMA_ALPHA);
        ctx.set(keys::SETTINGS, json!({"performance": {"runtime_ema_alpha": 0.0}}));
        assert_eq!(ema_alpha(&ctx), DEFAULT_EMA_ALPHA);
    }
}
