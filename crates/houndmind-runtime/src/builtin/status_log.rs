//! [`StatusLogModule`] – periodic status summary.
//!
//! Every `interval_s` seconds of `tick_ts` it reads `module_statuses` and
//! `runtime_performance` and emits one structured `info!` line.  The same
//! summary is published under `status_summary`.

use houndmind_types::{Module, ModuleError, ModuleStatus, RuntimeContext, keys};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusLogConfig {
    pub interval_s: f64,
}

impl Default for StatusLogConfig {
    fn default() -> Self {
        Self { interval_s: 5.0 }
    }
}

/// Counts derived from one `module_statuses` snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub started: Vec<String>,
    pub disabled: Vec<String>,
    pub errored: Vec<String>,
    pub tick_hz_actual: Option<f64>,
    pub tick_duration_avg_s: Option<f64>,
}

impl StatusSummary {
    /// Build from the context.  Names are sorted for stable output.
    pub fn from_context(ctx: &RuntimeContext) -> Self {
        let mut summary = Self::default();
        if let Some(statuses) = ctx.get(keys::MODULE_STATUSES).and_then(Value::as_object) {
            for (name, status) in statuses {
                let flag = |field: &str| status.get(field).and_then(Value::as_bool).unwrap_or(false);
                if flag("started") {
                    summary.started.push(name.clone());
                }
                if !flag("enabled") {
                    summary.disabled.push(name.clone());
                }
                if status.get("last_error").is_some_and(|e| !e.is_null()) {
                    summary.errored.push(name.clone());
                }
            }
        }
        summary.started.sort();
        summary.disabled.sort();
        summary.errored.sort();

        if let Some(perf) = ctx.get(keys::RUNTIME_PERFORMANCE) {
            summary.tick_hz_actual = perf.get("tick_hz_actual").and_then(Value::as_f64);
            summary.tick_duration_avg_s = perf.get("tick_duration_avg_s").and_then(Value::as_f64);
        }
        summary
    }
}

pub struct StatusLogModule {
    status: ModuleStatus,
    config: StatusLogConfig,
    last_log_ts: Option<f64>,
}

impl StatusLogModule {
    pub fn new(status: ModuleStatus, config: StatusLogConfig) -> Self {
        Self {
            status,
            config,
            last_log_ts: None,
        }
    }

    fn due(&self, now: f64) -> bool {
        self.last_log_ts
            .is_none_or(|last| now - last >= self.config.interval_s)
    }
}

impl Module for StatusLogModule {
    fn status(&self) -> &ModuleStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut ModuleStatus {
        &mut self.status
    }

    fn start(&mut self, _ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        self.last_log_ts = None;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        let Some(now) = ctx.get_f64(keys::TICK_TS) else {
            return Ok(());
        };
        if !self.due(now) {
            return Ok(());
        }
        self.last_log_ts = Some(now);

        let summary = StatusSummary::from_context(ctx);
        info!(
            started = ?summary.started,
            disabled = ?summary.disabled,
            errored = ?summary.errored,
            tick_hz = summary.tick_hz_actual.unwrap_or(0.0),
            tick_avg_s = summary.tick_duration_avg_s.unwrap_or(0.0),
            "runtime status"
        );
        let value = serde_json::to_value(&summary).map_err(|e| ModuleError::Context {
            key: keys::STATUS_SUMMARY.to_string(),
            details: e.to_string(),
        })?;
        ctx.set(keys::STATUS_SUMMARY, value);
        Ok(())
    }
}
