//! [`WatchdogModule`] – heartbeat supervisor.
//!
//! The scheduler stamps `module_heartbeat:<name>` after every successful
//! tick but never judges it.  This module does: each tick it compares every
//! watched peer's last heartbeat against `stale_after_s` and, when a peer is
//! stale and the [`RestartPolicy`] allows it, files a restart request through
//! the context.  The scheduler executes the request at the end of the tick.
//!
//! A module whose `tick` keeps failing stops heartbeating too, so repeated
//! transient failures escalate into restarts the same way hangs do.
//!
//! Startup grace: a peer's heartbeat baseline is the moment the watchdog
//! first saw it started (or last restarted it), so a module that has not
//! ticked yet is not considered stale immediately.

use std::collections::{HashMap, HashSet};

use houndmind_types::{Module, ModuleError, ModuleStatus, RuntimeContext, keys};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::restart_policy::{CooldownPolicy, RestartPolicy};

// ────────────────────────────────────────────────────────────────────────────
// Health assessment
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Heartbeat is within the staleness threshold.
    Healthy,
    /// Heartbeat is older than the staleness threshold.
    Stale,
}

/// Classify a heartbeat taken at `heartbeat` as seen at `now`.
pub fn assess(now: f64, heartbeat: f64, stale_after_s: f64) -> ComponentHealth {
    if now - heartbeat > stale_after_s {
        ComponentHealth::Stale
    } else {
        ComponentHealth::Healthy
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Options accepted by [`WatchdogModule`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Modules to supervise.  Empty means every module in `module_names`
    /// except the watchdog itself.
    pub watch: Vec<String>,
    pub stale_after_s: f64,
    pub restart_cooldown_s: f64,
    pub max_restarts: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            watch: Vec::new(),
            stale_after_s: 5.0,
            restart_cooldown_s: 10.0,
            max_restarts: 3,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// WatchdogModule
// ────────────────────────────────────────────────────────────────────────────

pub struct WatchdogModule {
    status: ModuleStatus,
    config: WatchdogConfig,
    policy: Box<dyn RestartPolicy>,
    /// Heartbeat baseline per module: first sighting or last restart request.
    baseline: HashMap<String, f64>,
    /// Modules whose exhausted budget has already been reported.
    exhausted_reported: HashSet<String>,
}

impl WatchdogModule {
    /// Watchdog using a [`CooldownPolicy`] built from `config`.
    pub fn new(status: ModuleStatus, config: WatchdogConfig) -> Self {
        let policy = CooldownPolicy::new(config.restart_cooldown_s, config.max_restarts);
        Self::with_policy(status, config, Box::new(policy))
    }

    /// Watchdog with a caller-supplied rate-limiting policy.
    pub fn with_policy(
        status: ModuleStatus,
        config: WatchdogConfig,
        policy: Box<dyn RestartPolicy>,
    ) -> Self {
        Self {
            status,
            config,
            policy,
            baseline: HashMap::new(),
            exhausted_reported: HashSet::new(),
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    pub fn policy(&self) -> &dyn RestartPolicy {
        self.policy.as_ref()
    }

    /// Reset the restart budget of `module`.
    pub fn reset(&mut self, module: &str) {
        self.policy.reset(module);
        self.exhausted_reported.remove(module);
    }

    fn targets(&self, ctx: &RuntimeContext) -> Vec<String> {
        if !self.config.watch.is_empty() {
            return self.config.watch.clone();
        }
        ctx.get(keys::MODULE_NAMES)
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|n| *n != self.status.name)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn is_running(statuses: Option<&Map<String, Value>>, name: &str) -> bool {
    let Some(status) = statuses.and_then(|s| s.get(name)) else {
        return false;
    };
    let flag = |field: &str| status.get(field).and_then(Value::as_bool).unwrap_or(false);
    flag("enabled") && flag("started")
}

impl Module for WatchdogModule {
    fn status(&self) -> &ModuleStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut ModuleStatus {
        &mut self.status
    }

    fn start(&mut self, _ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        // Budgets survive a watchdog restart; baselines do not.
        self.baseline.clear();
        Ok(())
    }

    fn tick(&mut self, ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        let now = ctx
            .get_f64(keys::TICK_TS)
            .ok_or_else(|| ModuleError::Context {
                key: keys::TICK_TS.to_string(),
                details: "missing or not a number".to_string(),
            })?;

        let targets = self.targets(ctx);
        let statuses = ctx.get(keys::MODULE_STATUSES).and_then(Value::as_object);
        let mut to_restart = Vec::new();

        for name in &targets {
            if !is_running(statuses, name) {
                self.baseline.remove(name);
                continue;
            }

            let baseline = *self.baseline.entry(name.clone()).or_insert(now);
            let heartbeat = ctx
                .get_f64(&keys::heartbeat_key(name))
                .map_or(baseline, |hb| hb.max(baseline));

            if assess(now, heartbeat, self.config.stale_after_s) == ComponentHealth::Healthy {
                continue;
            }

            if self.policy.allow(name, now) {
                self.policy.record(name, now);
                self.baseline.insert(name.clone(), now);
                warn!(
                    module = %name,
                    age_s = now - heartbeat,
                    attempt = self.policy.restarts(name),
                    "heartbeat stale; requesting restart"
                );
                to_restart.push(name.clone());
            } else if self.policy.exhausted(name) {
                if self.exhausted_reported.insert(name.clone()) {
                    warn!(
                        module = %name,
                        restarts = self.policy.restarts(name),
                        "restart budget exhausted; leaving module stale"
                    );
                }
            } else {
                debug!(module = %name, "heartbeat stale; restart cooling down");
            }
        }

        if !to_restart.is_empty() {
            ctx.request_restart(to_restart);
        }

        let counts: Map<String, Value> = targets
            .iter()
            .map(|n| (n.clone(), Value::from(self.policy.restarts(n))))
            .collect();
        ctx.set(keys::WATCHDOG_RESTARTS, Value::Object(counts));
        Ok(())
    }
}
