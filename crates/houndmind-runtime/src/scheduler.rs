//! [`HoundMindRuntime`] – the cooperative tick scheduler.
//!
//! Owns an ordered list of [`Module`]s and a single [`RuntimeContext`], and
//! drives them on one thread at a fixed target rate.  Each tick:
//!
//! 1. **Stamp** – write `tick_ts` and the global `runtime_heartbeat`.
//! 2. **Derive** – recompute `quiet_mode_active` from settings + local time.
//! 3. **Tick** – call [`Module::tick`] on every started module in list order,
//!    inside a fault boundary.  Success stamps the module's heartbeat and
//!    mirrors it to `module_heartbeat:<name>`; failure records `last_error`
//!    and `module_error:<name>` and moves on.
//! 4. **Snapshot** – publish every status under `module_statuses`.
//! 5. **Restart** – drain `restart_modules` and stop-then-start each named
//!    module.
//! 6. **Measure** – update the EMA timing record under `runtime_performance`
//!    and warn on overruns.
//! 7. **Sleep** – for whatever is left of the tick period.  Missed ticks are
//!    dropped, never batched.
//!
//! Module order is the caller's order and never changes: a module sees the
//! same-tick writes of every module before it and last tick's writes of
//! every module after it.
//!
//! # Fault policy
//!
//! | Failure | Optional module | Required module |
//! |---|---|---|
//! | `start` | disabled, runtime continues | [`RuntimeError::RequiredModuleFailed`] |
//! | `tick` | logged, ticks again next cycle | same |
//! | `stop` | logged, ignored | same |
//!
//! Panics are treated exactly like `Err` returns.
//!
//! # Example
//!
//! ```
//! use houndmind_runtime::{HoundMindRuntime, RuntimeConfig};
//! use houndmind_types::{Module, ModuleError, ModuleStatus, RuntimeContext};
//!
//! struct Blink {
//!     status: ModuleStatus,
//! }
//!
//! impl Module for Blink {
//!     fn status(&self) -> &ModuleStatus { &self.status }
//!     fn status_mut(&mut self) -> &mut ModuleStatus { &mut self.status }
//!     fn tick(&mut self, ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
//!         let on = !ctx.get_bool("led_on").unwrap_or(false);
//!         ctx.set("led_on", on);
//!         Ok(())
//!     }
//! }
//!
//! let config = RuntimeConfig { tick_hz: 1000, max_cycles: Some(3), ..Default::default() };
//! let blink = Box::new(Blink { status: ModuleStatus::new("blink", true, false) });
//! let mut runtime = HoundMindRuntime::new(config, vec![blink]).unwrap();
//! runtime.run().unwrap();
//! assert_eq!(runtime.cycles(), 3);
//! assert_eq!(runtime.context().get_bool("led_on"), Some(true));
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use houndmind_types::{Module, ModuleStatus, RuntimeContext, RuntimeError, keys};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::fault;
use crate::perf::{self, PerformanceRecord, PerformanceTracker};
use crate::quiet_mode;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Loop configuration plus the trees seeded into the context.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Target frequency.  Floored at 1.
    pub tick_hz: u32,
    /// Stop after this many cycles; `None` runs until shutdown is requested.
    pub max_cycles: Option<u64>,
    /// Seeded as `settings`; read by dotted lookups every tick.
    pub settings: Value,
    /// Seeded as `config`.
    pub config: Value,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_hz: 10,
            max_cycles: None,
            settings: Value::Object(Map::new()),
            config: Value::Object(Map::new()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shutdown
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable request to leave the run loop.
///
/// Honoured between ticks only; a module call in progress always completes.
/// The CLI wires Ctrl-C to [`ShutdownHandle::request`].
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Global loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Init,
    Running,
    Stopping,
    Done,
    /// Torn down after a required module failed.  Further `start`/`run`
    /// calls return that error again.
    Failed,
}

/// Wall-clock seconds since the Unix epoch.
pub fn wall_clock_ts() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

// ─────────────────────────────────────────────────────────────────────────────
// HoundMindRuntime
// ─────────────────────────────────────────────────────────────────────────────

pub struct HoundMindRuntime {
    modules: Vec<Box<dyn Module>>,
    context: RuntimeContext,
    tick_hz: u32,
    max_cycles: Option<u64>,
    perf: PerformanceTracker,
    last_performance: Option<PerformanceRecord>,
    shutdown: ShutdownHandle,
    state: RuntimeState,
    fatal: Option<RuntimeError>,
    cycles: u64,
}

impl HoundMindRuntime {
    /// Build a runtime over `modules`, ticked in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateModule`] when two modules share a name.
    pub fn new(config: RuntimeConfig, modules: Vec<Box<dyn Module>>) -> Result<Self, RuntimeError> {
        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.name().to_string()) {
                return Err(RuntimeError::DuplicateModule(module.name().to_string()));
            }
        }

        let names: Vec<Value> = modules
            .iter()
            .map(|m| Value::String(m.name().to_string()))
            .collect();

        let mut context = RuntimeContext::new();
        context.set(keys::CONFIG, config.config);
        context.set(keys::SETTINGS, config.settings);
        context.set(keys::MODULE_NAMES, Value::Array(names));

        Ok(Self {
            modules,
            context,
            tick_hz: config.tick_hz.max(1),
            max_cycles: config.max_cycles,
            perf: PerformanceTracker::new(),
            last_performance: None,
            shutdown: ShutdownHandle::default(),
            state: RuntimeState::Init,
            fatal: None,
            cycles: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RuntimeContext {
        &mut self.context
    }

    pub fn modules(&self) -> &[Box<dyn Module>] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&dyn Module> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    pub fn status(&self, name: &str) -> Option<&ModuleStatus> {
        self.module(name).map(|m| m.status())
    }

    /// Number of completed ticks.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    pub fn target_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz))
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// `true` between a successful [`start`][Self::start] and teardown.
    pub fn is_started(&self) -> bool {
        self.state == RuntimeState::Running
    }

    pub fn performance(&self) -> Option<&PerformanceRecord> {
        self.last_performance.as_ref()
    }

    /// Handle that makes [`run`][Self::run] return after the current tick.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start every enabled module in order.
    ///
    /// Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::RequiredModuleFailed`] when a required module's
    /// `start` fails.  Modules already started are stopped first and the
    /// runtime ends in [`RuntimeState::Failed`], and every later call
    /// returns the same error.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        if let Some(err) = &self.fatal {
            return Err(err.clone());
        }
        if self.state != RuntimeState::Init {
            return Ok(());
        }
        info!(modules = self.modules.len(), tick_hz = self.tick_hz, "starting runtime");

        for i in 0..self.modules.len() {
            if let Err(err) = self.start_module(i) {
                error!(error = %err, "aborting startup");
                self.shutdown();
                self.fail(err.clone());
                return Err(err);
            }
        }

        self.publish_statuses();
        self.state = RuntimeState::Running;
        Ok(())
    }

    /// Start (if needed) and loop until the cycle limit or a shutdown
    /// request, then stop every started module.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::RequiredModuleFailed`] if a required module
    /// fails to start, initially or on restart.  Teardown still runs.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        self.start()?;
        if self.state != RuntimeState::Running {
            return Ok(());
        }
        let outcome = self.run_loop();
        if let Err(err) = &outcome {
            error!(error = %err, label = err.as_label(), "runtime loop aborted");
        }
        self.shutdown();
        if let Err(err) = &outcome {
            self.fail(err.clone());
        }
        outcome
    }

    fn fail(&mut self, err: RuntimeError) {
        self.state = RuntimeState::Failed;
        self.fatal = Some(err);
    }

    fn run_loop(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.shutdown.is_requested() {
                info!(cycles = self.cycles, "shutdown requested");
                return Ok(());
            }
            if self.limit_reached() {
                info!(cycles = self.cycles, "cycle limit reached");
                return Ok(());
            }

            self.tick_once()?;

            let delay = self
                .last_performance
                .as_ref()
                .map_or(Duration::ZERO, PerformanceRecord::loop_delay);
            if !delay.is_zero() && !self.limit_reached() && !self.shutdown.is_requested() {
                thread::sleep(delay);
            }
        }
    }

    fn limit_reached(&self) -> bool {
        self.max_cycles.is_some_and(|max| self.cycles >= max)
    }

    /// Run one full tick without sleeping.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::RequiredModuleFailed`] when a restart request
    /// targets a required module whose `start` then fails.
    pub fn tick_once(&mut self) -> Result<(), RuntimeError> {
        let tick_start = Instant::now();
        let now = wall_clock_ts();

        self.context.set(keys::TICK_TS, now);
        self.context.set(keys::RUNTIME_HEARTBEAT, now);
        let quiet = quiet_mode::is_active(&self.context, chrono::Local::now().time());
        self.context.set(keys::QUIET_MODE_ACTIVE, quiet);

        for i in 0..self.modules.len() {
            self.tick_module(i, now);
        }

        self.publish_statuses();
        let restarts = self.drain_restarts();
        self.cycles += 1;

        let period = self.target_period();
        let elapsed = tick_start.elapsed();
        let alpha = perf::ema_alpha(&self.context);
        let record = self.perf.record(tick_start, elapsed, period, alpha);
        let warn_after = perf::warn_threshold(&self.context, period);
        if elapsed > warn_after {
            warn!(
                elapsed_s = record.tick_duration_s,
                overrun_s = record.tick_overrun_s,
                warn_s = warn_after.as_secs_f64(),
                "tick overran its budget"
            );
        }
        match serde_json::to_value(&record) {
            Ok(value) => self.context.set(keys::RUNTIME_PERFORMANCE, value),
            Err(e) => debug!(error = %e, "could not serialise performance record"),
        }
        self.last_performance = Some(record);

        restarts
    }

    /// Stop every started module, in reverse order.  Stop failures are
    /// logged per module and never block the rest.
    pub fn shutdown(&mut self) {
        if matches!(self.state, RuntimeState::Done | RuntimeState::Failed) {
            return;
        }
        self.state = RuntimeState::Stopping;
        for i in (0..self.modules.len()).rev() {
            if self.modules[i].status().started {
                self.stop_module(i);
            }
        }
        self.publish_statuses();
        self.state = RuntimeState::Done;
        info!(cycles = self.cycles, "runtime stopped");
    }

    // -------------------------------------------------------------------------
    // Per-module operations
    // -------------------------------------------------------------------------

    fn start_module(&mut self, i: usize) -> Result<(), RuntimeError> {
        let ctx = &mut self.context;
        let module = &mut self.modules[i];
        let name = module.name().to_string();

        if !module.status().enabled {
            debug!(module = %name, "module disabled; not starting");
            return Ok(());
        }

        match fault::contain(|| module.start(ctx)) {
            Ok(()) if !module.status().enabled => {
                module.status_mut().started = false;
                info!(
                    module = %name,
                    reason = module.status().disabled_reason.as_deref().unwrap_or("unknown"),
                    "module disabled itself during start"
                );
                Ok(())
            }
            Ok(()) => {
                module.status_mut().started = true;
                info!(module = %name, "module started");
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                ctx.set(keys::error_key(&name), reason.clone());
                let status = module.status_mut();
                status.started = false;
                status.last_error = Some(reason.clone());
                if status.required {
                    error!(module = %name, error = %reason, "required module failed to start");
                    Err(RuntimeError::RequiredModuleFailed {
                        module: name,
                        reason,
                    })
                } else {
                    warn!(module = %name, error = %reason, "optional module failed to start; disabling");
                    module.disable(&reason);
                    Ok(())
                }
            }
        }
    }

    fn tick_module(&mut self, i: usize, now: f64) {
        let ctx = &mut self.context;
        let module = &mut self.modules[i];
        if !module.status().started {
            return;
        }

        match fault::contain(|| module.tick(ctx)) {
            Ok(()) => {
                // The module may have disabled itself during the tick.
                if !module.status().started {
                    return;
                }
                let status = module.status_mut();
                let heartbeat = status.last_heartbeat_ts.map_or(now, |prev| prev.max(now));
                status.last_tick_ts = Some(now);
                status.last_heartbeat_ts = Some(heartbeat);
                ctx.set(keys::heartbeat_key(&status.name), heartbeat);
            }
            Err(err) => {
                let reason = err.to_string();
                let name = module.name().to_string();
                warn!(module = %name, error = %reason, "module tick failed");
                ctx.set(keys::error_key(&name), reason.clone());
                module.status_mut().last_error = Some(reason);
            }
        }
    }

    fn stop_module(&mut self, i: usize) {
        let ctx = &mut self.context;
        let module = &mut self.modules[i];
        let name = module.name().to_string();

        match fault::contain(|| module.stop(ctx)) {
            Ok(()) => debug!(module = %name, "module stopped"),
            Err(err) => warn!(module = %name, error = %err, "module stop failed; continuing"),
        }
        module.status_mut().started = false;
    }

    fn drain_restarts(&mut self) -> Result<(), RuntimeError> {
        for name in self.context.take_restart_requests() {
            match self.modules.iter().position(|m| m.name() == name) {
                Some(i) => self.restart_module(i)?,
                None => debug!(module = %name, "restart requested for unknown module; ignoring"),
            }
        }
        Ok(())
    }

    fn restart_module(&mut self, i: usize) -> Result<(), RuntimeError> {
        let name = self.modules[i].name().to_string();
        info!(module = %name, "restart requested");

        if self.modules[i].status().started {
            self.stop_module(i);
        }

        if !self.modules[i].status().enabled {
            info!(
                module = %name,
                reason = self.modules[i].status().disabled_reason.as_deref().unwrap_or("unknown"),
                "module is disabled; not restarting"
            );
            return Ok(());
        }

        let outcome = self.start_module(i);
        if self.modules[i].status().started {
            info!(module = %name, "module restarted");
        } else {
            warn!(module = %name, "module restart failed");
        }
        self.publish_statuses();
        outcome
    }

    fn publish_statuses(&mut self) {
        let snapshot: Map<String, Value> = self
            .modules
            .iter()
            .map(|m| {
                (
                    m.name().to_string(),
                    serde_json::to_value(m.status()).unwrap_or_default(),
                )
            })
            .collect();
        self.context
            .set(keys::MODULE_STATUSES, Value::Object(snapshot));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
