//! `houndmind-runtime` – the tick scheduler
//!
//! Drives a fixed, ordered set of [`Module`][houndmind_types::Module]s on a
//! single thread at a target rate, sharing one
//! [`RuntimeContext`][houndmind_types::RuntimeContext] between them.  A
//! module that fails or panics is contained; the loop keeps going.
//!
//! # Modules
//!
//! - [`scheduler`] – [`HoundMindRuntime`]: start, tick, restart and teardown
//!   of modules, plus [`ShutdownHandle`] for leaving the loop from a signal
//!   handler.
//! - [`perf`] – EMA tick timing published as `runtime_performance`.
//! - [`quiet_mode`] – the `quiet_mode_active` flag derived from settings and
//!   local time.
//! - [`registry`] – [`ModuleRegistry`]: builds modules from
//!   [`ModuleSpec`] config entries.
//! - [`builtin`] – status logger and background health sampler.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: subscriber
//!   and optional OTLP export.
//!
//! Supervision policy (when to restart a stuck module) lives in
//! `houndmind-kernel` and talks to the scheduler only through the
//! `restart_modules` context key.

mod fault;

pub mod builtin;
pub mod perf;
pub mod quiet_mode;
pub mod registry;
pub mod scheduler;
pub mod telemetry;

pub use perf::{PerformanceRecord, PerformanceTracker};
pub use registry::{ModuleFactory, ModuleRegistry, ModuleSpec};
pub use scheduler::{HoundMindRuntime, RuntimeConfig, RuntimeState, ShutdownHandle};
