//! `houndmind-kernel` – Supervision policy
//!
//! The scheduler in `houndmind-runtime` only knows how to stop-then-start a
//! module when asked.  Deciding *when* to ask lives here.
//!
//! # Modules
//!
//! - [`restart_policy`] – [`RestartPolicy`][restart_policy::RestartPolicy]:
//!   the pluggable rate limiter for restart requests, with
//!   [`CooldownPolicy`][restart_policy::CooldownPolicy] as the reference
//!   cooldown + budget implementation.
//! - [`watchdog`] – [`WatchdogModule`][watchdog::WatchdogModule]: a regular
//!   module that compares every peer's heartbeat against a staleness
//!   threshold and files restart requests for frozen ones.

pub mod restart_policy;
pub mod watchdog;

pub use restart_policy::{CooldownPolicy, RestartPolicy};
pub use watchdog::{ComponentHealth, WatchdogConfig, WatchdogModule, assess};
