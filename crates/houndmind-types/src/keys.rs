//! Well-known [`RuntimeContext`][crate::RuntimeContext] keys.
//!
//! Keys are plain strings by convention; these constants are the ones the
//! runtime core produces or consumes.  Per-module keys are built with
//! [`heartbeat_key`] and [`error_key`].

/// Wall-clock time of the current tick (`f64` seconds).  Modules treat it as
/// "now".
pub const TICK_TS: &str = "tick_ts";

/// Global heartbeat stamped once per loop iteration.
pub const RUNTIME_HEARTBEAT: &str = "runtime_heartbeat";

/// Full configuration tree, seeded at construction.
pub const CONFIG: &str = "config";

/// Settings tree, seeded at construction.  Dotted lookups go through
/// [`RuntimeContext::setting`][crate::RuntimeContext::setting].
pub const SETTINGS: &str = "settings";

/// Ordered list of module names, seeded at construction.
pub const MODULE_NAMES: &str = "module_names";

/// Name → status object snapshot, rebuilt every tick.
pub const MODULE_STATUSES: &str = "module_statuses";

/// Pending restart request: a name or a list of names.
pub const RESTART_MODULES: &str = "restart_modules";

pub const RUNTIME_PERFORMANCE: &str = "runtime_performance";

pub const QUIET_MODE_ACTIVE: &str = "quiet_mode_active";

/// Name → restart count published by the watchdog.
pub const WATCHDOG_RESTARTS: &str = "watchdog_restarts";

pub const SYSTEM_HEALTH: &str = "system_health";

/// Latest summary written by the status logger.
pub const STATUS_SUMMARY: &str = "status_summary";

const HEARTBEAT_PREFIX: &str = "module_heartbeat:";
const ERROR_PREFIX: &str = "module_error:";

/// `module_heartbeat:<name>`
pub fn heartbeat_key(module: &str) -> String {
    format!("{HEARTBEAT_PREFIX}{module}")
}

/// `module_error:<name>`
pub fn error_key(module: &str) -> String {
    format!("{ERROR_PREFIX}{module}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_module_keys() {
        assert_eq!(heartbeat_key("sensors"), "module_heartbeat:sensors");
        assert_eq!(error_key("sensors"), "module_error:sensors");
    }
}
