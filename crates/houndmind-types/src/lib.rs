//! `houndmind-types` – shared contracts of the HoundMind runtime.
//!
//! Everything that more than one crate needs to agree on lives here: the
//! [`Module`] trait every behavior unit implements, the [`ModuleStatus`]
//! record the scheduler maintains for it, the [`RuntimeContext`] that is
//! threaded through every call, the well-known context [`keys`], and the
//! error enums.
//!
//! # Modules
//!
//! - [`context`] – [`RuntimeContext`]: the flat key/value store that is the
//!   only inter-module communication channel.
//! - [`module`] – [`Module`]: lifecycle contract (`start`/`tick`/`stop`/
//!   `disable`).
//! - [`keys`] – context key names produced and consumed by the runtime core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod context;
pub mod keys;
pub mod module;

pub use context::RuntimeContext;
pub use module::Module;

/// Scheduler-visible state of a single [`Module`].
///
/// Timestamps are wall-clock seconds since the Unix epoch.  The record is
/// serialised verbatim into the `module_statuses` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStatus {
    /// Unique name within one runtime instance.
    pub name: String,
    /// `false` once the module has been disabled; never flipped back by the
    /// scheduler.
    pub enabled: bool,
    /// A required module's startup failure is fatal to the whole runtime.
    pub required: bool,
    pub started: bool,
    pub last_tick_ts: Option<f64>,
    pub last_heartbeat_ts: Option<f64>,
    pub last_error: Option<String>,
    pub disabled_reason: Option<String>,
}

impl ModuleStatus {
    /// Fresh status for a module that has not been started yet.
    pub fn new(name: impl Into<String>, enabled: bool, required: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            required,
            started: false,
            last_tick_ts: None,
            last_heartbeat_ts: None,
            last_error: None,
            disabled_reason: None,
        }
    }
}

/// Failure raised by a module's `start`, `tick` or `stop` hook.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModuleError {
    #[error("{0}")]
    Failed(String),

    /// Hardware or backend the module depends on is not present.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The hook panicked; the payload message is preserved when it is a string.
    #[error("panicked: {0}")]
    Panicked(String),

    #[error("context key '{key}': {details}")]
    Context { key: String, details: String },
}

impl ModuleError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ModuleError::Failed(msg.into())
    }
}

/// Errors surfaced to the caller of the runtime.
///
/// Only [`RuntimeError::RequiredModuleFailed`] can happen once the runtime
/// is running; the rest are construction-time errors.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuntimeError {
    #[error("required module '{module}' failed to start: {reason}")]
    RequiredModuleFailed { module: String, reason: String },

    #[error("duplicate module name '{0}'")]
    DuplicateModule(String),

    #[error("no module factory registered for kind '{0}'")]
    UnknownModuleKind(String),

    #[error("invalid options for module '{module}': {details}")]
    InvalidModuleConfig { module: String, details: String },
}

impl RuntimeError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::RequiredModuleFailed { .. } => "required_module_failed",
            RuntimeError::DuplicateModule(_) => "duplicate_module",
            RuntimeError::UnknownModuleKind(_) => "unknown_module_kind",
            RuntimeError::InvalidModuleConfig { .. } => "invalid_module_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_is_not_started() {
        let status = ModuleStatus::new("gait", true, false);
        assert_eq!(status.name, "gait");
        assert!(status.enabled);
        assert!(!status.required);
        assert!(!status.started);
        assert!(status.last_tick_ts.is_none());
        assert!(status.last_error.is_none());
    }

    #[test]
    fn status_serialises_with_field_names() {
        let mut status = ModuleStatus::new("imu", false, true);
        status.last_error = Some("no device".to_string());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["enabled"], false);
        assert_eq!(json["required"], true);
        assert_eq!(json["last_error"], "no device");
        assert!(json["last_tick_ts"].is_null());
    }

    #[test]
    fn module_error_display() {
        assert_eq!(ModuleError::failed("bad read").to_string(), "bad read");
        assert!(
            ModuleError::Unavailable("camera".into())
                .to_string()
                .contains("camera")
        );
        let err = ModuleError::Context {
            key: "tick_ts".into(),
            details: "missing".into(),
        };
        assert!(err.to_string().contains("tick_ts"));
    }

    #[test]
    fn runtime_error_display_and_label() {
        let err = RuntimeError::RequiredModuleFailed {
            module: "motion".into(),
            reason: "servo bus offline".into(),
        };
        assert!(err.to_string().contains("motion"));
        assert!(err.to_string().contains("servo bus offline"));
        assert_eq!(err.as_label(), "required_module_failed");
        assert_eq!(
            RuntimeError::DuplicateModule("x".into()).as_label(),
            "duplicate_module"
        );
    }
}
