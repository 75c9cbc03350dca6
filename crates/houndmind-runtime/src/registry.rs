//! [`ModuleRegistry`] – builds modules from configuration.
//!
//! The config file lists modules as [`ModuleSpec`]s.  Each spec names a
//! `kind`; the registry maps kinds to constructor closures and turns the
//! spec list into the ordered `Vec<Box<dyn Module>>` the scheduler takes.
//!
//! ```
//! use houndmind_runtime::registry::{ModuleRegistry, ModuleSpec};
//!
//! let registry = ModuleRegistry::with_builtins();
//! let spec: ModuleSpec = serde_json::from_value(serde_json::json!({
//!     "name": "watchdog",
//!     "options": { "stale_after_s": 2.0 }
//! }))
//! .unwrap();
//! let module = registry.build(&spec).unwrap();
//! assert_eq!(module.name(), "watchdog");
//! ```

use std::collections::HashMap;

use houndmind_kernel::{WatchdogConfig, WatchdogModule};
use houndmind_types::{Module, ModuleStatus, RuntimeError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::builtin::{HealthSamplerModule, StatusLogModule};

fn default_true() -> bool {
    true
}

/// One `[[modules]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    /// Factory to use; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub required: bool,
    /// Kind-specific options, handed to the factory untouched.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            enabled: true,
            required: false,
            options: Value::Null,
        }
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }

    /// Fresh [`ModuleStatus`] carrying the spec's flags.
    pub fn status(&self) -> ModuleStatus {
        ModuleStatus::new(self.name.clone(), self.enabled, self.required)
    }
}

/// Constructor for one module kind.
pub type ModuleFactory =
    Box<dyn Fn(&ModuleSpec) -> Result<Box<dyn Module>, RuntimeError> + Send + Sync>;

/// Map from kind to [`ModuleFactory`].
#[derive(Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `watchdog`, `status_log` and `health_sampler`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("watchdog", |spec| {
            let config: WatchdogConfig = parse_options(spec)?;
            Ok(Box::new(WatchdogModule::new(spec.status(), config)))
        });
        registry.register("status_log", |spec| {
            Ok(Box::new(StatusLogModule::new(spec.status(), parse_options(spec)?)))
        });
        registry.register("health_sampler", |spec| {
            Ok(Box::new(HealthSamplerModule::new(
                spec.status(),
                parse_options(spec)?,
            )))
        });
        registry
    }

    /// Register a factory.  Any previous factory for `kind` is replaced.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ModuleSpec) -> Result<Box<dyn Module>, RuntimeError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// # Errors
    ///
    /// [`RuntimeError::UnknownModuleKind`] when no factory matches, or
    /// whatever the factory returns.
    pub fn build(&self, spec: &ModuleSpec) -> Result<Box<dyn Module>, RuntimeError> {
        let factory = self
            .factories
            .get(spec.kind())
            .ok_or_else(|| RuntimeError::UnknownModuleKind(spec.kind().to_string()))?;
        debug!(module = %spec.name, kind = spec.kind(), "building module");
        factory(spec)
    }

    /// Build every spec, preserving order.  Stops at the first error.
    pub fn build_all(&self, specs: &[ModuleSpec]) -> Result<Vec<Box<dyn Module>>, RuntimeError> {
        specs.iter().map(|spec| self.build(spec)).collect()
    }
}

/// Deserialise `spec.options` into a module's config type.  Missing options
/// give the type's default.
pub fn parse_options<T>(spec: &ModuleSpec) -> Result<T, RuntimeError>
where
    T: DeserializeOwned + Default,
{
    if spec.options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(spec.options.clone()).map_err(|e| RuntimeError::InvalidModuleConfig {
        module: spec.name.clone(),
        details: e.to_string(),
    })
}
