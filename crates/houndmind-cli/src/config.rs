//! Config file – reads/writes `~/.houndmind/config.toml`.
//!
//! ```toml
//! [runtime]
//! tick_hz = 10
//!
//! [settings.quiet_mode]
//! enabled = true
//! start = "22:00"
//! end = "07:00"
//!
//! [[modules]]
//! name = "watchdog"
//! required = true
//! options = { stale_after_s = 5.0 }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use houndmind_runtime::{ModuleSpec, RuntimeConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `[runtime]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSection {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Absent means run until interrupted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u64>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            max_cycles: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// Free-form tree, seeded into the context as `settings`.
    #[serde(default = "empty_object")]
    pub settings: Value,

    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleSpec>,
}

fn default_tick_hz() -> u32 {
    10
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_modules() -> Vec<ModuleSpec> {
    let mut watchdog = ModuleSpec::new("watchdog");
    watchdog.options = serde_json::json!({
        "stale_after_s": 5.0,
        "restart_cooldown_s": 10.0,
        "max_restarts": 3,
    });
    vec![
        watchdog,
        ModuleSpec::new("status_log"),
        ModuleSpec::new("health_sampler"),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeSection::default(),
            settings: empty_object(),
            modules: default_modules(),
        }
    }
}

impl Config {
    /// Scheduler configuration; the whole file is seeded as `config`.
    pub fn runtime_config(&self) -> Result<RuntimeConfig, String> {
        let config =
            serde_json::to_value(self).map_err(|e| format!("Failed to convert config: {e}"))?;
        Ok(RuntimeConfig {
            tick_hz: self.runtime.tick_hz,
            max_cycles: self.runtime.max_cycles,
            settings: self.settings.clone(),
            config,
        })
    }
}

/// Return the path to `~/.houndmind/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".houndmind").join("config.toml")
}

/// Load the config, falling back to defaults when the file is absent.
/// Environment overrides apply either way.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

/// Parse the file at `path`.  `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {e}", path.display()))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config at {}: {e}", path.display()))?;
    Ok(Some(cfg))
}

/// Apply `HOUNDMIND_*` overrides.
///
/// | Variable | Field |
/// |---|---|
/// | `HOUNDMIND_TICK_HZ` | `runtime.tick_hz` |
/// | `HOUNDMIND_MAX_CYCLES` | `runtime.max_cycles` |
///
/// Unlike the file, a malformed override is an error: it was set on purpose.
pub fn apply_env_overrides(cfg: &mut Config) -> Result<(), String> {
    if let Ok(v) = std::env::var("HOUNDMIND_TICK_HZ") {
        cfg.runtime.tick_hz = v
            .trim()
            .parse()
            .map_err(|_| format!("HOUNDMIND_TICK_HZ must be a positive integer, got '{v}'"))?;
    }
    if let Ok(v) = std::env::var("HOUNDMIND_MAX_CYCLES")
        && !v.trim().is_empty()
    {
        let cycles = v
            .trim()
            .parse()
            .map_err(|_| format!("HOUNDMIND_MAX_CYCLES must be an integer, got '{v}'"))?;
        cfg.runtime.max_cycles = Some(cycles);
    }
    Ok(())
}

/// Write `cfg`, creating the parent directory with owner-only permissions.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {e}"))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {e}"))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {e}"))?;

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {e}", path.display()))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {e}", path.display()))?;
    Ok(())
}
