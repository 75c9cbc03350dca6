//! [`RuntimeContext`] – the shared key/value store.
//!
//! One context exists per runtime instance and is passed by `&mut` into
//! every module hook.  There is no schema: keys are conventions (see
//! [`keys`][crate::keys]) and values are arbitrary JSON values.  Because the
//! scheduler is single-threaded no locking is involved; a write made by one
//! module during its tick is visible to every module ordered after it in the
//! same tick.

use std::collections::HashMap;

use serde_json::Value;

use crate::keys;

/// Flat mapping from string key to [`serde_json::Value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeContext {
    entries: HashMap<String, Value>,
}

impl RuntimeContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Numeric value of `key`, if present and a number.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Iterate over all keys.  Order is unspecified.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// Look up a dotted path (e.g. `"quiet_mode.start"`) inside the seeded
    /// `settings` object.
    pub fn setting(&self, path: &str) -> Option<&Value> {
        let mut node = self.entries.get(keys::SETTINGS)?;
        for segment in path.split('.') {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    pub fn setting_f64(&self, path: &str) -> Option<f64> {
        self.setting(path).and_then(Value::as_f64)
    }

    pub fn setting_bool(&self, path: &str) -> Option<bool> {
        self.setting(path).and_then(Value::as_bool)
    }

    pub fn setting_str(&self, path: &str) -> Option<&str> {
        self.setting(path).and_then(Value::as_str)
    }

    // -------------------------------------------------------------------------
    // Restart requests
    // -------------------------------------------------------------------------

    /// Ask the scheduler to stop-then-start the named modules at the end of
    /// the current tick.
    ///
    /// Appends to a request already pending this tick instead of replacing
    /// it, so several writers compose.
    pub fn request_restart<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pending = match self.entries.remove(keys::RESTART_MODULES) {
            Some(Value::Array(items)) => items,
            Some(Value::String(name)) if !name.is_empty() => vec![Value::String(name)],
            _ => Vec::new(),
        };
        pending.extend(names.into_iter().map(|n| Value::String(n.into())));
        self.entries
            .insert(keys::RESTART_MODULES.to_string(), Value::Array(pending));
    }

    /// Drain the pending restart request.
    ///
    /// Accepts either a single name or a list of names under
    /// `restart_modules`; non-string list items are ignored.  The key is
    /// reset to an empty list so each request is consumed exactly once.
    /// Duplicate names are collapsed, keeping first-request order.
    pub fn take_restart_requests(&mut self) -> Vec<String> {
        let raw = self
            .entries
            .insert(keys::RESTART_MODULES.to_string(), Value::Array(Vec::new()));

        let names: Vec<String> = match raw {
            Some(Value::String(name)) => vec![name],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let mut out: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_typed_values() {
        let mut ctx = RuntimeContext::new();
        ctx.set("tick_ts", 12.5);
        ctx.set("quiet_mode_active", true);
        ctx.set("mode", "patrol");

        assert_eq!(ctx.get_f64("tick_ts"), Some(12.5));
        assert_eq!(ctx.get_bool("quiet_mode_active"), Some(true));
        assert_eq!(ctx.get_str("mode"), Some("patrol"));
        assert_eq!(ctx.get_f64("mode"), None);
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn remove_and_contains() {
        let mut ctx = RuntimeContext::new();
        assert!(ctx.is_empty());
        ctx.set("led_request:safety", json!({"color": "red"}));
        assert!(ctx.contains("led_request:safety"));
        assert!(ctx.remove("led_request:safety").is_some());
        assert!(!ctx.contains("led_request:safety"));
    }

    #[test]
    fn dotted_setting_lookup() {
        let mut ctx = RuntimeContext::new();
        ctx.set(
            keys::SETTINGS,
            json!({"performance": {"runtime_ema_alpha": 0.5}, "quiet_mode": {"enabled": true}}),
        );
        assert_eq!(ctx.setting_f64("performance.runtime_ema_alpha"), Some(0.5));
        assert_eq!(ctx.setting_bool("quiet_mode.enabled"), Some(true));
        assert!(ctx.setting("performance.missing").is_none());
        assert!(ctx.setting("quiet_mode.enabled.deeper").is_none());
    }

    #[test]
    fn setting_without_settings_tree_is_none() {
        let ctx = RuntimeContext::new();
        assert!(ctx.setting("anything").is_none());
    }

    #[test]
    fn take_restart_requests_accepts_single_name() {
        let mut ctx = RuntimeContext::new();
        ctx.set(keys::RESTART_MODULES, "vision");
        assert_eq!(ctx.take_restart_requests(), vec!["vision".to_string()]);
        assert_eq!(ctx.get(keys::RESTART_MODULES), Some(&json!([])));
    }

    #[test]
    fn take_restart_requests_accepts_list_and_dedups() {
        let mut ctx = RuntimeContext::new();
        ctx.set(keys::RESTART_MODULES, json!(["a", "b", "a", 7, ""]));
        assert_eq!(
            ctx.take_restart_requests(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn take_restart_requests_consumes_once() {
        let mut ctx = RuntimeContext::new();
        ctx.request_restart(["voice"]);
        assert_eq!(ctx.take_restart_requests().len(), 1);
        assert!(ctx.take_restart_requests().is_empty());
    }

    #[test]
    fn request_restart_appends_to_pending_string() {
        let mut ctx = RuntimeContext::new();
        ctx.set(keys::RESTART_MODULES, "slam");
        ctx.request_restart(["vision", "voice"]);
        assert_eq!(
            ctx.take_restart_requests(),
            vec!["slam".to_string(), "vision".to_string(), "voice".to_string()]
        );
    }

    #[test]
    fn missing_or_malformed_request_is_empty() {
        let mut ctx = RuntimeContext::new();
        assert!(ctx.take_restart_requests().is_empty());
        ctx.set(keys::RESTART_MODULES, 42);
        assert!(ctx.take_restart_requests().is_empty());
    }
}
