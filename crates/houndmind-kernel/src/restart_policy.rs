//! [`RestartPolicy`] – rate limiting for restart requests.
//!
//! The runtime's restart primitive has no built-in throttling; whoever files
//! a request owns that decision.  A policy answers two questions for a module
//! name: *may I restart it now?* and *has it used up its budget?*
//!
//! # Example
//!
//! ```
//! use houndmind_kernel::restart_policy::{CooldownPolicy, RestartPolicy};
//!
//! let mut policy = CooldownPolicy::new(10.0, 2);
//! assert!(policy.allow("vision", 100.0));
//! policy.record("vision", 100.0);
//!
//! // Inside the cooldown window.
//! assert!(!policy.allow("vision", 105.0));
//! assert!(policy.allow("vision", 110.0));
//! policy.record("vision", 110.0);
//!
//! // Budget of two restarts is spent.
//! assert!(!policy.allow("vision", 500.0));
//! assert!(policy.exhausted("vision"));
//! ```

use std::collections::HashMap;

/// Decides whether a restart request may be emitted for a module.
///
/// Timestamps are wall-clock seconds, normally the current `tick_ts`.
pub trait RestartPolicy: Send {
    fn allow(&self, module: &str, now: f64) -> bool;

    /// Account for a restart request that was just emitted.
    fn record(&mut self, module: &str, now: f64);

    /// Number of restarts recorded for `module`.
    fn restarts(&self, module: &str) -> u32;

    /// `true` when no further restarts will ever be allowed without a reset.
    fn exhausted(&self, module: &str) -> bool;

    /// Forget everything recorded for `module`.
    fn reset(&mut self, module: &str);
}

#[derive(Debug, Clone, Copy)]
struct RestartRecord {
    count: u32,
    last_restart_ts: f64,
}

/// Cooldown + maximum-restart budget, per module name.
///
/// A restart is allowed iff at least `cooldown_s` seconds passed since the
/// previous one and fewer than `max_restarts` have been recorded.  Counters
/// live as long as the policy unless [`RestartPolicy::reset`] is called.
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    cooldown_s: f64,
    max_restarts: u32,
    records: HashMap<String, RestartRecord>,
}

impl CooldownPolicy {
    pub fn new(cooldown_s: f64, max_restarts: u32) -> Self {
        Self {
            cooldown_s: cooldown_s.max(0.0),
            max_restarts,
            records: HashMap::new(),
        }
    }

    pub fn cooldown_s(&self) -> f64 {
        self.cooldown_s
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }
}

impl RestartPolicy for CooldownPolicy {
    fn allow(&self, module: &str, now: f64) -> bool {
        match self.records.get(module) {
            None => self.max_restarts > 0,
            Some(rec) => {
                rec.count < self.max_restarts && now - rec.last_restart_ts >= self.cooldown_s
            }
        }
    }

    fn record(&mut self, module: &str, now: f64) {
        let rec = self
            .records
            .entry(module.to_string())
            .or_insert(RestartRecord {
                count: 0,
                last_restart_ts: now,
            });
        rec.count = rec.count.saturating_add(1);
        rec.last_restart_ts = now;
    }

    fn restarts(&self, module: &str) -> u32 {
        self.records.get(module).map_or(0, |r| r.count)
    }

    fn exhausted(&self, module: &str) -> bool {
        self.restarts(module) >= self.max_restarts
    }

    fn reset(&mut self, module: &str) {
        self.records.remove(module);
    }
}
