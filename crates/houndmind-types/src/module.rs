//! The [`Module`] capability contract.
//!
//! A module is an independently-lifecycled unit of behavior.  The runtime
//! calls [`Module::start`] once per activation, [`Module::tick`] every cycle
//! while the module is started, and [`Module::stop`] on shutdown or before a
//! restart.  Modules never talk to each other directly; they read and write
//! the shared [`RuntimeContext`].
//!
//! Implementors embed a [`ModuleStatus`] and hand it out through
//! [`Module::status`] / [`Module::status_mut`]:
//!
//! ```
//! use houndmind_types::{Module, ModuleError, ModuleStatus, RuntimeContext};
//!
//! struct Counter {
//!     status: ModuleStatus,
//!     count: u64,
//! }
//!
//! impl Module for Counter {
//!     fn status(&self) -> &ModuleStatus {
//!         &self.status
//!     }
//!     fn status_mut(&mut self) -> &mut ModuleStatus {
//!         &mut self.status
//!     }
//!     fn tick(&mut self, ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
//!         self.count += 1;
//!         ctx.set("counter", self.count);
//!         Ok(())
//!     }
//! }
//!
//! let mut counter = Counter { status: ModuleStatus::new("counter", true, false), count: 0 };
//! let mut ctx = RuntimeContext::new();
//! counter.tick(&mut ctx).unwrap();
//! assert_eq!(ctx.get_f64("counter"), Some(1.0));
//! ```

use crate::{ModuleError, ModuleStatus, RuntimeContext};

/// Lifecycle contract driven by the scheduler.
pub trait Module: Send {
    fn status(&self) -> &ModuleStatus;

    /// Mutable status.  Only the scheduler and [`Module::disable`] should
    /// write through this.
    fn status_mut(&mut self) -> &mut ModuleStatus;

    fn name(&self) -> &str {
        &self.status().name
    }

    /// Acquire resources (device handles, background threads).
    ///
    /// Must tolerate being called again after [`Module::stop`]; restarts rely
    /// on it.  An `Err` disables an optional module and aborts the runtime
    /// for a required one.
    fn start(&mut self, _ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        Ok(())
    }

    /// One bounded-latency unit of work.
    ///
    /// Expected conditions (no obstacle data yet, sensor warming up) should be
    /// reported through the context; `Err` is for unexpected failures and
    /// leaves the module eligible to tick again next cycle.
    fn tick(&mut self, ctx: &mut RuntimeContext) -> Result<(), ModuleError>;

    /// Release resources.  Must be safe after a partial or missing `start`.
    /// Failures are logged by the scheduler and otherwise ignored.
    fn stop(&mut self, _ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Permanently take the module out of rotation.
    ///
    /// The scheduler will neither tick nor restart a disabled module.
    fn disable(&mut self, reason: &str) {
        let status = self.status_mut();
        status.enabled = false;
        status.started = false;
        status.last_error = Some(reason.to_string());
        status.disabled_reason = Some(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop {
        status: ModuleStatus,
    }

    impl Module for Noop {
        fn status(&self) -> &ModuleStatus {
            &self.status
        }
        fn status_mut(&mut self) -> &mut ModuleStatus {
            &mut self.status
        }
        fn tick(&mut self, _ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    #[test]
    fn name_comes_from_status() {
        let m = Noop {
            status: ModuleStatus::new("noop", true, false),
        };
        assert_eq!(m.name(), "noop");
    }

    #[test]
    fn disable_records_reason_and_clears_started() {
        let mut m = Noop {
            status: ModuleStatus::new("camera", true, false),
        };
        m.status_mut().started = true;
        m.disable("picamera backend missing");

        let status = m.status();
        assert!(!status.enabled);
        assert!(!status.started);
        assert_eq!(status.last_error.as_deref(), Some("picamera backend missing"));
        assert_eq!(
            status.disabled_reason.as_deref(),
            Some("picamera backend missing")
        );
    }

    #[test]
    fn default_hooks_are_noops() {
        let mut m = Noop {
            status: ModuleStatus::new("noop", true, false),
        };
        let mut ctx = RuntimeContext::new();
        assert!(m.start(&mut ctx).is_ok());
        assert!(m.stop(&mut ctx).is_ok());
        assert!(ctx.is_empty());
    }
}
