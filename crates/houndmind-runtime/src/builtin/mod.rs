//! Modules shipped with the runtime.
//!
//! - [`StatusLogModule`] – periodic one-line summary of the module snapshot.
//! - [`HealthSamplerModule`] – background thread sampling system load.
//!
//! The watchdog lives in `houndmind-kernel`.

pub mod health_sampler;
pub mod status_log;

pub use health_sampler::{HealthSample, HealthSamplerConfig, HealthSamplerModule};
pub use status_log::{StatusLogConfig, StatusLogModule};
