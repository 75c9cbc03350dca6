//! [`HealthSamplerModule`] – background load sampling.
//!
//! `start` spawns a worker thread that reads the load-average file every
//! `interval_s` and hands samples over a bounded channel.  `tick` never
//! blocks: it drains whatever arrived since the last tick and publishes the
//! newest sample as `system_health`.  When the channel is full the worker
//! drops the sample instead of waiting.
//!
//! A missing or unreadable source fails `start` with
//! [`ModuleError::Unavailable`], so an optional instance disables itself on
//! hosts without `/proc`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use houndmind_types::{Module, ModuleError, ModuleStatus, RuntimeContext, keys};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, info, warn};

use crate::scheduler::wall_clock_ts;

/// Longest single sleep of the worker, so `stop` is never held up by a long
/// interval.
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthSamplerConfig {
    pub interval_s: f64,
    pub source: PathBuf,
    /// Channel capacity.  Floored at 1.
    pub capacity: usize,
}

impl Default for HealthSamplerConfig {
    fn default() -> Self {
        Self {
            interval_s: 1.0,
            source: PathBuf::from("/proc/loadavg"),
            capacity: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub load_1m: f64,
    pub load_5m: f64,
    pub load_15m: f64,
    pub sampled_ts: f64,
}

/// Parse the first three fields of a `/proc/loadavg` line.
pub fn parse_loadavg(raw: &str) -> Option<(f64, f64, f64)> {
    let mut fields = raw.split_whitespace().map(str::parse::<f64>);
    let one = fields.next()?.ok()?;
    let five = fields.next()?.ok()?;
    let fifteen = fields.next()?.ok()?;
    Some((one, five, fifteen))
}

fn read_sample(source: &Path) -> Result<HealthSample, String> {
    let raw = fs::read_to_string(source).map_err(|e| format!("{}: {e}", source.display()))?;
    let (load_1m, load_5m, load_15m) =
        parse_loadavg(&raw).ok_or_else(|| format!("{}: unrecognised format", source.display()))?;
    Ok(HealthSample {
        load_1m,
        load_5m,
        load_15m,
        sampled_ts: wall_clock_ts(),
    })
}

struct Worker {
    stop: Arc<AtomicBool>,
    rx: mpsc::Receiver<HealthSample>,
    handle: JoinHandle<()>,
}

pub struct HealthSamplerModule {
    status: ModuleStatus,
    config: HealthSamplerConfig,
    worker: Option<Worker>,
    samples: u64,
}

impl HealthSamplerModule {
    pub fn new(status: ModuleStatus, config: HealthSamplerConfig) -> Self {
        Self {
            status,
            config,
            worker: None,
            samples: 0,
        }
    }

    pub fn config(&self) -> &HealthSamplerConfig {
        &self.config
    }

    /// Samples consumed since construction.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    fn shutdown_worker(&mut self) -> Result<(), ModuleError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.stop.store(true, Ordering::SeqCst);
        drop(worker.rx);
        worker
            .handle
            .join()
            .map_err(|_| ModuleError::failed("health sampler thread panicked"))
    }
}

fn run_worker(
    source: PathBuf,
    interval: Duration,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<HealthSample>,
) {
    while !stop.load(Ordering::SeqCst) {
        match read_sample(&source) {
            Ok(sample) => match tx.try_send(sample) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("health channel full; dropping sample"),
                Err(TrySendError::Closed(_)) => return,
            },
            Err(e) => {
                warn!(error = %e, "health sampler read failed; exiting");
                return;
            }
        }

        let deadline = Instant::now() + interval;
        while !stop.load(Ordering::SeqCst) {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            thread::sleep(left.min(STOP_POLL));
        }
    }
}

impl Module for HealthSamplerModule {
    fn status(&self) -> &ModuleStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut ModuleStatus {
        &mut self.status
    }

    fn start(&mut self, _ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        // A restart arrives here after stop, but be safe if it did not.
        self.shutdown_worker()?;

        read_sample(&self.config.source).map_err(ModuleError::Unavailable)?;

        let interval = Duration::try_from_secs_f64(self.config.interval_s)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(1));
        let (tx, rx) = mpsc::channel(self.config.capacity.max(1));
        let stop = Arc::new(AtomicBool::new(false));

        let source = self.config.source.clone();
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("{}-sampler", self.status.name))
            .spawn(move || run_worker(source, interval, worker_stop, tx))
            .map_err(|e| ModuleError::failed(format!("spawn sampler thread: {e}")))?;

        info!(
            module = %self.status.name,
            source = %self.config.source.display(),
            interval_s = interval.as_secs_f64(),
            "health sampler started"
        );
        self.worker = Some(Worker { stop, rx, handle });
        Ok(())
    }

    fn tick(&mut self, ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        let Some(worker) = self.worker.as_mut() else {
            return Err(ModuleError::failed("health sampler not started"));
        };

        let mut latest = None;
        let mut disconnected = false;
        loop {
            match worker.rx.try_recv() {
                Ok(sample) => {
                    self.samples += 1;
                    latest = Some(sample);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if let Some(sample) = latest {
            let value = serde_json::to_value(&sample).map_err(|e| ModuleError::Context {
                key: keys::SYSTEM_HEALTH.to_string(),
                details: e.to_string(),
            })?;
            ctx.set(keys::SYSTEM_HEALTH, value);
        }

        if disconnected {
            return Err(ModuleError::failed("health sampler thread exited"));
        }
        Ok(())
    }

    fn stop(&mut self, _ctx: &mut RuntimeContext) -> Result<(), ModuleError> {
        self.shutdown_worker()
    }
}

impl Drop for HealthSamplerModule {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_worker() {
            debug!(error = %e, "health sampler drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn loadavg_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn sampler(source: &Path) -> HealthSamplerModule {
        HealthSamplerModule::new(
            ModuleStatus::new("health", true, false),
            HealthSamplerConfig {
                interval_s: 0.01,
                source: source.to_path_buf(),
                capacity: 4,
            },
        )
    }

    /// Tick until `done` holds or the attempt budget runs out.
    fn tick_until(
        m: &mut HealthSamplerModule,
        ctx: &mut RuntimeContext,
        mut done: impl FnMut(&Result<(), ModuleError>, &RuntimeContext) -> bool,
    ) -> bool {
        for _ in 0..400 {
            let outcome = m.tick(ctx);
            if done(&outcome, ctx) {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn parses_loadavg_line() {
        assert_eq!(
            parse_loadavg("0.52 0.58 0.59 1/467 12345\n"),
            Some((0.52, 0.58, 0.59))
        );
        assert_eq!(parse_loadavg("0.52 0.58"), None);
        assert_eq!(parse_loadavg("high medium low"), None);
    }

    #[test]
    fn missing_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = sampler(&dir.path().join("loadavg"));
        let mut ctx = RuntimeContext::new();
        let err = m.start(&mut ctx).unwrap_err();
        assert!(matches!(err, ModuleError::Unavailable(_)));
        assert!(!m.is_running());
    }

    #[test]
    fn publishes_samples_from_worker() {
        let file = loadavg_file("0.50 0.40 0.30 1/100 42\n");
        let mut m = sampler(file.path());
        let mut ctx = RuntimeContext::new();
        m.start(&mut ctx).unwrap();
        assert!(m.is_running());

        let seen = tick_until(&mut m, &mut ctx, |outcome, ctx| {
            outcome.is_ok() && ctx.contains(keys::SYSTEM_HEALTH)
        });
        assert!(seen, "no sample arrived");
        let health = ctx.get(keys::SYSTEM_HEALTH).unwrap();
        assert_eq!(health["load_1m"], 0.5);
        assert_eq!(health["load_15m"], 0.3);
        assert!(m.samples() >= 1);

        m.stop(&mut ctx).unwrap();
        assert!(!m.is_running());
    }

    #[test]
    fn tick_reports_dead_worker() {
        let file = loadavg_file("0.10 0.10 0.10 1/1 1\n");
        let path = file.path().to_path_buf();
        let mut m = sampler(&path);
        let mut ctx = RuntimeContext::new();
        m.start(&mut ctx).unwrap();

        file.close().unwrap();
        let failed = tick_until(&mut m, &mut ctx, |outcome, _| outcome.is_err());
        assert!(failed, "worker exit was never reported");
        m.stop(&mut ctx).unwrap();
    }

    #[test]
    fn tick_before_start_is_an_error() {
        let file = loadavg_file("0.10 0.10 0.10 1/1 1\n");
        let mut m = sampler(file.path());
        assert!(m.tick(&mut RuntimeContext::new()).is_err());
    }

    #[test]
    fn restart_replaces_worker() {
        let file = loadavg_file("1.00 1.00 1.00 1/1 1\n");
        let mut m = sampler(file.path());
        let mut ctx = RuntimeContext::new();
        m.start(&mut ctx).unwrap();
        m.stop(&mut ctx).unwrap();
        m.start(&mut ctx).unwrap();
        assert!(m.is_running());
        m.stop(&mut ctx).unwrap();
        // Stopping twice is harmless.
        m.stop(&mut ctx).unwrap();
    }
}
