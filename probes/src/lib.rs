//! Host utilization probes for pipeline-bench
//!
//! [`SystemProbe`] implements the core `UtilizationProbe` trait with two
//! background samplers:
//!
//! - CPU: sysinfo, either whole-host or summed over processes with a given name
//! - GPU: the busy percentage reported by `intel_gpu_top -J`
//!
//! Workers read the latest values lock-free once per received frame.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cpu;
mod gpu;

pub use gpu::SampleDecoder;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pipeline_bench_core::{ProbeError, UtilizationProbe};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Default GPU sampling command
pub const DEFAULT_GPU_COMMAND: &str = "intel_gpu_top";

/// Default sampling period
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Probe options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Only count CPU time of processes with this exact name
    pub cpu_process: Option<String>,
    /// GPU sampling program, `None` disables GPU sampling
    pub gpu_command: Option<String>,
    /// Sampling period of both samplers
    pub interval: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            cpu_process: None,
            gpu_command: Some(DEFAULT_GPU_COMMAND.to_string()),
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Latest sampled value, shared between a sampler task and readers
#[derive(Debug, Default)]
pub(crate) struct Reading(AtomicU64);

impl Reading {
    pub(crate) fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// CPU and GPU utilization probe backed by background sampler tasks
#[derive(Debug)]
pub struct SystemProbe {
    settings: ProbeSettings,
    cpu: Arc<Reading>,
    gpu: Arc<Reading>,
    cpu_threads: usize,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SystemProbe {
    /// Create a probe; nothing is sampled until [`UtilizationProbe::start`]
    pub fn new(settings: ProbeSettings) -> Self {
        Self {
            settings,
            cpu: Arc::new(Reading::default()),
            gpu: Arc::new(Reading::default()),
            cpu_threads: cpu::logical_cpus(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Probe options
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }
}

impl UtilizationProbe for SystemProbe {
    fn start(&self) -> Result<(), ProbeError> {
        let handle = Handle::try_current()
            .map_err(|e| ProbeError::Cpu(format!("no async runtime: {e}")))?;

        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Ok(());
        }

        tasks.push(cpu::spawn(
            &handle,
            self.settings.cpu_process.clone(),
            self.settings.interval,
            Arc::clone(&self.cpu),
        )?);
        tracing::info!(
            cpu_threads = self.cpu_threads,
            process = ?self.settings.cpu_process,
            interval_ms = self.settings.interval.as_millis() as u64,
            "CPU sampler started"
        );

        if let Some(command) = &self.settings.gpu_command {
            tasks.push(gpu::spawn(
                &handle,
                command,
                self.settings.interval,
                Arc::clone(&self.gpu),
            )?);
            tracing::info!(command = %command, "GPU sampler started");
        }

        Ok(())
    }

    fn stop(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in &tasks {
            task.abort();
        }
        if !tasks.is_empty() {
            tracing::info!(samplers = tasks.len(), "Utilization samplers stopped");
        }
    }

    fn cpu_utilization(&self) -> f64 {
        self.cpu.load()
    }

    fn gpu_utilization(&self) -> f64 {
        self.gpu.load()
    }

    fn cpu_threads(&self) -> usize {
        self.cpu_threads
    }
}

impl Drop for SystemProbe {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_roundtrip() {
        let reading = Reading::default();
        assert_eq!(reading.load(), 0.0);
        reading.store(37.5);
        assert_eq!(reading.load(), 37.5);
    }

    #[test]
    fn test_default_settings() {
        let settings = ProbeSettings::default();
        assert_eq!(settings.gpu_command.as_deref(), Some("intel_gpu_top"));
        assert_eq!(settings.interval, Duration::from_secs(1));
        assert!(settings.cpu_process.is_none());
    }

    #[test]
    fn test_start_requires_runtime() {
        let probe = SystemProbe::new(ProbeSettings::default());
        assert!(matches!(probe.start(), Err(ProbeError::Cpu(_))));
    }

    #[tokio::test]
    async fn test_cpu_only_probe_start_stop() {
        let probe = SystemProbe::new(ProbeSettings {
            gpu_command: None,
            interval: Duration::from_millis(250),
            ..ProbeSettings::default()
        });
        assert!(probe.cpu_threads() >= 1);

        probe.start().unwrap();
        // Starting twice keeps the running samplers
        probe.start().unwrap();
        assert_eq!(probe.tasks.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let cpu = probe.cpu_utilization();
        assert!(cpu >= 0.0);
        assert!(cpu <= 100.0 * probe.cpu_threads() as f64 + 1.0);
        assert_eq!(probe.gpu_utilization(), 0.0);

        probe.stop();
        assert!(probe.tasks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_gpu_command() {
        let probe = SystemProbe::new(ProbeSettings {
            gpu_command: Some("definitely-not-a-gpu-tool".to_string()),
            ..ProbeSettings::default()
        });

        assert!(matches!(probe.start(), Err(ProbeError::Gpu(_))));
        // The CPU sampler keeps running
        assert_eq!(probe.tasks.lock().len(), 1);
        probe.stop();
    }
}
