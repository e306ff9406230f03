//! CPU utilization sampler
//!
//! Values are in percent of one logical CPU, summed over all cores (or over
//! all matching processes), so a fully busy 8-thread host reads 800.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use pipeline_bench_core::ProbeError;
use sysinfo::{
    CpuRefreshKind, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System,
    IS_SUPPORTED_SYSTEM, MINIMUM_CPU_UPDATE_INTERVAL,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::Reading;

fn cpu_refresh() -> RefreshKind {
    RefreshKind::nothing().with_cpu(CpuRefreshKind::everything())
}

/// Number of logical CPUs, at least 1
pub(crate) fn logical_cpus() -> usize {
    System::new_with_specifics(cpu_refresh()).cpus().len().max(1)
}

pub(crate) fn spawn(
    handle: &Handle,
    process: Option<String>,
    interval: Duration,
    reading: Arc<Reading>,
) -> Result<JoinHandle<()>, ProbeError> {
    if !IS_SUPPORTED_SYSTEM {
        return Err(ProbeError::Cpu(
            "CPU sampling is not supported on this platform".to_string(),
        ));
    }
    Ok(handle.spawn(sample_loop(process, interval, reading)))
}

async fn sample_loop(process: Option<String>, interval: Duration, reading: Arc<Reading>) {
    let mut system = System::new_with_specifics(cpu_refresh());
    let mut ticker = tokio::time::interval(interval.max(MINIMUM_CPU_UPDATE_INTERVAL));

    // Usage is a delta between refreshes, so take a baseline first
    ticker.tick().await;
    sample(&mut system, process.as_deref());

    loop {
        ticker.tick().await;
        let value = sample(&mut system, process.as_deref());
        reading.store(value);
        tracing::trace!(cpu = value, "CPU sample");
    }
}

fn sample(system: &mut System, process: Option<&str>) -> f64 {
    match process {
        None => {
            system.refresh_cpu_usage();
            system
                .cpus()
                .iter()
                .map(|cpu| f64::from(cpu.cpu_usage()))
                .sum()
        }
        Some(name) => {
            system.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing().with_cpu(),
            );
            system
                .processes_by_exact_name(OsStr::new(name))
                .map(|p| f64::from(p.cpu_usage()))
                .sum()
        }
    }
}
