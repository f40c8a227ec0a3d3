//! Process snapshot provider backed by sysinfo.

use std::panic::{catch_unwind, AssertUnwindSafe};

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    /// Resident memory in bytes.
    pub memory_usage: u64,
    /// Percent of one core since the previous refresh.
    pub cpu_usage: f64,
    /// Unix seconds.
    pub start_time: u64,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("process snapshot refresh failed: {0}")]
    RefreshFailed(String),
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Scheduling policy requested alongside a priority change. The agent only
/// ever asks to keep the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    Unchanged,
}

pub trait ProcessProvider: Send {
    /// Re-read the live process table. On error the previous snapshot is kept.
    fn refresh_snapshot(&mut self) -> Result<usize, ProviderError>;

    /// Most recent snapshot, in provider order.
    fn processes(&self) -> &[ProcessRecord];

    fn adjust_priority(
        &mut self,
        pid: u32,
        priority: u32,
        policy: SchedPolicy,
    ) -> Result<(), ProviderError>;
}

// Only what the protocol reports; skips env/cwd/cmd collection.
fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_cpu().with_memory()
}

// sysinfo can report NaN for a process sampled only once
fn finite_or_zero(v: f32) -> f64 {
    if v.is_finite() {
        f64::from(v)
    } else {
        0.0
    }
}

pub struct SysinfoProcesses {
    sys: System,
    snapshot: Vec<ProcessRecord>,
}

impl SysinfoProcesses {
    pub fn new() -> Self {
        Self {
            sys: System::new_with_specifics(RefreshKind::nothing().with_processes(refresh_kind())),
            snapshot: Vec::new(),
        }
    }
}

impl Default for SysinfoProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProvider for SysinfoProcesses {
    fn refresh_snapshot(&mut self) -> Result<usize, ProviderError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProviderError::Unsupported("process enumeration"));
        }
        let sys = &mut self.sys;
        catch_unwind(AssertUnwindSafe(|| {
            sys.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());
        }))
        .map_err(|e| {
            let msg = e
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| e.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "sysinfo panicked".into());
            ProviderError::RefreshFailed(msg)
        })?;

        let mut snapshot: Vec<ProcessRecord> = self
            .sys
            .processes()
            .values()
            .map(|p| ProcessRecord {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                memory_usage: p.memory(),
                cpu_usage: finite_or_zero(p.cpu_usage()),
                start_time: p.start_time(),
            })
            .collect();
        snapshot.sort_by_key(|p| p.pid);
        self.snapshot = snapshot;
        Ok(self.snapshot.len())
    }

    fn processes(&self) -> &[ProcessRecord] {
        &self.snapshot
    }

    fn adjust_priority(
        &mut self,
        pid: u32,
        priority: u32,
        policy: SchedPolicy,
    ) -> Result<(), ProviderError> {
        info!(pid, priority, ?policy, "priority adjustment requested but not available");
        Err(ProviderError::Unsupported("priority adjustment"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_contains_this_process() {
        let mut p = SysinfoProcesses::new();
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            assert!(p.refresh_snapshot().is_err());
            return;
        }
        let n = p.refresh_snapshot().expect("refresh");
        assert_eq!(n, p.processes().len());
        let me = std::process::id();
        assert!(p.processes().iter().any(|r| r.pid == me));
        assert!(p.processes().windows(2).all(|w| w[0].pid < w[1].pid));
    }

    #[test]
    fn priority_adjustment_always_fails() {
        let mut p = SysinfoProcesses::new();
        let err = p
            .adjust_priority(std::process::id(), 0, SchedPolicy::Unchanged)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[test]
    fn non_finite_cpu_reads_as_zero() {
        assert_eq!(finite_or_zero(f32::NAN), 0.0);
        assert_eq!(finite_or_zero(f32::INFINITY), 0.0);
        assert_eq!(finite_or_zero(12.5), 12.5);
    }
}
