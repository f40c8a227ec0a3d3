//! Request dispatch: one decoded request in, at most one encoded response out.

use tracing::{debug, info, warn};

use crate::encoder::{Response, ResponseEncoder};
use crate::proto::{Operation, Request};
use crate::providers::{
    unix_now, HistoryProvider, ProcessGroup, ProcessProvider, SchedPolicy,
};
use crate::types::HistoryEntry;

pub struct Dispatcher {
    processes: Box<dyn ProcessProvider>,
    history: Box<dyn HistoryProvider>,
    response_capacity: usize,
    history_limit: usize,
}

impl Dispatcher {
    pub fn new(
        processes: Box<dyn ProcessProvider>,
        history: Box<dyn HistoryProvider>,
        response_capacity: usize,
        history_limit: usize,
    ) -> Self {
        Self {
            processes,
            history,
            response_capacity,
            history_limit,
        }
    }

    /// Unknown operations and target-less requests that need a target yield `None`.
    pub fn dispatch(&mut self, request: Request) -> Option<Response> {
        let label = request.operation.label()?;
        if request.operation.needs_target() && request.target.is_none() {
            debug!(operation = label, "request without PID dropped");
            return None;
        }
        let pid = request.target.unwrap_or_default();
        let mut enc = ResponseEncoder::new(self.response_capacity);
        enc.field("request_type", label);
        match request.operation {
            Operation::ListProcesses => self.list_processes(&mut enc),
            Operation::SimpleDetails => self.simple_details(&mut enc, pid),
            Operation::DetailedDetails => self.detailed_details(&mut enc, pid),
            Operation::Suspend => self.suspend(&mut enc, pid),
            Operation::Unknown => return None,
        }
        if enc.truncated() {
            debug!(
                operation = label,
                capacity = enc.capacity(),
                "response truncated to fit buffer"
            );
        }
        Some(enc.finish())
    }

    // A failed refresh leaves whatever the provider last held.
    fn refresh(&mut self) {
        if let Err(e) = self.processes.refresh_snapshot() {
            warn!("{e}; serving last known snapshot");
        }
    }

    fn list_processes(&mut self, enc: &mut ResponseEncoder) {
        self.refresh();
        enc.begin_array("pids");
        for p in self.processes.processes() {
            if !enc.element(p.pid) {
                break;
            }
        }
        enc.close();
    }

    fn simple_details(&mut self, enc: &mut ResponseEncoder, pid: u32) {
        self.refresh();
        enc.field("pid", pid);
        let Some(p) = self.processes.processes().iter().find(|p| p.pid == pid) else {
            return;
        };
        enc.field("name", p.name.as_str());
        enc.field("user", ProcessGroup::classify(pid).name());
        enc.field("uptime", unix_now().saturating_sub(p.start_time));
        enc.field("cpu_usage", p.cpu_usage);
        enc.field("ram_usage", p.memory_usage);
    }

    fn detailed_details(&mut self, enc: &mut ResponseEncoder, pid: u32) {
        self.refresh();
        enc.field("pid", pid);
        enc.begin_array("entries");
        let current = self
            .processes
            .processes()
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| (p.cpu_usage, p.memory_usage));
        if let Some((cpu, mem)) = current {
            self.history.record_sample(pid, cpu, mem);
            for s in self.history.samples(pid, self.history_limit) {
                if !enc.element(HistoryEntry::from(&s)) {
                    break;
                }
            }
        }
        enc.close();
    }

    fn suspend(&mut self, enc: &mut ResponseEncoder, pid: u32) {
        let success = match self
            .processes
            .adjust_priority(pid, 0, SchedPolicy::Unchanged)
        {
            Ok(()) => true,
            Err(e) => {
                info!(pid, "suspend failed: {e}");
                false
            }
        };
        enc.field("pid", pid);
        enc.field("success", success);
    }
}
