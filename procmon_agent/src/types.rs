//! Serializable shapes that appear inside responses.

use serde::Serialize;

use crate::providers::Sample;

/// One element of a `GetDetailedProcessDetails` `entries` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub cpu_usage: f64,
    pub ram_usage: u64,
    pub timestamp: u64,
}

impl From<&Sample> for HistoryEntry {
    fn from(s: &Sample) -> Self {
        Self {
            cpu_usage: s.cpu_usage,
            ram_usage: s.memory_usage,
            timestamp: s.timestamp,
        }
    }
}
