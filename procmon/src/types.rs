//! Types that mirror the agent's wire format.

use serde::{Deserialize, Serialize};

pub const GET_PROCESSES: &str = "GetProcesses";
pub const GET_SIMPLE_DETAILS: &str = "GetSimpleProcessDetails";
pub const GET_DETAILED_DETAILS: &str = "GetDetailedProcessDetails";
pub const SUSPEND_PROCESS: &str = "SuspendProcess";

/// Outbound request. Note the agent expects `PID` in upper case.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Request {
    pub request_type: &'static str,
    #[serde(rename = "PID", skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl Request {
    pub fn processes() -> Self {
        Self {
            request_type: GET_PROCESSES,
            pid: None,
        }
    }

    pub fn simple_details(pid: u32) -> Self {
        Self {
            request_type: GET_SIMPLE_DETAILS,
            pid: Some(pid),
        }
    }

    pub fn detailed_details(pid: u32) -> Self {
        Self {
            request_type: GET_DETAILED_DETAILS,
            pid: Some(pid),
        }
    }

    pub fn suspend(pid: u32) -> Self {
        Self {
            request_type: SUSPEND_PROCESS,
            pid: Some(pid),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessList {
    pub request_type: String,
    #[serde(default)]
    pub pids: Vec<u32>,
}

/// Everything past `pid` is absent when the agent does not know the process.
#[derive(Debug, Deserialize, Clone)]
pub struct SimpleDetails {
    pub request_type: String,
    pub pid: u32,
    pub name: Option<String>,
    pub user: Option<String>,
    pub uptime: Option<u64>,
    pub cpu_usage: Option<f64>,
    pub ram_usage: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub cpu_usage: f64,
    pub ram_usage: u64,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetailedDetails {
    pub request_type: String,
    pub pid: u32,
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SuspendResult {
    pub request_type: String,
    pub pid: u32,
    pub success: bool,
}
