//! Data providers consumed by the request dispatcher.
//!
//! These hold no protocol knowledge: a process snapshot source, the per-pid
//! sample history and the pid-band grouping used for the `user` field.

pub mod group;
pub mod history;
pub mod process;

pub use group::ProcessGroup;
pub use history::{HistoryProvider, Sample, SampleHistory};
pub use process::{ProcessProvider, ProcessRecord, ProviderError, SchedPolicy, SysinfoProcesses};

/// Wall-clock seconds since the Unix epoch (0 if the clock is before it).
pub fn unix_now() -> u64 {
    u64::try_from(time::OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0)
}
