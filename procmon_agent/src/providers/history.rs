//! Per-process sample history: bounded buffers filled by detailed queries.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::unix_now;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub pid: u32,
    pub cpu_usage: f64,
    pub memory_usage: u64,
    /// Unix seconds.
    pub timestamp: u64,
}

pub trait HistoryProvider: Send {
    fn record_sample(&mut self, pid: u32, cpu_usage: f64, memory_usage: u64);

    /// Up to `max_count` of the newest samples for `pid`, oldest first.
    fn samples(&self, pid: u32, max_count: usize) -> Vec<Sample>;
}

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

struct Series {
    samples: VecDeque<Sample>,
    // recording sequence of the newest sample, used to pick eviction victims
    touched: u64,
}

pub struct SampleHistory {
    depth: usize,
    max_processes: usize,
    series: HashMap<u32, Series>,
    seq: u64,
}

impl SampleHistory {
    /// Keep `depth` samples per pid for at most `max_processes` pids.
    pub fn new(depth: usize, max_processes: usize) -> Self {
        Self {
            depth: depth.max(1),
            max_processes: max_processes.max(1),
            series: HashMap::new(),
            seq: 0,
        }
    }

    pub fn tracked(&self) -> usize {
        self.series.len()
    }

    fn evict_stalest(&mut self) {
        let victim = self
            .series
            .iter()
            .min_by_key(|(_, s)| s.touched)
            .map(|(pid, _)| *pid);
        if let Some(pid) = victim {
            debug!(pid, "evicting sample history");
            self.series.remove(&pid);
        }
    }
}

impl HistoryProvider for SampleHistory {
    fn record_sample(&mut self, pid: u32, cpu_usage: f64, memory_usage: u64) {
        if !self.series.contains_key(&pid) && self.series.len() >= self.max_processes {
            self.evict_stalest();
        }
        self.seq += 1;
        let depth = self.depth;
        let series = self.series.entry(pid).or_insert_with(|| Series {
            samples: VecDeque::with_capacity(depth),
            touched: 0,
        });
        series.touched = self.seq;
        push_capped(
            &mut series.samples,
            Sample {
                pid,
                cpu_usage,
                memory_usage,
                timestamp: unix_now(),
            },
            depth,
        );
    }

    fn samples(&self, pid: u32, max_count: usize) -> Vec<Sample> {
        let Some(series) = self.series.get(&pid) else {
            return Vec::new();
        };
        let skip = series.samples.len().saturating_sub(max_count);
        series.samples.iter().skip(skip).copied().collect()
    }
}
