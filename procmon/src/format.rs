//! Plain-text rendering of agent replies.

use std::fmt::Write as _;

use chrono::DateTime;

use crate::types::{DetailedDetails, ProcessList, SimpleDetails, SuspendResult};

pub fn human(b: u64) -> String {
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K {
        return format!("{b:.0}B");
    }
    let kb = b / K;
    if kb < K {
        return format!("{kb:.1}KB");
    }
    let mb = kb / K;
    if mb < K {
        return format!("{mb:.1}MB");
    }
    let gb = mb / K;
    if gb < K {
        return format!("{gb:.1}GB");
    }
    let tb = gb / K;
    format!("{tb:.2}TB")
}

pub fn uptime(secs: u64) -> String {
    let (d, rem) = (secs / 86_400, secs % 86_400);
    let (h, m, s) = (rem / 3600, rem % 3600 / 60, rem % 60);
    if d > 0 {
        format!("{d}d {h:02}h {m:02}m")
    } else if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}

pub fn timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn processes(list: &ProcessList) -> String {
    let mut out = format!("{} processes\n", list.pids.len());
    for chunk in list.pids.chunks(10) {
        let row: Vec<String> = chunk.iter().map(|p| format!("{p:>8}")).collect();
        out.push_str(&row.join(""));
        out.push('\n');
    }
    out
}

pub fn details(d: &SimpleDetails) -> String {
    let Some(name) = d.name.as_deref() else {
        return format!("pid {}: no such process\n", d.pid);
    };
    let mut out = String::new();
    let _ = writeln!(out, "pid       {}", d.pid);
    let _ = writeln!(out, "name      {name}");
    let _ = writeln!(out, "group     {}", d.user.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "uptime    {}", d.uptime.map(uptime).unwrap_or_else(|| "-".into()));
    let _ = writeln!(out, "cpu       {:.2}%", d.cpu_usage.unwrap_or(0.0));
    let _ = writeln!(out, "memory    {}", d.ram_usage.map(human).unwrap_or_else(|| "-".into()));
    out
}

pub fn history(h: &DetailedDetails) -> String {
    if h.entries.is_empty() {
        return format!("pid {}: no samples\n", h.pid);
    }
    let mut out = format!("pid {}: {} samples\n", h.pid, h.entries.len());
    for e in &h.entries {
        let _ = writeln!(
            out,
            "  {}  cpu {:>6.2}%  mem {:>9}",
            timestamp(e.timestamp),
            e.cpu_usage,
            human(e.ram_usage)
        );
    }
    out
}

pub fn suspend(s: &SuspendResult) -> String {
    if s.success {
        format!("pid {}: suspended\n", s.pid)
    } else {
        format!("pid {}: suspend failed\n", s.pid)
    }
}
