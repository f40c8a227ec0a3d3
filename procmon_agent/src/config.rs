//! Agent configuration: defaults, then `PROCMON_AGENT_*` environment, then command line.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_CLIENTS: usize = 30;
pub const DEFAULT_FRAME_SIZE: usize = 4096;
pub const DEFAULT_RESPONSE_CAPACITY: usize = 8192;
pub const DEFAULT_HISTORY_DEPTH: usize = 60;
pub const DEFAULT_HISTORY_PROCESSES: usize = 256;
pub const DEFAULT_POLL_MS: u64 = 1000;

/// Smallest response buffer that still holds every fixed response header.
pub const MIN_RESPONSE_CAPACITY: usize = 64;
/// Every read zero-fills a buffer of `frame_size` bytes.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("response capacity {0} is below the minimum of {MIN_RESPONSE_CAPACITY} bytes")]
    ResponseCapacityTooSmall(usize),
    #[error("frame size {0} exceeds the maximum of {MAX_FRAME_SIZE} bytes")]
    FrameSizeTooLarge(usize),
    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("unexpected argument {0:?}")]
    UnexpectedArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub max_clients: usize,
    /// Largest frame accepted by a single read.
    pub frame_size: usize,
    pub response_capacity: usize,
    /// Samples kept, and returned, per process.
    pub history_depth: usize,
    pub history_processes: usize,
    pub poll_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            frame_size: DEFAULT_FRAME_SIZE,
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
            history_depth: DEFAULT_HISTORY_DEPTH,
            history_processes: DEFAULT_HISTORY_PROCESSES,
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

fn env_parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl AgentConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg
    }

    /// Unparseable values are ignored and the previous value kept.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env_parse(&lookup, "PROCMON_AGENT_PORT") {
            self.port = v;
        }
        if let Some(v) = env_parse(&lookup, "PROCMON_AGENT_MAX_CLIENTS") {
            self.max_clients = v;
        }
        if let Some(v) = env_parse(&lookup, "PROCMON_AGENT_FRAME_SIZE") {
            self.frame_size = v;
        }
        if let Some(v) = env_parse(&lookup, "PROCMON_AGENT_RESPONSE_CAPACITY") {
            self.response_capacity = v;
        }
        if let Some(v) = env_parse(&lookup, "PROCMON_AGENT_HISTORY_DEPTH") {
            self.history_depth = v;
        }
        if let Some(v) = env_parse(&lookup, "PROCMON_AGENT_HISTORY_PROCESSES") {
            self.history_processes = v;
        }
        if let Some(ms) = env_parse::<u64>(&lookup, "PROCMON_AGENT_POLL_MS") {
            self.poll_interval = Duration::from_millis(ms);
        }
    }

    pub fn apply_args(&mut self, args: &AgentArgs) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(bind) = args.bind {
            self.bind = bind;
        }
        if let Some(n) = args.max_clients {
            self.max_clients = n;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Zero("max_clients"));
        }
        if self.frame_size == 0 {
            return Err(ConfigError::Zero("frame_size"));
        }
        if self.frame_size > MAX_FRAME_SIZE {
            return Err(ConfigError::FrameSizeTooLarge(self.frame_size));
        }
        if self.history_depth == 0 {
            return Err(ConfigError::Zero("history_depth"));
        }
        if self.history_processes == 0 {
            return Err(ConfigError::Zero("history_processes"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll_interval"));
        }
        if self.response_capacity < MIN_RESPONSE_CAPACITY {
            return Err(ConfigError::ResponseCapacityTooSmall(self.response_capacity));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AgentArgs {
    pub port: Option<u16>,
    pub bind: Option<IpAddr>,
    pub max_clients: Option<usize>,
    pub help: bool,
}

pub fn usage(prog: &str) -> String {
    format!("Usage: {prog} [--port PORT|-p PORT] [--bind ADDR] [--max-clients N] [--help|-h]")
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value,
    })
}

/// Parse the agent command line; the first item is the program name.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<AgentArgs, ConfigError> {
    let mut it = args.into_iter();
    let _ = it.next(); // program name
    let mut out = AgentArgs::default();
    while let Some(arg) = it.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let value = |it: &mut I::IntoIter| inline.clone().or_else(|| it.next());
        match flag.as_str() {
            "-h" | "--help" => out.help = true,
            "--port" | "-p" => out.port = Some(parse_value(&flag, value(&mut it))?),
            "--bind" => out.bind = Some(parse_value(&flag, value(&mut it))?),
            "--max-clients" => out.max_clients = Some(parse_value(&flag, value(&mut it))?),
            _ => return Err(ConfigError::UnexpectedArgument(arg)),
        }
    }
    Ok(out)
}
