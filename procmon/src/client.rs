//! Minimal TCP client helpers for requesting process data from the agent.

use std::time::Duration;

use anyhow::{bail, Context};
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

use crate::types::{DetailedDetails, ProcessList, Request, SimpleDetails, SuspendResult};

/// How long to wait for a reply before treating the request as unanswered.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

// Connect to the agent at HOST:PORT
pub async fn connect(addr: &str) -> anyhow::Result<TcpStream> {
    TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))
}

/// Send one request and collect the reply text. `Ok(None)` means the agent
/// stayed silent, which is how it answers requests it does not understand.
pub async fn request_raw(
    stream: &mut TcpStream,
    req: &Request,
    wait: Duration,
) -> anyhow::Result<Option<String>> {
    let frame = serde_json::to_vec(req)?;
    stream
        .write_all(&frame)
        .await
        .context("failed to send request")?;

    let deadline = Instant::now() + wait;
    let mut reply = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(res) => res.context("failed to read reply")?,
            // Names may carry raw control bytes the agent does not escape, so
            // an unparseable reply is still handed back once time runs out.
            Err(_) if reply.is_empty() => return Ok(None),
            Err(_) => break,
        };
        if n == 0 {
            bail!("agent closed the connection");
        }
        reply.extend_from_slice(&chunk[..n]);
        if serde_json::from_slice::<IgnoredAny>(&reply).is_ok() {
            break;
        }
    }
    Ok(Some(String::from_utf8_lossy(&reply).into_owned()))
}

async fn request<T: DeserializeOwned>(
    stream: &mut TcpStream,
    req: &Request,
    wait: Duration,
) -> anyhow::Result<Option<T>> {
    let Some(text) = request_raw(stream, req, wait).await? else {
        return Ok(None);
    };
    let parsed = serde_json::from_str(&text)
        .with_context(|| format!("unexpected reply to {}: {text}", req.request_type))?;
    Ok(Some(parsed))
}

pub async fn request_processes(
    stream: &mut TcpStream,
    wait: Duration,
) -> anyhow::Result<Option<ProcessList>> {
    request(stream, &Request::processes(), wait).await
}

pub async fn request_details(
    stream: &mut TcpStream,
    pid: u32,
    wait: Duration,
) -> anyhow::Result<Option<SimpleDetails>> {
    request(stream, &Request::simple_details(pid), wait).await
}

pub async fn request_history(
    stream: &mut TcpStream,
    pid: u32,
    wait: Duration,
) -> anyhow::Result<Option<DetailedDetails>> {
    request(stream, &Request::detailed_details(pid), wait).await
}

pub async fn request_suspend(
    stream: &mut TcpStream,
    pid: u32,
    wait: Duration,
) -> anyhow::Result<Option<SuspendResult>> {
    request(stream, &Request::suspend(pid), wait).await
}
