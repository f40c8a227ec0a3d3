//! procmon_agent entry point: config, logging, providers, then the event loop until Ctrl-C.

use std::env;

use anyhow::Context;
use procmon_agent::config::{parse_args, usage};
use procmon_agent::providers::{SampleHistory, SysinfoProcesses};
use procmon_agent::{AgentConfig, Dispatcher, Server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let prog = env::args().next().unwrap_or_else(|| "procmon_agent".into());
    let args = match parse_args(env::args()) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}\n{}", usage(&prog));
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{}", usage(&prog));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = AgentConfig::from_env();
    config.apply_args(&args);
    config.validate().context("invalid configuration")?;

    let dispatcher = Dispatcher::new(
        Box::new(SysinfoProcesses::new()),
        Box::new(SampleHistory::new(
            config.history_depth,
            config.history_processes,
        )),
        config.response_capacity,
        config.history_depth,
    );
    let (server, handle) = Server::bind(&config, dispatcher).await?;

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".into());
    info!(
        host,
        addr = %server.local_addr()?,
        max_clients = config.max_clients,
        "procmon agent listening"
    );

    let mut worker = server.spawn();
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            handle.shutdown();
            worker.await.context("event loop task failed")?;
        }
        res = &mut worker => {
            warn!("event loop exited on its own");
            res.context("event loop task failed")?;
        }
    }
    Ok(())
}
