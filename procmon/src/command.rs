//! Interactive/one-shot commands and how each maps onto a request.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::client::{request_details, request_history, request_processes, request_suspend};
use crate::format;

pub const COMMAND_HELP: &str = "Commands:
  processes        list all process ids
  details <pid>    details for one process
  history <pid>    sample history for one process
  suspend <pid>    suspend one process
  exit             close the connection";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Processes,
    Details(u32),
    History(u32),
    Suspend(u32),
    Exit,
}

impl Command {
    pub fn parse<'a, I: IntoIterator<Item = &'a str>>(words: I) -> Result<Self, String> {
        let mut it = words.into_iter();
        let name = it.next().unwrap_or_default().to_ascii_lowercase();
        let mut pid = || -> Result<u32, String> {
            let raw = it
                .next()
                .ok_or_else(|| format!("{name} needs a pid"))?;
            raw.parse().map_err(|_| format!("invalid pid {raw:?}"))
        };
        match name.as_str() {
            "processes" => Ok(Command::Processes),
            "details" => Ok(Command::Details(pid()?)),
            "history" => Ok(Command::History(pid()?)),
            "suspend" => Ok(Command::Suspend(pid()?)),
            "exit" | "quit" => Ok(Command::Exit),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command {other:?}")),
        }
    }
}

/// Run `cmd` over `stream` and render the reply.
pub async fn execute(stream: &mut TcpStream, cmd: Command, wait: Duration) -> anyhow::Result<String> {
    let text = match cmd {
        Command::Processes => request_processes(stream, wait).await?.map(|r| format::processes(&r)),
        Command::Details(pid) => request_details(stream, pid, wait).await?.map(|r| format::details(&r)),
        Command::History(pid) => request_history(stream, pid, wait).await?.map(|r| format::history(&r)),
        Command::Suspend(pid) => request_suspend(stream, pid, wait).await?.map(|r| format::suspend(&r)),
        Command::Exit => return Ok(String::new()),
    };
    Ok(text.unwrap_or_else(|| "no response\n".into()))
}
