//! Entry point for the procmon client. Runs one command, or a prompt loop when none is given.

use std::env;
use std::time::Duration;

use anyhow::Context;
use procmon::client::{connect, DEFAULT_REPLY_TIMEOUT};
use procmon::command::{execute, Command, COMMAND_HELP};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

struct ParsedArgs {
    host: String,
    port: u16,
    timeout: Duration,
    command: Option<Command>,
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--host HOST|-H HOST] [--port PORT|-p PORT] [--timeout-ms MS] [COMMAND [PID]]\n\n{COMMAND_HELP}"
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "procmon".into());
    let mut host = DEFAULT_HOST.to_string();
    let mut port = DEFAULT_PORT;
    let mut timeout = DEFAULT_REPLY_TIMEOUT;
    let mut words: Vec<String> = Vec::new();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(usage(&prog)),
            "--host" | "-H" => {
                host = it.next().ok_or_else(|| format!("--host needs a value\n{}", usage(&prog)))?;
            }
            "--port" | "-p" => {
                let v = it.next().unwrap_or_default();
                port = v
                    .parse()
                    .map_err(|_| format!("invalid --port {v:?}\n{}", usage(&prog)))?;
            }
            "--timeout-ms" => {
                let v = it.next().unwrap_or_default();
                let ms: u64 = v
                    .parse()
                    .map_err(|_| format!("invalid --timeout-ms {v:?}\n{}", usage(&prog)))?;
                timeout = Duration::from_millis(ms);
            }
            _ if arg.starts_with("--port=") => {
                let v = &arg["--port=".len()..];
                port = v
                    .parse()
                    .map_err(|_| format!("invalid --port {v:?}\n{}", usage(&prog)))?;
            }
            _ if arg.starts_with("--host=") => {
                host = arg["--host=".len()..].to_string();
            }
            _ => words.push(arg),
        }
    }

    let command = if words.is_empty() {
        None
    } else {
        Some(Command::parse(words.iter().map(String::as_str))?)
    };
    Ok(ParsedArgs {
        host,
        port,
        timeout,
        command,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) if msg.starts_with("Usage:") => {
            println!("{msg}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let addr = format!("{}:{}", parsed.host, parsed.port);
    let mut stream = connect(&addr).await?;

    if let Some(cmd) = parsed.command {
        print!("{}", execute(&mut stream, cmd, parsed.timeout).await?);
        return Ok(());
    }

    println!("connected to {addr} at {}", chrono::Local::now().format("%H:%M:%S"));
    println!("{COMMAND_HELP}");
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match Command::parse(line.split_whitespace()) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                let text = execute(&mut stream, cmd, parsed.timeout).await?;
                stdout.write_all(text.as_bytes()).await?;
            }
            Err(msg) => println!("{msg}"),
        }
    }
    Ok(())
}
