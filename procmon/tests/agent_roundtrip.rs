//! Client helpers against a real agent event loop with a fixed process table.

use std::net::Ipv4Addr;
use std::time::Duration;

use procmon::client::{
    connect, request_details, request_history, request_processes, request_raw, request_suspend,
};
use procmon::command::{execute, Command};
use procmon::types::Request;
use procmon_agent::providers::{
    ProcessProvider, ProcessRecord, ProviderError, SampleHistory, SchedPolicy,
};
use procmon_agent::{AgentConfig, Dispatcher, Server, ServerHandle};

const WAIT: Duration = Duration::from_millis(500);

struct FixedProcesses(Vec<ProcessRecord>);

impl ProcessProvider for FixedProcesses {
    fn refresh_snapshot(&mut self) -> Result<usize, ProviderError> {
        Ok(self.0.len())
    }

    fn processes(&self) -> &[ProcessRecord] {
        &self.0
    }

    fn adjust_priority(
        &mut self,
        pid: u32,
        _priority: u32,
        _policy: SchedPolicy,
    ) -> Result<(), ProviderError> {
        if self.0.iter().any(|p| p.pid == pid) {
            Ok(())
        } else {
            Err(ProviderError::Unsupported("unknown pid"))
        }
    }
}

async fn start() -> (String, ServerHandle) {
    let config = AgentConfig {
        bind: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        poll_interval: Duration::from_millis(50),
        ..AgentConfig::default()
    };
    let records = [1u32, 250, 4000]
        .into_iter()
        .map(|pid| ProcessRecord {
            pid,
            name: format!("proc{pid}"),
            memory_usage: 8192,
            cpu_usage: 2.5,
            start_time: 0,
        })
        .collect();
    let dispatcher = Dispatcher::new(
        Box::new(FixedProcesses(records)),
        Box::new(SampleHistory::new(config.history_depth, 16)),
        config.response_capacity,
        config.history_depth,
    );
    let (server, handle) = Server::bind(&config, dispatcher).await.expect("bind");
    let addr = server.local_addr().expect("local addr").to_string();
    let _worker = server.spawn();
    (addr, handle)
}

#[tokio::test]
async fn typed_requests_parse_agent_replies() {
    let (addr, handle) = start().await;
    let mut stream = connect(&addr).await.expect("connect");

    let list = request_processes(&mut stream, WAIT).await.unwrap().expect("reply");
    assert_eq!(list.pids, vec![1, 250, 4000]);

    let d = request_details(&mut stream, 250, WAIT).await.unwrap().expect("reply");
    assert_eq!(d.name.as_deref(), Some("proc250"));
    assert_eq!(d.user.as_deref(), Some("User"));
    assert_eq!(d.ram_usage, Some(8192));

    let missing = request_details(&mut stream, 9, WAIT).await.unwrap().expect("reply");
    assert!(missing.name.is_none());

    request_history(&mut stream, 4000, WAIT).await.unwrap().expect("reply");
    let h = request_history(&mut stream, 4000, WAIT).await.unwrap().expect("reply");
    assert_eq!(h.entries.len(), 2);
    assert!(h.entries[0].timestamp <= h.entries[1].timestamp);

    let s = request_suspend(&mut stream, 1, WAIT).await.unwrap().expect("reply");
    assert!(s.success);
    let s = request_suspend(&mut stream, 2, WAIT).await.unwrap().expect("reply");
    assert!(!s.success);

    handle.shutdown();
}

#[tokio::test]
async fn request_without_pid_gets_no_reply() {
    let (addr, handle) = start().await;
    let mut stream = connect(&addr).await.expect("connect");
    let req = Request {
        request_type: "GetSimpleProcessDetails",
        pid: None,
    };
    assert!(request_raw(&mut stream, &req, Duration::from_millis(300))
        .await
        .unwrap()
        .is_none());
    handle.shutdown();
}

#[tokio::test]
async fn commands_render_text() {
    let (addr, handle) = start().await;
    let mut stream = connect(&addr).await.expect("connect");
    let text = execute(&mut stream, Command::Processes, WAIT).await.unwrap();
    assert!(text.starts_with("3 processes"), "{text}");
    let text = execute(&mut stream, Command::Details(1), WAIT).await.unwrap();
    assert!(text.contains("proc1") && text.contains("System"), "{text}");
    handle.shutdown();
}
