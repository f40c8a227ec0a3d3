//! Connection-multiplexing event loop.
//!
//! One task owns the listener, the connection registry and the dispatcher.
//! Each cycle it waits (bounded by the poll interval) for a new client, a
//! readable client or a control instruction, then reads at most one frame
//! from every readable client and answers on the same connection. Writes are
//! bounded by the poll interval; a client that stops reading is dropped. Other
//! tasks talk to it only through [`ServerHandle`]; nothing else ever touches
//! the registry.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::dispatch::Dispatcher;
use crate::encoder::Response;
use crate::proto::decode_request;
use crate::registry::{ConnectionRegistry, Slot};

/// Instructions consumed by the event loop at cycle boundaries.
#[derive(Debug)]
pub enum Control {
    Shutdown,
    Status(oneshot::Sender<ServerStatus>),
    /// Write one message to every registered connection.
    Broadcast(Response),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStatus {
    pub active_connections: usize,
    pub capacity: usize,
}

/// Cloneable way in from other tasks.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl ServerHandle {
    /// Ask the loop to stop. Returns false if it already exited.
    pub fn shutdown(&self) -> bool {
        self.tx.send(Control::Shutdown).is_ok()
    }

    /// Queue `message` for every connected client. Returns false if the loop already exited.
    pub fn broadcast(&self, message: Response) -> bool {
        self.tx.send(Control::Broadcast(message)).is_ok()
    }

    pub async fn status(&self) -> Option<ServerStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Control::Status(tx)).ok()?;
        rx.await.ok()
    }
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buf: BytesMut,
}

enum ReadOutcome {
    NotReady,
    Closed,
    Frame,
    Failed(io::Error),
}

impl Connection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            buf: BytesMut::new(),
        }
    }

    // One non-blocking read of at most `frame_size` bytes into `buf`.
    fn read_frame(&mut self, frame_size: usize) -> ReadOutcome {
        self.buf.clear();
        self.buf.resize(frame_size, 0);
        match self.stream.try_read(&mut self.buf) {
            Ok(0) => ReadOutcome::Closed,
            Ok(n) => {
                self.buf.truncate(n);
                ReadOutcome::Frame
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => ReadOutcome::NotReady,
            Err(e) => ReadOutcome::Failed(e),
        }
    }

    async fn send(&mut self, response: &Response, limit: Duration) -> io::Result<()> {
        match timeout(limit, self.stream.write_all(response.as_bytes())).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "peer is not reading replies",
            )),
        }
    }
}

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(5);

// Doubles with each consecutive accept failure, capped at `cap`.
fn accept_backoff(failures: u32, cap: Duration) -> Duration {
    ACCEPT_BACKOFF_BASE
        .saturating_mul(1 << failures.saturating_sub(1).min(16))
        .min(cap)
}

enum Event {
    Control(Control),
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Readable,
    Idle,
}

pub struct Server {
    listener: TcpListener,
    registry: ConnectionRegistry<Connection>,
    dispatcher: Dispatcher,
    control: mpsc::UnboundedReceiver<Control>,
    frame_size: usize,
    poll_interval: Duration,
    accept_failures: u32,
    running: bool,
}

impl Server {
    pub async fn bind(
        config: &AgentConfig,
        dispatcher: Dispatcher,
    ) -> anyhow::Result<(Self, ServerHandle)> {
        let addr = config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let server = Self {
            listener,
            registry: ConnectionRegistry::with_capacity(config.max_clients),
            dispatcher,
            control: rx,
            frame_size: config.frame_size,
            poll_interval: config.poll_interval,
            accept_failures: 0,
            running: true,
        };
        Ok((server, ServerHandle { tx }))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!(
            addr = ?self.listener.local_addr().ok(),
            capacity = self.registry.capacity(),
            "event loop started"
        );
        while self.running {
            while let Ok(ctl) = self.control.try_recv() {
                self.apply(ctl).await;
            }
            if !self.running {
                break;
            }
            match self.wait().await {
                Event::Control(ctl) => self.apply(ctl).await,
                Event::Accepted(Ok((stream, peer))) => {
                    self.accept_failures = 0;
                    self.admit(stream, peer);
                }
                Event::Accepted(Err(e)) => {
                    self.accept_failures = self.accept_failures.saturating_add(1);
                    let pause = accept_backoff(self.accept_failures, self.poll_interval);
                    warn!(failures = self.accept_failures, ?pause, "accept failed: {e}");
                    sleep(pause).await;
                }
                Event::Readable | Event::Idle => {}
            }
            if self.running {
                self.service_readable().await;
            }
        }
        self.teardown().await;
    }

    async fn wait(&mut self) -> Event {
        let mut readable: FuturesUnordered<_> = self
            .registry
            .iter()
            .map(|(slot, conn)| async move { (slot, conn.stream.readable().await) })
            .collect();
        tokio::select! {
            Some(ctl) = self.control.recv() => Event::Control(ctl),
            res = self.listener.accept() => Event::Accepted(res),
            Some((slot, res)) = readable.next() => {
                if let Err(e) = res {
                    debug!(slot, "readiness wait failed: {e}");
                }
                Event::Readable
            }
            _ = sleep(self.poll_interval) => Event::Idle,
        }
    }

    async fn apply(&mut self, ctl: Control) {
        match ctl {
            Control::Shutdown => {
                info!("shutdown requested");
                self.running = false;
            }
            Control::Status(reply) => {
                let _ = reply.send(ServerStatus {
                    active_connections: self.registry.len(),
                    capacity: self.registry.capacity(),
                });
            }
            Control::Broadcast(message) => self.broadcast(&message).await,
        }
    }

    async fn broadcast(&mut self, message: &Response) {
        if self.registry.is_empty() {
            debug!("broadcast with no clients connected");
            return;
        }
        let mut delivered = 0;
        for slot in self.registry.active_slots() {
            let Some(conn) = self.registry.get_mut(slot) else {
                continue;
            };
            match conn.send(message, self.poll_interval).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(peer = %conn.peer, "broadcast write failed: {e}");
                    self.close(slot, "write error");
                }
            }
        }
        debug!(delivered, bytes = message.len(), "broadcast sent");
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        match self.registry.register(Connection::new(stream, peer)) {
            Ok(slot) => info!(%peer, slot, active = self.registry.len(), "client connected"),
            Err((err, conn)) => {
                warn!(%peer, "{err}; refusing connection");
                drop(conn);
            }
        }
    }

    fn close(&mut self, slot: Slot, reason: &str) {
        if let Some(conn) = self.registry.unregister(slot) {
            info!(peer = %conn.peer, slot, active = self.registry.len(), "client disconnected: {reason}");
        }
    }

    async fn service_readable(&mut self) {
        for slot in self.registry.active_slots() {
            let Some(conn) = self.registry.get_mut(slot) else {
                continue;
            };
            match conn.read_frame(self.frame_size) {
                ReadOutcome::NotReady => {}
                ReadOutcome::Closed => self.close(slot, "peer closed"),
                ReadOutcome::Failed(e) => {
                    warn!(peer = %conn.peer, "read failed: {e}");
                    self.close(slot, "read error");
                }
                ReadOutcome::Frame => {
                    let request = decode_request(&conn.buf);
                    debug!(peer = %conn.peer, bytes = conn.buf.len(), ?request, "frame received");
                    let Some(response) = self.dispatcher.dispatch(request) else {
                        continue;
                    };
                    if let Err(e) = conn.send(&response, self.poll_interval).await {
                        warn!(peer = %conn.peer, "write failed: {e}");
                        self.close(slot, "write error");
                    }
                }
            }
        }
    }

    async fn teardown(mut self) {
        let conns = self.registry.drain();
        let n = conns.len();
        for mut conn in conns {
            if let Err(e) = conn.stream.shutdown().await {
                debug!(peer = %conn.peer, "shutdown failed: {e}");
            }
        }
        drop(self.listener);
        drop(self.dispatcher);
        info!(closed = n, "event loop stopped");
    }
}
