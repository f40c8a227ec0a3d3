//! procmon agent: serves live process telemetry to remote clients over a
//! small text request/response protocol on TCP.
//!
//! Flow: [`server`] event loop → [`proto`] frame decoding → [`dispatch`] →
//! [`providers`] → [`encoder`] → reply on the originating connection.

pub mod config;
pub mod dispatch;
pub mod encoder;
pub mod proto;
pub mod providers;
pub mod registry;
pub mod server;
pub mod types;

pub use config::AgentConfig;
pub use dispatch::Dispatcher;
pub use server::{Server, ServerHandle, ServerStatus};
