//! Client library for the procmon agent: request helpers, reply types and text rendering.

pub mod client;
pub mod command;
pub mod format;
pub mod types;
