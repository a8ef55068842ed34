//! DeployDeck Core Library
//!
//! Orchestration core for the DeployDeck instance dashboard: status
//! polling, snapshot capture workflow, and TTL/expiry conversion.

pub mod errors;
pub mod gateway;
pub mod logs;
pub mod models;
pub mod poller;
pub mod snapshot;
pub mod timeutil;
