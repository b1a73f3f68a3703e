//! # Deltastore Sync Server
//!
//! Authoritative sync server for deltastore replicas.
//!
//! This crate provides:
//! - The authoritative store with atomic merge-and-diff
//! - A request handler with batch limits and validation
//! - The `SyncServer` facade
//!
//! # Architecture
//!
//! The server is the single arbiter of conflicts. Each incoming request is
//! merged into the authoritative store under last-write-wins by timestamp
//! (ties resolve in favor of the incoming client write), then the set of
//! entries the client has not yet seen is computed. Both phases execute as
//! one critical section, so a response is always a fully consistent
//! snapshot and a partial merge is never observable.
//!
//! The transport binding (HTTP, RPC, in-process call) is left to the
//! integrator; handlers take and return protocol types directly.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use server::SyncServer;
pub use store::{AuthoritativeStore, MergeOutcome};
