//! # Deltastore Sync Protocol
//!
//! Protocol types for timestamp-based differential synchronization.
//!
//! This crate provides:
//! - `Item` and `StoreEntry` for the replicated data model
//! - `ReplicaStore` for the keyed collection both sync roles hold
//! - Protocol messages (`SyncRequest`, `SyncResponse`, `ItemChange`)
//! - Structural validation via `ProtocolError`
//!
//! This is a pure protocol crate with no I/O operations. Wire types derive
//! `serde` traits so integrators can bind any transport encoding; the crate
//! itself performs no encoding.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod item;
mod messages;
mod store;

/// Milliseconds since the Unix epoch, assigned by the writing replica.
///
/// Timestamps are monotonically non-decreasing per replica and are the sole
/// basis for conflict resolution.
pub type Timestamp = i64;

pub use error::ProtocolError;
pub use item::{Item, StoreEntry};
pub use messages::{ItemChange, SyncRequest, SyncResponse};
pub use store::ReplicaStore;
