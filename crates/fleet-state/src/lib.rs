//! fleet-state — embedded state store for the fleet status engine.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for the entities a deployment is made of: machines (and their
//! nested containers), services, units, relations, and agent records.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Machines are keyed by their hierarchical id (`3`, `3/lxc/1`), so a table
//! scan yields every ancestor before its descendants.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod charm;
pub mod error;
pub mod ids;
pub mod store;
pub mod tables;
pub mod types;

pub use charm::{CharmUrl, CharmUrlError};
pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
