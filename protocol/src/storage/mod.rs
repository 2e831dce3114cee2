//! # Storage Module
//!
//! Persistence for the staking ledger. The durable state of the engine is
//! small (the checkpoint log, the per-user positions, token balances and the
//! role registry), so it is written as a single sealed snapshot rather than
//! through a key-value engine.
//!
//! ```text
//! snapshot.rs — versioned, BLAKE3-sealed bincode envelope
//! ```
//!
//! Bincode for on-disk serialization: compact, fast, deterministic. JSON is
//! for configs and debugging; bincode is for storage.

pub mod snapshot;

pub use snapshot::{Snapshot, StorageError, StorageResult, SNAPSHOT_VERSION};
