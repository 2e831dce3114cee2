// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Nauh Protocol — Core Library
//!
//! Primitives for the Nauh staking engine: the pieces that do not care which
//! contract is calling them.
//!
//! ## Architecture
//!
//! - **address** — 20-byte account addresses, hex-rendered.
//! - **time** — Ledger timestamps and the clocks that produce them.
//! - **auth** — Roles, capability sets, and the per-call context.
//! - **asset** — The narrow interface to the fungible-asset ledger.
//! - **rewards** — Checkpoint log and the time-weighted accrual walk.
//! - **error** — The staking error taxonomy.
//! - **config** — Constants and the deploy-time [`config::StakingConfig`].
//! - **storage** — Integrity-checked snapshots.
//! - **logging** — `tracing` subscriber setup.
//!
//! ## Design Philosophy
//!
//! 1. Every amount is an unsigned integer in smallest units. No floats.
//! 2. Every multiplication and addition on money is checked. Overflow is an
//!    error, never a wrap.
//! 3. Time is an explicit argument. Nothing in here reads a wall clock
//!    except [`time::SystemClock`].
//! 4. If it touches money, it has tests. Plural.

pub mod address;
pub mod asset;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod rewards;
pub mod storage;
pub mod time;

/// Amount of an asset, reward, or rate in smallest units.
pub type Amount = u128;

pub use address::Address;
pub use asset::{AssetError, AssetLedger};
pub use auth::{AccessControl, CallContext, Capabilities, Role};
pub use error::{StakingError, StakingResult};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
