//! # Strategy Splitter
//!
//! A single-asset vault that spreads deposits across pluggable yield
//! strategies, ranks them by smoothed APR and absorbs strategy losses from an
//! insurance buffer funded by deposit and withdrawal fees.
//!
//! ## Architecture
//!
//! - `vault`: share ledger, fees, insurance buffer and the user-facing entry points
//! - `splitter`: strategy admission, placement, rebalancing and hard work
//! - `strategy`: the adapter trait, per-strategy slots and an in-memory mock
//! - `config`: configuration loading and validation
//! - `persistence`: SQLite-backed snapshots of the vault state
//! - `telemetry`: tracing subscriber setup
//! - `utils`: fixed-point and basis-point arithmetic

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod persistence;
pub mod splitter;
pub mod strategy;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod vault;

#[cfg(test)]
mod fixtures;

pub use access::{PermissionContext, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{AllocError, AllocResult, ErrorKind};
pub use splitter::{Splitter, SplitterSettings};
pub use strategy::{StrategyAdapter, StrategySlot};
pub use types::{AccountId, Amount, AssetId, ControllerId, SplitterId, StrategyId};
pub use vault::{SharedVault, Vault};
