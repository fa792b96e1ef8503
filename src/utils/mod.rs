//! Shared utilities.

pub mod fixed;

pub use fixed::{Apr, SharePrice, BPS_DENOMINATOR};
