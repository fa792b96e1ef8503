//! Capability surface every pluggable strategy exposes to the splitter.
//!
//! The splitter never depends on a concrete strategy type. Admission checks
//! compare the identifiers reported here against the vault's own.

use crate::types::{Amount, AssetId, ControllerId, SplitterId, StrategyId};
use async_trait::async_trait;

/// Outcome of a strategy's harvest cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardWorkReport {
    pub earned: Amount,
    pub lost: Amount,
}

/// Trait for fund-deployment backends managed by a splitter.
///
/// Fund-moving calls report what actually moved; anything below the requested
/// amount is treated as realized loss by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyAdapter: Send + Sync {
    fn identity(&self) -> StrategyId;

    fn asset(&self) -> AssetId;

    /// The only splitter allowed to move this strategy's funds.
    fn splitter(&self) -> SplitterId;

    fn controller(&self) -> ControllerId;

    async fn total_assets(&self) -> Amount;

    /// Maximum total assets the strategy accepts (`Amount::MAX` when unbounded).
    async fn capacity(&self) -> Amount;

    /// Funds withdrawable right now without expected loss.
    async fn max_cheap_withdraw(&self) -> Amount {
        self.total_assets().await
    }

    /// Deploy `amount`; returns the value actually credited to the strategy.
    async fn invest(&self, amount: Amount) -> anyhow::Result<Amount>;

    /// Return up to `amount` to the splitter; returns what was sent back.
    async fn withdraw(&self, amount: Amount) -> anyhow::Result<Amount>;

    async fn withdraw_all(&self) -> anyhow::Result<Amount>;

    /// Close every position and return all funds to the splitter.
    async fn emergency_exit(&self) -> anyhow::Result<Amount>;

    async fn do_hard_work(&self) -> anyhow::Result<HardWorkReport>;
}
