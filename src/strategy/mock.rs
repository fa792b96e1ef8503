//! In-memory strategy for simulations and tests.
//!
//! Behaves like a well-formed strategy by default. Slippage, capacity and
//! harvest results can be scripted to reproduce loss scenarios.

use super::adapter::{HardWorkReport, StrategyAdapter};
use crate::types::{Amount, AssetId, ControllerId, SplitterId, StrategyId};
use crate::utils::fixed::bps_of;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Scriptable state of a [`MockStrategy`].
#[derive(Debug, Clone)]
pub struct MockStrategyState {
    pub invested: Amount,
    pub capacity: Amount,
    /// Value lost on every withdrawal, in bps of the amount withdrawn.
    pub withdraw_slippage_bps: u32,
    /// Value lost on every deposit, in bps of the amount deposited.
    pub deposit_slippage_bps: u32,
    /// Value lost on hard work, in bps of the invested amount.
    pub hard_work_slippage_bps: u32,
    pub pending_earned: Amount,
    pub pending_lost: Amount,
    pub exited: bool,
}

impl Default for MockStrategyState {
    fn default() -> Self {
        Self {
            invested: 0,
            capacity: Amount::MAX,
            withdraw_slippage_bps: 0,
            deposit_slippage_bps: 0,
            hard_work_slippage_bps: 0,
            pending_earned: 0,
            pending_lost: 0,
            exited: false,
        }
    }
}

/// Strategy that keeps its funds in memory.
#[derive(Debug)]
pub struct MockStrategy {
    id: StrategyId,
    asset: AssetId,
    splitter: SplitterId,
    controller: ControllerId,
    state: Mutex<MockStrategyState>,
}

impl MockStrategy {
    pub fn new(
        id: impl Into<String>,
        asset: AssetId,
        splitter: SplitterId,
        controller: ControllerId,
    ) -> Self {
        Self {
            id: StrategyId::new(id),
            asset,
            splitter,
            controller,
            state: Mutex::new(MockStrategyState::default()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, MockStrategyState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> MockStrategyState {
        self.lock().clone()
    }

    pub fn invested(&self) -> Amount {
        self.lock().invested
    }

    pub fn set_capacity(&self, capacity: Amount) {
        self.lock().capacity = capacity;
    }

    pub fn set_withdraw_slippage(&self, bps: u32) {
        self.lock().withdraw_slippage_bps = bps;
    }

    pub fn set_deposit_slippage(&self, bps: u32) {
        self.lock().deposit_slippage_bps = bps;
    }

    pub fn set_hard_work_slippage(&self, bps: u32) {
        self.lock().hard_work_slippage_bps = bps;
    }

    /// Result reported (and applied) by the next hard work.
    pub fn set_next_harvest(&self, earned: Amount, lost: Amount) {
        let mut state = self.lock();
        state.pending_earned = earned;
        state.pending_lost = lost;
    }

    /// Value appearing or vanishing outside of any splitter call.
    pub fn add_assets(&self, amount: Amount) {
        let mut state = self.lock();
        state.invested = state.invested.saturating_add(amount);
    }

    pub fn remove_assets(&self, amount: Amount) {
        let mut state = self.lock();
        state.invested = state.invested.saturating_sub(amount);
    }

    fn take(&self, requested: Amount) -> Result<Amount> {
        let mut state = self.lock();
        let taken = requested.min(state.invested);
        state.invested -= taken;
        let slippage = bps_of(taken, state.withdraw_slippage_bps)?;
        Ok(taken - slippage)
    }
}

#[async_trait]
impl StrategyAdapter for MockStrategy {
    fn identity(&self) -> StrategyId {
        self.id.clone()
    }

    fn asset(&self) -> AssetId {
        self.asset.clone()
    }

    fn splitter(&self) -> SplitterId {
        self.splitter.clone()
    }

    fn controller(&self) -> ControllerId {
        self.controller.clone()
    }

    async fn total_assets(&self) -> Amount {
        self.lock().invested
    }

    async fn capacity(&self) -> Amount {
        self.lock().capacity
    }

    async fn invest(&self, amount: Amount) -> Result<Amount> {
        let mut state = self.lock();
        let slippage = bps_of(amount, state.deposit_slippage_bps)?;
        let credited = amount - slippage;
        state.invested = state.invested.saturating_add(credited);
        debug!(strategy = %self.id, amount, credited, "Mock invest");
        Ok(credited)
    }

    async fn withdraw(&self, amount: Amount) -> Result<Amount> {
        let returned = self.take(amount)?;
        debug!(strategy = %self.id, amount, returned, "Mock withdraw");
        Ok(returned)
    }

    async fn withdraw_all(&self) -> Result<Amount> {
        let all = self.lock().invested;
        self.take(all)
    }

    async fn emergency_exit(&self) -> Result<Amount> {
        let mut state = self.lock();
        let all = state.invested;
        state.invested = 0;
        state.exited = true;
        Ok(all)
    }

    async fn do_hard_work(&self) -> Result<HardWorkReport> {
        let mut state = self.lock();
        let slippage = bps_of(state.invested, state.hard_work_slippage_bps)?;
        let report = HardWorkReport {
            earned: std::mem::take(&mut state.pending_earned),
            lost: std::mem::take(&mut state.pending_lost).saturating_add(slippage),
        };
        state.invested = state
            .invested
            .saturating_add(report.earned)
            .saturating_sub(report.lost);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> MockStrategy {
        MockStrategy::new(
            "mock",
            AssetId::new("USDC"),
            SplitterId::new("splitter"),
            ControllerId::new("controller"),
        )
    }

    #[tokio::test]
    async fn test_invest_and_withdraw_with_slippage() {
        let strategy = mock();
        strategy.set_deposit_slippage(100);
        assert_eq!(strategy.invest(10_000).await.unwrap(), 9_900);
        assert_eq!(strategy.total_assets().await, 9_900);

        strategy.set_withdraw_slippage(1_000);
        assert_eq!(strategy.withdraw(1_000).await.unwrap(), 900);
        assert_eq!(strategy.total_assets().await, 8_900);
    }

    #[tokio::test]
    async fn test_withdraw_is_bounded_by_balance() {
        let strategy = mock();
        strategy.add_assets(50);
        assert_eq!(strategy.withdraw(80).await.unwrap(), 50);
        assert_eq!(strategy.withdraw_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_hard_work_applies_scripted_result() {
        let strategy = mock();
        strategy.add_assets(1_000_000);
        strategy.set_next_harvest(20_000, 10_000);
        let report = strategy.do_hard_work().await.unwrap();
        assert_eq!(report, HardWorkReport { earned: 20_000, lost: 10_000 });
        assert_eq!(strategy.total_assets().await, 1_010_000);

        // Pending values are consumed.
        let report = strategy.do_hard_work().await.unwrap();
        assert_eq!(report, HardWorkReport::default());
    }

    #[test]
    fn test_emergency_exit_returns_everything() {
        let strategy = mock();
        strategy.add_assets(777);
        strategy.set_withdraw_slippage(500);
        let returned = tokio_test::block_on(strategy.emergency_exit()).unwrap();
        assert_eq!(returned, 777);
        assert!(strategy.state().exited);
    }
}
