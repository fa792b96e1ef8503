//! Capital splitter: spreads vault funds across admitted strategies.
//!
//! - `admission`: timelocked scheduling, batch admission and removal
//! - `rebalance`: moving funds from low-APR to high-APR strategies
//! - `harvest`: hard work and APR tracking
//!
//! Strategies are visited in priority order: current APR descending, ties
//! broken by admission order. Withdrawals walk the same order backwards.

mod admission;
mod harvest;
mod rebalance;

pub use harvest::HardWorkOutcome;
pub use rebalance::RebalanceOutcome;

use crate::access::{PermissionContext, Role};
use crate::clock::Clock;
use crate::error::{AllocError, AllocResult};
use crate::strategy::{AprHistory, StrategyAdapter, StrategySlot};
use crate::types::{Amount, AssetId, ControllerId, SplitterId, StrategyId};
use crate::utils::fixed::{exceeds_bps, Apr};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tunable splitter policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterSettings {
    /// Delay between scheduling a strategy and being allowed to admit it.
    pub admission_delay_secs: u64,
    /// Number of APR samples kept per strategy.
    pub apr_history_len: usize,
    /// Number of newest samples averaged into the current APR.
    pub apr_smoothing_window: usize,
    /// Circuit breaker for self-reported strategy losses, in bps of its assets.
    pub max_strategy_loss_bps: u32,
}

impl SplitterSettings {
    pub fn admission_delay(&self) -> Duration {
        Duration::seconds(i64::try_from(self.admission_delay_secs).unwrap_or(i64::MAX))
    }
}

impl Default for SplitterSettings {
    fn default() -> Self {
        Self {
            admission_delay_secs: 18 * 60 * 60,
            apr_history_len: 10,
            apr_smoothing_window: 3,
            max_strategy_loss_bps: 500,
        }
    }
}

/// Persisted form of one strategy slot; the adapter is re-attached on restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub id: StrategyId,
    pub weight: Apr,
    pub external_capacity: Option<Amount>,
    pub paused: bool,
    pub apr_current: Apr,
    pub apr_history: Vec<Apr>,
    pub last_hard_work: DateTime<Utc>,
    pub covered_loss: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterSnapshot {
    pub id: SplitterId,
    pub settings: SplitterSettings,
    pub idle: Amount,
    pub strategies: Vec<SlotSnapshot>,
    pub scheduled: Vec<(StrategyId, DateTime<Utc>)>,
}

/// Funds moved by one pass of the invest path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    /// Amount taken from the splitter's idle balance.
    pub placed: Amount,
    /// Amount the strategies reported as credited.
    pub credited: Amount,
}

#[derive(Debug, Clone)]
pub struct Splitter {
    id: SplitterId,
    asset: AssetId,
    controller: ControllerId,
    settings: SplitterSettings,
    strategies: Vec<StrategySlot>,
    scheduled: BTreeMap<StrategyId, DateTime<Utc>>,
    idle: Amount,
    clock: Arc<dyn Clock>,
}

impl Splitter {
    pub fn new(
        id: SplitterId,
        asset: AssetId,
        controller: ControllerId,
        settings: SplitterSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id,
            asset,
            controller,
            settings,
            strategies: Vec::new(),
            scheduled: BTreeMap::new(),
            idle: 0,
            clock,
        }
    }

    /// Serializable view of the splitter state.
    pub fn snapshot(&self) -> SplitterSnapshot {
        SplitterSnapshot {
            id: self.id.clone(),
            settings: self.settings.clone(),
            idle: self.idle,
            strategies: self
                .strategies
                .iter()
                .map(|slot| SlotSnapshot {
                    id: slot.id.clone(),
                    weight: slot.weight,
                    external_capacity: slot.external_capacity,
                    paused: slot.paused,
                    apr_current: slot.apr_current,
                    apr_history: slot.apr_history.iter().collect(),
                    last_hard_work: slot.last_hard_work,
                    covered_loss: slot.covered_loss,
                })
                .collect(),
            scheduled: self.scheduled(),
        }
    }

    /// Rebuild a splitter from a snapshot, re-attaching each slot's adapter.
    pub fn restore(
        snapshot: SplitterSnapshot,
        asset: AssetId,
        controller: ControllerId,
        adapters: &HashMap<StrategyId, Arc<dyn StrategyAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> AllocResult<Self> {
        let mut splitter = Self::new(snapshot.id, asset, controller, snapshot.settings, clock);
        for record in snapshot.strategies {
            let adapter = adapters
                .get(&record.id)
                .cloned()
                .ok_or_else(|| AllocError::NotFound(record.id.clone()))?;
            splitter.validate_candidate(adapter.as_ref(), &record.id)?;
            let history_len = splitter.settings.apr_history_len;
            let mut slot = StrategySlot::new(adapter, record.weight, history_len, record.last_hard_work);
            slot.external_capacity = record.external_capacity;
            slot.paused = record.paused;
            slot.apr_current = record.apr_current;
            slot.apr_history = AprHistory::from_samples(history_len, record.apr_history);
            slot.covered_loss = record.covered_loss;
            splitter.strategies.push(slot);
        }
        splitter.scheduled = snapshot.scheduled.into_iter().collect();
        splitter.idle = snapshot.idle;
        Ok(splitter)
    }

    pub fn id(&self) -> &SplitterId {
        &self.id
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn controller(&self) -> &ControllerId {
        &self.controller
    }

    pub fn settings(&self) -> &SplitterSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn strategies(&self) -> &[StrategySlot] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Balance held by the splitter itself, outside any strategy.
    pub fn idle_balance(&self) -> Amount {
        self.idle
    }

    pub fn slot(&self, id: &StrategyId) -> Option<&StrategySlot> {
        self.strategies.iter().find(|s| &s.id == id)
    }

    pub fn apr(&self, id: &StrategyId) -> Option<Apr> {
        self.slot(id).map(|s| s.apr_current)
    }

    pub fn is_paused(&self, id: &StrategyId) -> Option<bool> {
        self.slot(id).map(|s| s.paused)
    }

    fn index_of(&self, id: &StrategyId) -> AllocResult<usize> {
        self.strategies
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| AllocError::NotFound(id.clone()))
    }

    /// Slot indices from highest to lowest priority.
    pub(crate) fn priority_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.strategies.len()).collect();
        order.sort_by(|&a, &b| {
            self.strategies[b]
                .apr_current
                .cmp(&self.strategies[a].apr_current)
        });
        order
    }

    /// Strategy ids in priority order.
    pub fn ranked(&self) -> Vec<StrategyId> {
        self.priority_order()
            .into_iter()
            .map(|i| self.strategies[i].id.clone())
            .collect()
    }

    /// Idle balance plus everything the strategies report.
    pub async fn total_assets(&self) -> Amount {
        let mut total = self.idle;
        for slot in &self.strategies {
            total = total.saturating_add(slot.adapter.total_assets().await);
        }
        total
    }

    /// Funds withdrawable right now without expected loss.
    pub async fn max_cheap_withdraw(&self) -> Amount {
        let mut total = self.idle;
        for slot in self.strategies.iter().filter(|s| !s.paused) {
            total = total.saturating_add(slot.adapter.max_cheap_withdraw().await);
        }
        total
    }

    pub async fn strategy_assets(&self, id: &StrategyId) -> AllocResult<Amount> {
        let index = self.index_of(id)?;
        Ok(self.strategies[index].adapter.total_assets().await)
    }

    // ---------------------------------------------------------------------
    // Vault-facing fund movement
    // ---------------------------------------------------------------------

    /// Receive funds from the vault.
    pub(crate) fn credit(&mut self, amount: Amount) -> AllocResult<()> {
        self.idle = self.idle.checked_add(amount).ok_or(AllocError::Overflow)?;
        Ok(())
    }

    /// Place up to `amount` of the idle balance, greedily by priority.
    ///
    /// Each strategy takes what fits under its external and internal capacity;
    /// whatever does not fit stays idle.
    pub(crate) async fn invest_all(&mut self, amount: Amount) -> AllocResult<Placement> {
        let mut remaining = amount.min(self.idle);
        let mut placement = Placement::default();

        for index in self.priority_order() {
            if remaining == 0 {
                break;
            }
            let slot = &self.strategies[index];
            if slot.paused {
                continue;
            }
            let assets = slot.adapter.total_assets().await;
            let room = slot.room(assets).await;
            let to_invest = remaining.min(room);
            if to_invest == 0 {
                continue;
            }

            let credited = slot
                .adapter
                .invest(to_invest)
                .await
                .map_err(|e| AllocError::strategy(&slot.id, e))?;
            debug!(
                strategy = %slot.id,
                amount = to_invest,
                credited,
                room,
                "Invested into strategy"
            );

            self.idle -= to_invest;
            remaining -= to_invest;
            placement.placed += to_invest;
            placement.credited += credited.min(to_invest);
        }

        if remaining > 0 {
            debug!(leftover = remaining, "Capacity exhausted, funds stay idle");
        }
        Ok(placement)
    }

    /// Send up to `amount` back to the vault, pulling from strategies when the
    /// idle balance is not enough. Returns what was sent.
    pub(crate) async fn withdraw_to_vault(&mut self, amount: Amount) -> AllocResult<Amount> {
        if self.idle < amount {
            for index in self.priority_order().into_iter().rev() {
                if self.idle >= amount {
                    break;
                }
                let slot = &self.strategies[index];
                if slot.paused {
                    continue;
                }
                let assets = slot.adapter.total_assets().await;
                if assets == 0 {
                    continue;
                }
                let request = (amount - self.idle).min(assets);
                let returned = slot
                    .adapter
                    .withdraw(request)
                    .await
                    .map_err(|e| AllocError::strategy(&slot.id, e))?;
                debug!(strategy = %slot.id, request, returned, "Withdrew from strategy");
                self.idle = self.idle.checked_add(returned).ok_or(AllocError::Overflow)?;
            }
        }

        let sent = self.idle.min(amount);
        self.idle -= sent;
        Ok(sent)
    }

    /// Drain every non-paused strategy and send the whole idle balance.
    pub(crate) async fn withdraw_all_to_vault(&mut self) -> AllocResult<Amount> {
        for slot in self.strategies.iter().filter(|s| !s.paused) {
            if slot.adapter.total_assets().await == 0 {
                continue;
            }
            let returned = slot
                .adapter
                .withdraw_all()
                .await
                .map_err(|e| AllocError::strategy(&slot.id, e))?;
            debug!(strategy = %slot.id, returned, "Drained strategy");
            self.idle = self.idle.checked_add(returned).ok_or(AllocError::Overflow)?;
        }
        Ok(std::mem::take(&mut self.idle))
    }

    /// Validate a loss a strategy reports about itself and return its size.
    pub(crate) async fn register_strategy_loss(
        &self,
        caller: &StrategyId,
        expected: Amount,
        actual: Amount,
    ) -> AllocResult<Amount> {
        let slot = self
            .slot(caller)
            .ok_or_else(|| AllocError::NotAStrategy(caller.clone()))?;
        let loss = expected.saturating_sub(actual);
        if loss == 0 {
            return Ok(0);
        }
        let tracked = slot.adapter.total_assets().await;
        let limit_bps = self.settings.max_strategy_loss_bps;
        if exceeds_bps(loss, tracked, limit_bps)? {
            warn!(strategy = %caller, loss, tracked, "Reported loss trips circuit breaker");
            return Err(AllocError::LossTooHigh {
                loss,
                base: tracked,
                limit_bps,
            });
        }
        Ok(loss)
    }

    pub(crate) fn record_covered_loss(&mut self, id: &StrategyId, covered: Amount) {
        if let Some(slot) = self.strategies.iter_mut().find(|s| &s.id == id) {
            slot.covered_loss = slot.covered_loss.saturating_add(covered);
        }
    }

    // ---------------------------------------------------------------------
    // Operator controls
    // ---------------------------------------------------------------------

    /// Stop investing into a strategy. Its funds stay where they are.
    pub fn pause(&mut self, ctx: &PermissionContext, id: &StrategyId) -> AllocResult<()> {
        ctx.require(Role::Operator, "pause strategy")?;
        let index = self.index_of(id)?;
        let slot = &mut self.strategies[index];
        slot.paused = true;
        slot.apr_current = Apr::ZERO;
        info!(strategy = %id, caller = %ctx.caller, "Strategy paused");
        Ok(())
    }

    /// Resume investing into a paused strategy with a fresh APR estimate.
    pub fn resume(&mut self, ctx: &PermissionContext, id: &StrategyId, apr: Apr) -> AllocResult<()> {
        ctx.require(Role::Operator, "resume strategy")?;
        let index = self.index_of(id)?;
        let slot = &mut self.strategies[index];
        if !slot.paused {
            return Err(AllocError::NotPaused(id.clone()));
        }
        slot.paused = false;
        slot.apr_current = apr;
        info!(strategy = %id, apr = %apr.as_percent(), "Strategy resumed");
        Ok(())
    }

    /// Operator override of current APRs; all-or-nothing across the batch.
    pub fn set_aprs(&mut self, ctx: &PermissionContext, aprs: &[(StrategyId, Apr)]) -> AllocResult<()> {
        ctx.require(Role::Operator, "set apr")?;
        let mut targets = Vec::with_capacity(aprs.len());
        for (id, apr) in aprs {
            let index = self.index_of(id)?;
            if self.strategies[index].paused {
                return Err(AllocError::StrategyPaused(id.clone()));
            }
            targets.push((index, *apr));
        }
        for (index, apr) in targets {
            let slot = &mut self.strategies[index];
            slot.apr_current = apr;
            debug!(strategy = %slot.id, apr = %apr.as_percent(), "APR override");
        }
        Ok(())
    }

    pub fn set_apr(&mut self, ctx: &PermissionContext, id: &StrategyId, apr: Apr) -> AllocResult<()> {
        self.set_aprs(ctx, &[(id.clone(), apr)])
    }

    /// Operator ceiling on a strategy's total assets; `None` lifts it.
    pub fn set_strategy_capacity(
        &mut self,
        ctx: &PermissionContext,
        id: &StrategyId,
        capacity: Option<Amount>,
    ) -> AllocResult<()> {
        ctx.require(Role::Governance, "set strategy capacity")?;
        let index = self.index_of(id)?;
        self.strategies[index].external_capacity = capacity;
        info!(strategy = %id, ?capacity, "Strategy capacity updated");
        Ok(())
    }

    /// Pull every fund out of a strategy, e.g. before removing it.
    pub(crate) async fn withdraw_all_from_strategy(
        &mut self,
        ctx: &PermissionContext,
        id: &StrategyId,
    ) -> AllocResult<Amount> {
        ctx.require(Role::Governance, "withdraw all from strategy")?;
        let index = self.index_of(id)?;
        let slot = &self.strategies[index];
        let assets = slot.adapter.total_assets().await;
        let returned = slot
            .adapter
            .withdraw_all()
            .await
            .map_err(|e| AllocError::strategy(&slot.id, e))?;
        if returned < assets {
            warn!(strategy = %id, assets, returned, "Strategy returned less than it held");
        }
        self.idle = self.idle.checked_add(returned).ok_or(AllocError::Overflow)?;
        Ok(returned)
    }

    /// Close the strategy's positions, park the funds here and pause it.
    pub(crate) async fn emergency_exit(&mut self, ctx: &PermissionContext, id: &StrategyId) -> AllocResult<Amount> {
        ctx.require(Role::Operator, "emergency exit")?;
        let index = self.index_of(id)?;
        let returned = self.strategies[index]
            .adapter
            .emergency_exit()
            .await
            .map_err(|e| AllocError::strategy(id, e))?;
        self.idle = self.idle.checked_add(returned).ok_or(AllocError::Overflow)?;
        let slot = &mut self.strategies[index];
        slot.paused = true;
        slot.apr_current = Apr::ZERO;
        warn!(strategy = %id, returned, "Emergency exit");
        Ok(returned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{apr, Fixture};
    use crate::strategy::StrategyAdapter;

    #[tokio::test]
    async fn test_empty_splitter_keeps_funds_idle() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();
        splitter.credit(10_000).unwrap();
        let placement = splitter.invest_all(10_000).await.unwrap();
        assert_eq!(placement, Placement::default());
        assert_eq!(splitter.total_assets().await, 10_000);
        assert_eq!(splitter.max_cheap_withdraw().await, 10_000);
    }

    #[tokio::test]
    async fn test_invest_prefers_highest_apr_and_clamps_capacity() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[50, 100, 1]);
        splitter
            .set_apr(&fx.operator, &s[2].identity(), apr(300))
            .unwrap();
        s[0].set_capacity(10);
        s[1].set_capacity(20);
        s[2].set_capacity(30);

        splitter.credit(100).unwrap();
        let placement = splitter.invest_all(100).await.unwrap();

        assert_eq!(placement.placed, 60);
        assert_eq!(s[2].invested(), 30);
        assert_eq!(s[1].invested(), 20);
        assert_eq!(s[0].invested(), 10);
        assert_eq!(splitter.idle_balance(), 40);
    }

    #[tokio::test]
    async fn test_external_capacity_is_respected() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[50, 100, 300]);
        s[2].set_capacity(30);
        splitter
            .set_strategy_capacity(&fx.governance, &s[2].identity(), Some(25))
            .unwrap();
        splitter
            .set_strategy_capacity(&fx.governance, &s[1].identity(), Some(0))
            .unwrap();
        splitter
            .set_strategy_capacity(&fx.governance, &s[0].identity(), Some(15))
            .unwrap();

        splitter.credit(100).unwrap();
        splitter.invest_all(100).await.unwrap();

        assert_eq!(s[2].invested(), 25);
        assert_eq!(s[1].invested(), 0);
        assert_eq!(s[0].invested(), 15);
        assert_eq!(splitter.idle_balance(), 60);
    }

    #[tokio::test]
    async fn test_paused_strategy_receives_nothing() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[50]);
        splitter.pause(&fx.operator, &s[0].identity()).unwrap();
        splitter.credit(10_000).unwrap();
        splitter.invest_all(10_000).await.unwrap();
        assert_eq!(s[0].invested(), 0);
        assert_eq!(splitter.idle_balance(), 10_000);
    }

    #[tokio::test]
    async fn test_ties_keep_admission_order() {
        let fx = Fixture::new();
        let (splitter, s) = fx.splitter_with(&[100, 100, 200]);
        assert_eq!(
            splitter.ranked(),
            vec![s[2].identity(), s[0].identity(), s[1].identity()]
        );
    }

    #[tokio::test]
    async fn test_withdraw_walks_lowest_priority_first() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[100, 200]);
        s[0].add_assets(50);
        s[1].add_assets(500);
        splitter.credit(10).unwrap();

        let sent = splitter.withdraw_to_vault(100).await.unwrap();
        assert_eq!(sent, 100);
        // idle 10, then 50 from the low-APR strategy, then 40 from the other
        assert_eq!(s[0].invested(), 0);
        assert_eq!(s[1].invested(), 460);
        assert_eq!(splitter.idle_balance(), 0);
    }

    #[tokio::test]
    async fn test_withdraw_with_slippage_keeps_pulling() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[100, 200]);
        s[0].add_assets(1_000);
        s[1].add_assets(1_000);
        s[0].set_withdraw_slippage(1_000);

        let sent = splitter.withdraw_to_vault(1_000).await.unwrap();
        assert_eq!(sent, 1_000);
        // 900 from the first strategy, the remaining 100 from the second
        assert_eq!(s[0].invested(), 0);
        assert_eq!(s[1].invested(), 900);
    }

    #[tokio::test]
    async fn test_withdraw_all_skips_paused() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[100, 200]);
        s[0].add_assets(300);
        s[1].add_assets(700);
        splitter.pause(&fx.operator, &s[0].identity()).unwrap();

        let sent = splitter.withdraw_all_to_vault().await.unwrap();
        assert_eq!(sent, 700);
        assert_eq!(s[0].invested(), 300);
        assert_eq!(splitter.idle_balance(), 0);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[50]);
        let id = s[0].identity();

        splitter.pause(&fx.operator, &id).unwrap();
        assert_eq!(splitter.is_paused(&id), Some(true));
        assert_eq!(splitter.apr(&id), Some(Apr::ZERO));

        splitter.resume(&fx.operator, &id, apr(100)).unwrap();
        assert_eq!(splitter.is_paused(&id), Some(false));
        assert_eq!(splitter.apr(&id), Some(apr(100)));

        let err = splitter.resume(&fx.operator, &id, apr(100)).unwrap_err();
        assert!(matches!(err, AllocError::NotPaused(_)));
    }

    #[tokio::test]
    async fn test_set_apr_on_paused_fails_without_partial_update() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[50, 60]);
        splitter.pause(&fx.operator, &s[1].identity()).unwrap();

        let err = splitter
            .set_aprs(
                &fx.operator,
                &[(s[0].identity(), apr(200)), (s[1].identity(), apr(200))],
            )
            .unwrap_err();
        assert!(matches!(err, AllocError::StrategyPaused(_)));
        assert_eq!(splitter.apr(&s[0].identity()), Some(apr(50)));
    }

    #[tokio::test]
    async fn test_operator_calls_require_role() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[50]);
        let id = s[0].identity();
        let err = splitter.set_apr(&fx.stranger, &id, apr(1)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PermissionDenied);
        let err = splitter
            .set_strategy_capacity(&fx.operator, &id, Some(1))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_emergency_exit_parks_funds_and_pauses() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[50]);
        s[0].add_assets(1_000);
        let returned = splitter
            .emergency_exit(&fx.operator, &s[0].identity())
            .await
            .unwrap();
        assert_eq!(returned, 1_000);
        assert_eq!(splitter.idle_balance(), 1_000);
        assert_eq!(splitter.is_paused(&s[0].identity()), Some(true));
        assert_eq!(splitter.total_assets().await, 1_000);
    }

    #[tokio::test]
    async fn test_register_loss_validates_caller_and_size() {
        let fx = Fixture::new();
        let (splitter, s) = fx.splitter_with(&[100]);
        s[0].add_assets(10_000_000);

        let err = splitter
            .register_strategy_loss(&StrategyId::new("intruder"), 500_000, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AllocError::NotAStrategy(_)));

        let err = splitter
            .register_strategy_loss(&s[0].identity(), 500_001, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::LossTooHigh);

        let loss = splitter
            .register_strategy_loss(&s[0].identity(), 1_000, 900)
            .await
            .unwrap();
        assert_eq!(loss, 100);
        assert_eq!(
            splitter
                .register_strategy_loss(&s[0].identity(), 500, 900)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_strategy_failure_is_reported() {
        use crate::strategy::MockStrategyAdapter;

        let fx = Fixture::new();
        let mut adapter = MockStrategyAdapter::new();
        adapter.expect_identity().return_const(StrategyId::new("flaky"));
        adapter.expect_asset().return_const(fx.asset.clone());
        adapter.expect_splitter().return_const(fx.splitter_id.clone());
        adapter.expect_controller().return_const(fx.controller.clone());
        adapter.expect_total_assets().return_const(0u128);
        adapter.expect_capacity().return_const(Amount::MAX);
        adapter
            .expect_invest()
            .returning(|_| Err(anyhow::anyhow!("venue unavailable")));

        let adapter: Arc<dyn crate::strategy::StrategyAdapter> = Arc::new(adapter);
        let mut splitter = fx.splitter();
        splitter
            .admit(&fx.governance, vec![(adapter, apr(100))])
            .unwrap();
        splitter.credit(500).unwrap();

        let err = splitter.invest_all(500).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StrategyFailure);
        assert!(err.to_string().contains("flaky"));
    }
}
