//! Share-issuing vault in front of the splitter.
//!
//! Depositors hold shares priced at `total_assets / total_supply`. Fees feed
//! an insurance buffer that masks realized strategy losses from the share
//! price; whatever insurance cannot cover is spread over all holders.
//!
//! Every mutating operation takes a checkpoint first and restores it when
//! it fails, so a rejected call leaves the vault and splitter accounting as
//! it found them.

mod insurance;
mod ledger;
mod shared;
mod snapshot;

pub use insurance::{FeePolicy, InsuranceBuffer, MAX_FEE_BPS};
pub use ledger::ShareLedger;
pub use shared::SharedVault;
pub use snapshot::VaultSnapshot;

use crate::access::{PermissionContext, Role};
use crate::error::{AllocError, AllocResult};
use crate::splitter::{HardWorkOutcome, RebalanceOutcome, Splitter};
use crate::types::{AccountId, Amount, AssetId, ControllerId, StrategyId};
use crate::utils::fixed::{bps_of, exceeds_bps, mul_div, mul_div_up, SharePrice, BPS_DENOMINATOR};
use insurance::check_bps;
use tracing::{info, warn};

/// Shares locked forever on the first deposit so the supply never returns to zero.
pub const INITIAL_SHARES: Amount = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositReceipt {
    pub assets: Amount,
    pub fee: Amount,
    /// Shares credited to the receiver.
    pub shares: Amount,
    /// Value lost while placing the deposit.
    pub loss: Amount,
    pub covered: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemReceipt {
    pub shares: Amount,
    /// Value of the shares at the pre-withdrawal price.
    pub expected: Amount,
    pub fee: Amount,
    /// Amount handed to the owner.
    pub assets_out: Amount,
    /// Drop in total assets caused by pulling liquidity.
    pub loss: Amount,
    pub covered: Amount,
    /// Shortfall borne by the owner.
    pub uncovered: Amount,
}

/// Result of pulling all funds out of a single strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyExit {
    pub returned: Amount,
    pub loss: Amount,
    pub covered: Amount,
}

#[derive(Debug, Clone)]
pub struct Vault {
    fees: FeePolicy,
    /// Share of total assets kept idle in the vault, in bps.
    buffer_bps: u32,
    idle: Amount,
    insurance: InsuranceBuffer,
    ledger: ShareLedger,
    splitter: Splitter,
}

impl Vault {
    pub fn new(splitter: Splitter, fees: FeePolicy, buffer_bps: u32) -> AllocResult<Self> {
        fees.validate()?;
        check_bps("buffer", buffer_bps, BPS_DENOMINATOR)?;
        Ok(Self {
            fees,
            buffer_bps,
            idle: 0,
            insurance: InsuranceBuffer::default(),
            ledger: ShareLedger::default(),
            splitter,
        })
    }

    pub fn asset(&self) -> &AssetId {
        self.splitter.asset()
    }

    pub fn controller(&self) -> &ControllerId {
        self.splitter.controller()
    }

    pub fn fees(&self) -> FeePolicy {
        self.fees
    }

    pub fn buffer_bps(&self) -> u32 {
        self.buffer_bps
    }

    /// Balance held by the vault itself.
    pub fn idle_balance(&self) -> Amount {
        self.idle
    }

    pub fn insurance(&self) -> &InsuranceBuffer {
        &self.insurance
    }

    pub fn insurance_balance(&self) -> Amount {
        self.insurance.balance()
    }

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.ledger.balance_of(account)
    }

    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    pub fn splitter(&self) -> &Splitter {
        &self.splitter
    }

    /// Administrative access to the splitter (admission, pauses, APRs).
    pub fn splitter_mut(&mut self) -> &mut Splitter {
        &mut self.splitter
    }

    /// Vault idle plus everything under the splitter. Insurance is excluded.
    pub async fn total_assets(&self) -> Amount {
        self.idle.saturating_add(self.splitter.total_assets().await)
    }

    pub async fn max_cheap_withdraw(&self) -> Amount {
        self.idle.saturating_add(self.splitter.max_cheap_withdraw().await)
    }

    /// Assets per share; `1.0` while no shares exist.
    pub async fn share_price(&self) -> AllocResult<SharePrice> {
        let supply = self.ledger.total_supply();
        if supply == 0 {
            return Ok(SharePrice::ONE);
        }
        SharePrice::from_ratio(self.total_assets().await, supply)
    }

    pub async fn convert_to_assets(&self, shares: Amount) -> AllocResult<Amount> {
        let supply = self.ledger.total_supply();
        if supply == 0 {
            return Ok(shares);
        }
        mul_div(shares, self.total_assets().await, supply)
    }

    pub async fn convert_to_shares(&self, assets: Amount) -> AllocResult<Amount> {
        let supply = self.ledger.total_supply();
        let total = self.total_assets().await;
        if supply == 0 || total == 0 {
            return Ok(assets);
        }
        mul_div(assets, supply, total)
    }

    fn rollback<T>(&mut self, checkpoint: Self, result: AllocResult<T>) -> AllocResult<T> {
        if let Err(err) = &result {
            warn!(error = %err, "Operation failed, accounting restored");
            *self = checkpoint;
        }
        result
    }

    /// Move a loss from insurance into the vault's idle balance.
    fn cover_loss(&mut self, loss: Amount) -> AllocResult<Amount> {
        if loss == 0 {
            return Ok(0);
        }
        let covered = self.insurance.cover(loss);
        self.idle = self.idle.checked_add(covered).ok_or(AllocError::Overflow)?;
        if covered < loss {
            warn!(loss, covered, uncovered = loss - covered, "Loss not fully covered");
        }
        Ok(covered)
    }

    fn route_fee(&mut self, fee: Amount) -> AllocResult<()> {
        let (to_insurance, distributed) = self.fees.split(fee)?;
        self.insurance.credit(to_insurance)?;
        self.insurance.distribute(distributed);
        Ok(())
    }

    /// Hand idle funds above the buffer target to the splitter.
    async fn invest_excess(&mut self) -> AllocResult<Amount> {
        let target = bps_of(self.total_assets().await, self.buffer_bps)?;
        let excess = self.idle.saturating_sub(target);
        if excess == 0 {
            return Ok(0);
        }
        self.idle -= excess;
        self.splitter.credit(excess)?;
        let placement = self.splitter.invest_all(excess).await?;
        Ok(placement.placed)
    }

    // ---------------------------------------------------------------------
    // Deposits and withdrawals
    // ---------------------------------------------------------------------

    pub async fn deposit(&mut self, amount: Amount, receiver: &AccountId) -> AllocResult<DepositReceipt> {
        if amount == 0 {
            return Err(AllocError::ZeroAmount);
        }
        let checkpoint = self.clone();
        let result = self.deposit_inner(amount, receiver).await;
        self.rollback(checkpoint, result)
    }

    async fn deposit_inner(&mut self, amount: Amount, receiver: &AccountId) -> AllocResult<DepositReceipt> {
        let fee = self.fees.deposit_fee(amount)?;
        let net = amount - fee;
        let assets_before = self.total_assets().await;
        let supply = self.ledger.total_supply();

        let minted = if supply == 0 {
            if net <= INITIAL_SHARES {
                return Err(AllocError::DepositTooSmall {
                    shares: net,
                    minimum: INITIAL_SHARES,
                });
            }
            net
        } else {
            if assets_before == 0 {
                return Err(AllocError::ZeroShares);
            }
            mul_div(net, supply, assets_before)?
        };
        if minted == 0 {
            return Err(AllocError::ZeroShares);
        }

        self.route_fee(fee)?;
        self.idle = self.idle.checked_add(net).ok_or(AllocError::Overflow)?;
        self.invest_excess().await?;

        let expected = assets_before.saturating_add(net);
        let loss = expected.saturating_sub(self.total_assets().await);
        let covered = self.cover_loss(loss)?;

        let shares = if supply == 0 {
            self.ledger.mint(&AccountId::dead(), INITIAL_SHARES)?;
            minted - INITIAL_SHARES
        } else {
            minted
        };
        self.ledger.mint(receiver, shares)?;

        info!(%receiver, amount, fee, shares, loss, covered, "Deposit");
        Ok(DepositReceipt {
            assets: amount,
            fee,
            shares,
            loss,
            covered,
        })
    }

    /// Burn `shares` of `owner` and pay out their value.
    ///
    /// Fails with `SlippageExceeded` when the shortfall insurance cannot
    /// cover is above `max_slippage_bps` of the expected value.
    pub async fn redeem(
        &mut self,
        shares: Amount,
        owner: &AccountId,
        max_slippage_bps: u32,
    ) -> AllocResult<RedeemReceipt> {
        if shares == 0 {
            return Err(AllocError::ZeroShares);
        }
        let available = self.ledger.balance_of(owner);
        if shares > available {
            return Err(AllocError::InsufficientShares {
                requested: shares,
                available,
            });
        }
        let checkpoint = self.clone();
        let result = self.redeem_inner(shares, owner, max_slippage_bps).await;
        self.rollback(checkpoint, result)
    }

    async fn redeem_inner(
        &mut self,
        shares: Amount,
        owner: &AccountId,
        max_slippage_bps: u32,
    ) -> AllocResult<RedeemReceipt> {
        let assets_before = self.total_assets().await;
        let expected = mul_div(shares, assets_before, self.ledger.total_supply())?;
        if expected == 0 {
            return Err(AllocError::ZeroAmount);
        }

        if self.idle < expected {
            let need = expected - self.idle;
            let received = if need >= self.splitter.total_assets().await {
                self.splitter.withdraw_all_to_vault().await?
            } else {
                self.splitter.withdraw_to_vault(need).await?
            };
            self.idle = self.idle.checked_add(received).ok_or(AllocError::Overflow)?;
        }

        let loss = assets_before.saturating_sub(self.total_assets().await);
        let fee = self.fees.withdraw_fee(expected)?;
        self.route_fee(fee)?;

        // A multi-strategy pull can deliver `expected` and still lose value.
        let covered = self.cover_loss(loss)?;
        let uncovered = expected.saturating_sub(self.idle);
        if uncovered > expected - fee || exceeds_bps(uncovered, expected, max_slippage_bps)? {
            return Err(AllocError::SlippageExceeded {
                uncovered,
                expected,
                max_bps: max_slippage_bps,
            });
        }

        let paid = expected - uncovered;
        self.idle -= paid;
        let assets_out = paid - fee;
        self.ledger.burn(owner, shares)?;

        info!(%owner, shares, expected, assets_out, fee, loss, covered, uncovered, "Withdraw");
        Ok(RedeemReceipt {
            shares,
            expected,
            fee,
            assets_out,
            loss,
            covered,
            uncovered,
        })
    }

    /// Withdraw `assets` net of fees; the share amount is rounded up.
    pub async fn withdraw(
        &mut self,
        assets: Amount,
        owner: &AccountId,
        max_slippage_bps: u32,
    ) -> AllocResult<RedeemReceipt> {
        if assets == 0 {
            return Err(AllocError::ZeroAmount);
        }
        let supply = self.ledger.total_supply();
        let total = self.total_assets().await;
        if supply == 0 || total == 0 {
            return Err(AllocError::ZeroShares);
        }
        let keep_bps = u128::from(BPS_DENOMINATOR - self.fees.withdraw_fee_bps);
        let gross = mul_div_up(assets, u128::from(BPS_DENOMINATOR), keep_bps)?;
        let shares = mul_div_up(gross, supply, total)?;
        self.redeem(shares, owner, max_slippage_bps).await
    }

    /// Redeem every share `owner` holds.
    pub async fn withdraw_all(&mut self, owner: &AccountId, max_slippage_bps: u32) -> AllocResult<RedeemReceipt> {
        let shares = self.ledger.balance_of(owner);
        if shares == 0 {
            return Err(AllocError::ZeroShares);
        }
        self.redeem(shares, owner, max_slippage_bps).await
    }

    pub fn transfer_shares(&mut self, from: &AccountId, to: &AccountId, shares: Amount) -> AllocResult<()> {
        self.ledger.transfer(from, to, shares)
    }

    /// Top up insurance; open to anyone.
    pub fn fund_insurance(&mut self, amount: Amount) -> AllocResult<()> {
        if amount == 0 {
            return Err(AllocError::ZeroAmount);
        }
        self.insurance.credit(amount)?;
        info!(amount, balance = self.insurance.balance(), "Insurance funded");
        Ok(())
    }

    /// Cover a loss a strategy reports about itself.
    pub async fn cover_possible_strategy_loss(
        &mut self,
        caller: &StrategyId,
        expected_assets: Amount,
        actual_assets: Amount,
    ) -> AllocResult<Amount> {
        let loss = self
            .splitter
            .register_strategy_loss(caller, expected_assets, actual_assets)
            .await?;
        let covered = self.cover_loss(loss)?;
        self.splitter.record_covered_loss(caller, covered);
        if loss > 0 {
            info!(strategy = %caller, loss, covered, "Strategy loss registered");
        }
        Ok(covered)
    }

    // ---------------------------------------------------------------------
    // Operator and governance
    // ---------------------------------------------------------------------

    pub async fn rebalance(
        &mut self,
        ctx: &PermissionContext,
        percent: u32,
        loss_tolerance_bps: u32,
    ) -> AllocResult<RebalanceOutcome> {
        ctx.require(Role::Operator, "rebalance")?;
        let checkpoint = self.clone();
        let result = self.rebalance_inner(percent, loss_tolerance_bps).await;
        self.rollback(checkpoint, result)
    }

    async fn rebalance_inner(&mut self, percent: u32, loss_tolerance_bps: u32) -> AllocResult<RebalanceOutcome> {
        let mut outcome = self.splitter.rebalance(percent, loss_tolerance_bps).await?;
        outcome.covered = self.cover_loss(outcome.loss)?;
        Ok(outcome)
    }

    /// Hard work on one strategy; its reported loss is covered from insurance.
    pub async fn do_hard_work_for(
        &mut self,
        ctx: &PermissionContext,
        id: &StrategyId,
    ) -> AllocResult<Option<HardWorkOutcome>> {
        ctx.require(Role::Operator, "hard work")?;
        let checkpoint = self.clone();
        let result = match self.splitter.hard_work(id).await {
            Ok(Some(outcome)) => self.settle_hard_work(outcome).map(Some),
            other => other,
        };
        self.rollback(checkpoint, result)
    }

    pub async fn do_hard_work(&mut self, ctx: &PermissionContext) -> AllocResult<Vec<HardWorkOutcome>> {
        ctx.require(Role::Operator, "hard work")?;
        let checkpoint = self.clone();
        let result = match self.splitter.hard_work_all().await {
            Ok(outcomes) => outcomes
                .into_iter()
                .map(|outcome| self.settle_hard_work(outcome))
                .collect(),
            Err(err) => Err(err),
        };
        self.rollback(checkpoint, result)
    }

    fn settle_hard_work(&mut self, mut outcome: HardWorkOutcome) -> AllocResult<HardWorkOutcome> {
        outcome.covered = self.cover_loss(outcome.lost)?;
        self.splitter.record_covered_loss(&outcome.id, outcome.covered);
        Ok(outcome)
    }

    /// Pull everything out of one strategy into the splitter; any value lost
    /// on the way out is covered from insurance.
    pub async fn withdraw_all_from_strategy(
        &mut self,
        ctx: &PermissionContext,
        id: &StrategyId,
    ) -> AllocResult<StrategyExit> {
        let checkpoint = self.clone();
        let assets_before = self.total_assets().await;
        let result = match self.splitter.withdraw_all_from_strategy(ctx, id).await {
            Ok(returned) => self.settle_exit(id, assets_before, returned).await,
            Err(err) => Err(err),
        };
        self.rollback(checkpoint, result)
    }

    /// Emergency exit of one strategy, which is left paused. Losses are
    /// covered the same way as a governance withdrawal.
    pub async fn emergency_exit(&mut self, ctx: &PermissionContext, id: &StrategyId) -> AllocResult<StrategyExit> {
        let checkpoint = self.clone();
        let assets_before = self.total_assets().await;
        let result = match self.splitter.emergency_exit(ctx, id).await {
            Ok(returned) => self.settle_exit(id, assets_before, returned).await,
            Err(err) => Err(err),
        };
        self.rollback(checkpoint, result)
    }

    async fn settle_exit(&mut self, id: &StrategyId, assets_before: Amount, returned: Amount) -> AllocResult<StrategyExit> {
        let loss = assets_before.saturating_sub(self.total_assets().await);
        let covered = self.cover_loss(loss)?;
        self.splitter.record_covered_loss(id, covered);
        if loss > 0 {
            info!(strategy = %id, returned, loss, covered, "Strategy exit loss");
        }
        Ok(StrategyExit {
            returned,
            loss,
            covered,
        })
    }

    pub fn set_fees(&mut self, ctx: &PermissionContext, deposit_fee_bps: u32, withdraw_fee_bps: u32) -> AllocResult<()> {
        ctx.require(Role::Governance, "set fees")?;
        let fees = FeePolicy::new(deposit_fee_bps, withdraw_fee_bps, self.fees.insurance_share_bps)?;
        self.fees = fees;
        info!(deposit_fee_bps, withdraw_fee_bps, "Fees updated");
        Ok(())
    }

    pub fn set_insurance_share(&mut self, ctx: &PermissionContext, insurance_share_bps: u32) -> AllocResult<()> {
        ctx.require(Role::Governance, "set insurance share")?;
        check_bps("insurance share", insurance_share_bps, BPS_DENOMINATOR)?;
        self.fees.insurance_share_bps = insurance_share_bps;
        info!(insurance_share_bps, "Insurance share updated");
        Ok(())
    }

    pub fn set_buffer(&mut self, ctx: &PermissionContext, buffer_bps: u32) -> AllocResult<()> {
        ctx.require(Role::Governance, "set buffer")?;
        check_bps("buffer", buffer_bps, BPS_DENOMINATOR)?;
        self.buffer_bps = buffer_bps;
        info!(buffer_bps, "Buffer updated");
        Ok(())
    }
}
