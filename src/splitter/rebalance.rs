//! Moving funds toward the best-performing strategy.

use super::Splitter;
use crate::error::{AllocError, AllocResult};
use crate::types::{Amount, StrategyId};
use crate::utils::fixed::{exceeds_bps, mul_div};
use tracing::{debug, info, warn};

/// What one rebalance step moved and lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceOutcome {
    pub recipient: StrategyId,
    pub donor: Option<StrategyId>,
    pub withdraw_requested: Amount,
    pub withdrawn: Amount,
    pub invest_requested: Amount,
    pub invested: Amount,
    /// Value lost across both legs.
    pub loss: Amount,
    /// Portion of `loss` made whole by insurance (filled in by the vault).
    pub covered: Amount,
}

impl Splitter {
    /// Shift `percent`% of the weakest donor's funds, plus any idle balance,
    /// into the highest-priority strategy with room.
    ///
    /// Callers must restore state on error; the vault does so.
    pub(crate) async fn rebalance(
        &mut self,
        percent: u32,
        loss_tolerance_bps: u32,
    ) -> AllocResult<RebalanceOutcome> {
        if self.strategies.is_empty() {
            return Err(AllocError::EmptyStrategySet);
        }
        if percent > 100 {
            return Err(AllocError::InvalidPercent(percent));
        }

        let order = self.priority_order();

        let mut recipient = None;
        for (rank, &index) in order.iter().enumerate() {
            let slot = &self.strategies[index];
            if slot.paused {
                continue;
            }
            let assets = slot.adapter.total_assets().await;
            let room = slot.room(assets).await;
            if room > 0 {
                recipient = Some((rank, index, room));
                break;
            }
        }
        let Some((rank, recipient, room)) = recipient else {
            debug!("No strategy has room");
            return Err(AllocError::NothingInvested);
        };

        let mut donor = None;
        for &index in order[rank + 1..].iter().rev() {
            let slot = &self.strategies[index];
            if slot.paused {
                continue;
            }
            let assets = slot.adapter.total_assets().await;
            if assets > 0 {
                donor = Some((index, assets));
                break;
            }
        }

        let mut withdraw_requested = 0;
        let mut withdrawn = 0;
        if let Some((index, assets)) = donor {
            withdraw_requested = mul_div(assets, u128::from(percent), 100)?;
            if withdraw_requested > 0 {
                let slot = &self.strategies[index];
                withdrawn = slot
                    .adapter
                    .withdraw(withdraw_requested)
                    .await
                    .map_err(|e| AllocError::strategy(&slot.id, e))?;
                self.idle = self.idle.checked_add(withdrawn).ok_or(AllocError::Overflow)?;
            }
        }

        let invest_requested = self.idle.min(room);
        if invest_requested == 0 && withdraw_requested == 0 {
            return Err(AllocError::NothingInvested);
        }

        let mut invested = 0;
        if invest_requested > 0 {
            let slot = &self.strategies[recipient];
            invested = slot
                .adapter
                .invest(invest_requested)
                .await
                .map_err(|e| AllocError::strategy(&slot.id, e))?
                .min(invest_requested);
            self.idle -= invest_requested;
        }

        let loss = (withdraw_requested - withdrawn.min(withdraw_requested))
            + (invest_requested - invested);
        let moved = withdraw_requested.max(invest_requested);
        if exceeds_bps(loss, moved, loss_tolerance_bps)? {
            warn!(loss, moved, loss_tolerance_bps, "Rebalance loss above tolerance");
            return Err(AllocError::LossTooHigh {
                loss,
                base: moved,
                limit_bps: loss_tolerance_bps,
            });
        }

        let outcome = RebalanceOutcome {
            recipient: self.strategies[recipient].id.clone(),
            donor: donor.map(|(index, _)| self.strategies[index].id.clone()),
            withdraw_requested,
            withdrawn,
            invest_requested,
            invested,
            loss,
            covered: 0,
        };
        info!(
            recipient = %outcome.recipient,
            donor = ?outcome.donor,
            withdrawn,
            invested,
            loss,
            "Rebalanced"
        );
        Ok(outcome)
    }
}
