//! Hard work cycles and APR tracking.

use super::Splitter;
use crate::error::{AllocError, AllocResult};
use crate::strategy::HardWorkReport;
use crate::types::{Amount, StrategyId};
use crate::utils::fixed::{compute_apr, Apr};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardWorkOutcome {
    pub id: StrategyId,
    pub elapsed_secs: u64,
    pub assets_before: Amount,
    pub earned: Amount,
    pub lost: Amount,
    /// APR sample derived from this cycle.
    pub sample: Apr,
    /// Smoothed APR after the sample was recorded.
    pub apr_current: Apr,
    /// Portion of `lost` made whole by insurance (filled in by the vault).
    pub covered: Amount,
}

impl Splitter {
    /// Harvest one strategy and fold the result into its APR.
    ///
    /// Returns `None` when the strategy is paused or no time has passed since
    /// its last cycle.
    pub(crate) async fn hard_work(&mut self, id: &StrategyId) -> AllocResult<Option<HardWorkOutcome>> {
        let index = self.index_of(id)?;
        let now = self.now();
        let slot = &self.strategies[index];
        if slot.paused {
            debug!(strategy = %id, "Skipping hard work on paused strategy");
            return Ok(None);
        }
        let elapsed_secs = u64::try_from((now - slot.last_hard_work).num_seconds()).unwrap_or(0);
        if elapsed_secs == 0 {
            return Ok(None);
        }

        let assets_before = slot.adapter.total_assets().await;
        let report = if assets_before == 0 {
            HardWorkReport::default()
        } else {
            slot.adapter
                .do_hard_work()
                .await
                .map_err(|e| AllocError::strategy(id, e))?
        };

        let profit = report.earned.saturating_sub(report.lost);
        let sample = compute_apr(assets_before, profit, elapsed_secs)?;
        let window = self.settings.apr_smoothing_window;

        let slot = &mut self.strategies[index];
        slot.apr_history.push(sample);
        slot.apr_current = slot.apr_history.smoothed(window).unwrap_or(sample);
        slot.last_hard_work = now;

        info!(
            strategy = %id,
            earned = report.earned,
            lost = report.lost,
            sample = %sample.as_percent(),
            apr = %slot.apr_current.as_percent(),
            "Hard work done"
        );
        Ok(Some(HardWorkOutcome {
            id: id.clone(),
            elapsed_secs,
            assets_before,
            earned: report.earned,
            lost: report.lost,
            sample,
            apr_current: slot.apr_current,
            covered: 0,
        }))
    }

    /// Hard work on every strategy, highest priority first.
    pub(crate) async fn hard_work_all(&mut self) -> AllocResult<Vec<HardWorkOutcome>> {
        let mut outcomes = Vec::new();
        for id in self.ranked() {
            if let Some(outcome) = self.hard_work(&id).await? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }
}
