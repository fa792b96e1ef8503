//! Allocation metadata the splitter keeps for each admitted strategy.

use super::adapter::StrategyAdapter;
use crate::types::{Amount, StrategyId};
use crate::utils::fixed::Apr;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Bounded ring buffer of APR samples with a trailing-mean smoother.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AprHistory {
    samples: VecDeque<Apr>,
    capacity: usize,
}

impl AprHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn from_samples(capacity: usize, samples: impl IntoIterator<Item = Apr>) -> Self {
        let mut history = Self::new(capacity);
        for sample in samples {
            history.push(sample);
        }
        history
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, apr: Apr) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(apr);
    }

    /// Floor mean of the newest `window` samples; `None` when empty.
    pub fn smoothed(&self, window: usize) -> Option<Apr> {
        let take = window.max(1).min(self.samples.len());
        if take == 0 {
            return None;
        }
        let sum: u128 = self.samples.iter().rev().take(take).map(|a| a.raw()).sum();
        Some(Apr::from_raw(sum / take as u128))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Apr> {
        self.samples.get(index).copied()
    }

    pub fn latest(&self) -> Option<Apr> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Apr> + '_ {
        self.samples.iter().copied()
    }
}

/// A strategy admitted into the splitter, together with its adapter.
#[derive(Clone)]
pub struct StrategySlot {
    pub(crate) adapter: Arc<dyn StrategyAdapter>,
    pub id: StrategyId,
    /// Initial APR estimate given at admission.
    pub weight: Apr,
    /// Operator-set ceiling on total assets; `None` means unlimited.
    pub external_capacity: Option<Amount>,
    pub paused: bool,
    pub apr_current: Apr,
    pub apr_history: AprHistory,
    pub last_hard_work: DateTime<Utc>,
    /// Losses this strategy registered that insurance made whole.
    pub covered_loss: Amount,
}

impl StrategySlot {
    pub(crate) fn new(
        adapter: Arc<dyn StrategyAdapter>,
        weight: Apr,
        history_len: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: adapter.identity(),
            adapter,
            weight,
            external_capacity: None,
            paused: false,
            apr_current: weight,
            apr_history: AprHistory::new(history_len),
            last_hard_work: now,
            covered_loss: 0,
        }
    }

    pub fn adapter(&self) -> &Arc<dyn StrategyAdapter> {
        &self.adapter
    }

    /// Room left under both the external ceiling and the strategy's own capacity.
    pub(crate) async fn room(&self, assets: Amount) -> Amount {
        let internal = self.adapter.capacity().await.saturating_sub(assets);
        let external = self
            .external_capacity
            .map_or(Amount::MAX, |cap| cap.saturating_sub(assets));
        internal.min(external)
    }
}

impl fmt::Debug for StrategySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySlot")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .field("external_capacity", &self.external_capacity)
            .field("paused", &self.paused)
            .field("apr_current", &self.apr_current)
            .field("apr_history", &self.apr_history.len())
            .field("last_hard_work", &self.last_hard_work)
            .finish()
    }
}
