//! Timelocked admission and removal of strategies.

use super::Splitter;
use crate::access::{PermissionContext, Role};
use crate::error::{AllocError, AllocResult};
use crate::strategy::{StrategyAdapter, StrategySlot};
use crate::types::StrategyId;
use crate::utils::fixed::Apr;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

impl Splitter {
    /// Start the admission timelock for each candidate.
    pub fn schedule(&mut self, ctx: &PermissionContext, candidates: &[StrategyId]) -> AllocResult<()> {
        ctx.require(Role::Governance, "schedule strategy")?;
        if candidates.is_empty() {
            return Err(AllocError::EmptyBatch);
        }

        let mut seen = HashSet::new();
        for id in candidates {
            if !seen.insert(id) {
                return Err(AllocError::DuplicateInBatch(id.clone()));
            }
            if self.scheduled.contains_key(id) {
                return Err(AllocError::AlreadyScheduled(id.clone()));
            }
            if self.slot(id).is_some() {
                return Err(AllocError::AlreadyExists(id.clone()));
            }
        }

        let unlock_at = self.now() + self.settings.admission_delay();
        for id in candidates {
            self.scheduled.insert(id.clone(), unlock_at);
            info!(strategy = %id, %unlock_at, "Strategy scheduled");
        }
        Ok(())
    }

    pub fn cancel_schedule(&mut self, ctx: &PermissionContext, candidates: &[StrategyId]) -> AllocResult<()> {
        ctx.require(Role::Governance, "cancel schedule")?;
        if let Some(missing) = candidates.iter().find(|id| !self.scheduled.contains_key(*id)) {
            return Err(AllocError::NotScheduled(missing.clone()));
        }
        for id in candidates {
            self.scheduled.remove(id);
            info!(strategy = %id, "Schedule cancelled");
        }
        Ok(())
    }

    /// Pending candidates with their unlock times, earliest id first.
    pub fn scheduled(&self) -> Vec<(StrategyId, DateTime<Utc>)> {
        self.scheduled
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect()
    }

    /// Admit a batch of strategies, each with its initial APR estimate.
    ///
    /// The whole batch is validated first; nothing is admitted unless every
    /// candidate passes. While no strategy is registered yet the timelock
    /// does not apply.
    pub fn admit(
        &mut self,
        ctx: &PermissionContext,
        batch: Vec<(Arc<dyn StrategyAdapter>, Apr)>,
    ) -> AllocResult<()> {
        ctx.require(Role::Governance, "admit strategy")?;
        if batch.is_empty() {
            return Err(AllocError::EmptyBatch);
        }

        let now = self.now();
        let bootstrap = self.strategies.is_empty();
        let mut seen = HashSet::new();
        for (adapter, _) in &batch {
            let id = adapter.identity();
            self.validate_candidate(adapter.as_ref(), &id)?;
            if !seen.insert(id.clone()) {
                return Err(AllocError::DuplicateInBatch(id));
            }
            if !bootstrap {
                match self.scheduled.get(&id) {
                    None => return Err(AllocError::NotScheduled(id)),
                    Some(unlock_at) if *unlock_at > now => {
                        return Err(AllocError::TimelockNotElapsed {
                            id,
                            unlock_at: *unlock_at,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        for (adapter, weight) in batch {
            let slot = StrategySlot::new(adapter, weight, self.settings.apr_history_len, now);
            self.scheduled.remove(&slot.id);
            info!(
                strategy = %slot.id,
                weight = %weight.as_percent(),
                bootstrap,
                "Strategy admitted"
            );
            self.strategies.push(slot);
        }
        Ok(())
    }

    pub(super) fn validate_candidate(&self, adapter: &dyn StrategyAdapter, id: &StrategyId) -> AllocResult<()> {
        let asset = adapter.asset();
        if asset != self.asset {
            return Err(AllocError::AssetMismatch {
                id: id.clone(),
                expected: self.asset.clone(),
                actual: asset,
            });
        }
        let splitter = adapter.splitter();
        if splitter != self.id {
            return Err(AllocError::SplitterMismatch {
                id: id.clone(),
                expected: self.id.clone(),
                actual: splitter,
            });
        }
        let controller = adapter.controller();
        if controller != self.controller {
            return Err(AllocError::ControllerMismatch {
                id: id.clone(),
                expected: self.controller.clone(),
                actual: controller,
            });
        }
        if self.slot(id).is_some() {
            return Err(AllocError::AlreadyExists(id.clone()));
        }
        Ok(())
    }

    /// Drop a strategy that no longer holds funds.
    pub async fn remove(&mut self, ctx: &PermissionContext, id: &StrategyId) -> AllocResult<()> {
        ctx.require(Role::Governance, "remove strategy")?;
        let index = self.index_of(id)?;
        let assets = self.strategies[index].adapter.total_assets().await;
        if assets > 0 {
            return Err(AllocError::NonEmptyBalance {
                id: id.clone(),
                assets,
            });
        }
        self.strategies.remove(index);
        info!(strategy = %id, "Strategy removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::Clock;
    use crate::error::{AllocError, ErrorKind};
    use crate::fixtures::{apr, Fixture};
    use crate::strategy::{MockStrategy, StrategyAdapter};
    use crate::types::{AssetId, ControllerId, SplitterId, StrategyId};
    use chrono::Duration;
    use std::sync::Arc;

    // ===== Test Helpers =====

    fn as_dyn(strategy: &Arc<MockStrategy>) -> Arc<dyn StrategyAdapter> {
        strategy.clone()
    }

    // ===== Scheduling =====

    #[tokio::test]
    async fn test_schedule_records_unlock_time() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();
        let id = StrategyId::new("candidate");
        splitter.schedule(&fx.governance, &[id.clone()]).unwrap();

        let scheduled = splitter.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, id);
        assert_eq!(scheduled[0].1, fx.clock.now() + Duration::hours(18));
    }

    #[tokio::test]
    async fn test_schedule_twice_fails() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();
        let id = StrategyId::new("candidate");
        splitter.schedule(&fx.governance, &[id.clone()]).unwrap();
        let err = splitter.schedule(&fx.governance, &[id]).unwrap_err();
        assert!(matches!(err, AllocError::AlreadyScheduled(_)));
    }

    #[tokio::test]
    async fn test_schedule_admitted_fails() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[100]);
        let err = splitter
            .schedule(&fx.governance, &[s[0].identity()])
            .unwrap_err();
        assert!(matches!(err, AllocError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_cancel_schedule() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();
        let id = StrategyId::new("candidate");
        splitter.schedule(&fx.governance, &[id.clone()]).unwrap();
        splitter.cancel_schedule(&fx.governance, &[id.clone()]).unwrap();
        assert!(splitter.scheduled().is_empty());

        let err = splitter.cancel_schedule(&fx.governance, &[id]).unwrap_err();
        assert!(matches!(err, AllocError::NotScheduled(_)));
    }

    #[tokio::test]
    async fn test_schedule_requires_governance() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();
        let err = splitter
            .schedule(&fx.operator, &[StrategyId::new("x")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    // ===== Admission =====

    #[tokio::test]
    async fn test_bootstrap_admits_without_schedule() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();
        let s = fx.strategy("first");
        splitter
            .admit(&fx.governance, vec![(as_dyn(&s), apr(100))])
            .unwrap();

        let slot = splitter.slot(&s.identity()).unwrap();
        assert_eq!(slot.apr_current, apr(100));
        assert_eq!(slot.weight, apr(100));
        assert!(slot.apr_history.is_empty());
        assert!(!slot.paused);
        assert_eq!(slot.last_hard_work, fx.clock.now());
    }

    #[tokio::test]
    async fn test_admission_waits_for_timelock() {
        let fx = Fixture::new();
        let (mut splitter, _) = fx.splitter_with(&[100]);
        let late = fx.strategy("late");

        let err = splitter
            .admit(&fx.governance, vec![(as_dyn(&late), apr(50))])
            .unwrap_err();
        assert!(matches!(err, AllocError::NotScheduled(_)));

        splitter
            .schedule(&fx.governance, &[late.identity()])
            .unwrap();
        fx.clock.advance(Duration::hours(17));
        let err = splitter
            .admit(&fx.governance, vec![(as_dyn(&late), apr(50))])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimelockViolation);

        fx.clock.advance(Duration::hours(1));
        splitter
            .admit(&fx.governance, vec![(as_dyn(&late), apr(50))])
            .unwrap();
        assert_eq!(splitter.len(), 2);
        assert!(splitter.scheduled().is_empty());

        // Admitted exactly once.
        let err = splitter
            .admit(&fx.governance, vec![(as_dyn(&late), apr(50))])
            .unwrap_err();
        assert!(matches!(err, AllocError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_identity_mismatches_are_rejected() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();

        let wrong_asset = Arc::new(MockStrategy::new(
            "a",
            AssetId::new("DAI"),
            fx.splitter_id.clone(),
            fx.controller.clone(),
        ));
        let wrong_splitter = Arc::new(MockStrategy::new(
            "b",
            fx.asset.clone(),
            SplitterId::new("other"),
            fx.controller.clone(),
        ));
        let wrong_controller = Arc::new(MockStrategy::new(
            "c",
            fx.asset.clone(),
            fx.splitter_id.clone(),
            ControllerId::new("other"),
        ));

        let err = splitter
            .admit(&fx.governance, vec![(as_dyn(&wrong_asset), apr(1))])
            .unwrap_err();
        assert!(matches!(err, AllocError::AssetMismatch { .. }));
        let err = splitter
            .admit(&fx.governance, vec![(as_dyn(&wrong_splitter), apr(1))])
            .unwrap_err();
        assert!(matches!(err, AllocError::SplitterMismatch { .. }));
        let err = splitter
            .admit(&fx.governance, vec![(as_dyn(&wrong_controller), apr(1))])
            .unwrap_err();
        assert!(matches!(err, AllocError::ControllerMismatch { .. }));
        assert!(splitter.is_empty());
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let fx = Fixture::new();
        let mut splitter = fx.splitter();
        let s = fx.strategy("dup");
        let err = splitter
            .admit(
                &fx.governance,
                vec![(as_dyn(&s), apr(100)), (as_dyn(&s), apr(100))],
            )
            .unwrap_err();
        assert!(matches!(err, AllocError::DuplicateInBatch(_)));
        assert!(splitter.is_empty());

        let err = splitter.admit(&fx.governance, vec![]).unwrap_err();
        assert!(matches!(err, AllocError::EmptyBatch));
    }

    // ===== Removal =====

    #[tokio::test]
    async fn test_remove_requires_empty_balance() {
        let fx = Fixture::new();
        let (mut splitter, s) = fx.splitter_with(&[100, 200, 300]);
        s[1].add_assets(5);

        let err = splitter
            .remove(&fx.governance, &s[1].identity())
            .await
            .unwrap_err();
        assert!(matches!(err, AllocError::NonEmptyBalance { assets: 5, .. }));

        let returned = splitter
            .withdraw_all_from_strategy(&fx.governance, &s[1].identity())
            .await
            .unwrap();
        assert_eq!(returned, 5);
        splitter
            .remove(&fx.governance, &s[1].identity())
            .await
            .unwrap();

        let ids: Vec<_> = splitter.strategies().iter().map(|x| x.id.clone()).collect();
        assert_eq!(ids, vec![s[0].identity(), s[2].identity()]);
        assert_eq!(splitter.idle_balance(), 5);

        let err = splitter
            .remove(&fx.governance, &s[1].identity())
            .await
            .unwrap_err();
        assert!(matches!(err, AllocError::NotFound(_)));
    }
}
