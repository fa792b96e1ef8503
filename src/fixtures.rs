//! Shared builders for unit tests.

use crate::access::PermissionContext;
use crate::clock::{Clock, ManualClock};
use crate::splitter::{Splitter, SplitterSettings};
use crate::strategy::{MockStrategy, StrategyAdapter};
use crate::types::{AccountId, AssetId, ControllerId, SplitterId};
use crate::utils::fixed::{Apr, APR_PRECISION};
use crate::vault::{FeePolicy, Vault};
use std::sync::Arc;

/// APR given in whole percent.
pub(crate) fn apr(percent: u128) -> Apr {
    Apr::from_raw(percent * APR_PRECISION / 100)
}

pub(crate) fn alice() -> AccountId {
    AccountId::new("alice")
}

pub(crate) fn bob() -> AccountId {
    AccountId::new("bob")
}

pub(crate) struct Fixture {
    pub asset: AssetId,
    pub controller: ControllerId,
    pub splitter_id: SplitterId,
    pub clock: Arc<ManualClock>,
    pub governance: PermissionContext,
    pub operator: PermissionContext,
    pub stranger: PermissionContext,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            asset: AssetId::new("USDC"),
            controller: ControllerId::new("controller"),
            splitter_id: SplitterId::new("usdc-splitter"),
            clock: Arc::new(ManualClock::default()),
            governance: PermissionContext::governance("gov"),
            operator: PermissionContext::operator("keeper"),
            stranger: PermissionContext::anonymous("stranger"),
        }
    }

    pub fn splitter(&self) -> Splitter {
        let clock: Arc<dyn Clock> = self.clock.clone();
        Splitter::new(
            self.splitter_id.clone(),
            self.asset.clone(),
            self.controller.clone(),
            SplitterSettings::default(),
            clock,
        )
    }

    pub fn strategy(&self, name: &str) -> Arc<MockStrategy> {
        MockStrategy::new(
            name,
            self.asset.clone(),
            self.splitter_id.clone(),
            self.controller.clone(),
        )
        .shared()
    }

    /// Splitter with one mock strategy per APR (in percent), named `s0`, `s1`, ...
    pub fn splitter_with(&self, aprs: &[u128]) -> (Splitter, Vec<Arc<MockStrategy>>) {
        let mut splitter = self.splitter();
        let strategies: Vec<_> = (0..aprs.len())
            .map(|i| self.strategy(&format!("s{i}")))
            .collect();
        let batch = strategies
            .iter()
            .zip(aprs)
            .map(|(s, pct)| (s.clone() as Arc<dyn StrategyAdapter>, apr(*pct)))
            .collect::<Vec<_>>();
        if !batch.is_empty() {
            splitter
                .admit(&self.governance, batch)
                .expect("bootstrap admission");
        }
        (splitter, strategies)
    }

    pub fn vault_with(&self, aprs: &[u128], fees: FeePolicy) -> (Vault, Vec<Arc<MockStrategy>>) {
        let (splitter, strategies) = self.splitter_with(aprs);
        let vault = Vault::new(splitter, fees, 0).expect("valid vault");
        (vault, strategies)
    }
}
