//! Point-in-time copy of the vault state for persistence.

use super::{FeePolicy, InsuranceBuffer, ShareLedger, Vault};
use crate::clock::Clock;
use crate::error::AllocResult;
use crate::splitter::{Splitter, SplitterSnapshot};
use crate::strategy::StrategyAdapter;
use crate::types::{AccountId, Amount, AssetId, ControllerId, StrategyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub asset: AssetId,
    pub controller: ControllerId,
    pub fees: FeePolicy,
    pub buffer_bps: u32,
    pub idle: Amount,
    pub insurance: InsuranceBuffer,
    pub balances: Vec<(AccountId, Amount)>,
    pub splitter: SplitterSnapshot,
    pub saved_at: DateTime<Utc>,
}

impl Vault {
    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            asset: self.asset().clone(),
            controller: self.controller().clone(),
            fees: self.fees,
            buffer_bps: self.buffer_bps,
            idle: self.idle,
            insurance: self.insurance.clone(),
            balances: self
                .ledger
                .holders()
                .map(|(account, shares)| (account.clone(), shares))
                .collect(),
            splitter: self.splitter.snapshot(),
            saved_at: self.splitter.now(),
        }
    }

    /// Rebuild a vault from a snapshot.
    ///
    /// Every persisted strategy needs its adapter in `adapters`; a missing one
    /// fails with `NotFound`.
    pub fn restore(
        snapshot: VaultSnapshot,
        adapters: &HashMap<StrategyId, Arc<dyn StrategyAdapter>>,
        clock: Arc<dyn Clock>,
    ) -> AllocResult<Self> {
        snapshot.fees.validate()?;
        let splitter = Splitter::restore(
            snapshot.splitter,
            snapshot.asset,
            snapshot.controller,
            adapters,
            clock,
        )?;
        let mut vault = Vault::new(splitter, snapshot.fees, snapshot.buffer_bps)?;
        vault.idle = snapshot.idle;
        vault.insurance = snapshot.insurance;
        vault.ledger = ShareLedger::from_balances(snapshot.balances)?;
        info!(
            strategies = vault.splitter.len(),
            supply = vault.ledger.total_supply(),
            saved_at = %snapshot.saved_at,
            "Vault restored"
        );
        Ok(vault)
    }
}
