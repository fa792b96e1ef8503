//! Thread-safe handle to a vault.
//!
//! Mutations hold the write guard for their whole duration, adapter calls
//! included, so operations never interleave. Queries share the read guard.

use super::{DepositReceipt, RedeemReceipt, Vault, VaultSnapshot};
use crate::error::AllocResult;
use crate::types::{AccountId, Amount};
use crate::utils::fixed::SharePrice;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
pub struct SharedVault {
    inner: Arc<RwLock<Vault>>,
}

impl SharedVault {
    pub fn new(vault: Vault) -> Self {
        Self {
            inner: Arc::new(RwLock::new(vault)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Vault> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Vault> {
        self.inner.write().await
    }

    pub async fn deposit(&self, amount: Amount, receiver: &AccountId) -> AllocResult<DepositReceipt> {
        self.inner.write().await.deposit(amount, receiver).await
    }

    pub async fn redeem(&self, shares: Amount, owner: &AccountId, max_slippage_bps: u32) -> AllocResult<RedeemReceipt> {
        self.inner
            .write()
            .await
            .redeem(shares, owner, max_slippage_bps)
            .await
    }

    pub async fn total_assets(&self) -> Amount {
        self.inner.read().await.total_assets().await
    }

    pub async fn share_price(&self) -> AllocResult<SharePrice> {
        self.inner.read().await.share_price().await
    }

    pub async fn snapshot(&self) -> VaultSnapshot {
        self.inner.read().await.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use crate::strategy::StrategyAdapter;
    use crate::vault::FeePolicy;

    #[tokio::test]
    async fn test_concurrent_deposits_are_serialized() {
        let fx = Fixture::new();
        let (vault, s) = fx.vault_with(&[100], FeePolicy::default());
        let shared = SharedVault::new(vault);
        shared.deposit(10_000, &AccountId::new("seed")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                shared
                    .deposit(1_000, &AccountId::new(format!("user{i}")))
                    .await
            }));
        }
        for handle in handles {
            let receipt = handle.await.unwrap().unwrap();
            assert_eq!(receipt.shares, 1_000);
        }

        assert_eq!(shared.total_assets().await, 18_000);
        assert_eq!(s[0].invested(), 18_000);
        assert_eq!(shared.share_price().await.unwrap(), SharePrice::ONE);
        assert_eq!(shared.read().await.total_supply(), 18_000);
    }

    #[tokio::test]
    async fn test_write_guard_exposes_admin_calls() {
        let fx = Fixture::new();
        let (vault, s) = fx.vault_with(&[100], FeePolicy::default());
        let shared = SharedVault::new(vault);
        shared
            .write()
            .await
            .splitter_mut()
            .pause(&fx.operator, &s[0].identity())
            .unwrap();
        assert_eq!(
            shared.read().await.splitter().is_paused(&s[0].identity()),
            Some(true)
        );
        assert_eq!(shared.snapshot().await.splitter.strategies.len(), 1);
    }
}
