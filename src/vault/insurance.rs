//! Fee routing and the insurance buffer that absorbs realized losses.

use crate::error::{AllocError, AllocResult};
use crate::types::Amount;
use crate::utils::fixed::{bps_of, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound for deposit and withdraw fees.
pub const MAX_FEE_BPS: u32 = 500;

/// Deposit/withdraw fees and the share of them routed to insurance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub deposit_fee_bps: u32,
    pub withdraw_fee_bps: u32,
    /// Portion of every fee credited to insurance; the rest is distributed.
    pub insurance_share_bps: u32,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            deposit_fee_bps: 0,
            withdraw_fee_bps: 0,
            insurance_share_bps: BPS_DENOMINATOR,
        }
    }
}

impl FeePolicy {
    pub fn new(deposit_fee_bps: u32, withdraw_fee_bps: u32, insurance_share_bps: u32) -> AllocResult<Self> {
        let policy = Self {
            deposit_fee_bps,
            withdraw_fee_bps,
            insurance_share_bps,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> AllocResult<()> {
        check_bps("deposit fee", self.deposit_fee_bps, MAX_FEE_BPS)?;
        check_bps("withdraw fee", self.withdraw_fee_bps, MAX_FEE_BPS)?;
        check_bps("insurance share", self.insurance_share_bps, BPS_DENOMINATOR)
    }

    pub fn deposit_fee(&self, amount: Amount) -> AllocResult<Amount> {
        bps_of(amount, self.deposit_fee_bps)
    }

    pub fn withdraw_fee(&self, amount: Amount) -> AllocResult<Amount> {
        bps_of(amount, self.withdraw_fee_bps)
    }

    /// Split a fee into `(to_insurance, distributed)`.
    pub fn split(&self, fee: Amount) -> AllocResult<(Amount, Amount)> {
        let to_insurance = bps_of(fee, self.insurance_share_bps)?;
        Ok((to_insurance, fee - to_insurance))
    }
}

pub(crate) fn check_bps(name: &'static str, value: u32, max: u32) -> AllocResult<()> {
    if value > max {
        return Err(AllocError::InvalidParameter { name, value, max });
    }
    Ok(())
}

/// Reserve held by the vault outside of `total_assets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceBuffer {
    balance: Amount,
    /// Lifetime inflow from fees and direct funding.
    total_received: Amount,
    /// Lifetime outflow into covered losses.
    total_covered: Amount,
    /// Fee portion paid out instead of kept as insurance.
    distributed_fees: Amount,
}

impl InsuranceBuffer {
    pub(crate) fn from_parts(
        balance: Amount,
        total_received: Amount,
        total_covered: Amount,
        distributed_fees: Amount,
    ) -> Self {
        Self {
            balance,
            total_received,
            total_covered,
            distributed_fees,
        }
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_received(&self) -> Amount {
        self.total_received
    }

    pub fn total_covered(&self) -> Amount {
        self.total_covered
    }

    pub fn distributed_fees(&self) -> Amount {
        self.distributed_fees
    }

    pub(crate) fn credit(&mut self, amount: Amount) -> AllocResult<()> {
        self.balance = self.balance.checked_add(amount).ok_or(AllocError::Overflow)?;
        self.total_received = self.total_received.saturating_add(amount);
        Ok(())
    }

    pub(crate) fn distribute(&mut self, amount: Amount) {
        self.distributed_fees = self.distributed_fees.saturating_add(amount);
    }

    /// Pay out up to `loss`; returns what was actually covered.
    pub(crate) fn cover(&mut self, loss: Amount) -> Amount {
        let covered = loss.min(self.balance);
        self.balance -= covered;
        self.total_covered = self.total_covered.saturating_add(covered);
        if covered > 0 {
            debug!(loss, covered, remaining = self.balance, "Insurance covered loss");
        }
        covered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_limits() {
        assert!(FeePolicy::new(500, 500, 10_000).is_ok());
        let err = FeePolicy::new(501, 0, 10_000).unwrap_err();
        assert!(matches!(
            err,
            AllocError::InvalidParameter {
                name: "deposit fee",
                value: 501,
                max: 500
            }
        ));
        assert!(FeePolicy::new(0, 0, 10_001).is_err());
    }

    #[test]
    fn test_fee_split() {
        let policy = FeePolicy::new(100, 100, 7_000).unwrap();
        let fee = policy.deposit_fee(1_000_000).unwrap();
        assert_eq!(fee, 10_000);
        assert_eq!(policy.split(fee).unwrap(), (7_000, 3_000));
        assert_eq!(FeePolicy::default().split(33).unwrap(), (33, 0));
    }

    #[test]
    fn test_cover_is_best_effort() {
        let mut insurance = InsuranceBuffer::default();
        insurance.credit(100).unwrap();
        assert_eq!(insurance.cover(30), 30);
        assert_eq!(insurance.cover(500), 70);
        assert_eq!(insurance.cover(1), 0);
        assert_eq!(insurance.balance(), 0);
        assert_eq!(insurance.total_received(), 100);
        assert_eq!(insurance.total_covered(), 100);
    }
}
