//! Share balances.

use crate::error::{AllocError, AllocResult};
use crate::types::{AccountId, Amount};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareLedger {
    total_supply: Amount,
    balances: BTreeMap<AccountId, Amount>,
}

impl ShareLedger {
    pub fn from_balances(balances: impl IntoIterator<Item = (AccountId, Amount)>) -> AllocResult<Self> {
        let mut ledger = Self::default();
        for (account, shares) in balances {
            ledger.mint(&account, shares)?;
        }
        Ok(ledger)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, Amount)> + '_ {
        self.balances.iter().map(|(account, shares)| (account, *shares))
    }

    pub fn mint(&mut self, account: &AccountId, shares: Amount) -> AllocResult<()> {
        if shares == 0 {
            return Ok(());
        }
        self.total_supply = self.total_supply.checked_add(shares).ok_or(AllocError::Overflow)?;
        let balance = self.balances.entry(account.clone()).or_insert(0);
        *balance = balance.checked_add(shares).ok_or(AllocError::Overflow)?;
        Ok(())
    }

    pub fn burn(&mut self, account: &AccountId, shares: Amount) -> AllocResult<()> {
        let available = self.balance_of(account);
        if shares > available {
            return Err(AllocError::InsufficientShares {
                requested: shares,
                available,
            });
        }
        if shares == available {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.clone(), available - shares);
        }
        self.total_supply -= shares;
        Ok(())
    }

    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, shares: Amount) -> AllocResult<()> {
        self.burn(from, shares)?;
        self.mint(to, shares)
    }
}
