//! Value movement between participants and the engine's custody.
//!
//! The engine never moves value itself. It calls an [`AssetAdapter`] after all
//! ledger checks pass and rolls its own state back if the adapter refuses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, Amount};

/// Which form of value a transfer uses.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denomination {
    /// The staking asset itself.
    Token,
    /// Native currency, wrapped into the staking asset on the way in and
    /// unwrapped on the way out.
    Native,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("insufficient funds: {holder} has {available}, needs {required}")]
    InsufficientFunds {
        holder: String,
        available: Amount,
        required: Amount,
    },

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

pub trait AssetAdapter {
    /// Moves `amount` from `from` into engine custody.
    fn deposit(&mut self, from: &Address, amount: Amount, denomination: Denomination)
        -> Result<(), AssetError>;

    /// Moves `amount` out of engine custody to `to`.
    fn withdraw(&mut self, to: &Address, amount: Amount, denomination: Denomination)
        -> Result<(), AssetError>;
}

/// Complete in-process asset book: per-holder token and native balances plus
/// the engine's custody balance.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryAssets {
    token: HashMap<Address, Amount>,
    native: HashMap<Address, Amount>,
    custody: Amount,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `holder` out of thin air. Used to seed balances.
    pub fn mint(&mut self, holder: &Address, amount: Amount, denomination: Denomination) {
        let balance = self.book_mut(denomination).entry(*holder).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, holder: &Address, denomination: Denomination) -> Amount {
        self.book(denomination).get(holder).copied().unwrap_or_default()
    }

    pub fn custody(&self) -> Amount {
        self.custody
    }

    fn book(&self, denomination: Denomination) -> &HashMap<Address, Amount> {
        match denomination {
            Denomination::Token => &self.token,
            Denomination::Native => &self.native,
        }
    }

    fn book_mut(&mut self, denomination: Denomination) -> &mut HashMap<Address, Amount> {
        match denomination {
            Denomination::Token => &mut self.token,
            Denomination::Native => &mut self.native,
        }
    }
}

impl AssetAdapter for InMemoryAssets {
    fn deposit(
        &mut self,
        from: &Address,
        amount: Amount,
        denomination: Denomination,
    ) -> Result<(), AssetError> {
        let available = self.balance(from, denomination);
        if available < amount {
            return Err(AssetError::InsufficientFunds {
                holder: from.to_string(),
                available,
                required: amount,
            });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or_else(|| AssetError::Rejected("custody overflow".to_string()))?;
        self.book_mut(denomination).insert(*from, available - amount);
        self.custody = custody;
        Ok(())
    }

    fn withdraw(
        &mut self,
        to: &Address,
        amount: Amount,
        denomination: Denomination,
    ) -> Result<(), AssetError> {
        if self.custody < amount {
            return Err(AssetError::InsufficientFunds {
                holder: "custody".to_string(),
                available: self.custody,
                required: amount,
            });
        }
        self.custody -= amount;
        self.mint(to, amount, denomination);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_address;

    #[test]
    fn test_deposit_and_withdraw() {
        let alice = test_address(1);
        let mut assets = InMemoryAssets::new();
        assets.mint(&alice, 1_000, Denomination::Token);

        assets.deposit(&alice, 400, Denomination::Token).unwrap();
        assert_eq!(assets.balance(&alice, Denomination::Token), 600);
        assert_eq!(assets.custody(), 400);

        assets.withdraw(&alice, 100, Denomination::Token).unwrap();
        assert_eq!(assets.balance(&alice, Denomination::Token), 700);
        assert_eq!(assets.custody(), 300);
    }

    #[test]
    fn test_native_is_wrapped_into_shared_custody() {
        let alice = test_address(1);
        let mut assets = InMemoryAssets::new();
        assets.mint(&alice, 50, Denomination::Native);

        assets.deposit(&alice, 50, Denomination::Native).unwrap();
        assets.withdraw(&alice, 50, Denomination::Token).unwrap();
        assert_eq!(assets.balance(&alice, Denomination::Native), 0);
        assert_eq!(assets.balance(&alice, Denomination::Token), 50);
    }

    #[test]
    fn test_insufficient_funds() {
        let alice = test_address(1);
        let mut assets = InMemoryAssets::new();
        assets.mint(&alice, 10, Denomination::Token);

        let err = assets.deposit(&alice, 11, Denomination::Token).unwrap_err();
        assert!(matches!(
            err,
            AssetError::InsufficientFunds { available: 10, required: 11, .. }
        ));
        assert_eq!(assets.balance(&alice, Denomination::Token), 10);

        assert!(assets.withdraw(&alice, 1, Denomination::Token).is_err());
    }
}
