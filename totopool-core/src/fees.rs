//! Protocol fee accounting.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    assets::{AssetAdapter, Denomination},
    clock::Clock,
    engine::Engine,
    error::Result,
    events::Event,
    types::{Address, Amount},
};

/// Fees skimmed from winning payouts, plus rounding dust.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FeeLedger {
    /// Everything ever accrued, claimed or not
    pub total_accrued: Amount,
    /// Accrued and not yet claimed by the owner
    pub claimable: Amount,
}

impl FeeLedger {
    pub(crate) fn accrue(&mut self, amount: Amount) {
        self.total_accrued = self.total_accrued.saturating_add(amount);
        self.claimable = self.claimable.saturating_add(amount);
    }
}

impl<A: AssetAdapter, C: Clock> Engine<A, C> {
    /// Pays the whole claimable fee balance to the owner. Returns the amount paid.
    pub fn claim_protocol_fee(&mut self, caller: &Address) -> Result<Amount> {
        self.require_owner(caller)?;
        let amount = self.state.fees.claimable;
        if amount == 0 {
            return Ok(0);
        }

        self.state.fees.claimable = 0;
        if let Err(err) = self.assets.withdraw(caller, amount, Denomination::Token) {
            warn!(owner = %caller, amount, error = %err, "fee transfer failed, rolling back");
            self.state.fees.claimable = amount;
            return Err(err.into());
        }
        self.emit(Event::ProtocolFeeClaimed {
            owner: *caller,
            amount,
        });
        Ok(amount)
    }

    pub fn fee_ledger(&self) -> &FeeLedger {
        &self.state.fees
    }
}
