//! # Payout Engine
//!
//! Redemption turns claim balances into value once a condition is settled:
//!
//! - **Resolved, winning outcome**: a share of the whole pool proportional to
//!   the holder's stake on the winning outcome, less the condition's fee rate.
//! - **Resolved, losing outcome**: nothing; the balance is burned.
//! - **Canceled or expired**: the stake back at face value, no fee.
//!
//! All arithmetic is integer fixed-point with floor division at every step:
//!
//! ```text
//! gross = stake * pool / winning_total
//! net   = gross * (FEE_MULTIPLIER - fee_rate) / FEE_MULTIPLIER
//! fee   = gross - net
//! ```
//!
//! The flooring of `gross` leaves a little of the pool unpaid. When the last
//! winning claim of a condition is burned that dust is swept into the fee
//! ledger, so every resolved pool is distributed exactly.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::{
    assets::{AssetAdapter, Denomination},
    clock::Clock,
    condition::{Condition, Settlement},
    engine::Engine,
    error::{overflow, Result},
    events::Event,
    types::{Address, Amount, ClaimId, ConditionId},
    EngineError, FEE_MULTIPLIER,
};

/// What redeeming one claim balance yields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Redemption {
    /// Share of the pool; `fee` accrues to the protocol.
    Win { gross: Amount, net: Amount, fee: Amount },
    /// Losing outcome, nothing is paid.
    Loss,
    /// Stake returned in full.
    Refund(Amount),
}

impl Redemption {
    /// Amount transferred to the holder.
    pub fn amount(&self) -> Amount {
        match self {
            Redemption::Win { net, .. } => *net,
            Redemption::Loss => 0,
            Redemption::Refund(amount) => *amount,
        }
    }
}

/// Gross and net winnings of `stake` on the winning outcome.
pub fn winning_payout(
    stake: Amount,
    pool: Amount,
    winning_total: Amount,
    fee_rate: u64,
) -> (Amount, Amount) {
    if winning_total == 0 {
        return (0, 0);
    }
    let multiplier = FEE_MULTIPLIER as u128;
    let fee_rate = (fee_rate as u128).min(multiplier);
    // stake <= winning_total, so gross <= pool
    let gross = stake as u128 * pool as u128 / winning_total as u128;
    let net = gross * (multiplier - fee_rate) / multiplier;
    (gross as Amount, net as Amount)
}

/// Redemption of `balance` on `claim` under the condition's current settlement.
fn redemption_for(
    condition: &Condition,
    claim: &ClaimId,
    balance: Amount,
    now: u64,
    resolution_timeout: u64,
) -> Result<Redemption> {
    match condition.settlement(now, resolution_timeout) {
        Settlement::Active => Err(EngineError::ConditionStillActive(condition.id)),
        Settlement::Refund => Ok(Redemption::Refund(balance)),
        Settlement::Resolved(winner) if winner != claim.outcome => Ok(Redemption::Loss),
        Settlement::Resolved(winner) => {
            let winning_total = condition.total_stake(winner).unwrap_or_default();
            let (gross, net) =
                winning_payout(balance, condition.pool(), winning_total, condition.fee_rate);
            Ok(Redemption::Win {
                gross,
                net,
                fee: gross - net,
            })
        }
    }
}

impl<A: AssetAdapter, C: Clock> Engine<A, C> {
    /// Redeems every listed claim of the caller and pays the sum in the token.
    ///
    /// The batch is all-or-nothing: one invalid item, or a refused transfer,
    /// leaves every balance and ledger untouched.
    pub fn redeem(&mut self, caller: &Address, claims: &[ClaimId]) -> Result<Amount> {
        self.redeem_batch(caller, claims, Denomination::Token)
    }

    /// Like [`Engine::redeem`], but pays out in native currency.
    pub fn redeem_native(&mut self, caller: &Address, claims: &[ClaimId]) -> Result<Amount> {
        self.redeem_batch(caller, claims, Denomination::Native)
    }

    /// What redeeming `holder`'s balance of `claim` would yield now.
    pub fn preview_payout(&self, claim: &ClaimId, holder: &Address) -> Result<Redemption> {
        let condition = self.state.conditions.get(&claim.condition_id)?;
        let balance = self.state.ledger.balance_of(claim, holder);
        if balance == 0 {
            return Err(EngineError::ZeroBalance(*claim));
        }
        redemption_for(
            condition,
            claim,
            balance,
            self.now(),
            self.state.config.resolution_timeout,
        )
    }

    fn redeem_batch(
        &mut self,
        caller: &Address,
        claims: &[ClaimId],
        denomination: Denomination,
    ) -> Result<Amount> {
        if claims.is_empty() {
            return Err(EngineError::EmptyBatch);
        }

        // Validate the whole batch before touching anything
        let now = self.now();
        let resolution_timeout = self.state.config.resolution_timeout;
        let mut seen = HashSet::with_capacity(claims.len());
        let mut plan = Vec::with_capacity(claims.len());
        let mut total: Amount = 0;
        for claim in claims {
            let condition = self.state.conditions.get(&claim.condition_id)?;
            let balance = self.state.ledger.balance_of(claim, caller);
            if balance == 0 || !seen.insert(*claim) {
                return Err(EngineError::ZeroBalance(*claim));
            }
            let redemption = redemption_for(condition, claim, balance, now, resolution_timeout)?;
            total = total
                .checked_add(redemption.amount())
                .ok_or_else(overflow(*claim))?;
            plan.push((*claim, redemption));
        }

        let saved_fees = self.state.fees.clone();
        let mut saved_conditions: HashMap<ConditionId, (Amount, bool)> = HashMap::new();
        let mut burned = Vec::with_capacity(plan.len());
        let mut events = Vec::with_capacity(plan.len());

        for (claim, redemption) in &plan {
            let stake = self.state.ledger.burn(claim, caller);
            burned.push((*claim, stake));
            let remaining_supply = self.state.ledger.total_supply(claim);
            let condition = self.state.conditions.get_mut(&claim.condition_id)?;
            saved_conditions
                .entry(condition.id)
                .or_insert((condition.paid_out, condition.has_redemptions));
            condition.has_redemptions = true;

            if let Redemption::Win { gross, net, fee } = *redemption {
                debug!(%claim, stake, gross, net, fee, "winning payout");
                condition.paid_out += gross;
                self.state.fees.accrue(fee);
                if remaining_supply == 0 {
                    let dust = condition.pool().saturating_sub(condition.paid_out);
                    condition.paid_out += dust;
                    if dust > 0 {
                        debug!(condition_id = %condition.id, dust, "rounding dust swept to fees");
                        self.state.fees.accrue(dust);
                    }
                }
            }
            events.push(Event::Redeemed {
                claim: *claim,
                holder: *caller,
                amount: redemption.amount(),
            });
        }

        if total > 0 {
            if let Err(err) = self.assets.withdraw(caller, total, denomination) {
                warn!(holder = %caller, amount = total, error = %err, "payout transfer failed, rolling back");
                self.state.fees = saved_fees;
                for (condition_id, (paid_out, has_redemptions)) in saved_conditions {
                    let condition = self.state.conditions.get_mut(&condition_id)?;
                    condition.paid_out = paid_out;
                    condition.has_redemptions = has_redemptions;
                }
                for (claim, amount) in burned {
                    self.state.ledger.restore(claim, *caller, amount);
                }
                return Err(err.into());
            }
        }

        for event in events {
            self.emit(event);
        }
        Ok(total)
    }
}
