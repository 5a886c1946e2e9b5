//! # Bet Ledger
//!
//! Claim balances keyed by `(condition, outcome, holder)`. A bet moves value
//! into custody through the [`AssetAdapter`] and mints the same amount of
//! claim balance to the bettor, so each claim's total supply always equals the
//! stake recorded on its outcome until redemption burns it.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    assets::{AssetAdapter, Denomination},
    clock::Clock,
    condition::ConditionStatus,
    engine::Engine,
    error::{overflow, Result},
    events::Event,
    types::{Address, Amount, ClaimId, ConditionId, OutcomeId},
    EngineError,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimLedger {
    balances: HashMap<(ClaimId, Address), Amount>,
    supplies: HashMap<ClaimId, Amount>,
}

impl ClaimLedger {
    pub fn balance_of(&self, claim: &ClaimId, holder: &Address) -> Amount {
        self.balances
            .get(&(*claim, *holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self, claim: &ClaimId) -> Amount {
        self.supplies.get(claim).copied().unwrap_or_default()
    }

    /// Non-zero balances in no particular order.
    pub fn balances(&self) -> impl Iterator<Item = (&ClaimId, &Address, Amount)> {
        self.balances
            .iter()
            .map(|((claim, holder), amount)| (claim, holder, *amount))
    }

    pub(crate) fn mint(&mut self, claim: ClaimId, holder: Address, amount: Amount) -> Result<()> {
        let supply = self
            .total_supply(&claim)
            .checked_add(amount)
            .ok_or_else(overflow(claim))?;
        let balance = self
            .balance_of(&claim, &holder)
            .checked_add(amount)
            .ok_or_else(overflow(claim))?;
        self.supplies.insert(claim, supply);
        self.balances.insert((claim, holder), balance);
        Ok(())
    }

    /// Burns the holder's whole balance and returns it.
    pub(crate) fn burn(&mut self, claim: &ClaimId, holder: &Address) -> Amount {
        let amount = self
            .balances
            .remove(&(*claim, *holder))
            .unwrap_or_default();
        if let Some(supply) = self.supplies.get_mut(claim) {
            *supply -= amount;
            if *supply == 0 {
                self.supplies.remove(claim);
            }
        }
        amount
    }

    /// Reverses a [`ClaimLedger::burn`].
    pub(crate) fn restore(&mut self, claim: ClaimId, holder: Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        *self.supplies.entry(claim).or_default() += amount;
        *self.balances.entry((claim, holder)).or_default() += amount;
    }
}

impl<A: AssetAdapter, C: Clock> Engine<A, C> {
    /// Stakes `amount` of the token on `outcome`.
    pub fn place_bet(
        &mut self,
        caller: &Address,
        condition_id: &ConditionId,
        outcome: OutcomeId,
        amount: Amount,
    ) -> Result<ClaimId> {
        self.stake(caller, condition_id, outcome, amount, Denomination::Token)
    }

    /// Stakes native currency; it is wrapped into the staking asset on deposit.
    pub fn place_bet_native(
        &mut self,
        caller: &Address,
        condition_id: &ConditionId,
        outcome: OutcomeId,
        value: Amount,
    ) -> Result<ClaimId> {
        self.stake(caller, condition_id, outcome, value, Denomination::Native)
    }

    pub fn balance_of(&self, claim: &ClaimId, holder: &Address) -> Amount {
        self.state.ledger.balance_of(claim, holder)
    }

    pub fn total_supply(&self, claim: &ClaimId) -> Amount {
        self.state.ledger.total_supply(claim)
    }

    /// Every non-zero claim balance of `holder`, ordered by claim.
    pub fn claims_of(&self, holder: &Address) -> Vec<(ClaimId, Amount)> {
        let mut claims: Vec<(ClaimId, Amount)> = self
            .state
            .ledger
            .balances()
            .filter(|(_, owner, _)| *owner == holder)
            .map(|(claim, _, amount)| (*claim, amount))
            .collect();
        claims.sort();
        claims
    }

    fn stake(
        &mut self,
        caller: &Address,
        condition_id: &ConditionId,
        outcome: OutcomeId,
        amount: Amount,
        denomination: Denomination,
    ) -> Result<ClaimId> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        let now = self.now();
        let grace = self.state.config.cancel_grace_period;
        let condition = self.state.conditions.get(condition_id)?;
        let index = condition
            .outcome_index(outcome)
            .ok_or(EngineError::WrongOutcome {
                condition_id: *condition_id,
                outcome,
            })?;

        match condition.status {
            ConditionStatus::Created => {}
            ConditionStatus::Resolved { .. } => {
                return Err(EngineError::AlreadyResolved(*condition_id))
            }
            ConditionStatus::Canceled => return Err(EngineError::ConditionCanceled(*condition_id)),
        }
        if now < condition.betting_starts_at {
            return Err(EngineError::BettingNotStarted {
                condition_id: *condition_id,
                starts_at: condition.betting_starts_at,
            });
        }
        if now >= condition.settles_at {
            return Err(EngineError::BettingEnded {
                condition_id: *condition_id,
                settles_at: condition.settles_at,
            });
        }
        if now.saturating_add(grace) >= condition.settles_at && condition.is_one_sided() {
            debug!(%condition_id, totals = ?condition.totals, "late bet on one-sided condition");
            return Err(EngineError::ConditionCanceled(*condition_id));
        }

        let claim = ClaimId::new(*condition_id, outcome);
        let outcome_total = condition.totals[index]
            .checked_add(amount)
            .ok_or_else(overflow(claim))?;
        condition.pool().checked_add(amount).ok_or_else(overflow(claim))?;
        self.state
            .ledger
            .balance_of(&claim, caller)
            .checked_add(amount)
            .ok_or_else(overflow(claim))?;

        self.assets.deposit(caller, amount, denomination)?;

        self.state.ledger.mint(claim, *caller, amount)?;
        self.state.conditions.get_mut(condition_id)?.totals[index] = outcome_total;
        self.emit(Event::NewBet {
            condition_id: *condition_id,
            claim,
            bettor: *caller,
            amount,
        });
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::ErrorKind;

    #[test]
    fn test_place_bet() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let bettor = fx.bettors[0];
        fx.engine.take_events();

        let claim = fx.engine.place_bet(&bettor, &id, OUTCOME_WIN, BET).unwrap();
        assert_eq!(claim, ClaimId::new(id, OUTCOME_WIN));
        assert_eq!(fx.engine.balance_of(&claim, &bettor), BET);
        assert_eq!(fx.engine.total_supply(&claim), BET);
        assert_eq!(fx.engine.condition(&id).unwrap().totals, vec![BET, 0]);
        assert_eq!(fx.token_balance(&bettor), FUNDING - BET);
        assert_eq!(fx.engine.assets().custody(), BET);
        assert_eq!(
            fx.engine.take_events(),
            vec![Event::NewBet {
                condition_id: id,
                claim,
                bettor,
                amount: BET
            }]
        );
    }

    #[test]
    fn test_native_bet_shares_accounting() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let bettor = fx.bettors[0];

        let token_claim = fx.engine.place_bet(&bettor, &id, OUTCOME_WIN, BET).unwrap();
        let native_claim = fx
            .engine
            .place_bet_native(&bettor, &id, OUTCOME_WIN, BET)
            .unwrap();
        assert_eq!(token_claim, native_claim);
        assert_eq!(fx.engine.balance_of(&token_claim, &bettor), 2 * BET);
        assert_eq!(fx.native_balance(&bettor), FUNDING - BET);
    }

    #[test]
    fn test_zero_amount() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let bettor = fx.bettors[0];
        let err = fx.engine.place_bet(&bettor, &id, OUTCOME_WIN, 0).unwrap_err();
        assert!(matches!(err, EngineError::ZeroAmount));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_bet_on_unknown_condition_or_outcome() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let bettor = fx.bettors[0];
        let missing = ConditionId::derive(&bettor, 1);

        assert!(matches!(
            fx.engine.place_bet(&bettor, &missing, OUTCOME_WIN, BET),
            Err(EngineError::ConditionNotFound(_))
        ));
        assert!(matches!(
            fx.engine.place_bet(&bettor, &id, OUTCOME_INCORRECT, BET),
            Err(EngineError::WrongOutcome { outcome: OUTCOME_INCORRECT, .. })
        ));
    }

    #[test]
    fn test_betting_window_bounds() {
        let mut fx = Fixture::new();
        let oracle = fx.oracle;
        let start = T0 + 60;
        let end = T0 + ONE_HOUR;
        let id = fx
            .engine
            .create_condition(&oracle, new_condition(None, start, end))
            .unwrap();
        let (alice, bob) = (fx.bettors[0], fx.bettors[1]);

        fx.set_time(start - 1);
        let err = fx.engine.place_bet(&alice, &id, OUTCOME_WIN, BET).unwrap_err();
        assert!(matches!(err, EngineError::BettingNotStarted { starts_at, .. } if starts_at == start));
        assert_eq!(err.kind(), ErrorKind::Timing);

        fx.set_time(start);
        fx.engine.place_bet(&alice, &id, OUTCOME_WIN, BET).unwrap();
        fx.engine.place_bet(&bob, &id, OUTCOME_LOSE, BET).unwrap();

        fx.set_time(end - 1);
        fx.engine.place_bet(&alice, &id, OUTCOME_LOSE, BET).unwrap();

        fx.set_time(end);
        assert!(matches!(
            fx.engine.place_bet(&alice, &id, OUTCOME_WIN, BET),
            Err(EngineError::BettingEnded { settles_at, .. }) if settles_at == end
        ));
    }

    #[test]
    fn test_late_bet_on_one_sided_condition() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let (alice, bob) = (fx.bettors[0], fx.bettors[1]);
        fx.bet(&alice, &id, OUTCOME_WIN, BET);

        // Outside the grace period the empty side may still be filled later
        fx.set_time(T0 + ONE_HOUR - DEFAULT_GRACE - 1);
        fx.engine.place_bet(&alice, &id, OUTCOME_WIN, BET).unwrap();

        // Inside it, even a bet on the empty side is refused
        fx.set_time(T0 + ONE_HOUR - DEFAULT_GRACE);
        for outcome in [OUTCOME_WIN, OUTCOME_LOSE] {
            let err = fx.engine.place_bet(&bob, &id, outcome, BET).unwrap_err();
            assert!(matches!(err, EngineError::ConditionCanceled(c) if c == id));
        }
    }

    #[test]
    fn test_late_bet_on_two_sided_condition() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        fx.bet_both_sides(&id, BET);
        let carol = fx.bettors[2];

        fx.set_time(T0 + ONE_HOUR - 1);
        fx.engine.place_bet(&carol, &id, OUTCOME_LOSE, BET).unwrap();
    }

    #[test]
    fn test_bet_on_settled_condition() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let oracle = fx.oracle;
        let alice = fx.bettors[0];
        fx.engine.cancel_condition(&oracle, &id).unwrap();

        let err = fx.engine.place_bet(&alice, &id, OUTCOME_WIN, BET).unwrap_err();
        assert!(matches!(err, EngineError::ConditionCanceled(_)));
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_failed_transfer_records_nothing() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let pauper = test_address(200);

        let err = fx.engine.place_bet(&pauper, &id, OUTCOME_WIN, BET).unwrap_err();
        assert!(matches!(err, EngineError::Transfer(_)));
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

        let claim = ClaimId::new(id, OUTCOME_WIN);
        assert_eq!(fx.engine.balance_of(&claim, &pauper), 0);
        assert_eq!(fx.engine.total_supply(&claim), 0);
        assert_eq!(fx.engine.condition(&id).unwrap().totals, vec![0, 0]);
        assert!(fx.engine.take_events().iter().all(|e| !matches!(e, Event::NewBet { .. })));
    }

    #[test]
    fn test_stake_overflow() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let whale = test_address(201);
        fx.engine
            .assets_mut()
            .mint(&whale, Amount::MAX, Denomination::Token);
        fx.bet(&whale, &id, OUTCOME_WIN, Amount::MAX - 1);

        let alice = fx.bettors[0];
        let err = fx.engine.place_bet(&alice, &id, OUTCOME_LOSE, 2).unwrap_err();
        assert!(matches!(err, EngineError::AmountOverflow(_)));
        assert_eq!(fx.token_balance(&alice), FUNDING);
    }

    #[test]
    fn test_supply_matches_totals() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let amounts = [17, 250, 3, 999];
        for (i, amount) in amounts.iter().enumerate() {
            let bettor = fx.bettors[i];
            let outcome = if i % 2 == 0 { OUTCOME_WIN } else { OUTCOME_LOSE };
            fx.bet(&bettor, &id, outcome, *amount);
        }

        let condition = fx.engine.condition(&id).unwrap();
        for outcome in [OUTCOME_WIN, OUTCOME_LOSE] {
            assert_eq!(
                fx.engine.total_supply(&ClaimId::new(id, outcome)),
                condition.total_stake(outcome).unwrap()
            );
        }
        assert_eq!(condition.pool(), amounts.iter().sum::<u64>());
    }

    #[test]
    fn test_claims_of_holder() {
        let mut fx = Fixture::new();
        let id = fx.create_condition();
        let (alice, bob) = (fx.bettors[0], fx.bettors[1]);
        let lose = fx.bet(&alice, &id, OUTCOME_LOSE, 5);
        let win = fx.bet(&alice, &id, OUTCOME_WIN, 7);
        fx.bet(&bob, &id, OUTCOME_WIN, 9);

        assert_eq!(fx.engine.claims_of(&alice), vec![(win, 7), (lose, 5)]);
        assert!(fx.engine.claims_of(&fx.owner).is_empty());
    }

    #[test]
    fn test_ledger_burn() {
        let mut ledger = ClaimLedger::default();
        let claim = ClaimId::new(ConditionId::derive(&test_address(1), 1), 1);
        let (alice, bob) = (test_address(2), test_address(3));
        ledger.mint(claim, alice, 10).unwrap();
        ledger.mint(claim, bob, 5).unwrap();

        assert_eq!(ledger.burn(&claim, &alice), 10);
        assert_eq!(ledger.burn(&claim, &alice), 0);
        assert_eq!(ledger.total_supply(&claim), 5);
        assert_eq!(ledger.balances().count(), 1);
    }
}
