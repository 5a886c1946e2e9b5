//! # Condition Registry
//!
//! A condition is one wagering market: a set of mutually exclusive outcomes, a
//! betting window `[betting_starts_at, settles_at)` and the oracle that settles
//! it. Lifecycle:
//!
//! ```text
//! Created ──resolve──▶ Resolved(winning outcome)
//!    │
//!    └────cancel────▶ Canceled
//! ```
//!
//! A `Created` condition that reaches its settlement time with an unstaked
//! outcome, or that stays unresolved past `settles_at + resolution_timeout`,
//! is implicitly canceled: it can no longer be resolved or shifted and every
//! claim redeems at face value.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    assets::AssetAdapter,
    clock::Clock,
    config::EngineConfig,
    engine::Engine,
    error::Result,
    events::Event,
    types::{Address, Amount, ConditionId, MetadataHash, OutcomeId, Timestamp},
    EngineError,
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConditionStatus {
    Created,
    Resolved { winning_outcome: OutcomeId },
    Canceled,
}

/// How claims against a condition redeem at a given moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Not settled yet; redemption is refused.
    Active,
    /// Pool goes to holders of the winning outcome.
    Resolved(OutcomeId),
    /// Every claim is refunded at face value (explicit or implicit cancellation).
    Refund,
}

/// A wagering market.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub id: ConditionId,

    /// Oracle that created the condition and alone may settle it
    pub oracle: Address,

    /// Oracle-local identifier the id was derived from
    pub oracle_condition_id: u64,

    /// Optional grouping key (e.g. the game a condition belongs to)
    pub scope_id: Option<u64>,

    /// Outcome identifiers, distinct, at least two
    pub outcomes: Vec<OutcomeId>,

    /// Stake accumulated per outcome, parallel to `outcomes`
    pub totals: Vec<Amount>,

    pub betting_starts_at: Timestamp,

    /// End of the betting window and earliest resolution time
    pub settles_at: Timestamp,

    pub metadata: MetadataHash,

    /// Fee rate captured at creation, in parts per [`crate::FEE_MULTIPLIER`]
    pub fee_rate: u64,

    pub status: ConditionStatus,

    /// Gross winnings paid out so far, rounding dust included once swept
    pub paid_out: Amount,

    /// Set by the first redemption; freezes the schedule
    pub has_redemptions: bool,
}

impl Condition {
    pub fn outcome_index(&self, outcome: OutcomeId) -> Option<usize> {
        self.outcomes.iter().position(|o| *o == outcome)
    }

    pub fn has_outcome(&self, outcome: OutcomeId) -> bool {
        self.outcome_index(outcome).is_some()
    }

    pub fn total_stake(&self, outcome: OutcomeId) -> Option<Amount> {
        self.outcome_index(outcome).map(|i| self.totals[i])
    }

    /// Sum of all stakes. Bets that would overflow it are refused, so this never wraps.
    pub fn pool(&self) -> Amount {
        self.totals.iter().sum()
    }

    /// True while some outcome has no stake at all.
    pub fn is_one_sided(&self) -> bool {
        self.totals.iter().any(|total| *total == 0)
    }

    pub fn winning_outcome(&self) -> Option<OutcomeId> {
        match self.status {
            ConditionStatus::Resolved { winning_outcome } => Some(winning_outcome),
            _ => None,
        }
    }

    /// Unresolved and past the point where it could still be resolved.
    pub fn is_implicitly_canceled(&self, now: Timestamp, resolution_timeout: u64) -> bool {
        if self.status != ConditionStatus::Created || now < self.settles_at {
            return false;
        }
        self.is_one_sided()
            || self.has_redemptions
            || now >= self.settles_at.saturating_add(resolution_timeout)
    }

    pub fn settlement(&self, now: Timestamp, resolution_timeout: u64) -> Settlement {
        match self.status {
            ConditionStatus::Resolved { winning_outcome } => Settlement::Resolved(winning_outcome),
            ConditionStatus::Canceled => Settlement::Refund,
            ConditionStatus::Created if self.is_implicitly_canceled(now, resolution_timeout) => {
                Settlement::Refund
            }
            ConditionStatus::Created => Settlement::Active,
        }
    }

    /// Pool-to-stake ratio for an outcome, for display. `None` for unknown or unstaked outcomes.
    pub fn odds(&self, outcome: OutcomeId) -> Option<f64> {
        let total = self.total_stake(outcome)?;
        if total == 0 {
            return None;
        }
        Some(self.pool() as f64 / total as f64)
    }

    /// Human-readable status summary
    pub fn describe(&self, now: Timestamp, resolution_timeout: u64) -> String {
        match self.status {
            ConditionStatus::Resolved { winning_outcome } => {
                format!("Resolved - outcome {winning_outcome} won")
            }
            ConditionStatus::Canceled => "Canceled - refunds open".to_string(),
            ConditionStatus::Created if self.is_implicitly_canceled(now, resolution_timeout) => {
                "Expired - refunds open".to_string()
            }
            ConditionStatus::Created if now >= self.settles_at => {
                "Awaiting oracle resolution".to_string()
            }
            ConditionStatus::Created if now < self.betting_starts_at => {
                "Scheduled - betting not open yet".to_string()
            }
            ConditionStatus::Created => "Active - accepting bets".to_string(),
        }
    }
}

/// Parameters of a new condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCondition {
    /// Oracle-local id; the oracle's next unused id when `None`
    pub oracle_condition_id: Option<u64>,
    pub scope_id: Option<u64>,
    pub outcomes: Vec<OutcomeId>,
    /// Opening of the betting window; creation time when `None`
    pub betting_starts_at: Option<Timestamp>,
    pub settles_at: Timestamp,
    pub metadata: MetadataHash,
}

/// Condition table plus the per-oracle sequence for auto-assigned local ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionRegistry {
    conditions: HashMap<ConditionId, Condition>,
    next_local_ids: HashMap<Address, u64>,
}

impl ConditionRegistry {
    pub fn get(&self, id: &ConditionId) -> Result<&Condition> {
        self.conditions
            .get(id)
            .ok_or(EngineError::ConditionNotFound(*id))
    }

    pub(crate) fn get_mut(&mut self, id: &ConditionId) -> Result<&mut Condition> {
        self.conditions
            .get_mut(id)
            .ok_or(EngineError::ConditionNotFound(*id))
    }

    pub fn contains(&self, id: &ConditionId) -> bool {
        self.conditions.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.values()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Next local id the engine would assign to `oracle`.
    pub fn next_local_id(&self, oracle: &Address) -> u64 {
        self.next_local_ids.get(oracle).copied().unwrap_or(1)
    }

    pub(crate) fn next_local_ids(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.next_local_ids.iter()
    }

    /// Inserts a condition and keeps the oracle's sequence ahead of every id it used.
    pub(crate) fn insert(&mut self, condition: Condition) {
        let next = self.next_local_ids.entry(condition.oracle).or_insert(1);
        if condition.oracle_condition_id >= *next {
            *next = condition.oracle_condition_id.saturating_add(1);
        }
        self.conditions.insert(condition.id, condition);
    }

    pub(crate) fn set_next_local_id(&mut self, oracle: Address, next: u64) {
        self.next_local_ids.insert(oracle, next);
    }
}

/// Checks a betting window against the lead-time rule.
///
/// The window must open before the cancel grace period, otherwise the first
/// bet on an empty condition could never be placed.
fn validate_window(
    config: &EngineConfig,
    now: Timestamp,
    betting_starts_at: Timestamp,
    settles_at: Timestamp,
) -> Result<()> {
    let earliest = now.saturating_add(config.min_lead_time);
    if settles_at < earliest {
        return Err(EngineError::LeadTimeTooShort {
            settles_at,
            earliest,
        });
    }
    if betting_starts_at.saturating_add(config.cancel_grace_period) >= settles_at {
        return Err(EngineError::IncorrectBettingPeriod {
            starts_at: betting_starts_at,
            settles_at,
        });
    }
    Ok(())
}

fn validate_outcomes(outcomes: &[OutcomeId]) -> Result<()> {
    if outcomes.len() < 2 {
        return Err(EngineError::TooFewOutcomes(outcomes.len()));
    }
    let mut seen = HashSet::with_capacity(outcomes.len());
    for outcome in outcomes {
        if !seen.insert(*outcome) {
            return Err(EngineError::DuplicateOutcome(*outcome));
        }
    }
    Ok(())
}

impl<A: AssetAdapter, C: Clock> Engine<A, C> {
    /// Opens a new condition owned by the calling oracle.
    pub fn create_condition(&mut self, caller: &Address, params: NewCondition) -> Result<ConditionId> {
        self.state.oracles.require(caller)?;
        validate_outcomes(&params.outcomes)?;

        let now = self.now();
        let betting_starts_at = params.betting_starts_at.unwrap_or(now);
        validate_window(&self.state.config, now, betting_starts_at, params.settles_at)?;

        let oracle_condition_id = params
            .oracle_condition_id
            .unwrap_or_else(|| self.state.conditions.next_local_id(caller));
        let id = ConditionId::derive(caller, oracle_condition_id);
        if self.state.conditions.contains(&id) {
            return Err(EngineError::DuplicateCondition { existing: id });
        }

        let condition = Condition {
            id,
            oracle: *caller,
            oracle_condition_id,
            scope_id: params.scope_id,
            totals: vec![0; params.outcomes.len()],
            outcomes: params.outcomes,
            betting_starts_at,
            settles_at: params.settles_at,
            metadata: params.metadata,
            fee_rate: self.state.config.fee_rate,
            status: ConditionStatus::Created,
            paid_out: 0,
            has_redemptions: false,
        };
        let event = Event::ConditionCreated {
            condition_id: id,
            oracle: condition.oracle,
            oracle_condition_id,
            scope_id: condition.scope_id,
            outcomes: condition.outcomes.clone(),
            betting_starts_at,
            settles_at: condition.settles_at,
        };
        self.state.conditions.insert(condition);
        self.emit(event);
        Ok(id)
    }

    /// Fixes the winning outcome.
    ///
    /// Rejected with [`EngineError::ConditionCanceled`] once the condition is
    /// implicitly canceled: an outcome has no stake, refunds were already
    /// paid, or the resolution timeout elapsed. Such a condition stays
    /// `Created` and redeems as a refund.
    pub fn resolve_condition(
        &mut self,
        caller: &Address,
        condition_id: &ConditionId,
        winning_outcome: OutcomeId,
    ) -> Result<()> {
        let now = self.now();
        let resolution_timeout = self.state.config.resolution_timeout;
        let condition = self.settleable_condition(caller, condition_id)?;

        if now < condition.settles_at {
            return Err(EngineError::SettlementNotReached {
                condition_id: *condition_id,
                settles_at: condition.settles_at,
            });
        }
        if condition.is_implicitly_canceled(now, resolution_timeout) {
            debug!(%condition_id, totals = ?condition.totals, "implicitly canceled condition cannot resolve");
            return Err(EngineError::ConditionCanceled(*condition_id));
        }
        if !condition.has_outcome(winning_outcome) {
            return Err(EngineError::WrongOutcome {
                condition_id: *condition_id,
                outcome: winning_outcome,
            });
        }

        self.state.conditions.get_mut(condition_id)?.status =
            ConditionStatus::Resolved { winning_outcome };
        self.emit(Event::ConditionResolved {
            condition_id: *condition_id,
            winning_outcome,
        });
        Ok(())
    }

    /// Cancels a condition; every stake becomes refundable at face value.
    pub fn cancel_condition(&mut self, caller: &Address, condition_id: &ConditionId) -> Result<()> {
        self.settleable_condition(caller, condition_id)?;

        self.state.conditions.get_mut(condition_id)?.status = ConditionStatus::Canceled;
        self.emit(Event::ConditionCanceled {
            condition_id: *condition_id,
        });
        Ok(())
    }

    /// Moves the betting window. Refused once any claim has been redeemed or
    /// the condition is implicitly canceled.
    pub fn shift_condition(
        &mut self,
        caller: &Address,
        condition_id: &ConditionId,
        betting_starts_at: Timestamp,
        settles_at: Timestamp,
    ) -> Result<()> {
        let now = self.now();
        let resolution_timeout = self.state.config.resolution_timeout;
        let condition = self.settleable_condition(caller, condition_id)?;
        if condition.has_redemptions {
            return Err(EngineError::ScheduleFrozen(*condition_id));
        }
        if condition.is_implicitly_canceled(now, resolution_timeout) {
            return Err(EngineError::ConditionCanceled(*condition_id));
        }
        validate_window(&self.state.config, now, betting_starts_at, settles_at)?;

        let condition = self.state.conditions.get_mut(condition_id)?;
        condition.betting_starts_at = betting_starts_at;
        condition.settles_at = settles_at;
        self.emit(Event::ConditionRescheduled {
            condition_id: *condition_id,
            betting_starts_at,
            settles_at,
        });
        Ok(())
    }

    pub fn condition(&self, condition_id: &ConditionId) -> Result<&Condition> {
        self.state.conditions.get(condition_id)
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.state.conditions.iter()
    }

    /// Looks up a condition the caller may still resolve, cancel or shift.
    fn settleable_condition(&self, caller: &Address, condition_id: &ConditionId) -> Result<&Condition> {
        let condition = self.state.conditions.get(condition_id)?;
        if condition.oracle != *caller {
            return Err(EngineError::NotConditionOracle {
                condition_id: *condition_id,
                caller: *caller,
            });
        }
        self.state.oracles.require(caller)?;
        match condition.status {
            ConditionStatus::Created => Ok(condition),
            ConditionStatus::Resolved { .. } => Err(EngineError::AlreadyResolved(*condition_id)),
            ConditionStatus::Canceled => Err(EngineError::AlreadyCanceled(*condition_id)),
        }
    }
}
