//! # Versioned Persistence
//!
//! [`Snapshot`] is the one on-disk layout of an engine's state. Every document
//! carries a `schema_version`; older versions are migrated on load and
//! unknown ones are refused.
//!
//! | version | change |
//! |---------|--------|
//! | 1 | initial layout, fee rate read from the engine config |
//! | 2 | fee rate captured on every condition |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    assets::AssetAdapter,
    clock::Clock,
    condition::Condition,
    config::{EngineConfig, DEFAULT_FEE_RATE},
    engine::{Engine, EngineState},
    error::Result,
    fees::FeeLedger,
    ledger::ClaimLedger,
    types::{Address, Amount, ClaimId},
    EngineError,
};

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BalanceRecord {
    pub claim: ClaimId,
    pub holder: Address,
    pub amount: Amount,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OracleSequence {
    pub oracle: Address,
    pub next_local_id: u64,
}

/// Flat, deterministic record of an [`EngineState`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub schema_version: u32,
    pub owner: Address,
    pub config: EngineConfig,
    pub oracles: Vec<Address>,
    pub conditions: Vec<Condition>,
    pub oracle_sequences: Vec<OracleSequence>,
    pub balances: Vec<BalanceRecord>,
    pub fees: FeeLedger,
}

impl Snapshot {
    /// Records `state`, sorted so equal states produce equal documents.
    pub fn capture(state: &EngineState) -> Self {
        let mut conditions: Vec<Condition> = state.conditions.iter().cloned().collect();
        conditions.sort_by_key(|c| c.id);

        let mut oracle_sequences: Vec<OracleSequence> = state
            .conditions
            .next_local_ids()
            .map(|(oracle, next)| OracleSequence {
                oracle: *oracle,
                next_local_id: *next,
            })
            .collect();
        oracle_sequences.sort_by_key(|s| s.oracle);

        let mut balances: Vec<BalanceRecord> = state
            .ledger
            .balances()
            .map(|(claim, holder, amount)| BalanceRecord {
                claim: *claim,
                holder: *holder,
                amount,
            })
            .collect();
        balances.sort_by(|a, b| (a.claim, a.holder).cmp(&(b.claim, b.holder)));

        Self {
            schema_version: SCHEMA_VERSION,
            owner: state.owner,
            config: state.config.clone(),
            oracles: state.oracles.iter().copied().collect(),
            conditions,
            oracle_sequences,
            balances,
            fees: state.fees.clone(),
        }
    }

    /// Rebuilds the engine state, checking that every balance belongs to a
    /// known outcome and that claim supplies agree with the stake totals.
    pub fn into_state(self) -> Result<EngineState> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(EngineError::UnsupportedSchema(self.schema_version));
        }
        let mut state = EngineState::new(self.owner, self.config)?;
        state.oracles = self.oracles.into_iter().collect();
        for condition in self.conditions {
            check_totals(&condition)?;
            state.conditions.insert(condition);
        }
        for sequence in self.oracle_sequences {
            let next = sequence
                .next_local_id
                .max(state.conditions.next_local_id(&sequence.oracle));
            state.conditions.set_next_local_id(sequence.oracle, next);
        }
        for record in self.balances {
            let condition = state.conditions.get(&record.claim.condition_id)?;
            if !condition.has_outcome(record.claim.outcome) {
                return Err(EngineError::WrongOutcome {
                    condition_id: condition.id,
                    outcome: record.claim.outcome,
                });
            }
            state.ledger.mint(record.claim, record.holder, record.amount)?;
        }
        for condition in state.conditions.iter() {
            check_supplies(condition, &state.ledger)?;
        }
        state.fees = self.fees;
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot of any supported version, migrating it to the current one.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut document: Value = serde_json::from_str(json)?;
        let version = document
            .get("schema_version")
            .and_then(Value::as_u64)
            .unwrap_or_default() as u32;

        match version {
            1 => {
                migrate_v1(&mut document);
                info!(from = 1, to = SCHEMA_VERSION, "migrated snapshot");
            }
            SCHEMA_VERSION => {}
            other => return Err(EngineError::UnsupportedSchema(other)),
        }
        Ok(serde_json::from_value(document)?)
    }
}

/// One total per outcome, summing without overflow.
fn check_totals(condition: &Condition) -> Result<()> {
    if condition.totals.len() != condition.outcomes.len() {
        return Err(EngineError::CorruptSnapshot(format!(
            "condition {} has {} totals for {} outcomes",
            condition.id,
            condition.totals.len(),
            condition.outcomes.len()
        )));
    }
    condition
        .totals
        .iter()
        .try_fold(0 as Amount, |pool, total| pool.checked_add(*total))
        .ok_or_else(|| {
            EngineError::CorruptSnapshot(format!("pool of condition {} overflows", condition.id))
        })?;
    Ok(())
}

/// Redemption only burns claims, so supply never exceeds the stake total and
/// matches it exactly until the first redemption.
fn check_supplies(condition: &Condition, ledger: &ClaimLedger) -> Result<()> {
    for (outcome, total) in condition.outcomes.iter().zip(&condition.totals) {
        let claim = ClaimId::new(condition.id, *outcome);
        let supply = ledger.total_supply(&claim);
        let consistent = if condition.has_redemptions {
            supply <= *total
        } else {
            supply == *total
        };
        if !consistent {
            return Err(EngineError::CorruptSnapshot(format!(
                "claim {claim} has supply {supply} against stake total {total}"
            )));
        }
    }
    Ok(())
}

/// Copies the engine-wide fee rate onto every condition.
fn migrate_v1(document: &mut Value) {
    let fee_rate = document
        .pointer("/config/fee_rate")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_FEE_RATE);

    if let Some(conditions) = document
        .get_mut("conditions")
        .and_then(Value::as_array_mut)
    {
        for condition in conditions.iter_mut().filter_map(Value::as_object_mut) {
            condition
                .entry("fee_rate")
                .or_insert_with(|| Value::from(fee_rate));
        }
    }
    document["schema_version"] = Value::from(SCHEMA_VERSION);
}

impl<A: AssetAdapter, C: Clock> Engine<A, C> {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state)
    }

    /// Rebuilds an engine from a snapshot. The event log starts empty.
    pub fn restore(snapshot: Snapshot, assets: A, clock: C) -> Result<Self> {
        Ok(Self::from_state(snapshot.into_state()?, assets, clock))
    }
}
