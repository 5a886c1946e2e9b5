//! Domain events appended by every successful state transition.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, ClaimId, ConditionId, OutcomeId, Timestamp};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum Event {
    OracleAdded {
        oracle: Address,
    },
    OracleRevoked {
        oracle: Address,
    },
    FeeRateChanged {
        fee_rate: u64,
    },
    ConditionCreated {
        condition_id: ConditionId,
        oracle: Address,
        oracle_condition_id: u64,
        scope_id: Option<u64>,
        outcomes: Vec<OutcomeId>,
        betting_starts_at: Timestamp,
        settles_at: Timestamp,
    },
    ConditionResolved {
        condition_id: ConditionId,
        winning_outcome: OutcomeId,
    },
    ConditionCanceled {
        condition_id: ConditionId,
    },
    ConditionRescheduled {
        condition_id: ConditionId,
        betting_starts_at: Timestamp,
        settles_at: Timestamp,
    },
    NewBet {
        condition_id: ConditionId,
        claim: ClaimId,
        bettor: Address,
        amount: Amount,
    },
    Redeemed {
        claim: ClaimId,
        holder: Address,
        amount: Amount,
    },
    ProtocolFeeClaimed {
        owner: Address,
        amount: Amount,
    },
}
