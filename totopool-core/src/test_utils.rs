//! Common test utilities for totopool-core tests.
//!
//! Deterministic identities, a funded engine on a manual clock, and helpers
//! for the condition setups most tests start from.

use secp256k1::{Keypair, Secp256k1, SecretKey};

use crate::{
    condition::NewCondition,
    config::{EngineConfig, DEFAULT_CANCEL_GRACE_PERIOD, DEFAULT_FEE_RATE, DEFAULT_MIN_LEAD_TIME},
    Address, Amount, ClaimId, ConditionId, Denomination, Engine, InMemoryAssets, ManualClock,
    OutcomeId, Timestamp,
};

/// Jan 1, 2025
pub const T0: Timestamp = 1735689600;
pub const ONE_HOUR: u64 = 3600;

pub const OUTCOME_WIN: OutcomeId = 1;
pub const OUTCOME_LOSE: OutcomeId = 2;
pub const OUTCOME_INCORRECT: OutcomeId = 3;

pub const BET: Amount = 1_000;
pub const FUNDING: Amount = 1_000_000;

pub const FEE_1_PERCENT: u64 = DEFAULT_FEE_RATE;
pub const DEFAULT_LEAD: u64 = DEFAULT_MIN_LEAD_TIME;
pub const DEFAULT_GRACE: u64 = DEFAULT_CANCEL_GRACE_PERIOD;
pub use crate::config::DEFAULT_RESOLUTION_TIMEOUT;

pub const METADATA: [u8; 32] = [0x42; 32];

pub type TestEngine = Engine<InMemoryAssets, ManualClock>;

/// Generate a valid address for testing purposes.
/// Uses deterministic key generation based on the index for reproducible tests.
pub fn test_address(index: u8) -> Address {
    let secp = Secp256k1::new();
    let mut secret_bytes = [0u8; 32];
    secret_bytes[0] = index;
    secret_bytes[31] = index.wrapping_add(1);
    let secret_key = SecretKey::from_slice(&secret_bytes).unwrap();
    let (public_key, _) = Keypair::from_secret_key(&secp, &secret_key).x_only_public_key();
    Address::from_public_key(&public_key)
}

/// Two-outcome condition parameters with an explicit window.
pub fn new_condition(local_id: Option<u64>, starts_at: Timestamp, settles_at: Timestamp) -> NewCondition {
    NewCondition {
        oracle_condition_id: local_id,
        scope_id: None,
        outcomes: vec![OUTCOME_WIN, OUTCOME_LOSE],
        betting_starts_at: Some(starts_at),
        settles_at,
        metadata: METADATA,
    }
}

pub struct Fixture {
    pub engine: TestEngine,
    pub owner: Address,
    pub oracle: Address,
    /// Funded with [`FUNDING`] in both token and native currency
    pub bettors: Vec<Address>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Engine at [`T0`] with one registered oracle and eight funded bettors.
    pub fn with_config(config: EngineConfig) -> Self {
        let owner = test_address(0);
        let oracle = test_address(1);
        let bettors: Vec<Address> = (10..18).map(test_address).collect();

        let mut assets = InMemoryAssets::new();
        for bettor in &bettors {
            assets.mint(bettor, FUNDING, Denomination::Token);
            assets.mint(bettor, FUNDING, Denomination::Native);
        }

        let mut engine = Engine::new(owner, config, assets, ManualClock::new(T0)).unwrap();
        engine.add_oracle(&owner, oracle).unwrap();
        engine.take_events();

        Self {
            engine,
            owner,
            oracle,
            bettors,
        }
    }

    pub fn set_time(&self, now: Timestamp) {
        self.engine.clock().set(now);
    }

    /// Condition open from now until one hour after [`T0`].
    pub fn create_condition(&mut self) -> ConditionId {
        self.create_condition_with(T0, T0 + ONE_HOUR)
    }

    pub fn create_condition_with(&mut self, starts_at: Timestamp, settles_at: Timestamp) -> ConditionId {
        let oracle = self.oracle;
        self.engine
            .create_condition(&oracle, new_condition(None, starts_at, settles_at))
            .unwrap()
    }

    pub fn bet(&mut self, bettor: &Address, id: &ConditionId, outcome: OutcomeId, amount: Amount) -> ClaimId {
        self.engine.place_bet(bettor, id, outcome, amount).unwrap()
    }

    /// First bettor on [`OUTCOME_WIN`], second on [`OUTCOME_LOSE`].
    pub fn bet_both_sides(&mut self, id: &ConditionId, amount: Amount) -> (ClaimId, ClaimId) {
        let (first, second) = (self.bettors[0], self.bettors[1]);
        (
            self.bet(&first, id, OUTCOME_WIN, amount),
            self.bet(&second, id, OUTCOME_LOSE, amount),
        )
    }

    /// Advances to the settlement time and resolves.
    pub fn resolve(&mut self, id: &ConditionId, winning_outcome: OutcomeId) {
        let settles_at = self.engine.condition(id).unwrap().settles_at;
        self.set_time(settles_at);
        let oracle = self.oracle;
        self.engine
            .resolve_condition(&oracle, id, winning_outcome)
            .unwrap();
    }

    pub fn token_balance(&self, holder: &Address) -> Amount {
        self.engine.assets().balance(holder, Denomination::Token)
    }

    pub fn native_balance(&self, holder: &Address) -> Amount {
        self.engine.assets().balance(holder, Denomination::Native)
    }
}
