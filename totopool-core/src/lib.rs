//! # Totopool Core
//!
//! Settlement engine for oracle-resolved pari-mutuel wagering.
//!
//! Trusted oracles open conditions (markets with two or more mutually
//! exclusive outcomes and a betting window). Bettors stake on outcomes and
//! receive claim balances 1:1. Once the oracle resolves a condition, holders
//! of the winning outcome split the whole pool in proportion to their stake,
//! less a protocol fee. Canceled or expired conditions refund every stake.
//!
//! ## Features
//!
//! - **Oracle Authorization**: owner-managed set of addresses allowed to open and settle conditions
//! - **Condition Registry**: creation, resolution, cancellation and rescheduling with timing rules
//! - **Bet Ledger**: claim balances per condition, outcome and holder, in token or native currency
//! - **Payout Engine**: fixed-point pari-mutuel payouts and refunds with atomic batch redemption
//! - **Fee Accounting**: protocol fee accrual and owner claim
//! - **Persistence**: versioned JSON snapshots with schema migration
//!
//! ## Examples
//!
//! ```rust
//! use totopool_core::{
//!     Address, Denomination, Engine, EngineConfig, InMemoryAssets, ManualClock, NewCondition,
//! };
//!
//! let owner = Address::from_bytes([1; 32]);
//! let oracle = Address::from_bytes([2; 32]);
//! let (alice, bob) = (Address::from_bytes([3; 32]), Address::from_bytes([4; 32]));
//!
//! let mut assets = InMemoryAssets::new();
//! assets.mint(&alice, 100, Denomination::Token);
//! assets.mint(&bob, 200, Denomination::Token);
//!
//! let start = 1735689600;
//! let mut engine = Engine::new(owner, EngineConfig::default(), assets, ManualClock::new(start))?;
//! engine.add_oracle(&owner, oracle)?;
//!
//! let condition = engine.create_condition(
//!     &oracle,
//!     NewCondition {
//!         oracle_condition_id: None,
//!         scope_id: None,
//!         outcomes: vec![1, 2],
//!         betting_starts_at: None,
//!         settles_at: start + 3600,
//!         metadata: [0; 32],
//!     },
//! )?;
//! let claim = engine.place_bet(&alice, &condition, 1, 100)?;
//! engine.place_bet(&bob, &condition, 2, 200)?;
//!
//! engine.clock().set(start + 3600);
//! engine.resolve_condition(&oracle, &condition, 1)?;
//!
//! // 300 pool, 1% fee
//! assert_eq!(engine.redeem(&alice, &[claim])?, 297);
//! Ok::<(), totopool_core::EngineError>(())
//! ```

pub mod assets;
pub mod clock;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod oracle;
pub mod payout;
pub mod snapshot;
pub mod sync;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use assets::{AssetAdapter, AssetError, Denomination, InMemoryAssets};
pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{Condition, ConditionStatus, NewCondition, Settlement};
pub use config::EngineConfig;
pub use engine::{Engine, EngineState};
pub use error::{EngineError, ErrorKind, Result};
pub use events::Event;
pub use fees::FeeLedger;
pub use payout::{winning_payout, Redemption};
pub use snapshot::Snapshot;
pub use sync::SharedEngine;
pub use types::{Address, Amount, ClaimId, ConditionId, MetadataHash, OutcomeId, Timestamp};

/// Denominator of fee rates: a rate of `FEE_MULTIPLIER` is 100%.
pub const FEE_MULTIPLIER: u64 = 1_000_000_000_000;
