//! # Settlement Engine
//!
//! [`Engine`] owns the complete protocol state and is the only entry point for
//! mutating it. Operations are split across modules by component:
//!
//! - [`crate::oracle`]: oracle membership, owner-only
//! - [`crate::condition`]: create, resolve, cancel and shift conditions
//! - [`crate::ledger`]: stake placement and claim balances
//! - [`crate::payout`]: redemption of claims into payouts or refunds
//! - [`crate::fees`]: protocol fee accrual and claim
//!
//! Each operation validates everything before it mutates, and calls the
//! [`AssetAdapter`] last. When the adapter refuses, the operation's ledger
//! changes are undone before the error is returned.

use std::collections::VecDeque;

use tracing::{info, warn};

use crate::{
    assets::AssetAdapter,
    clock::Clock,
    condition::ConditionRegistry,
    config::EngineConfig,
    error::Result,
    events::Event,
    fees::FeeLedger,
    ledger::ClaimLedger,
    oracle::OracleRegistry,
    types::{Address, Timestamp},
    EngineError, FEE_MULTIPLIER,
};

/// Undrained events kept before the oldest are dropped.
pub const EVENT_LOG_CAPACITY: usize = 4096;

/// Everything the engine persists, owned by a single [`Engine`].
///
/// Its on-disk layout is [`crate::snapshot::Snapshot`].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineState {
    pub(crate) owner: Address,
    pub(crate) config: EngineConfig,
    pub(crate) oracles: OracleRegistry,
    pub(crate) conditions: ConditionRegistry,
    pub(crate) ledger: ClaimLedger,
    pub(crate) fees: FeeLedger,
}

impl EngineState {
    pub fn new(owner: Address, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            owner,
            config,
            oracles: OracleRegistry::default(),
            conditions: ConditionRegistry::default(),
            ledger: ClaimLedger::default(),
            fees: FeeLedger::default(),
        })
    }
}

/// Pari-mutuel settlement engine over an asset adapter `A` and a clock `C`.
pub struct Engine<A, C> {
    pub(crate) state: EngineState,
    pub(crate) assets: A,
    clock: C,
    events: VecDeque<Event>,
}

impl<A: AssetAdapter, C: Clock> Engine<A, C> {
    /// Creates an empty engine administered by `owner`.
    pub fn new(owner: Address, config: EngineConfig, assets: A, clock: C) -> Result<Self> {
        Ok(Self::from_state(EngineState::new(owner, config)?, assets, clock))
    }

    pub fn from_state(state: EngineState, assets: A, clock: C) -> Self {
        Self {
            state,
            assets,
            clock,
            events: VecDeque::new(),
        }
    }

    pub fn into_parts(self) -> (EngineState, A, C) {
        (self.state, self.assets, self.clock)
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn owner(&self) -> Address {
        self.state.owner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Events emitted since the last [`Engine::take_events`], oldest first.
    ///
    /// Hosts are expected to drain the log; only the newest
    /// [`EVENT_LOG_CAPACITY`] events are kept.
    pub fn events(&self) -> &VecDeque<Event> {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events).into()
    }

    /// Changes the fee rate captured by conditions created from now on.
    pub fn set_fee_rate(&mut self, caller: &Address, fee_rate: u64) -> Result<()> {
        self.require_owner(caller)?;
        if fee_rate > FEE_MULTIPLIER {
            return Err(EngineError::FeeRateOutOfRange(fee_rate));
        }
        self.state.config.fee_rate = fee_rate;
        self.emit(Event::FeeRateChanged { fee_rate });
        Ok(())
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub(crate) fn require_owner(&self, caller: &Address) -> Result<()> {
        if *caller != self.state.owner {
            return Err(EngineError::OnlyOwner(*caller));
        }
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: Event) {
        info!(?event, "engine event");
        if self.events.len() == EVENT_LOG_CAPACITY {
            if let Some(dropped) = self.events.pop_front() {
                warn!(?dropped, "event log full, dropping oldest event");
            }
        }
        self.events.push_back(event);
    }
}
