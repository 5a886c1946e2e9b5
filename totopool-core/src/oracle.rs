//! Oracle authorization: the set of addresses trusted to create and settle conditions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    assets::AssetAdapter, clock::Clock, engine::Engine, error::Result, events::Event,
    types::Address, EngineError,
};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct OracleRegistry {
    members: BTreeSet<Address>,
}

impl OracleRegistry {
    pub fn contains(&self, address: &Address) -> bool {
        self.members.contains(address)
    }

    /// Returns `false` if the address was already a member.
    pub fn insert(&mut self, address: Address) -> bool {
        self.members.insert(address)
    }

    /// Returns `false` if the address was not a member.
    pub fn remove(&mut self, address: &Address) -> bool {
        self.members.remove(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn require(&self, caller: &Address) -> Result<()> {
        if !self.contains(caller) {
            return Err(EngineError::OnlyOracle(*caller));
        }
        Ok(())
    }
}

impl FromIterator<Address> for OracleRegistry {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl<A: AssetAdapter, C: Clock> Engine<A, C> {
    /// Grants oracle rights. Adding an existing oracle changes nothing and emits nothing.
    pub fn add_oracle(&mut self, caller: &Address, oracle: Address) -> Result<()> {
        self.require_owner(caller)?;
        if self.state.oracles.insert(oracle) {
            self.emit(Event::OracleAdded { oracle });
        }
        Ok(())
    }

    /// Withdraws oracle rights. The revoked oracle can no longer resolve,
    /// cancel or shift the conditions it created; those expire into refunds.
    pub fn revoke_oracle(&mut self, caller: &Address, oracle: &Address) -> Result<()> {
        self.require_owner(caller)?;
        if self.state.oracles.remove(oracle) {
            self.emit(Event::OracleRevoked { oracle: *oracle });
        }
        Ok(())
    }

    pub fn is_oracle(&self, address: &Address) -> bool {
        self.state.oracles.contains(address)
    }

    pub fn oracles(&self) -> &OracleRegistry {
        &self.state.oracles
    }
}
