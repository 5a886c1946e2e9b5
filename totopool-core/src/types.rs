//! Identifiers and scalar types shared by every engine component.

use std::fmt;
use std::str::FromStr;

use secp256k1::XOnlyPublicKey;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{error::Result, EngineError};

/// Amount in the staking asset's smallest unit.
pub type Amount = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Identifier of one outcome inside a condition's outcome set.
pub type OutcomeId = u64;

/// 32-byte content reference attached to a condition (e.g. an IPFS digest).
pub type MetadataHash = [u8; 32];

/// Domain tag mixed into every derived condition identifier.
const CONDITION_ID_TAG: &[u8] = b"totopool:condition";

/// Participant identity: the 32-byte x-only public key of an oracle, bettor or owner.
///
/// Rendered and parsed as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Wraps raw key bytes without checking that they lie on the curve.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derives the address of an x-only public key.
    pub fn from_public_key(key: &XOnlyPublicKey) -> Self {
        Self(key.serialize())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| EngineError::InvalidAddress(format!("{s}: {e}")))?;
        let key = XOnlyPublicKey::from_slice(&bytes).map_err(|e| {
            EngineError::InvalidAddress(format!("{s}: not a 32-byte x-only public key ({e})"))
        })?;
        Ok(Self::from_public_key(&key))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

/// Unique condition identifier derived from the creating oracle and its local id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConditionId([u8; 32]);

impl ConditionId {
    /// `sha256(tag || oracle || oracle_condition_id as big-endian u64)`.
    pub fn derive(oracle: &Address, oracle_condition_id: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(CONDITION_ID_TAG);
        hasher.update(oracle.as_bytes());
        hasher.update(oracle_condition_id.to_be_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ConditionId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(s)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| EngineError::InvalidIdentifier(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConditionId({})", &self.to_hex()[..16])
    }
}

/// Identity of a claim token: one outcome of one condition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ClaimId {
    pub condition_id: ConditionId,
    pub outcome: OutcomeId,
}

impl ClaimId {
    pub const fn new(condition_id: ConditionId, outcome: OutcomeId) -> Self {
        Self {
            condition_id,
            outcome,
        }
    }
}

/// Parses `<condition-hex>:<outcome>`.
impl FromStr for ClaimId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let (condition, outcome) = s
            .split_once(':')
            .ok_or_else(|| EngineError::InvalidIdentifier(s.to_string()))?;
        let outcome = outcome
            .parse::<OutcomeId>()
            .map_err(|_| EngineError::InvalidIdentifier(s.to_string()))?;
        Ok(Self::new(condition.parse()?, outcome))
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.condition_id, self.outcome)
    }
}

macro_rules! hex_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                let bytes: [u8; 32] = hex::decode(&s)
                    .ok()
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| de::Error::custom(format!("expected 32-byte hex, got {s}")))?;
                Ok(Self(bytes))
            }
        }
    };
}

hex_serde!(Address);
hex_serde!(ConditionId);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_address;

    #[test]
    fn test_condition_id_is_deterministic() {
        let oracle = test_address(1);
        assert_eq!(ConditionId::derive(&oracle, 7), ConditionId::derive(&oracle, 7));
        assert_ne!(ConditionId::derive(&oracle, 7), ConditionId::derive(&oracle, 8));
        assert_ne!(
            ConditionId::derive(&oracle, 7),
            ConditionId::derive(&test_address(2), 7)
        );
    }

    #[test]
    fn test_address_parsing() {
        let addr = test_address(3);
        let parsed: Address = addr.to_hex().parse().unwrap();
        assert_eq!(parsed, addr);

        assert!("zz".parse::<Address>().is_err());
        assert!("abcd".parse::<Address>().is_err());
    }

    #[test]
    fn test_claim_id_text_form() {
        let claim = ClaimId::new(ConditionId::derive(&test_address(1), 1), 2);
        let text = claim.to_string();
        assert!(text.ends_with(":2"));
        assert_eq!(text.parse::<ClaimId>().unwrap(), claim);
        assert!("nocolon".parse::<ClaimId>().is_err());
        assert!(format!("{}:x", claim.condition_id).parse::<ClaimId>().is_err());
    }

    #[test]
    fn test_address_serializes_as_hex() {
        let addr = test_address(4);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.to_hex()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
