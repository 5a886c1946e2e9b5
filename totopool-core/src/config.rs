//! Engine-wide settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::Result, EngineError, FEE_MULTIPLIER};

/// Default protocol fee: 1% of each winning payout.
pub const DEFAULT_FEE_RATE: u64 = FEE_MULTIPLIER / 100;

/// Default minimum distance between creation/shift time and settlement (10 minutes)
pub const DEFAULT_MIN_LEAD_TIME: u64 = 600;

/// Default window before settlement in which one-sided conditions refuse bets (5 minutes)
pub const DEFAULT_CANCEL_GRACE_PERIOD: u64 = 300;

/// Default time an oracle has to resolve after settlement (24 hours)
pub const DEFAULT_RESOLUTION_TIMEOUT: u64 = 86_400;

/// Settings captured by the engine at construction.
///
/// Missing fields in a config file fall back to the defaults above.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Fee skimmed from winning payouts, in parts per [`FEE_MULTIPLIER`].
    /// Copied onto each condition when it is created.
    pub fee_rate: u64,

    /// Settlement must lie at least this many seconds after creation or reschedule.
    pub min_lead_time: u64,

    /// Seconds before settlement during which a condition with an unstaked
    /// outcome rejects new bets as "will be canceled".
    pub cancel_grace_period: u64,

    /// Seconds after settlement an oracle has before an unresolved condition
    /// becomes refundable. Must be positive.
    pub resolution_timeout: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_rate: DEFAULT_FEE_RATE,
            min_lead_time: DEFAULT_MIN_LEAD_TIME,
            cancel_grace_period: DEFAULT_CANCEL_GRACE_PERIOD,
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fee_rate > FEE_MULTIPLIER {
            return Err(EngineError::FeeRateOutOfRange(self.fee_rate));
        }
        if self.resolution_timeout == 0 {
            return Err(EngineError::InvalidConfig(
                "resolution timeout must be positive".to_string(),
            ));
        }
        if self.cancel_grace_period >= self.min_lead_time {
            return Err(EngineError::InvalidConfig(format!(
                "cancel grace period ({}s) must be shorter than the minimum lead time ({}s)",
                self.cancel_grace_period, self.min_lead_time
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
