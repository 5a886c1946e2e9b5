//! # Utility Functions
//!
//! Conversions between engine units and human-readable forms.

use chrono::{DateTime, Utc};

use crate::{error::Result, types::Timestamp, EngineError, FEE_MULTIPLIER};

/// Format timestamp as human-readable string
pub fn format_timestamp(timestamp: Timestamp) -> String {
    let dt = DateTime::from_timestamp(timestamp as i64, 0).unwrap_or_default();
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Parse a timestamp given as Unix seconds or as RFC 3339 (`2025-01-01T00:00:00Z`)
pub fn parse_timestamp(timestamp_str: &str) -> Result<Timestamp> {
    if let Ok(seconds) = timestamp_str.parse::<Timestamp>() {
        return Ok(seconds);
    }
    let dt = DateTime::parse_from_rfc3339(timestamp_str)
        .map_err(|_| EngineError::InvalidIdentifier(format!("invalid timestamp: {timestamp_str}")))?;
    Timestamp::try_from(dt.with_timezone(&Utc).timestamp())
        .map_err(|_| EngineError::InvalidIdentifier(format!("timestamp before 1970: {timestamp_str}")))
}

/// Fee rate in parts per [`FEE_MULTIPLIER`] as a percentage
pub fn fee_rate_to_percent(fee_rate: u64) -> f64 {
    fee_rate as f64 * 100.0 / FEE_MULTIPLIER as f64
}

/// Percentage to fee rate, rounded to the nearest part per trillion
pub fn percent_to_fee_rate(percent: f64) -> Result<u64> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(EngineError::InvalidConfig(format!(
            "fee must be between 0 and 100 percent, got {percent}"
        )));
    }
    Ok((percent * FEE_MULTIPLIER as f64 / 100.0).round() as u64)
}

/// Parse a 32-byte metadata hash from 64 hex characters
pub fn parse_metadata(hex_str: &str) -> Result<[u8; 32]> {
    hex::decode(hex_str)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| EngineError::InvalidIdentifier(format!("metadata hash: {hex_str}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1735689600), "2025-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1735689600").unwrap(), 1735689600);
        assert_eq!(parse_timestamp("2025-01-01T00:00:00Z").unwrap(), 1735689600);
        assert_eq!(parse_timestamp("2025-01-01T02:00:00+02:00").unwrap(), 1735689600);
        assert!(parse_timestamp("tomorrow").is_err());
        assert!(parse_timestamp("1960-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_fee_rate_conversion() {
        assert_eq!(fee_rate_to_percent(10_000_000_000), 1.0);
        assert_eq!(percent_to_fee_rate(1.0).unwrap(), 10_000_000_000);
        assert_eq!(percent_to_fee_rate(0.5).unwrap(), 5_000_000_000);
        assert_eq!(percent_to_fee_rate(100.0).unwrap(), FEE_MULTIPLIER);
        assert!(percent_to_fee_rate(-1.0).is_err());
        assert!(percent_to_fee_rate(101.0).is_err());
    }

    #[test]
    fn test_parse_metadata() {
        let hash = parse_metadata(&"ab".repeat(32)).unwrap();
        assert_eq!(hash, [0xab; 32]);
        assert!(parse_metadata("abcd").is_err());
    }
}
