//! Duration literals in configuration files.
//!
//! A duration is either a JSON number of milliseconds or a string made of
//! an integer and a unit: `ms`, `s`, `min`, `h` or `d` (`"16s"`, `"2min"`).
//! A bare integer string is milliseconds.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Parse a duration literal such as `"4s"` or `"250ms"`.
pub fn parse_duration(literal: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(literal.to_string());

    let text = literal.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let millis_per_unit: u64 = match unit.trim() {
        "" | "ms" => 1,
        "s" => 1_000,
        "min" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return Err(invalid()),
    };
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Literal {
    Millis(u64),
    Text(String),
}

impl Literal {
    fn into_duration(self) -> Result<Duration, ConfigError> {
        match self {
            Literal::Millis(ms) => Ok(Duration::from_millis(ms)),
            Literal::Text(text) => parse_duration(&text),
        }
    }
}

/// `deserialize_with` helper for [`Duration`] fields.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Literal::deserialize(deserializer)?
        .into_duration()
        .map_err(serde::de::Error::custom)
}
