//! TTL models

use serde::{Deserialize, Serialize};

use crate::errors::DeckError;

/// Supported TTL units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hour,
    Day,
    Month,
}

impl std::str::FromStr for TimeUnit {
    type Err = DeckError;

    /// Parse a unit from form input. Anything outside the closed set is
    /// rejected loudly rather than defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TimeUnit::Hour),
            "day" => Ok(TimeUnit::Day),
            "month" => Ok(TimeUnit::Month),
            other => Err(DeckError::InvalidUnit(other.to_string())),
        }
    }
}

/// A TTL as entered in the create/edit forms
///
/// Constructed from form input and consumed once at submit time; never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlSpec {
    /// Positive integer count of `unit`
    pub value: u64,
    pub unit: TimeUnit,
}

impl TtlSpec {
    pub fn new(value: u64, unit: TimeUnit) -> Result<Self, DeckError> {
        if value == 0 {
            return Err(DeckError::ValidationError(
                "TTL value must be positive".to_string(),
            ));
        }
        Ok(Self { value, unit })
    }
}
