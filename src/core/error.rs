//! Error types of the rate engine.

use chrono::NaiveDate;

/// Storage collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt record under key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Unknown provider id: {0}")]
    UnknownProvider(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    /// No candidate rate was given to reconciliation.
    #[error("Missing exchange rate.")]
    NoCandidates,

    #[error("Missing exchange rate for {currency} on {date}")]
    MissingRate { currency: String, date: NaiveDate },

    #[error("Exchange rate for {currency} on {date} is zero")]
    ZeroRate { currency: String, date: NaiveDate },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RateError {
    /// True when no provider could supply a usable rate. Query surfaces
    /// report these as an absent result rather than a failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            RateError::NoCandidates | RateError::MissingRate { .. } | RateError::ZeroRate { .. }
        )
    }
}
