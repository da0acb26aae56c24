//! Error types for validation failures
//!
//! Only invalid input is an error. "No match", insufficient budget and lost
//! races are ordinary results and live in [`crate::engine::ServeResult`].

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced to callers of the engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The referenced advertiser is not registered
    #[error("unknown advertiser: {advertiser_id}")]
    UnknownAdvertiser {
        advertiser_id: String,
    },

    /// The referenced user is not registered
    #[error("unknown user: {user_id}")]
    UnknownUser {
        user_id: String,
    },

    /// The referenced campaign does not exist
    #[error("unknown campaign: {campaign_id}")]
    UnknownCampaign {
        campaign_id: String,
    },

    /// A caller-supplied advertiser id is already in use
    #[error("advertiser already registered: {advertiser_id}")]
    DuplicateAdvertiser {
        advertiser_id: String,
    },

    /// Campaign creation rejected
    #[error("invalid campaign: {reason}")]
    InvalidCampaign {
        reason: String,
    },

    /// Budget amount must be a finite number greater than zero
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: f64,
    },
}
