//! Engine error taxonomy.
//!
//! Validation errors are raised by the innermost component that detects them
//! and propagate upward unchanged; no error ever leaves a partial mutation
//! behind.

use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Negative shares, non-positive amount, empty id, unknown outcome tag.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("market not found: {0}")]
    MarketNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Trade on a non-open market, re-resolve, re-settle of a position.
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    /// Budget below the minimum buyable increment.
    #[error("amount {0} is too small to buy any shares")]
    AmountTooSmall(Decimal),

    #[error("market name already in use: {0}")]
    DuplicateName(String),

    #[error("user already exists: {0}")]
    DuplicateUser(String),

    /// Persisted state failed an invariant check on load. Aborts startup.
    #[error("structural error in persisted state: {0}")]
    Structural(String),

    /// The in-memory commit succeeded but the snapshot write failed; state
    /// and storage have diverged and the caller decides whether to retry.
    #[error("durability error: {0}")]
    Durability(String),
}
