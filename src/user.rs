//! Users and their per-market positions.
//!
//! Balances are exact decimals; shares are curve coordinates and stay f64.
//! A position's `settled` flag is one-shot: once set, both share counts are
//! zero and a second settlement of the same (user, market) pair is refused.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::lmsr::Outcome;

/// Balance granted to every newly created user.
pub const DEFAULT_STARTING_BALANCE: Decimal = dec!(1000.00);

/// A user's share holdings in one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    market_id: String,
    yes_shares: f64,
    no_shares: f64,
    settled: bool,
}

impl Position {
    pub fn new(market_id: impl Into<String>) -> Self {
        Self {
            market_id: market_id.into(),
            yes_shares: 0.0,
            no_shares: 0.0,
            settled: false,
        }
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn yes_shares(&self) -> f64 {
        self.yes_shares
    }

    pub fn no_shares(&self) -> f64 {
        self.no_shares
    }

    pub fn shares_for(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Yes => self.yes_shares,
            Outcome::No => self.no_shares,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn set_yes_shares(&mut self, yes_shares: f64) -> Result<()> {
        if !(yes_shares >= 0.0) || !yes_shares.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "yes_shares must be non-negative and finite, got {yes_shares}"
            )));
        }
        self.yes_shares = yes_shares;
        Ok(())
    }

    pub fn set_no_shares(&mut self, no_shares: f64) -> Result<()> {
        if !(no_shares >= 0.0) || !no_shares.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "no_shares must be non-negative and finite, got {no_shares}"
            )));
        }
        self.no_shares = no_shares;
        Ok(())
    }

    /// Zero both sides. Settlement-engine use.
    pub fn clear_shares(&mut self) {
        self.yes_shares = 0.0;
        self.no_shares = 0.0;
    }

    /// Flip the one-shot settled flag. Fails on a second call.
    pub fn mark_settled(&mut self) -> Result<()> {
        if self.settled {
            return Err(EngineError::IllegalState(format!(
                "position in market {} already settled",
                self.market_id
            )));
        }
        self.settled = true;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.market_id.trim().is_empty() {
            return Err(EngineError::Structural(
                "position market id cannot be empty".to_string(),
            ));
        }
        if !(self.yes_shares >= 0.0)
            || !self.yes_shares.is_finite()
            || !(self.no_shares >= 0.0)
            || !self.no_shares.is_finite()
        {
            return Err(EngineError::Structural(format!(
                "position in market {} has invalid share counts ({}, {})",
                self.market_id, self.yes_shares, self.no_shares
            )));
        }
        if self.settled && (self.yes_shares != 0.0 || self.no_shares != 0.0) {
            return Err(EngineError::Structural(format!(
                "settled position in market {} still holds shares",
                self.market_id
            )));
        }
        Ok(())
    }
}

/// A participant holding a balance and positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    user_id: String,
    balance: Decimal,
    positions: BTreeMap<String, Position>,
}

impl User {
    /// New user with [`DEFAULT_STARTING_BALANCE`].
    pub fn new(user_id: impl Into<String>) -> Result<Self> {
        Self::with_balance(user_id, DEFAULT_STARTING_BALANCE)
    }

    pub fn with_balance(user_id: impl Into<String>, balance: Decimal) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "user id cannot be empty".to_string(),
            ));
        }
        if balance < Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "balance cannot be negative, got {balance}"
            )));
        }
        Ok(Self {
            user_id,
            balance,
            positions: BTreeMap::new(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Overwrite the balance. Refuses negative values, state unchanged.
    pub fn set_balance(&mut self, balance: Decimal) -> Result<()> {
        if balance < Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "balance cannot be negative, got {balance}"
            )));
        }
        self.balance = balance;
        Ok(())
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, market_id: &str) -> Option<&Position> {
        self.positions.get(market_id)
    }

    /// The position for `market_id`, inserting an empty one on first access.
    pub fn get_or_create_position(&mut self, market_id: &str) -> &mut Position {
        self.positions
            .entry(market_id.to_string())
            .or_insert_with(|| Position::new(market_id))
    }

    /// Drop a position. Load-time referential repair only.
    pub fn remove_position(&mut self, market_id: &str) -> Option<Position> {
        self.positions.remove(market_id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(EngineError::Structural(
                "user id cannot be empty".to_string(),
            ));
        }
        if self.balance < Decimal::ZERO {
            return Err(EngineError::Structural(format!(
                "user {} has negative balance {}",
                self.user_id, self.balance
            )));
        }
        for (market_id, position) in &self.positions {
            position.validate()?;
            if market_id != position.market_id() {
                return Err(EngineError::Structural(format!(
                    "user {} position key {} does not match its market id {}",
                    self.user_id,
                    market_id,
                    position.market_id()
                )));
            }
        }
        Ok(())
    }
}
