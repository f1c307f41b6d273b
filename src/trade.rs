//! Trade records and the trade engine.
//!
//! This is the ONLY place where money, market shares, and positions change
//! together. Every trade runs a two-phase protocol: phase 1 computes and
//! validates every new value without touching state; phase 2 applies them
//! through the object setters; phase 3 mints the immutable record. If any
//! phase-1 check fails, the user, market, and positions map are left
//! bit-for-bit unchanged, and no empty position is created.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::lmsr::{self, Outcome};
use crate::market::Market;
use crate::user::User;

/// Immutable record of a committed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    trade_id: Uuid,
    user_id: String,
    market_id: String,
    outcome: Outcome,
    shares_bought: f64,
    cost: Decimal,
    created_at: DateTime<Utc>,
}

impl Trade {
    pub fn trade_id(&self) -> Uuid {
        self.trade_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn shares_bought(&self) -> f64 {
        self.shares_bought
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(EngineError::Structural(format!(
                "trade {} has an empty user id",
                self.trade_id
            )));
        }
        if self.market_id.trim().is_empty() {
            return Err(EngineError::Structural(format!(
                "trade {} has an empty market id",
                self.trade_id
            )));
        }
        if !(self.shares_bought > 0.0) || !self.shares_bought.is_finite() {
            return Err(EngineError::Structural(format!(
                "trade {} has invalid share count {}",
                self.trade_id, self.shares_bought
            )));
        }
        if self.cost <= Decimal::ZERO {
            return Err(EngineError::Structural(format!(
                "trade {} has non-positive cost {}",
                self.trade_id, self.cost
            )));
        }
        Ok(())
    }
}

/// Buy `shares_to_buy` shares of `outcome` for `user` against `market`.
///
/// The caller persists the affected objects after a successful return; the
/// engine itself never does I/O.
pub fn execute_trade(
    user: &mut User,
    market: &mut Market,
    outcome: Outcome,
    shares_to_buy: f64,
) -> Result<Trade> {
    // ---------- Phase 1: compute and validate, no mutation ----------

    if !(shares_to_buy > 0.0) || !shares_to_buy.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "shares to buy must be positive and finite, got {shares_to_buy}"
        )));
    }
    if !market.is_open() {
        return Err(EngineError::IllegalState(format!(
            "market {} is not open for trading",
            market.market_id()
        )));
    }

    let cost = lmsr::to_money(market.cost_to_buy(outcome, shares_to_buy))?;
    if cost < Decimal::ZERO {
        // Pricing invariant broken; a bug guard, not a user error.
        return Err(EngineError::IllegalState(format!(
            "trade cost cannot be negative, got {cost}"
        )));
    }
    if user.balance() < cost {
        return Err(EngineError::InsufficientBalance {
            required: cost,
            available: user.balance(),
        });
    }

    let (new_q_yes, new_q_no) = match outcome {
        Outcome::Yes => (market.q_yes() + shares_to_buy, market.q_no()),
        Outcome::No => (market.q_yes(), market.q_no() + shares_to_buy),
    };
    let new_balance = user.balance() - cost;

    // Read the possibly-absent position without creating it; an empty
    // position must not appear if a later check were to fail.
    let (current_yes, current_no) = user
        .position(market.market_id())
        .map(|p| (p.yes_shares(), p.no_shares()))
        .unwrap_or((0.0, 0.0));
    let (new_yes, new_no) = match outcome {
        Outcome::Yes => (current_yes + shares_to_buy, current_no),
        Outcome::No => (current_yes, current_no + shares_to_buy),
    };

    // ---------- Phase 2: apply; every write was pre-validated ----------

    market.set_shares(new_q_yes, new_q_no)?;
    user.set_balance(new_balance)?;
    let market_id = market.market_id().to_string();
    let position = user.get_or_create_position(&market_id);
    match outcome {
        Outcome::Yes => position.set_yes_shares(new_yes)?,
        Outcome::No => position.set_no_shares(new_no)?,
    }

    // ---------- Phase 3: record ----------

    Ok(Trade {
        trade_id: Uuid::new_v4(),
        user_id: user.user_id().to_string(),
        market_id,
        outcome,
        shares_bought: shares_to_buy,
        cost,
        created_at: Utc::now(),
    })
}
