//! Market state object and its lifecycle machine.
//!
//! A market owns its outcome share counts and lifecycle status and delegates
//! every numeric question to the pricing kernel. Prices are derived, never
//! stored. The only legal transition is OPEN -> RESOLVED, exactly once;
//! resolved markets are immutable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::lmsr::{self, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Open,
    Resolved,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Open => "OPEN",
            MarketStatus::Resolved => "RESOLVED",
        }
    }
}

impl FromStr for MarketStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(MarketStatus::Open),
            "RESOLVED" => Ok(MarketStatus::Resolved),
            _ => Err(EngineError::InvalidInput(format!(
                "unknown market status '{s}', expected OPEN or RESOLVED"
            ))),
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binary market priced by the LMSR cost function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    market_id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    q_yes: f64,
    q_no: f64,
    b: f64,
    status: MarketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_outcome: Option<Outcome>,
}

impl Market {
    /// Create an OPEN market at the origin `(q_yes = 0, q_no = 0)`.
    ///
    /// The liquidity parameter is fixed for the market's lifetime.
    pub fn new(
        market_id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        b: f64,
    ) -> Result<Self> {
        let market_id = market_id.into();
        let name = name.into();
        if market_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "market id cannot be empty".to_string(),
            ));
        }
        if name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "market name cannot be empty".to_string(),
            ));
        }
        if !(b > 0.0) || !b.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "liquidity must be positive and finite, got {b}"
            )));
        }
        Ok(Self {
            market_id,
            name,
            description,
            q_yes: 0.0,
            q_no: 0.0,
            b,
            status: MarketStatus::Open,
            resolved_outcome: None,
        })
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn q_yes(&self) -> f64 {
        self.q_yes
    }

    pub fn q_no(&self) -> f64 {
        self.q_no
    }

    pub fn liquidity(&self) -> f64 {
        self.b
    }

    pub fn status(&self) -> MarketStatus {
        self.status
    }

    pub fn resolved_outcome(&self) -> Option<Outcome> {
        self.resolved_outcome
    }

    pub fn is_open(&self) -> bool {
        self.status == MarketStatus::Open
    }

    /// Current `(P(YES), P(NO))`, derived from the kernel.
    pub fn prices(&self) -> (f64, f64) {
        let p_yes = lmsr::price_yes(self.q_yes, self.q_no, self.b);
        (p_yes, 1.0 - p_yes)
    }

    pub fn cost_to_buy(&self, outcome: Outcome, shares: f64) -> f64 {
        lmsr::cost_to_buy(outcome, self.q_yes, self.q_no, self.b, shares)
    }

    /// How many shares of `outcome` the given budget buys at the current state.
    pub fn shares_for_amount(&self, outcome: Outcome, amount: f64) -> f64 {
        lmsr::shares_for_amount(outcome, self.q_yes, self.q_no, self.b, amount)
    }

    /// Overwrite both share counts. Trade-engine use only.
    ///
    /// Fails with the state unchanged unless the market is OPEN and both
    /// counts are non-negative and finite.
    pub fn set_shares(&mut self, q_yes: f64, q_no: f64) -> Result<()> {
        if self.status != MarketStatus::Open {
            return Err(EngineError::IllegalState(format!(
                "cannot modify shares of non-open market {}",
                self.market_id
            )));
        }
        if !(q_yes >= 0.0) || !q_yes.is_finite() || !(q_no >= 0.0) || !q_no.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "share counts must be non-negative and finite, got ({q_yes}, {q_no})"
            )));
        }
        self.q_yes = q_yes;
        self.q_no = q_no;
        Ok(())
    }

    /// Add `delta` shares to one side. Trade-engine use only.
    pub fn apply_shares(&mut self, outcome: Outcome, delta: f64) -> Result<()> {
        if !(delta > 0.0) || !delta.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "share delta must be positive and finite, got {delta}"
            )));
        }
        match outcome {
            Outcome::Yes => self.set_shares(self.q_yes + delta, self.q_no),
            Outcome::No => self.set_shares(self.q_yes, self.q_no + delta),
        }
    }

    /// Transition OPEN -> RESOLVED with the winning outcome. Irreversible.
    pub fn resolve(&mut self, outcome: Outcome) -> Result<()> {
        if self.status == MarketStatus::Resolved {
            return Err(EngineError::IllegalState(format!(
                "market {} already resolved",
                self.market_id
            )));
        }
        self.status = MarketStatus::Resolved;
        self.resolved_outcome = Some(outcome);
        Ok(())
    }

    /// Structural invariant check, run when a loaded market is admitted.
    pub fn validate(&self) -> Result<()> {
        if self.market_id.trim().is_empty() {
            return Err(EngineError::Structural(
                "market id cannot be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::Structural(format!(
                "market {} has an empty name",
                self.market_id
            )));
        }
        if !(self.b > 0.0) || !self.b.is_finite() {
            return Err(EngineError::Structural(format!(
                "market {} has invalid liquidity {}",
                self.market_id, self.b
            )));
        }
        if !(self.q_yes >= 0.0) || !self.q_yes.is_finite() || !(self.q_no >= 0.0)
            || !self.q_no.is_finite()
        {
            return Err(EngineError::Structural(format!(
                "market {} has invalid share counts ({}, {})",
                self.market_id, self.q_yes, self.q_no
            )));
        }
        match (self.status, self.resolved_outcome) {
            (MarketStatus::Open, Some(_)) => Err(EngineError::Structural(format!(
                "open market {} carries a resolved outcome",
                self.market_id
            ))),
            (MarketStatus::Resolved, None) => Err(EngineError::Structural(format!(
                "resolved market {} has no resolved outcome",
                self.market_id
            ))),
            _ => Ok(()),
        }
    }
}
