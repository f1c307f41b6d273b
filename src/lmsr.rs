//! src/lmsr.rs
//! Numerically stable LMSR pricing kernel.
//!
//! Pure, stateless math over `(q_yes, q_no, b)`. Callers ensure arguments are
//! valid (`b > 0`, deltas `>= 0`); the kernel itself does not fail. The only
//! fallible pieces are the money-conversion helpers at the bottom, which form
//! the single f64 -> `Decimal` rounding boundary of the whole engine.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Bisection tolerance for [`shares_for_amount`], in shares.
pub const SHARES_EPSILON: f64 = 1e-4;

/// Fixed-point scale for balances and trade costs.
pub const MONEY_SCALE: u32 = 8;

/// One of the two sides of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }

    /// The opposite side.
    pub fn other(&self) -> Outcome {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl FromStr for Outcome {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "YES" => Ok(Outcome::Yes),
            "NO" => Ok(Outcome::No),
            _ => Err(EngineError::InvalidInput(format!(
                "unknown outcome '{s}', expected YES or NO"
            ))),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------
// Numerically stable math
// -----------------------

/// `ln(e^a + e^b)` with the maximum factored out so large share counts do
/// not overflow.
#[inline]
pub fn log_sum_exp(a: f64, b: f64) -> f64 {
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// LMSR cost function `C(q) = b * ln(e^(q_yes/b) + e^(q_no/b))`.
#[inline]
pub fn cost(q_yes: f64, q_no: f64, b: f64) -> f64 {
    assert!(b > 0.0 && b.is_finite(), "liquidity parameter b invalid");
    b * log_sum_exp(q_yes / b, q_no / b)
}

/// Marginal YES price, `e^(q_yes/b) / (e^(q_yes/b) + e^(q_no/b))`.
///
/// Exactly `0.5` at the origin; strictly inside `(0, 1)` for finite shares.
#[inline]
pub fn price_yes(q_yes: f64, q_no: f64, b: f64) -> f64 {
    let a = q_yes / b;
    let c = q_no / b;
    let m = a.max(c);
    let ey = (a - m).exp();
    let en = (c - m).exp();
    ey / (ey + en)
}

/// Marginal NO price, the complement of [`price_yes`].
#[inline]
pub fn price_no(q_yes: f64, q_no: f64, b: f64) -> f64 {
    1.0 - price_yes(q_yes, q_no, b)
}

/// Cost to buy `delta` shares of `outcome`: `C(q + delta*e_o) - C(q)`.
///
/// Strictly positive and strictly increasing for `delta > 0`.
#[inline]
pub fn cost_to_buy(outcome: Outcome, q_yes: f64, q_no: f64, b: f64, delta: f64) -> f64 {
    let base = cost(q_yes, q_no, b);
    match outcome {
        Outcome::Yes => cost(q_yes + delta, q_no, b) - base,
        Outcome::No => cost(q_yes, q_no + delta, b) - base,
    }
}

/// The unique `delta >= 0` whose cost equals `amount`, found by bisection.
///
/// The initial bracket is `[0, 10 * amount]`, doubled while it still
/// undershoots; the search stops once the bracket is narrower than
/// [`SHARES_EPSILON`]. Monotonicity of the cost function guarantees a unique
/// root. Non-positive amounts map to `0.0`, which callers reject.
pub fn shares_for_amount(outcome: Outcome, q_yes: f64, q_no: f64, b: f64, amount: f64) -> f64 {
    if amount <= 0.0 || !amount.is_finite() {
        return 0.0;
    }

    let mut low = 0.0_f64;
    let mut high = 10.0 * amount;
    // Cost grows without bound in delta, so a few doublings always cover the
    // root even when the bracket starts under it.
    for _ in 0..64 {
        if cost_to_buy(outcome, q_yes, q_no, b, high) >= amount {
            break;
        }
        high *= 2.0;
    }

    while high - low > SHARES_EPSILON {
        let mid = 0.5 * (low + high);
        if cost_to_buy(outcome, q_yes, q_no, b, mid) < amount {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Worst-case market-maker loss, `b * ln(2)`.
pub fn max_subsidy(b: f64) -> f64 {
    b * std::f64::consts::LN_2
}

// -----------------------
// Money boundary
// -----------------------

/// Convert a kernel-computed amount to the exact money type.
///
/// This is the single controlled rounding point between curve coordinates
/// (f64) and money (`Decimal` at [`MONEY_SCALE`], banker's rounding).
pub fn to_money(x: f64) -> Result<Decimal> {
    if !x.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "non-finite monetary amount: {x}"
        )));
    }
    Decimal::from_f64(x)
        .map(|d| d.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven))
        .ok_or_else(|| EngineError::InvalidInput(format!("monetary amount out of range: {x}")))
}

/// Convert money back into kernel coordinates.
pub fn from_money(d: Decimal) -> Result<f64> {
    d.to_f64()
        .filter(|x| x.is_finite())
        .ok_or_else(|| EngineError::InvalidInput(format!("monetary amount not representable: {d}")))
}

// -----------------------
// Tests
// -----------------------
