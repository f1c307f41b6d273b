//! Randomized end-to-end simulation harness.
//!
//! Drives the full engine through a stream of budget trades, resolves every
//! market, then audits the financial invariants: non-negative balances,
//! normalized prices, the bounded maker subsidy, and conservation of money
//! across trading and settlement.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::engine::PredictionMarket;
use crate::error::{EngineError, Result};
use crate::lmsr::{self, Outcome};

/// Outcome of a simulation run.
#[derive(Debug)]
pub struct SimulationReport {
    pub users: usize,
    pub markets: usize,
    pub trades_executed: usize,
    pub trades_rejected: usize,
    pub total_cost: Decimal,
    pub total_payout: Decimal,
    pub elapsed_secs: f64,
}

impl SimulationReport {
    pub fn trades_per_sec(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.trades_executed as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Seed users and markets, trade at random, resolve everything, and audit.
pub fn run_simulation(
    engine: &mut PredictionMarket,
    num_users: usize,
    num_markets: usize,
    num_trades: usize,
    seed: u64,
) -> Result<SimulationReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let liquidity = engine.config().market.default_liquidity;
    let starting_balance = engine.config().market.starting_balance;

    let mut user_ids = Vec::with_capacity(num_users);
    for i in 0..num_users {
        let user_id = format!("trader-{i}");
        engine.create_user(&user_id)?;
        user_ids.push(user_id);
    }

    let mut market_ids = Vec::with_capacity(num_markets);
    for i in 0..num_markets {
        let market_id = engine.create_market(&format!("simulated market {i}"), None, liquidity)?;
        market_ids.push(market_id);
    }

    let start = Instant::now();
    let mut executed = 0usize;
    let mut rejected = 0usize;
    let mut total_cost = Decimal::ZERO;

    for _ in 0..num_trades {
        let user_id = &user_ids[rng.gen_range(0..user_ids.len())];
        let market_id = &market_ids[rng.gen_range(0..market_ids.len())];
        let outcome = if rng.gen_bool(0.5) {
            Outcome::Yes
        } else {
            Outcome::No
        };
        let amount = Decimal::from_f64(rng.gen_range(1.0..50.0))
            .unwrap_or(dec!(1))
            .round_dp(2);

        match engine.buy(user_id, market_id, outcome, amount) {
            Ok(trade) => {
                executed += 1;
                total_cost += trade.cost();
            }
            Err(EngineError::InsufficientBalance { .. }) | Err(EngineError::AmountTooSmall(_)) => {
                rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }
    let elapsed_secs = start.elapsed().as_secs_f64();

    for market_id in &market_ids {
        let outcome = if rng.gen_bool(0.5) {
            Outcome::Yes
        } else {
            Outcome::No
        };
        engine.resolve_market(market_id, outcome)?;
    }

    let total_payout = audit(engine, num_users, starting_balance, total_cost)?;

    info!(
        executed,
        rejected,
        elapsed_secs,
        "simulation finished, invariants verified"
    );

    Ok(SimulationReport {
        users: num_users,
        markets: num_markets,
        trades_executed: executed,
        trades_rejected: rejected,
        total_cost,
        total_payout,
        elapsed_secs,
    })
}

/// Check every financial invariant the run must preserve. Returns the total
/// payout credited at settlement.
fn audit(
    engine: &PredictionMarket,
    num_users: usize,
    starting_balance: Decimal,
    total_cost: Decimal,
) -> Result<Decimal> {
    let audit_err = |msg: String| EngineError::IllegalState(format!("simulation audit: {msg}"));

    let mut final_total = Decimal::ZERO;
    for user in engine.users().values() {
        if user.balance() < Decimal::ZERO {
            return Err(audit_err(format!(
                "user {} has negative balance {}",
                user.user_id(),
                user.balance()
            )));
        }
        final_total += user.balance();
    }

    // Every winning share pays 1, and all minted shares sit in positions, so
    // the payout per market equals its winning-side share count.
    let mut expected_payout = 0.0f64;
    for market in engine.markets().values() {
        let (p_yes, p_no) = market.prices();
        if (p_yes + p_no - 1.0).abs() > 1e-9 {
            return Err(audit_err(format!(
                "market {} prices do not normalize: {p_yes} + {p_no}",
                market.market_id()
            )));
        }

        let outcome = market.resolved_outcome().ok_or_else(|| {
            audit_err(format!("market {} never resolved", market.market_id()))
        })?;
        let winning_shares = match outcome {
            Outcome::Yes => market.q_yes(),
            Outcome::No => market.q_no(),
        };
        let collected: Decimal = engine
            .trades()
            .iter()
            .filter(|t| t.market_id() == market.market_id())
            .map(|t| t.cost())
            .sum();

        // Maker loss on this market is bounded by b * ln 2. The slack covers
        // the per-trade money rounding accumulated in `collected`.
        let loss = winning_shares - lmsr::from_money(collected)?;
        let bound = lmsr::max_subsidy(market.liquidity()) + 1e-4;
        if loss > bound {
            return Err(audit_err(format!(
                "market {} maker loss {loss} exceeds bound {bound}",
                market.market_id()
            )));
        }

        expected_payout += winning_shares;
    }

    // Conservation: final = initial - costs + payouts, up to one money
    // rounding per settled position.
    let initial_total = starting_balance * Decimal::from(num_users as u64);
    let total_payout = final_total - initial_total + total_cost;
    let expected = lmsr::to_money(expected_payout)?;
    let tolerance = dec!(0.0001) * Decimal::from(num_users as u64);
    if (total_payout - expected).abs() > tolerance {
        return Err(audit_err(format!(
            "money not conserved: credited {total_payout}, expected {expected}"
        )));
    }

    Ok(total_payout)
}
