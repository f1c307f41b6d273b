//! Settlement engine.
//!
//! After a market resolves, every winning share pays exactly one unit. This
//! is the dual of the LMSR cost function: total payouts equal the costs
//! collected plus the maker's bounded subsidy of `b * ln 2`. The only place
//! that pays out, and it never pays a settled position twice.

use crate::error::{EngineError, Result};
use crate::lmsr::{self, Outcome};
use crate::market::{Market, MarketStatus};
use crate::user::User;

/// Settle every holder of a position in `market`.
///
/// Users without a position, and positions already settled, are skipped, so
/// the sweep is idempotent over the user collection. Returns the number of
/// positions settled by this call.
pub fn settle_market<'a, I>(market: &Market, users: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a mut User>,
{
    let outcome = validate_resolved(market)?;

    let mut settled = 0;
    for user in users {
        let Some(position) = user.position(market.market_id()) else {
            continue;
        };
        if position.is_settled() {
            continue;
        }
        settle_position(user, market, outcome)?;
        settled += 1;
    }
    Ok(settled)
}

/// Settle a single user. Strict variant: the position must exist and must
/// not already be settled.
pub fn settle_user(user: &mut User, market: &Market) -> Result<()> {
    let outcome = validate_resolved(market)?;

    let position = user.position(market.market_id()).ok_or_else(|| {
        EngineError::InvalidInput(format!(
            "user {} has no position in market {}",
            user.user_id(),
            market.market_id()
        ))
    })?;
    if position.is_settled() {
        return Err(EngineError::IllegalState(format!(
            "position of user {} in market {} already settled",
            user.user_id(),
            market.market_id()
        )));
    }
    settle_position(user, market, outcome)
}

fn validate_resolved(market: &Market) -> Result<Outcome> {
    if market.status() != MarketStatus::Resolved {
        return Err(EngineError::IllegalState(format!(
            "market {} must be resolved before settlement, current status: {}",
            market.market_id(),
            market.status()
        )));
    }
    market.resolved_outcome().ok_or_else(|| {
        EngineError::IllegalState(format!(
            "market {} is resolved but has no resolved outcome",
            market.market_id()
        ))
    })
}

fn settle_position(user: &mut User, market: &Market, outcome: Outcome) -> Result<()> {
    let winning_shares = user
        .position(market.market_id())
        .map(|p| p.shares_for(outcome))
        .unwrap_or(0.0);

    // Each winning share pays exactly 1 unit.
    let payout = lmsr::to_money(winning_shares)?;
    let new_balance = user.balance() + payout;

    user.set_balance(new_balance)?;
    let position = user.get_or_create_position(market.market_id());
    position.clear_shares();
    position.mark_settled()
}
