//! The typed operation surface over the whole engine.
//!
//! `PredictionMarket` owns the in-memory stores, the trade log, and the
//! persistence coordinator, and is the single entry point collaborators use.
//! Every mutating operation takes `&mut self`; the exclusive borrow is the
//! concurrency contract, serializing trades, resolutions, and settlement.
//! Each operation commits in memory first, then persists; a failed snapshot
//! write surfaces as a durability error without rolling memory back.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::lmsr::{self, Outcome};
use crate::market::{Market, MarketStatus};
use crate::persistence::{PersistenceBackend, PersistenceCoordinator};
use crate::settlement;
use crate::store::{MarketStore, UserStore};
use crate::trade::{self, Trade};
use crate::user::User;

/// Public projection of a market. Share counts and liquidity stay internal.
#[derive(Debug, Clone, Serialize)]
pub struct MarketView {
    pub market_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: MarketStatus,
    pub resolved_outcome: Option<Outcome>,
}

impl MarketView {
    fn from_market(market: &Market) -> Self {
        Self {
            market_id: market.market_id().to_string(),
            name: market.name().to_string(),
            description: market.description().map(str::to_string),
            status: market.status(),
            resolved_outcome: market.resolved_outcome(),
        }
    }
}

/// Public projection of a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub user_id: String,
}

/// A user's holdings in one market, as exposed to the user themselves.
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub market_id: String,
    pub yes_shares: f64,
    pub no_shares: f64,
    pub settled: bool,
}

/// The "me" projection: balance and positions included.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: String,
    pub balance: Decimal,
    pub positions: Vec<PositionView>,
}

/// The in-process prediction market: stores, engines, and persistence.
pub struct PredictionMarket {
    config: Config,
    markets: MarketStore,
    users: UserStore,
    trades: Vec<Trade>,
    coordinator: PersistenceCoordinator,
}

impl PredictionMarket {
    /// Boot from durable state: load, validate, run referential checks.
    pub fn load(config: Config, backend: Box<dyn PersistenceBackend>) -> Result<Self> {
        let coordinator = PersistenceCoordinator::new(backend);
        let mut markets = MarketStore::new();
        let mut users = UserStore::new();
        let trades = coordinator.load_into(&mut markets, &mut users)?;
        Ok(Self {
            config,
            markets,
            users,
            trades,
            coordinator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ---------------------------------------------------------------
    // Markets
    // ---------------------------------------------------------------

    /// Create an OPEN market. Names are unique, compared case-insensitively.
    pub fn create_market(
        &mut self,
        name: &str,
        description: Option<String>,
        liquidity: f64,
    ) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput(
                "market name cannot be empty".to_string(),
            ));
        }
        if self.markets.name_exists(name) {
            return Err(EngineError::DuplicateName(name.to_string()));
        }

        let market_id = Uuid::new_v4().to_string();
        let market = Market::new(market_id.as_str(), name, description, liquidity)?;
        self.markets.insert(market)?;
        self.persist()?;
        info!(market_id = %market_id, name, "market created");
        Ok(market_id)
    }

    pub fn list_markets(&self, filter: Option<MarketStatus>) -> Vec<MarketView> {
        self.markets
            .values()
            .filter(|m| filter.map_or(true, |status| m.status() == status))
            .map(MarketView::from_market)
            .collect()
    }

    pub fn get_market(&self, market_id: &str) -> Result<MarketView> {
        self.markets
            .get(market_id)
            .map(MarketView::from_market)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))
    }

    /// Current `(P(YES), P(NO))` for a market.
    pub fn market_prices(&self, market_id: &str) -> Result<(f64, f64)> {
        self.markets
            .get(market_id)
            .map(Market::prices)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))
    }

    /// Declare the winning outcome and settle every holder.
    pub fn resolve_market(&mut self, market_id: &str, outcome: Outcome) -> Result<()> {
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))?;
        market.resolve(outcome)?;

        let market = self
            .markets
            .get(market_id)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))?;
        let settled = settlement::settle_market(market, self.users.values_mut())?;
        info!(market_id, %outcome, settled, "market resolved and settled");

        self.persist()
    }

    // ---------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------

    /// Create a user with the configured starting balance.
    pub fn create_user(&mut self, user_id: &str) -> Result<()> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(EngineError::InvalidInput(
                "user id cannot be empty".to_string(),
            ));
        }
        if self.users.contains_ignore_case(user_id) {
            return Err(EngineError::DuplicateUser(user_id.to_string()));
        }
        let user = User::with_balance(user_id, self.config.market.starting_balance)?;
        self.users.insert(user)?;
        self.persist()
    }

    pub fn list_users(&self) -> Vec<UserView> {
        self.users
            .values()
            .map(|u| UserView {
                user_id: u.user_id().to_string(),
            })
            .collect()
    }

    pub fn get_user(&self, user_id: &str) -> Result<UserSummary> {
        let user = self
            .users
            .get(user_id)
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;
        Ok(UserSummary {
            user_id: user.user_id().to_string(),
            balance: user.balance(),
            positions: user
                .positions()
                .values()
                .map(|p| PositionView {
                    market_id: p.market_id().to_string(),
                    yes_shares: p.yes_shares(),
                    no_shares: p.no_shares(),
                    settled: p.is_settled(),
                })
                .collect(),
        })
    }

    // ---------------------------------------------------------------
    // Trading
    // ---------------------------------------------------------------

    /// Budget trade: spend `amount` on whatever quantity of `outcome` shares
    /// it buys at the current curve position.
    pub fn buy(
        &mut self,
        user_id: &str,
        market_id: &str,
        outcome: Outcome,
        amount: Decimal,
    ) -> Result<Trade> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "purchase amount must be positive, got {amount}"
            )));
        }

        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))?;
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;

        let shares = market.shares_for_amount(outcome, lmsr::from_money(amount)?);
        if shares <= 0.0 {
            return Err(EngineError::AmountTooSmall(amount));
        }

        let trade = trade::execute_trade(user, market, outcome, shares)?;
        self.trades.push(trade.clone());
        self.persist()?;
        Ok(trade)
    }

    /// Direct trade in share units.
    pub fn buy_shares(
        &mut self,
        user_id: &str,
        market_id: &str,
        outcome: Outcome,
        shares: f64,
    ) -> Result<Trade> {
        let market = self
            .markets
            .get_mut(market_id)
            .ok_or_else(|| EngineError::MarketNotFound(market_id.to_string()))?;
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))?;

        let trade = trade::execute_trade(user, market, outcome, shares)?;
        self.trades.push(trade.clone());
        self.persist()?;
        Ok(trade)
    }

    /// The committed trade log, in commit order.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn markets(&self) -> &MarketStore {
        &self.markets
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    fn persist(&self) -> Result<()> {
        self.coordinator
            .persist(&self.markets, &self.trades, &self.users)
    }
}
