//! Process-wide in-memory stores.
//!
//! The authoritative read path: rebuilt at boot from the persistence layer
//! and mutated in place thereafter. Every object is validated before it is
//! admitted, so malformed state fails fast at the boundary. Ordered maps
//! keep snapshot output deterministic.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::market::Market;
use crate::user::User;

#[derive(Debug, Default)]
pub struct MarketStore {
    markets: BTreeMap<String, Market>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a market, validating it first.
    pub fn insert(&mut self, market: Market) -> Result<()> {
        market.validate()?;
        self.markets.insert(market.market_id().to_string(), market);
        Ok(())
    }

    pub fn get(&self, market_id: &str) -> Option<&Market> {
        self.markets.get(market_id)
    }

    pub fn get_mut(&mut self, market_id: &str) -> Option<&mut Market> {
        self.markets.get_mut(market_id)
    }

    pub fn contains(&self, market_id: &str) -> bool {
        self.markets.contains_key(market_id)
    }

    /// Whether any market already uses this name, compared case-insensitively.
    pub fn name_exists(&self, name: &str) -> bool {
        self.markets
            .values()
            .any(|m| m.name().eq_ignore_ascii_case(name))
    }

    pub fn values(&self) -> impl Iterator<Item = &Market> + '_ {
        self.markets.values()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct UserStore {
    users: BTreeMap<String, User>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a user, validating first.
    pub fn insert(&mut self, user: User) -> Result<()> {
        user.validate()?;
        self.users.insert(user.user_id().to_string(), user);
        Ok(())
    }

    pub fn get(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut User> {
        self.users.get_mut(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// Whether any user already has this id, compared case-insensitively.
    pub fn contains_ignore_case(&self, user_id: &str) -> bool {
        self.users
            .keys()
            .any(|id| id.eq_ignore_ascii_case(user_id))
    }

    pub fn values(&self) -> impl Iterator<Item = &User> + '_ {
        self.users.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut User> + '_ {
        self.users.values_mut()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
