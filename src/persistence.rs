//! Persistence: backend contract, JSON snapshot backend, and the coordinator
//! that keeps the in-memory stores and durable storage in step.
//!
//! Writes are atomic per collection: each file is written to a temp location
//! in the same directory and renamed into place, so a crash mid-write leaves
//! the previous snapshot intact. Reads on boot fail fast on malformed state;
//! the only repair performed is dropping stray references, with a warning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::market::Market;
use crate::store::{MarketStore, UserStore};
use crate::trade::Trade;
use crate::user::User;

const MARKETS_FILE: &str = "markets.json";
const USERS_FILE: &str = "users.json";
const TRADES_FILE: &str = "trades.json";

/// Everything the durable backend holds.
#[derive(Debug, Default)]
pub struct PersistedState {
    pub markets: Vec<Market>,
    pub users: Vec<User>,
    pub trades: Vec<Trade>,
}

/// Contract the engine consumes from its storage collaborator.
pub trait PersistenceBackend {
    /// Load every collection. Missing storage means empty collections;
    /// unreadable or unparsable storage is a structural error.
    fn load_all(&self) -> Result<PersistedState>;

    /// Write every collection, atomically per collection.
    fn save_all(&self, markets: &[&Market], trades: &[Trade], users: &[&User]) -> Result<()>;
}

/// Snapshot backend: one flat JSON array per collection under a data dir.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    data_dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    fn load_collection<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.file(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path).map_err(|e| {
            EngineError::Structural(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::Structural(format!("failed to parse {}: {e}", path.display()))
        })
    }

    fn save_collection<T: Serialize + ?Sized>(&self, name: &str, items: &T) -> Result<()> {
        let durability =
            |e: String| EngineError::Durability(format!("failed to write {name}: {e}"));

        fs::create_dir_all(&self.data_dir).map_err(|e| durability(e.to_string()))?;
        let tmp =
            NamedTempFile::new_in(&self.data_dir).map_err(|e| durability(e.to_string()))?;
        serde_json::to_writer_pretty(tmp.as_file(), items)
            .map_err(|e| durability(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| durability(e.to_string()))?;
        tmp.persist(self.file(name))
            .map_err(|e| durability(e.to_string()))?;
        Ok(())
    }
}

impl PersistenceBackend for JsonFileBackend {
    fn load_all(&self) -> Result<PersistedState> {
        Ok(PersistedState {
            markets: self.load_collection(MARKETS_FILE)?,
            users: self.load_collection(USERS_FILE)?,
            trades: self.load_collection(TRADES_FILE)?,
        })
    }

    fn save_all(&self, markets: &[&Market], trades: &[Trade], users: &[&User]) -> Result<()> {
        self.save_collection(MARKETS_FILE, markets)?;
        self.save_collection(TRADES_FILE, trades)?;
        self.save_collection(USERS_FILE, users)?;
        Ok(())
    }
}

/// Loads the stores at boot and writes snapshots after every successful
/// mutation. Owns the backend; never rolls back memory on a write failure.
pub struct PersistenceCoordinator {
    backend: Box<dyn PersistenceBackend>,
}

impl PersistenceCoordinator {
    pub fn new(backend: Box<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }

    /// Populate the stores from durable state and run referential checks.
    ///
    /// Positions referencing an unknown market and trades whose user or
    /// market does not resolve are dropped with a warning; everything else
    /// that fails validation aborts the load.
    pub fn load_into(
        &self,
        markets: &mut MarketStore,
        users: &mut UserStore,
    ) -> Result<Vec<Trade>> {
        let state = self.backend.load_all()?;

        for market in state.markets {
            markets.insert(market)?;
        }
        for user in state.users {
            users.insert(user)?;
        }

        for user in users.values_mut() {
            let stray: Vec<String> = user
                .positions()
                .keys()
                .filter(|market_id| !markets.contains(market_id))
                .cloned()
                .collect();
            for market_id in stray {
                warn!(
                    user_id = %user.user_id(),
                    market_id = %market_id,
                    "dropping position referencing unknown market"
                );
                user.remove_position(&market_id);
            }
        }

        let mut trades = Vec::new();
        for trade in state.trades {
            trade.validate()?;
            if !users.contains(trade.user_id()) {
                warn!(trade_id = %trade.trade_id(), user_id = %trade.user_id(),
                    "dropping trade referencing unknown user");
                continue;
            }
            if !markets.contains(trade.market_id()) {
                warn!(trade_id = %trade.trade_id(), market_id = %trade.market_id(),
                    "dropping trade referencing unknown market");
                continue;
            }
            trades.push(trade);
        }

        info!(
            markets = markets.len(),
            users = users.len(),
            trades = trades.len(),
            "state loaded"
        );
        Ok(trades)
    }

    /// Write all collections back. Called after the in-memory commit; a
    /// failure here surfaces as a durability error to the caller.
    pub fn persist(
        &self,
        markets: &MarketStore,
        trades: &[Trade],
        users: &UserStore,
    ) -> Result<()> {
        let markets: Vec<&Market> = markets.values().collect();
        let users: Vec<&User> = users.values().collect();
        self.backend.save_all(&markets, trades, &users)
    }
}
