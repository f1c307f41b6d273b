//! End-to-end scenarios across the whole engine stack:
//! pricing at the origin, budget buys, rejection atomicity, resolution,
//! settlement payouts and idempotence, and the durability round trip.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::{tempdir, TempDir};

use crate::config::Config;
use crate::engine::PredictionMarket;
use crate::error::EngineError;
use crate::lmsr::Outcome;
use crate::market::{Market, MarketStatus};
use crate::persistence::JsonFileBackend;
use crate::settlement;
use crate::user::User;

const LIQUIDITY: f64 = 100.0;

fn engine_with_balance(starting_balance: Decimal) -> (PredictionMarket, TempDir) {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.market.starting_balance = starting_balance;
    config.persistence.data_dir = dir.path().to_path_buf();
    let backend = JsonFileBackend::new(dir.path());
    let engine = PredictionMarket::load(config, Box::new(backend)).unwrap();
    (engine, dir)
}

fn fresh_engine() -> (PredictionMarket, TempDir) {
    engine_with_balance(dec!(1000.00))
}

#[test]
fn pricing_at_origin_is_even() {
    let (mut engine, _dir) = fresh_engine();
    let market_id = engine
        .create_market("Will it rain tomorrow?", None, LIQUIDITY)
        .unwrap();
    let (p_yes, p_no) = engine.market_prices(&market_id).unwrap();
    assert_eq!(p_yes, 0.5);
    assert_eq!(p_no, 0.5);
}

#[test]
fn single_budget_buy() {
    let (mut engine, _dir) = fresh_engine();
    let market_id = engine
        .create_market("Will it rain tomorrow?", None, LIQUIDITY)
        .unwrap();
    engine.create_user("alice").unwrap();

    let trade = engine
        .buy("alice", &market_id, Outcome::Yes, dec!(10.00))
        .unwrap();

    // 100 * ln(2 e^0.1 - 1) = 19.0904 shares for a 10-unit budget at even odds.
    assert!((trade.shares_bought() - 19.0904).abs() < 0.01);
    assert!((trade.cost() - dec!(10)).abs() < dec!(0.001));

    let alice = engine.get_user("alice").unwrap();
    assert!((alice.balance - dec!(990)).abs() < dec!(0.001));

    let market = engine.markets().get(&market_id).unwrap();
    assert!(market.q_yes() > 0.0);
    assert_eq!(market.q_no(), 0.0);
    let (p_yes, _) = engine.market_prices(&market_id).unwrap();
    assert!(p_yes > 0.5);
}

#[test]
fn insufficient_balance_leaves_no_trace() {
    let (mut engine, _dir) = engine_with_balance(dec!(1.00));
    let market_id = engine
        .create_market("Will it rain tomorrow?", None, LIQUIDITY)
        .unwrap();
    engine.create_user("alice").unwrap();

    let err = engine
        .buy("alice", &market_id, Outcome::Yes, dec!(500.00))
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance { .. }));

    let alice = engine.get_user("alice").unwrap();
    assert_eq!(alice.balance, dec!(1.00));
    assert!(alice.positions.is_empty());
    let market = engine.markets().get(&market_id).unwrap();
    assert_eq!(market.q_yes(), 0.0);
    assert_eq!(market.q_no(), 0.0);
    assert!(engine.trades().is_empty());
}

#[test]
fn resolved_market_rejects_trades() {
    let (mut engine, _dir) = fresh_engine();
    let market_id = engine
        .create_market("Will it rain tomorrow?", None, LIQUIDITY)
        .unwrap();
    engine.create_user("alice").unwrap();
    engine.resolve_market(&market_id, Outcome::Yes).unwrap();

    let err = engine
        .buy("alice", &market_id, Outcome::Yes, dec!(10.00))
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalState(_)));

    let market = engine.get_market(&market_id).unwrap();
    assert_eq!(market.status, MarketStatus::Resolved);
    assert_eq!(market.resolved_outcome, Some(Outcome::Yes));
    let inner = engine.markets().get(&market_id).unwrap();
    assert_eq!(inner.q_yes(), 0.0);
    assert_eq!(inner.q_no(), 0.0);
}

#[test]
fn settlement_pays_winners_at_face_value() {
    let mut market = Market::new("m-1", "Will it rain tomorrow?", None, LIQUIDITY).unwrap();
    let mut u1 = User::with_balance("u1", dec!(100.00)).unwrap();
    let mut u2 = User::with_balance("u2", dec!(100.00)).unwrap();
    u1.get_or_create_position("m-1").set_yes_shares(25.0).unwrap();
    u2.get_or_create_position("m-1").set_no_shares(25.0).unwrap();

    market.resolve(Outcome::Yes).unwrap();
    settlement::settle_market(&market, [&mut u1, &mut u2]).unwrap();

    assert_eq!(u1.balance(), dec!(125.00));
    assert_eq!(u2.balance(), dec!(100.00));
    for user in [&u1, &u2] {
        let position = user.position("m-1").unwrap();
        assert!(position.is_settled());
        assert_eq!(position.yes_shares(), 0.0);
        assert_eq!(position.no_shares(), 0.0);
    }
}

#[test]
fn settlement_is_idempotent_over_the_user_list() {
    let mut market = Market::new("m-1", "Will it rain tomorrow?", None, LIQUIDITY).unwrap();
    let mut u1 = User::with_balance("u1", dec!(100.00)).unwrap();
    let mut u2 = User::with_balance("u2", dec!(100.00)).unwrap();
    u1.get_or_create_position("m-1").set_yes_shares(25.0).unwrap();
    u2.get_or_create_position("m-1").set_no_shares(25.0).unwrap();
    market.resolve(Outcome::Yes).unwrap();

    settlement::settle_market(&market, [&mut u1, &mut u2]).unwrap();
    let settled_again = settlement::settle_market(&market, [&mut u1, &mut u2]).unwrap();

    assert_eq!(settled_again, 0);
    assert_eq!(u1.balance(), dec!(125.00));
    assert_eq!(u2.balance(), dec!(100.00));
}

#[test]
fn durability_round_trip() {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.persistence.data_dir = dir.path().to_path_buf();

    let resolved_id;
    let open_id;
    let alice_balance;
    {
        let backend = JsonFileBackend::new(dir.path());
        let mut engine = PredictionMarket::load(config.clone(), Box::new(backend)).unwrap();
        engine.create_user("alice").unwrap();
        engine.create_user("bob").unwrap();

        resolved_id = engine
            .create_market("Will it rain tomorrow?", None, LIQUIDITY)
            .unwrap();
        open_id = engine
            .create_market("Will it snow this year?", Some("alpine".into()), LIQUIDITY)
            .unwrap();

        engine
            .buy("alice", &resolved_id, Outcome::Yes, dec!(25.00))
            .unwrap();
        engine
            .buy("bob", &resolved_id, Outcome::No, dec!(10.00))
            .unwrap();
        engine
            .buy("alice", &open_id, Outcome::No, dec!(5.00))
            .unwrap();
        engine.resolve_market(&resolved_id, Outcome::Yes).unwrap();

        alice_balance = engine.get_user("alice").unwrap().balance;
        // engine dropped here; only the snapshot survives
    }

    let backend = JsonFileBackend::new(dir.path());
    let mut reloaded = PredictionMarket::load(config, Box::new(backend)).unwrap();

    // Balances, share counts, and outcomes are identical to pre-save values.
    assert_eq!(reloaded.get_user("alice").unwrap().balance, alice_balance);
    let resolved = reloaded.get_market(&resolved_id).unwrap();
    assert_eq!(resolved.status, MarketStatus::Resolved);
    assert_eq!(resolved.resolved_outcome, Some(Outcome::Yes));
    assert_eq!(reloaded.trades().len(), 3);

    let open_market = reloaded.markets().get(&open_id).unwrap();
    assert!(open_market.q_no() > 0.0);
    let alice_open_position = reloaded
        .get_user("alice")
        .unwrap()
        .positions
        .into_iter()
        .find(|p| p.market_id == open_id)
        .unwrap();
    assert!(alice_open_position.no_shares > 0.0);
    assert!(!alice_open_position.settled);

    // Resolved markets still reject trades, open ones still take them.
    assert!(matches!(
        reloaded.buy("bob", &resolved_id, Outcome::Yes, dec!(1.00)),
        Err(EngineError::IllegalState(_))
    ));
    reloaded
        .buy("bob", &open_id, Outcome::Yes, dec!(1.00))
        .unwrap();
}

#[test]
fn duplicate_names_and_users_are_rejected() {
    let (mut engine, _dir) = fresh_engine();
    engine
        .create_market("Will It Rain Tomorrow?", None, LIQUIDITY)
        .unwrap();
    assert!(matches!(
        engine.create_market("will it rain tomorrow?", None, LIQUIDITY),
        Err(EngineError::DuplicateName(_))
    ));

    engine.create_user("Alice").unwrap();
    assert!(matches!(
        engine.create_user("alice"),
        Err(EngineError::DuplicateUser(_))
    ));
    assert_eq!(engine.list_users().len(), 1);
}

#[test]
fn unknown_ids_and_bad_inputs_map_to_their_error_kinds() {
    let (mut engine, _dir) = fresh_engine();
    let market_id = engine
        .create_market("Will it rain tomorrow?", None, LIQUIDITY)
        .unwrap();
    engine.create_user("alice").unwrap();

    assert!(matches!(
        engine.get_market("nope"),
        Err(EngineError::MarketNotFound(_))
    ));
    assert!(matches!(
        engine.buy("nobody", &market_id, Outcome::Yes, dec!(1)),
        Err(EngineError::UserNotFound(_))
    ));
    assert!(matches!(
        engine.buy("alice", "nope", Outcome::Yes, dec!(1)),
        Err(EngineError::MarketNotFound(_))
    ));
    assert!(matches!(
        engine.buy("alice", &market_id, Outcome::Yes, dec!(0)),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.create_market("", None, LIQUIDITY),
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.create_market("negative b", None, -1.0),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn list_markets_filters_by_status() {
    let (mut engine, _dir) = fresh_engine();
    let open_id = engine.create_market("open one", None, LIQUIDITY).unwrap();
    let resolved_id = engine
        .create_market("resolved one", None, LIQUIDITY)
        .unwrap();
    engine.resolve_market(&resolved_id, Outcome::No).unwrap();

    let open = engine.list_markets(Some(MarketStatus::Open));
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].market_id, open_id);

    let resolved = engine.list_markets(Some(MarketStatus::Resolved));
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].market_id, resolved_id);

    assert_eq!(engine.list_markets(None).len(), 2);
}

#[test]
fn resolution_settles_every_holder_through_the_engine() {
    let (mut engine, _dir) = fresh_engine();
    let market_id = engine
        .create_market("Will it rain tomorrow?", None, LIQUIDITY)
        .unwrap();
    engine.create_user("alice").unwrap();
    engine.create_user("bob").unwrap();

    let alice_trade = engine
        .buy("alice", &market_id, Outcome::Yes, dec!(20.00))
        .unwrap();
    let bob_trade = engine
        .buy("bob", &market_id, Outcome::No, dec!(20.00))
        .unwrap();

    engine.resolve_market(&market_id, Outcome::Yes).unwrap();

    let alice = engine.get_user("alice").unwrap();
    let bob = engine.get_user("bob").unwrap();

    // Winner: starting balance - cost + 1 per share. Loser: just - cost.
    let expected_alice = dec!(1000.00) - alice_trade.cost()
        + crate::lmsr::to_money(alice_trade.shares_bought()).unwrap();
    assert_eq!(alice.balance, expected_alice);
    assert_eq!(bob.balance, dec!(1000.00) - bob_trade.cost());

    for summary in [alice, bob] {
        assert_eq!(summary.positions.len(), 1);
        assert!(summary.positions[0].settled);
        assert_eq!(summary.positions[0].yes_shares, 0.0);
        assert_eq!(summary.positions[0].no_shares, 0.0);
    }
}
