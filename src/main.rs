use anyhow::Result;

use lmsr_engine::config::Config;
use lmsr_engine::engine::PredictionMarket;
use lmsr_engine::persistence::JsonFileBackend;

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter("info,lmsr_engine=debug")
        .init();

    println!("🦀 Starting market engine...");

    let config = Config::from_env();
    config.print_config();

    let backend = JsonFileBackend::new(config.persistence.data_dir.clone());
    let engine = PredictionMarket::load(config, Box::new(backend))?;

    println!(
        "State loaded: {} markets, {} users, {} trades.",
        engine.markets().len(),
        engine.users().len(),
        engine.trades().len()
    );

    for view in engine.list_markets(None) {
        let (p_yes, p_no) = engine.market_prices(&view.market_id)?;
        println!(
            "  {} [{}] P(YES)={:.4} P(NO)={:.4}",
            view.name, view.status, p_yes, p_no
        );
    }

    Ok(())
}
