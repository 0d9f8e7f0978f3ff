mod analyzer;
mod api;
mod config;
mod db;
mod discovery;
mod error;
mod sources;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analyzer::{AnalyzerConfig, DealAnalyzer};
use crate::api::{router, ApiState, LatencyStats};
use crate::config::Config;
use crate::db::{DealStore, SqliteDealStore};
use crate::discovery::{DiscoveryManager, DiscoveryScheduler};
use crate::error::Result;
use crate::sources::{build_adapters, HttpPageFetcher, PageFetcher};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    let store: Arc<dyn DealStore> = Arc::new(SqliteDealStore::new(pool));

    // --- Adapters ---
    let latency = Arc::new(LatencyStats::new());
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(Arc::clone(&latency))?);
    let adapters = build_adapters(&cfg.sources, fetcher, &cfg.scrape)?;
    if adapters.is_empty() {
        warn!("No discovery sources registered. Example: DISCOVERY_SOURCES=amazon,bestbuy,walmart");
    }
    info!(
        "Registered {} adapters: {}",
        adapters.len(),
        adapters
            .iter()
            .map(|a| a.retailer_name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    // --- Analyzer + orchestrator ---
    let analyzer = DealAnalyzer::new(AnalyzerConfig::from_config(&cfg), Arc::clone(&store));
    info!(
        "Analyzer window: price ${:.2}-${:.2}, min discount {}%",
        analyzer.config().min_price,
        analyzer.config().max_price,
        analyzer.config().min_discount,
    );
    let manager = Arc::new(DiscoveryManager::new(adapters, analyzer, store));

    // --- Scheduler (background) ---
    if cfg.discovery_interval_secs > 0 {
        let scheduler = DiscoveryScheduler::new(
            Arc::clone(&manager),
            Duration::from_secs(cfg.discovery_interval_secs),
            cfg.discovery_on_startup,
        );
        tokio::spawn(async move { scheduler.run().await });
    } else {
        info!("Scheduled discovery disabled (DISCOVERY_INTERVAL_SECS=0)");
        if cfg.discovery_on_startup {
            let startup = Arc::clone(&manager);
            tokio::spawn(async move {
                startup.run_discovery().await;
            });
        }
    }

    // --- HTTP API server ---
    let app = router(ApiState { manager, latency });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
