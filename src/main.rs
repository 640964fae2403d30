//! Nieuwsmonitor — Binary Entrypoint
//! One-shot ingestion run: load config and rules, fetch and filter the
//! configured feeds, write the selection to the remote news table.

use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nieuwsmonitor::{
    config::{FeedConfig, StoreSettings},
    pipeline::{self, HttpFetcher},
    rules::RuleSet,
    store::StoreClient,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nieuwsmonitor=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the vars come from the host env.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = FeedConfig::load_default()?;
    let rules = RuleSet::load()?;
    let settings = StoreSettings::from_env()?;
    let store = StoreClient::new(&settings)?;
    let fetcher = HttpFetcher::new()?;

    let report = pipeline::run_once(&fetcher, &store, &config, &rules, Utc::now()).await?;
    tracing::info!(
        table = %report.table,
        feeds_ok = report.feeds_ok,
        items_parsed = report.items_parsed,
        candidates = report.candidates,
        inserted = report.inserted,
        "nieuwsmonitor run klaar"
    );
    Ok(())
}
