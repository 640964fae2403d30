// src/pipeline.rs
//! One run of the ingestion pipeline: fetch each configured feed
//! sequentially, normalize and classify every item, score the keepers,
//! dedupe, select the top N and hand the batch to the adaptive writer.
//! A failing feed contributes zero items; only store and configuration
//! errors abort the run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::classify::{self, classify};
use crate::config::FeedConfig;
use crate::feed::{self, RawItem};
use crate::normalize::{clean, truncate_chars};
use crate::rules::RuleSet;
use crate::score;
use crate::select::{select_top, CandidateItem, RunContext};
use crate::store::StoreClient;

/// Seam for feed retrieval so tests can swap in canned payloads.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(25))
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await.context("feed http get")?;
        let resp = resp.error_for_status().context("feed http status")?;
        resp.text().await.context("feed http body")
    }
}

/// What a completed run did; the only success signal besides logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub table: String,
    pub feeds_ok: usize,
    pub items_parsed: usize,
    pub candidates: usize,
    pub inserted: usize,
}

/// Execute one full ingestion run against the remote store.
pub async fn run_once(
    fetcher: &dyn FeedFetcher,
    store: &StoreClient,
    config: &FeedConfig,
    rules: &RuleSet,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let table = store.pick_table().await?;
    let index = store.fetch_dedup_index(table).await?;
    let known_columns = index.known_columns;

    let mut ctx = RunContext::new(now, config.defaults.freshness.max_age_days);
    ctx.seed_known(index.urls, index.titles);

    let mut candidates: Vec<CandidateItem> = Vec::new();
    let mut feeds_ok = 0usize;
    let mut items_parsed = 0usize;

    for (agent, agent_cfg) in &config.agents {
        for spec in &agent_cfg.feeds {
            let name = spec.display_name();
            let body = match fetcher.fetch(&spec.url).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = ?e, feed = %spec.url, "feed fetch failed, skipping");
                    continue;
                }
            };
            let items = match feed::parse_feed(&body, &name, spec.weight(), agent) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = ?e, feed = %spec.url, "feed parse failed, skipping");
                    continue;
                }
            };
            feeds_ok += 1;
            items_parsed += items.len();

            for item in items {
                if let Some(c) =
                    consider_item(rules, &mut ctx, config.defaults.freshness.max_age_days, item)
                {
                    candidates.push(c);
                }
            }
        }
    }

    let candidate_count = candidates.len();
    let top = select_top(candidates, config.defaults.max_items_per_run);
    if top.is_empty() {
        tracing::info!("geen nieuwe items om te inserten");
        return Ok(RunReport {
            table: table.to_string(),
            feeds_ok,
            items_parsed,
            candidates: candidate_count,
            inserted: 0,
        });
    }

    let rows: Vec<Map<String, Value>> = top.iter().map(to_row).collect();
    let inserted = store.insert_adaptive(table, rows, &known_columns).await?;
    tracing::info!(inserted, table, "insert afgerond");

    Ok(RunReport {
        table: table.to_string(),
        feeds_ok,
        items_parsed,
        candidates: candidate_count,
        inserted,
    })
}

/// Take one raw item through freshness, dedup, classification and
/// scoring. Acceptance registers the dedup keys and the source counter
/// immediately, so later duplicates and over-cap items fall out in
/// discovery order.
fn consider_item(
    rules: &RuleSet,
    ctx: &mut RunContext,
    max_age_days: i64,
    item: RawItem,
) -> Option<CandidateItem> {
    let title = item.title.as_deref().unwrap_or("").trim().to_string();
    let source_url = item.source_url.as_deref().unwrap_or("").trim().to_string();
    if title.is_empty() || source_url.is_empty() {
        return None;
    }

    let published_at = item
        .published_at_src
        .as_deref()
        .and_then(feed::parse_pub_date);
    if !ctx.is_fresh(published_at) {
        return None;
    }

    let url_key = source_url.to_lowercase();
    let title_key = title.to_lowercase();
    if ctx.is_duplicate(&url_key, &title_key) {
        return None;
    }

    let clean_summary = clean(item.summary.as_deref().unwrap_or(""));
    let verdict = classify(
        rules,
        ctx,
        &item.agent,
        &title,
        &clean_summary,
        &item.source_name,
    );
    if !verdict.keep {
        tracing::debug!(
            title = %title,
            agent = %item.agent,
            reason = %verdict.reason,
            "item afgewezen"
        );
        return None;
    }

    let relevance = score::relevance(item.weight, published_at, ctx.now, max_age_days);
    let reason = score::reason_line(rules, &item.agent, &item.source_name, relevance, &verdict.reason);
    let merged = score::merge_summary(&clean_summary, &reason);

    let candidate = CandidateItem {
        title: truncate_chars(&title, 500),
        summary: truncate_chars(&merged, 3000),
        body: truncate_chars(&merged, 5000),
        source_url,
        source_name: item.source_name.clone(),
        topic: format!("{}|{}", item.agent, item.source_name),
        review_status: "pending".to_string(),
        relevance,
        tags: vec![item.agent],
        published_at: published_at.map(|dt| dt.to_rfc3339()),
    };

    ctx.register(&url_key, &title_key, &classify::source_key(&candidate.source_name));
    Some(candidate)
}

fn to_row(c: &CandidateItem) -> Map<String, Value> {
    match serde_json::to_value(c) {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    }
}
