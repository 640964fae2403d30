// src/store.rs
//! Supabase-style REST client: table probing, dedup-index seeding and
//! the schema-adaptive bulk insert. The dedup read doubles as a schema
//! snapshot (the union of row keys), so the writer can restrict rows to
//! known columns before the first POST; error-driven column drops remain
//! as the fallback for empty tables.

use anyhow::{bail, Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::StoreSettings;
use crate::normalize::truncate_chars;

/// Candidate table names, probed in priority order.
pub const TABLE_CANDIDATES: [&str; 3] = ["nieuws", "nieuws_items", "news_items"];

/// Maximum existing rows read to seed the dedup index.
const DEDUP_SEED_LIMIT: usize = 5000;

/// Total insert attempts before giving up on schema adaptation.
const MAX_INSERT_ATTEMPTS: usize = 8;

const ERROR_SNIPPET_CHARS: usize = 1200;

/// Seen-URL and seen-title keys from the remote table, plus the observed
/// column set of those rows.
#[derive(Debug, Default)]
pub struct DedupIndex {
    pub urls: HashSet<String>,
    pub titles: HashSet<String>,
    pub known_columns: HashSet<String>,
}

pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl StoreClient {
    pub fn new(settings: &StoreSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(25))
            .build()
            .context("building store http client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            service_key: settings.service_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn read(&self, table: &str, limit: usize) -> reqwest::RequestBuilder {
        self.http
            .get(self.table_url(table))
            .query(&[("select", "*"), ("limit", &limit.to_string())])
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    /// Resolve the news table by probing candidates in priority order.
    /// No responding candidate is a fatal configuration error; an
    /// unreachable store aborts the run.
    pub async fn pick_table(&self) -> Result<&'static str> {
        for table in TABLE_CANDIDATES {
            let resp = self
                .read(table, 1)
                .send()
                .await
                .context("probing store tables")?;
            if resp.status().as_u16() < 300 {
                return Ok(table);
            }
        }
        bail!("geen nieuws-tabel gevonden (nieuws/nieuws_items/news_items)")
    }

    /// Read up to 5000 existing rows once per run and build the dedup
    /// index. A non-2xx response yields an empty index rather than an
    /// error: dedup then simply relies on the in-batch sets.
    pub async fn fetch_dedup_index(&self, table: &str) -> Result<DedupIndex> {
        let resp = self
            .read(table, DEDUP_SEED_LIMIT)
            .send()
            .await
            .context("reading existing rows for dedup")?;

        let mut index = DedupIndex::default();
        if resp.status().as_u16() >= 300 {
            return Ok(index);
        }

        let payload: Value = resp.json().await.context("decoding existing rows")?;
        let Some(rows) = payload.as_array() else {
            return Ok(index);
        };
        for row in rows {
            let Some(obj) = row.as_object() else { continue };
            index.known_columns.extend(obj.keys().cloned());
            if let Some(url) = first_str(obj, &["source_url", "url", "link"]) {
                index.urls.insert(url.trim().to_lowercase());
            }
            if let Some(title) = first_str(obj, &["title", "kop"]) {
                index.titles.insert(title.trim().to_lowercase());
            }
        }
        Ok(index)
    }

    /// Submit the batch as one bulk insert, dropping columns the store
    /// rejects. Returns the created-row count. Non-schema errors are
    /// fatal immediately; schema retries are bounded.
    pub async fn insert_adaptive(
        &self,
        table: &str,
        mut rows: Vec<Map<String, Value>>,
        known_columns: &HashSet<String>,
    ) -> Result<usize> {
        if !known_columns.is_empty() {
            for row in &mut rows {
                row.retain(|k, _| known_columns.contains(k));
            }
        }

        let mut last_error = String::new();
        for _ in 0..MAX_INSERT_ATTEMPTS {
            let resp = self
                .http
                .post(self.table_url(table))
                .header("apikey", &self.service_key)
                .header("Authorization", format!("Bearer {}", self.service_key))
                .header("Prefer", "return=representation")
                .json(&rows)
                .send()
                .await
                .context("posting insert batch")?;

            if resp.status().as_u16() < 300 {
                let created: Value = resp.json().await.unwrap_or(Value::Null);
                return Ok(created.as_array().map_or(0, Vec::len));
            }

            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            let Some(column) = parse_missing_column(&body) else {
                bail!(
                    "insert failed {}: {}",
                    status,
                    truncate_chars(&body, ERROR_SNIPPET_CHARS)
                );
            };
            tracing::warn!(column = %column, "store rejected unknown column, retrying without it");
            for row in &mut rows {
                row.remove(&column);
            }
            last_error = body;
        }

        bail!(
            "insert failed after schema adaptation: {}",
            truncate_chars(&last_error, ERROR_SNIPPET_CHARS)
        )
    }
}

/// Extract the column name from a store error body like
/// `Could not find the 'tags' column of 'nieuws' in the schema cache`.
pub fn parse_missing_column(body: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"'([^']+)' column").unwrap());
    re.captures(body).map(|c| c[1].to_string())
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        obj.get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}
