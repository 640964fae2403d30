// src/config.rs
//! Run configuration: the per-agent feed map with run-wide defaults
//! (JSON, pre-validated input) and the remote-store settings from the
//! environment.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_FEEDS_CONFIG: &str = "NIEUWS_FEEDS_CONFIG";
pub const DEFAULT_FEEDS_CONFIG: &str = "config/feeds.config.json";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub defaults: Defaults,
    // BTreeMap keeps agent iteration order deterministic across runs.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentFeeds>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_max_items")]
    pub max_items_per_run: usize,
    #[serde(default)]
    pub freshness: Freshness,
    #[serde(default)]
    pub dedupe: Dedupe,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Freshness {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dedupe {
    /// Read for completeness; the freshness cutoff is the only window
    /// this pipeline enforces.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentFeeds {
    #[serde(default)]
    pub feeds: Vec<FeedSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSpec {
    pub url: String,
    pub name: Option<String>,
    pub weight: Option<f64>,
}

fn default_max_items() -> usize {
    20
}
fn default_max_age_days() -> i64 {
    21
}
fn default_window_days() -> i64 {
    14
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_items_per_run: default_max_items(),
            freshness: Freshness::default(),
            dedupe: Dedupe::default(),
        }
    }
}

impl Default for Freshness {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
        }
    }
}

impl Default for Dedupe {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

impl FeedSpec {
    /// Source weight in [0,1]; unset feeds get the 0.8 default.
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(0.8)
    }

    /// Display name: explicit name, else the URL host, else "unknown".
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| host_from_url(&self.url))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

pub fn host_from_url(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

impl FeedConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parsing feeds config json")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feeds config from {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// Load using env var + fallback:
    /// 1) $NIEUWS_FEEDS_CONFIG
    /// 2) config/feeds.config.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_FEEDS_CONFIG) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("NIEUWS_FEEDS_CONFIG points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_FEEDS_CONFIG);
        if default.exists() {
            return Self::load_from(&default);
        }
        Err(anyhow!(
            "no feeds config found (set {ENV_FEEDS_CONFIG} or provide {DEFAULT_FEEDS_CONFIG})"
        ))
    }
}

/// Credentials and endpoint for the remote document store. Missing
/// values are a fatal configuration error at startup.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub base_url: String,
    pub service_key: String,
}

impl StoreSettings {
    pub fn from_env() -> Result<Self> {
        let base_url = first_env(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"])
            .ok_or_else(|| anyhow!("SUPABASE_URL en SUPABASE_SERVICE_KEY zijn verplicht in .env"))?;
        let service_key = first_env(&["SUPABASE_SERVICE_KEY", "SUPABASE_SERVICE_ROLE_KEY"])
            .ok_or_else(|| anyhow!("SUPABASE_URL en SUPABASE_SERVICE_KEY zijn verplicht in .env"))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| std::env::var(n).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
