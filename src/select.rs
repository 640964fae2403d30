// src/select.rs
//! Run-scoped state (dedup sets, per-source counters, freshness cutoff)
//! and the final top-N selection. All mutation happens on the single
//! execution thread in item-discovery order; the context is passed
//! explicitly, never ambient.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// A row eligible for persistence. Constructed once from trimmed,
/// non-empty title/url and never mutated afterwards; the writer may
/// only drop fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CandidateItem {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub source_url: String,
    pub source_name: String,
    pub topic: String,
    pub review_status: String,
    pub relevance: f64,
    pub tags: Vec<String>,
    pub published_at: Option<String>,
}

/// Ephemeral per-run state; discarded at exit.
#[derive(Debug)]
pub struct RunContext {
    pub now: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    seen_urls: HashSet<String>,
    seen_titles: HashSet<String>,
    batch_urls: HashSet<String>,
    batch_titles: HashSet<String>,
    source_counts: HashMap<String, usize>,
}

impl RunContext {
    pub fn new(now: DateTime<Utc>, max_age_days: i64) -> Self {
        Self {
            now,
            cutoff: now - Duration::days(max_age_days),
            seen_urls: HashSet::new(),
            seen_titles: HashSet::new(),
            batch_urls: HashSet::new(),
            batch_titles: HashSet::new(),
            source_counts: HashMap::new(),
        }
    }

    /// Seed the remote-store dedup index (lowercased keys).
    pub fn seed_known(&mut self, urls: HashSet<String>, titles: HashSet<String>) {
        self.seen_urls = urls;
        self.seen_titles = titles;
    }

    /// Items with a known publish date older than the cutoff are stale;
    /// unknown dates pass.
    pub fn is_fresh(&self, published_at: Option<DateTime<Utc>>) -> bool {
        published_at.map_or(true, |dt| dt >= self.cutoff)
    }

    /// Case-insensitive, symmetric between URL and title keys, against
    /// both the remote index and the in-run batch.
    pub fn is_duplicate(&self, url_key: &str, title_key: &str) -> bool {
        self.seen_urls.contains(url_key)
            || self.seen_titles.contains(title_key)
            || self.batch_urls.contains(url_key)
            || self.batch_titles.contains(title_key)
    }

    /// Register an accepted item: both dedup keys plus the source counter.
    pub fn register(&mut self, url_key: &str, title_key: &str, source_key: &str) {
        self.batch_urls.insert(url_key.to_string());
        self.batch_titles.insert(title_key.to_string());
        *self.source_counts.entry(source_key.to_string()).or_insert(0) += 1;
    }

    pub fn source_count(&self, source_key: &str) -> usize {
        self.source_counts.get(source_key).copied().unwrap_or(0)
    }
}

/// Best N by `(relevance, published_at)` descending; missing timestamps
/// sort as the empty string, i.e. last among score ties.
pub fn select_top(mut candidates: Vec<CandidateItem>, max_items: usize) -> Vec<CandidateItem> {
    candidates.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.published_at
                    .as_deref()
                    .unwrap_or("")
                    .cmp(a.published_at.as_deref().unwrap_or(""))
            })
    });
    candidates.truncate(max_items);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 11, 12, 0, 0).unwrap()
    }

    fn candidate(title: &str, relevance: f64, published_at: Option<&str>) -> CandidateItem {
        CandidateItem {
            title: title.to_string(),
            summary: String::new(),
            body: String::new(),
            source_url: format!("https://voorbeeld.nl/{title}"),
            source_name: "Voorbeeld".into(),
            topic: "kavel-agent|Voorbeeld".into(),
            review_status: "pending".into(),
            relevance,
            tags: vec!["kavel-agent".into()],
            published_at: published_at.map(str::to_string),
        }
    }

    #[test]
    fn freshness_passes_unknown_dates() {
        let ctx = RunContext::new(now(), 21);
        assert!(ctx.is_fresh(None));
        assert!(ctx.is_fresh(Some(now() - Duration::days(20))));
        assert!(!ctx.is_fresh(Some(now() - Duration::days(22))));
    }

    #[test]
    fn dedup_matches_url_or_title() {
        let mut ctx = RunContext::new(now(), 21);
        ctx.seed_known(
            HashSet::from(["https://a.nl/1".to_string()]),
            HashSet::from(["bekende kop".to_string()]),
        );
        assert!(ctx.is_duplicate("https://a.nl/1", "nieuwe kop"));
        assert!(ctx.is_duplicate("https://a.nl/2", "bekende kop"));
        assert!(!ctx.is_duplicate("https://a.nl/2", "nieuwe kop"));

        ctx.register("https://a.nl/2", "nieuwe kop", "voorbeeld");
        assert!(ctx.is_duplicate("https://a.nl/2", "x"));
        assert!(ctx.is_duplicate("x", "nieuwe kop"));
        assert_eq!(ctx.source_count("voorbeeld"), 1);
    }

    #[test]
    fn selection_sorts_by_score_then_recency() {
        let cands = vec![
            candidate("oud", 0.9, Some("2025-08-01T00:00:00+00:00")),
            candidate("laag", 0.8, Some("2025-08-10T00:00:00+00:00")),
            candidate("nieuw", 0.9, Some("2025-08-10T00:00:00+00:00")),
        ];
        let top = select_top(cands, 10);
        let titles: Vec<_> = top.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["nieuw", "oud", "laag"]);
    }

    #[test]
    fn missing_dates_sort_last_among_ties() {
        let cands = vec![
            candidate("zonder datum", 0.9, None),
            candidate("met datum", 0.9, Some("2025-08-10T00:00:00+00:00")),
        ];
        let top = select_top(cands, 10);
        assert_eq!(top[0].title, "met datum");
        assert_eq!(top[1].title, "zonder datum");
    }

    #[test]
    fn selection_caps_at_max_items() {
        let cands = (0..5)
            .map(|i| candidate(&format!("t{i}"), 0.8, None))
            .collect();
        assert_eq!(select_top(cands, 3).len(), 3);
        assert!(select_top(Vec::new(), 3).is_empty());
    }

    #[test]
    fn candidate_serializes_with_null_published_at() {
        let v = serde_json::to_value(candidate("x", 0.75, None)).unwrap();
        assert_eq!(v["review_status"], "pending");
        assert_eq!(v["tags"], serde_json::json!(["kavel-agent"]));
        assert!(v["published_at"].is_null());
    }
}
