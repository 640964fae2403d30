// src/score.rs
//! Relevance scoring and the user-facing reason line. `relevance` is
//! pure: the clock is injected so tests never depend on environment
//! time or zone.

use chrono::{DateTime, Utc};

use crate::normalize::truncate_chars;
use crate::rules::RuleSet;

/// Age score for items without a usable publish date.
const UNKNOWN_AGE_SCORE: f64 = 0.6;

/// Blend source weight with recency into a bounded score.
///
/// `age_score = max(0.2, 1 - age_days / max(max_age_days, 1))`, 0.6 when
/// the date is unknown; final `0.55*weight + 0.45*age_score`, rounded to
/// three decimals and clamped into `[0.70, 0.98]`.
pub fn relevance(
    weight: f64,
    published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_age_days: i64,
) -> f64 {
    let age_score = match published_at {
        Some(dt) => {
            let age_days = ((now - dt).num_seconds() as f64 / 86_400.0).max(0.0);
            (1.0 - age_days / max_age_days.max(1) as f64).max(0.2)
        }
        None => UNKNOWN_AGE_SCORE,
    };
    let score = 0.55 * weight + 0.45 * age_score;
    ((score * 1000.0).round() / 1000.0).clamp(0.70, 0.98)
}

/// One-line justification appended to the persisted body: agent
/// rationale, the matched-term explanation, source, rounded score.
pub fn reason_line(
    rules: &RuleSet,
    agent: &str,
    source_name: &str,
    relevance: f64,
    why_hit: &str,
) -> String {
    let why = rules.rationale_for(agent);
    format!("Waarom plaatsen: {why} ({why_hit}). Bron: {source_name}. Score: {relevance:.2}.")
}

/// Cleaned summary (capped at 420 chars) plus the reason line; the
/// reason line alone when the summary is empty.
pub fn merge_summary(clean_summary: &str, reason: &str) -> String {
    if clean_summary.is_empty() {
        reason.to_string()
    } else {
        format!("{}\n\n{}", truncate_chars(clean_summary, 420), reason)
    }
}
