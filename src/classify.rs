// src/classify.rs
//! Staged keep/reject decision for a normalized item. Stages short-circuit
//! on the first rejection: source gating, per-source cap, showcase
//! exclusion, keyword fit.

use crate::rules::RuleSet;
use crate::select::RunContext;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub keep: bool,
    pub reason: String,
}

impl Verdict {
    fn keep(reason: impl Into<String>) -> Self {
        Self {
            keep: true,
            reason: reason.into(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            keep: false,
            reason: reason.into(),
        }
    }
}

/// Lowercase counter key for a source name; empty names share "unknown".
pub fn source_key(source_name: &str) -> String {
    let key = source_name.trim().to_lowercase();
    if key.is_empty() {
        "unknown".to_string()
    } else {
        key
    }
}

/// Decide whether an item is kept for its agent. `title` and `summary`
/// are already normalized; the cap counter in `ctx` is read here and
/// advanced by the caller only on acceptance.
pub fn classify(
    rules: &RuleSet,
    ctx: &RunContext,
    agent: &str,
    title: &str,
    summary: &str,
    source_name: &str,
) -> Verdict {
    let key = source_key(source_name);

    // 1) Source gating: gated sources serve exactly one agent.
    if rules.is_gated_source(&key) {
        let allowed = rules.cfg.gating.allowed_agent.as_deref();
        if allowed != Some(agent) {
            return Verdict::reject(format!(
                "bron {source_name} is voorbehouden aan {}",
                allowed.unwrap_or("geen enkele agent")
            ));
        }
    }

    // 2) Per-source volume cap, in discovery order.
    if ctx.source_count(&key) >= rules.cap_for_source(&key) {
        return Verdict::reject(format!("bronlimiet bereikt voor {source_name}"));
    }

    let text = format!("{title} {summary}").to_lowercase();

    // 3) Showcase exclusion for agents that opt in.
    if rules.agent(agent).is_some_and(|a| a.exclude_showcase)
        && rules.is_showcase(title, &text, &key)
    {
        return Verdict::reject("project-showcase, geen analyse".to_string());
    }

    // 4) Keyword fit; unknown agents always fit.
    match rules.agent(agent) {
        Some(agent_rules) => {
            let hits: Vec<&str> = agent_rules
                .keywords
                .iter()
                .filter(|t| text.contains(t.as_str()))
                .map(String::as_str)
                .collect();
            if hits.is_empty() {
                Verdict::reject(agent_rules.no_match_reason.clone())
            } else {
                Verdict::keep(format!("match op {}", hits[..hits.len().min(2)].join(", ")))
            }
        }
        None => Verdict::keep("algemene match"),
    }
}
