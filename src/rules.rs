// src/rules.rs
//! Classification policy as data: per-agent keyword vocabularies and
//! rationale lines, source gating with per-source caps, and the
//! showcase-detection heuristics. Loadable from TOML so new agents or
//! tuned rules do not require a recompile; a compiled-in seed mirrors
//! the curated production tables and is used when no file is present.

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub const ENV_RULES_CONFIG: &str = "NIEUWS_RULES_CONFIG";
pub const DEFAULT_RULES_CONFIG: &str = "config/rules.toml";

/// Fallback rationale for agents without their own entry.
pub const GENERIC_RATIONALE: &str = "relevant voor de nieuwsstroom";

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub agents: BTreeMap<String, AgentRules>,
    #[serde(default)]
    pub gating: GatingRules,
    #[serde(default)]
    pub showcase: ShowcaseRules,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentRules {
    /// Lowercase substrings matched against `title + " " + summary`.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// "Why place this" sentence for the reason line.
    pub rationale: String,
    /// Reason reported when no keyword matches.
    pub no_match_reason: String,
    /// Drop pure project-showcase items for this agent.
    #[serde(default)]
    pub exclude_showcase: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatingRules {
    /// Lowercase substrings of source names that are agent-exclusive.
    #[serde(default)]
    pub sources: Vec<String>,
    /// The one agent allowed to take items from gated sources.
    #[serde(default)]
    pub allowed_agent: Option<String>,
    #[serde(default = "default_gated_cap")]
    pub gated_cap: usize,
    #[serde(default = "default_general_cap")]
    pub general_cap: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShowcaseRules {
    /// Sources whose " / "-style titles mark a portfolio piece.
    #[serde(default)]
    pub slash_sources: Vec<String>,
    pub authorship_pattern: String,
    pub building_pattern: String,
    pub title_marker_pattern: String,
    pub title_author_pattern: String,
}

fn default_gated_cap() -> usize {
    5
}
fn default_general_cap() -> usize {
    8
}

impl Default for GatingRules {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            allowed_agent: None,
            gated_cap: default_gated_cap(),
            general_cap: default_general_cap(),
        }
    }
}

impl Default for ShowcaseRules {
    fn default() -> Self {
        Self {
            slash_sources: Vec::new(),
            authorship_pattern: r"(?i)\b(studio|architects?)\b".into(),
            building_pattern: r"(?i)\b(house|center|museum|tower|residence|villa)\b".into(),
            title_marker_pattern: r"(?i)\b(/|project)\b".into(),
            title_author_pattern: r"(?i)\b(atelier|studio|architect)\b".into(),
        }
    }
}

#[derive(Debug)]
struct CompiledShowcase {
    authorship: Regex,
    building: Regex,
    title_marker: Regex,
    title_author: Regex,
}

/// Rule tables plus the showcase regexes compiled once at load.
#[derive(Debug)]
pub struct RuleSet {
    pub cfg: RuleSetConfig,
    showcase: CompiledShowcase,
}

impl RuleSet {
    pub fn from_config(cfg: RuleSetConfig) -> Result<Self> {
        let compile = |what: &str, pat: &str| {
            Regex::new(pat).map_err(|e| anyhow!("showcase `{what}` regex error: {e}"))
        };
        let showcase = CompiledShowcase {
            authorship: compile("authorship", &cfg.showcase.authorship_pattern)?,
            building: compile("building", &cfg.showcase.building_pattern)?,
            title_marker: compile("title_marker", &cfg.showcase.title_marker_pattern)?,
            title_author: compile("title_author", &cfg.showcase.title_author_pattern)?,
        };
        Ok(Self { cfg, showcase })
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: RuleSetConfig = toml::from_str(s)?;
        Self::from_config(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $NIEUWS_RULES_CONFIG
    /// 2) config/rules.toml
    /// 3) the compiled-in seed
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_RULES_CONFIG) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("NIEUWS_RULES_CONFIG points to non-existent path"));
            }
            let content = fs::read_to_string(&pb)?;
            return Self::from_toml_str(&content);
        }
        let default = PathBuf::from(DEFAULT_RULES_CONFIG);
        if default.exists() {
            let content = fs::read_to_string(&default)?;
            return Self::from_toml_str(&content);
        }
        Ok(Self::default_seed())
    }

    /// Built-in policy matching the curated production tables: three
    /// agents (site development, regulation/cost, design/AI), gated
    /// architecture magazines, showcase heuristics.
    pub fn default_seed() -> Self {
        let mut agents = BTreeMap::new();

        agents.insert(
            "kavel-agent".to_string(),
            AgentRules {
                keywords: [
                    "kavel",
                    "kaveluitgifte",
                    "bouwkavel",
                    "gebiedsontwikkeling",
                    "bestemmingsplan",
                    "omgevingsplan",
                    "locatieontwikkeling",
                ]
                .map(String::from)
                .to_vec(),
                rationale: "relevant voor kavelaanbod, gebiedsontwikkeling of vroege locatiekansen"
                    .into(),
                no_match_reason: "geen duidelijke kavel/gebiedsontwikkeling match".into(),
                exclude_showcase: false,
            },
        );

        agents.insert(
            "brikx-agent".to_string(),
            AgentRules {
                keywords: [
                    "omgevingswet",
                    "wkb",
                    "vergunning",
                    "bouwbesluit",
                    "bouwkosten",
                    "renovatie",
                    "verduurzaming",
                    "nieuwbouw",
                ]
                .map(String::from)
                .to_vec(),
                rationale:
                    "relevant voor regelgeving, kosten of praktische bouwbeslissingen van particulieren"
                        .into(),
                no_match_reason: "geen duidelijke regelgeving/kosten match".into(),
                exclude_showcase: false,
            },
        );

        agents.insert(
            "zwijsen-agent".to_string(),
            AgentRules {
                keywords: [
                    "architect",
                    "architectuur",
                    "ontwerp",
                    "villa",
                    "interieur",
                    "ai",
                    "artificial intelligence",
                    "generative",
                    "bim",
                    "computational design",
                ]
                .map(String::from)
                .to_vec(),
                rationale:
                    "relevant voor AI-impact op ontwerp, workflow of positionering van architecten"
                        .into(),
                no_match_reason: "geen duidelijke architectuur/AI match".into(),
                exclude_showcase: true,
            },
        );

        let cfg = RuleSetConfig {
            agents,
            gating: GatingRules {
                sources: vec!["archdaily".into(), "dezeen".into()],
                allowed_agent: Some("zwijsen-agent".into()),
                gated_cap: 5,
                general_cap: 8,
            },
            showcase: ShowcaseRules {
                slash_sources: vec!["archdaily".into(), "dezeen".into()],
                ..ShowcaseRules::default()
            },
        };

        Self::from_config(cfg).expect("seed rules compile")
    }

    pub fn agent(&self, id: &str) -> Option<&AgentRules> {
        self.cfg.agents.get(id)
    }

    pub fn rationale_for(&self, agent: &str) -> &str {
        self.agent(agent)
            .map(|a| a.rationale.as_str())
            .unwrap_or(GENERIC_RATIONALE)
    }

    /// True for sources reserved for the designated agent. `source_key`
    /// is the lowercase source name.
    pub fn is_gated_source(&self, source_key: &str) -> bool {
        self.cfg
            .gating
            .sources
            .iter()
            .any(|s| source_key.contains(s.as_str()))
    }

    pub fn cap_for_source(&self, source_key: &str) -> usize {
        if self.is_gated_source(source_key) {
            self.cfg.gating.gated_cap
        } else {
            self.cfg.gating.general_cap
        }
    }

    /// Heuristics for a single-project portfolio writeup. `text` is the
    /// cleaned lowercase `title + " " + summary`.
    pub fn is_showcase(&self, title: &str, text: &str, source_key: &str) -> bool {
        let title_lower = title.to_lowercase();

        if title.contains(" / ")
            && self
                .cfg
                .showcase
                .slash_sources
                .iter()
                .any(|s| source_key.contains(s.as_str()))
        {
            return true;
        }
        if self.showcase.authorship.is_match(text) && self.showcase.building.is_match(text) {
            return true;
        }
        if self.showcase.title_marker.is_match(&title_lower)
            && self.showcase.title_author.is_match(&title_lower)
        {
            return true;
        }
        false
    }
}
