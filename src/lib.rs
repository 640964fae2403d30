// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod classify;
pub mod config;
pub mod feed;
pub mod normalize;
pub mod pipeline;
pub mod rules;
pub mod score;
pub mod select;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::{FeedConfig, StoreSettings};
pub use crate::pipeline::{run_once, FeedFetcher, HttpFetcher, RunReport};
pub use crate::rules::RuleSet;
pub use crate::select::{CandidateItem, RunContext};
pub use crate::store::StoreClient;
