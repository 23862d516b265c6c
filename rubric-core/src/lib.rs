//! # rubric-core
//!
//! Core library for rubric - behavioral-adherence scoring for recorded
//! agent session transcripts.
//!
//! This library provides:
//! - Domain types for metrics, rule checks, scores, and the score report
//! - A resilient per-line event parser and streaming metrics accumulator
//! - Metrics-based and rule-based score calculation
//! - A durable, deduplicated JSON score store with atomic writes
//! - A scan orchestrator and a debounced directory watcher that share one
//!   serialized ingestion pipeline
//! - Configuration management and logging infrastructure
//!
//! ## Data flow
//!
//! Watcher / scan → file path → per-line parse → metrics fold → score →
//! store append. Direct transcript submission skips discovery and scores
//! through the rule evaluator instead, landing on the same store contract.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rubric_core::{Config, ScoreStore};
//! use rubric_core::ingest::scan_directory;
//!
//! let config = Config::load().expect("failed to load config");
//! let store = ScoreStore::new(config.store_path());
//! let outcome = scan_directory(&store, &config.sessions_dir()).expect("scan failed");
//! println!("scored {} new sessions", outcome.newly_scored);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use rules::RuleEvaluator;
pub use store::ScoreStore;
pub use types::*;
pub use watch::{SessionWatcher, WatchNotice, WatcherState};

// Public modules
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod rules;
pub mod scoring;
pub mod store;
pub mod types;
pub mod watch;
