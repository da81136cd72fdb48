//! Watchlist identity screening
//!
//! Leaves first:
//! - `normalize`: name canonicalization shared by index build and queries
//! - `index`: immutable, phonetically blocked list snapshots and the store
//!   that publishes them
//! - `lists`: list file loading
//! - `scorer`: per-field and composite similarity
//! - `classifier`: status tiers
//! - `registry`: list availability and request resolution
//! - `orchestrator`: the `ScreeningEngine` batch entry point

pub mod classifier;
pub mod demo;
pub mod index;
pub mod lists;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod registry;
pub mod scorer;
pub mod types;

pub use classifier::MatchClassifier;
pub use index::{
    ListDescriptor, SnapshotBuilder, SnapshotStats, SnapshotStore, WatchlistIndex,
};
pub use lists::{load_configured_lists, load_list_file};
pub use normalize::{normalize, NormalizedName};
pub use options::{validate_threshold, ScreeningOptions};
pub use orchestrator::ScreeningEngine;
pub use registry::{DataSourceRegistry, ListResolution};
pub use scorer::{CandidateScorer, MatchScores, QueryProfile, SimilarityScorer};
pub use types::{
    summarize, BatchScreeningResult, MatchCandidate, MatchedField, ScreeningRecord,
    ScreeningResult, WatchlistEntry,
};
