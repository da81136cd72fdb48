//! Watchlist identity-screening engine
//!
//! Screens batches of customer and counterparty identity records against
//! sanctions, PEP and other regulatory watchlists using fuzzy multi-field
//! matching, and classifies each record into a review tier.
//!
//! Signals are advisory: a confirmed match means high confidence, not an
//! automatic block.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ob_screening::config::ScreeningConfig;
//! use ob_screening::screening::{load_configured_lists, ScreeningEngine, SnapshotStore};
//! use ob_screening_types::{RawScreeningOptions, RawScreeningRecord};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ScreeningConfig::from_env()?;
//! let store = Arc::new(SnapshotStore::new(load_configured_lists(&config)?.build()));
//! let engine = ScreeningEngine::new(config, store)?;
//!
//! let records = vec![RawScreeningRecord {
//!     name: "John A. Smith".into(),
//!     dob: Some("1975-03-01".into()),
//!     country: Some("GB".into()),
//!     ..Default::default()
//! }];
//! let result = engine.screen_batch(&records, &RawScreeningOptions::default())?;
//! println!("{:?}", result.summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod screening;

pub use error::{ListLoadError, Result, ScoringError, ScreeningError, ValidationError};
pub use screening::ScreeningEngine;
