//! Synthetic demo list
//!
//! Compiled into the binary so the batch contract stays exercisable when no
//! live list is configured. Results computed against it are always tagged
//! as demo data.

use std::sync::{Arc, OnceLock};

use super::index::{ListDescriptor, SnapshotBuilder, WatchlistIndex};
use super::types::WatchlistEntry;
use crate::error::ScreeningError;

pub const DEMO_LIST_CODE: &str = "DEMO";

/// Warning attached to every demo-data response
pub const DEMO_WARNING: &str =
    "no live watchlist data available; results were computed against synthetic demo data and are not a real screen";

const DEMO_WATCHLIST: &str = include_str!("../../config/demo_watchlist.yaml");

static DEMO_SNAPSHOT: OnceLock<Result<Arc<WatchlistIndex>, String>> = OnceLock::new();

/// The demo snapshot, built on first use
pub fn demo_snapshot() -> Result<Arc<WatchlistIndex>, ScreeningError> {
    DEMO_SNAPSHOT
        .get_or_init(|| {
            let entries: Vec<WatchlistEntry> = serde_yaml::from_str(DEMO_WATCHLIST)
                .map_err(|e| format!("demo watchlist is invalid: {}", e))?;
            let index = SnapshotBuilder::new()
                .add_list(
                    ListDescriptor::new(DEMO_LIST_CODE, "Synthetic demo list"),
                    entries,
                )
                .build();
            Ok(Arc::new(index))
        })
        .clone()
        .map_err(ScreeningError::Config)
}
