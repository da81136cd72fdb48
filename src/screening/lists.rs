//! Watchlist source files
//!
//! One JSON or YAML file per list code, holding an array of entries.
//! A source that cannot be read does not fail the snapshot; it is recorded
//! as unavailable with the reason.

use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use super::index::{ListDescriptor, SnapshotBuilder};
use super::types::WatchlistEntry;
use crate::config::ScreeningConfig;
use crate::error::ListLoadError;

/// Read a list file, choosing the parser from its extension
pub fn load_list_file(path: impl AsRef<Path>) -> Result<Vec<WatchlistEntry>, ListLoadError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let content = std::fs::read_to_string(path).map_err(|source| ListLoadError::Io {
        path: display.clone(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| ListLoadError::Parse {
            path: display,
            message: e.to_string(),
        }),
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| ListLoadError::Parse {
            path: display,
            message: e.to_string(),
        }),
        _ => Err(ListLoadError::UnsupportedFormat(display)),
    }
}

/// Load every configured source into a snapshot builder.
///
/// Disabled sources, sources without a path and sources that fail to load
/// are marked unavailable. Two sources sharing a code is an error.
pub fn load_configured_lists(config: &ScreeningConfig) -> Result<SnapshotBuilder, ListLoadError> {
    let mut builder = SnapshotBuilder::new();
    let mut seen = std::collections::HashSet::new();

    for source in &config.lists {
        let descriptor = ListDescriptor::new(&source.code, &source.name);
        if !seen.insert(descriptor.code.clone()) {
            return Err(ListLoadError::DuplicateCode(descriptor.code));
        }

        if !source.enabled {
            builder = builder.mark_unavailable(descriptor, "disabled in configuration");
            continue;
        }
        let Some(path) = &source.path else {
            builder = builder.mark_unavailable(descriptor, "no source file configured");
            continue;
        };

        match load_list_file(path) {
            Ok(entries) => {
                let refreshed = file_modified(path).unwrap_or_else(Utc::now);
                info!(list = %descriptor.code, entries = entries.len(), "Loaded watchlist");
                builder = builder.add_list(descriptor.refreshed_at(refreshed), entries);
            }
            Err(e) => {
                warn!(list = %descriptor.code, error = %e, "Watchlist unavailable");
                builder = builder.mark_unavailable(descriptor, e.to_string());
            }
        }
    }

    Ok(builder)
}

fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}
