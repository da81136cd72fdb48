//! Data source registry
//!
//! The `DataSourceRegistry` answers which list sources in a snapshot have
//! live data, and resolves a batch's requested list codes against them.
//! Whether demo data may stand in is an explicit caller decision.

use ob_screening_types::{DataSourceStatus, ListMetadata};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::index::WatchlistIndex;

/// Outcome of resolving requested list codes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResolution {
    /// Live list codes to screen against, in code order
    pub lists: Vec<String>,
    /// Requested codes that were dropped, with the reason
    pub dropped: Vec<(String, String)>,
}

impl ListResolution {
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// One warning per dropped code
    pub fn warnings(&self) -> Vec<String> {
        self.dropped
            .iter()
            .map(|(code, reason)| {
                format!("list '{}' skipped: {}", code, reason)
            })
            .collect()
    }
}

/// Registry view over one snapshot
#[derive(Debug, Clone)]
pub struct DataSourceRegistry {
    snapshot: Arc<WatchlistIndex>,
    allow_demo_data: bool,
}

impl DataSourceRegistry {
    pub fn new(snapshot: Arc<WatchlistIndex>, allow_demo_data: bool) -> Self {
        Self {
            snapshot,
            allow_demo_data,
        }
    }

    pub fn snapshot(&self) -> &Arc<WatchlistIndex> {
        &self.snapshot
    }

    /// Metadata for every known source, live or not
    pub fn available_lists(&self) -> Vec<ListMetadata> {
        let live = self.snapshot.lists().map(|p| ListMetadata {
            code: p.descriptor.code.clone(),
            name: p.descriptor.name.clone(),
            entry_count: p.len(),
            last_refreshed: p.descriptor.last_refreshed,
            available: true,
        });
        let unavailable = self.snapshot.unavailable().map(|u| ListMetadata {
            code: u.descriptor.code.clone(),
            name: u.descriptor.name.clone(),
            entry_count: 0,
            last_refreshed: u.descriptor.last_refreshed,
            available: false,
        });

        let mut lists: Vec<ListMetadata> = live.chain(unavailable).collect();
        lists.sort_by(|a, b| a.code.cmp(&b.code));
        lists
    }

    /// Liveness per source code
    pub fn data_source_status(&self) -> BTreeMap<String, DataSourceStatus> {
        let mut status: BTreeMap<String, DataSourceStatus> = self
            .snapshot
            .lists()
            .map(|p| (p.code().to_string(), DataSourceStatus::live()))
            .collect();
        for u in self.snapshot.unavailable() {
            status.insert(
                u.descriptor.code.clone(),
                DataSourceStatus::unavailable(u.reason.clone()),
            );
        }
        status
    }

    /// Intersect requested codes with live sources.
    ///
    /// An empty request means every live source. Unknown and unavailable
    /// codes are dropped with a reason rather than failing.
    pub fn resolve(&self, requested: &[String]) -> ListResolution {
        if requested.is_empty() {
            return ListResolution {
                lists: self
                    .snapshot
                    .lists()
                    .map(|p| p.code().to_string())
                    .collect(),
                dropped: Vec::new(),
            };
        }

        let mut resolution = ListResolution::default();
        for code in requested {
            if self.snapshot.list(code).is_some() {
                if !resolution.lists.contains(code) {
                    resolution.lists.push(code.clone());
                }
            } else if let Some(reason) = self.snapshot.unavailable_reason(code) {
                resolution.dropped.push((code.clone(), reason.to_string()));
            } else {
                resolution
                    .dropped
                    .push((code.clone(), "unknown list".to_string()));
            }
        }
        resolution.lists.sort();
        resolution
    }

    pub fn demo_allowed(&self) -> bool {
        self.allow_demo_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::index::{ListDescriptor, SnapshotBuilder};
    use crate::screening::types::WatchlistEntry;
    use ob_screening_types::SubjectType;

    fn entry(id: &str, name: &str) -> WatchlistEntry {
        WatchlistEntry {
            id: id.to_string(),
            list_code: String::new(),
            primary_name: name.to_string(),
            aliases: vec![],
            subject_type: SubjectType::Individual,
            dob: None,
            country: None,
            identifiers: vec![],
            source_timestamp: None,
        }
    }

    fn registry(allow_demo: bool) -> DataSourceRegistry {
        let index = SnapshotBuilder::new()
            .add_list(
                ListDescriptor::new("OFAC", "OFAC SDN"),
                vec![entry("o1", "John Smith"), entry("o2", "Jane Doe")],
            )
            .add_list(
                ListDescriptor::new("PEP", "PEP list"),
                vec![entry("p1", "Ann Lee")],
            )
            .mark_unavailable(
                ListDescriptor::new("UN", "UN Consolidated"),
                "feed offline",
            )
            .build();
        DataSourceRegistry::new(Arc::new(index), allow_demo)
    }

    #[test]
    fn test_available_lists() {
        let lists = registry(false).available_lists();
        let codes: Vec<&str> = lists.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["OFAC", "PEP", "UN"]);
        assert_eq!(lists[0].entry_count, 2);
        assert!(lists[0].available);
        assert!(!lists[2].available);
    }

    #[test]
    fn test_data_source_status() {
        let status = registry(false).data_source_status();
        assert!(status["OFAC"].live);
        assert!(!status["UN"].live);
        assert_eq!(status["UN"].reason.as_deref(), Some("feed offline"));
    }

    #[test]
    fn test_resolve_empty_request_means_all_live() {
        let resolution = registry(false).resolve(&[]);
        assert_eq!(
            resolution.lists,
            vec!["OFAC".to_string(), "PEP".to_string()]
        );
        assert!(resolution.dropped.is_empty());
    }

    #[test]
    fn test_resolve_drops_with_warning() {
        let requested = vec!["UN".to_string(), "PEP".to_string(), "EU".to_string()];
        let resolution = registry(false).resolve(&requested);
        assert_eq!(resolution.lists, vec!["PEP".to_string()]);
        assert_eq!(
            resolution.warnings(),
            vec![
                "list 'UN' skipped: feed offline".to_string(),
                "list 'EU' skipped: unknown list".to_string(),
            ]
        );
    }

    #[test]
    fn test_resolve_nothing_live() {
        let resolution = registry(true).resolve(&["UN".to_string()]);
        assert!(resolution.is_empty());
        assert!(registry(true).demo_allowed());
        assert!(!registry(false).demo_allowed());
    }

    #[test]
    fn test_empty_snapshot_resolves_nothing() {
        let registry = DataSourceRegistry::new(Arc::new(WatchlistIndex::empty()), false);
        assert!(registry.resolve(&[]).is_empty());
        assert!(registry.available_lists().is_empty());
    }
}
