//! Integration tests for the screening engine
//!
//! Tests verify:
//! 1. Exact and near-exact matches classify as confirmed; disjoint names stay clear
//! 2. Batch limits and fail-fast validation
//! 3. Output order and determinism under parallel execution
//! 4. List resolution, the no-data-sources condition and demo fallback
//! 5. Alias matching on and off
//! 6. Fault containment and deadline handling
//! 7. Snapshot publication never disturbs a snapshot already in use

use chrono::NaiveDate;
use ob_screening::config::{EngineDefaults, ScreeningConfig};
use ob_screening::screening::{
    CandidateScorer, ListDescriptor, MatchScores, MatchedField, QueryProfile, ScreeningEngine,
    ScreeningOptions, SimilarityScorer, SnapshotBuilder, SnapshotStore, WatchlistEntry,
    WatchlistIndex,
};
use ob_screening::screening::index::IndexedEntry;
use ob_screening::{ScoringError, ScreeningError};
use ob_screening_types::{MatchStatus, RawScreeningOptions, RawScreeningRecord, SubjectType};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// TEST FIXTURES - Deterministic snapshot for reproducible tests
// ============================================================================

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

fn create_test_snapshot() -> WatchlistIndex {
    let john = WatchlistEntry {
        dob: NaiveDate::from_ymd_opt(1975, 3, 1),
        country: Some("GB".to_string()),
        identifiers: vec!["GB-PASS-123456".to_string()],
        ..entry("ofac-1", "John Smith")
    };
    let bout = WatchlistEntry {
        aliases: vec!["Ivan Petrov".to_string()],
        dob: NaiveDate::from_ymd_opt(1967, 1, 13),
        country: Some("RU".to_string()),
        ..entry("ofac-2", "Viktor Bout")
    };
    let acme = WatchlistEntry {
        subject_type: SubjectType::Company,
        country: Some("KP".to_string()),
        ..entry("ofac-3", "Acme Trading Limited")
    };

    SnapshotBuilder::new()
        .add_list(
            ListDescriptor::new("OFAC", "OFAC SDN"),
            vec![john, bout, acme],
        )
        .add_list(
            ListDescriptor::new("PEP", "Politically Exposed Persons"),
            vec![entry("pep-1", "Jane Doe"), entry("pep-2", "Maria Garcia")],
        )
        .mark_unavailable(
            ListDescriptor::new("UN", "UN Consolidated"),
            "feed offline",
        )
        .build()
}

fn test_config() -> ScreeningConfig {
    ScreeningConfig {
        defaults: EngineDefaults {
            workers: Some(4),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn create_engine() -> ScreeningEngine {
    let store = Arc::new(SnapshotStore::new(create_test_snapshot()));
    ScreeningEngine::new(test_config(), store).unwrap()
}

fn empty_engine() -> ScreeningEngine {
    let store = Arc::new(SnapshotStore::new(WatchlistIndex::empty()));
    ScreeningEngine::new(test_config(), store).unwrap()
}

fn record(id: &str, name: &str) -> RawScreeningRecord {
    RawScreeningRecord {
        id: Some(id.to_string()),
        name: name.to_string(),
        ..Default::default()
    }
}

fn john_a_smith() -> RawScreeningRecord {
    RawScreeningRecord {
        dob: Some("1975-03-01".to_string()),
        country: Some("GB".to_string()),
        ..record("r1", "John A. Smith")
    }
}

fn options() -> RawScreeningOptions {
    RawScreeningOptions {
        threshold: Some(0.7),
        ..Default::default()
    }
}

// ============================================================================
// MATCHING
// ============================================================================

#[test]
fn test_near_exact_identity_is_confirmed() {
    let engine = create_engine();
    let batch = engine.screen_batch(&[john_a_smith()], &options()).unwrap();

    let result = &batch.results[0];
    assert_eq!(result.status, MatchStatus::ConfirmedMatch);
    assert_eq!(result.matches.len(), 1);

    let hit = &result.matches[0];
    assert_eq!(hit.list_code, "OFAC");
    assert_eq!(hit.entry.id, "ofac-1");
    assert_eq!(hit.matched_field, MatchedField::PrimaryName);
    assert!(hit.score >= 0.95, "score = {}", hit.score);
    assert!(!batch.is_demo_data);
    assert_eq!(batch.warning(), None);
}

#[test]
fn test_disjoint_name_is_clear() {
    let engine = create_engine();
    let batch = engine
        .screen_batch(&[record("r1", "Xx Yy Zz")], &options())
        .unwrap();

    assert_eq!(batch.results[0].status, MatchStatus::Clear);
    assert!(batch.results[0].matches.is_empty());
    assert_eq!(batch.summary.clear, 1);
}

#[test]
fn test_dob_day_month_credit_is_potential() {
    let engine = create_engine();
    let input = RawScreeningRecord {
        dob: Some("1957-03-01".to_string()),
        country: Some("GB".to_string()),
        ..record("r1", "John Smith")
    };
    let batch = engine.screen_batch(&[input], &options()).unwrap();

    let hit = &batch.results[0].matches[0];
    assert_eq!(hit.field_scores.dob, Some(0.5));
    // (0.65 * 1.0 + 0.20 * 0.5 + 0.15 * 1.0) / 1.0
    assert!((hit.score - 0.9).abs() < 1e-9, "score = {}", hit.score);
    assert_eq!(hit.status, MatchStatus::PotentialMatch);
}

#[test]
fn test_identifier_corroborates() {
    let engine = create_engine();
    let input = RawScreeningRecord {
        id_number: Some("gb pass 123456".to_string()),
        ..record("r1", "John Smith")
    };
    let batch = engine.screen_batch(&[input], &options()).unwrap();
    let hit = &batch.results[0].matches[0];
    assert_eq!(hit.field_scores.id, Some(1.0));
    assert_eq!(hit.status, MatchStatus::ConfirmedMatch);
}

#[test]
fn test_identifier_match_surfaces_renamed_subject() {
    let engine = create_engine();
    let input = RawScreeningRecord {
        id_number: Some("GB-PASS-123456".to_string()),
        ..record("r1", "Alexander Kowalski")
    };
    let batch = engine.screen_batch(&[input], &options()).unwrap();

    let result = &batch.results[0];
    assert_ne!(result.status, MatchStatus::Clear);
    let hit = result
        .matches
        .iter()
        .find(|m| m.entry.id == "ofac-1")
        .unwrap();
    assert_eq!(hit.field_scores.id, Some(1.0));
    assert!(hit.field_scores.name < 0.7);
    assert!((hit.score - 0.9).abs() < 1e-9, "score = {}", hit.score);
    // A weak name keeps an identifier-only hit at potential
    assert_eq!(hit.status, MatchStatus::PotentialMatch);
}

#[test]
fn test_threshold_is_clamped() {
    let engine = create_engine();

    // Threshold 5 clamps to 1.0; an exact match still reaches it
    let strict = RawScreeningOptions {
        threshold: Some(5.0),
        ..Default::default()
    };
    let batch = engine.screen_batch(&[john_a_smith()], &strict).unwrap();
    assert_eq!(batch.results[0].matches.len(), 1);

    // Threshold -5 clamps to 0; every blocked candidate is reported
    let lax = RawScreeningOptions {
        threshold: Some(-5.0),
        ..Default::default()
    };
    let batch = engine.screen_batch(&[john_a_smith()], &lax).unwrap();
    let ids: Vec<&str> = batch.results[0]
        .matches
        .iter()
        .map(|m| m.entry.id.as_str())
        .collect();
    assert!(ids.contains(&"ofac-1"));
    assert!(ids.contains(&"pep-1"));
    assert_eq!(ids[0], "ofac-1");
}

// ============================================================================
// ALIASES
// ============================================================================

#[test]
fn test_alias_only_match_respects_include_aliases() {
    let engine = create_engine();
    let input = [record("r1", "Ivan Petrov")];

    let with_aliases = engine.screen_batch(&input, &options()).unwrap();
    let hit = &with_aliases.results[0].matches[0];
    assert_eq!(hit.entry.id, "ofac-2");
    assert_eq!(hit.matched_field, MatchedField::Alias);
    assert_eq!(hit.matched_name, "Ivan Petrov");

    let without = RawScreeningOptions {
        include_aliases: Some(false),
        ..options()
    };
    let batch = engine.screen_batch(&input, &without).unwrap();
    assert!(batch.results[0]
        .matches
        .iter()
        .all(|m| m.entry.id != "ofac-2"));
    assert_eq!(batch.results[0].status, MatchStatus::Clear);
}

// ============================================================================
// BATCH SEMANTICS
// ============================================================================

#[test]
fn test_batch_size_limits() {
    let engine = create_engine();

    let accepted = vec![record("r", "John Smith"); 1000];
    let batch = engine.screen_batch(&accepted, &options()).unwrap();
    assert_eq!(batch.results.len(), 1000);
    assert_eq!(batch.summary.total, 1000);

    let rejected = vec![record("r", "John Smith"); 1001];
    let err = engine.screen_batch(&rejected, &options()).unwrap_err();
    assert_eq!(err.reason_code(), "batch_too_large");

    let err = engine.screen_batch(&[], &options()).unwrap_err();
    assert_eq!(err.reason_code(), "empty_batch");
}

#[test]
fn test_invalid_record_rejects_whole_batch() {
    let engine = create_engine();
    let err = engine
        .screen_batch(&[john_a_smith(), record("bad", "J")], &options())
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.reason_code(), "name_too_short");
}

#[test]
fn test_output_order_matches_input() {
    let engine = create_engine();
    let names = ["John Smith", "Xx Yy Zz", "Ivan Petrov", "Jane Doe", "Acme Trading Ltd"];
    let input: Vec<RawScreeningRecord> = (0..250)
        .map(|i| record(&format!("r-{}", i), names[i % names.len()]))
        .collect();

    let batch = engine.screen_batch(&input, &options()).unwrap();
    for (i, result) in batch.results.iter().enumerate() {
        assert_eq!(result.record_id, format!("r-{}", i));
    }
    assert_eq!(batch.summary.total, 250);
    assert_eq!(
        batch.summary.clear + batch.summary.potential_match + batch.summary.confirmed_match,
        250
    );
}

#[test]
fn test_screening_is_deterministic() {
    let engine = create_engine();
    let input = vec![
        john_a_smith(),
        record("r2", "Ivan Petrov"),
        record("r3", "Acme Trading Co"),
        record("r4", "Mary Garcia"),
    ];

    let first = engine.screen_batch(&input, &options()).unwrap();
    let second = engine.screen_batch(&input, &options()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_positional_ids_assigned() {
    let engine = create_engine();
    let input = vec![
        RawScreeningRecord {
            name: "Jane Doe".to_string(),
            ..Default::default()
        };
        2
    ];
    let batch = engine.screen_batch(&input, &options()).unwrap();
    assert_eq!(batch.results[0].record_id, "record-0");
    assert_eq!(batch.results[1].record_id, "record-1");
}

// ============================================================================
// DATA SOURCES
// ============================================================================

#[test]
fn test_no_data_sources_is_an_error() {
    let engine = empty_engine();
    let err = engine
        .screen_batch(&[john_a_smith()], &options())
        .unwrap_err();
    assert!(matches!(err, ScreeningError::NoDataSources { .. }));
    assert_eq!(err.reason_code(), "no_data_sources");
}

#[test]
fn test_only_unavailable_lists_requested() {
    let engine = create_engine();
    let request = RawScreeningOptions {
        lists: vec!["un".to_string()],
        ..options()
    };
    match engine.screen_batch(&[john_a_smith()], &request) {
        Err(ScreeningError::NoDataSources {
            requested,
            unavailable,
        }) => {
            assert_eq!(requested, vec!["UN".to_string()]);
            assert_eq!(unavailable, vec!["UN".to_string()]);
        }
        other => panic!("expected NoDataSources, got {:?}", other.map(|b| b.summary)),
    }
}

#[test]
fn test_dropped_lists_are_warned() {
    let engine = create_engine();
    let request = RawScreeningOptions {
        lists: vec!["OFAC".to_string(), "UN".to_string(), "EU".to_string()],
        ..options()
    };
    let batch = engine.screen_batch(&[john_a_smith()], &request).unwrap();
    let warning = batch.warning().unwrap();
    assert!(warning.contains("list 'UN' skipped: feed offline"));
    assert!(warning.contains("list 'EU' skipped: unknown list"));
    assert_eq!(batch.results[0].status, MatchStatus::ConfirmedMatch);
}

#[test]
fn test_list_restriction() {
    let engine = create_engine();
    let request = RawScreeningOptions {
        lists: vec!["PEP".to_string()],
        ..options()
    };
    let batch = engine.screen_batch(&[john_a_smith()], &request).unwrap();
    assert_eq!(batch.results[0].status, MatchStatus::Clear);
}

#[test]
fn test_demo_fallback_is_labelled() {
    let engine = empty_engine();
    let request = RawScreeningOptions {
        allow_demo_data: true,
        ..options()
    };
    let batch = engine
        .screen_batch(&[record("r1", "John Demo")], &request)
        .unwrap();

    assert!(batch.is_demo_data);
    assert!(batch.warning().unwrap().contains("synthetic demo data"));
    let hit = &batch.results[0].matches[0];
    assert_eq!(hit.list_code, "DEMO");
    assert_eq!(hit.matched_field, MatchedField::Alias);

    let response = serde_json::to_value(batch.to_response()).unwrap();
    assert_eq!(response["isDemoData"], serde_json::json!(true));
}

#[test]
fn test_demo_not_used_when_live_data_exists() {
    let engine = create_engine();
    let request = RawScreeningOptions {
        allow_demo_data: true,
        ..options()
    };
    let batch = engine.screen_batch(&[john_a_smith()], &request).unwrap();
    assert!(!batch.is_demo_data);
}

#[test]
fn test_capabilities() {
    let engine = create_engine();
    let caps = engine.capabilities();
    let codes: Vec<&str> = caps.lists.iter().map(|l| l.code.as_str()).collect();
    assert_eq!(codes, vec!["OFAC", "PEP", "UN"]);
    assert_eq!(caps.default_threshold, 0.7);
    assert_eq!(caps.max_batch_size, 1000);
    assert!(caps.data_source_status["OFAC"].live);
    assert!(!caps.data_source_status["UN"].live);
}

// ============================================================================
// FAULTS AND DEADLINES
// ============================================================================

/// Fails for record "boom", panics for record "panic", delegates otherwise
struct FaultyScorer {
    inner: SimilarityScorer,
}

impl CandidateScorer for FaultyScorer {
    fn score(
        &self,
        query: &QueryProfile,
        candidate: &IndexedEntry,
    ) -> Result<MatchScores, ScoringError> {
        match query.record_id.as_str() {
            "boom" => Err(ScoringError::Fault("injected".to_string())),
            "panic" => panic!("injected panic"),
            _ => self.inner.score(query, candidate),
        }
    }
}

#[test]
fn test_scoring_fault_degrades_to_needs_review() {
    let engine = create_engine().with_scorer(Arc::new(FaultyScorer {
        inner: SimilarityScorer::default(),
    }));
    let input = vec![
        record("boom", "John Smith"),
        record("panic", "John Smith"),
        john_a_smith(),
    ];

    let batch = engine.screen_batch(&input, &options()).unwrap();

    for faulty in &batch.results[..2] {
        assert_eq!(faulty.status, MatchStatus::PotentialMatch);
        assert!(faulty.incomplete);
        assert!(faulty.note.is_some());
    }
    assert!(batch.results[0]
        .note
        .as_deref()
        .unwrap()
        .contains("injected"));
    assert!(batch.results[1]
        .note
        .as_deref()
        .unwrap()
        .contains("panicked"));

    // The rest of the batch is unaffected
    assert_eq!(batch.results[2].status, MatchStatus::ConfirmedMatch);
    assert!(!batch.results[2].incomplete);

    assert_eq!(batch.summary.incomplete, 2);
    assert!(batch.warning().unwrap().contains("need review"));
}

#[test]
fn test_expired_deadline_marks_everything_incomplete() {
    let engine = create_engine();
    let records = engine
        .validate_batch(&[john_a_smith(), record("r2", "Xx Yy Zz")])
        .unwrap();
    let opts = ScreeningOptions::default().with_deadline(Duration::ZERO);

    let batch = engine.screen(records, opts).unwrap();

    for result in &batch.results {
        assert!(result.incomplete);
        assert_ne!(result.status, MatchStatus::Clear);
    }
    assert_eq!(batch.summary.incomplete, 2);
    assert!(batch.warning().unwrap().contains("deadline"));
}

#[test]
fn test_generous_deadline_completes() {
    let engine = create_engine();
    let records = engine.validate_batch(&[john_a_smith()]).unwrap();
    let opts = ScreeningOptions::default().with_deadline(Duration::from_secs(60));
    let batch = engine.screen(records, opts).unwrap();
    assert!(!batch.results[0].incomplete);
    assert_eq!(batch.results[0].status, MatchStatus::ConfirmedMatch);
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

#[test]
fn test_publish_does_not_disturb_held_snapshot() {
    let engine = create_engine();
    let held = engine.store().current();
    let before = engine.screen_batch(&[john_a_smith()], &options()).unwrap();
    assert_eq!(before.snapshot_version, 1);

    let refreshed = SnapshotBuilder::new()
        .add_list(
            ListDescriptor::new("OFAC", "OFAC SDN"),
            vec![entry("ofac-9", "Someone Else")],
        )
        .build();
    let version = engine.store().publish(refreshed);
    assert_eq!(version, 2);

    // The snapshot taken before publication is unchanged
    assert_eq!(held.version, 1);
    assert!(held
        .list("OFAC")
        .unwrap()
        .entries
        .iter()
        .any(|e| e.entry.id == "ofac-1"));

    let after = engine.screen_batch(&[john_a_smith()], &options()).unwrap();
    assert_eq!(after.snapshot_version, 2);
    assert_eq!(after.results[0].status, MatchStatus::Clear);
}

#[test]
fn test_identical_data_shares_fingerprint() {
    assert_eq!(
        create_test_snapshot().fingerprint,
        create_test_snapshot().fingerprint
    );
}

#[test]
fn test_wire_response_shape() {
    let engine = create_engine();
    let batch = engine.screen_batch(&[john_a_smith()], &options()).unwrap();
    let json = serde_json::to_value(batch.to_response()).unwrap();

    assert_eq!(json["results"][0]["recordId"], "r1");
    assert_eq!(json["results"][0]["status"], "confirmed_match");
    assert_eq!(
        json["results"][0]["matches"][0]["matchedField"],
        "primary_name"
    );
    assert_eq!(json["summary"]["confirmedMatch"], 1);
    assert!(json.get("warning").is_none());
}
