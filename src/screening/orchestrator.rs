//! Batch orchestration
//!
//! `ScreeningEngine` validates a batch, resolves lists against one snapshot,
//! fans (record × list) work units across a bounded rayon pool and
//! reassembles results in input order.
//!
//! Failure policy:
//! - validation and "no data sources" reject the whole batch
//! - a scoring fault or panic degrades only the affected record to
//!   needs-review (potential match, incomplete)
//! - an expired deadline leaves unfinished records as needs-review and adds
//!   a warning; it never fabricates a clear result

use ob_screening_types::{
    CapabilitiesResponse, MatchStatus, RawScreeningOptions, RawScreeningRecord,
};
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::classifier::MatchClassifier;
use super::demo::{demo_snapshot, DEMO_LIST_CODE, DEMO_WARNING};
use super::index::{ListPartition, SnapshotStore};
use super::options::{validate_threshold_or, ScreeningOptions};
use super::registry::DataSourceRegistry;
use super::scorer::{CandidateScorer, QueryProfile, SimilarityScorer};
use super::types::{
    summarize, BatchScreeningResult, MatchCandidate, ScreeningRecord, ScreeningResult,
};
use crate::config::ScreeningConfig;
use crate::error::{Result, ScoringError, ScreeningError, ValidationError};

/// Candidates scored between deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// Why a work unit did not finish cleanly
#[derive(Debug, Clone, PartialEq)]
enum UnitFailure {
    DeadlineExceeded,
    Scoring(ScoringError),
}

/// Result of screening one record against one list
#[derive(Debug, Default)]
struct UnitOutcome {
    matches: Vec<MatchCandidate>,
    failure: Option<UnitFailure>,
}

/// The screening engine
pub struct ScreeningEngine {
    config: ScreeningConfig,
    store: Arc<SnapshotStore>,
    scorer: Arc<dyn CandidateScorer>,
    classifier: MatchClassifier,
    pool: rayon::ThreadPool,
}

impl ScreeningEngine {
    /// Create an engine over a snapshot store.
    ///
    /// The worker pool is sized from `defaults.workers`, else one per
    /// available core.
    pub fn new(config: ScreeningConfig, store: Arc<SnapshotStore>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ScreeningError::Config(e.to_string()))?;

        let workers = config.defaults.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("screening-{}", i))
            .build()
            .map_err(|e| {
                ScreeningError::Config(format!("failed to start worker pool: {}", e))
            })?;

        info!(workers, "Screening engine ready");

        Ok(Self {
            scorer: Arc::new(SimilarityScorer::new(config.scoring.clone())),
            classifier: MatchClassifier::new(config.defaults.confirm_threshold),
            config,
            store,
            pool,
        })
    }

    /// Replace the candidate scorer
    pub fn with_scorer(mut self, scorer: Arc<dyn CandidateScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Capability discovery document for the current snapshot
    pub fn capabilities(&self) -> CapabilitiesResponse {
        let registry = DataSourceRegistry::new(self.store.current(), false);
        CapabilitiesResponse {
            lists: registry.available_lists(),
            default_threshold: self.config.defaults.threshold,
            max_batch_size: self.config.defaults.max_batch_size,
            data_source_status: registry.data_source_status(),
        }
    }

    /// Validate raw records. The first invalid record rejects the batch.
    pub fn validate_batch(
        &self,
        records: &[RawScreeningRecord],
    ) -> std::result::Result<Vec<ScreeningRecord>, ValidationError> {
        self.check_batch_size(records.len())?;
        let min = self.config.defaults.min_name_length;
        records
            .iter()
            .enumerate()
            .map(|(index, raw)| ScreeningRecord::from_raw(index, raw, min))
            .collect()
    }

    fn check_batch_size(&self, size: usize) -> std::result::Result<(), ValidationError> {
        let max = self.config.defaults.max_batch_size;
        if size == 0 {
            Err(ValidationError::EmptyBatch)
        } else if size > max {
            Err(ValidationError::BatchTooLarge { size, max })
        } else {
            Ok(())
        }
    }

    /// Screen a batch of raw caller records
    pub fn screen_batch(
        &self,
        records: &[RawScreeningRecord],
        options: &RawScreeningOptions,
    ) -> Result<BatchScreeningResult> {
        let records = self.validate_batch(records).map_err(|e| {
            warn!(reason = e.reason_code(), error = %e, "Rejected screening batch");
            e
        })?;
        let options = ScreeningOptions::from_raw(options, &self.config.defaults);
        self.screen(records, options)
    }

    /// Screen already-validated records
    #[instrument(skip_all, fields(records = records.len(), threshold = options.threshold))]
    pub fn screen(
        &self,
        records: Vec<ScreeningRecord>,
        options: ScreeningOptions,
    ) -> Result<BatchScreeningResult> {
        self.check_batch_size(records.len())?;
        let threshold = validate_threshold_or(
            Some(options.threshold),
            self.config.defaults.threshold,
        );
        let options = ScreeningOptions {
            threshold,
            ..options
        };
        let started = Instant::now();
        let deadline = options.deadline.and_then(|d| started.checked_add(d));

        let snapshot = self.store.current();
        let registry = DataSourceRegistry::new(snapshot, options.allow_demo_data);
        let resolution = registry.resolve(&options.lists);

        let mut warnings = resolution.warnings();
        for warning in &warnings {
            warn!("{}", warning);
        }

        let (snapshot, list_codes, is_demo_data) = if resolution.is_empty() {
            if !registry.demo_allowed() {
                warn!(requested = ?options.lists, "No live data sources for batch");
                return Err(ScreeningError::NoDataSources {
                    requested: options.lists.clone(),
                    unavailable: resolution
                        .dropped
                        .into_iter()
                        .map(|(code, _)| code)
                        .collect(),
                });
            }
            warn!("No live data sources; falling back to demo list");
            warnings.push(DEMO_WARNING.to_string());
            (demo_snapshot()?, vec![DEMO_LIST_CODE.to_string()], true)
        } else {
            (registry.snapshot().clone(), resolution.lists, false)
        };

        let partitions: Vec<&ListPartition> = list_codes
            .iter()
            .filter_map(|code| snapshot.list(code))
            .collect();

        debug!(
            lists = ?list_codes,
            snapshot_version = snapshot.version,
            "Resolved lists for batch"
        );

        let outcomes = self.run_units(&records, &partitions, &options, deadline);
        let deadline_hit = outcomes
            .iter()
            .any(|o| o.failure == Some(UnitFailure::DeadlineExceeded));
        let results = self.assemble(&records, &partitions, outcomes);

        let incomplete = results.iter().filter(|r| r.incomplete).count();
        if incomplete > 0 {
            warnings.push(format!(
                "{} of {} records could not be fully screened and need review",
                incomplete,
                results.len()
            ));
        }
        if let Some(limit) = options.deadline.filter(|_| deadline_hit) {
            warn!(
                deadline_ms = limit.as_millis() as u64,
                incomplete,
                "Batch deadline exceeded"
            );
            warnings.push(format!(
                "batch deadline of {} ms exceeded",
                limit.as_millis()
            ));
        }

        let summary = summarize(&results);
        info!(
            total = summary.total,
            potential = summary.potential_match,
            confirmed = summary.confirmed_match,
            incomplete = summary.incomplete,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Screened batch"
        );

        Ok(BatchScreeningResult {
            results,
            summary,
            is_demo_data,
            warnings,
            snapshot_version: snapshot.version,
        })
    }

    /// Run every (record × list) unit on the pool, collected in unit order
    fn run_units(
        &self,
        records: &[ScreeningRecord],
        partitions: &[&ListPartition],
        options: &ScreeningOptions,
        deadline: Option<Instant>,
    ) -> Vec<UnitOutcome> {
        let lists = partitions.len();
        if lists == 0 {
            return Vec::new();
        }

        self.pool.install(|| {
            let queries: Vec<QueryProfile> = records
                .par_iter()
                .map(|record| QueryProfile::new(record, options))
                .collect();

            (0..records.len() * lists)
                .into_par_iter()
                .map(|unit| {
                    let query = &queries[unit / lists];
                    let partition = partitions[unit % lists];
                    catch_unwind(AssertUnwindSafe(|| {
                        self.screen_unit(query, partition, options, deadline)
                    }))
                    .unwrap_or_else(|payload| {
                        let message = panic_message(payload.as_ref());
                        warn!(
                            record = %query.record_id,
                            list = %partition.code(),
                            panic = %message,
                            "Scoring panicked; record will need review"
                        );
                        UnitOutcome {
                            matches: Vec::new(),
                            failure: Some(UnitFailure::Scoring(ScoringError::Panicked(message))),
                        }
                    })
                })
                .collect()
        })
    }

    fn screen_unit(
        &self,
        query: &QueryProfile,
        partition: &ListPartition,
        options: &ScreeningOptions,
        deadline: Option<Instant>,
    ) -> UnitOutcome {
        let mut outcome = UnitOutcome::default();
        if expired(deadline) {
            outcome.failure = Some(UnitFailure::DeadlineExceeded);
            return outcome;
        }

        for (i, candidate) in partition
            .candidates(&query.block_keys)
            .into_iter()
            .enumerate()
        {
            if i > 0 && i % DEADLINE_CHECK_INTERVAL == 0 && expired(deadline) {
                outcome.failure = Some(UnitFailure::DeadlineExceeded);
                return outcome;
            }

            let scores = match self.scorer.score(query, candidate) {
                Ok(scores) => scores,
                Err(e) => {
                    warn!(
                        record = %query.record_id,
                        list = %partition.code(),
                        entry = %candidate.entry.id,
                        error = %e,
                        "Scoring fault; record will need review"
                    );
                    outcome.failure.get_or_insert(UnitFailure::Scoring(e));
                    continue;
                }
            };

            let status =
                self.classifier
                    .classify(scores.composite, &scores.field_scores, options.threshold);
            if status == MatchStatus::Clear {
                continue;
            }
            outcome.matches.push(MatchCandidate {
                list_code: partition.code().to_string(),
                entry: Arc::clone(&candidate.entry),
                field_scores: scores.field_scores,
                score: scores.composite,
                status,
                matched_name: scores.matched_name,
                matched_field: scores.matched_field,
            });
        }

        outcome
    }

    /// Fold unit outcomes back into one result per record, in input order
    fn assemble(
        &self,
        records: &[ScreeningRecord],
        partitions: &[&ListPartition],
        outcomes: Vec<UnitOutcome>,
    ) -> Vec<ScreeningResult> {
        let lists = partitions.len().max(1);
        let mut outcomes = outcomes.into_iter();

        records
            .iter()
            .map(|record| {
                let mut matches = Vec::new();
                let mut notes: Vec<String> = Vec::new();

                for (partition, outcome) in
                    partitions.iter().zip(outcomes.by_ref().take(lists))
                {
                    matches.extend(outcome.matches);
                    match outcome.failure {
                        Some(UnitFailure::DeadlineExceeded) => notes.push(format!(
                            "deadline exceeded before list '{}' was fully screened",
                            partition.code()
                        )),
                        Some(UnitFailure::Scoring(e)) => {
                            notes.push(format!("list '{}': {}", partition.code(), e))
                        }
                        None => {}
                    }
                }

                sort_matches(&mut matches);

                if notes.is_empty() {
                    ScreeningResult {
                        record_id: record.id.clone(),
                        status: MatchClassifier::overall_status(
                            matches.iter().map(|m| m.status),
                        ),
                        matches,
                        incomplete: false,
                        note: None,
                    }
                } else {
                    ScreeningResult::needs_review(record.id.clone(), matches, notes.join("; "))
                }
            })
            .collect()
    }
}

/// Highest score first; ties by list code then entry id
fn sort_matches(matches: &mut [MatchCandidate]) {
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.list_code.cmp(&b.list_code))
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
