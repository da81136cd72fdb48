//! Screening data model
//!
//! Typed counterparts of the wire shapes in `ob-screening-types`, plus the
//! watchlist entry owned by the list refresh process.

use chrono::{DateTime, NaiveDate, Utc};
use ob_screening_types::{
    BatchScreeningResponse, FieldScores, MatchResponse, MatchStatus, RawScreeningRecord,
    ScreeningResultResponse, ScreeningSummary, SubjectType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::normalize::{normalize, normalize_country, normalize_identifier};
use crate::error::ValidationError;

// ============================================================================
// INPUT
// ============================================================================

/// A validated identity record
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningRecord {
    pub id: String,
    pub name: String,
    pub subject_type: SubjectType,
    pub dob: Option<NaiveDate>,
    /// Upper-case ISO code
    pub country: Option<String>,
    /// Normalized identifier
    pub id_number: Option<String>,
    pub aliases: Vec<String>,
}

impl ScreeningRecord {
    /// Validate a raw record at position `index` of its batch.
    ///
    /// The name must have at least `min_name_length` characters and must not
    /// normalize to nothing.
    pub fn from_raw(
        index: usize,
        raw: &RawScreeningRecord,
        min_name_length: usize,
    ) -> Result<Self, ValidationError> {
        let id = raw
            .id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("record-{}", index));
        let subject_type = raw.subject_type.unwrap_or_default();
        let name = raw.name.trim();

        if name.chars().count() < min_name_length || normalize(name, subject_type).is_empty() {
            return Err(ValidationError::NameTooShort {
                index,
                id,
                min: min_name_length,
            });
        }

        let dob = match raw.dob.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => Some(NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                ValidationError::InvalidDob {
                    index,
                    id: id.clone(),
                    value: value.to_string(),
                }
            })?),
            None => None,
        };

        let aliases = raw
            .aliases
            .iter()
            .map(|a| a.trim())
            .filter(|a| !normalize(a, subject_type).is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            id,
            name: name.to_string(),
            subject_type,
            dob,
            country: raw.country.as_deref().and_then(normalize_country),
            id_number: raw.id_number.as_deref().and_then(normalize_identifier),
            aliases,
        })
    }
}

/// A single subject on a watchlist.
///
/// Owned by the list refresh process; read-only during screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    pub id: String,
    /// Filled in from the source descriptor when loaded from a list file
    #[serde(default)]
    pub list_code: String,
    pub primary_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, rename = "type")]
    pub subject_type: SubjectType,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub source_timestamp: Option<DateTime<Utc>>,
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Which name on the watchlist entry produced the winning name score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchedField {
    PrimaryName,
    Alias,
}

impl MatchedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryName => "primary_name",
            Self::Alias => "alias",
        }
    }
}

/// A watchlist entry that reached the threshold for a record
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub list_code: String,
    pub entry: Arc<WatchlistEntry>,
    pub field_scores: FieldScores,
    pub score: f64,
    pub status: MatchStatus,
    pub matched_name: String,
    pub matched_field: MatchedField,
}

impl MatchCandidate {
    pub fn to_response(&self) -> MatchResponse {
        MatchResponse {
            list_code: self.list_code.clone(),
            entry_id: self.entry.id.clone(),
            entry_name: self.entry.primary_name.clone(),
            matched_name: self.matched_name.clone(),
            matched_field: self.matched_field.as_str().to_string(),
            field_scores: self.field_scores,
            score: self.score,
            status: self.status,
        }
    }
}

/// Screening outcome for one record
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningResult {
    pub record_id: String,
    pub status: MatchStatus,
    /// Highest score first
    pub matches: Vec<MatchCandidate>,
    /// Set when screening could not finish; status is then never `Clear`
    pub incomplete: bool,
    pub note: Option<String>,
}

impl ScreeningResult {
    /// Conservative result for a record that could not be fully screened
    pub fn needs_review(
        record_id: impl Into<String>,
        matches: Vec<MatchCandidate>,
        note: impl Into<String>,
    ) -> Self {
        let status = matches
            .iter()
            .map(|m| m.status)
            .max()
            .unwrap_or(MatchStatus::PotentialMatch)
            .max(MatchStatus::PotentialMatch);
        Self {
            record_id: record_id.into(),
            status,
            matches,
            incomplete: true,
            note: Some(note.into()),
        }
    }

    pub fn to_response(&self) -> ScreeningResultResponse {
        ScreeningResultResponse {
            record_id: self.record_id.clone(),
            status: self.status,
            matches: self
                .matches
                .iter()
                .map(MatchCandidate::to_response)
                .collect(),
            incomplete: self.incomplete,
            note: self.note.clone(),
        }
    }
}

/// Outcome of a whole batch, aligned 1:1 with the input records
#[derive(Debug, Clone, PartialEq)]
pub struct BatchScreeningResult {
    pub results: Vec<ScreeningResult>,
    pub summary: ScreeningSummary,
    pub is_demo_data: bool,
    pub warnings: Vec<String>,
    pub snapshot_version: u64,
}

impl BatchScreeningResult {
    /// All warnings joined into one human-readable string
    pub fn warning(&self) -> Option<String> {
        if self.warnings.is_empty() {
            None
        } else {
            Some(self.warnings.join("; "))
        }
    }

    pub fn to_response(&self) -> BatchScreeningResponse {
        BatchScreeningResponse {
            results: self
                .results
                .iter()
                .map(ScreeningResult::to_response)
                .collect(),
            summary: self.summary,
            is_demo_data: self.is_demo_data,
            warning: self.warning(),
            snapshot_version: self.snapshot_version,
        }
    }
}

/// Pure reduction of results into summary counts
pub fn summarize(results: &[ScreeningResult]) -> ScreeningSummary {
    results
        .iter()
        .fold(ScreeningSummary::default(), |mut summary, result| {
            summary.total += 1;
            match result.status {
                MatchStatus::Clear => summary.clear += 1,
                MatchStatus::PotentialMatch => summary.potential_match += 1,
                MatchStatus::ConfirmedMatch => summary.confirmed_match += 1,
            }
            if result.incomplete {
                summary.incomplete += 1;
            }
            summary.total_matches += result.matches.len();
            summary
        })
}
