//! Screening API Types
//!
//! Request and response shapes for batch screening and capability discovery.
//!
//! ## Flow
//!
//! 1. Caller discovers lists and limits via [`CapabilitiesResponse`]
//! 2. Caller submits `RawScreeningRecord[]` plus [`RawScreeningOptions`]
//! 3. Engine answers with [`BatchScreeningResponse`] or a [`ScreeningErrorResponse`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// ENUMS
// ============================================================================

/// Kind of subject being screened or listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    #[default]
    Individual,
    Company,
}

impl std::fmt::Display for SubjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Company => write!(f, "company"),
        }
    }
}

/// Three-tier review classification.
///
/// Variant order is severity order, so `max()` over statuses yields the
/// most severe one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Clear,
    PotentialMatch,
    ConfirmedMatch,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PotentialMatch => "potential_match",
            Self::ConfirmedMatch => "confirmed_match",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// REQUEST
// ============================================================================

/// A raw identity record as submitted by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScreeningRecord {
    /// Caller-side identifier; the engine assigns a positional one when absent
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, rename = "type")]
    pub subject_type: Option<SubjectType>,
    /// ISO-8601 calendar date (YYYY-MM-DD)
    #[serde(default)]
    pub dob: Option<String>,
    /// ISO 3166-1 alpha-2 country code
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub id_number: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Options bag accompanying a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScreeningOptions {
    /// Accepts a number or a numeric string; anything else counts as missing
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub lists: Vec<String>,
    #[serde(default)]
    pub include_aliases: Option<bool>,
    #[serde(default)]
    pub check_dob: Option<bool>,
    #[serde(default)]
    pub check_country: Option<bool>,
    #[serde(default)]
    pub allow_demo_data: bool,
}

/// Request envelope for a batch screen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScreeningRequest {
    pub records: Vec<RawScreeningRecord>,
    #[serde(default)]
    pub options: RawScreeningOptions,
}

/// Helper to deserialize a number, numeric string, or garbage into `Option<f64>`
fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

// ============================================================================
// RESPONSE
// ============================================================================

/// Per-field similarity scores for one candidate
///
/// `None` means the field was not compared (disabled or missing on one side).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldScores {
    pub name: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<f64>,
}

/// One watchlist hit for a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub list_code: String,
    pub entry_id: String,
    /// Primary name of the listed subject
    pub entry_name: String,
    /// The exact string that produced the winning name score
    pub matched_name: String,
    /// "primary_name" or "alias"
    pub matched_field: String,
    pub field_scores: FieldScores,
    pub score: f64,
    pub status: MatchStatus,
}

/// Screening outcome for a single record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResultResponse {
    pub record_id: String,
    pub status: MatchStatus,
    pub matches: Vec<MatchResponse>,
    /// True when the record could not be fully screened (timeout or fault)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Summary statistics for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningSummary {
    pub total: usize,
    pub clear: usize,
    pub potential_match: usize,
    pub confirmed_match: usize,
    /// Records flagged incomplete (counted under their status as well)
    pub incomplete: usize,
    /// Aggregate number of matches across all records
    pub total_matches: usize,
}

/// Batch screening response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScreeningResponse {
    /// Aligned 1:1 with the submitted records
    pub results: Vec<ScreeningResultResponse>,
    pub summary: ScreeningSummary,
    pub is_demo_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Version of the index snapshot the batch was screened against
    pub snapshot_version: u64,
}

/// Machine-readable rejection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningErrorResponse {
    /// Stable reason code, e.g. "batch_too_large" or "no_data_sources"
    pub code: String,
    pub message: String,
}

// ============================================================================
// CAPABILITY DISCOVERY
// ============================================================================

/// Per-source list metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    pub code: String,
    pub name: String,
    pub entry_count: usize,
    #[serde(default)]
    pub last_refreshed: Option<DateTime<Utc>>,
    pub available: bool,
}

/// Liveness of a single list source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceStatus {
    pub live: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DataSourceStatus {
    pub fn live() -> Self {
        Self {
            live: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            live: false,
            reason: Some(reason.into()),
        }
    }
}

/// Capability discovery document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResponse {
    pub lists: Vec<ListMetadata>,
    pub default_threshold: f64,
    pub max_batch_size: usize,
    pub data_source_status: BTreeMap<String, DataSourceStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_severity_order() {
        assert!(MatchStatus::Clear < MatchStatus::PotentialMatch);
        assert!(MatchStatus::PotentialMatch < MatchStatus::ConfirmedMatch);
        let worst = [
            MatchStatus::PotentialMatch,
            MatchStatus::ConfirmedMatch,
            MatchStatus::Clear,
        ]
        .into_iter()
        .max();
        assert_eq!(worst, Some(MatchStatus::ConfirmedMatch));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&MatchStatus::PotentialMatch).unwrap();
        assert_eq!(json, "\"potential_match\"");
    }

    #[test]
    fn test_record_accepts_minimal_shape() {
        let record: RawScreeningRecord = serde_json::from_str(r#"{"name": "John Smith"}"#).unwrap();
        assert_eq!(record.name, "John Smith");
        assert!(record.id.is_none());
        assert!(record.aliases.is_empty());
        assert!(record.subject_type.is_none());
    }

    #[test]
    fn test_record_camel_case_fields() {
        let record: RawScreeningRecord = serde_json::from_str(
            r#"{"id": "c-1", "name": "Acme Ltd", "type": "company", "idNumber": "GB123", "aliases": ["Acme"]}"#,
        )
        .unwrap();
        assert_eq!(record.subject_type, Some(SubjectType::Company));
        assert_eq!(record.id_number.as_deref(), Some("GB123"));
        assert_eq!(record.aliases, vec!["Acme".to_string()]);
    }

    #[test]
    fn test_lenient_threshold() {
        let opts: RawScreeningOptions = serde_json::from_str(r#"{"threshold": 0.8}"#).unwrap();
        assert_eq!(opts.threshold, Some(0.8));

        let opts: RawScreeningOptions = serde_json::from_str(r#"{"threshold": "0.75"}"#).unwrap();
        assert_eq!(opts.threshold, Some(0.75));

        let opts: RawScreeningOptions = serde_json::from_str(r#"{"threshold": "high"}"#).unwrap();
        assert_eq!(opts.threshold, None);

        let opts: RawScreeningOptions = serde_json::from_str(r#"{"threshold": null}"#).unwrap();
        assert_eq!(opts.threshold, None);

        let opts: RawScreeningOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.threshold, None);
        assert!(!opts.allow_demo_data);
    }

    #[test]
    fn test_incomplete_flag_omitted_when_false() {
        let result = ScreeningResultResponse {
            record_id: "r1".to_string(),
            status: MatchStatus::Clear,
            matches: vec![],
            incomplete: false,
            note: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("incomplete").is_none());
        assert_eq!(json["recordId"], "r1");
    }
}
