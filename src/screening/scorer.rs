//! Multi-field similarity scoring
//!
//! Name similarity blends a soft token-set score (tokens paired by
//! Jaro-Winkler) with a character-level normalized Levenshtein score over
//! the sorted tokens. Word order, middle initials and diacritics therefore
//! do not move the score, while single-character typos only dent it.
//!
//! DOB, country and identifier are exact-match signals. The composite is a
//! weighted average over the fields actually compared; an exact identifier
//! match lifts it to at least the configured floor.

use chrono::{Datelike, NaiveDate};
use ob_screening_types::FieldScores;
use smallvec::SmallVec;

use super::index::{blocking_keys, identifier_key, IndexedEntry, IndexedName};
use super::normalize::{normalize, NormalizedName};
use super::options::ScreeningOptions;
use super::types::{MatchedField, ScreeningRecord};
use crate::config::ScoringWeights;
use crate::error::ScoringError;

/// Jaro-Winkler similarity at which two tokens count as the same word
const TOKEN_MATCH_SIMILARITY: f64 = 0.88;

// ============================================================================
// QUERY
// ============================================================================

/// A record prepared once for scoring against every candidate
#[derive(Debug, Clone)]
pub struct QueryProfile {
    pub record_id: String,
    /// Record name first, then its aliases when aliases are in play
    pub names: Vec<NormalizedName>,
    pub block_keys: Vec<String>,
    pub dob: Option<NaiveDate>,
    pub country: Option<String>,
    pub id_number: Option<String>,
    pub include_aliases: bool,
    pub check_dob: bool,
    pub check_country: bool,
}

impl QueryProfile {
    pub fn new(record: &ScreeningRecord, options: &ScreeningOptions) -> Self {
        let mut names = vec![normalize(&record.name, record.subject_type)];
        if options.include_aliases {
            names.extend(
                record
                    .aliases
                    .iter()
                    .map(|a| normalize(a, record.subject_type))
                    .filter(|n| !n.is_empty()),
            );
        }

        let mut block_keys: Vec<String> = Vec::new();
        for name in &names {
            for key in blocking_keys(name) {
                if !block_keys.contains(&key) {
                    block_keys.push(key);
                }
            }
        }
        if let Some(id) = &record.id_number {
            block_keys.push(identifier_key(id));
        }

        Self {
            record_id: record.id.clone(),
            names,
            block_keys,
            dob: record.dob,
            country: record.country.clone(),
            id_number: record.id_number.clone(),
            include_aliases: options.include_aliases,
            check_dob: options.check_dob,
            check_country: options.check_country,
        }
    }
}

/// Scores for one (query, candidate) pair, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScores {
    pub field_scores: FieldScores,
    /// Always within [0, 1]
    pub composite: f64,
    pub matched_name: String,
    pub matched_field: MatchedField,
}

/// Scores a query against a single candidate.
///
/// Implementations must be pure: the same inputs always give the same output.
pub trait CandidateScorer: Send + Sync {
    fn score(
        &self,
        query: &QueryProfile,
        candidate: &IndexedEntry,
    ) -> Result<MatchScores, ScoringError>;
}

// ============================================================================
// DEFAULT SCORER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    weights: ScoringWeights,
}

impl SimilarityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Best name score over the query names and the candidate names in play.
    ///
    /// Ties keep the earlier pairing, so the primary name wins over an alias
    /// scoring the same.
    fn best_name<'a>(
        &self,
        query: &QueryProfile,
        candidate: &'a IndexedEntry,
    ) -> Option<(f64, &'a IndexedName)> {
        let mut best: Option<(f64, &IndexedName)> = None;
        for indexed in &candidate.names {
            if indexed.is_alias && !query.include_aliases {
                continue;
            }
            for name in &query.names {
                let score = name_similarity(name, &indexed.normalized, &self.weights);
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, indexed));
                }
            }
        }
        best
    }

    fn dob_score(&self, query: &QueryProfile, candidate: &IndexedEntry) -> Option<f64> {
        if !query.check_dob {
            return None;
        }
        let (a, b) = (query.dob?, candidate.entry.dob?);
        Some(dob_similarity(a, b, self.weights.dob_day_month_credit))
    }

    fn country_score(&self, query: &QueryProfile, candidate: &IndexedEntry) -> Option<f64> {
        if !query.check_country {
            return None;
        }
        let (a, b) = (query.country.as_deref()?, candidate.country.as_deref()?);
        Some(if a == b { 1.0 } else { 0.0 })
    }
}

impl CandidateScorer for SimilarityScorer {
    fn score(
        &self,
        query: &QueryProfile,
        candidate: &IndexedEntry,
    ) -> Result<MatchScores, ScoringError> {
        let (name, matched_name, matched_field) = match self.best_name(query, candidate) {
            Some((score, indexed)) => (
                score,
                indexed.raw.clone(),
                if indexed.is_alias {
                    MatchedField::Alias
                } else {
                    MatchedField::PrimaryName
                },
            ),
            None => (
                0.0,
                candidate.entry.primary_name.clone(),
                MatchedField::PrimaryName,
            ),
        };

        let field_scores = FieldScores {
            name,
            dob: self.dob_score(query, candidate),
            country: self.country_score(query, candidate),
            id: identifier_score(query.id_number.as_deref(), &candidate.identifiers),
        };

        let composite = composite_score(&field_scores, &self.weights);
        if !composite.is_finite() {
            return Err(ScoringError::NonFiniteScore {
                entry_id: candidate.entry.id.clone(),
            });
        }

        Ok(MatchScores {
            field_scores,
            composite,
            matched_name,
            matched_field,
        })
    }
}

// ============================================================================
// FIELD SIMILARITIES
// ============================================================================

/// Tokens worth comparing: single-letter initials are dropped unless they are all there is
fn significant_tokens(name: &NormalizedName) -> SmallVec<[&str; 6]> {
    let tokens: SmallVec<[&str; 6]> = name
        .tokens
        .iter()
        .map(String::as_str)
        .filter(|t| t.chars().count() > 1)
        .collect();
    if tokens.is_empty() {
        name.tokens.iter().map(String::as_str).collect()
    } else {
        tokens
    }
}

/// Soft token-set similarity.
///
/// Tokens are paired greedily by descending Jaro-Winkler similarity, each
/// token used at most once; pairs below [`TOKEN_MATCH_SIMILARITY`] do not
/// count. The summed pair similarity is divided by the size of the token union.
pub fn token_set_similarity(a: &[&str], b: &[&str]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            let sim = strsim::jaro_winkler(x, y);
            if sim >= TOKEN_MATCH_SIMILARITY {
                pairs.push((sim, i, j));
            }
        }
    }
    pairs.sort_by(|p, q| {
        q.0.total_cmp(&p.0)
            .then(p.1.cmp(&q.1))
            .then(p.2.cmp(&q.2))
    });

    let mut used_a = vec![false; a.len()];
    let mut used_b = vec![false; b.len()];
    let mut matched = 0usize;
    let mut total = 0.0;
    for (sim, i, j) in pairs {
        if used_a[i] || used_b[j] {
            continue;
        }
        used_a[i] = true;
        used_b[j] = true;
        matched += 1;
        total += sim;
    }

    total / (a.len() + b.len() - matched) as f64
}

/// Normalized Levenshtein over the sorted, space-joined tokens
pub fn character_similarity(a: &[&str], b: &[&str]) -> f64 {
    let join = |tokens: &[&str]| {
        let mut sorted = tokens.to_vec();
        sorted.sort_unstable();
        sorted.join(" ")
    };
    let (a, b) = (join(a), join(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Combined name similarity in [0, 1]
pub fn name_similarity(a: &NormalizedName, b: &NormalizedName, weights: &ScoringWeights) -> f64 {
    let ta = significant_tokens(a);
    let tb = significant_tokens(b);

    let score = weights.token_weight * token_set_similarity(&ta, &tb)
        + (1.0 - weights.token_weight) * character_similarity(&ta, &tb);

    let disjoint_suffixes = !a.suffixes.is_empty()
        && !b.suffixes.is_empty()
        && !a.suffixes.iter().any(|s| b.suffixes.contains(s));
    let penalty = if disjoint_suffixes {
        weights.suffix_mismatch_penalty
    } else {
        0.0
    };

    (score - penalty).clamp(0.0, 1.0)
}

/// Exact date → 1.0; same day and month in another year → `day_month_credit`; else 0
pub fn dob_similarity(a: NaiveDate, b: NaiveDate, day_month_credit: f64) -> f64 {
    if a == b {
        1.0
    } else if a.month() == b.month() && a.day() == b.day() {
        day_month_credit
    } else {
        0.0
    }
}

/// `None` unless both sides carry identifiers
pub fn identifier_score(query: Option<&str>, identifiers: &[String]) -> Option<f64> {
    let id = query?;
    if identifiers.is_empty() {
        return None;
    }
    Some(if identifiers.iter().any(|i| i == id) {
        1.0
    } else {
        0.0
    })
}

/// Weighted average over the compared fields, lifted by an exact identifier
/// match and clamped to [0, 1]
pub fn composite_score(fields: &FieldScores, weights: &ScoringWeights) -> f64 {
    let mut weighted = weights.name_weight * fields.name;
    let mut total_weight = weights.name_weight;

    if let Some(dob) = fields.dob {
        weighted += weights.dob_weight * dob;
        total_weight += weights.dob_weight;
    }
    if let Some(country) = fields.country {
        weighted += weights.country_weight * country;
        total_weight += weights.country_weight;
    }

    let mut composite = weighted / total_weight;
    if fields.id == Some(1.0) {
        composite = composite.max(weights.identifier_floor);
    }
    composite.clamp(0.0, 1.0)
}
