//! Match status tiers
//!
//! Classification is advisory only. A confirmed match signals high
//! confidence to the caller; nothing is blocked here.

use ob_screening_types::{FieldScores, MatchStatus};

use crate::config::DEFAULT_CONFIRM_THRESHOLD;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchClassifier {
    confirm_threshold: f64,
}

impl Default for MatchClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_THRESHOLD)
    }
}

impl MatchClassifier {
    pub fn new(confirm_threshold: f64) -> Self {
        Self {
            confirm_threshold: confirm_threshold.clamp(0.0, 1.0),
        }
    }

    /// Tier for one candidate.
    ///
    /// - below `threshold`: clear
    /// - at or above the confirm cutoff: confirmed
    /// - name at or above `threshold` with an exact identifier, or with exact
    ///   DOB and exact country: confirmed
    /// - otherwise: potential match
    pub fn classify(&self, composite: f64, fields: &FieldScores, threshold: f64) -> MatchStatus {
        if composite < threshold {
            return MatchStatus::Clear;
        }
        if composite >= self.confirm_threshold {
            return MatchStatus::ConfirmedMatch;
        }

        let identifier = fields.id == Some(1.0);
        let dob_and_country = fields.dob == Some(1.0) && fields.country == Some(1.0);
        if fields.name >= threshold && (identifier || dob_and_country) {
            MatchStatus::ConfirmedMatch
        } else {
            MatchStatus::PotentialMatch
        }
    }

    /// Most severe status across all matches; clear when there are none
    pub fn overall_status<I>(statuses: I) -> MatchStatus
    where
        I: IntoIterator<Item = MatchStatus>,
    {
        statuses.into_iter().max().unwrap_or(MatchStatus::Clear)
    }
}
