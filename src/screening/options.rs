//! Screening options, validated once per batch call

use ob_screening_types::RawScreeningOptions;
use std::time::Duration;

use crate::config::{EngineDefaults, DEFAULT_THRESHOLD};

/// Fully-typed options for one batch. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningOptions {
    /// Always within [0, 1]
    pub threshold: f64,
    /// Requested list codes, upper-cased and de-duplicated. Empty means all live lists.
    pub lists: Vec<String>,
    pub include_aliases: bool,
    pub check_dob: bool,
    pub check_country: bool,
    pub allow_demo_data: bool,
    /// Overall batch deadline, measured from the start of the call
    pub deadline: Option<Duration>,
}

impl Default for ScreeningOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            lists: Vec::new(),
            include_aliases: true,
            check_dob: true,
            check_country: true,
            allow_demo_data: false,
            deadline: None,
        }
    }
}

impl ScreeningOptions {
    /// Normalize a caller options bag against engine defaults
    pub fn from_raw(raw: &RawScreeningOptions, defaults: &EngineDefaults) -> Self {
        Self {
            threshold: validate_threshold_or(raw.threshold, defaults.threshold),
            lists: normalize_list_codes(&raw.lists),
            include_aliases: raw.include_aliases.unwrap_or(true),
            check_dob: raw.check_dob.unwrap_or(true),
            check_country: raw.check_country.unwrap_or(true),
            allow_demo_data: raw.allow_demo_data,
            deadline: defaults.deadline_ms.map(Duration::from_millis),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = validate_threshold(Some(threshold));
        self
    }

    pub fn with_lists<I, S>(mut self, lists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lists: Vec<String> = lists.into_iter().map(Into::into).collect();
        self.lists = normalize_list_codes(&lists);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn allow_demo_data(mut self) -> Self {
        self.allow_demo_data = true;
        self
    }

    pub fn without_aliases(mut self) -> Self {
        self.include_aliases = false;
        self
    }
}

/// Clamp a threshold to [0, 1], substituting the default when missing or not finite.
///
/// Never fails.
pub fn validate_threshold(threshold: Option<f64>) -> f64 {
    validate_threshold_or(threshold, DEFAULT_THRESHOLD)
}

/// Same as [`validate_threshold`] with an explicit fallback
pub fn validate_threshold_or(threshold: Option<f64>, default: f64) -> f64 {
    match threshold {
        Some(t) if t.is_finite() => t.clamp(0.0, 1.0),
        _ => default.clamp(0.0, 1.0),
    }
}

fn normalize_list_codes(lists: &[String]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(lists.len());
    for code in lists {
        let code = code.trim().to_ascii_uppercase();
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}
