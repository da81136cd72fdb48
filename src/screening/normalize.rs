//! Text normalization for watchlist matching
//!
//! Provides deterministic, idempotent normalization for identity names:
//! - Unicode NFKD fold with diacritics removed
//! - Lowercase conversion
//! - Punctuation stripping (replace with space)
//! - Whitespace collapsing
//! - Trailing legal suffixes isolated as a separate signal
//! - Leading honorifics stripped for individuals
//!
//! Idempotence holds on the canonical rendering:
//! `normalize(&normalize(x, t).canonical(), t) == normalize(x, t)`.

use ob_screening_types::SubjectType;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Legal suffixes and the canonical form each one folds to
const LEGAL_SUFFIXES: &[(&str, &str)] = &[
    ("inc", "inc"),
    ("incorporated", "inc"),
    ("corp", "corp"),
    ("corporation", "corp"),
    ("llc", "llc"),
    ("ltd", "ltd"),
    ("limited", "ltd"),
    ("plc", "plc"),
    ("sa", "sa"),
    ("ag", "ag"),
    ("gmbh", "gmbh"),
    ("co", "co"),
    ("company", "co"),
    ("lp", "lp"),
    ("llp", "llp"),
    ("nv", "nv"),
    ("bv", "bv"),
    ("sarl", "sarl"),
    ("sas", "sas"),
    ("se", "se"),
    ("kg", "kg"),
    ("ohg", "ohg"),
    ("pty", "pty"),
    ("pte", "pte"),
    ("jsc", "jsc"),
    ("ooo", "ooo"),
];

/// Honorifics stripped from the front of individual names
const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "miss", "mx", "dr", "prof", "sir", "dame", "lord", "lady", "rev", "hon",
    "sheikh", "mme", "mlle", "herr", "frau",
];

/// Letters NFKD does not decompose into a base letter
fn fold_special(c: char) -> Option<&'static str> {
    match c {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ø' => Some("o"),
        'đ' => Some("d"),
        'ð' => Some("d"),
        'ł' => Some("l"),
        'þ' => Some("th"),
        'ı' => Some("i"),
        _ => None,
    }
}

/// A name reduced to comparable tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NormalizedName {
    /// Significant name tokens, in original order
    pub tokens: Vec<String>,
    /// Canonical legal suffixes (e.g. "ltd", "gmbh") split off the end
    pub suffixes: Vec<String>,
}

impl NormalizedName {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.suffixes.is_empty()
    }

    /// Core tokens joined by single spaces
    pub fn core(&self) -> String {
        self.tokens.join(" ")
    }

    /// Full canonical rendering: core tokens followed by suffixes
    pub fn canonical(&self) -> String {
        self.tokens
            .iter()
            .chain(self.suffixes.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Fold raw text to lowercase, diacritic-free, single-spaced words.
///
/// # Examples
///
/// ```
/// use ob_screening::screening::normalize::fold_text;
///
/// assert_eq!(fold_text("  José   MARÍA-López "), "jose maria lopez");
/// assert_eq!(fold_text("Straße"), "strasse");
/// ```
pub fn fold_text(s: &str) -> String {
    let mut folded = String::with_capacity(s.len());
    for c in s.nfkd().flat_map(char::to_lowercase) {
        if is_combining_mark(c) {
            continue;
        }
        if let Some(replacement) = fold_special(c) {
            folded.push_str(replacement);
        } else if c.is_alphanumeric() {
            folded.push(c);
        } else {
            folded.push(' ');
        }
    }

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an identity name for matching.
pub fn normalize(raw: &str, subject: SubjectType) -> NormalizedName {
    let folded = fold_text(raw);
    let mut tokens: Vec<String> = folded.split_whitespace().map(str::to_string).collect();

    if subject == SubjectType::Individual {
        let leading = tokens
            .iter()
            .take_while(|t| HONORIFICS.contains(&t.as_str()))
            .count();
        // Never strip the whole name
        let strip = leading.min(tokens.len().saturating_sub(1));
        tokens.drain(..strip);
    }

    // Trailing run of legal suffixes, leaving at least one core token
    let mut suffixes = Vec::new();
    while tokens.len() > 1 {
        let Some(canonical) = tokens.last().and_then(|t| canonical_suffix(t)) else {
            break;
        };
        suffixes.push(canonical.to_string());
        tokens.pop();
    }
    suffixes.reverse();

    NormalizedName { tokens, suffixes }
}

/// Canonical form of a legal suffix token, if it is one
pub fn canonical_suffix(token: &str) -> Option<&'static str> {
    LEGAL_SUFFIXES
        .iter()
        .find(|(variant, _)| *variant == token)
        .map(|(_, canonical)| *canonical)
}

/// Normalize an identifier (passport, registration number) for exact comparison.
///
/// Returns `None` when nothing alphanumeric remains.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let id: String = fold_text(raw)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect();
    (!id.is_empty()).then_some(id)
}

/// Normalize a country code to upper-case ISO form
pub fn normalize_country(raw: &str) -> Option<String> {
    let code: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!code.is_empty()).then_some(code)
}
