//! Search text normalization
//!
//! Raw user text mixes booking-intent filler ("I need an appointment with..."),
//! honorific titles in English and Arabic, and the actual name/specialty the
//! upstream search understands. Two cleaned variants are produced because title
//! stripping is order-sensitive: some doctors are registered with the title as
//! part of their display name, so the dispatcher searches with titles kept
//! first and only falls back to the fully stripped variant on zero results.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// Intent tokens are matched on word boundaries, not trailing whitespace, so a
// token in final position ("dermatology booking") is stripped too.
static EN_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(appointment|appointments|book|booking|need|want|looking for|find|search|show me|with)\b")
        .expect("intent pattern")
});

static AR_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(موعد|مواعيد|احجز|حجز|ابحث|بحث|اريد|ابي|عند|مع)\b").expect("intent pattern")
});

static EN_HONORIFIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(dr\.?|doctor|prof\.?|professor)\s+").expect("honorific pattern")
});

static EN_HONORIFIC_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(dr\.?|doctor|doctors|prof\.?|professor)$").expect("honorific pattern")
});

// Arabic honorifics appear with or without the definite-article prefix
// (e.g. "دكتور" and "الدكتور").
static AR_HONORIFIC_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(ال)?(طبيب|دكتورة|دكتور|استشاري|بروفيسور)\s+").expect("honorific pattern")
});

static AR_HONORIFIC_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+(ال)?(طبيب|دكتورة|دكتور|استشاري|بروفيسور)$").expect("honorific pattern")
});

/// Two-letter language tag detected from the search text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::English => "en",
        }
    }
}

/// Detect language from the presence of Arabic-range characters.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
        Language::Arabic
    } else {
        Language::English
    }
}

/// Both cleaned variants of a raw search text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSearch {
    /// Booking-intent filler removed, honorific titles kept.
    pub common_removed: String,
    /// Filler and honorific titles removed.
    pub honorifics_removed: String,
}

impl NormalizedSearch {
    /// Whether the stripped variants differ, i.e. a title-less retry is worth making.
    pub fn has_distinct_fallback(&self) -> bool {
        self.common_removed != self.honorifics_removed
    }

    /// True when nothing searchable survived stripping. Callers must treat this
    /// as a validation failure, not as "search everything".
    pub fn is_empty(&self) -> bool {
        self.common_removed.is_empty() && self.honorifics_removed.is_empty()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip booking-intent phrases and honorifics from raw search text.
pub fn normalize(raw: &str) -> NormalizedSearch {
    let mut common = raw.to_string();
    common = EN_INTENT.replace_all(&common, "").into_owned();
    common = AR_INTENT.replace_all(&common, "").into_owned();
    let common = collapse_whitespace(common.trim());

    let mut stripped = common.clone();
    stripped = EN_HONORIFIC_PREFIX.replace_all(&stripped, "").into_owned();
    stripped = EN_HONORIFIC_SUFFIX.replace_all(&stripped, "").into_owned();
    stripped = AR_HONORIFIC_PREFIX.replace_all(&stripped, "").into_owned();
    stripped = AR_HONORIFIC_SUFFIX.replace_all(&stripped, "").into_owned();
    let stripped = collapse_whitespace(stripped.trim());

    NormalizedSearch {
        common_removed: common,
        honorifics_removed: stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Dr. Smith", "Smith")]
    #[case("Smith Dr.", "Smith")]
    #[case("Doctor Smith", "Smith")]
    #[case("Smith doctor", "Smith")]
    #[case("Prof. Jane Miller", "Jane Miller")]
    fn test_english_honorific_both_positions(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).honorifics_removed, expected);
    }

    #[rstest]
    #[case("دكتور خالد فاروقي", "خالد فاروقي")]
    #[case("الدكتور خالد فاروقي", "خالد فاروقي")]
    #[case("خالد فاروقي دكتور", "خالد فاروقي")]
    #[case("استشاري جراحة قلب", "جراحة قلب")]
    fn test_arabic_honorific_both_positions(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).honorifics_removed, expected);
    }

    #[test]
    fn test_intent_phrases_removed_in_first_variant() {
        let n = normalize("I need an appointment with Dr. Smith");
        assert_eq!(n.common_removed, "I an Dr. Smith");
        assert_eq!(n.honorifics_removed, "I an Smith");
    }

    #[test]
    fn test_arabic_intent_phrases_removed() {
        let n = normalize("احجز موعد مع دكتور خالد");
        assert_eq!(n.common_removed, "دكتور خالد");
        assert_eq!(n.honorifics_removed, "خالد");
    }

    #[test]
    fn test_titles_kept_in_first_variant() {
        let n = normalize("Dr. Khalid Farouqi");
        assert_eq!(n.common_removed, "Dr. Khalid Farouqi");
        assert_eq!(n.honorifics_removed, "Khalid Farouqi");
        assert!(n.has_distinct_fallback());
    }

    #[test]
    fn test_empty_after_stripping() {
        let n = normalize("booking appointment");
        assert!(n.is_empty());
    }

    #[rstest]
    #[case("dermatology booking", "dermatology")]
    #[case("cardiology appointment", "cardiology")]
    #[case("خالد فاروقي موعد", "خالد فاروقي")]
    fn test_trailing_intent_word_removed(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).common_removed, expected);
    }

    #[test]
    fn test_intent_only_arabic_strips_to_empty() {
        assert!(normalize("احجز موعد").is_empty());
    }

    #[test]
    fn test_whitespace_collapsed() {
        let n = normalize("  cardiology    clinic ");
        assert_eq!(n.common_removed, "cardiology clinic");
    }

    #[test]
    fn test_specialty_untouched() {
        let n = normalize("dermatology");
        assert_eq!(n.common_removed, "dermatology");
        assert_eq!(n.honorifics_removed, "dermatology");
        assert!(!n.has_distinct_fallback());
    }

    #[test]
    fn test_language_detection() {
        assert_eq!(detect_language("خالد فاروقي"), Language::Arabic);
        assert_eq!(detect_language("Khalid Farouqi"), Language::English);
        assert_eq!(detect_language(""), Language::English);
        assert_eq!(detect_language("clinic عيادة"), Language::Arabic);
    }
}
