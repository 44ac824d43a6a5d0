//! Fuzzy doctor-name matching
//!
//! Doctor name queries are frequently transliterated or contain typos, so when
//! an exact upstream search comes back empty the dispatcher re-fetches the full
//! doctor pool and ranks every candidate against the query with a
//! Levenshtein-based similarity score.

use crate::doctors::RawDoctorRow;

fn lower_chars(s: &str) -> Vec<char> {
    s.chars().flat_map(|c| c.to_lowercase()).collect()
}

/// Case-insensitive edit distance (insertions, deletions, substitutions, unit cost).
pub fn distance(a: &str, b: &str) -> usize {
    distance_chars(&lower_chars(a), &lower_chars(b))
}

fn distance_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized similarity in `[0, 1]`. Two empty strings are identical by definition.
///
/// Lengths are measured after lowercasing, which can expand a char (e.g.
/// 'İ' lowers to "i" plus a combining dot); measuring the originals would let
/// the distance exceed the length bound.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = lower_chars(a);
    let b = lower_chars(b);
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - distance_chars(&a, &b) as f64 / max_len as f64
}

/// Minimum overall score for a fuzzy candidate to be kept.
pub const MATCH_THRESHOLD: f64 = 0.7;

/// Maximum number of fuzzy matches returned.
pub const MATCH_LIMIT: usize = 30;

/// Bonus multiplier when the first query word matches the first name word.
/// Users searching by given name expect given-name matches ranked above
/// coincidental matches elsewhere in a full name.
const FIRST_WORD_BONUS: f64 = 1.2;

/// Score one candidate name field against the query words.
///
/// Returns the best of whole-string similarity and single-word-pair similarity,
/// with the first-word bonus applied when query word 0 and name word 0 agree
/// above the threshold. Surname-only queries get no boost.
fn score_name(query: &str, query_words: &[&str], name: &str) -> f64 {
    let whole = similarity(query, name);

    let name_words: Vec<&str> = name.split_whitespace().collect();
    let mut best_word = 0.0f64;
    let mut first_word = 0.0f64;

    for (i, qw) in query_words.iter().enumerate() {
        for (j, nw) in name_words.iter().enumerate() {
            let word_score = similarity(qw, nw);
            best_word = best_word.max(word_score);
            if i == 0 && j == 0 && word_score > MATCH_THRESHOLD {
                first_word = word_score * FIRST_WORD_BONUS;
            }
        }
    }

    whole.max(best_word).max(first_word)
}

/// Rank the full candidate pool against a query, keeping the rows scoring at or
/// above [`MATCH_THRESHOLD`], best first, capped to [`MATCH_LIMIT`].
pub fn rank_candidates(query: &str, pool: Vec<RawDoctorRow>) -> Vec<RawDoctorRow> {
    let query_lower = query.to_lowercase();
    let query_words: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .collect();

    let mut scored: Vec<(f64, RawDoctorRow)> = pool
        .into_iter()
        .filter_map(|row| {
            let name_en = row.doctor_name.as_deref().unwrap_or("").to_lowercase();
            let name_ar = row.doctor_name_localized.as_deref().unwrap_or("").to_lowercase();

            let score = score_name(&query_lower, &query_words, &name_en)
                .max(score_name(&query_lower, &query_words, &name_ar));

            (score >= MATCH_THRESHOLD).then_some((score, row))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MATCH_LIMIT);
    scored.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctors::tests_support::row;

    #[test]
    fn test_distance_basic() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
        assert_eq!(distance("abc", "abc"), 0);
    }

    #[test]
    fn test_distance_case_insensitive() {
        assert_eq!(distance("Khalid", "khalid"), 0);
        assert_eq!(distance("DR", "dr"), 0);
    }

    #[test]
    fn test_similarity_bounds() {
        let pairs = [
            ("khalid", "khaled"),
            ("", "anything"),
            ("farouqi", "farooqi"),
            ("عيادة", "عيادات"),
            // Lowercasing expands 'İ' to two chars; the bound must still hold.
            ("İ", "x"),
            ("İstanbul", "istanbul"),
        ];
        for (a, b) in pairs {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "similarity({a:?},{b:?}) = {s}");
            assert_eq!(similarity(a, b), similarity(b, a), "symmetry for {a:?}/{b:?}");
        }
    }

    #[test]
    fn test_similarity_identity() {
        assert_eq!(similarity("khalid farouqi", "khalid farouqi"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_rank_keeps_close_names() {
        let pool = vec![
            row("1", "Khaled Farouqi", "F1", "S1", "100"),
            row("2", "Omar Haddad", "F1", "S1", "101"),
        ];
        let ranked = rank_candidates("Khalid Farouqi", pool);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].doctor_id.as_str(), "1");
    }

    #[test]
    fn test_rank_first_word_bonus_orders_given_name_match_first() {
        // Both share a word with the query; the given-name match must win.
        let pool = vec![
            row("surname-only", "Ahmed Khalid", "F1", "S1", "100"),
            row("given-name", "Khalid Mansour", "F1", "S1", "101"),
        ];
        let ranked = rank_candidates("Khalid Mansur", pool);
        assert!(!ranked.is_empty());
        assert_eq!(ranked[0].doctor_id.as_str(), "given-name");
    }

    #[test]
    fn test_rank_caps_results() {
        let pool: Vec<RawDoctorRow> = (0..60)
            .map(|i| row(&format!("{i}"), "Khalid Farouqi", "F1", "S1", "100"))
            .collect();
        let ranked = rank_candidates("Khalid Farouqi", pool);
        assert_eq!(ranked.len(), MATCH_LIMIT);
    }

    #[test]
    fn test_rank_matches_localized_name() {
        let mut r = row("ar", "", "F1", "S1", "100");
        r.doctor_name_localized = Some("خالد فاروقي".to_string());
        let ranked = rank_candidates("خالد فاروقي", vec![r]);
        assert_eq!(ranked.len(), 1);
    }
}
