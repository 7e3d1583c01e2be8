//! Fuzzy classification of OCR lines against the loot catalog.
//!
//! Lines and catalog texts are compared case-insensitively after whitespace
//! normalization. The dissimilarity of a line against an entry is the smaller of
//!
//! - the normalized Levenshtein distance of the whole line, and
//! - the best Levenshtein distance of any entry-length window of the line,
//!   divided by the entry length (catches an entry embedded in a longer line).
//!
//! The best entry wins if its dissimilarity is at most the configured
//! threshold. Ties go to the entry declared first in the catalog.

use rayon::prelude::*;
use std::sync::Arc;

use crate::models::catalog::Catalog;
use crate::models::report::MatchResult;
use crate::services::ocr::parser::normalize_line;

/// Pre-normalized catalog text
#[derive(Debug)]
struct IndexedEntry {
    text: String,
    chars: Vec<char>,
}

/// Best candidate for a line
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Position in catalog order
    pub index: usize,
    pub bucket_name: String,
    /// 0.0 = identical, 1.0 = nothing in common
    pub dissimilarity: f64,
}

/// Catalog index built once and queried per line
pub struct BucketMatcher {
    catalog: Arc<Catalog>,
    index: Vec<IndexedEntry>,
    threshold: f64,
}

impl BucketMatcher {
    pub fn new(catalog: Arc<Catalog>, threshold: f64) -> Self {
        let index = catalog
            .entries()
            .iter()
            .map(|entry| {
                let text = fold(&entry.match_text);
                let chars = text.chars().collect();
                IndexedEntry { text, chars }
            })
            .collect();

        Self {
            catalog,
            index,
            threshold,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Closest catalog entry regardless of threshold
    pub fn best_candidate(&self, line: &str) -> Option<Candidate> {
        let line = fold(line);
        if line.is_empty() {
            return None;
        }
        let line_chars: Vec<char> = line.chars().collect();

        let mut best: Option<(usize, f64)> = None;
        for (i, entry) in self.index.iter().enumerate() {
            let score = dissimilarity(&line, &line_chars, entry);
            // Strict comparison keeps the earliest entry on ties
            if best.map_or(true, |(_, best_score)| score < best_score) {
                best = Some((i, score));
            }
        }

        best.map(|(index, dissimilarity)| Candidate {
            index,
            bucket_name: self.catalog.entries()[index].bucket_name.clone(),
            dissimilarity,
        })
    }

    /// Bucket for a line, or None when nothing is similar enough
    pub fn match_line(&self, line: &str) -> Option<String> {
        self.best_candidate(line)
            .filter(|c| c.dissimilarity <= self.threshold)
            .map(|c| c.bucket_name)
    }

    /// Classify a batch of lines, keeping input order
    pub fn match_lines(&self, lines: &[String]) -> Vec<MatchResult> {
        lines
            .par_iter()
            .map(|line| MatchResult::new(line.as_str(), self.match_line(line)))
            .collect()
    }
}

/// Normalize and lowercase for comparison
fn fold(text: &str) -> String {
    normalize_line(text).to_lowercase()
}

fn dissimilarity(line: &str, line_chars: &[char], entry: &IndexedEntry) -> f64 {
    let whole = 1.0 - strsim::normalized_levenshtein(line, &entry.text);

    let width = entry.chars.len();
    if line_chars.len() <= width || width == 0 {
        return whole;
    }

    let best_window = line_chars
        .windows(width)
        .map(|window| {
            let window: String = window.iter().collect();
            strsim::levenshtein(&window, &entry.text)
        })
        .min()
        .unwrap_or(width);

    whole.min(best_window as f64 / width as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::CatalogEntry;
    use bigdecimal::BigDecimal;

    fn builtin_matcher() -> BucketMatcher {
        BucketMatcher::new(Arc::new(Catalog::builtin()), 0.5)
    }

    fn single_entry_matcher() -> BucketMatcher {
        let catalog = Catalog::new(vec![CatalogEntry::new(
            "You got Black Resurrection",
            "Black Resurrection Flame",
            BigDecimal::from(200_000_000),
        )])
        .unwrap();
        BucketMatcher::new(Arc::new(catalog), 0.5)
    }

    #[test]
    fn test_exact_line_matches() {
        let matcher = builtin_matcher();

        assert_eq!(
            matcher.match_line("You got Crimson Resurrection"),
            Some("Crimson Resurrection Flame".to_string())
        );
    }

    #[test]
    fn test_ocr_typo_still_matches() {
        let matcher = single_entry_matcher();

        assert_eq!(
            matcher.match_line("You got Black Resurrectlon"),
            Some("Black Resurrection Flame".to_string())
        );
    }

    #[test]
    fn test_garbage_line_has_no_match() {
        let matcher = single_entry_matcher();
        assert_eq!(matcher.match_line("garbage line"), None);
    }

    #[test]
    fn test_zero_similarity_line_has_no_match() {
        let matcher = builtin_matcher();

        let candidate = matcher.best_candidate("zzzz").unwrap();
        assert!(candidate.dissimilarity > 0.9, "got {}", candidate.dissimilarity);
        assert_eq!(matcher.match_line("zzzz"), None);
    }

    #[test]
    fn test_empty_line_has_no_match() {
        let matcher = builtin_matcher();

        assert_eq!(matcher.match_line(""), None);
        assert_eq!(matcher.match_line("   \t "), None);
        assert!(matcher.best_candidate("").is_none());
    }

    #[test]
    fn test_case_and_spacing_ignored() {
        let matcher = builtin_matcher();

        assert_eq!(
            matcher.match_line("  YOU GOT   sparkling red "),
            Some("Sparkling Red Potion".to_string())
        );
    }

    #[test]
    fn test_closest_of_similar_entries_wins() {
        let matcher = builtin_matcher();

        assert_eq!(
            matcher.match_line("You got Sparkling Blue"),
            Some("Sparkling Blue Potion".to_string())
        );
        assert_eq!(
            matcher.match_line("You got Unextinguished x1"),
            Some("Unextinguished Flame x1".to_string())
        );
        assert_eq!(
            matcher.match_line("You got Black never-extinguishing"),
            Some("Black Never-extinguishing Flame".to_string())
        );
    }

    #[test]
    fn test_entry_embedded_in_longer_line() {
        let matcher = builtin_matcher();

        assert_eq!(
            matcher.match_line("[12:04] You got Large Boss Medal of Honor (1)"),
            Some("Large Boss Medal of Honor".to_string())
        );
    }

    #[test]
    fn test_tie_resolves_to_first_entry() {
        let catalog = Catalog::new(vec![
            CatalogEntry::new("You got Gem", "First Gem", BigDecimal::from(1)),
            CatalogEntry::new("You got Gem", "Second Gem", BigDecimal::from(2)),
        ])
        .unwrap();
        let matcher = BucketMatcher::new(Arc::new(catalog), 0.5);

        for _ in 0..10 {
            assert_eq!(matcher.match_line("You got Gem"), Some("First Gem".to_string()));
        }
    }

    #[test]
    fn test_threshold_zero_requires_exact_text() {
        let catalog = Arc::new(Catalog::builtin());
        let strict = BucketMatcher::new(Arc::clone(&catalog), 0.0);

        assert_eq!(
            strict.match_line("You got Sparkling Red"),
            Some("Sparkling Red Potion".to_string())
        );
        assert_eq!(strict.match_line("You got Sparkling Rcd"), None);
    }

    #[test]
    fn test_threshold_one_accepts_anything() {
        let lenient = BucketMatcher::new(Arc::new(Catalog::builtin()), 1.0);
        assert!(lenient.match_line("qqqq").is_some());
    }

    #[test]
    fn test_match_is_deterministic() {
        let matcher = builtin_matcher();
        let line = "You g0t Rainb0w Resurectin";

        let first = matcher.best_candidate(line);
        for _ in 0..20 {
            assert_eq!(matcher.best_candidate(line), first);
        }
    }

    #[test]
    fn test_match_lines_preserves_order() {
        let matcher = builtin_matcher();
        let lines = vec![
            "You got Sparkling Red".to_string(),
            "noise".to_string(),
            "You got Black Resurrection".to_string(),
        ];

        let results = matcher.match_lines(&lines);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].line, "You got Sparkling Red");
        assert_eq!(results[0].bucket.as_deref(), Some("Sparkling Red Potion"));
        assert_eq!(results[1].bucket, None);
        assert_eq!(results[2].bucket.as_deref(), Some("Black Resurrection Flame"));
    }
}
