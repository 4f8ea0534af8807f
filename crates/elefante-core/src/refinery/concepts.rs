//! Deterministic concept extraction and surfaces-when inference.

use std::collections::HashMap;

/// Stop words stripped before concept ranking
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "i", "if", "in", "into", "is", "it", "its", "my", "no", "not", "of", "on", "or",
    "our", "she", "so", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "use", "was", "we", "were", "when", "where", "which", "while", "who", "will",
    "with", "would", "you", "your", "always", "never", "should", "must", "can", "could", "may",
    "do", "does", "did", "done",
];

/// Maximum number of concepts returned
const MAX_CONCEPTS: usize = 5;

/// Minimum token length considered
const MIN_TOKEN_LEN: usize = 3;

/// Extract the top concepts from normalized content.
///
/// Scoring: frequency, plus a boost for terms in the technical lexicon, plus
/// early-position weight. Ties break on first occurrence. Returns up to five
/// lowercased tokens.
pub fn extract_concepts(content: &str, lexicon: &[String]) -> Vec<String> {
    let lower = content.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(t))
        .collect();

    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (pos, token) in tokens.iter().enumerate() {
        let entry = scores.entry(token).or_insert(0.0);
        *entry += 1.0;
        // Early words carry more identity than trailing ones
        *entry += (1.0 - (pos as f64 * 0.05)).max(0.0) * 0.5;
        if lexicon.iter().any(|l| l == token) {
            *entry += 2.0;
        }
        first_seen.entry(token).or_insert(pos);
    }

    let mut ranked: Vec<(&str, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| first_seen[a.0].cmp(&first_seen[b.0]))
    });

    ranked
        .into_iter()
        .take(MAX_CONCEPTS)
        .map(|(t, _)| t.to_string())
        .collect()
}

/// Synthesize query patterns a memory should surface for, based on content
/// markers. Bounded to keep the denormalized list small.
pub fn infer_surfaces_when(content: &str, concepts: &[String]) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut patterns = Vec::new();

    let error_marker = ["error", "fail", "failure", "crash", "bug"]
        .iter()
        .any(|m| lower.contains(m));
    let practice_marker = ["always", "never", "must", "should"]
        .iter()
        .any(|m| lower.contains(m));
    let setup_marker = ["config", "setup", "install", "configure"]
        .iter()
        .any(|m| lower.contains(m));

    for concept in concepts.iter().take(2) {
        if error_marker {
            patterns.push(format!("{} error", concept));
            patterns.push(format!("{} problem", concept));
        }
        if practice_marker {
            patterns.push(format!("{} best practice", concept));
            patterns.push(format!("how to {}", concept));
        }
        if setup_marker {
            patterns.push(format!("{} setup", concept));
        }
    }

    patterns.truncate(10);
    patterns
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Vec<String> {
        vec!["docker".to_string(), "dashboard".to_string(), "port".to_string()]
    }

    #[test]
    fn test_extract_strips_stop_words() {
        let concepts = extract_concepts("the quick brown fox is in the barn", &[]);
        assert!(!concepts.iter().any(|c| c == "the" || c == "is" || c == "in"));
        assert!(concepts.iter().any(|c| c == "quick"));
    }

    #[test]
    fn test_extract_boosts_lexicon_terms() {
        let concepts = extract_concepts(
            "something mundane mentions docker once at the very end",
            &lexicon(),
        );
        assert_eq!(concepts[0], "docker");
    }

    #[test]
    fn test_extract_caps_at_five() {
        let concepts = extract_concepts(
            "alpha bravo charlie delta echo foxtrot golf hotel india juliet",
            &[],
        );
        assert_eq!(concepts.len(), 5);
    }

    #[test]
    fn test_extract_deterministic() {
        let text = "Docker container for dashboard runs on port 8000";
        assert_eq!(extract_concepts(text, &lexicon()), extract_concepts(text, &lexicon()));
    }

    #[test]
    fn test_surfaces_when_error_marker() {
        let concepts = vec!["docker".to_string()];
        let patterns = infer_surfaces_when("docker build fails with exit code 1", &concepts);
        assert!(patterns.contains(&"docker error".to_string()));
        assert!(patterns.contains(&"docker problem".to_string()));
    }

    #[test]
    fn test_surfaces_when_practice_marker() {
        let concepts = vec!["paths".to_string()];
        let patterns = infer_surfaces_when("always use absolute paths", &concepts);
        assert!(patterns.contains(&"paths best practice".to_string()));
        assert!(patterns.contains(&"how to paths".to_string()));
    }

    #[test]
    fn test_surfaces_when_no_markers() {
        let patterns = infer_surfaces_when("plain statement of a value", &["value".to_string()]);
        assert!(patterns.is_empty());
    }
}
