//! Query feature extraction for adaptive scoring.

use crate::memory::Layer;
use crate::refinery::extract_concepts;

/// Pronouns that signal the query leans on conversation context
const PRONOUNS: &[&str] = &["it", "that", "this", "those", "these", "them"];

/// Interrogative leads
const INTERROGATIVES: &[&str] = &["what", "where", "when", "who", "why", "how", "which"];

/// Deterministic features of a retrieval query
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    /// Concepts extracted with the same extractor used at write time
    pub concepts: Vec<String>,
    /// Layer the query appears to be about
    pub inferred_layer: Option<Layer>,
    /// Sublayer guess (dominant concept)
    pub inferred_sublayer: Option<String>,
    /// Query contains a context-dependent pronoun
    pub has_pronoun: bool,
    /// Query contains an identifier-like token (path, snake_case, version)
    pub has_identifier: bool,
    /// Query reads as a question
    pub is_interrogative: bool,
}

impl QueryFeatures {
    /// Extract features from a normalized query
    pub fn extract(query: &str, lexicon: &[String]) -> Self {
        let lower = query.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| c.is_whitespace())
            .filter(|w| !w.is_empty())
            .collect();

        let has_pronoun = words.iter().any(|w| {
            let stripped = w.trim_matches(|c: char| !c.is_alphanumeric());
            PRONOUNS.contains(&stripped)
        });

        let has_identifier = words.iter().any(|w| looks_like_identifier(w));

        let is_interrogative = lower.trim_end().ends_with('?')
            || words
                .first()
                .map(|w| INTERROGATIVES.contains(w))
                .unwrap_or(false);

        let concepts = extract_concepts(query, lexicon);
        let inferred_sublayer = concepts.first().cloned();

        let inferred_layer = infer_layer(&words);

        Self {
            concepts,
            inferred_layer,
            inferred_sublayer,
            has_pronoun,
            has_identifier,
            is_interrogative,
        }
    }
}

/// Simple heuristics over query words: first-person framing points at the
/// self layer, goal words at intent, everything else at world.
fn infer_layer(words: &[&str]) -> Option<Layer> {
    if words.is_empty() {
        return None;
    }
    let selfish = ["i", "my", "me", "mine", "myself"];
    let intent = ["goal", "plan", "want", "intend", "todo", "next"];
    if words.iter().any(|w| selfish.contains(w)) {
        Some(Layer::Selfhood)
    } else if words.iter().any(|w| intent.contains(w)) {
        Some(Layer::Intent)
    } else {
        Some(Layer::World)
    }
}

/// Paths, snake_case, dotted names, and digit-bearing tokens read as
/// identifiers rather than prose
fn looks_like_identifier(word: &str) -> bool {
    let trimmed = word.trim_matches(|c: char| c == ',' || c == '.' || c == '?' || c == '!');
    if trimmed.len() < 3 {
        return false;
    }
    trimmed.contains('_')
        || trimmed.contains('/')
        || trimmed.contains("::")
        || (trimmed.contains('.') && !trimmed.ends_with('.'))
        || trimmed.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pronoun_detection() {
        let f = QueryFeatures::extract("what is it doing", &[]);
        assert!(f.has_pronoun);
        let f = QueryFeatures::extract("dashboard port number", &[]);
        assert!(!f.has_pronoun);
    }

    #[test]
    fn test_interrogative_detection() {
        assert!(QueryFeatures::extract("where does the dashboard run?", &[]).is_interrogative);
        assert!(QueryFeatures::extract("how to configure locks", &[]).is_interrogative);
        assert!(!QueryFeatures::extract("dashboard runs on port 8000", &[]).is_interrogative);
    }

    #[test]
    fn test_identifier_detection() {
        assert!(QueryFeatures::extract("src/lib.rs ownership", &[]).has_identifier);
        assert!(QueryFeatures::extract("lock_acquire_timeout default", &[]).has_identifier);
        assert!(!QueryFeatures::extract("plain prose words only", &[]).has_identifier);
    }

    #[test]
    fn test_layer_inference() {
        assert_eq!(
            QueryFeatures::extract("my preferred editor settings", &[]).inferred_layer,
            Some(Layer::Selfhood)
        );
        assert_eq!(
            QueryFeatures::extract("plan for the migration", &[]).inferred_layer,
            Some(Layer::Intent)
        );
        assert_eq!(
            QueryFeatures::extract("docker port mapping", &[]).inferred_layer,
            Some(Layer::World)
        );
    }
}
