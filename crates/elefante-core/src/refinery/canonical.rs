//! Canonical key - the deterministic identity of a concept.
//!
//! Grammar (bit-exact for interop):
//!
//! ```text
//! canonical_key := subject "-" aspect "-" qualifier
//! subject       := [A-Za-z][A-Za-z0-9]{0,9}
//! aspect        := [A-Za-z][A-Za-z0-9]{0,9}
//! qualifier     := [A-Za-z][A-Za-z0-9]{0,9}
//! total length  <= 30
//! ```

use serde::{Deserialize, Serialize};

use crate::memory::{KnowledgeType, Layer};

/// Maximum length of each component
const COMPONENT_MAX: usize = 10;

/// Maximum total key length, dashes included
const KEY_MAX: usize = 30;

/// Qualifier words with too little semantic value to identify a concept
const BANNED_QUALIFIERS: &[&str] = &["really", "very", "favorite", "update", "new"];

/// A validated `{Subject}-{Aspect}-{Qualifier}` identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalKey {
    subject: String,
    aspect: String,
    qualifier: String,
}

impl CanonicalKey {
    /// Parse a string that must already satisfy the grammar exactly
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() > KEY_MAX {
            return None;
        }
        let mut parts = s.split('-');
        let subject = parts.next()?;
        let aspect = parts.next()?;
        let qualifier = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if [subject, aspect, qualifier].iter().all(|c| is_component(c)) {
            Some(Self {
                subject: subject.to_string(),
                aspect: aspect.to_string(),
                qualifier: qualifier.to_string(),
            })
        } else {
            None
        }
    }

    /// Sanitize an agent-supplied key into the grammar.
    ///
    /// Non-`[A-Za-z0-9-]` characters become `-`, repeated dashes collapse,
    /// components are truncated deterministically, and the first three
    /// well-formed components are kept. Returns `None` when no valid triple
    /// survives.
    pub fn sanitize(raw: &str) -> Option<Self> {
        let mut cleaned = String::with_capacity(raw.len());
        for c in raw.chars() {
            if c.is_ascii_alphanumeric() {
                cleaned.push(c);
            } else {
                cleaned.push('-');
            }
        }

        let components: Vec<String> = cleaned
            .split('-')
            .filter_map(sanitize_component)
            .take(3)
            .collect();

        if components.len() != 3 {
            return None;
        }

        let mut key = Self {
            subject: components[0].clone(),
            aspect: components[1].clone(),
            qualifier: components[2].clone(),
        };
        key.fit();
        Some(key)
    }

    /// Derive a key from layer, sublayer, knowledge type, and the dominant
    /// concept. Falls back to `World-Fact-General`.
    pub fn derive(
        layer: Layer,
        sublayer: &str,
        knowledge_type: KnowledgeType,
        concepts: &[String],
    ) -> Self {
        let subject = layer.subject().to_string();

        let aspect = sublayer
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find_map(sanitize_component)
            .unwrap_or_else(|| title_case(knowledge_type.as_str()));

        let qualifier = concepts
            .iter()
            .filter(|c| !BANNED_QUALIFIERS.contains(&c.to_lowercase().as_str()))
            .find_map(|c| sanitize_component(c))
            .unwrap_or_else(|| "General".to_string());

        let mut key = Self {
            subject,
            aspect,
            qualifier,
        };
        key.fit();
        key
    }

    /// Fallback identity for content nothing else could classify
    pub fn fallback() -> Self {
        Self {
            subject: "World".to_string(),
            aspect: "Fact".to_string(),
            qualifier: "General".to_string(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Truncate components deterministically until the joined key fits.
    /// The longest component loses characters first; ties break toward the
    /// rightmost component.
    fn fit(&mut self) {
        for comp in [&mut self.subject, &mut self.aspect, &mut self.qualifier] {
            comp.truncate(COMPONENT_MAX);
        }
        while self.subject.len() + self.aspect.len() + self.qualifier.len() + 2 > KEY_MAX {
            let lens = [self.subject.len(), self.aspect.len(), self.qualifier.len()];
            let max = *lens.iter().max().unwrap_or(&1);
            if max <= 1 {
                break;
            }
            if self.qualifier.len() == max {
                self.qualifier.truncate(max - 1);
            } else if self.aspect.len() == max {
                self.aspect.truncate(max - 1);
            } else {
                self.subject.truncate(max - 1);
            }
        }
    }
}

impl std::fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.subject, self.aspect, self.qualifier)
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for CanonicalKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        CanonicalKey::parse(&s).ok_or_else(|| format!("invalid canonical key: {}", s))
    }
}

/// True when `c` matches `[A-Za-z][A-Za-z0-9]{0,9}`
fn is_component(c: &str) -> bool {
    !c.is_empty()
        && c.len() <= COMPONENT_MAX
        && c.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && c.chars().all(|ch| ch.is_ascii_alphanumeric())
}

/// Strip leading non-letters, truncate, title-case the first letter.
/// `None` when nothing letter-led survives.
fn sanitize_component(raw: &str) -> Option<String> {
    let trimmed: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_alphabetic())
        .filter(|c| c.is_ascii_alphanumeric())
        .take(COMPONENT_MAX)
        .collect();
    if trimmed.is_empty() {
        return None;
    }
    Some(title_case(&trimmed))
}

/// Uppercase the first ASCII letter, leave the rest as-is
fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
