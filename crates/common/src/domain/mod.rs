//! Domain types shared by every pipeline stage
//!
//! A `Candidate` is normalized at the provider boundary: every field is
//! typed and every citation metric carries a numeric value, so scoring
//! never has to branch on missing data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source tag stored on papers discovered through arXiv
pub const ARXIV_SOURCE: &str = "arXiv";

/// Storage key for an arXiv identifier (`arXiv:{id}`)
pub fn arxiv_key(arxiv_id: &str) -> String {
    format!("{}:{}", ARXIV_SOURCE, arxiv_id)
}

/// Strip the `arXiv:` storage prefix, if present
pub fn strip_arxiv_prefix(key: &str) -> &str {
    key.strip_prefix("arXiv:").unwrap_or(key)
}

/// Citation metrics reported by the bibliography provider.
///
/// `Default` is the zero fallback used whenever the provider has no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationMetrics {
    pub citation_count: i64,
    pub citation_velocity: f64,
    pub influential_citation_count: i64,
    pub year: Option<i32>,
    pub venue: Option<String>,
}

/// A paper observed during search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider identifier without prefix, e.g. `2401.01234v2`
    pub external_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub published: Option<NaiveDate>,
    pub pdf_url: Option<String>,
    pub categories: Vec<String>,
    pub metrics: CitationMetrics,
    /// Set when storage already holds this paper
    pub exists_in_db: bool,
    /// Surrogate id once persisted
    pub stored_id: Option<Uuid>,
}

impl Candidate {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            authors: Vec::new(),
            abstract_text: String::new(),
            published: None,
            pdf_url: None,
            categories: Vec::new(),
            metrics: CitationMetrics::default(),
            exists_in_db: false,
            stored_id: None,
        }
    }

    pub fn storage_key(&self) -> String {
        arxiv_key(&self.external_id)
    }

    /// Author line for prompts: first three names, then "et al."
    pub fn author_line(&self) -> String {
        let mut line = self
            .authors
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if self.authors.len() > 3 {
            line.push_str(" et al.");
        }
        line
    }
}

/// Target reading level of the recommending user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// Prompt profile for one reading level
#[derive(Debug)]
pub struct LevelProfile {
    /// Natural-language label used in difficulty judgments
    pub label: &'static str,
    pub summary_instructions: &'static str,
    pub target_length: &'static str,
}

static BEGINNER: LevelProfile = LevelProfile {
    label: "beginner (new to the field, limited background)",
    summary_instructions: "Write for a reader who is new to this field.\n\
        - State the problem the paper addresses in one sentence.\n\
        - Explain the core idea in plain words, using an everyday analogy where it helps.\n\
        - When a technical term is unavoidable, add a short gloss in brackets.\n\
        - Do not use markdown emphasis; write natural prose.",
    target_length: "200-300 characters",
};

static INTERMEDIATE: LevelProfile = LevelProfile {
    label: "intermediate (familiar with the basics of the field)",
    summary_instructions: "Write for a reader who knows the fundamentals of the field.\n\
        - Name the 2-3 core contributions.\n\
        - Describe the methodology at a conceptual level.\n\
        - Say how the approach differs from prior work.\n\
        - Do not use markdown emphasis; write natural prose.",
    target_length: "300-400 characters",
};

static ADVANCED: LevelProfile = LevelProfile {
    label: "advanced (researcher or expert practitioner)",
    summary_instructions: "Write for an expert in the field.\n\
        - Compress the technical contributions into precise statements.\n\
        - Include the key methodological details.\n\
        - Point out limitations and future directions.\n\
        - Do not use markdown emphasis; write natural prose.",
    target_length: "300-400 characters",
};

impl ReadingLevel {
    /// Parse a level name; anything unrecognized is intermediate
    pub fn parse_loose(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => ReadingLevel::Beginner,
            "advanced" => ReadingLevel::Advanced,
            _ => ReadingLevel::Intermediate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingLevel::Beginner => "beginner",
            ReadingLevel::Intermediate => "intermediate",
            ReadingLevel::Advanced => "advanced",
        }
    }

    pub fn profile(&self) -> &'static LevelProfile {
        match self {
            ReadingLevel::Beginner => &BEGINNER,
            ReadingLevel::Intermediate => &INTERMEDIATE,
            ReadingLevel::Advanced => &ADVANCED,
        }
    }
}

impl std::fmt::Display for ReadingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing_falls_back_to_intermediate() {
        assert_eq!(ReadingLevel::parse_loose("Beginner"), ReadingLevel::Beginner);
        assert_eq!(ReadingLevel::parse_loose(" advanced "), ReadingLevel::Advanced);
        assert_eq!(ReadingLevel::parse_loose("expert"), ReadingLevel::Intermediate);
        assert_eq!(ReadingLevel::parse_loose(""), ReadingLevel::Intermediate);
    }

    #[test]
    fn test_author_line() {
        let mut c = Candidate::new("2401.00001", "t");
        c.authors = vec!["A".into(), "B".into()];
        assert_eq!(c.author_line(), "A, B");

        c.authors = vec!["A".into(), "B".into(), "C".into(), "D".into()];
        assert_eq!(c.author_line(), "A, B, C et al.");
    }

    #[test]
    fn test_storage_key_round_trip() {
        let c = Candidate::new("2401.01234v2", "t");
        assert_eq!(c.storage_key(), "arXiv:2401.01234v2");
        assert_eq!(strip_arxiv_prefix(&c.storage_key()), "2401.01234v2");
        assert_eq!(strip_arxiv_prefix("S2:abc"), "S2:abc");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
