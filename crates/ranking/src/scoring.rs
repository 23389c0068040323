//! Composite scoring
//!
//! Four signals, each in [0, 1]:
//! - recentness: step function over age in days
//! - citation: saturating count and velocity terms
//! - keyword_match: LLM-judged topical relevance
//! - difficulty: LLM-judged reading-level fit
//!
//! The heuristic variant swaps the two LLM signals for a substring
//! overlap score so it can run over the whole candidate pool.

use chrono::{NaiveDate, Utc};
use paperpilot_common::config::ScoringConfig;
use paperpilot_common::domain::{truncate_chars, Candidate, CitationMetrics, ReadingLevel};
use paperpilot_common::llm::parse::parse_score;
use paperpilot_common::llm::{CompletionRequest, LlmPurpose, TextGenerator};
use paperpilot_common::metrics::record_fallback;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Score for a missing publication date
const UNKNOWN_DATE_SCORE: f64 = 0.5;

/// Keyword score when no interest word is found
const KEYWORD_FLOOR: f64 = 0.3;

/// Full score breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreVector {
    pub recentness: f64,
    pub citation: f64,
    pub keyword_match: f64,
    pub difficulty: f64,
    pub total: f64,
}

/// LLM-free score breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeuristicScore {
    pub recentness: f64,
    pub citation: f64,
    pub keyword_simple: f64,
    pub total: f64,
}

pub struct ScoringEngine {
    llm: Arc<dyn TextGenerator>,
    config: ScoringConfig,
    reference_date: Option<NaiveDate>,
}

impl ScoringEngine {
    pub fn new(llm: Arc<dyn TextGenerator>, config: ScoringConfig) -> Self {
        Self {
            llm,
            config,
            reference_date: None,
        }
    }

    /// Pin "today" for age computations
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn recentness(&self, published: Option<NaiveDate>) -> f64 {
        let Some(published) = published else {
            return UNKNOWN_DATE_SCORE;
        };

        match (self.today() - published).num_days() {
            i64::MIN..=30 => 1.0,
            31..=90 => 0.8,
            91..=180 => 0.6,
            181..=365 => 0.4,
            _ => 0.2,
        }
    }

    pub fn citation(metrics: &CitationMetrics) -> f64 {
        let count = metrics.citation_count as f64;
        let velocity = metrics.citation_velocity;

        // NaN fails `> 0.0` and scores zero
        let count_term = if count > 0.0 { (count / 100.0).min(1.0) } else { 0.0 };
        let velocity_term = if velocity > 0.0 { (velocity / 10.0).min(1.0) } else { 0.0 };

        count_term * 0.7 + velocity_term * 0.3
    }

    /// Substring overlap between interest and title/abstract
    pub fn keyword_simple(candidate: &Candidate, interest: &str) -> f64 {
        let interest = interest.trim().to_lowercase();
        if interest.is_empty() {
            return KEYWORD_FLOOR;
        }

        let title = candidate.title.to_lowercase();
        let abstract_text = candidate.abstract_text.to_lowercase();

        if title.contains(&interest) {
            return 1.0;
        }
        if abstract_text.contains(&interest) {
            return 0.6;
        }

        let words: Vec<&str> = interest.split_whitespace().collect();
        let matches = words
            .iter()
            .filter(|w| title.contains(*w) || abstract_text.contains(*w))
            .count();

        if matches == 0 {
            KEYWORD_FLOOR
        } else {
            (matches as f64 / words.len() as f64).min(1.0)
        }
    }

    pub fn heuristic(&self, candidate: &Candidate, interest: &str) -> HeuristicScore {
        let w = self.config.heuristic_weights;
        let recentness = self.recentness(candidate.published);
        let citation = Self::citation(&candidate.metrics);
        let keyword_simple = Self::keyword_simple(candidate, interest);

        HeuristicScore {
            recentness,
            citation,
            keyword_simple,
            total: recentness * w.recentness + citation * w.citation + keyword_simple * w.keyword_simple,
        }
    }

    /// LLM-judged topical relevance; neutral on failure
    pub async fn keyword_match(&self, candidate: &Candidate, interest: &str) -> f64 {
        let prompt = format!(
            "Rate how relevant the following paper is to the given research interest, \
             as a score between 0 and 1.\n\
             Research interest: {interest}\n\n\
             Paper title: {title}\n\
             Abstract: {excerpt}\n\n\
             Answer with the relevance score only, as a number (e.g. 0.85).",
            title = candidate.title,
            excerpt = truncate_chars(&candidate.abstract_text, self.config.abstract_excerpt_chars),
        );
        self.judge(LlmPurpose::Relevance, prompt, &candidate.external_id).await
    }

    /// LLM-judged reading-level fit; neutral on failure
    pub async fn difficulty(&self, candidate: &Candidate, level: ReadingLevel) -> f64 {
        let prompt = format!(
            "Read the abstract below and rate how suitable this paper is for a {label} reader, \
             as a score between 0 and 1.\n\n\
             Abstract: {excerpt}\n\n\
             Answer with the suitability score only, as a number (e.g. 0.75).",
            label = level.profile().label,
            excerpt = truncate_chars(&candidate.abstract_text, self.config.abstract_excerpt_chars),
        );
        self.judge(LlmPurpose::Difficulty, prompt, &candidate.external_id).await
    }

    async fn judge(&self, purpose: LlmPurpose, prompt: String, external_id: &str) -> f64 {
        let neutral = self.config.neutral_score;
        let request = CompletionRequest::for_purpose(purpose, prompt);

        match self.llm.complete(&request).await {
            Ok(text) => parse_score(&text).unwrap_or_else(|| {
                warn!(
                    arxiv_id = external_id,
                    purpose = purpose.as_str(),
                    response = %text,
                    "Unparseable score, using neutral default"
                );
                record_fallback("scoring");
                neutral
            }),
            Err(e) => {
                warn!(
                    arxiv_id = external_id,
                    purpose = purpose.as_str(),
                    error = %e,
                    "Score request failed, using neutral default"
                );
                record_fallback("scoring");
                neutral
            }
        }
    }

    /// Full four-signal score
    pub async fn score(&self, candidate: &Candidate, interest: &str, level: ReadingLevel) -> ScoreVector {
        let w = self.config.weights;
        let recentness = self.recentness(candidate.published);
        let citation = Self::citation(&candidate.metrics);
        let keyword_match = self.keyword_match(candidate, interest).await;
        let difficulty = self.difficulty(candidate, level).await;

        ScoreVector {
            recentness,
            citation,
            keyword_match,
            difficulty,
            total: recentness * w.recentness
                + citation * w.citation
                + keyword_match * w.keyword_match
                + difficulty * w.difficulty,
        }
    }

    /// Heuristic blended with the mean LLM judgment, half and half
    pub async fn hybrid(
        &self,
        candidate: &Candidate,
        interest: &str,
        level: ReadingLevel,
        heuristic: &HeuristicScore,
    ) -> ScoreVector {
        let keyword_match = self.keyword_match(candidate, interest).await;
        let difficulty = self.difficulty(candidate, level).await;
        let llm_avg = (keyword_match + difficulty) / 2.0;

        ScoreVector {
            recentness: heuristic.recentness,
            citation: heuristic.citation,
            keyword_match,
            difficulty,
            total: heuristic.total * 0.5 + llm_avg * 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use paperpilot_common::MockTextGenerator;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn engine(llm: MockTextGenerator) -> ScoringEngine {
        ScoringEngine::new(Arc::new(llm), ScoringConfig::default()).with_reference_date(today())
    }

    fn days_ago(days: i64) -> Option<NaiveDate> {
        Some(today() - Duration::days(days))
    }

    #[test]
    fn test_recentness_buckets() {
        let engine = engine(MockTextGenerator::new());
        assert_eq!(engine.recentness(days_ago(10)), 1.0);
        assert_eq!(engine.recentness(days_ago(30)), 1.0);
        assert_eq!(engine.recentness(days_ago(100)), 0.8);
        assert_eq!(engine.recentness(days_ago(200)), 0.6);
        assert_eq!(engine.recentness(days_ago(400)), 0.4);
        assert_eq!(engine.recentness(days_ago(1000)), 0.2);
        assert_eq!(engine.recentness(None), 0.5);
        // future dates count as brand new
        assert_eq!(engine.recentness(days_ago(-5)), 1.0);
    }

    #[test]
    fn test_citation_saturates() {
        let metrics = CitationMetrics {
            citation_count: 200,
            citation_velocity: 20.0,
            ..Default::default()
        };
        assert_eq!(ScoringEngine::citation(&metrics), 1.0);

        let partial = CitationMetrics {
            citation_count: 50,
            citation_velocity: 5.0,
            ..Default::default()
        };
        assert!((ScoringEngine::citation(&partial) - (0.5 * 0.7 + 0.5 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_citation_stays_in_range_for_bad_input() {
        for (count, velocity) in [(-5, -1.0), (0, f64::NAN), (10, f64::INFINITY), (i64::MAX, 0.0)] {
            let metrics = CitationMetrics {
                citation_count: count,
                citation_velocity: velocity,
                ..Default::default()
            };
            let score = ScoringEngine::citation(&metrics);
            assert!((0.0..=1.0).contains(&score), "{count} {velocity} -> {score}");
        }
    }

    #[test]
    fn test_keyword_simple() {
        let mut c = Candidate::new("1", "Retrieval Augmented Generation at Scale");
        c.abstract_text = "We scale dense retrieval for question answering.".into();

        assert_eq!(ScoringEngine::keyword_simple(&c, "retrieval augmented generation"), 1.0);
        assert_eq!(ScoringEngine::keyword_simple(&c, "question answering"), 0.6);
        assert_eq!(ScoringEngine::keyword_simple(&c, "dense graph"), 0.5);
        assert_eq!(ScoringEngine::keyword_simple(&c, "protein folding"), 0.3);
        assert_eq!(ScoringEngine::keyword_simple(&c, "   "), 0.3);
    }

    #[test]
    fn test_heuristic_weights() {
        let llm = MockTextGenerator::new();
        let engine = engine(llm.clone());
        let mut c = Candidate::new("1", "RAG");
        c.published = days_ago(10);
        c.metrics.citation_count = 100;
        c.metrics.citation_velocity = 10.0;

        let h = engine.heuristic(&c, "RAG");
        assert!((h.total - 1.0).abs() < 1e-9);
        assert_eq!(llm.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_full_score_combines_weights() {
        let llm = MockTextGenerator::new()
            .on_purpose(LlmPurpose::Relevance, "0.8")
            .on_purpose(LlmPurpose::Difficulty, "0.6");
        let engine = engine(llm);

        let mut c = Candidate::new("1", "t");
        c.published = days_ago(400);
        let v = engine.score(&c, "RAG", ReadingLevel::Beginner).await;

        assert_eq!(v.recentness, 0.4);
        assert_eq!(v.citation, 0.0);
        let expected = 0.4 * 0.2 + 0.8 * 0.3 + 0.6 * 0.2;
        assert!((v.total - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_llm_failure_and_garbage_are_neutral() {
        let llm = MockTextGenerator::new()
            .fail_purpose(LlmPurpose::Relevance)
            .on_purpose(LlmPurpose::Difficulty, "quite suitable");
        let engine = engine(llm);

        let c = Candidate::new("1", "t");
        assert_eq!(engine.keyword_match(&c, "RAG").await, 0.5);
        assert_eq!(engine.difficulty(&c, ReadingLevel::Advanced).await, 0.5);
    }

    #[tokio::test]
    async fn test_prompt_uses_abstract_excerpt() {
        let llm = MockTextGenerator::new().with_default("0.5");
        let engine = ScoringEngine::new(Arc::new(llm.clone()), ScoringConfig::default());

        let mut c = Candidate::new("1", "t");
        c.abstract_text = format!("{}TAIL", "a".repeat(500));
        engine.difficulty(&c, ReadingLevel::Beginner).await;

        let (_, prompt) = &llm.prompts()[0];
        assert!(!prompt.contains("TAIL"));
        assert!(prompt.contains("beginner"));
    }
}
