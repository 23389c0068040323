//! Candidate selection funnel
//!
//! Two modes with different cost budgets:
//! - single-phase: full score for every new candidate, then full text and
//!   persistence for the winners only
//! - two-phase: heuristic pre-filter over the whole pool, LLM judgment for
//!   at most `prefilter_width` survivors
//!
//! Equal scores keep their input order (stable sort); there is no
//! secondary key.

use crate::scoring::{HeuristicScore, ScoreVector, ScoringEngine};
use paperpilot_common::config::SelectionConfig;
use paperpilot_common::db::{PaperRecord, PaperStore};
use paperpilot_common::domain::{Candidate, ReadingLevel};
use paperpilot_common::metrics::record_candidates_scored;
use paperpilot_common::providers::FullTextSource;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    SinglePhase,
    TwoPhase,
}

/// One recommended paper, ordered by `score.total` descending
#[derive(Debug, Clone, Serialize)]
pub struct SelectedPaper {
    pub candidate: Candidate,
    pub score: ScoreVector,
    /// Pre-filter score (two-phase only)
    pub heuristic_score: Option<f64>,
    /// Extracted text, empty when unavailable or not fetched
    #[serde(skip_serializing_if = "String::is_empty")]
    pub full_text: String,
    pub stored_id: Option<Uuid>,
}

pub struct SelectionFunnel {
    scoring: Arc<ScoringEngine>,
    full_text: Arc<dyn FullTextSource>,
    store: Option<Arc<dyn PaperStore>>,
    config: SelectionConfig,
}

fn by_total_desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.total_cmp(&a)
}

impl SelectionFunnel {
    pub fn new(
        scoring: Arc<ScoringEngine>,
        full_text: Arc<dyn FullTextSource>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            scoring,
            full_text,
            store: None,
            config,
        }
    }

    /// Persist single-phase winners through this store
    pub fn with_store(mut self, store: Arc<dyn PaperStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn select(
        &self,
        candidates: Vec<Candidate>,
        interest: &str,
        level: ReadingLevel,
        top_n: usize,
        mode: SelectionMode,
    ) -> Vec<SelectedPaper> {
        match mode {
            SelectionMode::SinglePhase => {
                self.select_single_phase(candidates, interest, level, top_n).await
            }
            SelectionMode::TwoPhase => {
                self.select_two_phase(candidates, interest, level, top_n).await
            }
        }
    }

    /// Score every new candidate, keep the best `top_n`, then fetch their
    /// full text and persist them one by one.
    #[instrument(skip_all, fields(candidates = candidates.len(), top_n = top_n))]
    pub async fn select_single_phase(
        &self,
        candidates: Vec<Candidate>,
        interest: &str,
        level: ReadingLevel,
        top_n: usize,
    ) -> Vec<SelectedPaper> {
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let fresh: Vec<Candidate> = candidates.into_iter().filter(|c| !c.exists_in_db).collect();
        record_candidates_scored("full", fresh.len());

        let mut scored = Vec::with_capacity(fresh.len());
        for candidate in fresh {
            let score = self.scoring.score(&candidate, interest, level).await;
            debug!(arxiv_id = %candidate.external_id, total = score.total, "Candidate scored");
            scored.push((candidate, score));
        }

        scored.sort_by(|a, b| by_total_desc(a.1.total, b.1.total));
        scored.truncate(top_n);

        let mut selected = Vec::with_capacity(scored.len());
        for (mut candidate, score) in scored {
            let full_text = match self.full_text.fetch_full_text(&candidate).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        arxiv_id = %candidate.external_id,
                        error = %e,
                        "Full text unavailable, keeping candidate without it"
                    );
                    String::new()
                }
            };

            if let Some(store) = &self.store {
                match store
                    .upsert_paper(&PaperRecord::from_candidate(&candidate, &full_text))
                    .await
                {
                    Ok(id) => candidate.stored_id = Some(id),
                    Err(e) => warn!(
                        arxiv_id = %candidate.external_id,
                        error = %e,
                        "Failed to persist selected paper, continuing"
                    ),
                }
            }

            let stored_id = candidate.stored_id;
            selected.push(SelectedPaper {
                candidate,
                score,
                heuristic_score: None,
                full_text,
                stored_id,
            });
        }

        info!(selected = selected.len(), "Single-phase selection complete");
        selected
    }

    /// Heuristic over all candidates, hybrid score over the top
    /// `prefilter_width`, best `top_n` returned. No full text, no writes.
    #[instrument(skip_all, fields(candidates = candidates.len(), top_n = top_n))]
    pub async fn select_two_phase(
        &self,
        candidates: Vec<Candidate>,
        interest: &str,
        level: ReadingLevel,
        top_n: usize,
    ) -> Vec<SelectedPaper> {
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }

        record_candidates_scored("heuristic", candidates.len());
        let mut prefiltered: Vec<(Candidate, HeuristicScore)> = candidates
            .into_iter()
            .map(|c| {
                let h = self.scoring.heuristic(&c, interest);
                (c, h)
            })
            .collect();

        prefiltered.sort_by(|a, b| by_total_desc(a.1.total, b.1.total));
        prefiltered.truncate(self.config.prefilter_width);
        record_candidates_scored("hybrid", prefiltered.len());

        let mut ranked = Vec::with_capacity(prefiltered.len());
        for (candidate, heuristic) in prefiltered {
            let score = self.scoring.hybrid(&candidate, interest, level, &heuristic).await;
            ranked.push(SelectedPaper {
                stored_id: candidate.stored_id,
                candidate,
                score,
                heuristic_score: Some(heuristic.total),
                full_text: String::new(),
            });
        }

        ranked.sort_by(|a, b| by_total_desc(a.score.total, b.score.total));
        ranked.truncate(top_n);

        info!(selected = ranked.len(), "Two-phase selection complete");
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use paperpilot_common::config::ScoringConfig;
    use paperpilot_common::db::MemoryStore;
    use paperpilot_common::errors::{AppError, Result};
    use paperpilot_common::llm::LlmPurpose;
    use paperpilot_common::providers::NoFullText;
    use paperpilot_common::MockTextGenerator;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn candidate(id: &str, title: &str, citations: i64, age_days: i64) -> Candidate {
        let mut c = Candidate::new(id, title);
        c.abstract_text = format!("Abstract of {title}.");
        c.published = Some(today() - Duration::days(age_days));
        c.metrics.citation_count = citations;
        c
    }

    fn funnel(llm: &MockTextGenerator, full_text: Arc<dyn FullTextSource>) -> SelectionFunnel {
        let scoring = ScoringEngine::new(Arc::new(llm.clone()), ScoringConfig::default())
            .with_reference_date(today());
        SelectionFunnel::new(Arc::new(scoring), full_text, SelectionConfig::default())
    }

    struct FlakyText;

    #[async_trait]
    impl FullTextSource for FlakyText {
        async fn fetch_full_text(&self, candidate: &Candidate) -> Result<String> {
            if candidate.external_id.ends_with('1') {
                Err(AppError::PdfExtraction {
                    source_id: candidate.external_id.clone(),
                    message: "broken".into(),
                })
            } else {
                Ok(format!("full text of {}", candidate.external_id))
            }
        }
    }

    #[tokio::test]
    async fn test_empty_input_returns_empty() {
        let llm = MockTextGenerator::new().with_default("0.5");
        let funnel = funnel(&llm, Arc::new(NoFullText));

        for mode in [SelectionMode::SinglePhase, SelectionMode::TwoPhase] {
            let out = funnel.select(vec![], "RAG", ReadingLevel::Intermediate, 3, mode).await;
            assert!(out.is_empty());
        }
        assert_eq!(llm.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_two_phase_bounds_llm_calls() {
        let llm = MockTextGenerator::new().with_default("0.5");
        let funnel = funnel(&llm, Arc::new(NoFullText));

        let pool: Vec<Candidate> = (0..20)
            .map(|i| candidate(&format!("2401.{i:05}"), &format!("Paper {i}"), i * 10, i * 20))
            .collect();
        let out = funnel
            .select_two_phase(pool, "RAG", ReadingLevel::Intermediate, 3)
            .await;

        assert_eq!(out.len(), 3);
        assert!(llm.calls(LlmPurpose::Relevance) <= 10);
        assert!(llm.calls(LlmPurpose::Difficulty) <= 10);
        assert!(out.windows(2).all(|w| w[0].score.total >= w[1].score.total));
        assert!(out.iter().all(|p| p.heuristic_score.is_some() && p.full_text.is_empty()));
    }

    #[tokio::test]
    async fn test_two_phase_hybrid_formula() {
        let llm = MockTextGenerator::new()
            .on_purpose(LlmPurpose::Relevance, "1.0")
            .on_purpose(LlmPurpose::Difficulty, "0.0");
        let funnel = funnel(&llm, Arc::new(NoFullText));

        let c = candidate("2401.00001", "RAG survey", 100, 10);
        let out = funnel
            .select_two_phase(vec![c], "RAG", ReadingLevel::Beginner, 3)
            .await;

        // recentness 1.0, citation 0.7, keyword 1.0
        let h = out[0].heuristic_score.unwrap();
        assert!((h - 0.88).abs() < 1e-9);
        assert!((out[0].score.total - (h * 0.5 + 0.5 * 0.5)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_single_phase_skips_existing_and_persists_winners() {
        let llm = MockTextGenerator::new()
            .on("Strong", "0.9")
            .on("Weak", "0.1")
            .with_default("0.5");
        let store = Arc::new(MemoryStore::new());
        let funnel = funnel(&llm, Arc::new(FlakyText)).with_store(store.clone());

        let mut known = candidate("2401.00009", "Strong but known", 500, 5);
        known.exists_in_db = true;
        let pool = vec![
            candidate("2401.00001", "Strong one", 50, 10),
            candidate("2401.00002", "Weak two", 50, 10),
            candidate("2401.00003", "Strong three", 50, 10),
            known,
        ];

        let out = funnel
            .select_single_phase(pool, "RAG", ReadingLevel::Intermediate, 2)
            .await;

        let ids: Vec<&str> = out.iter().map(|p| p.candidate.external_id.as_str()).collect();
        assert_eq!(ids, vec!["2401.00001", "2401.00003"]);
        // failed extraction keeps the candidate
        assert!(out[0].full_text.is_empty());
        assert_eq!(out[1].full_text, "full text of 2401.00003");
        assert!(out.iter().all(|p| p.stored_id.is_some()));
        assert_eq!(store.paper_count(), 2);
        // 3 fresh candidates, one relevance and one difficulty call each
        assert_eq!(llm.calls(LlmPurpose::Relevance), 3);
    }

    #[tokio::test]
    async fn test_single_phase_persistence_failure_keeps_selection() {
        let llm = MockTextGenerator::new().with_default("0.5");
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let funnel = funnel(&llm, Arc::new(NoFullText)).with_store(store.clone());

        let pool = vec![candidate("2401.00002", "A", 1, 1), candidate("2401.00004", "B", 2, 1)];
        let out = funnel
            .select_single_phase(pool, "RAG", ReadingLevel::Advanced, 3)
            .await;

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|p| p.stored_id.is_none()));
    }

    #[tokio::test]
    async fn test_failed_scoring_keeps_candidate_eligible() {
        let llm = MockTextGenerator::new();
        let funnel = funnel(&llm, Arc::new(NoFullText));

        let out = funnel
            .select_single_phase(
                vec![candidate("2401.00002", "A", 0, 1)],
                "RAG",
                ReadingLevel::Beginner,
                3,
            )
            .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score.keyword_match, 0.5);
        assert_eq!(out[0].score.difficulty, 0.5);
    }
}
