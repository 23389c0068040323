//! End-to-end recommendation flows
//!
//! `run_for_user` is the stored flow: new candidates only, full text for
//! the winners, everything written through the `PaperStore`.
//! `recommend` is the low-cost flow: two-phase selection, abstract-based
//! summaries, no storage.

use chrono::{DateTime, NaiveDate, Utc};
use paperpilot_common::config::{AppConfig, SelectionConfig};
use paperpilot_common::db::{DbPool, PaperStore, Repository};
use paperpilot_common::domain::ReadingLevel;
use paperpilot_common::errors::{AppError, Result};
use paperpilot_common::llm::{ChatCompletionClient, TextGenerator};
use paperpilot_common::metrics::record_pipeline;
use paperpilot_common::providers::{BibliographyProvider, FullTextSource, PaperSearchProvider};
use paperpilot_discovery::{
    ArxivClient, ArxivPdfFetcher, CandidateSource, KeywordExpander, SemanticScholarClient,
};
use paperpilot_insight::{SummaryGenerator, SummaryOutcome};
use paperpilot_ranking::{ScoreVector, ScoringEngine, SelectedPaper, SelectionFunnel, SelectionMode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// External collaborators the pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn TextGenerator>,
    pub search: Arc<dyn PaperSearchProvider>,
    pub bibliography: Arc<dyn BibliographyProvider>,
    pub full_text: Arc<dyn FullTextSource>,
    pub store: Option<Arc<dyn PaperStore>>,
}

impl Collaborators {
    /// Production HTTP clients, without storage
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            llm: Arc::new(ChatCompletionClient::new(config.llm.clone())?),
            search: Arc::new(ArxivClient::new(&config.arxiv)?),
            bibliography: Arc::new(SemanticScholarClient::new(&config.semantic_scholar)?),
            full_text: Arc::new(ArxivPdfFetcher::new(&config.arxiv)?),
            store: None,
        })
    }

    /// Production HTTP clients plus the Postgres repository
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = DbPool::new(&config.database).await?;
        Ok(Self::from_config(config)?.with_store(Arc::new(Repository::new(pool))))
    }

    pub fn with_store(mut self, store: Arc<dyn PaperStore>) -> Self {
        self.store = Some(store);
        self
    }
}

/// One recommended paper with its summary
#[derive(Debug, Clone, Serialize)]
pub struct RecommendedPaper {
    pub arxiv_id: String,
    pub paper_id: Option<Uuid>,
    pub title: String,
    pub authors: Vec<String>,
    pub published: Option<NaiveDate>,
    pub pdf_url: Option<String>,
    pub score: ScoreVector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heuristic_score: Option<f64>,
    pub summary: String,
    pub summary_accepted: bool,
}

impl RecommendedPaper {
    fn new(selected: SelectedPaper, outcome: SummaryOutcome) -> Self {
        let SelectedPaper {
            candidate,
            score,
            heuristic_score,
            stored_id,
            ..
        } = selected;

        Self {
            arxiv_id: candidate.external_id,
            paper_id: stored_id,
            title: candidate.title,
            authors: candidate.authors,
            published: candidate.published,
            pdf_url: candidate.pdf_url,
            score,
            heuristic_score,
            summary: outcome.summary,
            summary_accepted: outcome.accepted,
        }
    }
}

/// Result of the stored flow for one user
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub user_id: Uuid,
    pub interest: String,
    pub level: ReadingLevel,
    pub keywords: Vec<String>,
    pub candidates_found: usize,
    pub papers: Vec<RecommendedPaper>,
    pub summaries_stored: usize,
    pub recommendations_recorded: usize,
    pub generated_at: DateTime<Utc>,
}

/// Result of the low-cost flow
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub interest: String,
    pub level: ReadingLevel,
    pub keywords: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<RecommendedPaper>,
}

pub struct RecommendationPipeline {
    expander: KeywordExpander,
    source: CandidateSource,
    funnel: SelectionFunnel,
    summaries: SummaryGenerator,
    store: Option<Arc<dyn PaperStore>>,
    selection: SelectionConfig,
}

fn require_interest(interest: Option<&str>) -> Result<&str> {
    interest
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .ok_or_else(|| AppError::Validation {
            message: "research interest is empty".to_string(),
            field: Some("interest".to_string()),
        })
}

impl RecommendationPipeline {
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            llm,
            search,
            bibliography,
            full_text,
            store,
        } = collaborators;

        let scoring = Arc::new(ScoringEngine::new(llm.clone(), config.scoring.clone()));
        let mut source = CandidateSource::new(search, bibliography);
        let mut funnel = SelectionFunnel::new(scoring, full_text, config.selection.clone());
        let mut summaries = SummaryGenerator::new(llm.clone(), config.summary.clone());

        if let Some(store) = &store {
            source = source.with_store(store.clone());
            funnel = funnel.with_store(store.clone());
            summaries = summaries.with_store(store.clone());
        }

        Self {
            expander: KeywordExpander::new(llm),
            source,
            funnel,
            summaries,
            store,
            selection: config.selection.clone(),
        }
    }

    fn store(&self) -> Result<&Arc<dyn PaperStore>> {
        self.store.as_ref().ok_or_else(|| AppError::Configuration {
            message: "this operation requires a paper store".to_string(),
        })
    }

    pub fn summaries(&self) -> &SummaryGenerator {
        &self.summaries
    }

    /// Stored flow: recommend new papers to a user and record them
    #[instrument(skip(self))]
    pub async fn run_for_user(&self, user_id: Uuid, top_n: Option<usize>) -> Result<RunReport> {
        let started = Instant::now();
        let store = self.store()?;

        let user = store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::UserNotFound {
                id: user_id.to_string(),
            })?;
        let interest = require_interest(user.interest.as_deref())?.to_string();
        let level = user.level;
        let top_n = top_n.unwrap_or(self.selection.top_n);

        let keywords = self.expander.expand(&interest).await;
        let candidates = self
            .source
            .discover(&keywords, self.selection.max_results)
            .await;
        let candidates_found = candidates.len();

        let selected = self
            .funnel
            .select(candidates, &interest, level, top_n, SelectionMode::SinglePhase)
            .await;

        let now = Utc::now();
        let mut papers = Vec::with_capacity(selected.len());
        let mut summaries_stored = 0;
        let mut recommendations_recorded = 0;

        for paper in selected {
            let outcome = self
                .summaries
                .describe(&paper.candidate, &paper.full_text, level)
                .await;
            if outcome.persisted {
                summaries_stored += 1;
            }

            if let Some(paper_id) = paper.stored_id {
                match store.record_recommendation(user_id, paper_id, now, false).await {
                    Ok(()) => recommendations_recorded += 1,
                    Err(e) => warn!(%paper_id, error = %e, "Failed to record recommendation"),
                }
            }
            papers.push(RecommendedPaper::new(paper, outcome));
        }

        record_pipeline(started.elapsed().as_secs_f64(), "single_phase");
        info!(
            candidates = candidates_found,
            recommended = papers.len(),
            recorded = recommendations_recorded,
            "Recommendation run complete"
        );

        Ok(RunReport {
            user_id,
            interest,
            level,
            keywords,
            candidates_found,
            papers,
            summaries_stored,
            recommendations_recorded,
            generated_at: now,
        })
    }

    /// Low-cost flow: no storage, LLM judgment bounded by the pre-filter width
    #[instrument(skip(self))]
    pub async fn recommend(
        &self,
        interest: &str,
        level: ReadingLevel,
        top_n: Option<usize>,
    ) -> Result<Recommendations> {
        let started = Instant::now();
        let interest = require_interest(Some(interest))?;
        let top_n = top_n.unwrap_or(self.selection.top_n);

        let keywords = self.expander.expand(interest).await;
        let found = self.source.search(&keywords, self.selection.max_results).await;
        let candidates = self.source.enrich(found).await;

        let selected = self
            .funnel
            .select(candidates, interest, level, top_n, SelectionMode::TwoPhase)
            .await;

        let mut items = Vec::with_capacity(selected.len());
        for paper in selected {
            let outcome = self.summaries.describe(&paper.candidate, "", level).await;
            items.push(RecommendedPaper::new(paper, outcome));
        }

        record_pipeline(started.elapsed().as_secs_f64(), "two_phase");
        info!(recommended = items.len(), "Low-cost recommendation complete");

        Ok(Recommendations {
            interest: interest.to_string(),
            level,
            keywords,
            generated_at: Utc::now(),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_interest() {
        assert_eq!(require_interest(Some("  RAG ")).unwrap(), "RAG");
        assert!(matches!(
            require_interest(Some("   ")),
            Err(AppError::Validation { .. })
        ));
        assert!(require_interest(None).is_err());
    }
}
