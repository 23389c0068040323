//! Persistence collaborator used by the pipeline
//!
//! Every method is one unit of work: a failure in one call never rolls
//! back what a previous call committed.

use crate::domain::{Candidate, CitationMetrics, ReadingLevel, ARXIV_SOURCE};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// User profile as needed by the recommender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub interest: Option<String>,
    pub level: ReadingLevel,
}

/// Paper plus enrichment, written in a single transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Storage key, e.g. `arXiv:2401.01234v2`
    pub external_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub published: Option<NaiveDate>,
    pub source: String,
    pub pdf_url: Option<String>,
    /// `None` keeps previously stored text
    pub full_text: Option<String>,
    pub keywords: Vec<String>,
    pub metrics: CitationMetrics,
}

impl PaperRecord {
    pub fn from_candidate(candidate: &Candidate, full_text: &str) -> Self {
        Self {
            external_id: candidate.storage_key(),
            title: candidate.title.clone(),
            authors: candidate.authors.clone(),
            abstract_text: candidate.abstract_text.clone(),
            published: candidate.published,
            source: ARXIV_SOURCE.to_string(),
            pdf_url: candidate.pdf_url.clone(),
            full_text: (!full_text.is_empty()).then(|| full_text.to_string()),
            keywords: candidate.categories.clone(),
            metrics: candidate.metrics.clone(),
        }
    }
}

/// Stored paper with its extracted text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPaper {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub published: Option<NaiveDate>,
    pub pdf_url: Option<String>,
    pub full_text: Option<String>,
}

impl StoredPaper {
    /// View as a candidate for summary generation
    pub fn to_candidate(&self) -> Candidate {
        let mut candidate = Candidate::new(
            crate::domain::strip_arxiv_prefix(&self.external_id),
            self.title.clone(),
        );
        candidate.authors = self.authors.clone();
        candidate.abstract_text = self.abstract_text.clone();
        candidate.published = self.published;
        candidate.pdf_url = self.pdf_url.clone();
        candidate.exists_in_db = true;
        candidate.stored_id = Some(self.id);
        candidate
    }
}

/// Directed citation edge between two stored papers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEdgeRecord {
    pub citing_paper_id: Uuid,
    pub cited_paper_id: Uuid,
    pub relation_type: String,
    pub is_influential: bool,
}

/// Recommendation row joined with its paper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub paper_id: Uuid,
    pub external_id: String,
    pub title: String,
    pub recommended_at: DateTime<Utc>,
    pub user_requested: bool,
}

#[async_trait]
pub trait PaperStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>>;

    /// Subset of `keys` already stored
    async fn existing_external_ids(&self, keys: &[String]) -> Result<HashSet<String>>;

    async fn find_paper(&self, paper_id: Uuid) -> Result<Option<StoredPaper>>;

    async fn find_paper_by_external_id(&self, external_id: &str) -> Result<Option<StoredPaper>>;

    /// Insert or update by external id, returning the paper id
    async fn upsert_paper(&self, record: &PaperRecord) -> Result<Uuid>;

    /// Replace the summary for (paper, level)
    async fn upsert_summary(&self, paper_id: Uuid, level: ReadingLevel, text: &str) -> Result<()>;

    /// Returns true when a new edge was written
    async fn insert_citation_if_absent(&self, edge: &CitationEdgeRecord) -> Result<bool>;

    async fn record_recommendation(
        &self,
        user_id: Uuid,
        paper_id: Uuid,
        at: DateTime<Utc>,
        user_requested: bool,
    ) -> Result<()>;

    /// Recommendations made to the user on a UTC calendar date, oldest first
    async fn recommendations_on(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<RecommendationRecord>>;
}
