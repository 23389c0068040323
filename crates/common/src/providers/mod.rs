//! Collaborator interfaces for external paper services
//!
//! Implementations return `Result`; the calling component decides which
//! default stands in for a failure.

use crate::domain::{Candidate, CitationMetrics};
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Paper-search provider (sorted by submission date, newest first)
#[async_trait]
pub trait PaperSearchProvider: Send + Sync {
    async fn search(&self, keywords: &[String], max_results: usize) -> Result<Vec<Candidate>>;
}

/// One entry of a reference or citation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Provider paper id
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// arXiv id when the provider knows one
    pub arxiv_id: Option<String>,
    #[serde(default)]
    pub is_influential: bool,
}

impl ReferenceEntry {
    /// Storage key: `arXiv:{id}` when known, else `S2:{paper_id}`
    pub fn storage_key(&self) -> String {
        match &self.arxiv_id {
            Some(id) => crate::domain::arxiv_key(id),
            None => format!("S2:{}", self.paper_id),
        }
    }
}

/// Reference and citation lists for one queried paper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperReferences {
    pub references: Vec<ReferenceEntry>,
    pub citations: Vec<ReferenceEntry>,
}

/// Bibliography / citation-graph provider keyed by arXiv id
#[async_trait]
pub trait BibliographyProvider: Send + Sync {
    async fn metrics(&self, arxiv_id: &str) -> Result<CitationMetrics>;

    async fn references(&self, arxiv_id: &str) -> Result<PaperReferences>;
}

/// Full-text retrieval for a selected candidate
#[async_trait]
pub trait FullTextSource: Send + Sync {
    async fn fetch_full_text(&self, candidate: &Candidate) -> Result<String>;
}

/// Full-text source that never fetches anything
pub struct NoFullText;

#[async_trait]
impl FullTextSource for NoFullText {
    async fn fetch_full_text(&self, _candidate: &Candidate) -> Result<String> {
        Ok(String::new())
    }
}
