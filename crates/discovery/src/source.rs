//! Candidate search, enrichment and existence flagging

use paperpilot_common::db::PaperStore;
use paperpilot_common::domain::{Candidate, CitationMetrics};
use paperpilot_common::metrics::record_fallback;
use paperpilot_common::providers::{BibliographyProvider, PaperSearchProvider};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Hard cap on candidates requested from the search provider
pub const MAX_RESULTS_CAP: usize = 50;

pub struct CandidateSource {
    search: Arc<dyn PaperSearchProvider>,
    bibliography: Arc<dyn BibliographyProvider>,
    store: Option<Arc<dyn PaperStore>>,
}

impl CandidateSource {
    pub fn new(
        search: Arc<dyn PaperSearchProvider>,
        bibliography: Arc<dyn BibliographyProvider>,
    ) -> Self {
        Self {
            search,
            bibliography,
            store: None,
        }
    }

    /// Enable existence flagging against storage
    pub fn with_store(mut self, store: Arc<dyn PaperStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Search by keywords; provider failure yields an empty list
    pub async fn search(&self, keywords: &[String], max_results: usize) -> Vec<Candidate> {
        let limit = max_results.min(MAX_RESULTS_CAP);

        match self.search.search(keywords, limit).await {
            Ok(mut candidates) => {
                candidates.truncate(limit);
                info!(count = candidates.len(), "Search returned candidates");
                candidates
            }
            Err(e) => {
                warn!(error = %e, "Paper search failed, continuing with no candidates");
                record_fallback("search");
                Vec::new()
            }
        }
    }

    /// Attach citation metrics to every candidate.
    ///
    /// Metrics are replaced, never accumulated, so enriching twice with
    /// stable provider data gives the same numbers.
    pub async fn enrich(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        for candidate in candidates.iter_mut() {
            if candidate.external_id.is_empty() {
                candidate.metrics = CitationMetrics::default();
                continue;
            }

            candidate.metrics = match self.bibliography.metrics(&candidate.external_id).await {
                Ok(metrics) => metrics,
                Err(e) => {
                    warn!(
                        arxiv_id = %candidate.external_id,
                        error = %e,
                        "Citation metrics unavailable, using zero defaults"
                    );
                    record_fallback("enrichment");
                    CitationMetrics::default()
                }
            };
        }
        candidates
    }

    /// Mark candidates already held in storage
    pub async fn flag_existing(&self, candidates: &mut [Candidate]) {
        let Some(store) = &self.store else {
            return;
        };

        let keys: Vec<String> = candidates.iter().map(Candidate::storage_key).collect();
        let existing: HashSet<String> = match store.existing_external_ids(&keys).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Existence check failed, treating all candidates as new");
                return;
            }
        };

        for candidate in candidates.iter_mut() {
            let key = candidate.storage_key();
            candidate.exists_in_db = existing.contains(&key);
            if !candidate.exists_in_db {
                continue;
            }
            match store.find_paper_by_external_id(&key).await {
                Ok(stored) => candidate.stored_id = stored.map(|p| p.id),
                Err(e) => warn!(
                    arxiv_id = %candidate.external_id,
                    error = %e,
                    "Stored paper lookup failed, keeping candidate without its id"
                ),
            }
        }
    }

    /// search → enrich → flag
    #[instrument(skip(self, keywords), fields(keywords = keywords.len()))]
    pub async fn discover(&self, keywords: &[String], max_results: usize) -> Vec<Candidate> {
        let found = self.search(keywords, max_results).await;
        let mut enriched = self.enrich(found).await;
        self.flag_existing(&mut enriched).await;
        enriched
    }
}
