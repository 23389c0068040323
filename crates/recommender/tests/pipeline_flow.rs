//! End-to-end flows against scripted collaborators

use async_trait::async_trait;
use chrono::{Duration, Utc};
use paperpilot_common::config::AppConfig;
use paperpilot_common::domain::{Candidate, CitationMetrics, ReadingLevel};
use paperpilot_common::errors::{AppError, Result};
use paperpilot_common::llm::LlmPurpose;
use paperpilot_common::providers::{
    BibliographyProvider, FullTextSource, NoFullText, PaperReferences, PaperSearchProvider,
    ReferenceEntry,
};
use paperpilot_common::{MemoryStore, MockTextGenerator};
use paperpilot_recommender::{Collaborators, RecommendationPipeline, RelationService};
use std::sync::Arc;

const SUMMARY: &str = "The authors pair a language model with a retriever that looks up \
    supporting passages at answer time, which keeps answers grounded and lets the system \
    use knowledge that was never stored in its weights.";

struct PoolSearch(Vec<Candidate>);

#[async_trait]
impl PaperSearchProvider for PoolSearch {
    async fn search(&self, keywords: &[String], max_results: usize) -> Result<Vec<Candidate>> {
        if keywords.is_empty() {
            return Err(AppError::Validation {
                message: "empty query".into(),
                field: None,
            });
        }
        Ok(self.0.iter().take(max_results).cloned().collect())
    }
}

struct DownSearch;

#[async_trait]
impl PaperSearchProvider for DownSearch {
    async fn search(&self, _keywords: &[String], _max_results: usize) -> Result<Vec<Candidate>> {
        Err(AppError::UpstreamTimeout {
            service: "arxiv".into(),
            timeout_ms: 30_000,
        })
    }
}

/// Citation counts derived from the id; every paper cites the same work
struct StubBibliography;

#[async_trait]
impl BibliographyProvider for StubBibliography {
    async fn metrics(&self, arxiv_id: &str) -> Result<CitationMetrics> {
        let n: i64 = arxiv_id.rsplit('.').next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok(CitationMetrics {
            citation_count: n * 10,
            citation_velocity: n as f64 / 2.0,
            ..Default::default()
        })
    }

    async fn references(&self, _arxiv_id: &str) -> Result<PaperReferences> {
        Ok(PaperReferences {
            references: vec![ReferenceEntry {
                paper_id: "s2-rag".into(),
                title: "Retrieval-Augmented Generation for Knowledge-Intensive NLP Tasks".into(),
                authors: vec!["Lewis".into()],
                arxiv_id: Some("2005.11401".into()),
                is_influential: false,
            }],
            citations: vec![],
        })
    }
}

struct EchoText;

#[async_trait]
impl FullTextSource for EchoText {
    async fn fetch_full_text(&self, candidate: &Candidate) -> Result<String> {
        Ok(format!("Full text of {}", candidate.title))
    }
}

fn pool(size: usize) -> Vec<Candidate> {
    let today = Utc::now().date_naive();
    (1..=size)
        .map(|i| {
            let mut c = Candidate::new(format!("2401.{i:05}"), format!("RAG study {i}"));
            c.authors = vec![format!("Author {i}")];
            c.abstract_text = format!("We study retrieval augmented generation, variant {i}.");
            c.published = Some(today - Duration::days(i as i64 * 15));
            c
        })
        .collect()
}

fn llm() -> MockTextGenerator {
    MockTextGenerator::new()
        .on_purpose(LlmPurpose::Keywords, "RAG, Retrieval Augmented Generation, dense retrieval")
        .on_purpose(LlmPurpose::Relevance, "0.8")
        .on_purpose(LlmPurpose::Difficulty, "0.6")
        .on_purpose(LlmPurpose::Summary, SUMMARY)
        .with_default("These papers share a retrieval foundation.")
}

fn collaborators(
    llm: &MockTextGenerator,
    search: Arc<dyn PaperSearchProvider>,
    full_text: Arc<dyn FullTextSource>,
) -> Collaborators {
    Collaborators {
        llm: Arc::new(llm.clone()),
        search,
        bibliography: Arc::new(StubBibliography),
        full_text,
        store: None,
    }
}

#[tokio::test]
async fn test_low_cost_flow_end_to_end() {
    let config = AppConfig::default();
    let llm = llm();
    let pipeline = RecommendationPipeline::new(
        &config,
        collaborators(&llm, Arc::new(PoolSearch(pool(40))), Arc::new(NoFullText)),
    );

    let out = pipeline
        .recommend("RAG", ReadingLevel::Intermediate, None)
        .await
        .unwrap();

    assert!(out.keywords.len() <= 5);
    assert_eq!(out.items.len(), 3);
    assert!(llm.calls(LlmPurpose::Relevance) <= 10);
    assert!(llm.calls(LlmPurpose::Difficulty) <= 10);
    assert!(out
        .items
        .windows(2)
        .all(|w| w[0].score.total >= w[1].score.total));
    for item in &out.items {
        assert!(!item.summary.is_empty());
        assert!(item.summary_accepted);
        assert!(item.heuristic_score.is_some());
        assert!(item.paper_id.is_none());
    }
}

#[tokio::test]
async fn test_stored_flow_persists_and_skips_known_papers() {
    let config = AppConfig::default();
    let llm = llm();
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user(Some("RAG"), ReadingLevel::Beginner);
    let pipeline = RecommendationPipeline::new(
        &config,
        collaborators(&llm, Arc::new(PoolSearch(pool(30))), Arc::new(EchoText))
            .with_store(store.clone()),
    );

    let first = pipeline.run_for_user(user, None).await.unwrap();
    assert_eq!(first.candidates_found, 20);
    assert_eq!(first.level, ReadingLevel::Beginner);
    assert_eq!(first.papers.len(), 3);
    assert_eq!(first.summaries_stored, 3);
    assert_eq!(first.recommendations_recorded, 3);
    assert_eq!(store.paper_count(), 3);

    let paper_id = first.papers[0].paper_id.unwrap();
    assert_eq!(
        store.summary(paper_id, ReadingLevel::Beginner).as_deref(),
        Some(SUMMARY)
    );
    // summaries were written from the extracted full text
    assert!(llm
        .prompts()
        .iter()
        .any(|(p, prompt)| *p == LlmPurpose::Summary && prompt.contains("Full text of RAG study")));

    let second = pipeline.run_for_user(user, Some(2)).await.unwrap();
    assert_eq!(second.papers.len(), 2);
    for paper in &second.papers {
        assert!(first.papers.iter().all(|p| p.arxiv_id != paper.arxiv_id));
    }
    assert_eq!(store.recommendation_count(), 5);
}

#[tokio::test]
async fn test_stored_flow_reports_missing_user_and_interest() {
    let config = AppConfig::default();
    let llm = llm();
    let store = Arc::new(MemoryStore::new());
    let no_interest = store.add_user(Some("   "), ReadingLevel::Advanced);
    let pipeline = RecommendationPipeline::new(
        &config,
        collaborators(&llm, Arc::new(PoolSearch(pool(5))), Arc::new(NoFullText))
            .with_store(store.clone()),
    );

    let err = pipeline
        .run_for_user(uuid::Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserNotFound { .. }));

    let err = pipeline.run_for_user(no_interest, None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    assert_eq!(llm.total_calls(), 0);
}

#[tokio::test]
async fn test_upstream_outage_degrades_to_empty_run() {
    let config = AppConfig::default();
    let llm = MockTextGenerator::new();
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user(Some("graph neural networks"), ReadingLevel::Intermediate);
    let pipeline = RecommendationPipeline::new(
        &config,
        collaborators(&llm, Arc::new(DownSearch), Arc::new(NoFullText)).with_store(store.clone()),
    );

    let report = pipeline.run_for_user(user, None).await.unwrap();
    assert!(report.keywords.is_empty());
    assert_eq!(report.candidates_found, 0);
    assert!(report.papers.is_empty());
    assert_eq!(store.paper_count(), 0);
}

#[tokio::test]
async fn test_run_then_relations() {
    let config = AppConfig::default();
    let llm = llm();
    let store = Arc::new(MemoryStore::new());
    let user = store.add_user(Some("RAG"), ReadingLevel::Intermediate);
    let collaborators = collaborators(&llm, Arc::new(PoolSearch(pool(10))), Arc::new(NoFullText))
        .with_store(store.clone());

    let pipeline = RecommendationPipeline::new(&config, collaborators.clone());
    let report = pipeline.run_for_user(user, None).await.unwrap();

    let service = RelationService::from_collaborators(&config, &collaborators).unwrap();
    let today = service
        .analyze_on(user, report.generated_at.date_naive())
        .await
        .unwrap();

    assert_eq!(today.papers.len(), 3);
    assert_eq!(today.report.graph.common_citation_count, 1);
    let suggestion = today.suggestion.unwrap();
    assert!(suggestion.starts_with("All 3 of today's papers cite"));
    // the shared reference is not stored, so no edge can be written
    assert_eq!(today.report.edges_written, 0);
}
