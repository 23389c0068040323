//! Relations between the papers recommended to a user on one day

use chrono::{NaiveDate, Utc};
use paperpilot_common::config::AppConfig;
use paperpilot_common::db::PaperStore;
use paperpilot_common::domain::strip_arxiv_prefix;
use paperpilot_common::errors::{AppError, Result};
use paperpilot_insight::{CitationRelationAnalyzer, RelationPaper, RelationReport};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::pipeline::Collaborators;

#[derive(Debug, Clone, Serialize)]
pub struct TodayRelations {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub papers: Vec<RelationPaper>,
    pub report: RelationReport,
    /// Offer to recommend the key common reference next
    pub suggestion: Option<String>,
}

pub struct RelationService {
    store: Arc<dyn PaperStore>,
    analyzer: CitationRelationAnalyzer,
}

impl RelationService {
    pub fn new(store: Arc<dyn PaperStore>, analyzer: CitationRelationAnalyzer) -> Self {
        Self {
            analyzer: analyzer.with_store(store.clone()),
            store,
        }
    }

    pub fn from_collaborators(config: &AppConfig, collaborators: &Collaborators) -> Result<Self> {
        let store = collaborators
            .store
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "relation analysis requires a paper store".to_string(),
            })?;
        let analyzer = CitationRelationAnalyzer::new(
            collaborators.llm.clone(),
            collaborators.bibliography.clone(),
            config.relations.clone(),
        );
        Ok(Self::new(store, analyzer))
    }

    /// Analyze the papers recommended today (UTC)
    pub async fn analyze_today(&self, user_id: Uuid) -> Result<TodayRelations> {
        self.analyze_on(user_id, Utc::now().date_naive()).await
    }

    #[instrument(skip(self))]
    pub async fn analyze_on(&self, user_id: Uuid, date: NaiveDate) -> Result<TodayRelations> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(AppError::UserNotFound {
                id: user_id.to_string(),
            });
        }

        let rows = self.store.recommendations_on(user_id, date).await?;

        let mut seen = HashSet::new();
        let papers: Vec<RelationPaper> = rows
            .into_iter()
            .filter(|r| seen.insert(r.paper_id))
            .map(|r| RelationPaper {
                id: Some(r.paper_id),
                external_id: strip_arxiv_prefix(&r.external_id).to_string(),
                title: r.title,
            })
            .collect();

        if papers.is_empty() {
            return Err(AppError::NoRecommendations {
                user_id: user_id.to_string(),
                date: date.to_string(),
            });
        }

        let report = self.analyzer.analyze(&papers).await;
        let suggestion = report.key_reference.as_ref().map(|key| {
            format!(
                "All {} of today's papers cite \"{}\". Want it recommended tomorrow?",
                report.papers_analyzed,
                key.reference.title
            )
        });

        info!(
            papers = papers.len(),
            common = report.graph.common_citation_count,
            "Daily relations analyzed"
        );

        Ok(TodayRelations {
            user_id,
            date,
            papers,
            report,
            suggestion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use paperpilot_common::config::RelationsConfig;
    use paperpilot_common::db::{MemoryStore, PaperRecord};
    use paperpilot_common::domain::{Candidate, CitationMetrics, ReadingLevel};
    use paperpilot_common::providers::{BibliographyProvider, PaperReferences, ReferenceEntry};
    use paperpilot_common::MockTextGenerator;

    /// Every paper cites the same foundational work
    struct SharedFoundation;

    #[async_trait]
    impl BibliographyProvider for SharedFoundation {
        async fn metrics(&self, _arxiv_id: &str) -> Result<CitationMetrics> {
            Ok(CitationMetrics::default())
        }

        async fn references(&self, _arxiv_id: &str) -> Result<PaperReferences> {
            Ok(PaperReferences {
                references: vec![ReferenceEntry {
                    paper_id: "s2-attention".into(),
                    title: "Attention Is All You Need".into(),
                    authors: vec!["Vaswani".into()],
                    arxiv_id: Some("1706.03762".into()),
                    is_influential: true,
                }],
                citations: vec![],
            })
        }
    }

    fn service(store: Arc<MemoryStore>) -> RelationService {
        let llm = MockTextGenerator::new().with_default("Both build on transformers.");
        let analyzer = CitationRelationAnalyzer::new(
            Arc::new(llm),
            Arc::new(SharedFoundation),
            RelationsConfig::default(),
        );
        RelationService::new(store, analyzer)
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let err = service(Arc::new(MemoryStore::new()))
            .analyze_today(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_no_recommendations_today() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user(Some("RAG"), ReadingLevel::Beginner);

        let err = service(store).analyze_today(user).await.unwrap_err();
        assert!(matches!(err, AppError::NoRecommendations { .. }));
    }

    #[tokio::test]
    async fn test_today_relations_suggest_common_reference() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user(Some("RAG"), ReadingLevel::Intermediate);
        let now = Utc::now();

        for id in ["2401.00001", "2401.00002", "1706.03762"] {
            let paper_id = store
                .upsert_paper(&PaperRecord::from_candidate(&Candidate::new(id, id), ""))
                .await
                .unwrap();
            if id != "1706.03762" {
                store.record_recommendation(user, paper_id, now, false).await.unwrap();
                // duplicates collapse to one input paper
                store.record_recommendation(user, paper_id, now, true).await.unwrap();
            }
        }

        let today = service(store.clone())
            .analyze_on(user, now.date_naive())
            .await
            .unwrap();

        assert_eq!(today.papers.len(), 2);
        assert_eq!(today.papers[0].external_id, "2401.00001");
        assert_eq!(today.report.graph.common_citation_count, 1);
        assert_eq!(
            today.suggestion.as_deref(),
            Some("All 2 of today's papers cite \"Attention Is All You Need\". Want it recommended tomorrow?")
        );
        // both recommended papers cite the stored foundation paper
        assert_eq!(today.report.edges_written, 2);
        assert!(store.citations().iter().all(|e| e.is_influential));
    }

    #[tokio::test]
    async fn test_suggestion_counts_only_analyzed_papers() {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user(Some("RAG"), ReadingLevel::Intermediate);
        let now = Utc::now();

        for id in ["2401.00001", "2401.00002", ""] {
            let paper_id = store
                .upsert_paper(&PaperRecord::from_candidate(&Candidate::new(id, "Untitled"), ""))
                .await
                .unwrap();
            store.record_recommendation(user, paper_id, now, false).await.unwrap();
        }

        let today = service(store)
            .analyze_on(user, now.date_naive())
            .await
            .unwrap();

        assert_eq!(today.papers.len(), 3);
        assert_eq!(today.report.papers_analyzed, 2);
        assert_eq!(today.report.graph.nodes.len(), 4);
        assert!(today
            .suggestion
            .unwrap()
            .starts_with("All 2 of today's papers cite"));
    }
}
