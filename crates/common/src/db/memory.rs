//! In-memory `PaperStore` for development and testing

use crate::db::store::{
    CitationEdgeRecord, PaperRecord, PaperStore, RecommendationRecord, StoredPaper, UserProfile,
};
use crate::domain::ReadingLevel;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserProfile>,
    papers: HashMap<Uuid, (PaperRecord, Uuid)>,
    by_external_id: HashMap<String, Uuid>,
    summaries: HashMap<(Uuid, ReadingLevel), String>,
    citations: Vec<CitationEdgeRecord>,
    recommendations: Vec<(Uuid, Uuid, DateTime<Utc>, bool)>,
    fail_writes: bool,
    fail_lookups: bool,
}

/// Thread-safe in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| AppError::Internal {
            message: "memory store lock poisoned".to_string(),
        })
    }

    fn check_writable(tables: &Tables) -> Result<()> {
        if tables.fail_writes {
            return Err(AppError::DatabaseConnection {
                message: "writes disabled".to_string(),
            });
        }
        Ok(())
    }

    /// Add a user; returns its id
    pub fn add_user(&self, interest: Option<&str>, level: ReadingLevel) -> Uuid {
        let id = Uuid::new_v4();
        if let Ok(mut t) = self.lock() {
            t.users.insert(
                id,
                UserProfile {
                    id,
                    interest: interest.map(str::to_string),
                    level,
                },
            );
        }
        id
    }

    /// Make every subsequent write fail with a persistence error
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut t) = self.lock() {
            t.fail_writes = fail;
        }
    }

    /// Make lookups by external id fail with a persistence error
    pub fn fail_lookups(&self, fail: bool) {
        if let Ok(mut t) = self.lock() {
            t.fail_lookups = fail;
        }
    }

    pub fn summary(&self, paper_id: Uuid, level: ReadingLevel) -> Option<String> {
        self.lock().ok()?.summaries.get(&(paper_id, level)).cloned()
    }

    pub fn summary_count(&self) -> usize {
        self.lock().map(|t| t.summaries.len()).unwrap_or(0)
    }

    pub fn paper_count(&self) -> usize {
        self.lock().map(|t| t.papers.len()).unwrap_or(0)
    }

    pub fn citations(&self) -> Vec<CitationEdgeRecord> {
        self.lock().map(|t| t.citations.clone()).unwrap_or_default()
    }

    pub fn recommendation_count(&self) -> usize {
        self.lock().map(|t| t.recommendations.len()).unwrap_or(0)
    }

    fn stored(id: Uuid, record: &PaperRecord) -> StoredPaper {
        StoredPaper {
            id,
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            authors: record.authors.clone(),
            abstract_text: record.abstract_text.clone(),
            published: record.published,
            pdf_url: record.pdf_url.clone(),
            full_text: record.full_text.clone(),
        }
    }
}

#[async_trait]
impl PaperStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn existing_external_ids(&self, keys: &[String]) -> Result<HashSet<String>> {
        let t = self.lock()?;
        Ok(keys
            .iter()
            .filter(|k| t.by_external_id.contains_key(k.as_str()))
            .cloned()
            .collect())
    }

    async fn find_paper(&self, paper_id: Uuid) -> Result<Option<StoredPaper>> {
        let t = self.lock()?;
        Ok(t.papers.get(&paper_id).map(|(r, id)| Self::stored(*id, r)))
    }

    async fn find_paper_by_external_id(&self, external_id: &str) -> Result<Option<StoredPaper>> {
        let t = self.lock()?;
        if t.fail_lookups {
            return Err(AppError::DatabaseConnection {
                message: "lookups disabled".to_string(),
            });
        }
        Ok(t.by_external_id
            .get(external_id)
            .and_then(|id| t.papers.get(id))
            .map(|(r, id)| Self::stored(*id, r)))
    }

    async fn upsert_paper(&self, record: &PaperRecord) -> Result<Uuid> {
        let mut t = self.lock()?;
        Self::check_writable(&t)?;

        let id = match t.by_external_id.get(&record.external_id) {
            Some(id) => *id,
            None => Uuid::new_v4(),
        };

        let mut next = record.clone();
        if next.full_text.is_none() {
            next.full_text = t.papers.get(&id).and_then(|(r, _)| r.full_text.clone());
        }

        t.by_external_id.insert(record.external_id.clone(), id);
        t.papers.insert(id, (next, id));
        Ok(id)
    }

    async fn upsert_summary(&self, paper_id: Uuid, level: ReadingLevel, text: &str) -> Result<()> {
        let mut t = self.lock()?;
        Self::check_writable(&t)?;
        t.summaries.insert((paper_id, level), text.to_string());
        Ok(())
    }

    async fn insert_citation_if_absent(&self, edge: &CitationEdgeRecord) -> Result<bool> {
        let mut t = self.lock()?;
        Self::check_writable(&t)?;

        if edge.citing_paper_id == edge.cited_paper_id {
            return Ok(false);
        }
        let exists = t.citations.iter().any(|e| {
            e.citing_paper_id == edge.citing_paper_id && e.cited_paper_id == edge.cited_paper_id
        });
        if exists {
            return Ok(false);
        }
        t.citations.push(edge.clone());
        Ok(true)
    }

    async fn record_recommendation(
        &self,
        user_id: Uuid,
        paper_id: Uuid,
        at: DateTime<Utc>,
        user_requested: bool,
    ) -> Result<()> {
        let mut t = self.lock()?;
        Self::check_writable(&t)?;
        t.recommendations.push((user_id, paper_id, at, user_requested));
        Ok(())
    }

    async fn recommendations_on(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<RecommendationRecord>> {
        let t = self.lock()?;
        let mut rows: Vec<RecommendationRecord> = t
            .recommendations
            .iter()
            .filter(|(user, _, at, _)| *user == user_id && at.date_naive() == date)
            .filter_map(|(_, paper_id, at, requested)| {
                let (record, _) = t.papers.get(paper_id)?;
                Some(RecommendationRecord {
                    paper_id: *paper_id,
                    external_id: record.external_id.clone(),
                    title: record.title.clone(),
                    recommended_at: *at,
                    user_requested: *requested,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.recommended_at);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candidate;

    #[tokio::test]
    async fn test_upsert_is_keyed_by_external_id() {
        let store = MemoryStore::new();
        let mut candidate = Candidate::new("2401.00001", "First title");
        let first = store
            .upsert_paper(&PaperRecord::from_candidate(&candidate, "full text"))
            .await
            .unwrap();

        candidate.title = "Revised title".into();
        let second = store
            .upsert_paper(&PaperRecord::from_candidate(&candidate, ""))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.paper_count(), 1);

        let stored = store.find_paper(first).await.unwrap().unwrap();
        assert_eq!(stored.title, "Revised title");
        // empty text keeps what was extracted before
        assert_eq!(stored.full_text.as_deref(), Some("full text"));
    }

    #[tokio::test]
    async fn test_citation_insert_if_absent() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let edge = CitationEdgeRecord {
            citing_paper_id: a,
            cited_paper_id: b,
            relation_type: "reference".into(),
            is_influential: false,
        };

        assert!(store.insert_citation_if_absent(&edge).await.unwrap());
        assert!(!store.insert_citation_if_absent(&edge).await.unwrap());

        let self_edge = CitationEdgeRecord {
            cited_paper_id: a,
            ..edge
        };
        assert!(!store.insert_citation_if_absent(&self_edge).await.unwrap());
        assert_eq!(store.citations().len(), 1);
    }

    #[tokio::test]
    async fn test_summary_overwrites_per_level() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.upsert_summary(id, ReadingLevel::Beginner, "v1").await.unwrap();
        store.upsert_summary(id, ReadingLevel::Beginner, "v2").await.unwrap();
        store.upsert_summary(id, ReadingLevel::Advanced, "adv").await.unwrap();

        assert_eq!(store.summary(id, ReadingLevel::Beginner).as_deref(), Some("v2"));
        assert_eq!(store.summary_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_writes_surface_as_persistence() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let err = store
            .upsert_summary(Uuid::new_v4(), ReadingLevel::Beginner, "x")
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::Persistence);
    }
}
