//! Repository pattern for database operations
//!
//! SeaORM implementation of `PaperStore` with one transaction per
//! logical write.

use crate::db::models::*;
use crate::db::store::{
    CitationEdgeRecord, PaperRecord, PaperStore, RecommendationRecord, StoredPaper, UserProfile,
};
use crate::db::DbPool;
use crate::domain::ReadingLevel;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    async fn load_stored(&self, paper: Paper) -> Result<StoredPaper> {
        let metadata = PaperMetadataEntity::find()
            .filter(PaperMetadataColumn::PaperId.eq(paper.id))
            .one(self.read_conn())
            .await?;

        Ok(StoredPaper {
            id: paper.id,
            external_id: paper.external_id,
            title: paper.title,
            authors: authors_from_json(&paper.authors),
            abstract_text: paper.abstract_text,
            published: paper.published_date,
            pdf_url: paper.pdf_url,
            full_text: metadata.and_then(|m| m.full_text),
        })
    }
}

fn authors_from_json(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[async_trait]
impl PaperStore for Repository {
    // ========================================================================
    // User Operations
    // ========================================================================

    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let user = UserEntity::find_by_id(user_id).one(self.read_conn()).await?;

        Ok(user.map(|u| UserProfile {
            id: u.id,
            interest: u.interest,
            level: ReadingLevel::parse_loose(&u.level),
        }))
    }

    // ========================================================================
    // Paper Operations
    // ========================================================================

    async fn existing_external_ids(&self, keys: &[String]) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let papers = PaperEntity::find()
            .filter(PaperColumn::ExternalId.is_in(keys.iter().cloned()))
            .all(self.read_conn())
            .await?;

        Ok(papers.into_iter().map(|p| p.external_id).collect())
    }

    async fn find_paper(&self, paper_id: Uuid) -> Result<Option<StoredPaper>> {
        match PaperEntity::find_by_id(paper_id).one(self.read_conn()).await? {
            Some(paper) => Ok(Some(self.load_stored(paper).await?)),
            None => Ok(None),
        }
    }

    async fn find_paper_by_external_id(&self, external_id: &str) -> Result<Option<StoredPaper>> {
        let paper = PaperEntity::find()
            .filter(PaperColumn::ExternalId.eq(external_id))
            .one(self.read_conn())
            .await?;

        match paper {
            Some(paper) => Ok(Some(self.load_stored(paper).await?)),
            None => Ok(None),
        }
    }

    async fn upsert_paper(&self, record: &PaperRecord) -> Result<Uuid> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let existing = PaperEntity::find()
            .filter(PaperColumn::ExternalId.eq(record.external_id.as_str()))
            .one(&txn)
            .await?;

        let authors = serde_json::to_value(&record.authors)?;
        let paper_id = match existing {
            Some(paper) => {
                let id = paper.id;
                let mut active = paper.into_active_model();
                active.title = Set(record.title.clone());
                active.authors = Set(authors);
                active.abstract_text = Set(record.abstract_text.clone());
                active.published_date = Set(record.published);
                active.source = Set(record.source.clone());
                active.pdf_url = Set(record.pdf_url.clone());
                active.updated_at = Set(now.into());
                active.update(&txn).await?;
                id
            }
            None => {
                let id = Uuid::new_v4();
                PaperActiveModel {
                    id: Set(id),
                    external_id: Set(record.external_id.clone()),
                    title: Set(record.title.clone()),
                    authors: Set(authors),
                    abstract_text: Set(record.abstract_text.clone()),
                    published_date: Set(record.published),
                    source: Set(record.source.clone()),
                    pdf_url: Set(record.pdf_url.clone()),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(&txn)
                .await?;
                id
            }
        };

        let keywords = serde_json::to_value(&record.keywords)?;
        let metadata = PaperMetadataEntity::find()
            .filter(PaperMetadataColumn::PaperId.eq(paper_id))
            .one(&txn)
            .await?;

        match metadata {
            Some(existing) => {
                let mut active = existing.into_active_model();
                if record.full_text.is_some() {
                    active.full_text = Set(record.full_text.clone());
                }
                active.keywords = Set(keywords);
                active.citation_count = Set(record.metrics.citation_count);
                active.citation_velocity = Set(record.metrics.citation_velocity);
                active.influential_citation_count =
                    Set(record.metrics.influential_citation_count);
                active.year = Set(record.metrics.year);
                active.venue = Set(record.metrics.venue.clone());
                active.updated_at = Set(now.into());
                active.update(&txn).await?;
            }
            None => {
                PaperMetadataActiveModel {
                    id: Set(Uuid::new_v4()),
                    paper_id: Set(paper_id),
                    full_text: Set(record.full_text.clone()),
                    keywords: Set(keywords),
                    citation_count: Set(record.metrics.citation_count),
                    citation_velocity: Set(record.metrics.citation_velocity),
                    influential_citation_count: Set(record.metrics.influential_citation_count),
                    year: Set(record.metrics.year),
                    venue: Set(record.metrics.venue.clone()),
                    updated_at: Set(now.into()),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        debug!(paper_id = %paper_id, external_id = %record.external_id, "Paper upserted");

        Ok(paper_id)
    }

    // ========================================================================
    // Summary Operations
    // ========================================================================

    async fn upsert_summary(&self, paper_id: Uuid, level: ReadingLevel, text: &str) -> Result<()> {
        let now = Utc::now();
        let txn = self.write_conn().begin().await?;

        let existing = PaperSummaryEntity::find()
            .filter(PaperSummaryColumn::PaperId.eq(paper_id))
            .filter(PaperSummaryColumn::Level.eq(level.as_str()))
            .one(&txn)
            .await?;

        match existing {
            Some(summary) => {
                let mut active = summary.into_active_model();
                active.summary = Set(text.to_string());
                active.updated_at = Set(now.into());
                active.update(&txn).await?;
            }
            None => {
                PaperSummaryActiveModel {
                    id: Set(Uuid::new_v4()),
                    paper_id: Set(paper_id),
                    level: Set(level.as_str().to_string()),
                    summary: Set(text.to_string()),
                    updated_at: Set(now.into()),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Citation Operations
    // ========================================================================

    async fn insert_citation_if_absent(&self, edge: &CitationEdgeRecord) -> Result<bool> {
        if edge.citing_paper_id == edge.cited_paper_id {
            return Ok(false);
        }

        let txn = self.write_conn().begin().await?;

        let existing = CitationEntity::find()
            .filter(CitationColumn::CitingPaperId.eq(edge.citing_paper_id))
            .filter(CitationColumn::CitedPaperId.eq(edge.cited_paper_id))
            .one(&txn)
            .await?;

        if existing.is_some() {
            txn.rollback().await?;
            return Ok(false);
        }

        CitationActiveModel {
            id: Set(Uuid::new_v4()),
            citing_paper_id: Set(edge.citing_paper_id),
            cited_paper_id: Set(edge.cited_paper_id),
            relation_type: Set(edge.relation_type.clone()),
            is_influential: Set(edge.is_influential),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(true)
    }

    // ========================================================================
    // Recommendation Operations
    // ========================================================================

    async fn record_recommendation(
        &self,
        user_id: Uuid,
        paper_id: Uuid,
        at: DateTime<Utc>,
        user_requested: bool,
    ) -> Result<()> {
        RecommendationActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            paper_id: Set(paper_id),
            recommended_at: Set(at.into()),
            is_user_requested: Set(user_requested),
        }
        .insert(self.write_conn())
        .await?;

        Ok(())
    }

    async fn recommendations_on(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<RecommendationRecord>> {
        let (start, end) = day_bounds(date);

        let rows = RecommendationEntity::find()
            .filter(RecommendationColumn::UserId.eq(user_id))
            .filter(RecommendationColumn::RecommendedAt.gte(start))
            .filter(RecommendationColumn::RecommendedAt.lt(end))
            .order_by_asc(RecommendationColumn::RecommendedAt)
            .all(self.read_conn())
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let paper_ids: Vec<Uuid> = rows.iter().map(|r| r.paper_id).collect();
        let papers: HashMap<Uuid, Paper> = PaperEntity::find()
            .filter(PaperColumn::Id.is_in(paper_ids))
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let paper = papers.get(&row.paper_id)?;
                Some(RecommendationRecord {
                    paper_id: row.paper_id,
                    external_id: paper.external_id.clone(),
                    title: paper.title.clone(),
                    recommended_at: row.recommended_at.with_timezone(&Utc),
                    user_requested: row.is_user_requested,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bounds_cover_one_utc_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let (start, end) = day_bounds(date);
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn test_authors_from_json_skips_non_strings() {
        let value = serde_json::json!(["Ada", 3, "Grace"]);
        assert_eq!(authors_from_json(&value), vec!["Ada", "Grace"]);
        assert!(authors_from_json(&serde_json::json!({})).is_empty());
    }
}
