//! Semantic Scholar Graph API client
//!
//! Requests are paced by a token bucket shared across calls.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use paperpilot_common::config::SemanticScholarConfig;
use paperpilot_common::domain::CitationMetrics;
use paperpilot_common::errors::{AppError, Result};
use paperpilot_common::metrics::record_provider_request;
use paperpilot_common::providers::{BibliographyProvider, PaperReferences, ReferenceEntry};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "semantic_scholar";

const METRIC_FIELDS: &str = "citationCount,citationVelocity,influentialCitationCount,year,venue";

const REFERENCE_FIELDS: &str = "references.paperId,references.title,references.authors,\
    references.externalIds,citations.paperId,citations.title,citations.authors";

pub struct SemanticScholarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    metrics_timeout: Duration,
    references_timeout: Duration,
    limiter: DefaultDirectRateLimiter,
}

impl SemanticScholarClient {
    pub fn new(config: &SemanticScholarConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("paperpilot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let rate = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            AppError::Configuration {
                message: "semantic_scholar.requests_per_second must be positive".to_string(),
            }
        })?;
        let burst = NonZeroU32::new(config.burst).unwrap_or(rate);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            metrics_timeout: Duration::from_secs(config.metrics_timeout_secs),
            references_timeout: Duration::from_secs(config.references_timeout_secs),
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        arxiv_id: &str,
        fields: &str,
        timeout: Duration,
    ) -> Result<T> {
        self.limiter.until_ready().await;

        let url = format!("{}/paper/arXiv:{}", self.base_url, arxiv_id);
        let mut request = self
            .http
            .get(&url)
            .query(&[("fields", fields)])
            .timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let outcome = Self::fetch(request, timeout.as_millis() as u64).await;

        record_provider_request(SERVICE, operation, outcome.is_ok());
        debug!(arxiv_id, operation, ok = outcome.is_ok(), "Semantic Scholar lookup");
        outcome
    }

    async fn fetch<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
        timeout_ms: u64,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::from_request(SERVICE, timeout_ms, e))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::from_request(SERVICE, timeout_ms, e))?;

        serde_json::from_str(&body).map_err(|e| AppError::malformed(SERVICE, e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsResponse {
    #[serde(default)]
    citation_count: Option<i64>,
    #[serde(default)]
    citation_velocity: Option<f64>,
    #[serde(default)]
    influential_citation_count: Option<i64>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    venue: Option<String>,
}

impl From<MetricsResponse> for CitationMetrics {
    fn from(r: MetricsResponse) -> Self {
        Self {
            citation_count: r.citation_count.unwrap_or(0),
            citation_velocity: r.citation_velocity.filter(|v| v.is_finite()).unwrap_or(0.0),
            influential_citation_count: r.influential_citation_count.unwrap_or(0),
            year: r.year,
            venue: r.venue.filter(|v| !v.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperRef {
    #[serde(default)]
    paper_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Option<Vec<AuthorRef>>,
    #[serde(default)]
    external_ids: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    is_influential: Option<bool>,
}

impl PaperRef {
    /// Entries the provider could not resolve carry no paper id
    fn into_entry(self) -> Option<ReferenceEntry> {
        let paper_id = self.paper_id.filter(|id| !id.is_empty())?;
        let arxiv_id = self
            .external_ids
            .as_ref()
            .and_then(|ids| ids.get("ArXiv"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Some(ReferenceEntry {
            paper_id,
            title: self.title.unwrap_or_default(),
            authors: self
                .authors
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.name)
                .collect(),
            arxiv_id,
            is_influential: self.is_influential.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ReferencesResponse {
    #[serde(default)]
    references: Option<Vec<PaperRef>>,
    #[serde(default)]
    citations: Option<Vec<PaperRef>>,
}

impl From<ReferencesResponse> for PaperReferences {
    fn from(r: ReferencesResponse) -> Self {
        let convert = |list: Option<Vec<PaperRef>>| -> Vec<ReferenceEntry> {
            list.unwrap_or_default()
                .into_iter()
                .filter_map(PaperRef::into_entry)
                .collect()
        };
        Self {
            references: convert(r.references),
            citations: convert(r.citations),
        }
    }
}

#[async_trait]
impl BibliographyProvider for SemanticScholarClient {
    async fn metrics(&self, arxiv_id: &str) -> Result<CitationMetrics> {
        let response: MetricsResponse = self
            .get_json("metrics", arxiv_id, METRIC_FIELDS, self.metrics_timeout)
            .await?;
        Ok(response.into())
    }

    async fn references(&self, arxiv_id: &str) -> Result<PaperReferences> {
        let response: ReferencesResponse = self
            .get_json("references", arxiv_id, REFERENCE_FIELDS, self.references_timeout)
            .await?;
        Ok(response.into())
    }
}
