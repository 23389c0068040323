//! PDF full-text extraction
//!
//! Downloads a selected paper's PDF and extracts its text with lopdf.

use async_trait::async_trait;
use paperpilot_common::config::ArxivConfig;
use paperpilot_common::domain::Candidate;
use paperpilot_common::errors::{AppError, Result};
use paperpilot_common::metrics::record_provider_request;
use paperpilot_common::providers::FullTextSource;
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "arxiv_pdf";

pub struct ArxivPdfFetcher {
    http: reqwest::Client,
    pdf_base_url: String,
    timeout_ms: u64,
}

impl ArxivPdfFetcher {
    pub fn new(config: &ArxivConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("paperpilot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            pdf_base_url: config.pdf_base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_secs * 1000,
        })
    }

    fn pdf_url(&self, candidate: &Candidate) -> String {
        candidate
            .pdf_url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.pdf_base_url, candidate.external_id))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::from_request(SERVICE, self.timeout_ms, e))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::from_request(SERVICE, self.timeout_ms, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FullTextSource for ArxivPdfFetcher {
    async fn fetch_full_text(&self, candidate: &Candidate) -> Result<String> {
        let url = self.pdf_url(candidate);
        let bytes = self.download(&url).await;
        record_provider_request(SERVICE, "download", bytes.is_ok());
        let bytes = bytes?;

        let source_id = candidate.external_id.clone();
        tokio::task::spawn_blocking(move || extract_text_from_bytes(&source_id, &bytes))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("PDF extraction task failed: {}", e),
            })?
    }
}

/// Extract text from an in-memory PDF, skipping pages that fail
pub fn extract_text_from_bytes(source_id: &str, bytes: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| AppError::PdfExtraction {
        source_id: source_id.to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(source_id, page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!(source_id, page = page_num, error = %e, "Failed to extract page, skipping");
            }
        }
    }

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        return Err(AppError::PdfExtraction {
            source_id: source_id.to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    debug!(source_id, chars = cleaned.len(), "Text extraction complete");
    Ok(cleaned)
}

/// Collapse whitespace and drop byte-order marks
pub fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Hello   World\n\nTest"), "Hello World Test");
        assert_eq!(clean_text("\u{FEFF}Intro\t text"), "Intro text");
        assert_eq!(clean_text(" \n "), "");
    }

    #[test]
    fn test_invalid_pdf_is_an_extraction_error() {
        let err = extract_text_from_bytes("2401.00001", b"not a pdf").unwrap_err();
        assert!(matches!(err, AppError::PdfExtraction { .. }));
    }

    #[test]
    fn test_pdf_url_falls_back_to_base() {
        let fetcher = ArxivPdfFetcher::new(&ArxivConfig::default()).unwrap();
        let mut candidate = Candidate::new("2401.00001v1", "t");
        assert_eq!(fetcher.pdf_url(&candidate), "https://arxiv.org/pdf/2401.00001v1");

        candidate.pdf_url = Some("http://arxiv.org/pdf/2401.00001v1".into());
        assert_eq!(fetcher.pdf_url(&candidate), "http://arxiv.org/pdf/2401.00001v1");
    }
}
