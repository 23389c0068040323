//! arXiv search client (Atom feed)

use async_trait::async_trait;
use chrono::NaiveDate;
use paperpilot_common::config::ArxivConfig;
use paperpilot_common::domain::Candidate;
use paperpilot_common::errors::{AppError, Result};
use paperpilot_common::metrics::record_provider_request;
use paperpilot_common::providers::PaperSearchProvider;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "arxiv";

/// Keywords used to build the disjunctive query
const QUERY_KEYWORDS: usize = 3;

#[derive(Clone)]
pub struct ArxivClient {
    http: reqwest::Client,
    base_url: String,
    max_results_cap: usize,
    timeout_ms: u64,
}

impl ArxivClient {
    pub fn new(config: &ArxivConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("paperpilot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            max_results_cap: config.max_results_cap,
            timeout_ms: config.timeout_secs * 1000,
        })
    }

    /// `all:"kw1" OR all:"kw2" OR all:"kw3"`
    pub fn build_query(keywords: &[String]) -> String {
        keywords
            .iter()
            .take(QUERY_KEYWORDS)
            .map(|kw| format!("all:\"{}\"", kw.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

#[async_trait]
impl PaperSearchProvider for ArxivClient {
    async fn search(&self, keywords: &[String], max_results: usize) -> Result<Vec<Candidate>> {
        let query = Self::build_query(keywords);
        if query.is_empty() {
            return Err(AppError::Validation {
                message: "no keywords to search for".to_string(),
                field: Some("keywords".to_string()),
            });
        }

        let limit = max_results.min(self.max_results_cap);
        debug!(query = %query, limit, "Searching arXiv");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("search_query", query.as_str())])
            .query(&[("start", 0), ("max_results", limit)])
            .query(&[("sortBy", "submittedDate"), ("sortOrder", "descending")])
            .send()
            .await
            .map_err(|e| AppError::from_request(SERVICE, self.timeout_ms, e));

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                record_provider_request(SERVICE, "search", false);
                return Err(AppError::UpstreamStatus {
                    service: SERVICE.to_string(),
                    status: r.status().as_u16(),
                });
            }
            Err(e) => {
                record_provider_request(SERVICE, "search", false);
                return Err(e);
            }
        };

        let body = response
            .text()
            .await
            .map_err(|e| AppError::from_request(SERVICE, self.timeout_ms, e))?;
        record_provider_request(SERVICE, "search", true);

        let mut candidates = parse_atom_feed(&body);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[derive(Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    pdf_url: Option<String>,
    categories: Vec<String>,
}

impl EntryBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Id => &mut self.id,
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::AuthorName => match self.authors.last_mut() {
                Some(name) => name,
                None => return,
            },
        };
        target.push_str(text);
    }

    fn build(self) -> Option<Candidate> {
        let external_id = self.id.trim().rsplit('/').next()?.trim().to_string();
        if external_id.is_empty() {
            return None;
        }

        let mut candidate = Candidate::new(external_id, collapse_whitespace(&self.title));
        candidate.abstract_text = collapse_whitespace(&self.summary);
        candidate.authors = self
            .authors
            .into_iter()
            .map(|a| collapse_whitespace(&a))
            .filter(|a| !a.is_empty())
            .collect();
        candidate.published = self
            .published
            .trim()
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        candidate.pdf_url = self.pdf_url;
        candidate.categories = self.categories;
        Some(candidate)
    }

    /// `<link>` and `<category>` carry their data in attributes
    fn absorb_attributes(&mut self, e: &BytesStart<'_>) {
        match local_name(e.name().as_ref()) {
            b"link" => {
                let mut href = None;
                let mut is_pdf = false;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"href" => href = Some(value),
                        b"title" if value.eq_ignore_ascii_case("pdf") => is_pdf = true,
                        b"type" if value == "application/pdf" => is_pdf = true,
                        _ => {}
                    }
                }
                if is_pdf && self.pdf_url.is_none() {
                    self.pdf_url = href;
                }
            }
            b"category" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"term" {
                        self.categories
                            .push(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            _ => {}
        }
    }
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(ix) => &raw[ix + 1..],
        None => raw,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an arXiv Atom feed into candidates.
///
/// Entries without an id are skipped. A malformed document stops the
/// parse and returns the entries read so far.
pub fn parse_atom_feed(xml: &str) -> Vec<Candidate> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if entry.is_none() => {
                if local_name(e.name().as_ref()) == b"entry" {
                    entry = Some(EntryBuilder::default());
                }
            }
            Ok(Event::Start(e)) => {
                let Some(current) = entry.as_mut() else {
                    buf.clear();
                    continue;
                };
                field = match local_name(e.name().as_ref()) {
                    b"id" => Some(Field::Id),
                    b"title" => Some(Field::Title),
                    b"summary" => Some(Field::Summary),
                    b"published" => Some(Field::Published),
                    b"name" => {
                        current.authors.push(String::new());
                        Some(Field::AuthorName)
                    }
                    _ => {
                        current.absorb_attributes(&e);
                        None
                    }
                };
            }
            Ok(Event::Empty(e)) => {
                if let Some(current) = entry.as_mut() {
                    current.absorb_attributes(&e);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(current), Some(f)) = (entry.as_mut(), field) {
                    let text = t.unescape().unwrap_or_default();
                    current.push_text(f, &text);
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if local_name(e.name().as_ref()) == b"entry" {
                    if let Some(candidate) = entry.take().and_then(EntryBuilder::build) {
                        out.push(candidate);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(
                    error = %e,
                    parsed = out.len(),
                    "Malformed arXiv feed, keeping entries parsed so far"
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    out
}
