//! PaperPilot Discovery
//!
//! Turns a free-text interest into enriched candidates:
//! - Keyword expansion through the LLM
//! - arXiv Atom search
//! - Semantic Scholar citation metrics and reference lists
//! - Full-text extraction for selected papers

pub mod arxiv;
pub mod keywords;
pub mod pdf;
pub mod semantic_scholar;
pub mod source;

pub use arxiv::ArxivClient;
pub use keywords::KeywordExpander;
pub use pdf::ArxivPdfFetcher;
pub use semantic_scholar::SemanticScholarClient;
pub use source::CandidateSource;
