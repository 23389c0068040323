//! PaperPilot Common Library
//!
//! Shared code for all PaperPilot crates including:
//! - Domain types (candidates, citation metrics, reading levels)
//! - Collaborator traits for LLM, search, bibliography and storage
//! - Database models and repository
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod providers;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{MemoryStore, PaperStore, Repository};
pub use domain::{Candidate, CitationMetrics, ReadingLevel};
pub use errors::{AppError, Result};
pub use llm::{CompletionRequest, LlmPurpose, MockTextGenerator, TextGenerator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
