//! Configuration management for PaperPilot
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Every default reproduces the constants the recommender was tuned with,
//! so an empty configuration behaves exactly like the reference setup.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub arxiv: ArxivConfig,

    #[serde(default)]
    pub semantic_scholar: SemanticScholarConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub relations: RelationsConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint (OpenAI compatible)
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Bearer token
    #[serde(default)]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// System prompt sent with every completion
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArxivConfig {
    /// Atom query endpoint
    #[serde(default = "default_arxiv_base")]
    pub base_url: String,

    /// Base for PDF downloads when an entry carries no pdf link
    #[serde(default = "default_arxiv_pdf_base")]
    pub pdf_base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_arxiv_timeout")]
    pub timeout_secs: u64,

    /// Hard cap on results per search
    #[serde(default = "default_arxiv_cap")]
    pub max_results_cap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SemanticScholarConfig {
    /// Graph API base URL
    #[serde(default = "default_s2_base")]
    pub base_url: String,

    /// Optional API key (sent as x-api-key)
    pub api_key: Option<String>,

    /// Timeout for citation-metric lookups
    #[serde(default = "default_s2_metrics_timeout")]
    pub metrics_timeout_secs: u64,

    /// Timeout for reference-list lookups
    #[serde(default = "default_s2_references_timeout")]
    pub references_timeout_secs: u64,

    /// Sustained request rate
    #[serde(default = "default_s2_rate")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_s2_burst")]
    pub burst: u32,
}

/// Weights for the four-signal composite score
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FullWeights {
    pub recentness: f64,
    pub citation: f64,
    pub keyword_match: f64,
    pub difficulty: f64,
}

impl Default for FullWeights {
    fn default() -> Self {
        Self {
            recentness: 0.2,
            citation: 0.3,
            keyword_match: 0.3,
            difficulty: 0.2,
        }
    }
}

/// Weights for the LLM-free pre-filter score
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HeuristicWeights {
    pub recentness: f64,
    pub citation: f64,
    pub keyword_simple: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            recentness: 0.3,
            citation: 0.4,
            keyword_simple: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: FullWeights,

    #[serde(default)]
    pub heuristic_weights: HeuristicWeights,

    /// Characters of abstract shown to the LLM judge
    #[serde(default = "default_abstract_excerpt")]
    pub abstract_excerpt_chars: usize,

    /// Score substituted when an LLM judgment is unavailable
    #[serde(default = "default_neutral_score")]
    pub neutral_score: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionConfig {
    /// Candidates kept after the heuristic pre-filter
    #[serde(default = "default_prefilter_width")]
    pub prefilter_width: usize,

    /// Final recommendation count
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Search results requested per run
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationsConfig {
    /// Maximum common references retained per analysis
    #[serde(default = "default_common_reference_cap")]
    pub common_reference_cap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_attempts")]
    pub max_attempts: usize,

    /// Minimum accepted summary length in characters
    #[serde(default = "default_summary_min_length")]
    pub min_length: usize,

    /// Budget of extracted full text sent to the LLM
    #[serde(default = "default_full_text_chars")]
    pub full_text_chars: usize,

    /// Budget of abstract sent when no full text exists
    #[serde(default = "default_abstract_chars")]
    pub abstract_chars: usize,

    /// Leading characters compared for copy detection
    #[serde(default = "default_copy_check_chars")]
    pub copy_check_chars: usize,

    /// Leading abstract characters that must not appear verbatim
    #[serde(default = "default_containment_chars")]
    pub containment_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_database_url() -> String { "postgres://localhost/paperpilot".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_system_prompt() -> String {
    "You are a careful research assistant that helps readers find and understand academic papers. \
     Follow the requested output format exactly."
        .to_string()
}
fn default_arxiv_base() -> String { "https://export.arxiv.org/api/query".to_string() }
fn default_arxiv_pdf_base() -> String { "https://arxiv.org/pdf".to_string() }
fn default_arxiv_timeout() -> u64 { 30 }
fn default_arxiv_cap() -> usize { 50 }
fn default_s2_base() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_s2_metrics_timeout() -> u64 { 5 }
fn default_s2_references_timeout() -> u64 { 10 }
fn default_s2_rate() -> u32 { 1 }
fn default_s2_burst() -> u32 { 3 }
fn default_abstract_excerpt() -> usize { 500 }
fn default_neutral_score() -> f64 { 0.5 }
fn default_prefilter_width() -> usize { 10 }
fn default_top_n() -> usize { 3 }
fn default_max_results() -> usize { 20 }
fn default_common_reference_cap() -> usize { 10 }
fn default_summary_attempts() -> usize { 2 }
fn default_summary_min_length() -> usize { 100 }
fn default_full_text_chars() -> usize { 2000 }
fn default_abstract_chars() -> usize { 1000 }
fn default_copy_check_chars() -> usize { 200 }
fn default_containment_chars() -> usize { 150 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "paperpilot".to_string() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: default_arxiv_base(),
            pdf_base_url: default_arxiv_pdf_base(),
            timeout_secs: default_arxiv_timeout(),
            max_results_cap: default_arxiv_cap(),
        }
    }
}

impl Default for SemanticScholarConfig {
    fn default() -> Self {
        Self {
            base_url: default_s2_base(),
            api_key: None,
            metrics_timeout_secs: default_s2_metrics_timeout(),
            references_timeout_secs: default_s2_references_timeout(),
            requests_per_second: default_s2_rate(),
            burst: default_s2_burst(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: FullWeights::default(),
            heuristic_weights: HeuristicWeights::default(),
            abstract_excerpt_chars: default_abstract_excerpt(),
            neutral_score: default_neutral_score(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            prefilter_width: default_prefilter_width(),
            top_n: default_top_n(),
            max_results: default_max_results(),
        }
    }
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            common_reference_cap: default_common_reference_cap(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_summary_attempts(),
            min_length: default_summary_min_length(),
            full_text_chars: default_full_text_chars(),
            abstract_chars: default_abstract_chars(),
            copy_check_chars: default_copy_check_chars(),
            containment_chars: default_containment_chars(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__LLM__API_KEY=sk-...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
