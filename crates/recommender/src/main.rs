//! PaperPilot command-line entry point
//!
//! Subcommands:
//! - `run`: stored recommendation flow for a user
//! - `recommend`: low-cost flow for an ad-hoc interest
//! - `relations`: common references among today's recommendations
//! - `describe`: level-aware summary of a stored paper
//!
//! Results are printed as JSON on stdout; logs go to stderr. Failures
//! exit non-zero with a code per error category.

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use paperpilot_common::config::{AppConfig, ObservabilityConfig};
use paperpilot_common::domain::ReadingLevel;
use paperpilot_common::errors::{AppError, ErrorCategory};
use paperpilot_common::metrics::{self, UPSTREAM_BUCKETS};
use paperpilot_recommender::{Collaborators, RecommendationPipeline, RelationService};
use serde::Serialize;
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "paperpilot", version, about = "Academic paper recommendations")]
struct Cli {
    /// Optional configuration file layered under APP__* variables
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recommend new papers to a stored user and record them
    Run {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Recommend papers for an interest without touching storage
    Recommend {
        #[arg(long)]
        interest: String,
        #[arg(long, default_value = "intermediate")]
        level: String,
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Analyze common references among today's recommendations
    Relations {
        #[arg(long)]
        user: Uuid,
    },
    /// Summarize a stored paper for a reading level
    Describe {
        #[arg(long)]
        paper: Uuid,
        #[arg(long, default_value = "intermediate")]
        level: String,
    },
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(UPSTREAM_BUCKETS)?
        .install()?;
    metrics::register_metrics();
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Exit status for a failed command
///
/// 2 invalid input, 3 not found, 4 upstream unavailable, 5 persistence,
/// 1 anything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(app) = err.downcast_ref::<AppError>() else {
        return 1;
    };
    if app.is_not_found() {
        return 3;
    }
    if app.is_upstream() {
        return 4;
    }
    match app.category() {
        ErrorCategory::InvalidInput => 2,
        ErrorCategory::Persistence => 5,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.downcast_ref::<AppError>().map(|app| app.code().as_code());
            error!(error = %e, code, "Command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting PaperPilot v{}",
        paperpilot_common::VERSION
    );
    init_metrics(&config.observability)?;

    match cli.command {
        Command::Run { user, top_n } => {
            let collaborators = Collaborators::connect(&config).await?;
            let pipeline = RecommendationPipeline::new(&config, collaborators);
            print_json(&pipeline.run_for_user(user, top_n).await?)
        }
        Command::Recommend {
            interest,
            level,
            top_n,
        } => {
            let collaborators = Collaborators::from_config(&config)?;
            let pipeline = RecommendationPipeline::new(&config, collaborators);
            let level = ReadingLevel::parse_loose(&level);
            print_json(&pipeline.recommend(&interest, level, top_n).await?)
        }
        Command::Relations { user } => {
            let collaborators = Collaborators::connect(&config).await?;
            let service = RelationService::from_collaborators(&config, &collaborators)?;
            print_json(&service.analyze_today(user).await?)
        }
        Command::Describe { paper, level } => {
            let collaborators = Collaborators::connect(&config).await?;
            let pipeline = RecommendationPipeline::new(&config, collaborators);
            let level = ReadingLevel::parse_loose(&level);
            print_json(&pipeline.summaries().describe_stored(paper, level).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_per_category() {
        let not_found = anyhow::Error::from(AppError::UserNotFound { id: "u1".into() });
        assert_eq!(exit_code(&not_found), 3);

        let invalid = anyhow::Error::from(AppError::Validation {
            message: "research interest is empty".into(),
            field: Some("interest".into()),
        });
        assert_eq!(exit_code(&invalid), 2);

        let upstream = anyhow::Error::from(AppError::UpstreamTimeout {
            service: "arxiv".into(),
            timeout_ms: 30_000,
        });
        assert_eq!(exit_code(&upstream), 4);

        let storage = anyhow::Error::from(AppError::DatabaseConnection {
            message: "refused".into(),
        });
        assert_eq!(exit_code(&storage), 5);

        assert_eq!(exit_code(&anyhow::anyhow!("bad config file")), 1);
    }
}
