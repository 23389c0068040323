//! Reading-level summaries
//!
//! One LLM call per attempt, validated against the paper's abstract so a
//! summary that merely repeats the abstract is rejected and regenerated.

use paperpilot_common::config::SummaryConfig;
use paperpilot_common::db::PaperStore;
use paperpilot_common::domain::{truncate_chars, Candidate, ReadingLevel};
use paperpilot_common::errors::{AppError, Result};
use paperpilot_common::llm::{CompletionRequest, LlmPurpose, TextGenerator};
use paperpilot_common::metrics::record_summary_rejected;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Returned when no attempt produced any text
pub const FALLBACK_SUMMARY: &str = "Summary generation failed.";

/// Result of describing one paper
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    pub paper_id: Option<Uuid>,
    pub external_id: String,
    pub title: String,
    pub level: ReadingLevel,
    pub summary: String,
    /// Whether the returned text passed validation
    pub accepted: bool,
    pub attempts: usize,
    /// Whether the summary was written to storage
    pub persisted: bool,
}

pub struct SummaryGenerator {
    llm: Arc<dyn TextGenerator>,
    store: Option<Arc<dyn PaperStore>>,
    config: SummaryConfig,
}

impl SummaryGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, config: SummaryConfig) -> Self {
        Self {
            llm,
            store: None,
            config,
        }
    }

    /// Store summaries of stored papers through this store
    pub fn with_store(mut self, store: Arc<dyn PaperStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn build_prompt(&self, candidate: &Candidate, full_text: &str, level: ReadingLevel) -> String {
        let profile = level.profile();
        let content = if full_text.trim().is_empty() {
            truncate_chars(&candidate.abstract_text, self.config.abstract_chars)
        } else {
            truncate_chars(full_text, self.config.full_text_chars)
        };

        format!(
            "Summarize the following paper in about {length}.\n\
             {instructions}\n\n\
             Title: {title}\n\
             Authors: {authors}\n\
             Content:\n{content}\n\n\
             Write the summary based on the content above.",
            length = profile.target_length,
            instructions = profile.summary_instructions,
            title = candidate.title,
            authors = candidate.author_line(),
        )
    }

    /// Generate one summary; prefers extracted full text over the abstract
    pub async fn generate(
        &self,
        candidate: &Candidate,
        full_text: &str,
        level: ReadingLevel,
    ) -> Result<String> {
        let request = CompletionRequest::for_purpose(
            LlmPurpose::Summary,
            self.build_prompt(candidate, full_text, level),
        );
        let text = self.llm.complete(&request).await?;
        Ok(text.trim().to_string())
    }

    /// Reject empty, short, or copied-from-abstract summaries
    pub fn validate(&self, summary: &str, abstract_text: &str) -> bool {
        let trimmed = summary.trim();
        if trimmed.is_empty() || trimmed.chars().count() < self.config.min_length {
            return false;
        }

        let head_abstract = truncate_chars(abstract_text, self.config.copy_check_chars).trim();
        if head_abstract.is_empty() {
            return true;
        }

        let head_summary = truncate_chars(summary, self.config.copy_check_chars).trim();
        let abstract_lead = truncate_chars(head_abstract, self.config.containment_chars);

        head_summary != head_abstract && !summary.contains(abstract_lead)
    }

    /// Generate with validation and bounded retry.
    ///
    /// Returns the last generated text when every attempt is rejected.
    /// Candidates carrying a `stored_id` get their summary written to storage.
    #[instrument(skip_all, fields(arxiv_id = %candidate.external_id, level = %level))]
    pub async fn describe(
        &self,
        candidate: &Candidate,
        full_text: &str,
        level: ReadingLevel,
    ) -> SummaryOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last = String::new();
        let mut accepted = false;
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;
            match self.generate(candidate, full_text, level).await {
                Ok(text) => {
                    accepted = self.validate(&text, &candidate.abstract_text);
                    if !text.is_empty() {
                        last = text;
                    }
                    if accepted {
                        break;
                    }
                    debug!(attempt = attempts, max_attempts, "Summary rejected by validation");
                }
                Err(e) => {
                    warn!(attempt = attempts, error = %e, "Summary generation failed");
                }
            }
        }

        if !accepted {
            record_summary_rejected(level.as_str());
        }
        let summary = if last.is_empty() {
            FALLBACK_SUMMARY.to_string()
        } else {
            last
        };

        let persisted = match (candidate.stored_id, &self.store) {
            (Some(paper_id), Some(store)) => {
                match store.upsert_summary(paper_id, level, &summary).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(%paper_id, error = %e, "Failed to store summary");
                        false
                    }
                }
            }
            _ => false,
        };

        info!(accepted, attempts, persisted, "Summary ready");

        SummaryOutcome {
            paper_id: candidate.stored_id,
            external_id: candidate.external_id.clone(),
            title: candidate.title.clone(),
            level,
            summary,
            accepted,
            attempts,
            persisted,
        }
    }

    /// Describe a paper already in storage, using its stored full text
    pub async fn describe_stored(&self, paper_id: Uuid, level: ReadingLevel) -> Result<SummaryOutcome> {
        let store = self.store.as_ref().ok_or_else(|| AppError::Configuration {
            message: "summary generator has no paper store".to_string(),
        })?;

        let paper = store
            .find_paper(paper_id)
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: paper_id.to_string(),
            })?;

        let full_text = paper.full_text.clone().unwrap_or_default();
        Ok(self.describe(&paper.to_candidate(), &full_text, level).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperpilot_common::db::{MemoryStore, PaperRecord};
    use paperpilot_common::MockTextGenerator;

    const ABSTRACT: &str = "Retrieval-augmented generation combines a parametric language model \
        with a non-parametric memory accessed through a dense retriever. We show that such \
        models outperform purely parametric baselines on open-domain question answering.";

    const GOOD: &str = "This paper asks how a language model can look things up instead of \
        memorizing everything. It pairs the model with a search component that fetches \
        relevant passages, and shows better answers on knowledge-heavy questions.";

    fn generator(llm: &MockTextGenerator) -> SummaryGenerator {
        SummaryGenerator::new(Arc::new(llm.clone()), SummaryConfig::default())
    }

    fn paper() -> Candidate {
        let mut c = Candidate::new("2005.11401", "Retrieval-Augmented Generation");
        c.authors = vec!["Lewis".into(), "Perez".into(), "Piktus".into(), "Petroni".into()];
        c.abstract_text = ABSTRACT.to_string();
        c
    }

    #[test]
    fn test_validate_rejects_copied_abstract() {
        let gen = generator(&MockTextGenerator::new());
        assert!(!gen.validate(ABSTRACT, ABSTRACT));

        let padded = format!("In short: {ABSTRACT}");
        assert!(!gen.validate(&padded, ABSTRACT));
    }

    #[test]
    fn test_validate_accepts_paraphrase() {
        let gen = generator(&MockTextGenerator::new());
        assert!(gen.validate(GOOD, ABSTRACT));
        // nothing to compare against
        assert!(gen.validate(GOOD, ""));
    }

    #[test]
    fn test_validate_rejects_short_or_empty() {
        let gen = generator(&MockTextGenerator::new());
        assert!(!gen.validate("", ABSTRACT));
        assert!(!gen.validate("   ", ABSTRACT));
        assert!(!gen.validate("Too short to be useful.", ABSTRACT));
    }

    #[tokio::test]
    async fn test_describe_retries_after_rejection() {
        let llm = MockTextGenerator::new().sequence(LlmPurpose::Summary, &[ABSTRACT, GOOD]);
        let outcome = generator(&llm)
            .describe(&paper(), "", ReadingLevel::Intermediate)
            .await;

        assert!(outcome.accepted);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.summary, GOOD);
        assert!(!outcome.persisted);
    }

    #[tokio::test]
    async fn test_describe_keeps_last_text_when_all_rejected() {
        let llm = MockTextGenerator::new().on_purpose(LlmPurpose::Summary, "Short.");
        let outcome = generator(&llm)
            .describe(&paper(), "", ReadingLevel::Beginner)
            .await;

        assert!(!outcome.accepted);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.summary, "Short.");
        assert_eq!(llm.calls(LlmPurpose::Summary), 2);
    }

    #[tokio::test]
    async fn test_describe_falls_back_when_llm_fails() {
        let llm = MockTextGenerator::new().fail_purpose(LlmPurpose::Summary);
        let outcome = generator(&llm)
            .describe(&paper(), "", ReadingLevel::Advanced)
            .await;

        assert!(!outcome.accepted);
        assert_eq!(outcome.summary, FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn test_prompt_prefers_full_text() {
        let llm = MockTextGenerator::new().on_purpose(LlmPurpose::Summary, GOOD);
        let gen = generator(&llm);

        gen.describe(&paper(), "FULL TEXT BODY", ReadingLevel::Advanced).await;
        gen.describe(&paper(), "", ReadingLevel::Beginner).await;

        let prompts = llm.prompts();
        assert!(prompts[0].1.contains("FULL TEXT BODY"));
        assert!(!prompts[0].1.contains("parametric memory"));
        assert!(prompts[0].1.contains("limitations"));
        assert!(prompts[1].1.contains("dense retriever"));
        assert!(prompts[1].1.contains("Lewis, Perez, Piktus et al."));
        assert!(prompts[1].1.contains("200-300 characters"));
    }

    #[tokio::test]
    async fn test_describe_stored_missing_paper() {
        let llm = MockTextGenerator::new().with_default(GOOD);
        let gen = generator(&llm).with_store(Arc::new(MemoryStore::new()));

        let err = gen
            .describe_stored(Uuid::new_v4(), ReadingLevel::Intermediate)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaperNotFound { .. }));
        assert_eq!(llm.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_describe_stored_writes_summary_per_level() {
        let llm = MockTextGenerator::new().with_default(GOOD);
        let store = Arc::new(MemoryStore::new());
        let paper_id = store
            .upsert_paper(&PaperRecord::from_candidate(&paper(), "stored full text"))
            .await
            .unwrap();
        let gen = generator(&llm).with_store(store.clone());

        let outcome = gen
            .describe_stored(paper_id, ReadingLevel::Beginner)
            .await
            .unwrap();
        assert!(outcome.persisted);
        assert_eq!(outcome.paper_id, Some(paper_id));
        assert_eq!(outcome.external_id, "2005.11401");
        assert_eq!(store.summary(paper_id, ReadingLevel::Beginner).as_deref(), Some(GOOD));
        assert!(llm.prompts()[0].1.contains("stored full text"));

        store.fail_writes(true);
        let outcome = gen
            .describe_stored(paper_id, ReadingLevel::Advanced)
            .await
            .unwrap();
        assert!(!outcome.persisted);
        assert_eq!(outcome.summary, GOOD);
    }
}
