//! Interest → search keywords

use paperpilot_common::llm::{CompletionRequest, LlmPurpose, TextGenerator};
use paperpilot_common::metrics::record_fallback;
use std::sync::Arc;
use tracing::{info, warn};

/// Maximum keywords handed to the search stage
pub const MAX_KEYWORDS: usize = 5;

pub struct KeywordExpander {
    llm: Arc<dyn TextGenerator>,
}

impl KeywordExpander {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn build_prompt(interest: &str) -> String {
        format!(
            "Suggest {MAX_KEYWORDS} English search keywords related to the research interest below.\n\
             Each keyword must be suitable for searching academic papers.\n\
             Research interest: {interest}\n\n\
             List only the keywords, separated by commas. \
             Example: RAG, Retrieval Augmented Generation, retrieval-based QA"
        )
    }

    /// Expand an interest into at most five keywords.
    ///
    /// A failed call yields an empty list; there is no retry here.
    pub async fn expand(&self, interest: &str) -> Vec<String> {
        let request = CompletionRequest::for_purpose(LlmPurpose::Keywords, Self::build_prompt(interest));

        match self.llm.complete(&request).await {
            Ok(text) => {
                let keywords = parse_keywords(&text);
                info!(count = keywords.len(), keywords = ?keywords, "Keywords expanded");
                keywords
            }
            Err(e) => {
                warn!(error = %e, "Keyword expansion failed, continuing without keywords");
                record_fallback("keywords");
                Vec::new()
            }
        }
    }
}

/// Split a comma-separated response into trimmed, non-empty keywords
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.replace(['\n', '\r'], "")
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperpilot_common::MockTextGenerator;

    #[test]
    fn test_parse_keywords_truncates_and_trims() {
        let parsed = parse_keywords("RAG, Retrieval Augmented Generation,\n dense retrieval , , a, b, c");
        assert_eq!(
            parsed,
            vec!["RAG", "Retrieval Augmented Generation", "dense retrieval", "a", "b"]
        );
    }

    #[test]
    fn test_parse_keywords_unparseable() {
        assert!(parse_keywords("").is_empty());
        assert_eq!(parse_keywords("just one phrase"), vec!["just one phrase"]);
    }

    #[tokio::test]
    async fn test_expand_failure_yields_empty() {
        let llm = MockTextGenerator::new().fail_purpose(LlmPurpose::Keywords);
        let expander = KeywordExpander::new(Arc::new(llm.clone()));

        assert!(expander.expand("RAG").await.is_empty());
        assert_eq!(llm.calls(LlmPurpose::Keywords), 1);
    }

    #[tokio::test]
    async fn test_expand_includes_interest_in_prompt() {
        let llm = MockTextGenerator::new().on_purpose(LlmPurpose::Keywords, "RAG, retrieval");
        let expander = KeywordExpander::new(Arc::new(llm.clone()));

        assert_eq!(expander.expand("RAG").await, vec!["RAG", "retrieval"]);
        let prompts = llm.prompts();
        assert!(prompts[0].1.contains("Research interest: RAG"));
    }
}
