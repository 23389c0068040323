//! PaperPilot Insight
//!
//! Explains recommended papers to the reader:
//! - Summaries written for a reading level, with a copy-paste guard
//! - Common-reference analysis across a set of papers

pub mod relations;
pub mod summary;

pub use relations::{CitationRelationAnalyzer, RelationGraph, RelationPaper, RelationReport};
pub use summary::{SummaryGenerator, SummaryOutcome};
