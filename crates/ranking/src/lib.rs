//! PaperPilot Ranking
//!
//! Scores candidates from recency, citation strength, topical relevance
//! and reading-level fit, then narrows them to a short recommended list.

pub mod scoring;
pub mod selection;

pub use scoring::{HeuristicScore, ScoreVector, ScoringEngine};
pub use selection::{SelectedPaper, SelectionFunnel, SelectionMode};
