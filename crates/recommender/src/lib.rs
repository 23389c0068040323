//! PaperPilot Recommender
//!
//! Wires the discovery, ranking and insight stages into the two
//! recommendation flows and the daily relation analysis.

pub mod pipeline;
pub mod relations;

pub use pipeline::{
    Collaborators, RecommendationPipeline, RecommendedPaper, Recommendations, RunReport,
};
pub use relations::{RelationService, TodayRelations};
