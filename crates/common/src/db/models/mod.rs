//! SeaORM entity models
//!
//! Database entities for PaperPilot

mod user;
mod paper;
mod paper_metadata;
mod paper_summary;
mod citation;
mod recommendation;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use paper_metadata::{
    Entity as PaperMetadataEntity,
    Model as PaperMetadata,
    ActiveModel as PaperMetadataActiveModel,
    Column as PaperMetadataColumn,
};

pub use paper_summary::{
    Entity as PaperSummaryEntity,
    Model as PaperSummary,
    ActiveModel as PaperSummaryActiveModel,
    Column as PaperSummaryColumn,
};

pub use citation::{
    Entity as CitationEntity,
    Model as Citation,
    ActiveModel as CitationActiveModel,
    Column as CitationColumn,
};

pub use recommendation::{
    Entity as RecommendationEntity,
    Model as Recommendation,
    ActiveModel as RecommendationActiveModel,
    Column as RecommendationColumn,
};
