//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Upsert key, e.g. `arXiv:2401.01234v2`
    #[sea_orm(column_type = "Text", unique)]
    pub external_id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Author names as a JSON array
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    pub published_date: Option<Date>,

    #[sea_orm(column_type = "Text")]
    pub source: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub pdf_url: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::paper_metadata::Entity")]
    Metadata,

    #[sea_orm(has_many = "super::paper_summary::Entity")]
    Summaries,

    #[sea_orm(has_many = "super::recommendation::Entity")]
    Recommendations,
}

impl Related<super::paper_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Metadata.def()
    }
}

impl Related<super::paper_summary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Summaries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
