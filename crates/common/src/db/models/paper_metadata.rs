//! Per-paper enrichment: extracted text, keywords and citation metrics

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "paper_metadata")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub paper_id: Uuid,

    #[sea_orm(column_type = "Text", nullable)]
    pub full_text: Option<String>,

    /// Category tags as a JSON array
    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: Json,

    pub citation_count: i64,

    pub citation_velocity: f64,

    pub influential_citation_count: i64,

    pub year: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub venue: Option<String>,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::PaperId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    Paper,
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Paper.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
