//! Citation entity for graph relationships

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "citations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Paper whose reference list contains the edge
    pub citing_paper_id: Uuid,

    /// Referenced paper
    pub cited_paper_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub relation_type: String,

    pub is_influential: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::CitingPaperId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    CitingPaper,

    #[sea_orm(
        belongs_to = "super::paper::Entity",
        from = "Column::CitedPaperId",
        to = "super::paper::Column::Id",
        on_delete = "Cascade"
    )]
    CitedPaper,
}

impl ActiveModelBehavior for ActiveModel {}
