//! News article entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "news_articles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub author: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Canonical article URL, the deduplication key
    #[sea_orm(column_type = "Text", unique)]
    pub url: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub url_to_image: Option<String>,

    pub published_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub category: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::summary::Entity")]
    Summaries,

    #[sea_orm(has_many = "super::saved_article::Entity")]
    SavedArticles,
}

impl Related<super::summary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Summaries.def()
    }
}

impl Related<super::saved_article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavedArticles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
