//! User account entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text", unique)]
    pub username: String,

    /// Argon2 hash; never serialized out of the service
    #[serde(skip_serializing, default)]
    #[sea_orm(column_type = "Text", nullable)]
    pub hashed_password: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub full_name: Option<String>,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::saved_article::Entity")]
    SavedArticles,
}

impl Related<super::saved_article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavedArticles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
