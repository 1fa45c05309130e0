//! SeaORM entity models

mod article;
mod saved_article;
mod summary;
mod user;

pub use article::{
    ActiveModel as ArticleActiveModel, Column as ArticleColumn, Entity as ArticleEntity,
    Model as Article,
};

pub use summary::{
    ActiveModel as SummaryActiveModel, Column as SummaryColumn, Entity as SummaryEntity,
    Model as ArticleSummary,
};

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as User,
};

pub use saved_article::{
    ActiveModel as SavedArticleActiveModel, Column as SavedArticleColumn,
    Entity as SavedArticleEntity, Model as SavedArticle,
};
