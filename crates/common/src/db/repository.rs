//! Repository pattern for database operations
//!
//! Point lookups and inserts only; the API surface needs no joins beyond
//! loading a saved article together with its article row.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::summarizer::SummaryStore;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};

/// Input for creating an article from a provider payload
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub content: Option<String>,
    pub category: Option<String>,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Article Operations
    // ========================================================================

    /// Find article by ID
    pub async fn find_article_by_id(&self, id: i64) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find article by its canonical URL
    pub async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        ArticleEntity::find()
            .filter(ArticleColumn::Url.eq(url))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get an article by URL, creating it when absent
    ///
    /// A concurrent insert of the same URL loses to the unique index and the
    /// existing row is returned unchanged.
    pub async fn get_or_create_article(&self, input: NewArticle) -> Result<Article> {
        if let Some(existing) = self.find_article_by_url(&input.url).await? {
            return Ok(existing);
        }

        let now = chrono::Utc::now();
        let article = ArticleActiveModel {
            source_id: Set(input.source_id),
            source_name: Set(input.source_name),
            author: Set(input.author),
            title: Set(input.title),
            description: Set(input.description),
            url: Set(input.url.clone()),
            url_to_image: Set(input.url_to_image),
            published_at: Set(input.published_at),
            content: Set(input.content),
            category: Set(input.category),
            created_at: Set(now.into()),
            ..Default::default()
        };

        match article.insert(self.write_conn()).await {
            Ok(created) => Ok(created),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => self
                .find_article_by_url(&input.url)
                .await?
                .ok_or_else(|| AppError::Internal {
                    message: format!("Article vanished after duplicate insert: {}", input.url),
                }),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Summary Operations
    // ========================================================================

    /// Find the summary row for an article
    pub async fn find_summary_by_article(&self, article_id: i64) -> Result<Option<ArticleSummary>> {
        SummaryEntity::find()
            .filter(SummaryColumn::ArticleId.eq(article_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a summary for an article
    ///
    /// The unique index on article_id makes this first-write-wins; a losing
    /// writer gets the row that beat it.
    pub async fn insert_summary(&self, article_id: i64, summary: &str) -> Result<ArticleSummary> {
        let now = chrono::Utc::now();
        let row = SummaryActiveModel {
            article_id: Set(article_id),
            summary: Set(summary.to_string()),
            created_at: Set(now.into()),
            ..Default::default()
        };

        match row.insert(self.write_conn()).await {
            Ok(created) => Ok(created),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => self
                .find_summary_by_article(article_id)
                .await?
                .ok_or_else(|| AppError::Internal {
                    message: format!("Summary vanished after duplicate insert: {}", article_id),
                }),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by username
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Username.eq(username))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a new user
    pub async fn create_user(
        &self,
        email: String,
        username: String,
        hashed_password: Option<String>,
        full_name: Option<String>,
    ) -> Result<User> {
        let now = chrono::Utc::now();
        let user = UserActiveModel {
            email: Set(email),
            username: Set(username),
            hashed_password: Set(hashed_password),
            full_name: Set(full_name),
            is_active: Set(true),
            created_at: Set(now.into()),
            ..Default::default()
        };

        match user.insert(self.write_conn()).await {
            Ok(created) => Ok(created),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(AppError::Duplicate {
                    message: "Email or username already registered".to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Saved Article Operations
    // ========================================================================

    /// Find a saved-article row for a (user, article) pair
    pub async fn find_saved(&self, user_id: i64, article_id: i64) -> Result<Option<SavedArticle>> {
        SavedArticleEntity::find()
            .filter(SavedArticleColumn::UserId.eq(user_id))
            .filter(SavedArticleColumn::ArticleId.eq(article_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Save an article for a user; saving twice returns the existing row
    pub async fn save_for_user(&self, user_id: i64, article_id: i64) -> Result<SavedArticle> {
        if let Some(existing) = self.find_saved(user_id, article_id).await? {
            return Ok(existing);
        }

        let now = chrono::Utc::now();
        let saved = SavedArticleActiveModel {
            user_id: Set(user_id),
            article_id: Set(article_id),
            saved_at: Set(now.into()),
            ..Default::default()
        };

        match saved.insert(self.write_conn()).await {
            Ok(created) => Ok(created),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => self
                .find_saved(user_id, article_id)
                .await?
                .ok_or_else(|| AppError::Internal {
                    message: format!("Saved article vanished after duplicate insert: {}", article_id),
                }),
            Err(e) => Err(e.into()),
        }
    }

    /// List a user's saved articles, newest first, with the article rows
    pub async fn list_saved(
        &self,
        user_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<(SavedArticle, Option<Article>)>> {
        SavedArticleEntity::find()
            .filter(SavedArticleColumn::UserId.eq(user_id))
            .order_by_desc(SavedArticleColumn::SavedAt)
            .find_also_related(ArticleEntity)
            .offset(offset)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Remove a saved article; returns whether a row was deleted
    pub async fn remove_saved(&self, user_id: i64, article_id: i64) -> Result<bool> {
        let result = SavedArticleEntity::delete_many()
            .filter(SavedArticleColumn::UserId.eq(user_id))
            .filter(SavedArticleColumn::ArticleId.eq(article_id))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl SummaryStore for Repository {
    async fn find_summary(&self, article_id: i64) -> Result<Option<String>> {
        Ok(self
            .find_summary_by_article(article_id)
            .await?
            .map(|row| row.summary))
    }

    async fn store_summary(&self, article_id: i64, summary: &str) -> Result<String> {
        Ok(self.insert_summary(article_id, summary).await?.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn article_row(id: i64, url: &str, title: &str) -> Article {
        Article {
            id,
            source_id: None,
            source_name: Some("Example Wire".into()),
            author: None,
            title: title.into(),
            description: None,
            url: url.into(),
            url_to_image: None,
            published_at: None,
            content: Some("Body text".into()),
            category: None,
            created_at: chrono::Utc::now().into(),
        }
    }

    fn new_article(url: &str, title: &str) -> NewArticle {
        NewArticle {
            source_id: None,
            source_name: Some("Example Wire".into()),
            author: None,
            title: title.into(),
            description: None,
            url: url.into(),
            url_to_image: None,
            published_at: None,
            content: Some("Body text".into()),
            category: None,
        }
    }

    fn repo_with(db: DatabaseConnection) -> Repository {
        Repository::new(DbPool {
            primary: db,
            replica: None,
        })
    }

    #[tokio::test]
    async fn test_save_same_url_returns_existing_record() {
        let existing = article_row(1, "https://x/1", "A");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();

        let repo = repo_with(db);
        let got = repo
            .get_or_create_article(new_article("https://x/1", "A"))
            .await
            .unwrap();

        assert_eq!(got, existing);
    }

    #[tokio::test]
    async fn test_save_inserts_when_url_absent() {
        let created = article_row(1, "https://x/1", "A");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Article>::new(), vec![created.clone()]])
            .append_exec_results([sea_orm::MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();

        let repo = repo_with(db);
        let got = repo
            .get_or_create_article(new_article("https://x/1", "A"))
            .await
            .unwrap();

        assert_eq!(got.id, created.id);
        assert_eq!(got.url, "https://x/1");
    }

    #[tokio::test]
    async fn test_summary_store_maps_to_text() {
        let row = ArticleSummary {
            id: 9,
            article_id: 1,
            summary: "A concise summary.".into(),
            created_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row]])
            .into_connection();

        let repo = repo_with(db);
        let summary = SummaryStore::find_summary(&repo, 1).await.unwrap();
        assert_eq!(summary.as_deref(), Some("A concise summary."));
    }
}
