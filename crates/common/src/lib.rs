//! Newswire Common Library
//!
//! Shared code for the Newswire backend including:
//! - Database models and repository patterns
//! - Cache adapter and key builders
//! - External provider clients (news, generative AI)
//! - The news, summary, and chat orchestration services
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics helpers

pub mod auth;
pub mod cache;
pub mod chat;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod news;
pub mod providers;
pub mod summarizer;

// Re-export commonly used types
pub use cache::Cache;
pub use chat::ChatService;
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use news::NewsService;
pub use providers::generative::TextGenerator;
pub use summarizer::SummaryService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
