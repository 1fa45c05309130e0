//! Conversation state management
//!
//! Keeps a bounded, per-user rolling chat history in the cache. The first
//! turn of a conversation carries a fixed system instruction that pins the
//! assistant to news and current events.

use crate::cache::{keys, Cache};
use crate::errors::{AppError, Result};
use crate::metrics::record_generation;
use crate::providers::generative::{ConversationTurn, TextGenerator};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Cache TTL for conversation histories
pub const HISTORY_TTL_SECS: u64 = 3600;

/// Rolling window of turns kept per conversation
pub const MAX_HISTORY_TURNS: usize = 20;

/// Maximum accepted message length in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Standing instruction injected ahead of the first message of a
/// conversation. Static configuration, not computed.
pub const SYSTEM_INSTRUCTION: &str = "\
You are Newswire AI, a specialized news assistant. Your role is to:

1. ONLY answer questions about news, current events, and world affairs
2. Provide accurate, unbiased information about recent news stories
3. Discuss news from various categories: politics, technology, business, sports, entertainment, health, science
4. Explain news context and background when asked
5. Compare different news perspectives when relevant

STRICT RULES:
- If asked about anything NOT related to news or current events, politely decline and redirect to news topics
- Do NOT provide personal advice, medical advice, legal advice, or financial advice
- Do NOT engage in conversations about personal matters, relationships, or non-news topics
- Always maintain a professional, journalistic tone
- If you don't have current information, acknowledge it and suggest checking recent news sources

Example responses for non-news questions:
- \"I'm Newswire AI, specialized in news and current events. I can't help with that, but I'd be happy to discuss recent news stories!\"
- \"That's outside my expertise as a news assistant. Would you like to know about today's top headlines instead?\"

Stay focused on news and current events at all times.";

/// Result of a successful exchange
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    pub history: Vec<ConversationTurn>,
    pub timestamp: String,
}

/// Manages per-user conversations against the generative provider
#[derive(Clone)]
pub struct ChatService {
    cache: Cache,
    generator: Arc<dyn TextGenerator>,
}

impl ChatService {
    /// Create a new service owning its generator and cache handle
    pub fn new(cache: Cache, generator: Arc<dyn TextGenerator>) -> Self {
        Self { cache, generator }
    }

    /// Process one chat message and return the response with updated history
    ///
    /// When `history` is `None` the cached history is used; an empty history
    /// starts a new conversation and the system instruction is prepended to
    /// the message.
    pub async fn send(
        &self,
        user_id: i64,
        message: &str,
        history: Option<Vec<ConversationTurn>>,
    ) -> Result<ChatOutcome> {
        if message.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Message cannot be empty".to_string(),
                field: Some("message".to_string()),
            });
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::Validation {
                message: "Message is too long. Please keep it under 2000 characters.".to_string(),
                field: Some("message".to_string()),
            });
        }

        let history = match history {
            Some(history) => history,
            None => self.history(user_id).await,
        };

        let outgoing = if history.is_empty() {
            format!("{}\n\nUser question: {}", SYSTEM_INSTRUCTION, message)
        } else {
            message.to_string()
        };

        info!(user_id, turns = history.len(), "Processing chat message");

        let start = Instant::now();
        let result = self.generator.chat(&history, &outgoing).await;
        record_generation(
            start.elapsed().as_secs_f64(),
            self.generator.model_name(),
            result.is_ok(),
        );
        let response = result?;

        let mut updated = history;
        updated.push(ConversationTurn::user(outgoing));
        updated.push(ConversationTurn::model(response.clone()));
        if updated.len() > MAX_HISTORY_TURNS {
            updated.drain(..updated.len() - MAX_HISTORY_TURNS);
        }

        // Full overwrite: the cached value is rebuilt every turn
        self.cache
            .set(&keys::chat_history(user_id), &updated, HISTORY_TTL_SECS)
            .await?;

        info!(user_id, turns = updated.len(), "Chat response generated");

        Ok(ChatOutcome {
            response,
            history: updated,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Cached conversation history, empty when absent or unreadable
    pub async fn history(&self, user_id: i64) -> Vec<ConversationTurn> {
        match self
            .cache
            .get::<Vec<ConversationTurn>>(&keys::chat_history(user_id))
            .await
        {
            Ok(Some(history)) => history,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(user_id, error = %e, "Failed to load conversation history");
                Vec::new()
            }
        }
    }

    /// Delete the cached history; true unless the cache write path failed
    pub async fn clear(&self, user_id: i64) -> bool {
        match self.cache.delete(&keys::chat_history(user_id)).await {
            Ok(_) => {
                info!(user_id, "Conversation history cleared");
                true
            }
            Err(e) => {
                error!(user_id, error = %e, "Failed to clear conversation history");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, MemoryBackend};
    use crate::providers::generative::MockGenerator;
    use async_trait::async_trait;

    fn service(generator: Arc<MockGenerator>) -> (ChatService, Cache) {
        let cache = Cache::new(Arc::new(MemoryBackend::new()));
        (ChatService::new(cache.clone(), generator), cache)
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let generator = Arc::new(MockGenerator::new("Hello!"));
        let (service, _) = service(generator.clone());

        let err = service.send(7, "   ", None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_message_length_boundary() {
        let generator = Arc::new(MockGenerator::new("Hello!"));
        let (service, _) = service(generator.clone());

        let at_limit = "m".repeat(MAX_MESSAGE_CHARS);
        assert!(service.send(7, &at_limit, None).await.is_ok());

        let over_limit = "m".repeat(MAX_MESSAGE_CHARS + 1);
        let err = service.send(7, &over_limit, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_first_turn_carries_system_instruction() {
        let generator = Arc::new(MockGenerator::new("Here are today's stories."));
        let (service, _) = service(generator.clone());

        let outcome = service.send(7, "Hello", None).await.unwrap();

        let (history, message) = generator.last_chat().unwrap();
        assert!(history.is_empty());
        assert!(message.starts_with(SYSTEM_INSTRUCTION));
        assert!(message.ends_with("User question: Hello"));

        // The sent text becomes the first user turn
        assert_eq!(outcome.history.len(), 2);
        assert!(outcome.history[0].text().contains(SYSTEM_INSTRUCTION));
        assert_eq!(outcome.history[1].text(), "Here are today's stories.");
    }

    #[tokio::test]
    async fn test_continuing_conversation_skips_instruction() {
        let generator = Arc::new(MockGenerator::new("Still news."));
        let (service, _) = service(generator.clone());

        service.send(7, "Hello", None).await.unwrap();
        service.send(7, "More please", None).await.unwrap();

        let (history, message) = generator.last_chat().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(message, "More please");
    }

    #[tokio::test]
    async fn test_history_window_never_exceeds_20_turns() {
        let generator = Arc::new(MockGenerator::new("Reply."));
        let (service, _) = service(generator.clone());

        let long_history: Vec<ConversationTurn> = (0..30)
            .flat_map(|i| {
                [
                    ConversationTurn::user(format!("q{}", i)),
                    ConversationTurn::model(format!("a{}", i)),
                ]
            })
            .collect();

        let outcome = service.send(7, "latest", Some(long_history)).await.unwrap();
        assert_eq!(outcome.history.len(), MAX_HISTORY_TURNS);

        // The newest exchange survives the window
        let last = &outcome.history[MAX_HISTORY_TURNS - 1];
        assert_eq!(last.text(), "Reply.");
        assert_eq!(outcome.history[MAX_HISTORY_TURNS - 2].text(), "latest");
    }

    #[tokio::test]
    async fn test_cached_history_replaced_not_merged() {
        let generator = Arc::new(MockGenerator::new("Reply."));
        let (service, cache) = service(generator.clone());

        service.send(7, "first", None).await.unwrap();
        service.send(7, "second", None).await.unwrap();

        let cached: Vec<ConversationTurn> = cache
            .get(&keys::chat_history(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.len(), 4);
        assert_eq!(cached[2].text(), "second");
    }

    #[tokio::test]
    async fn test_clear_then_history_is_empty() {
        let generator = Arc::new(MockGenerator::new("Reply."));
        let (service, _) = service(generator.clone());

        service.send(7, "Hello", None).await.unwrap();
        assert!(!service.history(7).await.is_empty());

        assert!(service.clear(7).await);
        assert!(service.history(7).await.is_empty());

        // Clearing an already-empty conversation still reports success
        assert!(service.clear(7).await);
    }

    /// Backend whose reads always fail, for the swallow-and-log path
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> crate::errors::Result<Option<String>> {
            Err(AppError::Cache {
                message: "connection refused".into(),
            })
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: u64) -> crate::errors::Result<()> {
            Err(AppError::Cache {
                message: "connection refused".into(),
            })
        }
        async fn delete(&self, _key: &str) -> crate::errors::Result<bool> {
            Err(AppError::Cache {
                message: "connection refused".into(),
            })
        }
        async fn exists(&self, _key: &str) -> crate::errors::Result<bool> {
            Ok(false)
        }
        async fn delete_pattern(&self, _pattern: &str) -> crate::errors::Result<u64> {
            Ok(0)
        }
        async fn ping(&self) -> crate::errors::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_history_read_errors_are_swallowed() {
        let generator = Arc::new(MockGenerator::new("Reply."));
        let service = ChatService::new(Cache::new(Arc::new(BrokenBackend)), generator);

        assert!(service.history(7).await.is_empty());
        assert!(!service.clear(7).await);
    }

    #[tokio::test]
    async fn test_history_write_errors_propagate() {
        let generator = Arc::new(MockGenerator::new("Reply."));
        let service = ChatService::new(Cache::new(Arc::new(BrokenBackend)), generator);

        // Read path swallows, so the send proceeds to the provider and then
        // fails on the cache write
        let err = service.send(7, "Hello", None).await.unwrap_err();
        assert!(matches!(err, AppError::Cache { .. }));
    }
}
