//! Generative-AI provider client
//!
//! A [`TextGenerator`] abstraction with two operations: stateless
//! single-prompt completion (summaries) and multi-turn chat over a
//! role-tagged history. The concrete client speaks the Gemini
//! `models/{model}:generateContent` REST shape.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One role-tagged message in a conversation history
///
/// This is also the cached wire format: `{"role": "user", "parts": ["..."]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<String>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![text.into()],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![text.into()],
        }
    }

    /// All parts joined into a single text
    pub fn text(&self) -> String {
        self.parts.join("")
    }
}

/// Trait for text generation providers
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Continue a conversation: full history plus the new user message
    async fn chat(&self, history: &[ConversationTurn], message: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

// Wire types for generateContent

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl From<&ConversationTurn> for Content {
    fn from(turn: &ConversationTurn) -> Self {
        Content {
            role: match turn.role {
                Role::User => "user".to_string(),
                Role::Model => "model".to_string(),
            },
            parts: turn
                .parts
                .iter()
                .map(|p| Part {
                    text: Some(p.clone()),
                })
                .collect(),
        }
    }
}

/// Gemini generateContent client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiClient {
    /// Create a new client for the given model
    pub fn new(api_key: String, api_base: String, model: String, timeout_secs: u64) -> Result<Self> {
        if api_key.is_empty() {
            return Err(AppError::Configuration {
                message: "Generative AI API key not configured".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build generative HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            api_base,
            model,
        })
    }

    async fn generate_content(&self, contents: Vec<Content>, classify: bool) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest { contents })
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(if classify {
                classify_chat_error(status, &body)
            } else {
                AppError::Generation {
                    message: format!("API error {}: {}", status, body),
                }
            });
        }

        let result: GenerateContentResponse =
            response.json().await.map_err(|e| AppError::Generation {
                message: format!("Failed to parse response: {}", e),
            })?;

        let text = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Generation {
                message: "Provider returned empty response".to_string(),
            });
        }

        Ok(text.to_string())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let contents = vec![Content::from(&ConversationTurn::user(prompt))];
        self.generate_content(contents, false).await
    }

    async fn chat(&self, history: &[ConversationTurn], message: &str) -> Result<String> {
        let mut contents: Vec<Content> = history.iter().map(Content::from).collect();
        contents.push(Content::from(&ConversationTurn::user(message)));
        self.generate_content(contents, true).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map an upstream chat failure to its user-facing condition
///
/// Rate-limit and quota failures are retryable; missing models and
/// permission failures are not. Nothing is retried here.
fn classify_chat_error(status: u16, body: &str) -> AppError {
    let lower = body.to_lowercase();
    if status == 429 || lower.contains("quota") {
        AppError::GenerationRateLimited
    } else if status == 404 || lower.contains("not found") {
        AppError::GenerationUnavailable
    } else if status == 403 || lower.contains("permission") {
        AppError::GenerationForbidden
    } else {
        AppError::Generation {
            message: format!("API error {}: {}", status, body),
        }
    }
}

/// Canned generator for tests
///
/// Records every request so tests can assert on prompts and histories.
pub struct MockGenerator {
    response: String,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_chat: Mutex<Option<(Vec<ConversationTurn>, String)>>,
}

impl MockGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_chat: Mutex::new(None),
        }
    }

    /// Number of provider calls made through this generator
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The last single-prompt request, if any
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }

    /// The last chat request (history, message), if any
    pub fn last_chat(&self) -> Option<(Vec<ConversationTurn>, String)> {
        self.last_chat.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.response.clone())
    }

    async fn chat(&self, history: &[ConversationTurn], message: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_chat.lock().unwrap() = Some((history.to_vec(), message.to_string()));
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serialization_matches_cached_format() {
        let turn = ConversationTurn::user("Hello");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"user","parts":["Hello"]}"#);

        let back: ConversationTurn = serde_json::from_str(r#"{"role":"model","parts":["Hi"]}"#).unwrap();
        assert_eq!(back.role, Role::Model);
        assert_eq!(back.text(), "Hi");
    }

    #[test]
    fn test_chat_error_classification() {
        assert!(matches!(
            classify_chat_error(429, "rate limited"),
            AppError::GenerationRateLimited
        ));
        assert!(matches!(
            classify_chat_error(500, "Quota exceeded for the day"),
            AppError::GenerationRateLimited
        ));
        assert!(matches!(
            classify_chat_error(404, "model missing"),
            AppError::GenerationUnavailable
        ));
        assert!(matches!(
            classify_chat_error(403, "denied"),
            AppError::GenerationForbidden
        ));
        assert!(matches!(
            classify_chat_error(500, "boom"),
            AppError::Generation { .. }
        ));
    }

    #[test]
    fn test_candidate_text_extraction() {
        let payload = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Part one. "}, {"text": "Part two."}]}}
            ]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(payload).unwrap();
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();
        assert_eq!(text, "Part one. Part two.");
    }

    #[tokio::test]
    async fn test_mock_generator_records_requests() {
        let generator = MockGenerator::new("Canned reply");

        let reply = generator.generate("Summarize this").await.unwrap();
        assert_eq!(reply, "Canned reply");
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.last_prompt().as_deref(), Some("Summarize this"));

        let history = vec![ConversationTurn::user("Hi"), ConversationTurn::model("Hello")];
        generator.chat(&history, "What's new?").await.unwrap();
        assert_eq!(generator.call_count(), 2);
        let (seen_history, message) = generator.last_chat().unwrap();
        assert_eq!(seen_history.len(), 2);
        assert_eq!(message, "What's new?");
    }
}
