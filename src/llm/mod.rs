//! Remote language-model client
//!
//! Builds a role-mapped prompt from the conversation history, calls the
//! configured provider once per invocation (no retries), and converts every
//! failure into a fixed user-facing string so callers always have something
//! to show and speak.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::chat::{Role, Turn};
use crate::config::LlmConfig;

pub const FALLBACK_CONNECTIVITY: &str =
    "I'm sorry, I'm having trouble connecting to the AI service.";
pub const FALLBACK_INVALID_RESPONSE: &str =
    "I'm sorry, I received an invalid response from the AI service.";
pub const FALLBACK_UNEXPECTED: &str = "I'm sorry, an unexpected error occurred.";
pub const FALLBACK_NO_RESPONSE: &str = "I'm sorry, I couldn't generate a response.";

/// LLM provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Gemini,
    OpenRouter,
}

// ── Gemini wire types ──

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

// ── OpenRouter (chat/completions) wire types ──

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Generates assistant replies through a remote model endpoint.
pub struct ResponseGenerator {
    client: reqwest::Client,
    provider: Provider,
    api_key: String,
    model: String,
    base_url: String,
}

impl ResponseGenerator {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "gemini" => Provider::Gemini,
            "openrouter" => Provider::OpenRouter,
            other => bail!("unknown llm.provider {:?}", other),
        };

        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("llm.api_key is required")?;

        let base_url = config
            .base_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| match provider {
                Provider::Gemini => {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }
                Provider::OpenRouter => "https://openrouter.ai/api/v1".to_string(),
            });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            provider,
            api_key,
            model: config.model.clone(),
            base_url,
        })
    }

    /// Generate a reply to `user_text` given the prior conversation. Never
    /// fails outward: every error maps to one of the fixed fallback strings.
    pub async fn generate(&self, user_text: &str, history: &[Turn]) -> String {
        match self.request_completion(user_text, history).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                info!("model returned no usable candidates");
                FALLBACK_NO_RESPONSE.to_string()
            }
            Err(e) => {
                error!("response generation failed: {:#}", e);
                classify_failure(&e).to_string()
            }
        }
    }

    /// One bounded round trip to confirm the endpoint is reachable. Used at
    /// startup; has no effect on later calls.
    pub async fn test_connection(&self) -> Result<()> {
        tokio::time::timeout(
            Duration::from_secs(10),
            self.request_completion("Hello", &[]),
        )
        .await
        .context("connection test timed out")??;
        Ok(())
    }

    async fn request_completion(
        &self,
        user_text: &str,
        history: &[Turn],
    ) -> Result<Option<String>> {
        match self.provider {
            Provider::Gemini => self.complete_gemini(user_text, history).await,
            Provider::OpenRouter => self.complete_openrouter(user_text, history).await,
        }
    }

    fn role_token(&self, role: Role) -> &'static str {
        match (self.provider, role) {
            (_, Role::User) => "user",
            (Provider::Gemini, Role::Assistant) => "model",
            (Provider::OpenRouter, Role::Assistant) => "assistant",
        }
    }

    fn gemini_payload(&self, user_text: &str, history: &[Turn]) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .map(|turn| GeminiContent {
                role: self.role_token(turn.role),
                parts: vec![GeminiPart {
                    text: turn.content.clone(),
                }],
            })
            .collect();

        contents.push(GeminiContent {
            role: "user",
            parts: vec![GeminiPart {
                text: user_text.to_string(),
            }],
        });

        GeminiRequest { contents }
    }

    fn openrouter_payload(&self, user_text: &str, history: &[Turn]) -> ChatRequest {
        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| ChatMessage {
                role: self.role_token(turn.role),
                content: turn.content.clone(),
            })
            .collect();

        messages.push(ChatMessage {
            role: "user",
            content: user_text.to_string(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
        }
    }

    async fn complete_gemini(&self, user_text: &str, history: &[Turn]) -> Result<Option<String>> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = self.gemini_payload(user_text, history);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let data: GeminiResponse = response.json().await?;

        let text = data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .unwrap_or_default();

        Ok(normalize(text))
    }

    async fn complete_openrouter(
        &self,
        user_text: &str,
        history: &[Turn],
    ) -> Result<Option<String>> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.openrouter_payload(user_text, history);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let data: ChatResponse = response.json().await?;

        let text = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .unwrap_or_default();

        Ok(normalize(text))
    }
}

fn normalize(text: String) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Map a failed completion onto the fixed user-facing strings: transport and
/// HTTP-status problems read as connectivity, body-decode problems as an
/// invalid response, anything else as unexpected.
fn classify_failure(e: &anyhow::Error) -> &'static str {
    if let Some(re) = e.downcast_ref::<reqwest::Error>() {
        if re.is_decode() {
            return FALLBACK_INVALID_RESPONSE;
        }
        return FALLBACK_CONNECTIVITY;
    }
    if e.downcast_ref::<serde_json::Error>().is_some() {
        return FALLBACK_INVALID_RESPONSE;
    }
    FALLBACK_UNEXPECTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn generator(provider: &str) -> ResponseGenerator {
        let config = LlmConfig {
            provider: provider.to_string(),
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            base_url: None,
            timeout_secs: 5,
        };
        ResponseGenerator::from_config(&config).unwrap()
    }

    fn turn(role: Role, content: &str) -> Turn {
        Turn {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn gemini_payload_maps_assistant_to_model_role() {
        let gen = generator("gemini");
        let history = vec![turn(Role::User, "hi"), turn(Role::Assistant, "hello")];

        let payload = gen.gemini_payload("how are you?", &history);
        let value = serde_json::to_value(&payload).unwrap();

        let contents = value["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "how are you?");
    }

    #[test]
    fn openrouter_payload_keeps_assistant_role() {
        let gen = generator("openrouter");
        let history = vec![turn(Role::Assistant, "hello")];

        let payload = gen.openrouter_payload("hi", &history);
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["model"], "test-model");
        assert_eq!(value["messages"][0]["role"], "assistant");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "hi");
    }

    #[test]
    fn from_config_rejects_missing_key() {
        let config = LlmConfig {
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(ResponseGenerator::from_config(&config).is_err());
    }

    #[test]
    fn empty_candidate_text_normalizes_to_none() {
        assert_eq!(normalize("   ".to_string()), None);
        assert_eq!(normalize("hi".to_string()), Some("hi".to_string()));
    }
}
