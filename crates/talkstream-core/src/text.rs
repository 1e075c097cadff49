//! Text service client: one chat-completion call, plain text out.
//!
//! The speaking pipeline must keep going when the language model is down, so
//! `TextService::complete` never fails. Failures are logged and replaced by
//! [`FALLBACK_REPLY`], which the avatar then speaks.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

const SERVICE: &str = "text";
const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 100;

/// Spoken in place of a reply when the text service cannot produce one.
pub const FALLBACK_REPLY: &str = "I couldn't process that request. Please try again.";

#[async_trait]
pub trait TextService: Send + Sync {
    /// Reply to `prompt`. Never fails; returns [`FALLBACK_REPLY`] instead.
    async fn complete(&self, prompt: &str) -> String;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiTextClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiTextClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into().trim().to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(&config.openai_url, &config.openai_key, &config.openai_model)
    }

    /// The raw completion, with errors. `complete` is the fallback-wrapped form.
    pub async fn try_complete(&self, prompt: &str) -> SessionResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::remote(SERVICE, None, format!("completion request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let raw = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .ok()
                .and_then(|env| env.error)
                .and_then(|err| err.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(SessionError::remote(SERVICE, Some(status.as_u16()), message));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| SessionError::remote(SERVICE, None, format!("completion response parse failed: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| SessionError::remote(SERVICE, None, "completion returned no content"))
    }
}

#[async_trait]
impl TextService for OpenAiTextClient {
    async fn complete(&self, prompt: &str) -> String {
        match self.try_complete(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "text service failed; speaking fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
