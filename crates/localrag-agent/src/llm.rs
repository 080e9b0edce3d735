//! Completion collaborators: an OpenAI-compatible chat client and an offline mock.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use localrag_core::config::{LlmProvider, LlmSettings};
use localrag_core::traits::Completion;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

pub struct OpenAiCompletion {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiCompletion {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build().context("building HTTP client")?;
        Ok(Self { client, endpoint: endpoint.into(), model: model.into(), api_key: api_key.into() })
    }

    /// Reads the API key from the environment variable named by `api_key_env`.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .with_context(|| format!("{} is not set", settings.api_key_env))?;
        Self::new(&settings.endpoint, &settings.model, api_key)
    }
}

#[async_trait]
impl Completion for OpenAiCompletion {
    async fn complete(&self, prompt: &str, system_instructions: &str, max_tokens: usize) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_instructions },
                ChatMessage { role: "user", content: prompt },
            ],
            max_tokens,
            temperature: 0.0,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()
            .context("completion endpoint returned an error status")?;
        let parsed: ChatResponse = response.json().await.context("invalid completion response")?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("completion response has no content"))?;
        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }
}

/// Echoes the start of the prompt. For offline development only.
#[derive(Debug, Default)]
pub struct MockCompletion;

#[async_trait]
impl Completion for MockCompletion {
    async fn complete(&self, prompt: &str, _system_instructions: &str, _max_tokens: usize) -> Result<String> {
        let head: String = prompt.chars().take(100).collect();
        Ok(format!("[mock] response to: {head}..."))
    }
}

pub fn build_completion(settings: &LlmSettings) -> Result<Arc<dyn Completion>> {
    match settings.provider {
        LlmProvider::Openai => Ok(Arc::new(OpenAiCompletion::from_settings(settings)?)),
        LlmProvider::Mock => {
            warn!("using mock completion provider");
            Ok(Arc::new(MockCompletion))
        }
    }
}
