//! Chat-completion generators.
//!
//! - **`openai`**: any OpenAI-compatible `/chat/completions` endpoint.
//!   Defaults to Groq (`https://api.groq.com/openai/v1`). The bearer key
//!   is read from the environment variable named by `generator.api_key_env`.
//! - **`ollama`**: a local Ollama instance (`/api/chat`, non-streaming).
//!
//! Both send `[system, user]` messages and share the retry policy in
//! [`crate::http`]. A blank completion counts as a failure.

use anyhow::{bail, Result};
use async_trait::async_trait;
use scheme_nav_core::Generator;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GeneratorConfig;
use crate::http;
use crate::timeout::TimedGenerator;

const DEFAULT_OPENAI_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatApi {
    OpenAi,
    Ollama,
}

pub struct ChatGenerator {
    api: ChatApi,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatGenerator {
    /// Build a generator for `api` from configuration.
    ///
    /// # Errors
    ///
    /// Fails for `ollama` if `model` is unset, or for `openai` if the API
    /// key variable is missing from the environment.
    pub fn new(api: ChatApi, config: &GeneratorConfig) -> Result<Self> {
        let model = match (api, config.model.as_deref()) {
            (_, Some(model)) if !model.is_empty() => model.to_string(),
            (ChatApi::OpenAi, _) => DEFAULT_OPENAI_MODEL.to_string(),
            (ChatApi::Ollama, _) => bail!("generator.model required for ollama provider"),
        };

        let (endpoint, api_key) = match api {
            ChatApi::OpenAi => {
                let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
                let key = std::env::var(&config.api_key_env).map_err(|_| {
                    anyhow::anyhow!("{} environment variable not set", config.api_key_env)
                })?;
                (
                    format!("{}/chat/completions", base.trim_end_matches('/')),
                    Some(key),
                )
            }
            ChatApi::Ollama => {
                let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
                (format!("{}/api/chat", base.trim_end_matches('/')), None)
            }
        };

        Ok(Self {
            api,
            model,
            endpoint,
            api_key,
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, system_instruction: &str, prompt: &str) -> Value {
        let messages = json!([
            {"role": "system", "content": system_instruction},
            {"role": "user", "content": prompt},
        ]);
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        match self.api {
            ChatApi::OpenAi => {
                if let Some(t) = self.temperature {
                    body["temperature"] = json!(t);
                }
            }
            ChatApi::Ollama => {
                body["stream"] = json!(false);
                if let Some(t) = self.temperature {
                    body["options"] = json!({ "temperature": t });
                }
            }
        }
        body
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        let body = self.request_body(system_instruction, prompt);
        let label = match self.api {
            ChatApi::OpenAi => "Chat API",
            ChatApi::Ollama => "Ollama API",
        };
        let json = http::post_json(
            &self.client,
            &self.endpoint,
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            label,
        )
        .await?;

        match self.api {
            ChatApi::OpenAi => parse_openai_response(&json),
            ChatApi::Ollama => parse_ollama_response(&json),
        }
    }
}

/// Extract `choices[0].message.content`.
pub fn parse_openai_response(json: &Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))?;
    non_empty(content)
}

/// Extract `message.content`.
pub fn parse_ollama_response(json: &Value) -> Result<String> {
    let content = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))?;
    non_empty(content)
}

fn non_empty(content: &str) -> Result<String> {
    let answer = content.trim();
    if answer.is_empty() {
        bail!("model returned an empty completion");
    }
    Ok(answer.to_string())
}

/// Build the configured generator, or `None` when disabled.
pub fn create_generator(config: &GeneratorConfig) -> Result<Option<Arc<dyn Generator>>> {
    let api = match config.provider.as_str() {
        "disabled" => return Ok(None),
        "openai" => ChatApi::OpenAi,
        "ollama" => ChatApi::Ollama,
        other => bail!("Unknown generator provider: {}", other),
    };
    let inner: Arc<dyn Generator> = Arc::new(ChatGenerator::new(api, config)?);
    Ok(Some(Arc::new(TimedGenerator::new(
        inner,
        Duration::from_secs(config.timeout_secs),
    ))))
}
