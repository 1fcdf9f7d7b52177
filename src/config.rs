//! TOML configuration.
//!
//! Every section is optional; an empty file yields a server bound to
//! `127.0.0.1:8000` with both collaborators disabled. See
//! `config/schemenav.example.toml` for a complete file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub interaction_log: InteractionLogConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct InteractionLogConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("interactions_log.jsonl")
}

/// Session retention. Both limits are off unless set.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionsConfig {
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    #[serde(default)]
    pub max_sessions: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrieverConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_retriever_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    // local
    #[serde(default)]
    pub corpus_dir: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: usize,

    // harness
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_search_mode")]
    pub mode: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            timeout_secs: default_retriever_timeout(),
            max_retries: default_max_retries(),
            corpus_dir: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            chunk_max_tokens: default_chunk_max_tokens(),
            url: None,
            mode: default_search_mode(),
            limit: default_search_limit(),
        }
    }
}

impl RetrieverConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_retriever_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.md".to_string()]
}
fn default_chunk_max_tokens() -> usize {
    400
}
fn default_search_mode() -> String {
    "keyword".to_string()
}
fn default_search_limit() -> usize {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Required for `ollama`; `openai` falls back to the Groq Llama model.
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL. Defaults per provider when absent.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_generator_timeout(),
            max_retries: default_max_retries(),
            temperature: None,
        }
    }
}

impl GeneratorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_generator_timeout() -> u64 {
    60
}

impl Config {
    /// Defaults for every section, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.sessions.ttl_secs == Some(0) {
        anyhow::bail!("sessions.ttl_secs must be >= 1 when set");
    }
    if config.sessions.max_sessions == Some(0) {
        anyhow::bail!("sessions.max_sessions must be >= 1 when set");
    }

    let retriever = &config.retriever;
    if retriever.is_enabled() && retriever.timeout_secs == 0 {
        anyhow::bail!("retriever.timeout_secs must be >= 1");
    }
    match retriever.provider.as_str() {
        "disabled" => {}
        "local" => {
            if retriever.corpus_dir.is_none() {
                anyhow::bail!("retriever.corpus_dir must be set when provider is 'local'");
            }
            if retriever.chunk_max_tokens == 0 {
                anyhow::bail!("retriever.chunk_max_tokens must be > 0");
            }
        }
        "harness" => {
            if retriever.url.is_none() {
                anyhow::bail!("retriever.url must be set when provider is 'harness'");
            }
            match retriever.mode.as_str() {
                "keyword" | "semantic" | "hybrid" => {}
                other => anyhow::bail!(
                    "Unknown retriever mode: '{}'. Must be keyword, semantic, or hybrid.",
                    other
                ),
            }
        }
        other => anyhow::bail!(
            "Unknown retriever provider: '{}'. Must be disabled, local, or harness.",
            other
        ),
    }

    let generator = &config.generator;
    if generator.is_enabled() && generator.timeout_secs == 0 {
        anyhow::bail!("generator.timeout_secs must be >= 1");
    }
    match generator.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if generator.model.as_deref() == Some("") {
                anyhow::bail!("generator.model must not be empty");
            }
        }
        "ollama" => {
            if generator.model.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("generator.model must be specified when provider is 'ollama'");
            }
        }
        other => anyhow::bail!(
            "Unknown generator provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
