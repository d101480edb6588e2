//! Engine configuration read once from the process environment.
//!
//! Every assembler receives an [`EngineConfig`] value instead of reading
//! environment variables itself. [`EngineConfig::from_vars`] is the pure core
//! used by tests; [`EngineConfig::from_env`] snapshots `std::env::vars()` and
//! delegates to it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::AgentError;

pub const DEFAULT_TOP_K: usize = 3;
pub const VISUAL_OUTPUT_DIR: &str = "./visual_outputs";
pub const DEFAULT_STORAGE_DIR: &str = "storage";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TOOLS_CONFIG_PATH: &str = "config/tools.yaml";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    /// Any endpoint speaking the OpenAI chat-completions protocol.
    Custom { base_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingProvider {
    OpenAI,
    /// Deterministic hash embeddings; needs no network.
    Simple,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub system_prompt: Option<String>,
    pub top_k: usize,
    pub pool_management_endpoint: Option<String>,
    pub pool_management_token: Option<String>,
    pub dataset_path: Option<PathBuf>,
    pub visual_output_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub data_dir: PathBuf,
    pub tools_config_path: PathBuf,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            top_k: DEFAULT_TOP_K,
            pool_management_endpoint: None,
            pool_management_token: None,
            dataset_path: None,
            visual_output_dir: PathBuf::from(VISUAL_OUTPUT_DIR),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tools_config_path: PathBuf::from(DEFAULT_TOOLS_CONFIG_PATH),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the current process environment.
    pub fn from_env() -> Result<Self, AgentError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Builds the configuration from an explicit variable map.
    ///
    /// Empty or whitespace-only values count as unset.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, AgentError> {
        let defaults = Self::default();

        let top_k = match lookup_trimmed(vars, "TOP_K") {
            Some(raw) => parse_top_k(raw)?,
            None => DEFAULT_TOP_K,
        };

        let config = Self {
            system_prompt: lookup(vars, "SYSTEM_PROMPT").map(str::to_string),
            top_k,
            pool_management_endpoint: lookup_trimmed(vars, "POOL_MANAGEMENT_ENDPOINT")
                .map(str::to_string),
            pool_management_token: lookup_trimmed(vars, "POOL_MANAGEMENT_TOKEN").map(str::to_string),
            dataset_path: lookup(vars, "DATASET_PATH").map(PathBuf::from),
            visual_output_dir: defaults.visual_output_dir,
            storage_dir: lookup(vars, "STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            data_dir: lookup(vars, "DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            tools_config_path: lookup(vars, "TOOLS_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.tools_config_path),
            llm: llm_config_from_vars(vars)?,
            embedding: embedding_config_from_vars(vars)?,
        };

        log::debug!(
            "Engine configuration loaded: top_k={}, system_prompt={}, storage_dir={}, tools_config={}",
            config.top_k,
            config.system_prompt.is_some(),
            config.storage_dir.display(),
            config.tools_config_path.display()
        );

        Ok(config)
    }

    /// The sandbox pool endpoint, required by the interpreter assembler.
    pub fn require_pool_management_endpoint(&self) -> Result<&str, AgentError> {
        self.pool_management_endpoint.as_deref().ok_or_else(|| {
            AgentError::ConfigError(
                "POOL_MANAGEMENT_ENDPOINT is not set; the code interpreter needs a session pool endpoint"
                    .to_string(),
            )
        })
    }

    /// The local dataset file, required by the interpreter assembler.
    pub fn require_dataset_path(&self) -> Result<&Path, AgentError> {
        self.dataset_path.as_deref().ok_or_else(|| {
            AgentError::ConfigError(
                "DATASET_PATH is not set; the code interpreter needs a dataset file to upload"
                    .to_string(),
            )
        })
    }
}

/// The raw value of `key`; whitespace-only values count as unset.
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Like [`lookup`], trimmed, for values that are parsed rather than passed on.
fn lookup_trimmed<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    lookup(vars, key).map(str::trim)
}

fn parse_top_k(raw: &str) -> Result<usize, AgentError> {
    match raw.parse::<usize>() {
        Ok(0) => Err(AgentError::ConfigError(
            "TOP_K must be a positive integer, got 0".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(e) => Err(AgentError::ConfigError(format!(
            "TOP_K must be a positive integer, got '{}': {}",
            raw, e
        ))),
    }
}

fn parse_optional<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, AgentError>
where
    T::Err: std::fmt::Display,
{
    lookup_trimmed(vars, key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                AgentError::ConfigError(format!("Invalid value '{}' for {}: {}", raw, key, e))
            })
        })
        .transpose()
}

fn llm_config_from_vars(vars: &HashMap<String, String>) -> Result<LlmConfig, AgentError> {
    let base_url = lookup_trimmed(vars, "LLM_BASE_URL")
        .or_else(|| lookup_trimmed(vars, "OPENAI_BASE_URL"))
        .map(|url| url.trim_end_matches('/').to_string());

    let provider = match lookup_trimmed(vars, "MODEL_PROVIDER").map(str::to_lowercase).as_deref() {
        None | Some("openai") => LlmProvider::OpenAI,
        Some("custom") => {
            let base_url = base_url.clone().ok_or_else(|| {
                AgentError::ConfigError(
                    "MODEL_PROVIDER=custom requires LLM_BASE_URL".to_string(),
                )
            })?;
            LlmProvider::Custom { base_url }
        }
        Some(other) => {
            return Err(AgentError::ConfigError(format!(
                "Unsupported MODEL_PROVIDER '{}'. Expected 'openai' or 'custom'",
                other
            )))
        }
    };

    Ok(LlmConfig {
        provider,
        model: lookup_trimmed(vars, "MODEL").unwrap_or(DEFAULT_MODEL).to_string(),
        api_key: lookup_trimmed(vars, "OPENAI_API_KEY").map(str::to_string),
        base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        temperature: parse_optional(vars, "LLM_TEMPERATURE")?,
        max_tokens: parse_optional(vars, "LLM_MAX_TOKENS")?,
    })
}

fn embedding_config_from_vars(
    vars: &HashMap<String, String>,
) -> Result<EmbeddingConfig, AgentError> {
    let provider = match lookup_trimmed(vars, "EMBEDDING_PROVIDER")
        .map(str::to_lowercase)
        .as_deref()
    {
        None | Some("openai") => EmbeddingProvider::OpenAI,
        Some("simple") => EmbeddingProvider::Simple,
        Some(other) => {
            return Err(AgentError::ConfigError(format!(
                "Unsupported EMBEDDING_PROVIDER '{}'. Expected 'openai' or 'simple'",
                other
            )))
        }
    };

    Ok(EmbeddingConfig {
        provider,
        model: lookup_trimmed(vars, "EMBEDDING_MODEL")
            .unwrap_or(DEFAULT_EMBEDDING_MODEL)
            .to_string(),
        dimension: parse_optional(vars, "EMBEDDING_DIM")?.unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
        api_key: lookup_trimmed(vars, "OPENAI_API_KEY").map(str::to_string),
        base_url: lookup_trimmed(vars, "EMBEDDING_BASE_URL")
            .or_else(|| lookup_trimmed(vars, "OPENAI_BASE_URL"))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
    })
}
