use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GhostError;
use crate::prompt::{ApiFormat, PromptMode};

pub const DEFAULT_RPM_LIMIT: u32 = 100;
/// Price per million prompt tokens when the host does not configure one.
pub const DEFAULT_INPUT_PRICE: f64 = 0.05;
/// Price per million completion tokens when the host does not configure one.
pub const DEFAULT_OUTPUT_PRICE: f64 = 0.10;
pub const DEFAULT_PROMPT_TEMPLATE: &str = "{text}";

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_SEARCH_TOP: usize = 7;

const CONFIG_PATH_ENV: &str = "GHOSTLINE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "ghostline.toml";

/// Stop sequences: the completion APIs accept either one string or a list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Stop {
    One(String),
    Many(Vec<String>),
}

/// The configuration bag a host supplies on every render.
///
/// Recognized keys are typed; everything else lands in `extra` verbatim and
/// is treated as a model parameter candidate.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostConfig {
    /// Widget height in pixels. Presentation only.
    pub height: Option<u32>,
    /// Presentation only.
    pub font_family: Option<String>,
    pub rpm_limit: Option<u32>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub prompt_template: Option<String>,
    pub question_title: Option<String>,
    pub api_format: Option<String>,
    pub prompt_mode: Option<PromptMode>,

    pub model: Option<String>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop: Option<Stop>,

    pub token_cost: Option<f64>,
    pub output_token_cost: Option<f64>,

    pub pinecone_api_key: Option<String>,
    pub pinecone_index_name: Option<String>,
    pub pinecone_environment: Option<String>,
    pub pinecone_host: Option<String>,
    pub openai_api_key: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_api_url: Option<String>,
    pub search_top: Option<usize>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HostConfig {
    /// Parse a host configuration bag from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, GhostError> {
        if !value.is_object() {
            return Err(GhostError::Config(
                "host configuration must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| GhostError::Config(e.to_string()))
    }

    /// Overlay `patch` onto this bag. Keys set to null are cleared.
    pub fn merge(&mut self, patch: Map<String, Value>) -> Result<(), GhostError> {
        let mut base = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(GhostError::Config(e.to_string())),
        };
        base.extend(patch);
        base.retain(|_, v| !v.is_null());
        *self = Self::from_json(Value::Object(base))?;
        Ok(())
    }

    /// Fill keys the host left unset from the process environment.
    pub fn apply_env(&mut self) {
        fill(&mut self.api_url, "GHOSTLINE_API_URL");
        fill(&mut self.api_key, "GHOSTLINE_API_KEY");
        fill(&mut self.model, "GHOSTLINE_MODEL");
        fill(&mut self.prompt_template, "GHOSTLINE_PROMPT_TEMPLATE");
        fill(&mut self.openai_api_key, "OPENAI_API_KEY");
        fill(&mut self.pinecone_api_key, "PINECONE_API_KEY");
        fill(&mut self.pinecone_index_name, "PINECONE_INDEX_NAME");
        fill(&mut self.pinecone_environment, "PINECONE_ENVIRONMENT");
        fill(&mut self.pinecone_host, "PINECONE_HOST");

        if self.rpm_limit.is_none()
            && let Ok(raw) = env::var("GHOSTLINE_RPM_LIMIT")
        {
            match raw.trim().parse() {
                Ok(limit) => self.rpm_limit = Some(limit),
                Err(_) => tracing::warn!("GHOSTLINE_RPM_LIMIT is not a number: {raw:?}"),
            }
        }
    }
}

fn fill(slot: &mut Option<String>, var: &str) {
    if slot.is_none()
        && let Ok(value) = env::var(var)
        && !value.trim().is_empty()
    {
        *slot = Some(value);
    }
}

/// Model parameters. Chat payloads forward only the typed fields; legacy
/// payloads also carry `extra` verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    pub model: Option<String>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop: Option<Stop>,
    pub extra: Map<String, Value>,
}

/// Credentials and tuning for the knowledge retrieval tool.
#[derive(Clone, Default)]
pub struct KnowledgeCredentials {
    pub embedding_key: Option<String>,
    pub index_key: Option<String>,
    pub index_name: Option<String>,
    pub index_host: Option<String>,
    pub index_environment: Option<String>,
    pub embedding_model: String,
    pub embedding_url: String,
    pub top_k: usize,
}

impl KnowledgeCredentials {
    /// True when all three required credentials are present and non-empty.
    pub fn is_complete(&self) -> bool {
        [&self.embedding_key, &self.index_key, &self.index_name]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Resolve the vector index base URL: explicit host first, then the
    /// environment-derived host. `None` when neither is configured.
    pub fn index_base_url(&self) -> Option<String> {
        if let Some(host) = self.index_host.as_deref().filter(|h| !h.trim().is_empty()) {
            let host = host.trim().trim_end_matches('/');
            if host.starts_with("http://") || host.starts_with("https://") {
                return Some(host.to_string());
            }
            return Some(format!("https://{host}"));
        }
        let name = self.index_name.as_deref()?;
        let environment = self
            .index_environment
            .as_deref()
            .filter(|e| !e.trim().is_empty())?;
        Some(format!("https://{name}.svc.{environment}.pinecone.io"))
    }
}

impl std::fmt::Debug for KnowledgeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeCredentials")
            .field("embedding_key", &redact(&self.embedding_key))
            .field("index_key", &redact(&self.index_key))
            .field("index_name", &self.index_name)
            .field("index_host", &self.index_host)
            .field("index_environment", &self.index_environment)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_url", &self.embedding_url)
            .field("top_k", &self.top_k)
            .finish()
    }
}

fn redact(key: &Option<String>) -> &'static str {
    if key.is_some() { "[REDACTED]" } else { "None" }
}

/// Immutable per-call configuration, rebuilt from the host bag on every call.
#[derive(Clone)]
pub struct RequestConfig {
    pub prompt_template: String,
    pub question_title: String,
    pub prompt_mode: PromptMode,
    pub api_url: String,
    pub api_key: Option<String>,
    /// Explicit API shape; `None` means sniff the URL.
    pub api_format: Option<ApiFormat>,
    pub params: ModelParams,
    pub rpm_limit: u32,
    pub input_price: f64,
    pub output_price: f64,
    pub knowledge: KnowledgeCredentials,
}

impl RequestConfig {
    pub fn from_host(host: &HostConfig) -> Result<Self, GhostError> {
        let api_url = host
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GhostError::Config("api_url is required".to_string()))?
            .to_string();

        let api_format = host.api_format.as_deref().and_then(ApiFormat::parse);

        Ok(Self {
            prompt_template: host
                .prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
            question_title: host.question_title.clone().unwrap_or_default(),
            prompt_mode: host.prompt_mode.unwrap_or_default(),
            api_url,
            api_key: host.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_format,
            params: ModelParams {
                model: host.model.clone(),
                max_tokens: host.max_tokens,
                temperature: host.temperature,
                top_p: host.top_p,
                stop: host.stop.clone(),
                extra: host.extra.clone(),
            },
            rpm_limit: host.rpm_limit.unwrap_or(DEFAULT_RPM_LIMIT),
            input_price: host.token_cost.unwrap_or(DEFAULT_INPUT_PRICE),
            output_price: host.output_token_cost.unwrap_or(DEFAULT_OUTPUT_PRICE),
            knowledge: KnowledgeCredentials {
                embedding_key: host.openai_api_key.clone(),
                index_key: host.pinecone_api_key.clone(),
                index_name: host.pinecone_index_name.clone(),
                index_host: host.pinecone_host.clone(),
                index_environment: host.pinecone_environment.clone(),
                embedding_model: host
                    .embedding_model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                embedding_url: host
                    .embedding_api_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
                top_k: host.search_top.unwrap_or(DEFAULT_SEARCH_TOP),
            },
        })
    }
}

impl std::fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestConfig")
            .field("prompt_template", &self.prompt_template)
            .field("question_title", &self.question_title)
            .field("prompt_mode", &self.prompt_mode)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("api_format", &self.api_format)
            .field("params", &self.params)
            .field("rpm_limit", &self.rpm_limit)
            .field("input_price", &self.input_price)
            .field("output_price", &self.output_price)
            .field("knowledge", &self.knowledge)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    host: HostConfig,
}

/// Process-level configuration for the binary: the initial host bag.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub host: HostConfig,
}

impl Config {
    /// Load `ghostline.toml` (or `$GHOSTLINE_CONFIG`), then fill gaps from the
    /// environment. A missing or unreadable file is not fatal.
    pub fn load() -> Self {
        let path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = match Self::from_file(&path) {
            Ok(Some(config)) => {
                tracing::info!("loaded config from {}", path.display());
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring {}: {e}", path.display());
                Self::default()
            }
        };

        config.host.apply_env();

        if config.host.api_url.is_none() {
            tracing::warn!("api_url not configured; suggestions unavailable until configured");
        }
        if !RequestConfig::from_host(&config.host).is_ok_and(|c| c.knowledge.is_complete()) {
            tracing::info!("knowledge base credentials incomplete; search tool returns empty results");
        }

        config
    }

    fn from_file(path: &Path) -> Result<Option<Self>, GhostError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GhostError::Config(format!("read failed: {e}")))?;
        Self::from_toml_str(&raw).map(Some)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, GhostError> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|e| GhostError::Config(e.to_string()))?;
        Ok(Self { host: file.host })
    }
}
