//! Configuration module for graphsearch
//!
//! Configuration can be loaded from TOML files and/or environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file (`~/.graphsearch/config.toml`)
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".graphsearch").join("config.toml"))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM invocation configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Map-reduce search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Idempotency cache storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Graphs that can be queried, keyed by graph id
    #[serde(default)]
    pub graphs: BTreeMap<String, GraphConfig>,
}

/// Configuration for the external LLM service and the invocation client
///
/// # Providers
/// - `openai` (default): any OpenAI-compatible chat completions endpoint
/// - `yandex`: Yandex Foundation Models completion API (needs `folder_id`)
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Base URL override for the provider API
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// API key (falls back to OPENAI_API_KEY / YANDEX_TOKEN)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Yandex Cloud folder id (falls back to YANDEX_FOLDER_ID)
    #[serde(default)]
    pub folder_id: Option<String>,

    /// Timeout for a single attempt
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum attempts per invocation, first attempt included
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,

    /// Fraction of each backoff delay randomized in both directions
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: f64,

    /// Size of the admission gate shared by all calls of one client
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Serve identical prompts from an in-memory cache
    #[serde(default = "default_prompt_cache_enabled")]
    pub prompt_cache_enabled: bool,

    #[serde(default = "default_prompt_cache_capacity")]
    pub prompt_cache_capacity: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_base_url: None,
            api_key: None,
            folder_id: None,
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_secs: default_retry_max_delay_secs(),
            retry_jitter: default_retry_jitter(),
            max_concurrent_requests: default_max_concurrent_requests(),
            prompt_cache_enabled: default_prompt_cache_enabled(),
            prompt_cache_capacity: default_prompt_cache_capacity(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field("folder_id", &self.folder_id)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_secs", &self.retry_max_delay_secs)
            .field("retry_jitter", &self.retry_jitter)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("prompt_cache_enabled", &self.prompt_cache_enabled)
            .field("prompt_cache_capacity", &self.prompt_cache_capacity)
            .finish()
    }
}

impl LlmConfig {
    /// API key from config, then from the provider's conventional env var
    pub fn resolve_api_key(&self) -> Option<String> {
        let env_key = match self.provider.as_str() {
            "yandex" => "YANDEX_TOKEN",
            _ => "OPENAI_API_KEY",
        };
        self.api_key
            .clone()
            .or_else(|| std::env::var(env_key).ok())
    }

    pub fn resolve_folder_id(&self) -> Option<String> {
        self.folder_id
            .clone()
            .or_else(|| std::env::var("YANDEX_FOLDER_ID").ok())
    }
}

/// Configuration for context building, map and reduce stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Deepest community level considered when selecting reports
    #[serde(default = "default_community_level")]
    pub community_level: u32,

    /// Token budget of a single context chunk
    #[serde(default = "default_context_max_tokens")]
    pub context_max_tokens: usize,

    /// Token budget of the packed key points handed to the reduce prompt
    #[serde(default = "default_max_data_tokens")]
    pub max_data_tokens: usize,

    #[serde(default = "default_map_max_tokens")]
    pub map_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub map_temperature: f32,

    #[serde(default = "default_reduce_max_tokens")]
    pub reduce_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub reduce_temperature: f32,

    /// Free-form description of the desired answer shape
    #[serde(default = "default_response_type")]
    pub response_type: String,

    /// Ask providers for a JSON object on map calls
    #[serde(default = "default_true")]
    pub json_mode: bool,

    /// Let the reduce step draw on knowledge outside the reports
    #[serde(default)]
    pub allow_general_knowledge: bool,

    #[serde(default = "default_true")]
    pub shuffle_data: bool,

    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Use the short report summary instead of the full report
    #[serde(default)]
    pub use_community_summary: bool,

    #[serde(default = "default_true")]
    pub include_community_rank: bool,

    #[serde(default = "default_true")]
    pub include_community_weight: bool,

    #[serde(default = "default_true")]
    pub normalize_community_weight: bool,

    #[serde(default)]
    pub min_community_rank: f64,

    /// Deadline for a whole search, unset for none
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// HuggingFace `tokenizer.json` used for budgeting; word-boundary counting when unset
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            community_level: default_community_level(),
            context_max_tokens: default_context_max_tokens(),
            max_data_tokens: default_max_data_tokens(),
            map_max_tokens: default_map_max_tokens(),
            map_temperature: default_temperature(),
            reduce_max_tokens: default_reduce_max_tokens(),
            reduce_temperature: default_temperature(),
            response_type: default_response_type(),
            json_mode: true,
            allow_general_knowledge: false,
            shuffle_data: true,
            random_seed: default_random_seed(),
            use_community_summary: false,
            include_community_rank: true,
            include_community_weight: true,
            normalize_community_weight: true,
            min_community_rank: 0.0,
            request_timeout_secs: None,
            tokenizer_path: None,
        }
    }
}

/// Configuration for the idempotency cache backend
///
/// # Providers
/// - `postgres` (default): `prompt_histories` / `prompt_selected_nodes` tables
/// - `memory`: process-local store, lost on exit
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_provider")]
    pub provider: String,

    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_user")]
    pub postgres_user: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Postgres connection pool size (max connections)
    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            postgres_host: default_postgres_host(),
            postgres_port: default_postgres_port(),
            postgres_database: default_postgres_database(),
            postgres_user: default_postgres_user(),
            postgres_password: default_postgres_password(),
            postgres_pool_size: default_postgres_pool_size(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("provider", &self.provider)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_user", &self.postgres_user)
            .field("postgres_password", &"***REDACTED***")
            .field("postgres_pool_size", &self.postgres_pool_size)
            .finish()
    }
}

impl StorageConfig {
    /// Connection URL for the configured Postgres database
    pub fn postgres_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_host,
            self.postgres_port,
            self.postgres_database
        )
    }
}

/// Location of one graph's precomputed tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Directory holding `entities.json` and `community_reports.json`
    pub data_dir: PathBuf,

    /// Overrides `search.community_level` for this graph
    #[serde(default)]
    pub community_level: Option<u32>,
}

impl Config {
    /// Community level to use for a graph
    pub fn community_level_for(&self, graph_id: &str) -> u32 {
        self.graphs
            .get(graph_id)
            .and_then(|g| g.community_level)
            .unwrap_or(self.search.community_level)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.llm.max_concurrent_requests == 0 {
            return Err(Error::config("llm.max_concurrent_requests must be at least 1"));
        }
        if self.llm.max_retries == 0 {
            return Err(Error::config("llm.max_retries must be at least 1"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::config("llm.timeout_secs must be positive"));
        }
        if !(0.0..=1.0).contains(&self.llm.retry_jitter) {
            return Err(Error::config("llm.retry_jitter must be between 0.0 and 1.0"));
        }
        for (name, value) in [
            ("search.map_temperature", self.search.map_temperature),
            ("search.reduce_temperature", self.search.reduce_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(Error::config(format!("{name} must be between 0.0 and 2.0")));
            }
        }
        if self.search.context_max_tokens == 0 || self.search.max_data_tokens == 0 {
            return Err(Error::config("search token budgets must be positive"));
        }
        if self.search.map_max_tokens == 0 || self.search.reduce_max_tokens == 0 {
            return Err(Error::config("search completion limits must be positive"));
        }
        if self.search.request_timeout_secs == Some(0) {
            return Err(Error::config("search.request_timeout_secs must be positive"));
        }
        match self.storage.provider.as_str() {
            "postgres" | "memory" => {}
            other => {
                return Err(Error::config(format!(
                    "Unknown storage provider: '{other}'. Valid providers: postgres, memory"
                )))
            }
        }
        Ok(())
    }
}
