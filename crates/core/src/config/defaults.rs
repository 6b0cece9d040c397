//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_LLM_PROVIDER: &str = "openai";
pub(crate) const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub(crate) const DEFAULT_RESPONSE_TYPE: &str = "multiple paragraphs";
pub(crate) const DEFAULT_STORAGE_PROVIDER: &str = "postgres";
pub(crate) const DEFAULT_POSTGRES_HOST: &str = "localhost";
pub(crate) const DEFAULT_POSTGRES_DATABASE: &str = "graphrag";
pub(crate) const DEFAULT_POSTGRES_USER: &str = "graphrag";
pub(crate) const DEFAULT_POSTGRES_PASSWORD: &str = "graphrag";

pub(crate) fn default_llm_provider() -> String {
    DEFAULT_LLM_PROVIDER.to_string()
}

pub(crate) fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

pub(crate) fn default_llm_timeout_secs() -> u64 {
    180
}

pub(crate) fn default_llm_max_retries() -> u32 {
    10
}

pub(crate) fn default_retry_base_delay_ms() -> u64 {
    500
}

pub(crate) fn default_retry_max_delay_secs() -> u64 {
    10
}

pub(crate) fn default_retry_jitter() -> f64 {
    0.5
}

pub(crate) fn default_max_concurrent_requests() -> usize {
    32
}

pub(crate) fn default_prompt_cache_enabled() -> bool {
    false
}

pub(crate) fn default_prompt_cache_capacity() -> u64 {
    1024
}

pub(crate) fn default_community_level() -> u32 {
    2
}

pub(crate) fn default_context_max_tokens() -> usize {
    12_000
}

pub(crate) fn default_max_data_tokens() -> usize {
    12_000
}

pub(crate) fn default_map_max_tokens() -> u32 {
    1000
}

pub(crate) fn default_reduce_max_tokens() -> u32 {
    2000
}

pub(crate) fn default_temperature() -> f32 {
    0.0
}

pub(crate) fn default_response_type() -> String {
    DEFAULT_RESPONSE_TYPE.to_string()
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_random_seed() -> u64 {
    86
}

pub(crate) fn default_storage_provider() -> String {
    DEFAULT_STORAGE_PROVIDER.to_string()
}

pub(crate) fn default_postgres_host() -> String {
    DEFAULT_POSTGRES_HOST.to_string()
}

pub(crate) fn default_postgres_port() -> u16 {
    5432
}

pub(crate) fn default_postgres_database() -> String {
    DEFAULT_POSTGRES_DATABASE.to_string()
}

pub(crate) fn default_postgres_user() -> String {
    DEFAULT_POSTGRES_USER.to_string()
}

pub(crate) fn default_postgres_password() -> String {
    DEFAULT_POSTGRES_PASSWORD.to_string()
}

pub(crate) fn default_postgres_pool_size() -> u32 {
    10
}
