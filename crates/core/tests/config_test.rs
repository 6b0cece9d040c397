use graphsearch_core::config::{Config, StorageConfig};

#[test]
fn test_storage_config_defaults() {
    let config = StorageConfig::default();
    assert_eq!(config.provider, "postgres");
    assert_eq!(config.postgres_host, "localhost");
    assert_eq!(config.postgres_port, 5432);
    assert_eq!(config.postgres_database, "graphrag");
    assert_eq!(config.postgres_pool_size, 10);
}

#[test]
fn test_config_validation_storage_provider() {
    let mut config = Config::default();

    config.storage.provider = "postgres".to_string();
    assert!(config.validate().is_ok());

    config.storage.provider = "memory".to_string();
    assert!(config.validate().is_ok());

    config.storage.provider = "redis".to_string();
    let result = config.validate();
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Unknown storage provider"));
}

#[test]
fn test_config_validation_budgets() {
    let mut config = Config::default();
    config.search.max_data_tokens = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.search.request_timeout_secs = Some(0);
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.search.request_timeout_secs = Some(300);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_retry_attempts() {
    let mut config = Config::default();
    config.llm.max_retries = 0;
    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("max_retries"));
}
