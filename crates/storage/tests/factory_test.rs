use graphsearch_core::config::StorageConfig;
use graphsearch_core::models::NodeSet;
use graphsearch_storage::create_prompt_cache;

#[tokio::test]
async fn test_memory_provider_round_trip() {
    let config = StorageConfig {
        provider: "memory".to_string(),
        ..StorageConfig::default()
    };
    let cache = create_prompt_cache(&config).await.expect("memory cache");

    let nodes = NodeSet::new(["X"]);
    cache
        .store("What is the role of X?", "X leads.", &nodes, "demo")
        .await
        .expect("store");

    let hit = cache
        .lookup("What is the role of X?", &nodes, "demo")
        .await
        .expect("lookup");
    assert_eq!(hit.as_deref(), Some("X leads."));
}

#[tokio::test]
async fn test_unknown_provider_is_rejected() {
    let config = StorageConfig {
        provider: "sqlite".to_string(),
        ..StorageConfig::default()
    };
    let err = create_prompt_cache(&config)
        .await
        .err()
        .expect("unknown provider");
    assert!(err.to_string().contains("Unknown storage provider"));
}
