//! Integration tests for the Postgres prompt cache
//!
//! Require Docker. Run with `cargo test -p graphsearch-storage -- --ignored`.

use anyhow::{Context, Result};
use graphsearch_core::config::StorageConfig;
use graphsearch_core::models::NodeSet;
use graphsearch_storage::{create_prompt_cache, PostgresPromptCache, PromptCache};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

/// Start a Postgres container and return a migrated cache connected to it
async fn setup_postgres() -> Result<(ContainerAsync<Postgres>, PostgresPromptCache)> {
    let container = Postgres::default()
        .with_user("graphrag")
        .with_password("graphrag")
        .with_db_name("graphrag")
        .with_tag("16")
        .start()
        .await
        .context("Failed to start Postgres container")?;

    let port = container
        .get_host_port_ipv4(5432)
        .await
        .context("Failed to get Postgres port")?;

    let config = StorageConfig {
        postgres_port: port,
        ..StorageConfig::default()
    };
    let cache = PostgresPromptCache::connect(&config).await?;
    cache.run_migrations().await?;

    Ok((container, cache))
}

#[tokio::test]
#[ignore]
async fn test_lookup_matches_node_set_in_any_order() -> Result<()> {
    let (_container, cache) = setup_postgres().await?;

    cache
        .store("q", "answer", &NodeSet::new(["a", "b"]), "demo")
        .await?;

    assert_eq!(
        cache
            .lookup("q", &NodeSet::new(["b", "a"]), "demo")
            .await?
            .as_deref(),
        Some("answer")
    );
    assert_eq!(cache.lookup("q", &NodeSet::default(), "demo").await?, None);
    assert_eq!(cache.lookup("q", &NodeSet::new(["a"]), "demo").await?, None);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_empty_node_set_round_trip_and_newest_wins() -> Result<()> {
    let (_container, cache) = setup_postgres().await?;

    cache.store("q", "old", &NodeSet::default(), "demo").await?;
    cache.store("q", "new", &NodeSet::default(), "demo").await?;
    cache.store("q", "scoped", &NodeSet::new(["x"]), "demo").await?;

    assert_eq!(
        cache
            .lookup("q", &NodeSet::default(), "demo")
            .await?
            .as_deref(),
        Some("new")
    );
    assert_eq!(cache.lookup("q", &NodeSet::default(), "other").await?, None);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_store_writes_one_history_row_and_node_rows() -> Result<()> {
    let (_container, cache) = setup_postgres().await?;

    cache
        .store("q", "answer", &NodeSet::new(["a", "b", "a"]), "demo")
        .await?;

    let histories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prompt_histories")
        .fetch_one(cache.pool())
        .await?;
    let nodes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prompt_selected_nodes")
        .fetch_one(cache.pool())
        .await?;
    assert_eq!(histories, 1);
    assert_eq!(nodes, 2);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_long_prompt_is_stored_and_found() -> Result<()> {
    let (_container, cache) = setup_postgres().await?;

    // Non-repetitive so TOAST compression cannot shrink it under the btree row limit
    let query: String = (0..10_000u32)
        .map(|i| char::from(b'a' + ((i.wrapping_mul(2_654_435_761) >> 13) % 26) as u8))
        .collect();
    let nodes = NodeSet::new(["x"]);

    cache.store(&query, "long answer", &nodes, "demo").await?;

    assert_eq!(
        cache.lookup(&query, &nodes, "demo").await?.as_deref(),
        Some("long answer")
    );
    assert_eq!(cache.lookup(&query[..9_999], &nodes, "demo").await?, None);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_failed_node_insert_leaves_no_history_row() -> Result<()> {
    let (_container, cache) = setup_postgres().await?;

    // Postgres text cannot hold NUL, so the node insert fails after the history insert
    let result = cache
        .store("q", "answer", &NodeSet::new(["a\0b"]), "demo")
        .await;
    assert!(result.is_err());

    let histories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prompt_histories")
        .fetch_one(cache.pool())
        .await?;
    let nodes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prompt_selected_nodes")
        .fetch_one(cache.pool())
        .await?;
    assert_eq!(histories, 0);
    assert_eq!(nodes, 0);
    assert_eq!(cache.lookup("q", &NodeSet::default(), "demo").await?, None);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_history_newest_first() -> Result<()> {
    let (_container, cache) = setup_postgres().await?;

    cache.store("first", "1", &NodeSet::new(["b", "a"]), "demo").await?;
    cache.store("second", "2", &NodeSet::default(), "demo").await?;
    cache.store("elsewhere", "3", &NodeSet::default(), "other").await?;

    let history = cache.history("demo").await?;
    let prompts: Vec<&str> = history.iter().map(|e| e.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["second", "first"]);
    assert_eq!(history[1].nodes, NodeSet::new(["a", "b"]));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_unreachable_database_is_cache_unavailable() {
    let config = StorageConfig {
        postgres_host: "127.0.0.1".to_string(),
        postgres_port: 1,
        ..StorageConfig::default()
    };
    let err = create_prompt_cache(&config)
        .await
        .err()
        .expect("connection must fail");
    assert_eq!(
        err.category(),
        graphsearch_core::ErrorCategory::Cache
    );
}
