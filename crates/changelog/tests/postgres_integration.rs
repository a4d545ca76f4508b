//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and truncate the tables
//! before each test, so they run serially.
//!
//! ```bash
//! cargo test -p changelog --test postgres_integration
//! ```

use std::sync::Arc;

use changelog::{
    ChangelogError, ChangelogStore, ChangelogStoreExt, Checkpoint, LogRecord, Offset,
    PostgresChangelog, Topic,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!("../../../migrations/001_create_changelog.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresChangelog {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE changelog, checkpoints RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresChangelog::new(pool)
}

fn create_test_record(topic: Topic, key: Option<&str>, payload: serde_json::Value) -> LogRecord {
    let builder = LogRecord::builder(topic).payload_raw(payload);
    let builder = match key {
        Some(key) => builder.key(key),
        None => builder,
    };
    builder.build().unwrap()
}

#[tokio::test]
#[serial]
async fn append_and_read_topic() {
    let store = get_test_store().await;

    let offset = store
        .append_record(create_test_record(
            Topic::Customers,
            Some("c1"),
            serde_json::json!({"id": "c1", "name": "Alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(offset, Offset::first());

    let records = store
        .read_topic(Topic::Customers, Offset::initial())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, Topic::Customers);
    assert_eq!(records[0].key.as_deref(), Some("c1"));
    assert_eq!(records[0].payload["name"], "Alice");
}

#[tokio::test]
#[serial]
async fn append_batch_returns_last_offset() {
    let store = get_test_store().await;

    let last = store
        .append(vec![
            create_test_record(Topic::Products, Some("p1"), serde_json::json!({"id": "p1"})),
            create_test_record(Topic::Orders, None, serde_json::json!({"id": "o1"})),
            create_test_record(
                Topic::OrderLineItems,
                None,
                serde_json::json!({"order_id": "o1"}),
            ),
        ])
        .await
        .unwrap();

    assert_eq!(last, Offset::new(3));
    assert_eq!(store.latest_offset().await.unwrap(), Offset::new(3));
}

#[tokio::test]
#[serial]
async fn null_key_roundtrips() {
    let store = get_test_store().await;

    store
        .append_record(create_test_record(
            Topic::Orders,
            None,
            serde_json::json!({"id": "o1"}),
        ))
        .await
        .unwrap();

    let records = store
        .read_topic(Topic::Orders, Offset::initial())
        .await
        .unwrap();
    assert!(records[0].key.is_none());
}

#[tokio::test]
#[serial]
async fn headers_roundtrip() {
    let store = get_test_store().await;

    let record = LogRecord::builder(Topic::Orders)
        .payload_raw(serde_json::json!({"id": "o1"}))
        .header("source", serde_json::json!("store-api"))
        .build()
        .unwrap();
    store.append_record(record).await.unwrap();

    let records = store
        .read_topic(Topic::Orders, Offset::initial())
        .await
        .unwrap();
    assert_eq!(
        records[0].headers.get("source"),
        Some(&serde_json::json!("store-api"))
    );
}

#[tokio::test]
#[serial]
async fn stream_from_is_offset_ordered_across_topics() {
    use futures_util::StreamExt;

    let store = get_test_store().await;
    for (topic, key) in [
        (Topic::Customers, "c1"),
        (Topic::Orders, "o1"),
        (Topic::Products, "p1"),
    ] {
        store
            .append_record(create_test_record(
                topic,
                Some(key),
                serde_json::json!({"id": key}),
            ))
            .await
            .unwrap();
    }

    let stream = store.stream_from(Offset::new(2)).await.unwrap();
    let records: Vec<_> = stream.map(|r| r.unwrap()).collect().await;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].topic, Topic::Orders);
    assert_eq!(records[1].topic, Topic::Products);
    assert!(records[0].offset < records[1].offset);
}

#[tokio::test]
#[serial]
async fn empty_append_is_rejected() {
    let store = get_test_store().await;
    let result = store.append(Vec::new()).await;
    assert!(matches!(result, Err(ChangelogError::InvalidAppend(_))));
    assert!(store.is_empty().await.unwrap());
}

#[tokio::test]
#[serial]
async fn checkpoint_upsert_and_get() {
    let store = get_test_store().await;

    assert!(store.get_checkpoint("order-enricher").await.unwrap().is_none());

    store
        .save_checkpoint(Checkpoint::new("order-enricher", Offset::new(4)))
        .await
        .unwrap();
    store
        .save_checkpoint(Checkpoint::new("order-enricher", Offset::new(9)))
        .await
        .unwrap();

    let checkpoint = store
        .get_checkpoint("order-enricher")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.offset, Offset::new(9));
}
