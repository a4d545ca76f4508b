use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Checkpoint, LogRecord, Offset, Result, Topic,
    store::{ChangelogStore, RecordStream, validate_records_for_append},
};

/// PostgreSQL-backed changelog implementation.
///
/// Offsets come from a `BIGSERIAL` column. Appends should be serialized by
/// the caller when offset order must match dispatch order.
#[derive(Clone)]
pub struct PostgresChangelog {
    pool: PgPool,
}

impl PostgresChangelog {
    /// Creates a new PostgreSQL changelog.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<LogRecord> {
        let headers_json: serde_json::Value = row.try_get("headers")?;
        let headers: HashMap<String, serde_json::Value> = serde_json::from_value(headers_json)?;
        let topic: String = row.try_get("topic")?;

        Ok(LogRecord {
            offset: Offset::new(row.try_get("log_offset")?),
            topic: topic.parse::<Topic>()?,
            key: row.try_get("record_key")?,
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            headers,
        })
    }
}

#[async_trait]
impl ChangelogStore for PostgresChangelog {
    async fn append(&self, records: Vec<LogRecord>) -> Result<Offset> {
        validate_records_for_append(&records)?;

        let mut tx = self.pool.begin().await?;

        let appended = records.len();
        let mut last = Offset::initial();
        for record in &records {
            let headers_json = serde_json::to_value(&record.headers)?;

            let offset: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO changelog (topic, record_key, timestamp, payload, headers)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING log_offset
                "#,
            )
            .bind(record.topic.as_str())
            .bind(record.key.as_deref())
            .bind(record.timestamp)
            .bind(&record.payload)
            .bind(headers_json)
            .fetch_one(&mut *tx)
            .await?;

            last = Offset::new(offset);
        }

        tx.commit().await?;

        metrics::counter!("changelog_records_appended_total").increment(appended as u64);
        Ok(last)
    }

    async fn read_topic(&self, topic: Topic, from: Offset) -> Result<Vec<LogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT log_offset, topic, record_key, timestamp, payload, headers
            FROM changelog
            WHERE topic = $1 AND log_offset >= $2
            ORDER BY log_offset ASC
            "#,
        )
        .bind(topic.as_str())
        .bind(from.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn stream_from(&self, from: Offset) -> Result<RecordStream> {
        use futures_util::stream;

        let rows = sqlx::query(
            r#"
            SELECT log_offset, topic, record_key, timestamp, payload, headers
            FROM changelog
            WHERE log_offset >= $1
            ORDER BY log_offset ASC
            "#,
        )
        .bind(from.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<Result<LogRecord>> = rows.into_iter().map(Self::row_to_record).collect();
        Ok(Box::pin(stream::iter(records)))
    }

    async fn latest_offset(&self) -> Result<Offset> {
        let offset: Option<i64> = sqlx::query_scalar("SELECT MAX(log_offset) FROM changelog")
            .fetch_one(&self.pool)
            .await?;

        Ok(offset.map(Offset::new).unwrap_or_default())
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (consumer_group, log_offset, timestamp)
            VALUES ($1, $2, $3)
            ON CONFLICT (consumer_group) DO UPDATE SET
                log_offset = EXCLUDED.log_offset,
                timestamp = EXCLUDED.timestamp
            "#,
        )
        .bind(&checkpoint.consumer_group)
        .bind(checkpoint.offset.as_i64())
        .bind(checkpoint.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_checkpoint(&self, consumer_group: &str) -> Result<Option<Checkpoint>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT consumer_group, log_offset, timestamp
            FROM checkpoints
            WHERE consumer_group = $1
            "#,
        )
        .bind(consumer_group)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Checkpoint {
                consumer_group: row.try_get("consumer_group")?,
                offset: Offset::new(row.try_get("log_offset")?),
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
            })),
            None => Ok(None),
        }
    }
}
