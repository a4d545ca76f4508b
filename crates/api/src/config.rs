//! Application configuration loaded from environment variables.

use topology::PipelineConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL changelog; in-memory when unset
/// - `SHARD_COUNT`: shards per stage (default: `4`)
/// - `CHANNEL_CAPACITY`: ingestion and output channel capacity (default: `1024`)
/// - `CONSUMER_GROUP`: checkpoint group (default: `"order-enricher"`)
///
/// Unparseable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            pipeline: PipelineConfig {
                shard_count: var("SHARD_COUNT")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(defaults.shard_count),
                channel_capacity: var("CHANNEL_CAPACITY")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(defaults.channel_capacity),
                consumer_group: var("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            pipeline: PipelineConfig::default(),
        }
    }
}
