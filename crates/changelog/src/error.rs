use thiserror::Error;

/// Errors that can occur when interacting with the changelog.
#[derive(Debug, Error)]
pub enum ChangelogError {
    /// The records handed to `append` were rejected before being written.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A stored topic name does not match any known topic.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for changelog operations.
pub type Result<T> = std::result::Result<T, ChangelogError>;
