use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A rule's kind-specific fields are out of domain. Rejected at
    /// create/update; never reaches generation.
    #[error("Invalid rule parameter: {0}")]
    InvalidRuleParameter(String),

    /// A legacy schedule type code with no mapped recurrence kind.
    #[error("Unknown recurrence kind: type code {0}")]
    UnknownRecurrenceKind(i64),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Transactional occurrence replacement failed. No partial state was
    /// persisted; the operation is safe to retry.
    #[error("Materialization failed: {0}")]
    Materialization(String),
}
