use thiserror::Error;

/// Errors from setting up the SQLite backend. Errors during settlement are reported as
/// [`SettlementError`](crate::SettlementError)s instead.
#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Invalid database URL. {0}")]
    InvalidUrl(String),
    #[error("Could not migrate the database. {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}
