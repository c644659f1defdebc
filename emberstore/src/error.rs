use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("identity keys file is present but could not be parsed: {0}")]
    IdentityCorrupt(String),
    #[error("friend '{0}' already exists")]
    AlreadyExists(String),
    #[error("'{0}' was not found")]
    NotFound(String),
    #[error("message {0} already recorded")]
    Duplicate(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
