use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Dataset not found: {0}")]
    DatasetNotFound(uuid::Uuid),

    #[error("Community share not found: {0}")]
    ShareNotFound(uuid::Uuid),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Username already taken: {0}")]
    DuplicateUser(String),

    #[error("Dataset {0} is already shared")]
    AlreadyShared(uuid::Uuid),

    #[error("Dataset {0} has expired")]
    Expired(uuid::Uuid),

    #[error("Output file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid output format: {0}")]
    InvalidFormat(String),

    #[error("Invalid labeling mode: {0}")]
    InvalidMode(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error means the document store itself is unreachable,
    /// as opposed to a problem with the request.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Database(
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Configuration(_)
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
