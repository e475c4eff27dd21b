/// Error types for the Taskhub coordination engine.
use thiserror::Error;

/// Result type for coordination operations.
pub type HubResult<T> = Result<T, HubError>;

/// Core error type for coordination operations.
///
/// Every variant corresponds to one error kind of the operation surface;
/// transports map these onto their own status codes.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not the assigned hunter: {0}")]
    NotOwner(String),

    #[error("A hunter cannot claim their own published task")]
    SelfClaim,

    #[error("A hunter cannot evaluate their own report")]
    SelfEvaluation,

    #[error("Missing required skill: {0}")]
    SkillMissing(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Write conflict, retry the operation: {0}")]
    Conflict(String),

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Core error type for the namespaced SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                if message.contains("locked") || message.contains("busy") {
                    StoreError::Busy(message)
                } else {
                    StoreError::Database(message)
                }
            }
            sqlx::Error::PoolTimedOut => StoreError::Busy(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy(message) => HubError::Conflict(message),
            other => HubError::Internal(other.to_string()),
        }
    }
}

/// Result type for the external document store adapter.
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;

/// Core error type for the external document store and LLM calls.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Document service not configured")]
    Unconfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<KnowledgeError> for HubError {
    fn from(err: KnowledgeError) -> Self {
        HubError::External(err.to_string())
    }
}
