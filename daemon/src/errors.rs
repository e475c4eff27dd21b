/// Error types for the RPC daemon
use taskhub_core::HubError;
use thiserror::Error;

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Daemon error types
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid RPC request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// RPC method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Error surfaced by the coordination engine
    #[error(transparent)]
    Hub(#[from] HubError),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    /// Map onto a JSON-RPC error code and message.
    ///
    /// Identity failures use the auth-equivalent code so clients treat them
    /// like authentication errors; conflicts carry a retry hint.
    pub fn to_rpc_error(&self) -> (i64, String) {
        match self {
            DaemonError::Config(msg) => (-32600, format!("Invalid configuration: {}", msg)),
            DaemonError::InvalidRequest(msg) => (-32600, format!("Invalid request: {}", msg)),
            DaemonError::MethodNotFound(method) => {
                (-32601, format!("Method not found: {}", method))
            }
            DaemonError::Hub(err) => match err {
                HubError::Identity(msg) => (-32001, format!("Identity required: {}", msg)),
                HubError::NotFound(msg) => (-32004, format!("Not found: {}", msg)),
                HubError::InvalidState(msg) => (-32009, format!("Invalid state: {}", msg)),
                HubError::NotOwner(msg) => (-32010, format!("Not the assigned hunter: {}", msg)),
                HubError::SelfClaim => (-32011, err.to_string()),
                HubError::SelfEvaluation => (-32012, err.to_string()),
                HubError::SkillMissing(skill) => {
                    (-32013, format!("Missing required skill: {}", skill))
                }
                HubError::Conflict(msg) => {
                    (-32014, format!("Write conflict, please retry: {}", msg))
                }
                HubError::Validation(msg) => (-32602, format!("Invalid params: {}", msg)),
                HubError::External(msg) => (-32015, format!("External service error: {}", msg)),
                HubError::Internal(msg) => (-32603, format!("Internal error: {}", msg)),
            },
            DaemonError::Serialization(err) => (-32602, format!("Invalid params: {}", err)),
            DaemonError::Server(msg) => (-32603, format!("Internal error: {}", msg)),
            DaemonError::Io(err) => (-32603, format!("Internal error: {}", err)),
        }
    }
}
