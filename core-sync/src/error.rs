use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Provider session is not active")]
    Inactive,

    #[error("Invalid virtual path '{0}'")]
    InvalidPath(String),

    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("{path} already exists, use 'overwrite' argument")]
    AlreadyExists { path: String },

    #[error("Folder {path} is not empty, use 'force'")]
    NotEmpty { path: String },

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Quota exceeded during {operation}, operation did not complete this pass")]
    QuotaExceeded { operation: String },

    #[error("Too many files ({count}) returned for {path}")]
    Ambiguous { path: String, count: usize },

    #[error("Backend transport error: {0}")]
    Transport(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn not_found(path: impl Into<String>) -> Self {
        SyncError::NotFound { path: path.into() }
    }

    /// Whether the failure leaves the session unusable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration(_)
                | SyncError::Authentication(_)
                | SyncError::Permission(_)
                | SyncError::Inactive
        )
    }
}

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Unauthorized(msg) => SyncError::Authentication(msg),
            BridgeError::PermissionDenied(msg) => SyncError::Permission(msg),
            BridgeError::QuotaExceeded(msg) => SyncError::QuotaExceeded { operation: msg },
            BridgeError::NotFound(target) => SyncError::NotFound { path: target },
            BridgeError::Io(e) => SyncError::Io(e),
            BridgeError::NotAvailable(msg) | BridgeError::OperationFailed(msg) => {
                SyncError::Transport(msg)
            }
        }
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(error: core_runtime::Error) -> Self {
        match error {
            core_runtime::Error::Config(msg) => SyncError::Configuration(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
