use thiserror::Error;

/// Errors surfaced by bridge implementations.
///
/// Backends map their native failures onto these variants so the sync core can
/// classify them without knowing which service produced them.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Credential rejected: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Remote node not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure is a rate-limit/quota response that may succeed later.
    pub fn is_quota(&self) -> bool {
        matches!(self, BridgeError::QuotaExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
