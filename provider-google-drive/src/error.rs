//! Error types for Google Drive provider

use crate::types::ApiErrorResponse;
use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Reasons Drive attaches to rate-limit and quota responses
const QUOTA_REASONS: &[&str] = &[
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
    "sharingRateLimitExceeded",
];

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Token missing, expired or rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Request refused for lack of access
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limit or usage quota hit
    #[error("Rate limit exceeded ({reason})")]
    RateLimitExceeded { reason: String },

    /// Target does not exist (or is not visible to the credential)
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Any other API error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Resumable upload protocol violation
    #[error("Upload failed: {0}")]
    UploadError(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

impl GoogleDriveError {
    /// Classifies a non-success response.
    ///
    /// `target` names what the request addressed and ends up in not-found errors.
    pub fn from_response(status: u16, body: &[u8], target: &str) -> Self {
        let parsed = serde_json::from_slice::<ApiErrorResponse>(body).ok();
        let reason = parsed
            .as_ref()
            .and_then(|r| r.error.reason())
            .map(str::to_string);
        let message = parsed
            .as_ref()
            .map(|r| r.error.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

        match status {
            401 => GoogleDriveError::AuthenticationFailed(message),
            429 => GoogleDriveError::RateLimitExceeded {
                reason: reason.unwrap_or_else(|| "rateLimitExceeded".to_string()),
            },
            403 => match reason {
                Some(reason) if QUOTA_REASONS.contains(&reason.as_str()) => {
                    GoogleDriveError::RateLimitExceeded { reason }
                }
                _ => GoogleDriveError::PermissionDenied(message),
            },
            404 => GoogleDriveError::FileNotFound {
                file_id: target.to_string(),
            },
            _ => GoogleDriveError::ApiError {
                status_code: status,
                message,
            },
        }
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            GoogleDriveError::PermissionDenied(msg) => BridgeError::PermissionDenied(msg),
            GoogleDriveError::RateLimitExceeded { reason } => BridgeError::QuotaExceeded(reason),
            GoogleDriveError::FileNotFound { file_id } => BridgeError::NotFound(file_id),
            GoogleDriveError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
