//! Error types and handling
//!
//! Common error types used across the application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::recorder::SessionError;
use crate::schedule::ScheduleError;
use crate::upload::UploadError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Error response for frontend
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Capture(CaptureError::PermissionDenied(_))
            | AppError::Session(SessionError::Capture(CaptureError::PermissionDenied(_))) => {
                "PERMISSION_DENIED"
            }
            AppError::Capture(CaptureError::DeviceUnavailable(_))
            | AppError::Session(SessionError::Capture(CaptureError::DeviceUnavailable(_))) => {
                "DEVICE_UNAVAILABLE"
            }
            AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Session(_) => "SESSION_ERROR",
            AppError::Upload(_) => "UPLOAD_ERROR",
            AppError::Schedule(_) => "SCHEDULE_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(error: SessionError) -> Self {
        AppError::from(error).into()
    }
}

impl From<ScheduleError> for ErrorResponse {
    fn from(error: ScheduleError) -> Self {
        AppError::from(error).into()
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
