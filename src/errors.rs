use serde::{Deserialize, Serialize};
use std::fmt;

/// Application-wide error types with categories for better error handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// Microphone access was denied by the OS/user
    PermissionDenied(String),

    /// No usable capture device, or the device failed mid-stream
    DeviceUnavailable(String),

    /// Selected file is not an image
    InvalidFileType(String),

    /// Submission rejected before any network I/O (empty prompt, no media)
    InvalidRequest(String),

    /// Connection could not be established or was interrupted
    Network(String),

    /// Response body was not valid JSON
    Decode(String),

    /// The generation service reported an explicit failure
    Service(String),

    /// Settings/attachment file I/O errors
    Storage(String),

    /// Generic errors that don't fit other categories
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::PermissionDenied(msg) => write!(f, "Permission Denied: {}", msg),
            AppError::DeviceUnavailable(msg) => write!(f, "Device Unavailable: {}", msg),
            AppError::InvalidFileType(msg) => write!(f, "Invalid File Type: {}", msg),
            AppError::InvalidRequest(msg) => write!(f, "Invalid Request: {}", msg),
            AppError::Network(msg) => write!(f, "Network Error: {}", msg),
            AppError::Decode(msg) => write!(f, "Decode Error: {}", msg),
            AppError::Service(msg) => write!(f, "Service Error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage Error: {}", msg),
            AppError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Returns a user-friendly title for the error
    pub fn title(&self) -> &str {
        match self {
            AppError::PermissionDenied(_) => "Microphone Access Denied",
            AppError::DeviceUnavailable(_) => "Capture Device Issue",
            AppError::InvalidFileType(_) => "Not an Image",
            AppError::InvalidRequest(_) => "Nothing to Generate",
            AppError::Network(_) => "Network Problem",
            AppError::Decode(_) => "Unexpected Response",
            AppError::Service(_) => "Generation Failed",
            AppError::Storage(_) => "Storage Error",
            AppError::Other(_) => "Error",
        }
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        match self {
            AppError::PermissionDenied(msg)
            | AppError::DeviceUnavailable(msg)
            | AppError::InvalidFileType(msg)
            | AppError::InvalidRequest(msg)
            | AppError::Network(msg)
            | AppError::Decode(msg)
            | AppError::Service(msg)
            | AppError::Storage(msg)
            | AppError::Other(msg) => msg,
        }
    }

    /// Returns a suggested action for the user
    #[allow(dead_code)]
    pub fn suggested_action(&self) -> Option<&str> {
        match self {
            AppError::PermissionDenied(_) => {
                Some("Allow microphone access in your system settings and try again")
            }
            AppError::DeviceUnavailable(_) => Some("Check your microphone connection"),
            AppError::InvalidFileType(_) => Some("Choose a PNG, JPEG, GIF, WebP or BMP file"),
            AppError::InvalidRequest(_) => {
                Some("Enter a prompt, record audio or attach an image first")
            }
            AppError::Network(_) => Some("Check that the generation service is running"),
            AppError::Decode(_) => Some("The service may be outdated; check its logs"),
            AppError::Service(_) => Some("Try a different prompt"),
            AppError::Storage(_) => Some("Check disk space and permissions"),
            AppError::Other(_) => None,
        }
    }
}

/// Convert from String to AppError::Other
impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::Other(error)
    }
}

/// Convert from &str to AppError::Other
impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::Other(error.to_string())
    }
}

/// Error event payload sent to the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error: AppError,
    pub timestamp: u64,
    pub context: Option<String>,
}

impl ErrorEvent {
    pub fn new(error: AppError) -> Self {
        Self {
            error,
            timestamp: crate::util::now_ms(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::DeviceUnavailable("No input device".to_string());
        assert_eq!(err.to_string(), "Device Unavailable: No input device");
    }

    #[test]
    fn test_error_title() {
        let err = AppError::InvalidRequest("empty".to_string());
        assert_eq!(err.title(), "Nothing to Generate");
    }

    #[test]
    fn test_from_string() {
        let err: AppError = "test error".into();
        assert!(matches!(err, AppError::Other(_)));
    }

    #[test]
    fn test_error_event() {
        let event = ErrorEvent::new(AppError::Network("Connection refused".to_string()))
            .with_context("Generate");

        assert!(event.context.is_some());
        assert_eq!(event.context.unwrap(), "Generate");
    }

    #[test]
    fn test_serde_tagging() {
        let err = AppError::InvalidFileType("report.pdf".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "InvalidFileType");
        assert_eq!(json["message"], "report.pdf");
    }
}
