//! Error types for the strand job scheduler.

use std::any::Any;

use thiserror::Error;

/// Result type alias using strand's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for scheduler and persistence operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Persistence adapter failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Best-effort text of a caught panic payload.
pub fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_job_not_found() {
        let err = Error::JobNotFound("job_abc".to_string());
        assert_eq!(err.to_string(), "Job not found: job_abc");
    }

    #[test]
    fn test_error_display_persistence() {
        let err = Error::Persistence("store offline".to_string());
        assert_eq!(err.to_string(), "Persistence error: store offline");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("bad poll interval".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad poll interval");
    }

    #[test]
    fn test_error_display_internal() {
        let err = Error::Internal("unexpected state".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_describe_panic_payloads() {
        let static_msg = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(describe_panic(static_msg.as_ref()), "boom");

        let owned = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(describe_panic(owned.as_ref()), "code 7");

        let other = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(describe_panic(other.as_ref()), "unknown panic");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
