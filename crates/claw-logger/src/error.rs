//! Error types for the logging pipeline.
//!
//! Rendering, filtering, dispatch and panic capture never fail; only sink
//! setup and configuration loading surface errors to the caller.

use thiserror::Error;

/// Errors that can occur while setting up the logging pipeline.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// A sink could not be initialized at registration time.
    #[error("sink {sink} failed to initialize: {reason}")]
    SinkInit {
        /// Name of the sink that failed.
        sink: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be interpreted.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stack dump contained no recognizable frames.
    #[error("unparseable stack dump: {0}")]
    StackParse(String),
}

impl LoggerError {
    /// Creates a sink initialization error.
    #[must_use]
    pub fn sink_init(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SinkInit {
            sink: sink.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for logger operations.
pub type Result<T> = std::result::Result<T, LoggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = LoggerError::sink_init("stderr", "closed");
        assert_eq!(err.to_string(), "sink stderr failed to initialize: closed");

        let err = LoggerError::InvalidConfig("bad format".to_string());
        assert_eq!(err.to_string(), "invalid configuration: bad format");

        let err = LoggerError::StackParse("no frames".to_string());
        assert_eq!(err.to_string(), "unparseable stack dump: no frames");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LoggerError>();
    }

    #[test]
    fn error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: LoggerError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn error_serialization_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").err();
        assert!(json_err.is_some());
        if let Some(json_err) = json_err {
            let err: LoggerError = json_err.into();
            assert!(err.to_string().starts_with("serialization error"));
        }
    }
}
