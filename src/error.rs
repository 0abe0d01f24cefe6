// src/error.rs - Error taxonomy for the redirector
use thiserror::Error;
use warp::http::{header::CONTENT_TYPE, StatusCode};
use warp::Reply;

/// Main redirector error type
#[derive(Error, Debug, Clone)]
pub enum RedirectorError {
    // Input errors
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    InvalidBody { message: String },

    #[error("URL with id {id} not found")]
    NotFound { id: i64 },

    // Storage errors
    #[error("{message}")]
    Store { message: String },

    // Forwarding errors
    #[error("Error making request to target endpoint: {message}")]
    ProxyTransport { message: String },

    #[error("Error parsing target URL: {url}")]
    InvalidDestination { url: String },

    #[error("No URL is currently selected")]
    NoSelection,

    // Process errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Server error: {message}")]
    Server { message: String },
}

/// Result type alias for redirector operations
pub type Result<T> = std::result::Result<T, RedirectorError>;

impl RedirectorError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            RedirectorError::Validation { .. }
            | RedirectorError::InvalidBody { .. }
            | RedirectorError::NotFound { .. } => ErrorCategory::Request,

            RedirectorError::Store { .. } => ErrorCategory::Store,

            RedirectorError::ProxyTransport { .. }
            | RedirectorError::InvalidDestination { .. }
            | RedirectorError::NoSelection => ErrorCategory::Forwarding,

            RedirectorError::Config { .. } => ErrorCategory::Configuration,

            RedirectorError::Server { .. } => ErrorCategory::Server,
        }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            RedirectorError::Validation { .. }
            | RedirectorError::InvalidBody { .. }
            | RedirectorError::NotFound { .. } => 400, // Bad Request

            RedirectorError::Store { .. }
            | RedirectorError::ProxyTransport { .. }
            | RedirectorError::InvalidDestination { .. }
            | RedirectorError::NoSelection
            | RedirectorError::Config { .. }
            | RedirectorError::Server { .. } => 500, // Internal Server Error
        }
    }

    /// Get the log level for this error
    pub fn log_level(&self) -> LogLevel {
        match self {
            RedirectorError::Store { .. }
            | RedirectorError::Config { .. }
            | RedirectorError::Server { .. } => LogLevel::Error,

            RedirectorError::ProxyTransport { .. }
            | RedirectorError::InvalidDestination { .. }
            | RedirectorError::NoSelection => LogLevel::Warn,

            RedirectorError::NotFound { .. } => LogLevel::Info,

            RedirectorError::Validation { .. } | RedirectorError::InvalidBody { .. } => {
                LogLevel::Debug
            }
        }
    }

    /// Log the error at its own level and render it as a plain-text HTTP reply.
    ///
    /// The message is returned to the caller as-is, internal store text included.
    pub fn into_response(self) -> warp::reply::Response {
        let message = format!("{} [Category: {:?}]", self, self.category());
        match self.log_level() {
            LogLevel::Error => tracing::error!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Debug => tracing::debug!("{}", message),
        }

        let status =
            StatusCode::from_u16(self.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let reply = warp::reply::with_status(self.to_string(), status);
        warp::reply::with_header(reply, CONTENT_TYPE, "text/plain; charset=utf-8").into_response()
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Store,
    Forwarding,
    Configuration,
    Server,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

/// Conversion implementations from common error types
impl From<sqlx::Error> for RedirectorError {
    fn from(err: sqlx::Error) -> Self {
        RedirectorError::Store {
            message: err.to_string(),
        }
    }
}

impl From<hyper::Error> for RedirectorError {
    fn from(err: hyper::Error) -> Self {
        RedirectorError::ProxyTransport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RedirectorError {
    fn from(err: serde_json::Error) -> Self {
        RedirectorError::InvalidBody {
            message: err.to_string(),
        }
    }
}

/// Utility functions for error handling
pub mod utils {
    use super::*;

    /// Create a validation error
    pub fn validation_error<S: Into<String>>(message: S) -> RedirectorError {
        RedirectorError::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error<S: Into<String>>(message: S) -> RedirectorError {
        RedirectorError::Config {
            message: message.into(),
        }
    }

    /// Create a server error
    pub fn server_error<S: Into<String>>(message: S) -> RedirectorError {
        RedirectorError::Server {
            message: message.into(),
        }
    }
}
