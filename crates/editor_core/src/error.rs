use std::io;

use thiserror::Error;

use crate::session::{Operation, Phase};

const MAX_ERROR_BODY_CHARS: usize = 256;

/// Failure of a single call to the processing service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid service url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request to processing service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("processing service responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response from processing service: {0}")]
    UnexpectedResponse(String),
}

impl ServiceError {
    pub fn status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!("{truncated}...")
        } else {
            body.to_string()
        };
        Self::Status { status, body }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse(message.into())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("cannot {operation} while {phase}")]
    Busy { operation: Operation, phase: Phase },
    #[error("{operation} failed: {source}")]
    RemoteCall {
        operation: Operation,
        #[source]
        source: ServiceError,
    },
    #[error("{operation} returned an unexpected response: {message}")]
    UnexpectedResponse { operation: Operation, message: String },
    #[error("failed to save {file_name}: {source}")]
    Save {
        file_name: String,
        #[source]
        source: io::Error,
    },
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classifies a service failure; a 2xx reply with a bad body is not a
    /// remote-call failure.
    pub fn from_service(operation: Operation, err: ServiceError) -> Self {
        match err {
            ServiceError::UnexpectedResponse(message) => {
                Self::UnexpectedResponse { operation, message }
            }
            source => Self::RemoteCall { operation, source },
        }
    }

    /// HTTP status of a rejected remote call, if the service answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::RemoteCall {
                source: ServiceError::Status { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}
