use std::fmt;

use thiserror::Error;
use tribe_shared::ValidationError;

/// The remote operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchAllMessages,
    FetchLatestMessages,
    FetchOlderMessages,
    FetchParticipants,
    SendMessage,
    FetchMessageUpdates,
    FetchParticipantUpdates,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FetchAllMessages => "fetch all messages",
            Operation::FetchLatestMessages => "fetch latest messages",
            Operation::FetchOlderMessages => "fetch older messages",
            Operation::FetchParticipants => "fetch participants",
            Operation::SendMessage => "send message",
            Operation::FetchMessageUpdates => "fetch message updates",
            Operation::FetchParticipantUpdates => "fetch participant updates",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the HTTP collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Rejected locally; no request was sent.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The server answered with a non-2xx status.
    #[error("Failed to {operation}: HTTP {status}")]
    Http { operation: Operation, status: u16 },

    /// Transport-level failure (DNS, connect, timeout, reset).
    #[error("Network error in {operation}: {message}")]
    Network { operation: Operation, message: String },

    /// The response body was not the JSON we expected.
    #[error("Invalid response in {operation}: {message}")]
    Decode { operation: Operation, message: String },

    /// The client itself could not be built.
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ApiError::Http { operation, .. }
            | ApiError::Network { operation, .. }
            | ApiError::Decode { operation, .. } => Some(*operation),
            ApiError::Validation(_) | ApiError::Config(_) => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
