use thiserror::Error;

/// Bad input to an API call.  Raised before anything touches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid message uuid: {0:?}")]
    InvalidUuid(String),

    #[error("Invalid time parameter: {0}")]
    InvalidTime(String),

    #[error("Message text must not be empty")]
    EmptyText,
}
