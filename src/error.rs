use serde::Deserialize;
use thiserror::Error;

/// Failures while turning wire bytes into a [`crate::QueryResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("unknown query result variant: {0}")]
    UnknownVariant(String),

    #[error("bad timestamp: {0}")]
    BadTimestamp(String),

    #[error("malformed JSON: {0}")]
    MalformedJson(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::MalformedJson(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("breakdownKey and groupBy cannot both be set")]
    ConflictingGrouping,
    #[error("rollingWindowSize must be finite and span at most 100 years")]
    WindowOutOfRange,
    #[error("invalid number format: {0}")]
    InvalidNumberFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("insufficient data to build a chart")]
    InsufficientData,
}

/// Errors surfaced to callers of the network layer. `Display` is the
/// message shown to end users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("There was a communication error with the server. Please check your internet connection and try again later.")]
    TransferFailed,

    #[error("The server returned a message that this version of the app could not decode. Please check if there is an update to the app, or contact the developer.")]
    DecodeFailed,

    #[error("The server returned this error message: {0}")]
    ServerError(String),
}

#[derive(Debug, Deserialize)]
struct ServerErrorDetailMessage {
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ServerErrorReasonMessage {
    reason: String,
}

impl TransferError {
    /// Builds a `ServerError` from an error response body. Servers answer
    /// with either `{"detail": ..}` or `{"reason": ..}`; anything else is a
    /// body we cannot read.
    pub fn from_server_body(body: &[u8]) -> Self {
        if let Ok(message) = serde_json::from_slice::<ServerErrorDetailMessage>(body) {
            return TransferError::ServerError(message.detail);
        }
        if let Ok(message) = serde_json::from_slice::<ServerErrorReasonMessage>(body) {
            return TransferError::ServerError(message.reason);
        }
        TransferError::DecodeFailed
    }
}

impl From<DecodeError> for TransferError {
    fn from(_: DecodeError) -> Self {
        TransferError::DecodeFailed
    }
}

#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for InsightsError {
    fn from(err: serde_json::Error) -> Self {
        InsightsError::Serialization(err.to_string())
    }
}

impl From<prometheus::Error> for InsightsError {
    fn from(err: prometheus::Error) -> Self {
        InsightsError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
