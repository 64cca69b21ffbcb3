use thiserror::Error;

pub type Result<T> = std::result::Result<T, SettlementError>;

/// Stable classification of a [`SettlementError`], independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUsage,
    NotFound,
    Unauthorized,
    Internal,
}

#[derive(Error, Debug)]
pub enum SettlementError {
    /// Caller-correctable precondition failure.
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

impl SettlementError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidUsage(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into().into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUsage(_) => ErrorKind::InvalidUsage,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            _ => ErrorKind::Internal,
        }
    }
}

/// Failure reported by an exchange-rate provider.
///
/// The currency converter never propagates these; they are logged and replaced
/// by the fallback rate.
#[derive(Error, Debug)]
pub enum RateProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Exchange rate API error: {0}")]
    Api(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Failure reported by an SMS gateway. Always swallowed by the dispatcher.
#[derive(Error, Debug)]
#[error("SMS delivery failed: {0}")]
pub struct SmsError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            SettlementError::invalid("Insufficient funds").kind(),
            ErrorKind::InvalidUsage
        );
        assert_eq!(
            SettlementError::not_found("goal").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SettlementError::internal("boom").kind(),
            ErrorKind::Internal
        );
        let io: SettlementError = std::io::Error::other("disk").into();
        assert_eq!(io.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_messages_are_human_readable() {
        let err = SettlementError::invalid("Cannot send money to yourself.");
        assert_eq!(
            err.to_string(),
            "Invalid usage: Cannot send money to yourself."
        );
    }
}
