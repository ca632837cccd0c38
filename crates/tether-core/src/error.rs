use thiserror::Error;

/// Top-level error type for the Tether system.
///
/// Subsystem crates define their own error types and implement
/// `From<TetherError>` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TetherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

/// Errors raised by a persistent stack implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store is not open")]
    NotOpen,

    #[error("Store is already open at {0}")]
    AlreadyOpen(String),

    #[error("Invalid store location: {0}")]
    InvalidLocation(String),

    #[error("Model mismatch: expected {expected}, found {found}")]
    ModelMismatch { expected: String, found: String },
}

impl From<toml::de::Error> for TetherError {
    fn from(err: toml::de::Error) -> Self {
        TetherError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TetherError {
    fn from(err: toml::ser::Error) -> Self {
        TetherError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        TetherError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tether operations.
pub type Result<T> = std::result::Result<T, TetherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TetherError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
        assert_eq!(TetherError::ShuttingDown.to_string(), "Shutdown in progress");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TetherError = io_err.into();
        assert!(matches!(err, TetherError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: TetherError = err.unwrap_err().into();
        assert!(matches!(err, TetherError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: TetherError = err.unwrap_err().into();
        assert!(matches!(err, TetherError::Serialization(_)));
    }

    #[test]
    fn test_store_error_conversion() {
        let err: TetherError = StoreError::NotOpen.into();
        assert!(matches!(err, TetherError::Store(StoreError::NotOpen)));
        assert_eq!(err.to_string(), "Store error: Store is not open");
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::ModelMismatch {
            expected: "ledger v2".to_string(),
            found: "ledger v1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Model mismatch: expected ledger v2, found ledger v1"
        );
        assert_eq!(
            StoreError::AlreadyOpen("memory".to_string()).to_string(),
            "Store is already open at memory"
        );
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
