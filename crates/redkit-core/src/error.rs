//! Error types for store operations
//!
//! Every fallible operation in redkit returns [`RedkitResult`]. The variants
//! separate failures the caller can fix (configuration, arguments, payloads)
//! from failures of the connection and of the store itself.

use std::error::Error as StdError;

use thiserror::Error;

/// Result type for redkit operations
pub type RedkitResult<T> = Result<T, RedkitError>;

/// Errors that can occur while configuring, connecting or issuing commands
#[derive(Error, Debug)]
pub enum RedkitError {
    /// Connection settings are missing or invalid
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The shared connection could not be established or is disconnected
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A required argument failed validation before dispatch
    #[error("Invalid argument '{name}': {reason}")]
    Argument { name: &'static str, reason: String },

    /// A payload could not be converted to or from the target type
    #[error("Serialization failed for {type_name}: {source}")]
    Serialization {
        type_name: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Failure reported by the store or the client library, passed through as-is
    #[error(transparent)]
    Store(#[from] redis::RedisError),

    /// The operation was cancelled before it was dispatched
    #[error("Operation cancelled before dispatch")]
    Cancelled,
}

impl RedkitError {
    /// Build an argument error
    pub fn argument(name: &'static str, reason: impl Into<String>) -> Self {
        RedkitError::Argument {
            name,
            reason: reason.into(),
        }
    }

    /// Wrap a serializer failure for type `T`
    pub fn serialization<T, E>(source: E) -> Self
    where
        T: ?Sized,
        E: StdError + Send + Sync + 'static,
    {
        RedkitError::Serialization {
            type_name: std::any::type_name::<T>(),
            source: Box::new(source),
        }
    }

    /// The connection-level error raised when a disconnected handle is requested
    pub fn disconnected() -> Self {
        RedkitError::Connection("cannot connect to store".to_string())
    }

    /// The underlying store error, if this is one
    pub fn as_store_error(&self) -> Option<&redis::RedisError> {
        match self {
            RedkitError::Store(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the error was raised by argument validation
    pub fn is_argument_error(&self) -> bool {
        matches!(self, RedkitError::Argument { .. })
    }
}

/// Fail with an argument error when a required key is empty
pub fn require_key(name: &'static str, key: &str) -> RedkitResult<()> {
    if key.is_empty() {
        return Err(RedkitError::argument(name, "key cannot be empty"));
    }
    Ok(())
}
