//! Stream error types.
//!
//! This module defines the errors that can occur while talking to the
//! messaging substrate.

use thiserror::Error;

/// Errors that can occur during stream operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The substrate could not be reached, or the connection dropped or timed out.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The substrate rejected or failed a command.
    #[error("Command error: {0}")]
    CommandError(String),

    /// The consumer group being created already exists.
    #[error("Consumer group already exists: {0}")]
    GroupExists(String),

    /// The stream or consumer group does not exist.
    #[error("No such consumer group: {0}")]
    NoSuchGroup(String),

    /// A reply could not be converted into the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl StreamError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a command error.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::CommandError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StreamError::ConnectionError(_) => true,
            StreamError::CommandError(msg) => {
                // LOADING / BUSY / TRYAGAIN replies clear up on their own
                let msg = msg.to_uppercase();
                msg.contains("LOADING") || msg.contains("BUSY") || msg.contains("TRYAGAIN")
            }
            StreamError::GroupExists(_)
            | StreamError::NoSuchGroup(_)
            | StreamError::ParseError(_) => false,
        }
    }
}

impl From<redis::RedisError> for StreamError {
    fn from(err: redis::RedisError) -> Self {
        match err.code() {
            Some("BUSYGROUP") => return Self::GroupExists(err.to_string()),
            Some("NOGROUP") => return Self::NoSuchGroup(err.to_string()),
            _ => {}
        }

        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            Self::ConnectionError(err.to_string())
        } else {
            Self::CommandError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::{ErrorKind, RedisError};

    #[test]
    fn test_io_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = StreamError::from(RedisError::from(io));
        assert!(matches!(err, StreamError::ConnectionError(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_type_errors_are_permanent() {
        let err = StreamError::from(RedisError::from((ErrorKind::TypeError, "unexpected reply")));
        assert!(matches!(err, StreamError::CommandError(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_loading_reply_is_transient() {
        let err = StreamError::command("LOADING Redis is loading the dataset in memory");
        assert!(err.is_transient());
        assert!(!StreamError::GroupExists("enricher".to_string()).is_transient());
    }
}
