//! Error types for the UECS-CCM bridge
//!
//! Decode failures on the wire never surface here: the codec's contract is
//! to yield zero packets on malformed input. Everything the caller can be
//! blamed for comes back as a validation variant with a human-readable
//! reason; transport problems carry the underlying I/O error.

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, CcmError>;

/// Error types for UECS-CCM bridge operations
#[derive(Error, Debug)]
pub enum CcmError {
    /// Configuration errors (bad file, unparseable section)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input errors (disallowed actuator, duration cap, bad request)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Minimum send interval not yet elapsed
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CcmError {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limit<S: Into<String>>(msg: S) -> Self {
        Self::RateLimit(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors caused by the caller's request rather than the bridge
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::RateLimit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_predicate_covers_caller_faults_only() {
        assert!(CcmError::invalid_input("bad actuator").is_validation());
        assert!(CcmError::rate_limit("too soon").is_validation());
        assert!(!CcmError::config("bad file").is_validation());
        assert!(!CcmError::Io(std::io::Error::other("socket")).is_validation());
    }
}
