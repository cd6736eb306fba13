//! Error types for pipeline execution.

use thiserror::Error;
use warren_channel::ChannelError;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipeError>;

/// Errors that abort an operation's middleware chain.
#[derive(Debug, Error)]
pub enum PipeError {
    /// A required context entry or configuration could not be resolved.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// The acknowledgement produced for a delivery cannot be dispatched.
    #[error("unsupported acknowledgement: {0}")]
    UnsupportedAcknowledgement(String),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// A state machine could not be loaded or created.
    #[error("state machine activation failed: {0}")]
    Activation(String),

    /// A middleware step failed for a reason of its own.
    #[error("middleware '{middleware}' failed: {message}")]
    Middleware { middleware: String, message: String },

    /// Acquiring or using a broker channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl PipeError {
    pub fn configuration_missing(what: impl Into<String>) -> Self {
        Self::ConfigurationMissing(what.into())
    }

    pub fn unsupported_acknowledgement(msg: impl Into<String>) -> Self {
        Self::UnsupportedAcknowledgement(msg.into())
    }

    pub fn activation(msg: impl Into<String>) -> Self {
        Self::Activation(msg.into())
    }

    pub fn middleware(middleware: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Middleware {
            middleware: middleware.into(),
            message: message.into(),
        }
    }

    /// True for cancellation raised by the pipeline or by a channel wait.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Channel(ChannelError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_errors_convert() {
        let err: PipeError = ChannelError::availability("closed").into();
        assert!(matches!(err, PipeError::Channel(ChannelError::ChannelAvailability(_))));
        assert_eq!(err.to_string(), "channel unavailable: closed");
    }

    #[test]
    fn test_is_cancelled() {
        assert!(PipeError::Cancelled.is_cancelled());
        assert!(PipeError::from(ChannelError::Cancelled).is_cancelled());
        assert!(!PipeError::configuration_missing("MessageType").is_cancelled());
    }
}
