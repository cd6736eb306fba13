//! Channel and connection error types.

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors raised while acquiring or using broker channels.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// No configured host accepted the connection.
    #[error("broker unreachable: {0}")]
    BrokerUnreachable(String),

    /// The connection or channel is closed and will not come back on its own.
    #[error("channel unavailable: {0}")]
    ChannelAvailability(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// A broker call failed.
    #[error("broker operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },
}

impl ChannelError {
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::BrokerUnreachable(msg.into())
    }

    pub fn availability(msg: impl Into<String>) -> Self {
        Self::ChannelAvailability(msg.into())
    }

    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ChannelError::availability("connection closed").to_string(),
            "channel unavailable: connection closed"
        );
        assert_eq!(
            ChannelError::operation("basic.ack", "channel closed").to_string(),
            "broker operation 'basic.ack' failed: channel closed"
        );
        assert!(ChannelError::Cancelled.is_cancelled());
    }
}
