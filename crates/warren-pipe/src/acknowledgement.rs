//! Outcome of handling one delivered message.

use std::fmt;

/// What the broker should do with a delivery once its handler has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Processed; remove the message.
    Ack,
    /// Processing failed; redeliver or drop according to `requeue`.
    Nack { requeue: bool },
    /// The message is unprocessable; discard or requeue according to `requeue`.
    Reject { requeue: bool },
}

impl Acknowledgement {
    pub fn nack(requeue: bool) -> Self {
        Self::Nack { requeue }
    }

    pub fn reject(requeue: bool) -> Self {
        Self::Reject { requeue }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}

impl fmt::Display for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("ack"),
            Self::Nack { requeue } => write!(f, "nack (requeue: {requeue})"),
            Self::Reject { requeue } => write!(f, "reject (requeue: {requeue})"),
        }
    }
}
