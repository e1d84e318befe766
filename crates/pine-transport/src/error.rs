use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while resolving or using a PINE transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An empty target name was supplied.
    #[error("invalid target: target name must not be empty")]
    InvalidTarget,

    /// The target has no registered default slot.
    #[error("unknown target \"{target}\" (supported targets: {})", known.join(", "))]
    UnknownTarget {
        target: String,
        known: Vec<&'static str>,
    },

    /// No transport kind is defined for the host platform.
    #[error("no PINE transport is available on platform \"{0}\"")]
    UnsupportedPlatform(&'static str),

    /// Failed to bind a listener to the specified address.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Failed to connect to any candidate address.
    #[error("connection failed for target \"{target}\" at {address}: {source}")]
    Connect {
        target: String,
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer kept sending past the answer size limit.
    #[error("answer exceeds {limit} bytes")]
    AnswerTooLarge { limit: usize },

    /// The exchange did not complete before its deadline.
    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {}", path.display())]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// True for errors caused by configuration rather than the peer.
    ///
    /// These are never worth retrying against the same inputs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TransportError::InvalidTarget
                | TransportError::UnknownTarget { .. }
                | TransportError::UnsupportedPlatform(_)
                | TransportError::PathTooLong { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
