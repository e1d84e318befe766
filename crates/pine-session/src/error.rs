use pine_frame::FrameError;
use pine_transport::TransportError;

/// Errors that can occur while driving a PINE session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// No emulator connection is active.
    #[error("not connected to any emulator")]
    NotConnected,
}

impl SessionError {
    /// True for dial, I/O and timeout failures, as opposed to bad input.
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Transport(err) if !err.is_configuration())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
