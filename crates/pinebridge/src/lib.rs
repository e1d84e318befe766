//! Bridge to emulators speaking the PINE IPC protocol.
//!
//! pinebridge discovers a running PCSX2 or RPCS3 instance, keeps a
//! connection to it alive and turns named operations with string parameters
//! into PINE request/answer exchanges.
//!
//! # Crate Structure
//!
//! - [`transport`]: Endpoint resolution and serialized exchanges (UDS, loopback TCP)
//! - [`frame`]: Opcode catalog and request/answer frame codec
//! - [`session`]: Target discovery, reconnect supervision and a stub emulator

/// Re-export transport types.
pub mod transport {
    pub use pine_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pine_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use pine_session::*;
}
