//! Emulator discovery and reconnect supervision over PINE.
//!
//! A [`Session`] probes the known targets in order, keeps the first that
//! answers as its active connection and funnels every exchange through it.
//! The [`Supervisor`] thread brings the session back whenever an exchange
//! fails at the transport level.

pub mod emulator;
pub mod error;
pub mod session;
pub mod supervisor;

pub use emulator::{
    EmulatorHandle, EmulatorProfile, EmulatorStatus, EmulatorStopper, StubEmulator,
};
pub use error::{Result, SessionError};
pub use session::{Session, SessionConfig, SessionState, DEFAULT_RETRY_INTERVAL};
pub use supervisor::{Supervisor, SupervisorHandle};
