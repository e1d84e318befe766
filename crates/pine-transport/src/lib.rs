//! PINE endpoint resolution and transport.
//!
//! Emulators speaking PINE listen on:
//! - a Unix domain socket `<runtime-dir>/<target>.sock.<slot>` (Linux/macOS)
//! - a loopback TCP port `127.0.0.1:<slot>` (Windows)
//!
//! This is the lowest layer of pinebridge. [`Resolver`] turns a target and
//! slot into a [`TransportDescriptor`]; [`Connection`] performs one
//! serialized, deadline-bound request/answer exchange against it.

pub mod connection;
pub mod error;
pub mod listener;
pub mod resolver;
pub mod stream;
pub mod target;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use connection::{
    dial_endpoint, Connection, ConnectionConfig, ExchangeLock, DEFAULT_EXCHANGE_TIMEOUT,
    DEFAULT_MAX_ANSWER_LEN,
};
pub use error::{Result, TransportError};
pub use listener::PineListener;
pub use resolver::{
    Endpoint, Platform, Resolver, TransportDescriptor, TransportKind, FALLBACK_SOCKET_DIR,
};
pub use stream::IpcStream;
pub use target::{Target, KNOWN_TARGETS, PCSX2, RPCS3};
pub use tcp::LoopbackPort;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
