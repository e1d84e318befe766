use crate::error::{Result, TransportError};
use crate::resolver::{Endpoint, TransportDescriptor};
use crate::stream::IpcStream;
use crate::tcp::LoopbackPort;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// The listening side of a PINE endpoint, as an emulator would expose it.
pub enum PineListener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(LoopbackPort),
}

impl PineListener {
    /// Bind the descriptor's primary endpoint.
    pub fn bind(descriptor: &TransportDescriptor) -> Result<Self> {
        Self::bind_endpoint(descriptor.primary())
    }

    /// Bind a specific endpoint.
    pub fn bind_endpoint(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Socket(path) => UnixDomainSocket::bind(path).map(PineListener::Unix),
            #[cfg(not(unix))]
            Endpoint::Socket(path) => Err(TransportError::Bind {
                address: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
            Endpoint::Loopback(addr) if addr.ip().is_loopback() => {
                LoopbackPort::bind(addr.port()).map(PineListener::Tcp)
            }
            Endpoint::Loopback(addr) => Err(TransportError::Bind {
                address: addr.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "only loopback addresses can be bound",
                ),
            }),
        }
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        match self {
            #[cfg(unix)]
            PineListener::Unix(socket) => socket.accept(),
            PineListener::Tcp(port) => port.accept(),
        }
    }

    /// The endpoint clients should dial.
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            PineListener::Unix(socket) => Endpoint::Socket(socket.path().to_path_buf()),
            PineListener::Tcp(port) => Endpoint::Loopback(port.local_addr()),
        }
    }
}

impl std::fmt::Debug for PineListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineListener")
            .field("endpoint", &self.local_endpoint().to_string())
            .finish()
    }
}
