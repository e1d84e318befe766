use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;

/// Loopback TCP transport, used where PINE listens on `127.0.0.1:<slot>`.
pub struct LoopbackPort {
    listener: TcpListener,
    addr: SocketAddr,
}

impl LoopbackPort {
    /// Bind to `127.0.0.1:<port>`. Port 0 picks an ephemeral port.
    pub fn bind(port: u16) -> Result<Self> {
        let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let bind_err = |source| TransportError::Bind {
            address: requested.to_string(),
            source,
        };
        let listener = TcpListener::bind(requested).map_err(bind_err)?;
        let addr = listener.local_addr().map_err(bind_err)?;
        info!(%addr, "listening on loopback port");
        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(IpcStream::from_tcp(stream))
    }

    /// Connect to a loopback port, giving up after `timeout`.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> std::io::Result<IpcStream> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected to loopback port");
        Ok(IpcStream::from_tcp(stream))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
