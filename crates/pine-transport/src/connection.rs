use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::resolver::{Endpoint, TransportDescriptor};
use crate::stream::IpcStream;
use crate::tcp::LoopbackPort;

/// Deadline covering dial, write and read of a single exchange.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Largest answer accepted by default. Fixed-size answers are at most 13
/// bytes; the rest of the budget is for identity strings.
pub const DEFAULT_MAX_ANSWER_LEN: usize = 64 * 1024;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Configuration for [`Connection`] exchanges.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Absolute time budget for one exchange, from dial to end-of-stream.
    pub exchange_timeout: Duration,
    /// Answers growing past this many bytes abort the exchange.
    pub max_answer_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            max_answer_len: DEFAULT_MAX_ANSWER_LEN,
        }
    }
}

/// Mutual exclusion shared by every [`Connection`] that talks to the same
/// emulator. Holding it means owning the only exchange in flight.
#[derive(Debug, Clone, Default)]
pub struct ExchangeLock(Arc<Mutex<()>>);

impl ExchangeLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A reusable handle on a resolved PINE endpoint.
///
/// No socket is held between calls: every [`send`](Connection::send) dials,
/// writes, half-closes, reads to end-of-stream and closes.
#[derive(Debug, Clone)]
pub struct Connection {
    descriptor: TransportDescriptor,
    config: ConnectionConfig,
    lock: ExchangeLock,
}

impl Connection {
    /// Connection with default configuration and its own exchange lock.
    pub fn new(descriptor: TransportDescriptor) -> Self {
        Self::with_config(descriptor, ConnectionConfig::default(), ExchangeLock::new())
    }

    /// Connection with explicit configuration, sharing `lock` with others.
    pub fn with_config(
        descriptor: TransportDescriptor,
        config: ConnectionConfig,
        lock: ExchangeLock,
    ) -> Self {
        Self {
            descriptor,
            config,
            lock,
        }
    }

    pub fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Dial and immediately close, without exchanging any bytes.
    pub fn probe(&self) -> Result<()> {
        let _guard = self.lock.acquire();
        let deadline = Deadline::after(self.config.exchange_timeout);
        let stream = self.dial(&deadline)?;
        drop(stream);
        Ok(())
    }

    /// Perform one request/answer exchange.
    ///
    /// Errors are returned as they occur; nothing is retried here.
    pub fn send(&self, request: &[u8]) -> Result<Vec<u8>> {
        let _guard = self.lock.acquire();
        let deadline = Deadline::after(self.config.exchange_timeout);

        let mut stream = self.dial(&deadline)?;
        trace!(len = request.len(), "writing request");
        write_all(&mut stream, request, &deadline)?;
        stream.shutdown_write()?;

        let answer = read_to_end(&mut stream, &deadline, self.config.max_answer_len)?;
        trace!(len = answer.len(), "answer received");
        Ok(answer)
    }

    fn dial(&self, deadline: &Deadline) -> Result<IpcStream> {
        let mut last_err = None;
        for endpoint in self.descriptor.candidates() {
            match dial_endpoint(endpoint, deadline.remaining()?) {
                Ok(stream) => {
                    debug!(emulator = self.descriptor.target(), %endpoint, "dialed PINE endpoint");
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%endpoint, error = %err, "dial failed");
                    last_err = Some(err);
                }
            }
        }

        let address = self
            .descriptor
            .candidates()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(TransportError::Connect {
            target: self.descriptor.target().to_string(),
            address,
            source: last_err
                .unwrap_or_else(|| std::io::Error::from(ErrorKind::AddrNotAvailable)),
        })
    }
}

/// Dial a single endpoint. `timeout` bounds TCP connects only.
pub fn dial_endpoint(endpoint: &Endpoint, timeout: Duration) -> std::io::Result<IpcStream> {
    match endpoint {
        #[cfg(unix)]
        Endpoint::Socket(path) => crate::uds::UnixDomainSocket::connect(path),
        #[cfg(not(unix))]
        Endpoint::Socket(_) => Err(std::io::Error::new(
            ErrorKind::Unsupported,
            "unix domain sockets are not available on this platform",
        )),
        Endpoint::Loopback(addr) => LoopbackPort::connect(*addr, timeout),
    }
}

struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    fn remaining(&self) -> Result<Duration> {
        let left = self.at.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(TransportError::Timeout(self.budget));
        }
        Ok(left)
    }

    fn classify(&self, err: std::io::Error) -> TransportError {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportError::Timeout(self.budget),
            _ => TransportError::Io(err),
        }
    }
}

fn write_all(stream: &mut IpcStream, mut buf: &[u8], deadline: &Deadline) -> Result<()> {
    while !buf.is_empty() {
        stream.set_write_timeout(Some(deadline.remaining()?))?;
        match stream.write(buf) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
            Ok(n) => buf = &buf[n..],
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(deadline.classify(err)),
        }
    }
    loop {
        match stream.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(deadline.classify(err)),
        }
    }
}

fn read_to_end(stream: &mut IpcStream, deadline: &Deadline, limit: usize) -> Result<Vec<u8>> {
    let mut answer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        stream.set_read_timeout(Some(deadline.remaining()?))?;
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(answer),
            Ok(n) if answer.len() + n > limit => {
                return Err(TransportError::AnswerTooLarge { limit })
            }
            Ok(n) => answer.extend_from_slice(&chunk[..n]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(deadline.classify(err)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::resolver::{Platform, Resolver};
    use crate::uds::UnixDomainSocket;

    fn unique_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pine-conn-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn serve_once(listener: UnixDomainSocket, answer: &'static [u8]) -> thread::JoinHandle<Vec<u8>> {
        thread::spawn(move || {
            let mut stream = listener.accept().expect("listener should accept");
            let mut request = Vec::new();
            stream
                .read_to_end(&mut request)
                .expect("request should be readable to eof");
            stream.write_all(answer).expect("answer should be writable");
            request
        })
    }

    #[test]
    fn send_round_trip_over_primary_path() {
        let dir = unique_dir("primary");
        let desc = Resolver::new(Platform::Linux)
            .with_runtime_dir(&dir)
            .resolve("pcsx2", 0)
            .unwrap();
        let listener = UnixDomainSocket::bind(dir.join("pcsx2.sock.28011")).unwrap();
        let server = serve_once(listener, &[5, 0, 0, 0, 0]);

        let answer = Connection::new(desc).send(&[5, 0, 0, 0, 15]).unwrap();
        assert_eq!(answer, vec![5, 0, 0, 0, 0]);
        assert_eq!(server.join().unwrap(), vec![5, 0, 0, 0, 15]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn send_falls_back_to_slotless_path() {
        let dir = unique_dir("fallback");
        let desc = Resolver::new(Platform::Linux)
            .with_runtime_dir(&dir)
            .resolve("pcsx2", 0)
            .unwrap();
        let listener = UnixDomainSocket::bind(dir.join("pcsx2.sock")).unwrap();
        let server = serve_once(listener, &[6, 0, 0, 0, 0, 0x45]);

        let answer = Connection::new(desc).send(&[9, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(answer, vec![6, 0, 0, 0, 0, 0x45]);
        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn send_without_listener_reports_connect_failure() {
        let dir = unique_dir("absent");
        let desc = Resolver::new(Platform::Linux)
            .with_runtime_dir(&dir)
            .resolve("rpcs3", 0)
            .unwrap();

        let err = Connection::new(desc).send(&[5, 0, 0, 0, 8]).unwrap_err();
        match err {
            TransportError::Connect {
                target, address, ..
            } => {
                assert_eq!(target, "rpcs3");
                assert!(address.contains("rpcs3.sock.28012"));
                assert!(address.contains(" or "));
            }
            other => panic!("expected connect error, got {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn silent_peer_hits_deadline() {
        let dir = unique_dir("deadline");
        let desc = Resolver::new(Platform::Linux)
            .with_runtime_dir(&dir)
            .resolve("pcsx2", 0)
            .unwrap();
        let listener = UnixDomainSocket::bind(dir.join("pcsx2.sock.28011")).unwrap();
        let server = thread::spawn(move || {
            let stream = listener.accept().expect("listener should accept");
            thread::sleep(Duration::from_millis(500));
            drop(stream);
        });

        let config = ConnectionConfig {
            exchange_timeout: Duration::from_millis(100),
            ..ConnectionConfig::default()
        };
        let conn = Connection::with_config(desc, config, ExchangeLock::new());
        assert_eq!(conn.config().exchange_timeout, Duration::from_millis(100));
        let started = Instant::now();
        let err = conn.send(&[5, 0, 0, 0, 15]).unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_millis(450));

        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_answer_is_cut_off() {
        let dir = unique_dir("oversized");
        let desc = Resolver::new(Platform::Linux)
            .with_runtime_dir(&dir)
            .resolve("pcsx2", 0)
            .unwrap();
        let listener = UnixDomainSocket::bind(dir.join("pcsx2.sock.28011")).unwrap();
        let server = thread::spawn(move || {
            let mut stream = listener.accept().expect("listener should accept");
            let mut request = Vec::new();
            stream.read_to_end(&mut request).unwrap();
            // The client may hang up before the whole answer is written.
            let _ = stream.write_all(&[0xAB; 64]);
        });

        let config = ConnectionConfig {
            max_answer_len: 16,
            ..ConnectionConfig::default()
        };
        let conn = Connection::with_config(desc, config, ExchangeLock::new());
        let err = conn.send(&[5, 0, 0, 0, 11]).unwrap_err();
        assert!(
            matches!(err, TransportError::AnswerTooLarge { limit: 16 }),
            "got {err:?}"
        );
        assert!(!err.is_configuration());

        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn probe_exchanges_no_bytes() {
        let dir = unique_dir("probe");
        let resolver = Resolver::new(Platform::Linux).with_runtime_dir(&dir);
        let conn = Connection::new(resolver.resolve("pcsx2", 0).unwrap());
        assert!(conn.probe().is_err());

        let listener = UnixDomainSocket::bind(dir.join("pcsx2.sock.28011")).unwrap();
        let server = thread::spawn(move || {
            let mut stream = listener.accept().expect("listener should accept");
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        conn.probe().unwrap();
        assert!(server.join().unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_sends_never_overlap() {
        const CLIENTS: usize = 4;
        const SENDS_PER_CLIENT: usize = 3;

        let dir = unique_dir("serial");
        let desc = Resolver::new(Platform::Linux)
            .with_runtime_dir(&dir)
            .resolve("pcsx2", 0)
            .unwrap();
        let listener = UnixDomainSocket::bind(dir.join("pcsx2.sock.28011")).unwrap();

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let server = {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                let mut handlers = Vec::new();
                for _ in 0..CLIENTS * SENDS_PER_CLIENT {
                    let mut stream = listener.accept().expect("listener should accept");
                    let active = Arc::clone(&active);
                    let peak = Arc::clone(&peak);
                    handlers.push(thread::spawn(move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        let mut request = Vec::new();
                        stream.read_to_end(&mut request).unwrap();
                        thread::sleep(Duration::from_millis(10));
                        stream.write_all(&request).unwrap();
                        active.fetch_sub(1, Ordering::SeqCst);
                        drop(stream);
                    }));
                }
                for handler in handlers {
                    handler.join().unwrap();
                }
            })
        };

        let conn = Connection::new(desc);
        let clients: Vec<_> = (0..CLIENTS)
            .map(|id| {
                let conn = conn.clone();
                thread::spawn(move || {
                    for n in 0..SENDS_PER_CLIENT {
                        let request = vec![6, 0, 0, 0, id as u8, n as u8];
                        let answer = conn.send(&request).expect("send should succeed");
                        assert_eq!(answer, request, "answers must never cross callers");
                    }
                })
            })
            .collect();

        for client in clients {
            client.join().unwrap();
        }
        server.join().unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn loopback_port_transport() {
        let listener = LoopbackPort::bind(0).unwrap();
        let port = listener.port();
        let server = thread::spawn(move || {
            let mut stream = listener.accept().unwrap();
            let mut request = Vec::new();
            stream.read_to_end(&mut request).unwrap();
            stream.write_all(&[5, 0, 0, 0, 0]).unwrap();
            request
        });

        let desc = Resolver::new(Platform::Windows)
            .resolve("rpcs3", port)
            .unwrap();
        let answer = Connection::new(desc).send(&[6, 0, 0, 0, 9, 1]).unwrap();
        assert_eq!(answer, vec![5, 0, 0, 0, 0]);
        assert_eq!(server.join().unwrap(), vec![6, 0, 0, 0, 9, 1]);
    }
}
