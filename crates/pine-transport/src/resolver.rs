use std::ffi::OsString;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::target::Target;

/// Socket directory used when no runtime directory is configured.
pub const FALLBACK_SOCKET_DIR: &str = "/tmp";

/// Host platform family, which decides the transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other(&'static str),
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            other => Platform::Other(other),
        }
    }

    /// Environment variable naming the per-user runtime directory, if any.
    pub fn runtime_dir_var(self) -> Option<&'static str> {
        match self {
            Platform::Linux => Some("XDG_RUNTIME_DIR"),
            Platform::MacOs => Some("TMPDIR"),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Other(name) => name,
        }
    }
}

/// How a PINE endpoint is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    SocketPath,
    LoopbackPort,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::SocketPath => "socket-path",
            TransportKind::LoopbackPort => "loopback-port",
        }
    }
}

/// A single dialable address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Socket(PathBuf),
    Loopback(SocketAddr),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Socket(path) => write!(f, "{}", path.display()),
            Endpoint::Loopback(addr) => write!(f, "{addr}"),
        }
    }
}

/// Resolved connection parameters for one target and slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDescriptor {
    target: String,
    slot: u16,
    primary: Endpoint,
    fallback: Option<Endpoint>,
}

impl TransportDescriptor {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn kind(&self) -> TransportKind {
        match self.primary {
            Endpoint::Socket(_) => TransportKind::SocketPath,
            Endpoint::Loopback(_) => TransportKind::LoopbackPort,
        }
    }

    pub fn primary(&self) -> &Endpoint {
        &self.primary
    }

    /// The slot-less socket path, tried only when the primary dial fails.
    pub fn fallback(&self) -> Option<&Endpoint> {
        self.fallback.as_ref()
    }

    /// Primary endpoint followed by the fallback, if any.
    pub fn candidates(&self) -> impl Iterator<Item = &Endpoint> {
        std::iter::once(&self.primary).chain(self.fallback.iter())
    }
}

/// Maps a target name and slot to a [`TransportDescriptor`].
#[derive(Debug, Clone)]
pub struct Resolver {
    platform: Platform,
    runtime_dir: Option<PathBuf>,
}

impl Resolver {
    /// Resolver for an explicit platform with no runtime directory.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            runtime_dir: None,
        }
    }

    /// Resolver for the host platform, reading its runtime directory variable.
    pub fn from_env() -> Self {
        let platform = Platform::current();
        let runtime_dir = platform
            .runtime_dir_var()
            .and_then(std::env::var_os)
            .and_then(non_empty_dir);
        Self {
            platform,
            runtime_dir,
        }
    }

    /// Override the socket directory.
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = non_empty_dir(dir.into().into_os_string());
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Directory that holds socket files for this resolver.
    pub fn socket_dir(&self) -> &Path {
        self.runtime_dir
            .as_deref()
            .unwrap_or_else(|| Path::new(FALLBACK_SOCKET_DIR))
    }

    /// Resolve `target` on `slot_override`, or on its default slot when zero.
    pub fn resolve(&self, target: &str, slot_override: u16) -> Result<TransportDescriptor> {
        if target.is_empty() {
            return Err(TransportError::InvalidTarget);
        }

        let slot = if slot_override == 0 {
            Target::find(target)
                .map(|t| t.default_slot)
                .ok_or_else(|| TransportError::UnknownTarget {
                    target: target.to_string(),
                    known: Target::known_names(),
                })?
        } else {
            slot_override
        };

        let (primary, fallback) = match self.platform {
            Platform::Windows => (
                Endpoint::Loopback(SocketAddr::from((Ipv4Addr::LOCALHOST, slot))),
                None,
            ),
            Platform::Linux | Platform::MacOs => {
                // The slot suffix is always appended; emulators on their default
                // slot may omit it, so the slot-less name is kept as a fallback.
                let primary = self.socket_dir().join(format!("{target}.sock.{slot}"));
                let fallback = strip_slot_suffix(&primary);
                (Endpoint::Socket(primary), fallback.map(Endpoint::Socket))
            }
            Platform::Other(name) => return Err(TransportError::UnsupportedPlatform(name)),
        };

        debug!(emulator = target, slot, %primary, "resolved PINE transport");

        Ok(TransportDescriptor {
            target: target.to_string(),
            slot,
            primary,
            fallback,
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_env()
    }
}

fn non_empty_dir(value: OsString) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

fn strip_slot_suffix(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let cut = name.rfind('.')?;
    Some(path.with_file_name(&name[..cut]))
}
