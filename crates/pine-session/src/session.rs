use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use pine_frame::{hex_preview, Answer, Request};
use pine_transport::{
    Connection, ConnectionConfig, ExchangeLock, Resolver, TransportDescriptor, TransportError,
    KNOWN_TARGETS,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// Pause between failed probe passes.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Granularity at which blocking waits notice a stop request.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Targets probed in order on every pass.
    pub targets: Vec<String>,
    pub retry_interval: Duration,
    pub connection: ConnectionConfig,
    pub resolver: Resolver,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            targets: KNOWN_TARGETS.iter().map(|t| t.name.to_string()).collect(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            connection: ConnectionConfig::default(),
            resolver: Resolver::from_env(),
        }
    }
}

/// Where the session is in its discovery cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "target", rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Probing(String),
    Connected(String),
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("disconnected"),
            SessionState::Probing(target) => write!(f, "probing {target}"),
            SessionState::Connected(target) => write!(f, "connected to {target}"),
        }
    }
}

/// Owns the active emulator connection and moves it through
/// `Disconnected -> Probing -> Connected` and back.
///
/// Only a failed exchange leaves `Connected`. Probing for another target
/// while connected keeps the current connection until the new one answers.
///
/// Every connection the session creates shares one [`ExchangeLock`], so at
/// most one PINE exchange is in flight no matter how many callers share the
/// session.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    lock: ExchangeLock,
    active: RwLock<Option<Arc<Connection>>>,
    state: Mutex<SessionState>,
    changed: Condvar,
    passes: AtomicU64,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            lock: ExchangeLock::new(),
            active: RwLock::new(None),
            state: Mutex::new(SessionState::Disconnected),
            changed: Condvar::new(),
            passes: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    /// Name of the connected target, if any.
    pub fn active_target(&self) -> Option<String> {
        self.snapshot()
            .map(|conn| conn.descriptor().target().to_string())
    }

    /// Number of discovery passes started so far.
    pub fn discovery_passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// One pass over the configured targets; the first that answers a probe
    /// becomes active.
    ///
    /// When no target answers, an existing connection stays in place.
    pub fn probe_targets(&self) -> Option<String> {
        self.passes.fetch_add(1, Ordering::SeqCst);
        for target in &self.config.targets {
            self.mark_probing(target);

            let descriptor = match self.config.resolver.resolve(target, 0) {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    warn!(emulator = %target, error = %err, "skipping target");
                    continue;
                }
            };

            let conn = self.connection_for(descriptor);
            match conn.probe() {
                Ok(()) => {
                    self.install(conn);
                    return Some(target.clone());
                }
                Err(err) => warn!(emulator = %target, error = %err, "probe failed"),
            }
        }

        self.settle();
        None
    }

    /// Repeat [`probe_targets`](Self::probe_targets) until a target connects
    /// or `stop` is raised.
    pub fn connect_blocking(&self, stop: &AtomicBool) -> Option<String> {
        while !stop.load(Ordering::SeqCst) {
            if let Some(target) = self.probe_targets() {
                return Some(target);
            }
            debug!(
                pass = self.discovery_passes(),
                retry_in_ms = self.config.retry_interval.as_millis() as u64,
                "no emulator reachable"
            );
            sleep_unless_stopped(self.config.retry_interval, stop);
        }
        None
    }

    /// Connect to one explicit target, bypassing the probe order.
    ///
    /// A zero `slot` selects the target's default slot. On failure the
    /// previous connection, if any, is kept.
    pub fn connect_to(&self, target: &str, slot: u16) -> Result<()> {
        let descriptor = self.config.resolver.resolve(target, slot)?;
        self.mark_probing(target);

        let conn = self.connection_for(descriptor);
        if let Err(err) = conn.probe() {
            warn!(emulator = target, slot, error = %err, "explicit target unreachable");
            self.settle();
            return Err(err.into());
        }
        self.install(conn);
        Ok(())
    }

    pub fn disconnect(&self) {
        let mut active = self.write_active();
        if active.take().is_some() {
            info!("disconnecting from emulator");
        }
        self.set_state(SessionState::Disconnected);
    }

    /// Send `request` to the active emulator and decode its answer.
    ///
    /// Transport failures demote the session to `Disconnected`; a malformed
    /// answer is returned as an error but leaves the connection in place.
    pub fn exchange(&self, request: &Request) -> Result<Answer> {
        let conn = self.snapshot().ok_or(SessionError::NotConnected)?;
        let opcode = request.opcode();
        let frame = request.encode();
        debug!(%opcode, frame = %hex_preview(&frame), "sending request");

        let raw = match conn.send(&frame) {
            Ok(raw) => raw,
            Err(err) => {
                if !err.is_configuration() {
                    self.demote(&conn, &err);
                }
                return Err(err.into());
            }
        };
        debug!(%opcode, frame = %hex_preview(&raw), "received answer");

        Ok(Answer::decode(opcode, &raw)?)
    }

    /// Block while connected, until the state changes, `stop` is raised or
    /// `timeout` passes.
    pub fn wait_while_connected(&self, stop: &AtomicBool, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        while state.is_connected() && !stop.load(Ordering::SeqCst) {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return;
            }
            state = self
                .changed
                .wait_timeout(state, left.min(STOP_POLL))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wake every thread parked in
    /// [`wait_while_connected`](Self::wait_while_connected).
    pub fn notify(&self) {
        self.changed.notify_all();
    }

    fn connection_for(&self, descriptor: TransportDescriptor) -> Connection {
        Connection::with_config(descriptor, self.config.connection.clone(), self.lock.clone())
    }

    fn snapshot(&self) -> Option<Arc<Connection>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_active(&self) -> RwLockWriteGuard<'_, Option<Arc<Connection>>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Lock order: `active`, then `state`.

    fn install(&self, conn: Connection) {
        let target = conn.descriptor().target().to_string();
        info!(
            emulator = %target,
            slot = conn.descriptor().slot(),
            endpoint = %conn.descriptor().primary(),
            "connected to emulator"
        );
        let mut active = self.write_active();
        *active = Some(Arc::new(conn));
        self.set_state(SessionState::Connected(target));
    }

    /// Bring the state back in line with the active connection after an
    /// unsuccessful probe.
    fn settle(&self) {
        let active = self.write_active();
        let next = match active.as_ref() {
            Some(conn) => SessionState::Connected(conn.descriptor().target().to_string()),
            None => SessionState::Disconnected,
        };
        self.set_state(next);
    }

    fn demote(&self, failed: &Arc<Connection>, err: &TransportError) {
        let mut active = self.write_active();
        // A reconnect may already have replaced the connection, even with
        // one to the same endpoint.
        if active
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, failed))
        {
            warn!(
                emulator = failed.descriptor().target(),
                error = %err,
                "exchange failed, dropping connection"
            );
            *active = None;
            self.set_state(SessionState::Disconnected);
        }
    }

    fn mark_probing(&self, target: &str) {
        let mut state = self.lock_state();
        if !state.is_connected() {
            self.transition(&mut state, SessionState::Probing(target.to_string()));
        }
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.lock_state();
        self.transition(&mut state, next);
    }

    fn transition(&self, state: &mut SessionState, next: SessionState) {
        if *state != next {
            let previous = std::mem::replace(state, next);
            debug!(from = %previous, to = %state, "session state changed");
            self.changed.notify_all();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let until = Instant::now() + duration;
    while !stop.load(Ordering::SeqCst) {
        let left = until.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return;
        }
        std::thread::sleep(left.min(STOP_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pine_transport::Platform;

    fn offline_config(dir: &str) -> SessionConfig {
        SessionConfig {
            retry_interval: Duration::from_millis(20),
            resolver: Resolver::new(Platform::Linux).with_runtime_dir(dir),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn starts_disconnected() {
        let session = Session::new(offline_config("/nonexistent-pine-dir"));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.active_target(), None);
    }

    #[test]
    fn default_targets_follow_probe_order() {
        let config = SessionConfig::default();
        assert_eq!(config.targets, vec!["pcsx2".to_string(), "rpcs3".to_string()]);
        assert_eq!(config.retry_interval, Duration::from_secs(5));
    }

    #[test]
    fn exchange_without_connection() {
        let session = Session::new(offline_config("/nonexistent-pine-dir"));
        let err = session.exchange(&Request::Version).unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[test]
    fn unknown_targets_are_skipped() {
        let mut config = offline_config("/nonexistent-pine-dir");
        config.targets = vec!["dolphin".to_string()];
        let session = Session::new(config);
        assert_eq!(session.probe_targets(), None);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn connect_to_reports_configuration_errors() {
        let session = Session::new(offline_config("/nonexistent-pine-dir"));
        let err = session.connect_to("", 0).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::InvalidTarget)
        ));
        assert!(!err.is_transport());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn connect_blocking_honours_stop() {
        let session = Session::new(offline_config("/nonexistent-pine-dir"));
        let stop = AtomicBool::new(true);
        assert_eq!(session.connect_blocking(&stop), None);
    }

    #[test]
    fn stale_failure_leaves_newer_connection_alone() {
        let session = Session::new(offline_config("/nonexistent-pine-dir"));
        let descriptor = session.config.resolver.resolve("pcsx2", 0).unwrap();

        session.install(session.connection_for(descriptor.clone()));
        let stale = session.snapshot().unwrap();
        session.install(session.connection_for(descriptor));

        session.demote(&stale, &TransportError::Timeout(Duration::from_secs(15)));
        assert_eq!(session.state(), SessionState::Connected("pcsx2".into()));
        assert!(session.active_target().is_some());

        let current = session.snapshot().unwrap();
        session.demote(&current, &TransportError::Timeout(Duration::from_secs(15)));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.active_target(), None);
    }

    #[test]
    fn failed_pass_keeps_existing_connection() {
        let session = Session::new(offline_config("/nonexistent-pine-dir"));
        let descriptor = session.config.resolver.resolve("rpcs3", 0).unwrap();
        session.install(session.connection_for(descriptor));

        assert_eq!(session.probe_targets(), None);
        assert_eq!(session.state(), SessionState::Connected("rpcs3".into()));
        assert!(session.connect_to("pcsx2", 0).is_err());
        assert_eq!(session.active_target().as_deref(), Some("rpcs3"));
        assert_eq!(session.discovery_passes(), 1);

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn state_serializes_with_target() {
        let json = serde_json::to_value(SessionState::Connected("pcsx2".into())).unwrap();
        assert_eq!(json["state"], "connected");
        assert_eq!(json["target"], "pcsx2");
        let json = serde_json::to_value(SessionState::Disconnected).unwrap();
        assert_eq!(json["state"], "disconnected");
    }
}
