use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::session::Session;

/// How long the supervisor parks before re-checking a connected session.
const PARK_INTERVAL: Duration = Duration::from_secs(1);

/// Background reconnect loop for a shared [`Session`].
pub struct Supervisor;

impl Supervisor {
    /// Spawn the reconnect thread.
    ///
    /// Whenever the session is not connected, the thread probes targets
    /// (sleeping the retry interval between passes) until one answers. While
    /// connected it parks until an exchange demotes the session.
    pub fn spawn(session: Arc<Session>) -> std::io::Result<SupervisorHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let session = session.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("pine-supervisor".to_string())
                .spawn(move || supervise(&session, &stop))?
        };
        Ok(SupervisorHandle {
            session,
            stop,
            thread: Some(thread),
        })
    }
}

fn supervise(session: &Session, stop: &AtomicBool) {
    info!("supervisor started");
    while !stop.load(Ordering::SeqCst) {
        if session.state().is_connected() {
            session.wait_while_connected(stop, PARK_INTERVAL);
            continue;
        }
        if let Some(target) = session.connect_blocking(stop) {
            debug!(emulator = %target, "supervisor reconnected");
        }
    }
    info!("supervisor stopped");
}

/// Handle to a running supervisor. Dropping it stops the thread.
pub struct SupervisorHandle {
    session: Arc<Session>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.session.notify();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("state", &self.session.state())
            .field("running", &self.is_running())
            .finish()
    }
}
