//! An in-process PINE responder for tests and local development.
//!
//! [`StubEmulator`] answers every PINE operation from a sparse little-endian
//! memory map, a table of save-state snapshots and a fixed identity. It
//! speaks the same one-exchange-per-connection protocol as a real emulator:
//! read the request to end-of-stream, write the answer, close.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use pine_frame::{hex_preview, Answer, AnswerShape, Opcode, Request, ResultCode};
use pine_transport::{dial_endpoint, Endpoint, IpcStream, PineListener};
use serde::Serialize;
use tracing::{debug, info, warn};

/// How long a client may take to finish sending its request.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Answer sent when a request cannot be decoded.
const REJECTED: &[u8] = &[0x05, 0x00, 0x00, 0x00, ResultCode::FAIL];

/// Emulator run state reported by the `status` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum EmulatorStatus {
    Running = 0,
    Paused = 1,
    Shutdown = 2,
}

impl EmulatorStatus {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(EmulatorStatus::Running),
            1 => Some(EmulatorStatus::Paused),
            2 => Some(EmulatorStatus::Shutdown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmulatorStatus::Running => "running",
            EmulatorStatus::Paused => "paused",
            EmulatorStatus::Shutdown => "shutdown",
        }
    }
}

/// Identity strings a stub emulator reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorProfile {
    pub version: String,
    pub title: String,
    pub id: String,
    pub uuid: String,
    pub game_version: String,
}

impl EmulatorProfile {
    pub fn for_target(target: &str) -> Self {
        let (version, id) = match target {
            "rpcs3" => ("RPCS3 stub 0.0.1", "BLUS00000"),
            "pcsx2" => ("PCSX2 stub 0.0.1", "SLUS-00000"),
            _ => ("PINE stub 0.0.1", "STUB-00000"),
        };
        Self {
            version: version.to_string(),
            title: "Stub Game".to_string(),
            id: id.to_string(),
            uuid: "00000000-0000-4000-8000-000000000000".to_string(),
            game_version: "1.00".to_string(),
        }
    }
}

type Memory = BTreeMap<u32, u8>;

struct EmulatorState {
    profile: EmulatorProfile,
    status: EmulatorStatus,
    memory: Memory,
    snapshots: HashMap<u8, Memory>,
    forced: Option<ResultCode>,
}

/// PINE request handler backed by in-memory state.
pub struct StubEmulator {
    state: Mutex<EmulatorState>,
}

impl StubEmulator {
    pub fn new(profile: EmulatorProfile) -> Self {
        Self {
            state: Mutex::new(EmulatorState {
                profile,
                status: EmulatorStatus::Running,
                memory: Memory::new(),
                snapshots: HashMap::new(),
                forced: None,
            }),
        }
    }

    /// Write raw bytes into emulated memory.
    pub fn poke(&self, address: u32, bytes: &[u8]) {
        let mut state = self.lock();
        store(&mut state.memory, address, bytes);
    }

    /// Read raw bytes from emulated memory; unset bytes read as zero.
    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        let state = self.lock();
        load(&state.memory, address, len)
    }

    pub fn set_status(&self, status: EmulatorStatus) {
        self.lock().status = status;
    }

    /// Answer every request with a bare frame carrying `code`, or resume
    /// normal answers with `None`.
    pub fn force_result(&self, code: Option<ResultCode>) {
        self.lock().forced = code;
    }

    /// Produce the answer frame for one request frame.
    pub fn respond(&self, frame: &[u8]) -> Bytes {
        let request = match Request::decode(frame) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "rejecting undecodable request");
                return Bytes::from_static(REJECTED);
            }
        };
        let answer = self.answer(&request);
        debug!(?request, result = ?answer.result_code(), "answering request");
        answer.encode()
    }

    fn answer(&self, request: &Request) -> Answer {
        let opcode = request.opcode();
        let mut state = self.lock();
        if let Some(code) = state.forced {
            return Answer::bare(opcode, code);
        }

        match *request {
            Request::Read8 { address }
            | Request::Read16 { address }
            | Request::Read32 { address }
            | Request::Read64 { address } => {
                let width = match opcode.answer_shape() {
                    AnswerShape::Value(width) => width.bytes(),
                    _ => 0,
                };
                let mut raw = [0u8; 8];
                raw[..width].copy_from_slice(&load(&state.memory, address, width));
                Answer::with_value(opcode, ResultCode::Ok, u64::from_le_bytes(raw))
            }
            Request::Write8 { address, .. }
            | Request::Write16 { address, .. }
            | Request::Write32 { address, .. }
            | Request::Write64 { address, .. } => {
                let width = opcode.layout().data.map_or(0, |w| w.bytes());
                let data = request.data().unwrap_or_default().to_le_bytes();
                store(&mut state.memory, address, &data[..width]);
                Answer::bare(opcode, ResultCode::Ok)
            }
            Request::SaveState { slot } => {
                let snapshot = state.memory.clone();
                state.snapshots.insert(slot, snapshot);
                Answer::bare(opcode, ResultCode::Ok)
            }
            Request::LoadState { slot } => {
                let snapshot = state.snapshots.get(&slot).cloned();
                match snapshot {
                    Some(snapshot) => {
                        state.memory = snapshot;
                        Answer::bare(opcode, ResultCode::Ok)
                    }
                    None => Answer::bare(opcode, ResultCode::Fail),
                }
            }
            Request::Status => {
                Answer::with_value(opcode, ResultCode::Ok, state.status as u32 as u64)
            }
            Request::Version
            | Request::Title
            | Request::Id
            | Request::Uuid
            | Request::GameVersion => {
                let text = identity(&state.profile, opcode);
                Answer::with_text(opcode, ResultCode::Ok, text)
            }
        }
    }

    /// Serve `listener` on a background thread until the handle is stopped.
    pub fn serve(self: Arc<Self>, listener: PineListener) -> std::io::Result<EmulatorHandle> {
        let endpoint = listener.local_endpoint();
        let stop = Arc::new(AtomicBool::new(false));
        let served = Arc::new(AtomicUsize::new(0));

        info!(%endpoint, "stub emulator listening");
        let thread = {
            let stop = stop.clone();
            let served = served.clone();
            thread::Builder::new()
                .name("pine-stub-emulator".to_string())
                .spawn(move || self.accept_loop(&listener, &stop, &served))?
        };

        Ok(EmulatorHandle {
            stopper: EmulatorStopper { stop, endpoint },
            served,
            thread: Some(thread),
        })
    }

    fn accept_loop(&self, listener: &PineListener, stop: &AtomicBool, served: &AtomicUsize) {
        while !stop.load(Ordering::SeqCst) {
            let mut stream = match listener.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "accept failed, stopping stub emulator");
                    break;
                }
            };
            if stop.load(Ordering::SeqCst) {
                break;
            }
            // Count before the stream drops, so a client seeing end-of-stream
            // also sees the updated count.
            match self.handle_stream(&mut stream) {
                Ok(true) => {
                    served.fetch_add(1, Ordering::SeqCst);
                }
                Ok(false) => debug!("probe connection closed"),
                Err(err) => warn!(error = %err, "exchange with client failed"),
            }
        }
        info!("stub emulator stopped");
    }

    /// Returns false when the client closed without sending a request.
    fn handle_stream(&self, stream: &mut IpcStream) -> std::io::Result<bool> {
        stream
            .set_read_timeout(Some(CLIENT_READ_TIMEOUT))
            .map_err(std::io::Error::other)?;
        let mut request = Vec::new();
        stream.read_to_end(&mut request)?;
        if request.is_empty() {
            return Ok(false);
        }
        debug!(frame = %hex_preview(&request), "request received");

        let answer = self.respond(&request);
        stream.write_all(&answer)?;
        stream.flush()?;
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, EmulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for StubEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StubEmulator")
            .field("profile", &state.profile)
            .field("status", &state.status)
            .field("mapped_bytes", &state.memory.len())
            .finish()
    }
}

fn identity(profile: &EmulatorProfile, opcode: Opcode) -> &str {
    match opcode {
        Opcode::Version => &profile.version,
        Opcode::Title => &profile.title,
        Opcode::Id => &profile.id,
        Opcode::Uuid => &profile.uuid,
        Opcode::GameVersion => &profile.game_version,
        _ => "",
    }
}

fn store(memory: &mut Memory, address: u32, bytes: &[u8]) {
    for (offset, byte) in bytes.iter().enumerate() {
        let at = address.wrapping_add(offset as u32);
        if *byte == 0 {
            memory.remove(&at);
        } else {
            memory.insert(at, *byte);
        }
    }
}

fn load(memory: &Memory, address: u32, len: usize) -> Vec<u8> {
    (0..len)
        .map(|offset| {
            let at = address.wrapping_add(offset as u32);
            memory.get(&at).copied().unwrap_or(0)
        })
        .collect()
}

/// Cloneable trigger that stops a served [`StubEmulator`], e.g. from a
/// signal handler.
#[derive(Debug, Clone)]
pub struct EmulatorStopper {
    stop: Arc<AtomicBool>,
    endpoint: Endpoint,
}

impl EmulatorStopper {
    pub fn stop(&self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        // Unblock the pending accept.
        if let Err(err) = dial_endpoint(&self.endpoint, Duration::from_secs(1)) {
            debug!(error = %err, "wake-up dial failed");
        }
    }
}

/// Handle to a serving stub emulator. Dropping it stops the server and
/// removes its socket.
#[derive(Debug)]
pub struct EmulatorHandle {
    stopper: EmulatorStopper,
    served: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

impl EmulatorHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.stopper.endpoint
    }

    /// Number of request/answer exchanges completed so far.
    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }

    pub fn stopper(&self) -> EmulatorStopper {
        self.stopper.clone()
    }

    /// Block until the server thread exits, after a stopper fires.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stopper.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for EmulatorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
