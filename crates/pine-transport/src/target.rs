//! Known emulator targets.
//!
//! A target's slot identifies the IPC channel instance the emulator listens
//! on (a TCP port on Windows, a socket-file suffix elsewhere). It is unrelated
//! to save-state slots.

use std::fmt;

/// An emulator identity and the slot it listens on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub name: &'static str,
    pub default_slot: u16,
}

/// PCSX2 default slot, per `pcsx2/PINE.h`.
pub const PCSX2: Target = Target {
    name: "pcsx2",
    default_slot: 28011,
};

/// RPCS3 default slot, per `rpcs3/Emu/IPC_config.h`.
pub const RPCS3: Target = Target {
    name: "rpcs3",
    default_slot: 28012,
};

/// Every supported target, in probe order.
pub const KNOWN_TARGETS: [Target; 2] = [PCSX2, RPCS3];

impl Target {
    /// Look up a known target by exact name.
    pub fn find(name: &str) -> Option<Target> {
        KNOWN_TARGETS.iter().copied().find(|t| t.name == name)
    }

    /// Names of every known target, in probe order.
    pub fn known_names() -> Vec<&'static str> {
        KNOWN_TARGETS.iter().map(|t| t.name).collect()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
