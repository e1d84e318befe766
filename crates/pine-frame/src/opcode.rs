//! The sixteen PINE operations and their fixed wire layouts.

use std::fmt;

use serde::Serialize;

use crate::error::{FrameError, Result};

/// Size of the little-endian total-length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Length prefix plus opcode (requests) or result code (answers).
pub const HEADER_LEN: usize = LENGTH_PREFIX_LEN + 1;

/// Header plus the 4-byte string length of a text answer.
pub const TEXT_HEADER_LEN: usize = HEADER_LEN + 4;

/// Shortest text answer the protocol accepts.
pub const MIN_TEXT_ANSWER_LEN: u32 = TEXT_HEADER_LEN as u32 + 1;

/// A PINE operation. The discriminant is the wire opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Opcode {
    Read8 = 0,
    Read16 = 1,
    Read32 = 2,
    Read64 = 3,
    Write8 = 4,
    Write16 = 5,
    Write32 = 6,
    Write64 = 7,
    Version = 8,
    SaveState = 9,
    LoadState = 10,
    Title = 11,
    Id = 12,
    Uuid = 13,
    GameVersion = 14,
    Status = 15,
}

/// Width of a memory value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Largest value representable at this width.
    pub fn max_value(self) -> u64 {
        match self {
            Width::W64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }
}

/// Fields carried by a request, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLayout {
    pub address: bool,
    pub data: Option<Width>,
    pub slot: bool,
}

impl RequestLayout {
    const NONE: Self = Self {
        address: false,
        data: None,
        slot: false,
    };
    const ADDRESS: Self = Self {
        address: true,
        data: None,
        slot: false,
    };
    const SLOT: Self = Self {
        address: false,
        data: None,
        slot: true,
    };

    const fn write(width: Width) -> Self {
        Self {
            address: true,
            data: Some(width),
            slot: false,
        }
    }

    /// Total frame length for this layout.
    pub fn frame_len(self) -> u32 {
        let mut len = HEADER_LEN;
        if self.address {
            len += 4;
        }
        if let Some(width) = self.data {
            len += width.bytes();
        }
        if self.slot {
            len += 1;
        }
        len as u32
    }
}

/// What follows the result code in an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerShape {
    /// Result code only.
    Empty,
    /// Memory value, omitted when the emulator reports failure.
    Value(Width),
    /// Length-prefixed string.
    Text,
    /// Optional 32-bit status.
    Status,
}

/// Frame lengths a decoder will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLengths {
    Exactly(u32),
    OneOf(&'static [u32]),
    AtLeast(u32),
}

impl FrameLengths {
    pub fn accepts(self, len: u32) -> bool {
        match self {
            FrameLengths::Exactly(exact) => len == exact,
            FrameLengths::OneOf(lengths) => lengths.contains(&len),
            FrameLengths::AtLeast(min) => len >= min,
        }
    }

    /// The smallest accepted length.
    pub fn min(self) -> u32 {
        match self {
            FrameLengths::Exactly(exact) => exact,
            FrameLengths::OneOf(lengths) => lengths.iter().copied().min().unwrap_or(0),
            FrameLengths::AtLeast(min) => min,
        }
    }
}

impl fmt::Display for FrameLengths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameLengths::Exactly(exact) => write!(f, "{exact}"),
            FrameLengths::OneOf(lengths) => {
                let joined = lengths
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ");
                f.write_str(&joined)
            }
            FrameLengths::AtLeast(min) => write!(f, "at least {min}"),
        }
    }
}

impl Opcode {
    /// Every opcode, in wire order.
    pub const ALL: [Opcode; 16] = [
        Opcode::Read8,
        Opcode::Read16,
        Opcode::Read32,
        Opcode::Read64,
        Opcode::Write8,
        Opcode::Write16,
        Opcode::Write32,
        Opcode::Write64,
        Opcode::Version,
        Opcode::SaveState,
        Opcode::LoadState,
        Opcode::Title,
        Opcode::Id,
        Opcode::Uuid,
        Opcode::GameVersion,
        Opcode::Status,
    ];

    pub fn from_u8(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(FrameError::UnknownOpcode(value))
    }

    /// Look up an operation by name.
    ///
    /// Matching ignores case, `-` and `_`, so `GameVersion`, `game-version`
    /// and `gameversion` are the same operation.
    pub fn from_name(name: &str) -> Result<Self> {
        let wanted = fold_name(name);
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| FrameError::UnknownOperation {
                name: name.to_string(),
                known: Self::names(),
            })
    }

    /// Names of every operation, in wire order.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|op| op.as_str()).collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Opcode::Read8 => "read8",
            Opcode::Read16 => "read16",
            Opcode::Read32 => "read32",
            Opcode::Read64 => "read64",
            Opcode::Write8 => "write8",
            Opcode::Write16 => "write16",
            Opcode::Write32 => "write32",
            Opcode::Write64 => "write64",
            Opcode::Version => "version",
            Opcode::SaveState => "savestate",
            Opcode::LoadState => "loadstate",
            Opcode::Title => "title",
            Opcode::Id => "id",
            Opcode::Uuid => "uuid",
            Opcode::GameVersion => "gameversion",
            Opcode::Status => "status",
        }
    }

    pub fn layout(self) -> RequestLayout {
        match self {
            Opcode::Read8 | Opcode::Read16 | Opcode::Read32 | Opcode::Read64 => {
                RequestLayout::ADDRESS
            }
            Opcode::Write8 => RequestLayout::write(Width::W8),
            Opcode::Write16 => RequestLayout::write(Width::W16),
            Opcode::Write32 => RequestLayout::write(Width::W32),
            Opcode::Write64 => RequestLayout::write(Width::W64),
            Opcode::SaveState | Opcode::LoadState => RequestLayout::SLOT,
            Opcode::Version
            | Opcode::Title
            | Opcode::Id
            | Opcode::Uuid
            | Opcode::GameVersion
            | Opcode::Status => RequestLayout::NONE,
        }
    }

    /// Exact request frame length.
    pub fn request_len(self) -> u32 {
        self.layout().frame_len()
    }

    pub fn answer_shape(self) -> AnswerShape {
        match self {
            Opcode::Read8 => AnswerShape::Value(Width::W8),
            Opcode::Read16 => AnswerShape::Value(Width::W16),
            Opcode::Read32 => AnswerShape::Value(Width::W32),
            Opcode::Read64 => AnswerShape::Value(Width::W64),
            Opcode::Write8
            | Opcode::Write16
            | Opcode::Write32
            | Opcode::Write64
            | Opcode::SaveState
            | Opcode::LoadState => AnswerShape::Empty,
            Opcode::Version | Opcode::Title | Opcode::Id | Opcode::Uuid | Opcode::GameVersion => {
                AnswerShape::Text
            }
            Opcode::Status => AnswerShape::Status,
        }
    }

    /// Answer frame lengths accepted for this operation.
    pub fn answer_lengths(self) -> FrameLengths {
        match self.answer_shape() {
            AnswerShape::Empty => FrameLengths::Exactly(HEADER_LEN as u32),
            AnswerShape::Value(Width::W8) => FrameLengths::OneOf(&[5, 6]),
            AnswerShape::Value(Width::W16) => FrameLengths::OneOf(&[5, 7]),
            AnswerShape::Value(Width::W32) => FrameLengths::OneOf(&[5, 9]),
            AnswerShape::Value(Width::W64) => FrameLengths::OneOf(&[5, 13]),
            AnswerShape::Text => FrameLengths::AtLeast(MIN_TEXT_ANSWER_LEN),
            AnswerShape::Status => FrameLengths::OneOf(&[5, 9]),
        }
    }

    /// Request frame lengths accepted for this operation.
    pub fn request_lengths(self) -> FrameLengths {
        FrameLengths::Exactly(self.request_len())
    }
}

/// Lowercase and drop `-` and `_`.
pub(crate) fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_u8(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_are_contiguous() {
        for (index, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(*op as u8 as usize, index);
            assert_eq!(Opcode::from_u8(index as u8).unwrap(), *op);
        }
        assert!(matches!(
            Opcode::from_u8(16),
            Err(FrameError::UnknownOpcode(16))
        ));
    }

    #[test]
    fn names_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_name(op.as_str()).unwrap(), op);
        }
        assert_eq!(Opcode::from_name("GameVersion").unwrap(), Opcode::GameVersion);
        assert_eq!(Opcode::from_name("save-state").unwrap(), Opcode::SaveState);
        assert_eq!(Opcode::from_name("LOAD_STATE").unwrap(), Opcode::LoadState);
    }

    #[test]
    fn legacy_key_prefix_is_not_an_operation_prefix() {
        assert!(matches!(
            Opcode::from_name("woodyread8"),
            Err(FrameError::UnknownOperation { .. })
        ));
        assert!(Opcode::from_name("Woody-Status").is_err());
    }

    #[test]
    fn unknown_name_lists_operations() {
        let err = Opcode::from_name("events").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("events"));
        assert!(message.contains("read8"));
        assert!(message.contains("status"));
    }

    #[test]
    fn request_lengths_follow_layout() {
        let expected = [
            (Opcode::Read8, 9),
            (Opcode::Read64, 9),
            (Opcode::Write8, 10),
            (Opcode::Write16, 11),
            (Opcode::Write32, 13),
            (Opcode::Write64, 17),
            (Opcode::Version, 5),
            (Opcode::SaveState, 6),
            (Opcode::LoadState, 6),
            (Opcode::Status, 5),
        ];
        for (op, len) in expected {
            assert_eq!(op.request_len(), len, "{op}");
        }
        for op in Opcode::ALL {
            assert!(op.request_lengths().accepts(op.request_len()), "{op}");
        }
    }

    #[test]
    fn answer_length_sets() {
        assert!(Opcode::Read8.answer_lengths().accepts(5));
        assert!(Opcode::Read8.answer_lengths().accepts(6));
        assert!(!Opcode::Read8.answer_lengths().accepts(7));
        assert!(Opcode::Read64.answer_lengths().accepts(13));
        assert!(!Opcode::Write32.answer_lengths().accepts(9));
        assert!(Opcode::Status.answer_lengths().accepts(9));
        assert!(!Opcode::Status.answer_lengths().accepts(6));
        assert!(!Opcode::Title.answer_lengths().accepts(9));
        assert!(Opcode::Title.answer_lengths().accepts(4096));
        assert_eq!(Opcode::Uuid.answer_lengths().min(), 10);
    }

    #[test]
    fn lengths_display() {
        assert_eq!(Opcode::Read16.answer_lengths().to_string(), "5 or 7");
        assert_eq!(Opcode::Write8.answer_lengths().to_string(), "5");
        assert_eq!(Opcode::Version.answer_lengths().to_string(), "at least 10");
    }

    #[test]
    fn width_limits() {
        assert_eq!(Width::W8.max_value(), 0xFF);
        assert_eq!(Width::W16.max_value(), 0xFFFF);
        assert_eq!(Width::W32.max_value(), 0xFFFF_FFFF);
        assert_eq!(Width::W64.max_value(), u64::MAX);
    }
}
