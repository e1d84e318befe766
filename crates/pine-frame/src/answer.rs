use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::opcode::{AnswerShape, Opcode, HEADER_LEN, LENGTH_PREFIX_LEN};
use crate::preview::hex_preview;

/// First payload byte of every answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum ResultCode {
    Ok,
    Fail,
    Other(u8),
}

impl ResultCode {
    pub const OK: u8 = 0x00;
    pub const FAIL: u8 = 0xFF;

    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }
}

impl From<u8> for ResultCode {
    fn from(value: u8) -> Self {
        match value {
            Self::OK => ResultCode::Ok,
            Self::FAIL => ResultCode::Fail,
            other => ResultCode::Other(other),
        }
    }
}

impl From<ResultCode> for u8 {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Ok => ResultCode::OK,
            ResultCode::Fail => ResultCode::FAIL,
            ResultCode::Other(other) => other,
        }
    }
}

/// A decoded PINE answer.
///
/// Memory values and status are `None` when the emulator sent the short,
/// result-code-only form of the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Answer {
    Read8 {
        result_code: ResultCode,
        memory_value: Option<u8>,
    },
    Read16 {
        result_code: ResultCode,
        memory_value: Option<u16>,
    },
    Read32 {
        result_code: ResultCode,
        memory_value: Option<u32>,
    },
    Read64 {
        result_code: ResultCode,
        memory_value: Option<u64>,
    },
    Write8 {
        result_code: ResultCode,
    },
    Write16 {
        result_code: ResultCode,
    },
    Write32 {
        result_code: ResultCode,
    },
    Write64 {
        result_code: ResultCode,
    },
    Version {
        result_code: ResultCode,
        version: String,
    },
    SaveState {
        result_code: ResultCode,
    },
    LoadState {
        result_code: ResultCode,
    },
    Title {
        result_code: ResultCode,
        title: String,
    },
    Id {
        result_code: ResultCode,
        id: String,
    },
    Uuid {
        result_code: ResultCode,
        uuid: String,
    },
    GameVersion {
        result_code: ResultCode,
        game_version: String,
    },
    Status {
        result_code: ResultCode,
        status: Option<u32>,
    },
}

/// Payload parts shared by every answer, before typing.
struct AnswerParts {
    result_code: ResultCode,
    value: Option<u64>,
    text: String,
}

impl Answer {
    pub fn opcode(&self) -> Opcode {
        match self {
            Answer::Read8 { .. } => Opcode::Read8,
            Answer::Read16 { .. } => Opcode::Read16,
            Answer::Read32 { .. } => Opcode::Read32,
            Answer::Read64 { .. } => Opcode::Read64,
            Answer::Write8 { .. } => Opcode::Write8,
            Answer::Write16 { .. } => Opcode::Write16,
            Answer::Write32 { .. } => Opcode::Write32,
            Answer::Write64 { .. } => Opcode::Write64,
            Answer::Version { .. } => Opcode::Version,
            Answer::SaveState { .. } => Opcode::SaveState,
            Answer::LoadState { .. } => Opcode::LoadState,
            Answer::Title { .. } => Opcode::Title,
            Answer::Id { .. } => Opcode::Id,
            Answer::Uuid { .. } => Opcode::Uuid,
            Answer::GameVersion { .. } => Opcode::GameVersion,
            Answer::Status { .. } => Opcode::Status,
        }
    }

    pub fn result_code(&self) -> ResultCode {
        match *self {
            Answer::Read8 { result_code, .. }
            | Answer::Read16 { result_code, .. }
            | Answer::Read32 { result_code, .. }
            | Answer::Read64 { result_code, .. }
            | Answer::Write8 { result_code }
            | Answer::Write16 { result_code }
            | Answer::Write32 { result_code }
            | Answer::Write64 { result_code }
            | Answer::Version { result_code, .. }
            | Answer::SaveState { result_code }
            | Answer::LoadState { result_code }
            | Answer::Title { result_code, .. }
            | Answer::Id { result_code, .. }
            | Answer::Uuid { result_code, .. }
            | Answer::GameVersion { result_code, .. }
            | Answer::Status { result_code, .. } => result_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code().is_ok()
    }

    /// Memory value or status, widened to 64 bits.
    pub fn value(&self) -> Option<u64> {
        match *self {
            Answer::Read8 { memory_value, .. } => memory_value.map(u64::from),
            Answer::Read16 { memory_value, .. } => memory_value.map(u64::from),
            Answer::Read32 { memory_value, .. } => memory_value.map(u64::from),
            Answer::Read64 { memory_value, .. } => memory_value,
            Answer::Status { status, .. } => status.map(u64::from),
            _ => None,
        }
    }

    /// String payload of version/title/id/uuid/game-version answers.
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Version { version: text, .. }
            | Answer::Title { title: text, .. }
            | Answer::Id { id: text, .. }
            | Answer::Uuid { uuid: text, .. }
            | Answer::GameVersion {
                game_version: text, ..
            } => Some(text),
            _ => None,
        }
    }

    /// A result-code-only answer, as an emulator sends on failure.
    pub fn bare(opcode: Opcode, result_code: ResultCode) -> Self {
        Self::from_parts(
            opcode,
            AnswerParts {
                result_code,
                value: None,
                text: String::new(),
            },
        )
    }

    /// Answer carrying a memory value or status; other opcodes ignore `value`.
    pub fn with_value(opcode: Opcode, result_code: ResultCode, value: u64) -> Self {
        Self::from_parts(
            opcode,
            AnswerParts {
                result_code,
                value: Some(value),
                text: String::new(),
            },
        )
    }

    /// Answer carrying a string; non-text opcodes ignore `text`.
    pub fn with_text(opcode: Opcode, result_code: ResultCode, text: impl Into<String>) -> Self {
        Self::from_parts(
            opcode,
            AnswerParts {
                result_code,
                value: None,
                text: text.into(),
            },
        )
    }

    fn from_parts(opcode: Opcode, parts: AnswerParts) -> Self {
        let AnswerParts {
            result_code,
            value,
            text,
        } = parts;
        match opcode {
            Opcode::Read8 => Answer::Read8 {
                result_code,
                memory_value: value.map(|v| v as u8),
            },
            Opcode::Read16 => Answer::Read16 {
                result_code,
                memory_value: value.map(|v| v as u16),
            },
            Opcode::Read32 => Answer::Read32 {
                result_code,
                memory_value: value.map(|v| v as u32),
            },
            Opcode::Read64 => Answer::Read64 {
                result_code,
                memory_value: value,
            },
            Opcode::Write8 => Answer::Write8 { result_code },
            Opcode::Write16 => Answer::Write16 { result_code },
            Opcode::Write32 => Answer::Write32 { result_code },
            Opcode::Write64 => Answer::Write64 { result_code },
            Opcode::Version => Answer::Version {
                result_code,
                version: text,
            },
            Opcode::SaveState => Answer::SaveState { result_code },
            Opcode::LoadState => Answer::LoadState { result_code },
            Opcode::Title => Answer::Title {
                result_code,
                title: text,
            },
            Opcode::Id => Answer::Id {
                result_code,
                id: text,
            },
            Opcode::Uuid => Answer::Uuid {
                result_code,
                uuid: text,
            },
            Opcode::GameVersion => Answer::GameVersion {
                result_code,
                game_version: text,
            },
            Opcode::Status => Answer::Status {
                result_code,
                status: value.map(|v| v as u32),
            },
        }
    }

    /// Decode the answer to an `opcode` request.
    ///
    /// The length prefix is checked against the operation's accepted lengths
    /// and against the bytes actually received before any field is read.
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        let expected = opcode.answer_lengths();
        let malformed = |reason, declared| {
            FrameError::malformed(opcode, reason, declared, expected, bytes)
        };

        if bytes.len() < LENGTH_PREFIX_LEN {
            return Err(malformed("frame shorter than its length prefix", None));
        }
        let mut buf = bytes;
        let declared = buf.get_u32_le();
        if !expected.accepts(declared) {
            return Err(malformed("unexpected answer length", Some(declared)));
        }
        if bytes.len() != declared as usize {
            return Err(malformed(
                "received length differs from declared length",
                Some(declared),
            ));
        }
        trace!(%opcode, frame = %hex_preview(bytes), "decoding answer");

        let result_code = ResultCode::from(buf.get_u8());
        let mut parts = AnswerParts {
            result_code,
            value: None,
            text: String::new(),
        };

        match opcode.answer_shape() {
            AnswerShape::Empty => {}
            AnswerShape::Value(width) => {
                if buf.remaining() == width.bytes() {
                    parts.value = Some(buf.get_uint_le(width.bytes()));
                }
            }
            AnswerShape::Status => {
                if buf.remaining() == 4 {
                    parts.value = Some(buf.get_u32_le().into());
                }
            }
            AnswerShape::Text => {
                let text_len = buf.get_u32_le() as usize;
                if text_len > buf.remaining() {
                    return Err(malformed(
                        "string length exceeds frame",
                        Some(declared),
                    ));
                }
                let raw = &buf[..text_len];
                let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
                parts.text = String::from_utf8_lossy(raw).into_owned();
            }
        }

        Ok(Self::from_parts(opcode, parts))
    }

    /// Encode the answer frame, as an emulator would send it.
    ///
    /// Strings are written NUL-terminated.
    pub fn encode(&self) -> Bytes {
        let mut payload = BytesMut::new();
        match self.opcode().answer_shape() {
            AnswerShape::Empty => {}
            AnswerShape::Value(width) => {
                if let Some(value) = self.value() {
                    payload.put_uint_le(value, width.bytes());
                }
            }
            AnswerShape::Status => {
                if let Some(status) = self.value() {
                    payload.put_u32_le(status as u32);
                }
            }
            AnswerShape::Text => {
                let text = self.text().unwrap_or_default().as_bytes();
                payload.put_u32_le(text.len() as u32 + 1);
                payload.put_slice(text);
                payload.put_u8(0);
            }
        }

        let total = HEADER_LEN + payload.len();
        let mut dst = BytesMut::with_capacity(total);
        dst.put_u32_le(total as u32);
        dst.put_u8(self.result_code().into());
        dst.put_slice(&payload);
        dst.freeze()
    }
}
