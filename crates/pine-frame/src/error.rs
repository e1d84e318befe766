use bytes::Bytes;

use crate::opcode::{FrameLengths, Opcode};
use crate::preview::hex_preview;

/// Errors that can occur while building, encoding or decoding PINE frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The operation name is not one of the sixteen PINE operations.
    #[error("unknown operation \"{name}\" (supported operations: {})", known.join(", "))]
    UnknownOperation {
        name: String,
        known: Vec<&'static str>,
    },

    /// The frame ends before its header does.
    #[error("incomplete frame: {received} bytes received, header needs 5")]
    Incomplete { received: usize },

    /// The opcode byte is outside 0-15.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// The frame is short, truncated, or its length is not one the
    /// operation allows.
    #[error(
        "malformed {opcode} frame ({reason}; declared length {}, received {} bytes, expected {expected}): {}",
        declared.map_or_else(|| "n/a".to_string(), |len| len.to_string()),
        bytes.len(),
        hex_preview(bytes)
    )]
    Malformed {
        opcode: Opcode,
        reason: &'static str,
        declared: Option<u32>,
        expected: FrameLengths,
        bytes: Bytes,
    },

    /// A parameter required by the operation was not supplied.
    #[error("missing parameter \"{param}\" for {opcode}")]
    MissingParam { opcode: Opcode, param: &'static str },

    /// A parameter could not be parsed or is out of range.
    #[error("invalid parameter \"{param}\" = \"{value}\" for {opcode}: {reason}")]
    InvalidParam {
        opcode: Opcode,
        param: &'static str,
        value: String,
        reason: String,
    },
}

impl FrameError {
    pub(crate) fn malformed(
        opcode: Opcode,
        reason: &'static str,
        declared: Option<u32>,
        expected: FrameLengths,
        bytes: &[u8],
    ) -> Self {
        FrameError::Malformed {
            opcode,
            reason,
            declared,
            expected,
            bytes: Bytes::copy_from_slice(bytes),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
