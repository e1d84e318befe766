//! Fixed-layout framing for the PINE emulator protocol.
//!
//! Every PINE message is framed with:
//! - A 4-byte little-endian total length (prefix included)
//! - A 1-byte opcode (requests) or result code (answers)
//! - Operation-specific fields, all little-endian
//!
//! Layouts are fixed per operation, so decoding validates the declared length
//! against the set the operation allows before touching any field.

pub mod answer;
pub mod error;
pub mod opcode;
pub mod params;
pub mod preview;
pub mod request;

pub use answer::{Answer, ResultCode};
pub use error::{FrameError, Result};
pub use opcode::{
    AnswerShape, FrameLengths, Opcode, RequestLayout, Width, HEADER_LEN, LENGTH_PREFIX_LEN,
    MIN_TEXT_ANSWER_LEN, TEXT_HEADER_LEN,
};
pub use params::{normalize_key, parse_number};
pub use preview::hex_preview;
pub use request::Request;
