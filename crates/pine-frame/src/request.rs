use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::opcode::{Opcode, LENGTH_PREFIX_LEN};

/// A PINE request. Each variant carries exactly the fields its frame needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Read8 { address: u32 },
    Read16 { address: u32 },
    Read32 { address: u32 },
    Read64 { address: u32 },
    Write8 { address: u32, data: u8 },
    Write16 { address: u32, data: u16 },
    Write32 { address: u32, data: u32 },
    Write64 { address: u32, data: u64 },
    Version,
    SaveState { slot: u8 },
    LoadState { slot: u8 },
    Title,
    Id,
    Uuid,
    GameVersion,
    Status,
}

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Read8 { .. } => Opcode::Read8,
            Request::Read16 { .. } => Opcode::Read16,
            Request::Read32 { .. } => Opcode::Read32,
            Request::Read64 { .. } => Opcode::Read64,
            Request::Write8 { .. } => Opcode::Write8,
            Request::Write16 { .. } => Opcode::Write16,
            Request::Write32 { .. } => Opcode::Write32,
            Request::Write64 { .. } => Opcode::Write64,
            Request::Version => Opcode::Version,
            Request::SaveState { .. } => Opcode::SaveState,
            Request::LoadState { .. } => Opcode::LoadState,
            Request::Title => Opcode::Title,
            Request::Id => Opcode::Id,
            Request::Uuid => Opcode::Uuid,
            Request::GameVersion => Opcode::GameVersion,
            Request::Status => Opcode::Status,
        }
    }

    pub fn address(&self) -> Option<u32> {
        match *self {
            Request::Read8 { address }
            | Request::Read16 { address }
            | Request::Read32 { address }
            | Request::Read64 { address }
            | Request::Write8 { address, .. }
            | Request::Write16 { address, .. }
            | Request::Write32 { address, .. }
            | Request::Write64 { address, .. } => Some(address),
            _ => None,
        }
    }

    /// Write data widened to 64 bits.
    pub fn data(&self) -> Option<u64> {
        match *self {
            Request::Write8 { data, .. } => Some(data.into()),
            Request::Write16 { data, .. } => Some(data.into()),
            Request::Write32 { data, .. } => Some(data.into()),
            Request::Write64 { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Save-state slot.
    pub fn slot(&self) -> Option<u8> {
        match *self {
            Request::SaveState { slot } | Request::LoadState { slot } => Some(slot),
            _ => None,
        }
    }

    /// Build a request from its opcode and raw field values.
    ///
    /// Fields the opcode does not use are ignored; `data` is truncated to the
    /// write width.
    pub fn from_fields(opcode: Opcode, address: u32, data: u64, slot: u8) -> Self {
        match opcode {
            Opcode::Read8 => Request::Read8 { address },
            Opcode::Read16 => Request::Read16 { address },
            Opcode::Read32 => Request::Read32 { address },
            Opcode::Read64 => Request::Read64 { address },
            Opcode::Write8 => Request::Write8 {
                address,
                data: data as u8,
            },
            Opcode::Write16 => Request::Write16 {
                address,
                data: data as u16,
            },
            Opcode::Write32 => Request::Write32 {
                address,
                data: data as u32,
            },
            Opcode::Write64 => Request::Write64 { address, data },
            Opcode::Version => Request::Version,
            Opcode::SaveState => Request::SaveState { slot },
            Opcode::LoadState => Request::LoadState { slot },
            Opcode::Title => Request::Title,
            Opcode::Id => Request::Id,
            Opcode::Uuid => Request::Uuid,
            Opcode::GameVersion => Request::GameVersion,
            Opcode::Status => Request::Status,
        }
    }

    /// Total frame length, including the length prefix.
    pub fn wire_len(&self) -> usize {
        self.opcode().request_len() as usize
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_len());
        self.encode_into(&mut dst);
        dst.freeze()
    }

    /// Append the wire frame to `dst`.
    ///
    /// ```text
    /// ┌──────────────┬──────────┬──────────────┬────────────────┬──────────┐
    /// │ Length       │ Opcode   │ Address      │ Data           │ Slot     │
    /// │ (4B LE)      │ (1B)     │ (4B LE, opt) │ (1-8B LE, opt) │ (1B, opt)│
    /// └──────────────┴──────────┴──────────────┴────────────────┴──────────┘
    /// ```
    pub fn encode_into(&self, dst: &mut BytesMut) {
        let opcode = self.opcode();
        let layout = opcode.layout();

        dst.reserve(self.wire_len());
        dst.put_u32_le(opcode.request_len());
        dst.put_u8(opcode as u8);
        if let Some(address) = self.address() {
            dst.put_u32_le(address);
        }
        if let (Some(width), Some(data)) = (layout.data, self.data()) {
            dst.put_uint_le(data, width.bytes());
        }
        if let Some(slot) = self.slot() {
            dst.put_u8(slot);
        }
    }

    /// Decode a request frame, as an emulator would on receipt.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() <= LENGTH_PREFIX_LEN {
            return Err(FrameError::Incomplete {
                received: bytes.len(),
            });
        }
        let opcode = Opcode::from_u8(bytes[LENGTH_PREFIX_LEN])?;
        let expected = opcode.request_lengths();

        let mut buf = bytes;
        let declared = buf.get_u32_le();
        if !expected.accepts(declared) {
            return Err(FrameError::malformed(
                opcode,
                "unexpected request length",
                Some(declared),
                expected,
                bytes,
            ));
        }
        if bytes.len() != declared as usize {
            return Err(FrameError::malformed(
                opcode,
                "received length differs from declared length",
                Some(declared),
                expected,
                bytes,
            ));
        }
        buf.advance(1);

        let layout = opcode.layout();
        let address = if layout.address { buf.get_u32_le() } else { 0 };
        let data = layout.data.map_or(0, |width| buf.get_uint_le(width.bytes()));
        let slot = if layout.slot { buf.get_u8() } else { 0 };

        Ok(Self::from_fields(opcode, address, data, slot))
    }
}
