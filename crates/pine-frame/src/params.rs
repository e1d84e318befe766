//! Mapping from an operation name and string parameters to a [`Request`].
//!
//! Callers hand over whatever key style their surface produces (`address`,
//! `Woody-Address`, `woody_address`); keys are normalized before lookup.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{FrameError, Result};
use crate::opcode::{fold_name, Opcode, Width};
use crate::request::Request;

/// Legacy key prefix still accepted from older clients.
const LEGACY_PREFIX: &str = "woody";

pub const ADDRESS: &str = "address";
pub const DATA: &str = "data";
pub const SLOT: &str = "slot";

/// Lowercase and drop `-` and `_`, then strip the legacy prefix.
pub fn normalize_key(key: &str) -> String {
    let folded = fold_name(key);
    match folded.strip_prefix(LEGACY_PREFIX) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => folded,
    }
}

/// Parse a decimal or `0x`-prefixed hex number that must fit in `width`.
pub fn parse_number(value: &str, width: Width) -> std::result::Result<u64, String> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    }
    .map_err(|e| e.to_string())?;

    if parsed > width.max_value() {
        return Err(format!("exceeds {}-bit range", width.bits()));
    }
    Ok(parsed)
}

impl Request {
    /// Build a request from an operation name and its parameters.
    ///
    /// `address` is required for reads and writes, `data` for writes and
    /// `slot` for save/load-state. Unused keys are ignored.
    pub fn from_params(operation: &str, params: &BTreeMap<String, String>) -> Result<Self> {
        let opcode = Opcode::from_name(operation)?;
        let normalized: BTreeMap<String, &str> = params
            .iter()
            .map(|(key, value)| (normalize_key(key), value.as_str()))
            .collect();

        let field = |name: &'static str, width: Width| -> Result<u64> {
            let value = normalized
                .get(name)
                .ok_or(FrameError::MissingParam {
                    opcode,
                    param: name,
                })?;
            parse_number(value, width).map_err(|reason| FrameError::InvalidParam {
                opcode,
                param: name,
                value: value.to_string(),
                reason,
            })
        };

        let layout = opcode.layout();
        let address = if layout.address {
            field(ADDRESS, Width::W32)? as u32
        } else {
            0
        };
        let data = match layout.data {
            Some(width) => field(DATA, width)?,
            None => 0,
        };
        let slot = if layout.slot {
            field(SLOT, Width::W8)? as u8
        } else {
            0
        };

        let request = Self::from_fields(opcode, address, data, slot);
        debug!(%opcode, ?request, "built request from parameters");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn keys_normalize() {
        assert_eq!(normalize_key("Address"), "address");
        assert_eq!(normalize_key("Woody-Address"), "address");
        assert_eq!(normalize_key("woody_slot"), "slot");
        assert_eq!(normalize_key("woody"), "woody");
        assert_eq!(normalize_key("Game-Version"), "gameversion");
    }

    #[test]
    fn numbers_hex_and_decimal() {
        assert_eq!(parse_number("0x35459C", Width::W32), Ok(0x35459C));
        assert_eq!(parse_number("3491228", Width::W32), Ok(3491228));
        assert_eq!(parse_number("0XFF", Width::W8), Ok(255));
        assert!(parse_number("256", Width::W8).is_err());
        assert!(parse_number("0x1_0000", Width::W16).is_err());
        assert!(parse_number("-1", Width::W64).is_err());
        assert!(parse_number("", Width::W8).is_err());
        assert_eq!(parse_number("18446744073709551615", Width::W64), Ok(u64::MAX));
    }

    #[test]
    fn read_requires_address() {
        let request = Request::from_params("read32", &params(&[("address", "0x35459C")])).unwrap();
        assert_eq!(request, Request::Read32 { address: 0x35459C });

        let err = Request::from_params("read32", &params(&[])).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MissingParam {
                opcode: Opcode::Read32,
                param: "address"
            }
        ));
    }

    #[test]
    fn write_data_is_range_checked() {
        let request = Request::from_params(
            "write16",
            &params(&[("Woody-Address", "16"), ("woody_data", "0x7845")]),
        )
        .unwrap();
        assert_eq!(
            request,
            Request::Write16 {
                address: 16,
                data: 0x7845
            }
        );

        let err = Request::from_params("write8", &params(&[("address", "1"), ("data", "300")]))
            .unwrap_err();
        match err {
            FrameError::InvalidParam { param, value, .. } => {
                assert_eq!(param, "data");
                assert_eq!(value, "300");
            }
            other => panic!("expected invalid parameter, got {other:?}"),
        }

        assert!(matches!(
            Request::from_params("write64", &params(&[("address", "1")])),
            Err(FrameError::MissingParam { param: "data", .. })
        ));
    }

    #[test]
    fn states_take_a_slot() {
        let request = Request::from_params("savestate", &params(&[("slot", "3")])).unwrap();
        assert_eq!(request, Request::SaveState { slot: 3 });
        assert!(Request::from_params("loadstate", &params(&[("slot", "0x100")])).is_err());
    }

    #[test]
    fn bare_operations_ignore_extra_keys() {
        let request = Request::from_params("Status", &params(&[("address", "zzz")])).unwrap();
        assert_eq!(request, Request::Status);
    }

    #[test]
    fn unknown_operation() {
        assert!(matches!(
            Request::from_params("reset", &params(&[])),
            Err(FrameError::UnknownOperation { .. })
        ));
    }
}
