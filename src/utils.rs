use crate::error::{Result, TlError};
use alloy::primitives::Address;
use std::str::FromStr;

/// Parse a `0x`-prefixed 20-byte address. `what` names the argument in the
/// error message.
pub fn parse_address(address: &str, what: &str) -> Result<Address> {
    let trimmed = address.trim();
    if !(trimmed.starts_with("0x") || trimmed.starts_with("0X")) {
        return Err(TlError::invalid_argument(format!(
            "{} {:?} is not a 0x-prefixed address",
            what, address
        )));
    }
    Address::from_str(trimmed)
        .map_err(|e| TlError::invalid_argument(format!("{} {:?}: {}", what, address, e)))
}

pub fn is_address(address: &str) -> bool {
    parse_address(address, "address").is_ok()
}

/// `len` random bytes as a `0x`-prefixed hex string.
pub fn random_hex_id(len: usize) -> String {
    let bytes: Vec<u8> = (0..len).map(|_| fastrand::u8(..)).collect();
    format!("0x{}", hex::encode(bytes))
}
