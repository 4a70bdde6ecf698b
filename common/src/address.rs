//! Rendering of public keys as Oasis bech32 addresses.

use bech32::{Bech32, Hrp};
use thiserror::Error;

use crate::constants::DEFAULT_HRP;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid human readable part: {0}")]
    InvalidHrp(String),
    #[error("bech32 encoding failed: {0}")]
    Encoding(String),
}

/// Encodes the raw public key with the `oasis` human readable part.
pub fn bech32_from_public_key(public_key: &[u8]) -> Result<String, AddressError> {
    bech32_with_hrp(DEFAULT_HRP, public_key)
}

pub fn bech32_with_hrp(hrp: &str, data: &[u8]) -> Result<String, AddressError> {
    let hrp = Hrp::parse(hrp).map_err(|e| AddressError::InvalidHrp(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| AddressError::Encoding(e.to_string()))
}
