/// Instruction class of the Oasis app.
pub const CLA: u8 = 0x05;

/// Instruction class of the app-info command, answered by the OS on behalf of any open app.
pub const CLA_APP_INFO: u8 = 0xB0;
/// Instruction code of the app-info command.
pub const INS_APP_INFO: u8 = 0x01;

/// Instruction class of the device-info command, only answered by the dashboard.
pub const CLA_DEVICE_INFO: u8 = 0xE0;
/// Instruction code of the device-info command.
pub const INS_DEVICE_INFO: u8 = 0x01;

/// Maximum number of bytes carried by each frame that follows the path frame.
pub const CHUNK_SIZE: usize = 250;

/// The context is prefixed by a single length byte.
pub const MAX_CONTEXT_LEN: usize = u8::MAX as usize;

/// Bit forced on every derivation path component.
pub const HARDENED: u32 = 0x8000_0000;

/// Human readable part of Oasis bech32 addresses.
pub const DEFAULT_HRP: &str = "oasis";

/// Shared by ed25519 and sr25519 keys.
pub const ED25519_PUBKEY_LEN: usize = 32;
/// Compressed SEC1 encoding.
pub const SECP256K1_PUBKEY_LEN: usize = 33;
/// Length of the hex-encoded (without `0x`) Ethereum-style address.
pub const SECP256K1_HEX_ADDRESS_LEN: usize = 40;

/// Instruction codes of the Oasis app (class [`CLA`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Ins {
    GetVersion = 0x00,
    GetAddrEd25519 = 0x01,
    SignEd25519 = 0x02,
    GetAddrSr25519 = 0x03,
    GetAddrSecp256k1 = 0x04,
    SignRtEd25519 = 0x05,
    SignRtSr25519 = 0x06,
    SignRtSecp256k1 = 0x07,
}

impl TryFrom<u8> for Ins {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Ins::GetVersion),
            0x01 => Ok(Ins::GetAddrEd25519),
            0x02 => Ok(Ins::SignEd25519),
            0x03 => Ok(Ins::GetAddrSr25519),
            0x04 => Ok(Ins::GetAddrSecp256k1),
            0x05 => Ok(Ins::SignRtEd25519),
            0x06 => Ok(Ins::SignRtSr25519),
            0x07 => Ok(Ins::SignRtSecp256k1),
            _ => Err("Invalid value for Ins"),
        }
    }
}

/// P1 values of the address instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressMode {
    /// Return the key and address without user interaction.
    OnlyRetrieve = 0x00,
    /// Display the address on the device and wait for confirmation before returning it.
    ShowOnDevice = 0x01,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        // a length-prefixed context must fit in a byte
        assert_eq!(MAX_CONTEXT_LEN, 255);
        // the path frame and the data frames share the same size limit
        assert!(5 * 4 <= CHUNK_SIZE);
        assert_eq!(HARDENED.leading_zeros(), 0);
    }

    #[test]
    fn test_ins_roundtrip() {
        for code in 0x00..=0x07u8 {
            let ins = Ins::try_from(code).unwrap();
            assert_eq!(ins as u8, code);
        }
        assert!(Ins::try_from(0x08).is_err());
    }
}
