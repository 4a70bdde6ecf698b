//! Decoding of the answers of the Oasis app.
//!
//! Every answer ends with a big-endian status word; the bytes before it are the payload. The
//! decoders below never fail: reads past the end of the payload are clamped, and shapes that
//! cannot be decoded are reported through the status of the returned [`DeviceReply`].

use thiserror::Error;

use crate::constants::{
    ED25519_PUBKEY_LEN, SECP256K1_HEX_ADDRESS_LEN, SECP256K1_PUBKEY_LEN,
};
use crate::status::{status_description, StatusWord};

/// Status reported when the app answers with an unsupported app-info format.
pub const APP_INFO_FORMAT_ERROR: u16 = 0x9001;
const APP_INFO_FORMAT_MESSAGE: &str = "response format ID not recognized";
const APP_INFO_FORMAT_ID: u8 = 1;

/// Bytes of a version answer before the optional target id.
const VERSION_MIN_LEN: usize = 5;

const DASHBOARD_ONLY_MESSAGE: &str = "This command is only available in the Dashboard";

/// Status reported when the firmware version is not handled by this library.
pub const UNSUPPORTED_VERSION: u16 = StatusWord::ExecutionError as u16;
const UNSUPPORTED_VERSION_MESSAGE: &str = "App Version is not supported";

/// A raw answer: payload followed by the 2-byte status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseEnvelope<'a> {
    raw: &'a [u8],
}

impl<'a> ResponseEnvelope<'a> {
    /// Returns `None` if the answer is too short to contain a status word.
    pub fn parse(raw: &'a [u8]) -> Option<Self> {
        if raw.len() < 2 {
            return None;
        }
        Some(Self { raw })
    }

    pub fn status(&self) -> u16 {
        let n = self.raw.len();
        u16::from_be_bytes([self.raw[n - 2], self.raw[n - 1]])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.raw[..self.raw.len() - 2]
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }
}

// Cursor over a payload. Out of range reads yield zeros / truncated slices.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn byte(&mut self) -> u8 {
        let b = self.buf.get(self.pos).copied().unwrap_or(0);
        self.pos = self.pos.saturating_add(1);
        b
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        let start = self.pos.min(self.buf.len());
        let end = self.pos.saturating_add(n).min(self.buf.len());
        self.pos = self.pos.saturating_add(n);
        &self.buf[start..end]
    }

    fn length_prefixed(&mut self) -> &'a [u8] {
        let len = self.byte() as usize;
        self.take(len)
    }
}

fn to_ascii(bytes: &[u8]) -> String {
    bytes.iter().map(|b| (b & 0x7f) as char).collect()
}

fn to_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Outcome of a command as reported by the device.
///
/// Device-side failures are data, not errors: the caller inspects `return_code`, or uses
/// [`DeviceReply::into_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReply<T> {
    pub return_code: u16,
    pub error_message: String,
    pub payload: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device returned {return_code:#06x}: {error_message}")]
pub struct DeviceStatusError {
    pub return_code: u16,
    pub error_message: String,
}

impl<T> DeviceReply<T> {
    /// A reply carrying only a status word, described by the status registry.
    pub fn from_status(return_code: u16) -> Self {
        Self {
            return_code,
            error_message: status_description(return_code),
            payload: None,
        }
    }

    pub fn with_message(return_code: u16, error_message: impl Into<String>) -> Self {
        Self {
            return_code,
            error_message: error_message.into(),
            payload: None,
        }
    }

    pub fn with_payload(return_code: u16, payload: T) -> Self {
        Self {
            return_code,
            error_message: status_description(return_code),
            payload: Some(payload),
        }
    }

    pub fn unsupported_version() -> Self {
        Self::with_message(UNSUPPORTED_VERSION, UNSUPPORTED_VERSION_MESSAGE)
    }

    pub fn is_success(&self) -> bool {
        self.return_code == StatusWord::OK as u16
    }

    pub fn status(&self) -> Option<StatusWord> {
        StatusWord::try_from(self.return_code).ok()
    }

    /// Keeps the status and message, dropping the payload.
    pub fn cast<U>(self) -> DeviceReply<U> {
        DeviceReply {
            return_code: self.return_code,
            error_message: self.error_message,
            payload: None,
        }
    }

    pub fn into_result(self) -> Result<T, DeviceStatusError> {
        match (self.is_success(), self.payload) {
            (true, Some(payload)) => Ok(payload),
            (true, None) => Err(DeviceStatusError {
                return_code: self.return_code,
                error_message: "response carried no payload".into(),
            }),
            (false, _) => Err(DeviceStatusError {
                return_code: self.return_code,
                error_message: self.error_message,
            }),
        }
    }
}

/// Types that can be decoded from the answer of the command that produced them.
pub trait DecodeResponse: Sized {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub test_mode: bool,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub device_locked: bool,
    /// Lowercase hex, without leading zeros; `"0"` on firmware that does not report it.
    pub target_id: String,
}

impl DecodeResponse for VersionInfo {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self> {
        let raw = envelope.raw();
        if envelope.payload().len() < VERSION_MIN_LEN {
            return DeviceReply::from_status(StatusWord::WrongLength as u16);
        }
        let mut reader = ByteReader::new(envelope.payload());

        let test_mode = reader.byte() != 0;
        let major = reader.byte();
        let minor = reader.byte();
        let patch = reader.byte();
        let device_locked = reader.byte() == 1;

        // older firmware does not send the target id
        let target_id = if raw.len() >= 9 {
            u32::from_be_bytes([raw[5], raw[6], raw[7], raw[8]])
        } else {
            0
        };

        DeviceReply::with_payload(
            envelope.status(),
            VersionInfo {
                test_mode,
                major,
                minor,
                patch,
                device_locked,
                target_id: format!("{:x}", target_id),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app_name: String,
    pub app_version: String,
    pub flag_len: u8,
    pub flags_value: u8,
    pub flag_recovery: bool,
    pub flag_signed_mcu_code: bool,
    pub flag_onboarded: bool,
    pub flag_pin_validated: bool,
}

impl DecodeResponse for AppInfo {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self> {
        let mut reader = ByteReader::new(envelope.payload());

        if reader.byte() != APP_INFO_FORMAT_ID {
            return DeviceReply::with_message(APP_INFO_FORMAT_ERROR, APP_INFO_FORMAT_MESSAGE);
        }

        let app_name = to_ascii(reader.length_prefixed());
        let app_version = to_ascii(reader.length_prefixed());
        let flag_len = reader.byte();
        let flags_value = reader.byte();

        DeviceReply::with_payload(
            envelope.status(),
            AppInfo {
                app_name,
                app_version,
                flag_len,
                flags_value,
                flag_recovery: flags_value & 0x01 != 0,
                flag_signed_mcu_code: flags_value & 0x02 != 0,
                flag_onboarded: flags_value & 0x04 != 0,
                flag_pin_validated: flags_value & 0x80 != 0,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub target_id: String,
    pub se_version: String,
    pub flag: String,
    pub mcu_version: String,
}

impl DecodeResponse for DeviceInfo {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self> {
        let status = envelope.status();
        if status == StatusWord::AppNotOpen as u16 {
            // the payload does not have the usual shape when an app is open
            return DeviceReply::with_message(status, DASHBOARD_ONLY_MESSAGE);
        }

        let mut reader = ByteReader::new(envelope.payload());
        let target_id = hex::encode(reader.take(4));
        let se_version = to_text(reader.length_prefixed());
        let flag = hex::encode(reader.length_prefixed());

        // some firmware versions NUL-terminate the MCU version
        let mut mcu_version = reader.length_prefixed();
        if let Some((&0, rest)) = mcu_version.split_last() {
            mcu_version = rest;
        }

        DeviceReply::with_payload(
            status,
            DeviceInfo {
                target_id,
                se_version,
                flag,
                mcu_version: to_text(mcu_version),
            },
        )
    }
}

/// Public key and bech32 address of an ed25519 or sr25519 account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bech32Address {
    pub public_key: [u8; 32],
    pub bech32_address: String,
}

impl DecodeResponse for Bech32Address {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self> {
        let payload = envelope.payload();
        let Some(public_key) = payload
            .get(..ED25519_PUBKEY_LEN)
            .and_then(|pk| <[u8; 32]>::try_from(pk).ok())
        else {
            return DeviceReply::from_status(StatusWord::WrongLength as u16);
        };

        DeviceReply::with_payload(
            envelope.status(),
            Bech32Address {
                public_key,
                bech32_address: to_text(&payload[ED25519_PUBKEY_LEN..]),
            },
        )
    }
}

/// Compressed public key and hex address of a secp256k1 account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secp256k1Address {
    pub public_key: [u8; 33],
    pub hex_address: String,
}

impl DecodeResponse for Secp256k1Address {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self> {
        let mut reader = ByteReader::new(envelope.payload());
        let Ok(public_key) = <[u8; 33]>::try_from(reader.take(SECP256K1_PUBKEY_LEN)) else {
            return DeviceReply::from_status(StatusWord::WrongLength as u16);
        };

        DeviceReply::with_payload(
            envelope.status(),
            Secp256k1Address {
                public_key,
                hex_address: to_text(reader.take(SECP256K1_HEX_ADDRESS_LEN)),
            },
        )
    }
}

/// An ed25519 public key, without the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 32]);

impl DecodeResponse for PublicKey {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self> {
        match envelope
            .payload()
            .get(..ED25519_PUBKEY_LEN)
            .and_then(|pk| <[u8; 32]>::try_from(pk).ok())
        {
            Some(pk) => DeviceReply::with_payload(envelope.status(), PublicKey(pk)),
            None => DeviceReply::from_status(StatusWord::WrongLength as u16),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl DecodeResponse for Signature {
    fn decode(envelope: &ResponseEnvelope) -> DeviceReply<Self> {
        let status = envelope.status();
        let payload = envelope.payload();

        let mut error_message = status_description(status);
        if StatusWord::try_from(status).is_ok_and(StatusWord::carries_diagnostic) {
            error_message = format!("{} : {}", error_message, to_ascii(payload));
        }

        let signature = if status == StatusWord::OK as u16 && !payload.is_empty() {
            Some(Signature(payload.to_vec()))
        } else {
            None
        };

        DeviceReply {
            return_code: status,
            error_message,
            payload: signature,
        }
    }
}
