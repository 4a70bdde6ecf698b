//! Firmware generations of the Oasis app.
//!
//! The path serialization and the framing of sign requests depend on the major version reported
//! by the app. Supporting a new generation means adding a variant here; every match on
//! [`ProtocolEpoch`] then has to handle it.

use crate::apdu::{Framing, SignInstruction};
use crate::frame::{build_meta_frames, build_sign_frames, Frame, FrameError};
use crate::path::DerivationPath;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProtocolEpoch {
    /// App versions 0.x, 1.x and 2.x.
    V1,
}

impl ProtocolEpoch {
    /// Returns `None` for major versions this library does not know how to talk to.
    pub fn from_major(major: u8) -> Option<Self> {
        match major {
            0..=2 => Some(ProtocolEpoch::V1),
            _ => None,
        }
    }

    pub fn encode_path(self, path: &DerivationPath) -> Vec<u8> {
        match self {
            ProtocolEpoch::V1 => path.encode(),
        }
    }

    /// Splits a sign request in frames, using the framing of `instruction`. `data` is the
    /// context for consensus signatures and the metadata for paratime signatures.
    pub fn sign_frames(
        self,
        instruction: SignInstruction,
        path: &DerivationPath,
        data: &[u8],
        message: &[u8],
    ) -> Result<Vec<Frame>, FrameError> {
        match self {
            ProtocolEpoch::V1 => {
                let serialized_path = self.encode_path(path);
                match instruction.framing() {
                    Framing::Context => build_sign_frames(&serialized_path, data, message),
                    Framing::Metadata => Ok(build_meta_frames(&serialized_path, data, message)),
                }
            }
        }
    }
}
