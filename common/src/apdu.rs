//! Command buffers of the Oasis app.
//!
//! Each operation fixes its class, instruction and parameters, and declares which status words
//! are answers to interpret rather than failures.

use crate::constants::{
    AddressMode, Ins, CLA, CLA_APP_INFO, CLA_DEVICE_INFO, INS_APP_INFO, INS_DEVICE_INFO,
};
use crate::frame::{ChunkTag, Frame};
use crate::status::StatusWord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct APDUCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl APDUCommand {
    pub fn encode(&self) -> Vec<u8> {
        if self.data.len() <= 255 {
            let mut vec = vec![self.cla, self.ins, self.p1, self.p2, self.data.len() as u8];
            vec.extend(self.data.iter());
            vec
        } else {
            let len = (self.data.len() as u16).to_be_bytes();
            let mut vec = vec![self.cla, self.ins, self.p1, self.p2, 0, len[0], len[1]];
            vec.extend(self.data.iter());
            vec
        }
    }
}

/// Key families supported by the app.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Curve {
    Ed25519,
    Sr25519,
    Secp256k1,
}

impl Curve {
    pub fn address_ins(self) -> Ins {
        match self {
            Curve::Ed25519 => Ins::GetAddrEd25519,
            Curve::Sr25519 => Ins::GetAddrSr25519,
            Curve::Secp256k1 => Ins::GetAddrSecp256k1,
        }
    }
}

/// How the bytes following the path frame are laid out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Framing {
    /// `len(context) || context || message`
    Context,
    /// `meta || message`
    Metadata,
}

/// The chunked sign instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignInstruction {
    /// Consensus transaction, ed25519.
    Ed25519,
    /// Paratime transaction, ed25519.
    ParatimeEd25519,
    /// Paratime transaction, sr25519.
    ParatimeSr25519,
    /// Paratime transaction, secp256k1.
    ParatimeSecp256k1,
}

impl SignInstruction {
    pub fn ins(self) -> Ins {
        match self {
            SignInstruction::Ed25519 => Ins::SignEd25519,
            SignInstruction::ParatimeEd25519 => Ins::SignRtEd25519,
            SignInstruction::ParatimeSr25519 => Ins::SignRtSr25519,
            SignInstruction::ParatimeSecp256k1 => Ins::SignRtSecp256k1,
        }
    }

    pub fn framing(self) -> Framing {
        match self {
            SignInstruction::Ed25519 => Framing::Context,
            _ => Framing::Metadata,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    GetVersion,
    AppInfo,
    DeviceInfo,
    /// Retrieves (and possibly displays) a public key and its address. The data is the
    /// serialized path.
    GetAddress { curve: Curve, mode: AddressMode },
    /// One frame of a chunked signature.
    Sign {
        instruction: SignInstruction,
        tag: ChunkTag,
    },
}

const ACCEPT_SUCCESS: &[u16] = &[StatusWord::OK as u16];
const ACCEPT_SIGN: &[u16] = &[
    StatusWord::OK as u16,
    StatusWord::DataInvalid as u16,
    StatusWord::BadKeyHandle as u16,
];
const ACCEPT_DEVICE_INFO: &[u16] = &[StatusWord::OK as u16, StatusWord::AppNotOpen as u16];

impl Operation {
    /// Status words the app may answer this operation with that carry a meaningful payload.
    /// Any other status word is a failure and its payload is not decoded.
    pub fn accepted_status(self) -> &'static [u16] {
        match self {
            Operation::Sign { .. } => ACCEPT_SIGN,
            Operation::DeviceInfo => ACCEPT_DEVICE_INFO,
            _ => ACCEPT_SUCCESS,
        }
    }

    fn header(self) -> (u8, u8, u8, u8) {
        match self {
            Operation::GetVersion => (CLA, Ins::GetVersion as u8, 0, 0),
            Operation::AppInfo => (CLA_APP_INFO, INS_APP_INFO, 0, 0),
            Operation::DeviceInfo => (CLA_DEVICE_INFO, INS_DEVICE_INFO, 0, 0),
            Operation::GetAddress { curve, mode } => {
                (CLA, curve.address_ins() as u8, mode as u8, 0)
            }
            Operation::Sign { instruction, tag } => (CLA, instruction.ins() as u8, tag as u8, 0),
        }
    }
}

/// A command together with the status words that are not failures for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: APDUCommand,
    pub accepted: &'static [u16],
}

impl CommandRequest {
    pub fn new(operation: Operation, data: Vec<u8>) -> Self {
        let (cla, ins, p1, p2) = operation.header();
        Self {
            command: APDUCommand {
                cla,
                ins,
                p1,
                p2,
                data,
            },
            accepted: operation.accepted_status(),
        }
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.accepted.contains(&status)
    }
}

pub fn get_version() -> CommandRequest {
    CommandRequest::new(Operation::GetVersion, vec![])
}

pub fn app_info() -> CommandRequest {
    CommandRequest::new(Operation::AppInfo, vec![])
}

pub fn device_info() -> CommandRequest {
    CommandRequest::new(Operation::DeviceInfo, vec![])
}

pub fn get_address(curve: Curve, mode: AddressMode, serialized_path: Vec<u8>) -> CommandRequest {
    CommandRequest::new(Operation::GetAddress { curve, mode }, serialized_path)
}

pub fn sign_chunk(instruction: SignInstruction, frame: Frame) -> CommandRequest {
    CommandRequest::new(
        Operation::Sign {
            instruction,
            tag: frame.tag,
        },
        frame.data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_short() {
        let cmd = APDUCommand {
            cla: 0x05,
            ins: 0x01,
            p1: 0x01,
            p2: 0x00,
            data: vec![0xaa, 0xbb],
        };
        assert_eq!(cmd.encode(), vec![0x05, 0x01, 0x01, 0x00, 0x02, 0xaa, 0xbb]);
    }

    #[test]
    fn test_encode_extended_length() {
        let cmd = APDUCommand {
            cla: 0x05,
            ins: 0x02,
            p1: 0,
            p2: 0,
            data: vec![0; 300],
        };
        let encoded = cmd.encode();
        assert_eq!(&encoded[..7], &[0x05, 0x02, 0, 0, 0, 0x01, 0x2c]);
        assert_eq!(encoded.len(), 307);
    }

    #[test]
    fn test_headers() {
        let req = get_version();
        assert_eq!((req.command.cla, req.command.ins), (0x05, 0x00));
        assert!(req.command.data.is_empty());

        let req = app_info();
        assert_eq!((req.command.cla, req.command.ins), (0xb0, 0x01));

        let req = device_info();
        assert_eq!((req.command.cla, req.command.ins), (0xe0, 0x01));

        let req = get_address(Curve::Secp256k1, AddressMode::ShowOnDevice, vec![1, 2, 3]);
        assert_eq!(
            req.command,
            APDUCommand {
                cla: 0x05,
                ins: 0x04,
                p1: 0x01,
                p2: 0x00,
                data: vec![1, 2, 3],
            }
        );

        let req = get_address(Curve::Sr25519, AddressMode::OnlyRetrieve, vec![]);
        assert_eq!((req.command.ins, req.command.p1), (0x03, 0x00));
    }

    #[test]
    fn test_sign_chunk_uses_instruction_and_tag() {
        let cases = [
            (SignInstruction::Ed25519, 0x02),
            (SignInstruction::ParatimeEd25519, 0x05),
            (SignInstruction::ParatimeSr25519, 0x06),
            (SignInstruction::ParatimeSecp256k1, 0x07),
        ];
        for (instruction, ins) in cases {
            for (tag, p1) in [(ChunkTag::Init, 0), (ChunkTag::Add, 1), (ChunkTag::Last, 2)] {
                let req = sign_chunk(instruction, Frame::new(tag, vec![0x42]));
                assert_eq!(req.command.cla, CLA);
                assert_eq!(req.command.ins, ins);
                assert_eq!(req.command.p1, p1);
                assert_eq!(req.command.data, vec![0x42]);
            }
        }
    }

    #[test]
    fn test_accepted_status() {
        let sign = sign_chunk(SignInstruction::Ed25519, Frame::new(ChunkTag::Last, vec![]));
        assert!(sign.accepts(0x9000));
        assert!(sign.accepts(0x6984));
        assert!(sign.accepts(0x6a80));
        assert!(!sign.accepts(0x6985));

        let info = device_info();
        assert!(info.accepts(0x6e00));
        assert!(!info.accepts(0x6984));

        let addr = get_address(Curve::Ed25519, AddressMode::OnlyRetrieve, vec![]);
        assert_eq!(addr.accepted, &[0x9000u16][..]);
        assert!(!get_version().accepts(0x6e00));
    }

    #[test]
    fn test_instruction_properties() {
        assert_eq!(SignInstruction::Ed25519.framing(), Framing::Context);
        assert_eq!(SignInstruction::ParatimeEd25519.framing(), Framing::Metadata);
    }
}
