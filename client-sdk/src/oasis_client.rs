//! Session driver of the Oasis app.
//!
//! [`OasisApp`] sequences the round-trips of each operation: a version handshake for everything
//! that depends on a derivation path, then either a single command or a stream of sign frames.
//! Device-side failures are returned as [`DeviceReply`] values; only invalid input and transport
//! failures are `Err`.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use common::apdu::{self, CommandRequest, Curve, Framing, SignInstruction};
use common::constants::{AddressMode, MAX_CONTEXT_LEN};
use common::epoch::ProtocolEpoch;
use common::frame::{Frame, FrameError};
use common::path::{DerivationPath, PathError};
use common::response::{
    AppInfo, Bech32Address, DecodeResponse, DeviceInfo, DeviceReply, PublicKey, ResponseEnvelope,
    Secp256k1Address, Signature, VersionInfo,
};
use common::status::StatusWord;

use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum ClientError<E: Debug + Display> {
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error(transparent)]
    InvalidFrame(#[from] FrameError),
    /// The device answered with fewer than the 2 bytes of a status word.
    #[error("answer too short: {0} bytes")]
    ResponseTooShort(usize),
    /// The transport failed; the error is forwarded as is.
    #[error("transport error: {0}")]
    Transport(E),
}

/// State obtained from the version handshake, valid for the operation that performed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub version: VersionInfo,
    pub epoch: ProtocolEpoch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Ready(Session),
    /// The version query failed or the app version is not supported. The reply is what the
    /// path-dependent operation returns to its caller.
    Refused(DeviceReply<()>),
}

pub struct OasisApp<T: Transport> {
    transport: Arc<T>,
    // held for the whole duration of an operation, so that frames of concurrent operations are
    // never interleaved on the device
    exchange_lock: Mutex<()>,
}

impl<T: Transport> OasisApp<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            exchange_lock: Mutex::new(()),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    // Sends a command and decodes its answer. Status words that are not accepted for the
    // command are reported without decoding the payload.
    async fn exchange<R: DecodeResponse>(
        &self,
        request: CommandRequest,
    ) -> Result<DeviceReply<R>, ClientError<T::Error>> {
        log::debug!("=> {}", hex::encode(request.command.encode()));

        let raw = self
            .transport
            .exchange(&request.command)
            .await
            .map_err(ClientError::Transport)?;

        log::debug!("<= {}", hex::encode(&raw));

        let envelope =
            ResponseEnvelope::parse(&raw).ok_or(ClientError::ResponseTooShort(raw.len()))?;
        let status = envelope.status();
        if !request.accepts(status) {
            return Ok(DeviceReply::from_status(status));
        }
        Ok(R::decode(&envelope))
    }

    /// Queries the version of the app.
    pub async fn get_version(&self) -> Result<DeviceReply<VersionInfo>, ClientError<T::Error>> {
        let _guard = self.exchange_lock.lock().await;
        self.exchange(apdu::get_version()).await
    }

    /// Queries the version of the app and selects the protocol to speak with it.
    pub async fn handshake(&self) -> Result<Handshake, ClientError<T::Error>> {
        let _guard = self.exchange_lock.lock().await;
        self.do_handshake().await
    }

    async fn do_handshake(&self) -> Result<Handshake, ClientError<T::Error>> {
        let reply = self.exchange::<VersionInfo>(apdu::get_version()).await?;
        if !reply.is_success() {
            return Ok(Handshake::Refused(reply.cast()));
        }

        let Some(version) = reply.payload else {
            return Ok(Handshake::Refused(DeviceReply::unsupported_version()));
        };
        match ProtocolEpoch::from_major(version.major) {
            Some(epoch) => Ok(Handshake::Ready(Session { version, epoch })),
            None => {
                log::warn!(
                    "unsupported app version {}.{}.{}",
                    version.major,
                    version.minor,
                    version.patch
                );
                Ok(Handshake::Refused(DeviceReply::unsupported_version()))
            }
        }
    }

    /// Name, version and flags of the running app.
    pub async fn app_info(&self) -> Result<DeviceReply<AppInfo>, ClientError<T::Error>> {
        let _guard = self.exchange_lock.lock().await;
        self.exchange(apdu::app_info()).await
    }

    /// Device information; only answered by the dashboard.
    pub async fn device_info(&self) -> Result<DeviceReply<DeviceInfo>, ClientError<T::Error>> {
        let _guard = self.exchange_lock.lock().await;
        self.exchange(apdu::device_info()).await
    }

    /// Retrieves the ed25519 public key at `path`.
    pub async fn public_key(
        &self,
        path: &[u32],
    ) -> Result<DeviceReply<PublicKey>, ClientError<T::Error>> {
        self.address(Curve::Ed25519, AddressMode::OnlyRetrieve, path)
            .await
    }

    pub async fn get_address_and_pubkey_ed25519(
        &self,
        path: &[u32],
    ) -> Result<DeviceReply<Bech32Address>, ClientError<T::Error>> {
        self.address(Curve::Ed25519, AddressMode::OnlyRetrieve, path)
            .await
    }

    pub async fn get_address_and_pubkey_sr25519(
        &self,
        path: &[u32],
    ) -> Result<DeviceReply<Bech32Address>, ClientError<T::Error>> {
        self.address(Curve::Sr25519, AddressMode::OnlyRetrieve, path)
            .await
    }

    pub async fn get_address_and_pubkey_secp256k1(
        &self,
        path: &[u32],
    ) -> Result<DeviceReply<Secp256k1Address>, ClientError<T::Error>> {
        self.address(Curve::Secp256k1, AddressMode::OnlyRetrieve, path)
            .await
    }

    /// Like [`OasisApp::get_address_and_pubkey_ed25519`], but the address is first displayed on
    /// the device and must be confirmed by the user.
    pub async fn show_address_and_pubkey_ed25519(
        &self,
        path: &[u32],
    ) -> Result<DeviceReply<Bech32Address>, ClientError<T::Error>> {
        self.address(Curve::Ed25519, AddressMode::ShowOnDevice, path)
            .await
    }

    pub async fn show_address_and_pubkey_sr25519(
        &self,
        path: &[u32],
    ) -> Result<DeviceReply<Bech32Address>, ClientError<T::Error>> {
        self.address(Curve::Sr25519, AddressMode::ShowOnDevice, path)
            .await
    }

    pub async fn show_address_and_pubkey_secp256k1(
        &self,
        path: &[u32],
    ) -> Result<DeviceReply<Secp256k1Address>, ClientError<T::Error>> {
        self.address(Curve::Secp256k1, AddressMode::ShowOnDevice, path)
            .await
    }

    async fn address<R: DecodeResponse>(
        &self,
        curve: Curve,
        mode: AddressMode,
        path: &[u32],
    ) -> Result<DeviceReply<R>, ClientError<T::Error>> {
        let path = DerivationPath::new(path)?;

        let _guard = self.exchange_lock.lock().await;
        let session = match self.do_handshake().await? {
            Handshake::Ready(session) => session,
            Handshake::Refused(reply) => return Ok(reply.cast()),
        };

        let serialized_path = session.epoch.encode_path(&path);
        self.exchange(apdu::get_address(curve, mode, serialized_path))
            .await
    }

    /// Signs a consensus transaction with the ed25519 key at `path`. The context is sent
    /// length-prefixed before the message and cannot exceed 255 bytes.
    pub async fn sign(
        &self,
        path: &[u32],
        context: &[u8],
        message: &[u8],
    ) -> Result<DeviceReply<Signature>, ClientError<T::Error>> {
        self.sign_with(SignInstruction::Ed25519, path, context, message)
            .await
    }

    /// Signs a paratime transaction with the ed25519 key at `path`. `meta` is the serialized
    /// transaction metadata.
    pub async fn sign_rt_ed25519(
        &self,
        path: &[u32],
        meta: &[u8],
        message: &[u8],
    ) -> Result<DeviceReply<Signature>, ClientError<T::Error>> {
        self.sign_with(SignInstruction::ParatimeEd25519, path, meta, message)
            .await
    }

    pub async fn sign_rt_sr25519(
        &self,
        path: &[u32],
        meta: &[u8],
        message: &[u8],
    ) -> Result<DeviceReply<Signature>, ClientError<T::Error>> {
        self.sign_with(SignInstruction::ParatimeSr25519, path, meta, message)
            .await
    }

    pub async fn sign_rt_secp256k1(
        &self,
        path: &[u32],
        meta: &[u8],
        message: &[u8],
    ) -> Result<DeviceReply<Signature>, ClientError<T::Error>> {
        self.sign_with(SignInstruction::ParatimeSecp256k1, path, meta, message)
            .await
    }

    async fn sign_with(
        &self,
        instruction: SignInstruction,
        path: &[u32],
        data: &[u8],
        message: &[u8],
    ) -> Result<DeviceReply<Signature>, ClientError<T::Error>> {
        // validate everything before the first round-trip
        let path = DerivationPath::new(path)?;
        if instruction.framing() == Framing::Context && data.len() > MAX_CONTEXT_LEN {
            return Err(FrameError::ContextTooLarge(data.len()).into());
        }

        let _guard = self.exchange_lock.lock().await;
        let session = match self.do_handshake().await? {
            Handshake::Ready(session) => session,
            Handshake::Refused(reply) => return Ok(reply.cast()),
        };

        let frames = session
            .epoch
            .sign_frames(instruction, &path, data, message)?;
        self.send_frames(instruction, frames).await
    }

    // Sends the frames in order, one at a time. Stops at the first frame that is not answered
    // with success and returns its reply; otherwise returns the reply to the last frame.
    async fn send_frames(
        &self,
        instruction: SignInstruction,
        frames: Vec<Frame>,
    ) -> Result<DeviceReply<Signature>, ClientError<T::Error>> {
        let total = frames.len();
        let mut reply = DeviceReply::from_status(StatusWord::OK as u16);

        for (index, frame) in frames.into_iter().enumerate() {
            log::trace!("sending frame {}/{} ({:?})", index + 1, total, frame.tag);
            reply = self
                .exchange::<Signature>(apdu::sign_chunk(instruction, frame))
                .await?;
            if !reply.is_success() {
                log::warn!(
                    "sign aborted at frame {}/{}: {:#06x} {}",
                    index + 1,
                    total,
                    reply.return_code,
                    reply.error_message
                );
                break;
            }
        }
        Ok(reply)
    }
}
