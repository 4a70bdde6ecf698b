use std::error::Error;
use std::fmt::{Debug, Display};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
};

#[cfg(feature = "transport")]
use hidapi::HidApi;
#[cfg(feature = "transport")]
use ledger_transport_hid::TransportNativeHID;

use common::apdu::APDUCommand;

/// Environment variable overriding the address of the Speculos APDU port.
pub const SPECULOS_ADDR_ENV: &str = "SPECULOS_APDU_ADDR";

/// Largest answer accepted from Speculos, status word excluded.
const MAX_TCP_ANSWER_LEN: u32 = 64 * 1024;

/// Generic trait to abstract the communication layer between the host and a Ledger device.
///
/// `exchange` returns the raw answer of the device: the payload followed by the 2-byte status
/// word. Interpreting the status word is left to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    type Error: Debug + Display + Send + Sync;
    async fn exchange(&self, command: &APDUCommand) -> Result<Vec<u8>, Self::Error>;
}

/// Transport with the Ledger device.
#[cfg(feature = "transport")]
pub struct TransportHID(TransportNativeHID);

#[cfg(feature = "transport")]
impl TransportHID {
    pub fn new(t: TransportNativeHID) -> Self {
        Self(t)
    }

    /// Opens the first Ledger device found on the USB bus.
    pub fn open_first() -> Result<Self, Box<dyn Error + Send + Sync>> {
        let api = HidApi::new()?;
        Ok(Self(TransportNativeHID::new(&api)?))
    }
}

#[cfg(feature = "transport")]
#[async_trait]
impl Transport for TransportHID {
    type Error = Box<dyn Error + Send + Sync>;
    async fn exchange(&self, cmd: &APDUCommand) -> Result<Vec<u8>, Self::Error> {
        let answer = self
            .0
            .exchange(&ledger_apdu::APDUCommand {
                cla: cmd.cla,
                ins: cmd.ins,
                p1: cmd.p1,
                p2: cmd.p2,
                data: cmd.data.clone(),
            })?;

        let mut raw = answer.data().to_vec();
        raw.extend_from_slice(&answer.retcode().to_be_bytes());
        Ok(raw)
    }
}

/// Transport to communicate with the Ledger Speculos simulator.
pub struct TransportTcp {
    connection: Mutex<TcpStream>,
    total_exchanges: AtomicU64,
    total_sent: AtomicU64,
    total_received: AtomicU64,
}

impl TransportTcp {
    /// Create a new TCP transport connecting to the provided socket address.
    pub async fn new(addr: SocketAddr) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let stream = TcpStream::connect(addr).await?;
        log::debug!("connected to speculos at {}", addr);
        Ok(Self {
            connection: Mutex::new(stream),
            total_exchanges: AtomicU64::new(0),
            total_sent: AtomicU64::new(0),
            total_received: AtomicU64::new(0),
        })
    }

    /// Create a new TCP transport using the default Speculos address 127.0.0.1:9999.
    pub async fn new_default() -> Result<Self, Box<dyn Error + Send + Sync>> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9999);
        Self::new(addr).await
    }

    /// Like [`TransportTcp::new_default`], unless `SPECULOS_APDU_ADDR` is set.
    pub async fn from_env() -> Result<Self, Box<dyn Error + Send + Sync>> {
        match std::env::var(SPECULOS_ADDR_ENV) {
            Ok(addr) => Self::new(addr.parse()?).await,
            Err(_) => Self::new_default().await,
        }
    }

    // Number of exchanges made with this instance. An exchange includes
    // both sending an APDU and receiving a response.
    pub fn total_exchanges(&self) -> u64 {
        self.total_exchanges.load(Ordering::Relaxed)
    }

    // Total bytes sent
    pub fn total_sent(&self) -> u64 {
        self.total_sent.load(Ordering::Relaxed)
    }

    // Total bytes received
    pub fn total_received(&self) -> u64 {
        self.total_received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for TransportTcp {
    type Error = Box<dyn Error + Send + Sync>;
    async fn exchange(&self, command: &APDUCommand) -> Result<Vec<u8>, Self::Error> {
        self.total_exchanges.fetch_add(1, Ordering::Relaxed);

        let mut stream = self.connection.lock().await;
        let command_bytes = command.encode();

        let mut req = vec![0u8; command_bytes.len() + 4];
        req[..4].copy_from_slice(&(command_bytes.len() as u32).to_be_bytes());
        req[4..].copy_from_slice(&command_bytes);

        stream.write_all(&req).await?;
        self.total_sent
            .fetch_add(req.len() as u64, Ordering::Relaxed);

        let mut buff = [0u8; 4];
        stream.read_exact(&mut buff).await?;
        let len = u32::from_be_bytes(buff);
        self.total_received.fetch_add(4, Ordering::Relaxed); // length header
        if len > MAX_TCP_ANSWER_LEN {
            return Err(format!("answer length {} exceeds {}", len, MAX_TCP_ANSWER_LEN).into());
        }

        // the length header does not count the status word
        let mut resp = vec![0u8; len as usize + 2];
        stream.read_exact(&mut resp).await?;
        self.total_received
            .fetch_add(resp.len() as u64, Ordering::Relaxed);

        Ok(resp)
    }
}

/// Wrapper to handle both hid and tcp transport.
pub struct TransportWrapper(Arc<dyn Transport<Error = Box<dyn Error + Send + Sync>> + Sync + Send>);

impl TransportWrapper {
    pub fn new(t: Arc<dyn Transport<Error = Box<dyn Error + Send + Sync>> + Sync + Send>) -> Self {
        Self(t)
    }
}

#[async_trait]
impl Transport for TransportWrapper {
    type Error = Box<dyn Error + Send + Sync>;
    async fn exchange(&self, command: &APDUCommand) -> Result<Vec<u8>, Self::Error> {
        self.0.exchange(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    // Minimal Speculos stand-in: answers every APDU with its data reversed and status 0x9000.
    async fn fake_speculos(listener: TcpListener) {
        let (mut socket, _) = listener.accept().await.unwrap();
        loop {
            let mut len = [0u8; 4];
            if socket.read_exact(&mut len).await.is_err() {
                return;
            }
            let mut apdu = vec![0u8; u32::from_be_bytes(len) as usize];
            socket.read_exact(&mut apdu).await.unwrap();

            let mut data = apdu[5..].to_vec();
            data.reverse();
            let mut answer = (data.len() as u32).to_be_bytes().to_vec();
            answer.extend_from_slice(&data);
            answer.extend_from_slice(&[0x90, 0x00]);
            socket.write_all(&answer).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_tcp_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(fake_speculos(listener));

        let transport = TransportTcp::new(addr).await.unwrap();
        let command = APDUCommand {
            cla: 0x05,
            ins: 0x00,
            p1: 0,
            p2: 0,
            data: vec![1, 2, 3],
        };
        let answer = transport.exchange(&command).await.unwrap();
        assert_eq!(answer, vec![3, 2, 1, 0x90, 0x00]);

        assert_eq!(transport.total_exchanges(), 1);
        assert_eq!(transport.total_sent(), 4 + 5 + 3);
        assert_eq!(transport.total_received(), 4 + 5);

        let wrapper = TransportWrapper::new(Arc::new(transport));
        let answer = wrapper.exchange(&command).await.unwrap();
        assert_eq!(answer, vec![3, 2, 1, 0x90, 0x00]);
    }

    #[tokio::test]
    async fn test_tcp_oversized_answer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut len = [0u8; 4];
            socket.read_exact(&mut len).await.unwrap();
            let mut apdu = vec![0u8; u32::from_be_bytes(len) as usize];
            socket.read_exact(&mut apdu).await.unwrap();
            socket.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        });

        let transport = TransportTcp::new(addr).await.unwrap();
        let command = APDUCommand {
            cla: 0x05,
            ins: 0x00,
            p1: 0,
            p2: 0,
            data: vec![],
        };
        let err = transport.exchange(&command).await.unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert_eq!(transport.total_received(), 4);
    }
}
