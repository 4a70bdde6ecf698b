use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use oasis_ledger_client_sdk::common::apdu::APDUCommand;
use oasis_ledger_client_sdk::transport::Transport;
use oasis_ledger_client_sdk::OasisApp;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

/// Transport answering with a scripted list of raw answers, recording every command it is sent.
#[derive(Default)]
pub struct MockTransport {
    answers: Mutex<VecDeque<Result<Vec<u8>, MockError>>>,
    sent: Mutex<Vec<APDUCommand>>,
}

impl MockTransport {
    pub fn new<I: IntoIterator<Item = Vec<u8>>>(answers: I) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(Ok).collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, message: &str) {
        self.answers
            .lock()
            .unwrap()
            .push_back(Err(MockError(message.to_string())));
    }

    pub fn sent(&self) -> Vec<APDUCommand> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockError;
    async fn exchange(&self, command: &APDUCommand) -> Result<Vec<u8>, Self::Error> {
        self.sent.lock().unwrap().push(command.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MockError("no scripted answer left".into())))
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds an app client over a mock scripted with `answers`.
pub fn setup<I: IntoIterator<Item = Vec<u8>>>(
    answers: I,
) -> (OasisApp<MockTransport>, Arc<MockTransport>) {
    init_logging();
    let transport = Arc::new(MockTransport::new(answers));
    (OasisApp::new(transport.clone()), transport)
}

/// Raw answer carrying `payload` and the status word `status`.
pub fn answer(payload: &[u8], status: u16) -> Vec<u8> {
    let mut raw = payload.to_vec();
    raw.extend_from_slice(&status.to_be_bytes());
    raw
}

pub fn ok(payload: &[u8]) -> Vec<u8> {
    answer(payload, 0x9000)
}

/// Successful answer to the version query, for an app with the given major version.
pub fn version_answer(major: u8) -> Vec<u8> {
    ok(&[0, major, 3, 1, 0, 0x33, 0x00, 0x00, 0x04])
}
