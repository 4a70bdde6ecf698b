//! Status words returned by the Oasis app and their human readable descriptions.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusWord {
    /// Success
    OK = 0x9000,
    /// Device is busy
    Busy = 0x9001,
    /// Error deriving keys
    KeyDerivationError = 0x6802,
    /// Execution Error
    ExecutionError = 0x6400,
    /// Wrong Length
    WrongLength = 0x6700,
    /// Empty Buffer
    EmptyBuffer = 0x6982,
    /// Output buffer too small
    OutputBufferTooSmall = 0x6983,
    /// Data is invalid
    DataInvalid = 0x6984,
    /// Conditions not satisfied
    ConditionsNotSatisfied = 0x6985,
    /// Transaction rejected
    TransactionRejected = 0x6986,
    /// Bad key handle
    BadKeyHandle = 0x6A80,
    /// Invalid P1/P2
    InvalidP1P2 = 0x6B00,
    /// Instruction not supported
    InsNotSupported = 0x6D00,
    /// App not open (the class byte is not handled)
    AppNotOpen = 0x6E00,
    /// Unknown error
    UnknownError = 0x6F00,
    /// Sign/verify error
    SignVerifyError = 0x6F01,
}

impl TryFrom<u16> for StatusWord {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x9000 => Ok(StatusWord::OK),
            0x9001 => Ok(StatusWord::Busy),
            0x6802 => Ok(StatusWord::KeyDerivationError),
            0x6400 => Ok(StatusWord::ExecutionError),
            0x6700 => Ok(StatusWord::WrongLength),
            0x6982 => Ok(StatusWord::EmptyBuffer),
            0x6983 => Ok(StatusWord::OutputBufferTooSmall),
            0x6984 => Ok(StatusWord::DataInvalid),
            0x6985 => Ok(StatusWord::ConditionsNotSatisfied),
            0x6986 => Ok(StatusWord::TransactionRejected),
            0x6A80 => Ok(StatusWord::BadKeyHandle),
            0x6B00 => Ok(StatusWord::InvalidP1P2),
            0x6D00 => Ok(StatusWord::InsNotSupported),
            0x6E00 => Ok(StatusWord::AppNotOpen),
            0x6F00 => Ok(StatusWord::UnknownError),
            0x6F01 => Ok(StatusWord::SignVerifyError),
            _ => Err(()),
        }
    }
}

impl StatusWord {
    pub fn description(self) -> &'static str {
        match self {
            StatusWord::OK => "No errors",
            StatusWord::Busy => "Device is busy",
            StatusWord::KeyDerivationError => "Error deriving keys",
            StatusWord::ExecutionError => "Execution Error",
            StatusWord::WrongLength => "Wrong Length",
            StatusWord::EmptyBuffer => "Empty Buffer",
            StatusWord::OutputBufferTooSmall => "Output buffer too small",
            StatusWord::DataInvalid => "Data is invalid",
            StatusWord::ConditionsNotSatisfied => "Conditions not satisfied",
            StatusWord::TransactionRejected => "Transaction rejected",
            StatusWord::BadKeyHandle => "Bad key handle",
            StatusWord::InvalidP1P2 => "Invalid P1/P2",
            StatusWord::InsNotSupported => "Instruction not supported",
            StatusWord::AppNotOpen => "Oasis app does not seem to be open",
            StatusWord::UnknownError => "Unknown error",
            StatusWord::SignVerifyError => "Sign/verify error",
        }
    }

    /// Status words whose answer payload carries an ASCII diagnostic from the app.
    pub fn carries_diagnostic(self) -> bool {
        matches!(self, StatusWord::DataInvalid | StatusWord::BadKeyHandle)
    }
}

impl From<StatusWord> for u16 {
    fn from(sw: StatusWord) -> u16 {
        sw as u16
    }
}

// Codes reported by U2F transports rather than by the app itself.
fn transport_code_description(code: u16) -> Option<&'static str> {
    match code {
        1 => Some("U2F: Unknown"),
        2 => Some("U2F: Bad request"),
        3 => Some("U2F: Configuration unsupported"),
        4 => Some("U2F: Device Ineligible"),
        5 => Some("U2F: Timeout"),
        14 => Some("Timeout"),
        _ => None,
    }
}

/// Returns the description of a status code, or `Unknown Status Code: <code>` (decimal) if the
/// code is not part of the table.
pub fn status_description(code: u16) -> String {
    match StatusWord::try_from(code) {
        Ok(sw) => sw.description().to_string(),
        Err(()) => match transport_code_description(code) {
            Some(desc) => desc.to_string(),
            None => format!("Unknown Status Code: {}", code),
        },
    }
}
