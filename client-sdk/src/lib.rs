//! Host-side client of the Oasis Ledger app.

pub mod oasis_client;
pub mod transport;

// Re-export the protocol layer
pub use common;

pub use oasis_client::{ClientError, Handshake, OasisApp, Session};
