//! Protocol layer of the Oasis Ledger app.
//!
//! Everything in this crate is pure: it builds command buffers and decodes answers, but never
//! talks to a device. The `oasis-ledger-client-sdk` crate drives the exchanges.

pub mod address;
pub mod apdu;
pub mod constants;
pub mod epoch;
pub mod frame;
pub mod path;
pub mod response;
pub mod status;
