// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

use ledger_btc_apdu::status::StatusWord;
use tokio::time::error::Elapsed;

use crate::session::SessionState;

/// Ledger Bitcoin API Error Type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HID Init Error
    #[error("could not create HidApi instance")]
    HidInit,

    /// Transport error
    #[error("Transport error {0}")]
    Transport(anyhow::Error),

    /// IO error
    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    /// Request timeout
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// Local protocol error, raised before anything reaches the device
    #[error("Protocol error: {0}")]
    Protocol(#[from] ledger_btc_apdu::Error),

    /// Device returned a failure status word
    #[error("Device error: {0} ({:04x})", .0.code())]
    Device(StatusWord),

    /// User denied operation
    #[error("Operation rejected by user")]
    UserDenied,

    /// Response does not match the request
    #[error("Unexpected APDU response")]
    UnexpectedResponse,

    /// Invalid signing session state
    #[error("Invalid session state (actual: {0}, expected: {1})")]
    InvalidState(SessionState, SessionState),

    /// Previous transaction missing or not matching an input
    #[error("Missing or mismatched UTXO for input {0}")]
    MissingUtxo(usize),

    /// Spent outputs do not cover the payment
    #[error("Insufficient funds (available: {available}, required: {required})")]
    InsufficientFunds { available: u64, required: u64 },

    /// Signing request or configuration invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::RequestTimeout
    }
}

#[cfg(feature = "transport_hid")]
impl From<ledger_transport_hid::LedgerHIDError> for Error {
    fn from(e: ledger_transport_hid::LedgerHIDError) -> Self {
        Error::Transport(anyhow::anyhow!("HID: {}", e))
    }
}
