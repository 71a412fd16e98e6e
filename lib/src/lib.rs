// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Ledger Bitcoin API Library (and CLI)
//!
//! Host side of the Ledger Bitcoin app protocol. A [DeviceHandle] wraps a
//! transport implementing [Exchange] and exposes the app's commands, with
//! [SigningSession] driving the multi-step transaction signing flow.
//!
//! Handles and sessions are not internally synchronised, a transport must
//! only be used by one session at a time.

/// Re-export transports for consumer use
pub mod transport;
pub use transport::Exchange;

/// Re-export `ledger-btc-apdu` for consumers
pub use ledger_btc_apdu::{self as apdu};

mod handle;
pub use handle::DeviceHandle;

mod error;
pub use error::Error;

pub mod session;
pub use session::{SessionState, SignConfig, SignRequest, SigningSession};

pub mod payment;
pub use payment::{PaymentRequest, SignedPayment, Spend};

/// Device handle over the Speculos TCP transport
#[cfg(feature = "transport_tcp")]
pub type TcpHandle = DeviceHandle<transport::TcpTransport>;

#[cfg(feature = "transport_tcp")]
impl TcpHandle {
    /// Connect to a Speculos APDU socket
    pub async fn connect(opts: &transport::TcpOptions) -> Result<Self, Error> {
        let t = transport::TcpTransport::connect(opts).await?;
        Ok(Self::from(t))
    }
}

/// Device handle over USB HID
#[cfg(feature = "transport_hid")]
pub type HidHandle = DeviceHandle<transport::TransportNativeHID>;

#[cfg(feature = "transport_hid")]
impl HidHandle {
    /// Connect to the first available ledger device
    pub fn connect_hid() -> Result<Self, Error> {
        let api = transport::hidapi::HidApi::new().map_err(|_| Error::HidInit)?;
        let t = transport::TransportNativeHID::new(&api)?;
        Ok(Self::from(t))
    }
}
