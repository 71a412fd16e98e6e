// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Local (host-side) protocol errors
//!
//! These are raised before anything is sent to a device, or while decoding
//! bytes received from one. Device status words are modelled separately
//! in [`crate::status`].

/// Protocol error type
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum Error {
    /// Compact-size integer is truncated or not minimally encoded
    #[cfg_attr(feature = "thiserror", error("Malformed compact-size integer"))]
    MalformedVarint,

    /// Input ended before a complete field could be read
    #[cfg_attr(feature = "thiserror", error("Truncated input"))]
    TruncatedInput,

    /// Transaction format not recognised (eg. unknown overwinter version group)
    #[cfg_attr(feature = "thiserror", error("Unsupported transaction kind"))]
    UnsupportedTxKind,

    /// Bytes remain after a complete transaction
    #[cfg_attr(feature = "thiserror", error("Trailing data after transaction"))]
    TrailingData,

    /// Buffer or payload length invalid for the requested operation
    #[cfg_attr(feature = "thiserror", error("Invalid length"))]
    InvalidLength,

    /// Parameter outside the range accepted by the app
    #[cfg_attr(feature = "thiserror", error("Invalid parameter"))]
    InvalidParameter,

    /// Field contents do not match the expected encoding
    #[cfg_attr(feature = "thiserror", error("Invalid encoding"))]
    InvalidEncoding,

    /// BIP32 derivation path could not be parsed
    #[cfg_attr(feature = "thiserror", error("Invalid derivation path"))]
    InvalidPath,

    /// Address format not supported
    #[cfg_attr(feature = "thiserror", error("Unsupported address"))]
    UnsupportedAddress,

    /// Hash mode bits do not describe a valid input family
    #[cfg_attr(feature = "thiserror", error("Invalid hash mode"))]
    InvalidHashMode,
}

impl From<encdec::Error> for Error {
    fn from(e: encdec::Error) -> Self {
        match e {
            encdec::Error::Length => Error::InvalidLength,
            _ => Error::InvalidEncoding,
        }
    }
}
