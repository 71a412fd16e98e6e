// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Protocol / APDU definitions for Ledger Bitcoin app communication
//!
//! This module provides the host side of the Bitcoin app protocol: transaction
//! parsing and serialisation (Bitcoin legacy / segwit and Zcash overwinter / sapling),
//! record-aware chunking, APDU command builders and response decoders.
//!
//! Nothing in this crate performs I/O, commands are built as [`Apdu`] objects
//! for a transport to deliver and responses are decoded from raw bytes.
//!
//! Unlike the app's own framing, Bitcoin encodings mix byte orders: transaction
//! fields are little-endian while BIP32 paths and some signing parameters are
//! big-endian. Every encoder and decoder names the byte order it uses.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod address;
pub mod chunk;
pub mod codec;
pub mod coin_version;
pub mod firmware_version;
pub mod hash_input;
pub mod hash_mode;
pub mod hash_sign;
pub mod path;
pub mod prelude;
pub mod public_key;
pub mod random;
pub mod sign_message;
pub mod status;
pub mod trusted_input;
pub mod tx;

mod command;
pub use command::{answer_status, new_apdu, APDUAnswer, APDUCommand, Apdu, BuilderConfig, Command};

mod error;
pub use error::Error;

mod helpers;
pub use helpers::decode_exact;

/// Bitcoin app APDU class
pub const BTC_APDU_CLA: u8 = 0xe0;

/// Maximum APDU payload length (single byte `Lc`)
pub const MAX_APDU_DATA: usize = 255;

/// Bitcoin app APDU instruction codes
#[derive(Copy, Clone, Debug, PartialEq, strum::Display)]
#[repr(u8)]
pub enum Instruction {
    /// Fetch the public key and address for a BIP32 path
    GetWalletPublicKey = 0x40,

    /// Stream a previous transaction to obtain a trusted input
    GetTrustedInput = 0x42,

    /// Start hashing the inputs of the transaction being signed
    UntrustedHashTxInputStart = 0x44,

    /// Sign the hashed transaction for an input
    UntrustedHashSign = 0x48,

    /// Hash the outputs of the transaction being signed
    UntrustedHashTxInputFinalizeFull = 0x4a,

    /// Stream or sign a message
    SignMessage = 0x4e,

    /// Fetch coin parameters for the running app
    GetCoinVersion = 0x16,

    /// Fetch random bytes from the device
    GetRandom = 0xc0,

    /// Fetch firmware version
    GetFirmwareVersion = 0xc4,
}
