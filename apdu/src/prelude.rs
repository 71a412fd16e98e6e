// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Prelude to simplify downstream use of APDU objects
//!

pub use crate::{
    address::AddressKind,
    coin_version::{CoinVersion, CoinVersionReq},
    firmware_version::{FirmwareFlags, FirmwareVersion, FirmwareVersionReq},
    hash_input::{HashFinalizeReq, HashInput, HashInputStartReq},
    hash_mode::{HashFlags, HashMode, InputFamily},
    hash_sign::{HashSignReq, Signature, SIGHASH_ALL},
    path::DerivationPath,
    public_key::{AddressFormat, PublicKeyReq, WalletPublicKey},
    random::RandomReq,
    sign_message::{MessagePrepareReq, MessageSignReq, MessageSignature},
    status::StatusWord,
    trusted_input::{TrustedInput, TrustedInputReq},
    tx::{Tx, TxInput, TxKind, TxOutput},
    APDUAnswer, APDUCommand, Apdu, BuilderConfig, Command,
};
