// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Transaction model
//!
//! Parsed transactions keep every field needed to re-serialise them
//! bit-exactly: raw (flagged) versions, opaque witness bytes and the raw
//! zcash footer are preserved alongside the decoded values.
//!
//! See [`Tx::parse`] for the decoder.

use alloc::vec::Vec;

use byteorder::LittleEndian as LE;
use strum::Display;

use crate::codec::{hash256, put_u32, put_u64, put_varint};

mod parse;

mod zcash;
pub use zcash::{ZcashFooter, SAPLING_VERSION_GROUP_ID, OVERWINTER_VERSION_GROUP_ID};

/// Overwinter flag in the (raw) transaction version
pub const OVERWINTER_FLAG: u32 = 0x8000_0000;

/// Segwit marker and flag bytes following the version
pub const SEGWIT_MARKER: [u8; 2] = [0x00, 0x01];

/// Transaction kind, determined while parsing
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum TxKind {
    /// Bitcoin transaction without witness data
    Legacy,
    /// Bitcoin transaction with segwit marker, flag and witnesses
    Segwit,
    /// Zcash overwinter (v3) transaction
    ZcashPreSapling,
    /// Zcash sapling (v4) transaction
    ZcashSapling,
}

impl TxKind {
    /// Check whether this is a zcash transaction kind
    pub fn is_zcash(&self) -> bool {
        matches!(self, TxKind::ZcashPreSapling | TxKind::ZcashSapling)
    }
}

/// Transaction input
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxInput {
    /// Hash of the transaction holding the spent output (internal byte order)
    pub prev_hash: [u8; 32],
    /// Index of the spent output
    pub prev_index: u32,
    /// Input script (scriptSig)
    pub script: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    /// Serialised outpoint (hash ‖ index LE)
    pub fn outpoint(&self) -> [u8; 36] {
        let mut b = [0u8; 36];
        b[..32].copy_from_slice(&self.prev_hash);
        b[32..].copy_from_slice(&self.prev_index.to_le_bytes());
        b
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.outpoint());
        put_varint(out, self.script.len() as u64);
        out.extend_from_slice(&self.script);
        put_u32::<LE>(out, self.sequence);
    }
}

/// Transaction output
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxOutput {
    /// Output value, held bit-exact as received
    pub value: u64,
    /// Output script (scriptPubKey)
    pub script: Vec<u8>,
}

impl TxOutput {
    /// Output value interpreted as a signed amount
    pub fn amount(&self) -> i64 {
        self.value as i64
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        put_u64::<LE>(out, self.value);
        put_varint(out, self.script.len() as u64);
        out.extend_from_slice(&self.script);
    }
}

/// Parsed transaction
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tx {
    pub kind: TxKind,

    /// Version as declared on the wire (including the overwinter flag)
    pub version: u32,

    /// Zcash version group id
    pub version_group_id: Option<u32>,

    pub inputs: Vec<TxInput>,

    pub outputs: Vec<TxOutput>,

    /// Opaque segwit witness section (empty for other kinds)
    pub witness: Vec<u8>,

    pub lock_time: u32,

    /// Zcash fields following the lock time
    pub footer: Option<ZcashFooter>,
}

impl Tx {
    /// Check whether the overwinter flag is set in the declared version
    pub fn overwintered(&self) -> bool {
        self.version & OVERWINTER_FLAG != 0
    }

    /// Version with the overwinter flag masked out
    pub fn semantic_version(&self) -> u32 {
        self.version & !OVERWINTER_FLAG
    }

    /// Zcash expiry height, where present
    pub fn expiry_height(&self) -> Option<u32> {
        self.footer.as_ref().and_then(|f| f.expiry_height)
    }

    /// Serialise the transaction, including segwit marker / witnesses
    pub fn serialize(&self) -> Vec<u8> {
        self.encode(true)
    }

    /// Serialise the transaction without segwit marker / witnesses
    ///
    /// This is the form committed to by the transaction id, and the form
    /// streamed to the device for trusted inputs.
    pub fn serialize_without_witness(&self) -> Vec<u8> {
        self.encode(false)
    }

    /// Transaction id (hash256 of the witness-stripped serialisation,
    /// internal byte order)
    pub fn txid(&self) -> [u8; 32] {
        hash256(&self.serialize_without_witness())
    }

    fn encode(&self, witness: bool) -> Vec<u8> {
        let segwit = witness && self.kind == TxKind::Segwit;
        let mut out = Vec::new();

        put_u32::<LE>(&mut out, self.version);
        if let Some(vgid) = self.version_group_id {
            put_u32::<LE>(&mut out, vgid);
        }
        if segwit {
            out.extend_from_slice(&SEGWIT_MARKER);
        }

        put_varint(&mut out, self.inputs.len() as u64);
        for i in &self.inputs {
            i.encode(&mut out);
        }

        put_varint(&mut out, self.outputs.len() as u64);
        for o in &self.outputs {
            o.encode(&mut out);
        }

        if segwit {
            out.extend_from_slice(&self.witness);
        }

        put_u32::<LE>(&mut out, self.lock_time);

        if let Some(f) = &self.footer {
            out.extend_from_slice(f.raw());
        }

        out
    }
}
