// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Trusted input APDUs
//!
//! A previous transaction is streamed to the app which returns a
//! [`TrustedInput`], an authenticated (txid, index, amount) triple later
//! used in place of the raw input when hashing the transaction to sign.
//!
//! The stream is split into records, each starting a new APDU:
//!
//! ```text
//! index (BE) ‖ version ‖ [version group id] ‖ input count
//! per input:  prev hash ‖ prev index ‖ script length
//!             script ‖ sequence
//! output count
//! per output: value ‖ script length ‖ script
//! lock time ‖ [zcash footer length]
//! [zcash footer]
//! ```
//!
//! P1 is `0x00` for the first APDU and `0x80` for continuations.

use alloc::vec::Vec;

use byteorder::{BigEndian, LittleEndian as LE};
use encdec::{Decode, Encode};

use crate::{
    chunk::{frame_records, Record},
    codec::{put_u32, put_varint, varint},
    helpers::arr,
    new_apdu,
    tx::Tx,
    Apdu, BuilderConfig, Command, Error, Instruction,
};

/// Trusted input magic byte
pub const TRUSTED_INPUT_MAGIC: u8 = 0x32;

/// Encoded trusted input length
pub const TRUSTED_INPUT_LEN: usize = 56;

const P1_FIRST: u8 = 0x00;
const P1_NEXT: u8 = 0x80;

/// Request a trusted input for output `index` of `tx`
#[derive(Clone, PartialEq, Debug)]
pub struct TrustedInputReq<'a> {
    pub tx: &'a Tx,
    pub index: u32,
}

impl<'a> TrustedInputReq<'a> {
    /// Create a new request, failing if the output does not exist
    pub fn new(tx: &'a Tx, index: u32) -> Result<Self, Error> {
        if index as usize >= tx.outputs.len() {
            return Err(Error::InvalidParameter);
        }
        Ok(Self { tx, index })
    }

    /// Build the logical records streamed to the device
    pub fn records(&self) -> Vec<Record> {
        let tx = self.tx;
        let mut records = Vec::with_capacity(3 + 2 * tx.inputs.len() + tx.outputs.len());

        let mut head = Vec::with_capacity(21);
        put_u32::<BigEndian>(&mut head, self.index);
        put_u32::<LE>(&mut head, tx.version);
        if let Some(vgid) = tx.version_group_id {
            put_u32::<LE>(&mut head, vgid);
        }
        put_varint(&mut head, tx.inputs.len() as u64);
        records.push(Record::new(head));

        for i in &tx.inputs {
            let mut outpoint = i.outpoint().to_vec();
            put_varint(&mut outpoint, i.script.len() as u64);
            records.push(Record::new(outpoint));

            let mut script = i.script.clone();
            put_u32::<LE>(&mut script, i.sequence);
            records.push(Record::with_tail(script, 4));
        }

        records.push(Record::new(varint(tx.outputs.len() as u64)));

        for o in &tx.outputs {
            let mut b = Vec::with_capacity(9 + o.script.len());
            o.encode(&mut b);
            records.push(Record::new(b));
        }

        let mut lock_time = Vec::with_capacity(13);
        put_u32::<LE>(&mut lock_time, tx.lock_time);

        match &tx.footer {
            // The app expects the footer length in the same APDU as the lock time
            Some(f) if tx.kind.is_zcash() => {
                put_varint(&mut lock_time, f.raw().len() as u64);
                records.push(Record::new(lock_time));

                if !f.raw().is_empty() {
                    records.push(Record::new(f.raw().to_vec()));
                }
            }
            _ => records.push(Record::new(lock_time)),
        }

        records
    }
}

impl<'a> Command for TrustedInputReq<'a> {
    const INS: Instruction = Instruction::GetTrustedInput;

    fn apdus(&self, cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        frame_records(&self.records(), cfg.max_chunk)?
            .into_iter()
            .enumerate()
            .map(|(i, data)| {
                let p1 = match i {
                    0 => P1_FIRST,
                    _ => P1_NEXT,
                };
                new_apdu(Self::INS, p1, 0x00, data)
            })
            .collect()
    }
}

/// Device-issued trusted input
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  MAGIC (0x32) |     0x00      |             NONCE             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                            TXID (32)                          /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          INDEX (LE)                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          AMOUNT (LE)                          |
/// +                                                               +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            HMAC (8)                           |
/// +                                                               +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug, Encode, Decode)]
#[encdec(error = "Error")]
pub struct TrustedInput {
    /// Device nonce, encoded after the magic and reserved bytes
    #[encdec(with = "header")]
    pub nonce: [u8; 2],
    /// Previous transaction hash (internal byte order)
    #[encdec(with = "arr")]
    pub txid: [u8; 32],
    pub index: u32,
    pub amount: u64,
    /// Truncated device HMAC, verified by the device on use
    #[encdec(with = "arr")]
    pub hmac: [u8; 8],
}

impl TrustedInput {
    /// Check the trusted input refers to output `index` of `tx`
    pub fn matches(&self, tx: &Tx, index: u32) -> bool {
        let amount = match tx.outputs.get(index as usize) {
            Some(o) => o.value,
            None => return false,
        };

        self.index == index && self.amount == amount && self.txid == tx.txid()
    }

    /// Serialised outpoint (txid ‖ index LE)
    pub fn outpoint(&self) -> [u8; 36] {
        let mut b = [0u8; 36];
        b[..32].copy_from_slice(&self.txid);
        b[32..].copy_from_slice(&self.index.to_le_bytes());
        b
    }

    /// Encode to a fixed size array
    pub fn to_bytes(&self) -> [u8; TRUSTED_INPUT_LEN] {
        let mut b = [0u8; TRUSTED_INPUT_LEN];

        // Every field is fixed size, encoding cannot fail
        let _ = self.encode(&mut b);

        b
    }
}

/// encdec helper for the `MAGIC ‖ 0x00 ‖ NONCE` header
mod header {
    use super::TRUSTED_INPUT_MAGIC;
    use crate::Error;

    pub fn enc(nonce: &[u8; 2], buff: &mut [u8]) -> Result<usize, Error> {
        if buff.len() < 4 {
            return Err(Error::InvalidLength);
        }

        buff[0] = TRUSTED_INPUT_MAGIC;
        buff[1] = 0x00;
        buff[2..4].copy_from_slice(nonce);

        Ok(4)
    }

    pub fn enc_len(_nonce: &[u8; 2]) -> Result<usize, Error> {
        Ok(4)
    }

    pub fn dec(buff: &[u8]) -> Result<([u8; 2], usize), Error> {
        if buff.len() < 4 {
            return Err(Error::InvalidLength);
        }
        if buff[0] != TRUSTED_INPUT_MAGIC || buff[1] != 0x00 {
            return Err(Error::InvalidEncoding);
        }

        Ok(([buff[2], buff[3]], 4))
    }
}
