// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Transaction hashing APDUs
//!
//! `UntrustedHashTxInputStart` streams the inputs of the transaction being
//! signed, `UntrustedHashTxInputFinalizeFull` streams the change path and
//! outputs. Together they bring the app's running sighash to the point
//! where `UntrustedHashSign` may be issued.

use alloc::vec::Vec;

use byteorder::LittleEndian as LE;

use crate::{
    chunk::{frame_records, Record},
    codec::{put_u32, put_u64, put_varint, varint},
    hash_mode::HashMode,
    path::DerivationPath,
    trusted_input::{TrustedInput, TRUSTED_INPUT_LEN},
    tx::{Tx, TxOutput},
    new_apdu, Apdu, BuilderConfig, Command, Error, Instruction,
};

/// First APDU of a hashing call
const P1_FIRST: u8 = 0x00;
/// Continuation APDU of a hashing call
const P1_NEXT: u8 = 0x80;
/// Continue a previously started transaction hash
const P2_CONTINUE: u8 = 0x80;

/// Finalize P1, more outputs follow
const P1_MORE: u8 = 0x00;
/// Finalize P1, last output chunk
const P1_LAST: u8 = 0x80;
/// Finalize P1, change path
const P1_CHANGE: u8 = 0xff;

/// Response to the final finalize APDU
pub const FINALIZE_COMPLETE: [u8; 2] = [0x00, 0x00];

/// Input marker bytes
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum InputMarker {
    /// Plain outpoint, accepted by the app in relaxed mode
    Relaxed = 0x00,
    /// Device-issued trusted input
    Trusted = 0x01,
    /// Outpoint with amount (segwit-style)
    Segwit = 0x02,
}

/// Representation of an input while hashing
#[derive(Clone, PartialEq, Debug)]
pub enum HashInput {
    /// Trusted input issued by the device
    Trusted(TrustedInput),

    /// Untrusted outpoint with its amount (BIP143-style families)
    Segwit {
        prev_hash: [u8; 32],
        prev_index: u32,
        amount: u64,
    },

    /// Untrusted outpoint without amount
    Relaxed { prev_hash: [u8; 32], prev_index: u32 },
}

impl HashInput {
    /// Marker byte preceding the input
    pub fn marker(&self) -> InputMarker {
        match self {
            HashInput::Trusted(_) => InputMarker::Trusted,
            HashInput::Segwit { .. } => InputMarker::Segwit,
            HashInput::Relaxed { .. } => InputMarker::Relaxed,
        }
    }

    /// Encode the input (marker included) to the provided buffer
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.marker() as u8);

        match self {
            HashInput::Trusted(ti) => {
                out.push(TRUSTED_INPUT_LEN as u8);
                out.extend_from_slice(&ti.to_bytes());
            }
            HashInput::Segwit {
                prev_hash,
                prev_index,
                amount,
            } => {
                out.extend_from_slice(prev_hash);
                put_u32::<LE>(out, *prev_index);
                put_u64::<LE>(out, *amount);
            }
            HashInput::Relaxed {
                prev_hash,
                prev_index,
            } => {
                out.extend_from_slice(prev_hash);
                put_u32::<LE>(out, *prev_index);
            }
        }
    }
}

/// Start (or continue) hashing the inputs of a transaction
///
/// Without [`HashFlags::WITH_SCRIPT`](crate::hash_mode::HashFlags) every
/// input is sent with an empty script. With it, segwit-like families send
/// only the input at `script_index` (a pseudo-transaction with a single
/// input) while the legacy family sends every input, carrying `script`
/// only on `script_index`.
#[derive(Clone, PartialEq, Debug)]
pub struct HashInputStartReq<'a> {
    pub tx: &'a Tx,
    /// Input representations, one per transaction input
    pub inputs: &'a [HashInput],
    pub mode: HashMode,
    /// Index of the input carrying its script
    pub script_index: usize,
    /// Script for the input at `script_index`
    pub script: &'a [u8],
    /// Start a new transaction rather than continuing the current hash
    pub new_tx: bool,
}

impl<'a> HashInputStartReq<'a> {
    /// Build the logical records streamed to the device
    pub fn records(&self) -> Result<Vec<Record>, Error> {
        let tx = self.tx;

        if self.inputs.len() != tx.inputs.len() || self.script_index >= tx.inputs.len() {
            return Err(Error::InvalidParameter);
        }

        let single = self.mode.with_script() && self.mode.family.is_segwit_like();

        let mut head = Vec::with_capacity(17);
        put_u32::<LE>(&mut head, tx.version);
        if self.mode.family.is_zcash() {
            let vgid = tx.version_group_id.ok_or(Error::InvalidParameter)?;
            put_u32::<LE>(&mut head, vgid);
        }
        match single {
            true => put_varint(&mut head, 1),
            false => put_varint(&mut head, tx.inputs.len() as u64),
        }

        let mut records = alloc::vec![Record::new(head)];

        for (i, (input, tx_input)) in self.inputs.iter().zip(tx.inputs.iter()).enumerate() {
            if single && i != self.script_index {
                continue;
            }

            let script = match self.mode.with_script() && i == self.script_index {
                true => self.script,
                false => &[],
            };

            let mut b = Vec::with_capacity(1 + 1 + TRUSTED_INPUT_LEN + 9);
            input.encode(&mut b);
            put_varint(&mut b, script.len() as u64);
            records.push(Record::new(b));

            let mut s = Vec::with_capacity(script.len() + 4);
            s.extend_from_slice(script);
            put_u32::<LE>(&mut s, tx_input.sequence);
            records.push(Record::with_tail(s, 4));
        }

        Ok(records)
    }

    /// P2 value for this call
    pub fn p2(&self) -> u8 {
        match self.new_tx {
            true => self.mode.family.start_p2(),
            false => P2_CONTINUE,
        }
    }
}

impl<'a> Command for HashInputStartReq<'a> {
    const INS: Instruction = Instruction::UntrustedHashTxInputStart;

    fn apdus(&self, cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        let p2 = self.p2();

        frame_records(&self.records()?, cfg.max_chunk)?
            .into_iter()
            .enumerate()
            .map(|(i, data)| {
                let p1 = match i {
                    0 => P1_FIRST,
                    _ => P1_NEXT,
                };
                new_apdu(Self::INS, p1, p2, data)
            })
            .collect()
    }
}

/// Hash the change path and outputs of the transaction
///
/// The change path (or a single zero byte where there is no change) is
/// always sent first, followed by the output count and each output.
#[derive(Clone, PartialEq, Debug)]
pub struct HashFinalizeReq<'a> {
    pub outputs: &'a [TxOutput],
    pub change_path: Option<&'a DerivationPath>,
}

impl<'a> HashFinalizeReq<'a> {
    pub fn new(outputs: &'a [TxOutput], change_path: Option<&'a DerivationPath>) -> Self {
        Self {
            outputs,
            change_path,
        }
    }
}

impl<'a> Command for HashFinalizeReq<'a> {
    const INS: Instruction = Instruction::UntrustedHashTxInputFinalizeFull;

    fn apdus(&self, cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        let change = match self.change_path {
            Some(p) => p.to_bytes(),
            None => alloc::vec![0x00],
        };

        // The app reads the change path from a single APDU
        if change.len() > cfg.max_chunk {
            return Err(Error::InvalidParameter);
        }

        let mut apdus = alloc::vec![new_apdu(Self::INS, P1_CHANGE, 0x00, change)?];

        let mut records = Vec::with_capacity(1 + self.outputs.len());
        records.push(Record::new(varint(self.outputs.len() as u64)));
        for o in self.outputs {
            let mut b = Vec::with_capacity(9 + o.script.len());
            o.encode(&mut b);
            records.push(Record::new(b));
        }

        let payloads = frame_records(&records, cfg.max_chunk)?;
        let n = payloads.len();

        for (i, data) in payloads.into_iter().enumerate() {
            let p1 = match i == n - 1 {
                true => P1_LAST,
                false => P1_MORE,
            };
            apdus.push(new_apdu(Self::INS, p1, 0x00, data)?);
        }

        Ok(apdus)
    }
}
