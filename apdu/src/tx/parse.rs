// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Transaction parser

use alloc::vec::Vec;

use byteorder::{ByteOrder, LittleEndian as LE};

use super::{
    Tx, TxInput, TxKind, TxOutput, ZcashFooter, OVERWINTER_FLAG, OVERWINTER_VERSION_GROUP_ID,
    SAPLING_VERSION_GROUP_ID, SEGWIT_MARKER,
};
use crate::{codec::Reader, Error};

impl Tx {
    /// Parse a raw transaction
    ///
    /// The kind is detected from the bytes following the version:
    /// a known zcash version group id, or a segwit marker (distinguished
    /// from a single-output coinbase-style legacy layout by its length).
    /// Anything else is parsed as legacy.
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(raw);

        let version = r.u32::<LE>()?;
        let kind = classify(&r, version)?;

        #[cfg(feature = "log")]
        log::trace!("Parsing {} transaction (version: {:08x})", kind, version);

        let version_group_id = match kind {
            TxKind::ZcashPreSapling | TxKind::ZcashSapling => Some(r.u32::<LE>()?),
            _ => None,
        };

        if kind == TxKind::Segwit {
            r.skip(SEGWIT_MARKER.len())?;
        }

        let inputs = parse_inputs(&mut r)?;
        let outputs = parse_outputs(&mut r)?;

        // Witnesses are held opaque, the lock time is the final field
        let witness = match kind {
            TxKind::Segwit if r.remaining() < 4 => return Err(Error::TruncatedInput),
            TxKind::Segwit => r.bytes(r.remaining() - 4)?.to_vec(),
            _ => Vec::new(),
        };

        let lock_time = r.u32::<LE>()?;

        let footer = match kind.is_zcash() {
            true => Some(ZcashFooter::parse(&mut r, version & !OVERWINTER_FLAG)?),
            false => None,
        };

        if r.remaining() != 0 {
            return Err(Error::TrailingData);
        }

        Ok(Self {
            kind,
            version,
            version_group_id,
            inputs,
            outputs,
            witness,
            lock_time,
            footer,
        })
    }
}

/// Peek at the bytes following the version to determine the transaction kind
fn classify(r: &Reader, version: u32) -> Result<TxKind, Error> {
    let overwintered = version & OVERWINTER_FLAG != 0;

    // Zcash is identified by the version group id, the flag alone only
    // rules out other kinds
    match r.peek(4).map(LE::read_u32) {
        Some(OVERWINTER_VERSION_GROUP_ID) => return Ok(TxKind::ZcashPreSapling),
        Some(SAPLING_VERSION_GROUP_ID) => return Ok(TxKind::ZcashSapling),
        None if overwintered => return Err(Error::TruncatedInput),
        Some(_) if overwintered => return Err(Error::UnsupportedTxKind),
        _ => (),
    }

    if r.peek(2) != Some(&SEGWIT_MARKER[..]) {
        return Ok(TxKind::Legacy);
    }

    // `00 01` is also the start of a legacy transaction with no inputs and
    // a single output: skip the output value and check whether the script
    // length leaves exactly the lock time.
    let mut p = r.clone();
    let kind = match p.skip(2 + 8).and_then(|_| p.u8()) {
        Ok(script_len) if p.remaining() == script_len as usize + 4 => TxKind::Legacy,
        _ => TxKind::Segwit,
    };

    Ok(kind)
}

fn parse_inputs(r: &mut Reader) -> Result<Vec<TxInput>, Error> {
    let count = r.varint()?;

    // Each input occupies at least 41 bytes
    if count > (r.remaining() / 41) as u64 {
        return Err(Error::TruncatedInput);
    }

    let mut inputs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        inputs.push(TxInput {
            prev_hash: r.array()?,
            prev_index: r.u32::<LE>()?,
            script: r.var_bytes()?.to_vec(),
            sequence: r.u32::<LE>()?,
        });
    }

    Ok(inputs)
}

fn parse_outputs(r: &mut Reader) -> Result<Vec<TxOutput>, Error> {
    let count = r.varint()?;

    // Each output occupies at least 9 bytes
    if count > (r.remaining() / 9) as u64 {
        return Err(Error::TruncatedInput);
    }

    let mut outputs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        outputs.push(TxOutput {
            value: r.u64::<LE>()?,
            script: r.var_bytes()?.to_vec(),
        });
    }

    Ok(outputs)
}
