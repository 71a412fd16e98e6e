// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Zcash transaction extensions
//!
//! Overwinter and sapling transactions carry a version group id after the
//! version, and a footer after the lock time. The footer is held raw for
//! re-serialisation, with the fields the signing protocol needs decoded.
//!
//! ```text
//! v >= 3: expiry height (u32 LE)
//! v >= 4: value balance (i64 LE)
//!         spend count, 384 bytes per spend
//!         output count, 948 bytes per output
//! v >= 2: join-split count, 1698 (v >= 4) or 1802 bytes per join-split
//!         if join-splits: pubkey (32) ‖ signature (64)
//! v >= 4: if spends or outputs: binding signature (64)
//! ```

use alloc::vec::Vec;

use byteorder::LittleEndian as LE;

use crate::{codec::Reader, Error};

/// Overwinter (v3) version group id
pub const OVERWINTER_VERSION_GROUP_ID: u32 = 0x03c4_8270;

/// Sapling (v4) version group id
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892f_2085;

const SPEND_LEN: usize = 384;
const OUTPUT_LEN: usize = 948;
const JOIN_SPLIT_LEN_SAPLING: usize = 1698;
const JOIN_SPLIT_LEN: usize = 1802;
const JOIN_SPLIT_PUBKEY_LEN: usize = 32;
const JOIN_SPLIT_SIG_LEN: usize = 64;
const BINDING_SIG_LEN: usize = 64;

/// Zcash fields following the lock time
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ZcashFooter {
    raw: Vec<u8>,

    /// Height after which the transaction expires (v >= 3)
    pub expiry_height: Option<u32>,

    /// Net value of sapling spends minus outputs (v >= 4)
    pub value_balance: Option<i64>,

    pub spend_count: u64,

    pub output_count: u64,

    pub join_split_count: u64,
}

impl ZcashFooter {
    /// Raw footer bytes as found after the lock time
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parse a footer for the provided (semantic) transaction version
    pub(crate) fn parse(r: &mut Reader, version: u32) -> Result<Self, Error> {
        let start = r.position();

        let mut expiry_height = None;
        let mut value_balance = None;
        let (mut spend_count, mut output_count, mut join_split_count) = (0, 0, 0);

        if version >= 3 {
            expiry_height = Some(r.u32::<LE>()?);
        }

        if version >= 4 {
            value_balance = Some(r.u64::<LE>()? as i64);

            spend_count = r.varint()?;
            skip_items(r, spend_count, SPEND_LEN)?;

            output_count = r.varint()?;
            skip_items(r, output_count, OUTPUT_LEN)?;
        }

        if version >= 2 {
            join_split_count = r.varint()?;

            let len = match version >= 4 {
                true => JOIN_SPLIT_LEN_SAPLING,
                false => JOIN_SPLIT_LEN,
            };
            skip_items(r, join_split_count, len)?;

            if join_split_count > 0 {
                r.skip(JOIN_SPLIT_PUBKEY_LEN + JOIN_SPLIT_SIG_LEN)?;
            }
        }

        if version >= 4 && spend_count + output_count > 0 {
            r.skip(BINDING_SIG_LEN)?;
        }

        Ok(Self {
            raw: r.since(start).to_vec(),
            expiry_height,
            value_balance,
            spend_count,
            output_count,
            join_split_count,
        })
    }
}

fn skip_items(r: &mut Reader, count: u64, len: usize) -> Result<(), Error> {
    let n = (count as usize)
        .checked_mul(len)
        .ok_or(Error::TruncatedInput)?;
    r.skip(n)
}
