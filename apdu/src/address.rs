// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Address kinds and output scripts
//!
//! Address strings are classified by prefix, decoded (base58check or
//! bech32 segwit) and turned into output scripts.

use alloc::vec::Vec;

use strum::Display;

use crate::{codec::hash160, Error};

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

/// Address kind, determined from the address prefix
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum AddressKind {
    /// Pay to public key hash (`1`, `m`, `n`)
    P2pkh,
    /// Pay to script hash (`3`, `2`)
    P2sh,
    /// Native segwit witness program (`bc1`, `tb1`)
    WitnessProgram,
}

impl AddressKind {
    /// Classify an address string by prefix
    pub fn classify(addr: &str) -> Result<Self, Error> {
        let lower = addr.get(..3).map(|p| p.to_ascii_lowercase());
        if matches!(lower.as_deref(), Some("bc1") | Some("tb1")) {
            return Ok(AddressKind::WitnessProgram);
        }

        match addr.chars().next() {
            Some('1') | Some('m') | Some('n') => Ok(AddressKind::P2pkh),
            Some('3') | Some('2') => Ok(AddressKind::P2sh),
            _ => Err(Error::UnsupportedAddress),
        }
    }

    /// Decode an address string to its script payload
    ///
    /// Base58check addresses yield the 20 byte hash following the version
    /// byte, segwit addresses the witness version followed by the program.
    pub fn decode(&self, addr: &str) -> Result<Vec<u8>, Error> {
        match self {
            AddressKind::P2pkh | AddressKind::P2sh => {
                let b = bs58::decode(addr)
                    .with_check(None)
                    .into_vec()
                    .map_err(|_| Error::UnsupportedAddress)?;

                match b.split_first() {
                    Some((_version, hash)) if hash.len() == 20 => Ok(hash.to_vec()),
                    _ => Err(Error::UnsupportedAddress),
                }
            }
            AddressKind::WitnessProgram => {
                let (_hrp, version, program) =
                    bech32::segwit::decode(addr).map_err(|_| Error::UnsupportedAddress)?;

                let mut b = Vec::with_capacity(1 + program.len());
                b.push(version.to_u8());
                b.extend_from_slice(&program);
                Ok(b)
            }
        }
    }

    /// Build the output script for a decoded address payload
    ///
    /// For hash addresses `payload` is the 20 byte hash, for witness
    /// programs it is the witness version followed by the program.
    pub fn script_pubkey(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        match self {
            AddressKind::P2pkh => Ok(p2pkh_script(&hash_payload(payload)?)),
            AddressKind::P2sh => Ok(p2sh_script(&hash_payload(payload)?)),
            AddressKind::WitnessProgram => match payload.split_first() {
                Some((v, program)) => witness_script(*v, program),
                None => Err(Error::UnsupportedAddress),
            },
        }
    }
}

/// Output script paying to an address string
pub fn address_script(addr: &str) -> Result<Vec<u8>, Error> {
    let kind = AddressKind::classify(addr)?;
    kind.script_pubkey(&kind.decode(addr)?)
}

fn hash_payload(payload: &[u8]) -> Result<[u8; 20], Error> {
    payload.try_into().map_err(|_| Error::UnsupportedAddress)
}

/// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(25);
    s.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
    s.extend_from_slice(hash);
    s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    s
}

/// `OP_HASH160 <hash> OP_EQUAL`
pub fn p2sh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(23);
    s.extend_from_slice(&[OP_HASH160, 20]);
    s.extend_from_slice(hash);
    s.push(OP_EQUAL);
    s
}

/// Witness program output script (`OP_n <program>`)
pub fn witness_script(version: u8, program: &[u8]) -> Result<Vec<u8>, Error> {
    if version > 16 || !(2..=40).contains(&program.len()) {
        return Err(Error::UnsupportedAddress);
    }

    let op = match version {
        0 => OP_0,
        v => OP_1 + v - 1,
    };

    let mut s = Vec::with_capacity(2 + program.len());
    s.push(op);
    s.push(program.len() as u8);
    s.extend_from_slice(program);
    Ok(s)
}

/// P2SH wrapped P2WPKH output script for a public key hash
pub fn p2sh_p2wpkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut redeem = Vec::with_capacity(22);
    redeem.extend_from_slice(&[OP_0, 20]);
    redeem.extend_from_slice(pubkey_hash);

    p2sh_script(&hash160(&redeem))
}

/// Check for an `OP_HASH160 <hash> OP_EQUAL` script
pub fn is_p2sh(script: &[u8]) -> bool {
    matches!(script, [OP_HASH160, 20, h @ .., OP_EQUAL] if h.len() == 20)
}

/// Extract the public key hash from a P2PKH or P2WPKH script
pub fn pubkey_hash(script: &[u8]) -> Option<[u8; 20]> {
    let h = match script {
        [OP_DUP, OP_HASH160, 20, h @ .., OP_EQUALVERIFY, OP_CHECKSIG] if h.len() == 20 => h,
        [OP_0, 20, h @ ..] if h.len() == 20 => h,
        _ => return None,
    };
    h.try_into().ok()
}

/// Script signed for an input spending `script_pubkey`
///
/// P2WPKH outputs are signed with the equivalent P2PKH script, other
/// scripts are signed as-is.
pub fn signing_script(script_pubkey: &[u8]) -> Vec<u8> {
    match (script_pubkey.first(), pubkey_hash(script_pubkey)) {
        (Some(&OP_0), Some(h)) => p2pkh_script(&h),
        _ => script_pubkey.to_vec(),
    }
}

/// P2PKH script for a (compressed or uncompressed) SEC1 public key,
/// signed for wrapped segwit inputs
pub fn key_signing_script(key: &[u8]) -> Result<Vec<u8>, Error> {
    let c = compress_pub_key(key)?;
    Ok(p2pkh_script(&hash160(&c)))
}

/// Change output script for a device key, matching the kind of the
/// destination address
pub fn change_script(kind: AddressKind, key: &[u8]) -> Result<Vec<u8>, Error> {
    let h = hash160(&compress_pub_key(key)?);

    match kind {
        AddressKind::P2pkh => Ok(p2pkh_script(&h)),
        AddressKind::P2sh => Ok(p2sh_p2wpkh_script(&h)),
        AddressKind::WitnessProgram => witness_script(0, &h),
    }
}

/// Compress a SEC1 public key
///
/// Uncompressed (65 byte) keys are compressed, compressed (33 byte) keys
/// are returned unchanged.
pub fn compress_pub_key(key: &[u8]) -> Result<[u8; 33], Error> {
    let mut c = [0u8; 33];

    match key {
        [0x04, xy @ ..] if xy.len() == 64 => {
            c[0] = 0x02 | (xy[63] & 0x01);
            c[1..].copy_from_slice(&xy[..32]);
        }
        [0x02 | 0x03, ..] if key.len() == 33 => c.copy_from_slice(key),
        _ => return Err(Error::InvalidEncoding),
    }

    Ok(c)
}
