// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Message signing APDUs
//!
//! Messages are streamed to the app with P1 `0x00`, the first APDU
//! carrying the signing path and the message length:
//!
//! ```text
//! first: path ‖ message length (u16 BE) ‖ message...   (P2 0x01)
//! next:  message...                                    (P2 0x80)
//! ```
//!
//! The app answers `00` while more of the message is expected and `0000`
//! once the whole message is hashed. Signing is then requested with P1
//! `0x80` and an empty user validation code, the app prompts the user and
//! returns the DER signature with the R point parity in the first byte.

use alloc::vec::Vec;

use byteorder::BigEndian;
use encdec::{DecodeOwned, Encode};

use crate::{
    codec::put_u16, hash_sign::check_der, new_apdu, path::DerivationPath, Apdu, BuilderConfig,
    Command, Error, Instruction,
};

const P1_PREPARE: u8 = 0x00;
const P1_SIGN: u8 = 0x80;
const P2_FIRST: u8 = 0x01;
const P2_NEXT: u8 = 0x80;

/// Response to the final prepare APDU
pub const MESSAGE_PREPARED: [u8; 2] = [0x00, 0x00];

/// Stream a message to be signed with the key at `path`
#[derive(Clone, PartialEq, Debug)]
pub struct MessagePrepareReq<'a> {
    pub path: DerivationPath,
    pub message: &'a [u8],
}

impl<'a> MessagePrepareReq<'a> {
    /// Create a prepare request, the app accepts messages of 1 to 65535 bytes
    pub fn new(path: DerivationPath, message: &'a [u8]) -> Result<Self, Error> {
        if message.is_empty() || message.len() > u16::MAX as usize {
            return Err(Error::InvalidParameter);
        }
        Ok(Self { path, message })
    }
}

impl<'a> Command for MessagePrepareReq<'a> {
    const INS: Instruction = Instruction::SignMessage;

    fn apdus(&self, cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        let len = u16::try_from(self.message.len()).map_err(|_| Error::InvalidParameter)?;
        if len == 0 {
            return Err(Error::InvalidParameter);
        }

        let mut first = self.path.to_bytes();
        put_u16::<BigEndian>(&mut first, len);

        // Path and length must share the first APDU
        if first.len() >= cfg.max_chunk {
            return Err(Error::InvalidParameter);
        }

        let n = (cfg.max_chunk - first.len()).min(self.message.len());
        first.extend_from_slice(&self.message[..n]);

        let mut apdus = alloc::vec![new_apdu(Self::INS, P1_PREPARE, P2_FIRST, first)?];
        for c in self.message[n..].chunks(cfg.max_chunk) {
            apdus.push(new_apdu(Self::INS, P1_PREPARE, P2_NEXT, c.to_vec())?);
        }

        Ok(apdus)
    }
}

/// Sign the prepared message
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct MessageSignReq;

impl Command for MessageSignReq {
    const INS: Instruction = Instruction::SignMessage;

    fn apdus(&self, _cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        // Empty user validation code
        Ok(alloc::vec![new_apdu(Self::INS, P1_SIGN, 0x00, alloc::vec![0x00])?])
    }
}

/// Message signature
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MessageSignature {
    /// R point y-coordinate parity (odd)
    pub parity: bool,
    der: Vec<u8>,
}

impl MessageSignature {
    /// DER encoded signature
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// R and S as 32 byte big-endian integers
    pub fn rs(&self) -> Result<([u8; 32], [u8; 32]), Error> {
        let r_len = self.der[3] as usize;
        let r = &self.der[4..][..r_len];
        let s = &self.der[4 + r_len + 2..];

        Ok((int32(r)?, int32(s)?))
    }

    /// Compact recoverable signature (`header ‖ r ‖ s`) as used for
    /// signed message verification
    pub fn to_compact(&self, compressed: bool) -> Result<[u8; 65], Error> {
        let (r, s) = self.rs()?;

        let mut b = [0u8; 65];
        b[0] = 27 + self.parity as u8 + if compressed { 4 } else { 0 };
        b[1..33].copy_from_slice(&r);
        b[33..].copy_from_slice(&s);

        Ok(b)
    }
}

/// Left pad a DER integer to 32 bytes, dropping sign padding
fn int32(v: &[u8]) -> Result<[u8; 32], Error> {
    let v = match v {
        [0x00, rest @ ..] if rest.len() == 32 => rest,
        v if v.len() <= 32 => v,
        _ => return Err(Error::InvalidEncoding),
    };

    let mut b = [0u8; 32];
    b[32 - v.len()..].copy_from_slice(v);
    Ok(b)
}

impl Encode for MessageSignature {
    type Error = Error;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.der.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.der.len();
        if buff.len() < n {
            return Err(Error::InvalidLength);
        }

        buff[..n].copy_from_slice(&self.der);
        if self.parity {
            buff[0] |= 0x01;
        }

        Ok(n)
    }
}

impl DecodeOwned for MessageSignature {
    type Output = Self;
    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < 2 {
            return Err(Error::InvalidLength);
        }

        let n = buff[1] as usize + 2;
        if buff.len() < n {
            return Err(Error::InvalidLength);
        }

        let mut der = buff[..n].to_vec();
        let parity = der[0] & 0x01 != 0;
        der[0] &= !0x01;

        check_der(&der)?;

        Ok((Self { parity, der }, n))
    }
}
