// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Signing APDUs
//!
//! `UntrustedHashSign` completes the running transaction hash and returns
//! a DER encoded ECDSA signature. The lock time is sent big-endian, unlike
//! the little-endian lock time inside the transaction.
//!
//! ```text
//! path ‖ 0x00 ‖ lock time (BE) ‖ sighash ‖ [expiry height (BE)]
//! ```

use alloc::vec::Vec;

use byteorder::BigEndian;
use encdec::{DecodeOwned, Encode};

use crate::{
    codec::put_u32, new_apdu, path::DerivationPath, Apdu, BuilderConfig, Command, Error,
    Instruction,
};

/// Sign all inputs and outputs
pub const SIGHASH_ALL: u8 = 0x01;

/// Maximum DER signature length (two 33 byte integers)
const MAX_DER_LEN: usize = 2 + 2 * (2 + 33);

/// Sign the hashed transaction with the key at `path`
#[derive(Clone, PartialEq, Debug)]
pub struct HashSignReq {
    /// Signing key path, empty for the zcash intermediate call
    pub path: DerivationPath,
    pub lock_time: u32,
    pub sighash: u8,
    /// Expiry height, sent for zcash transactions only
    pub expiry_height: Option<u32>,
}

impl HashSignReq {
    /// Create a sign request for the provided path and lock time
    pub fn new(path: DerivationPath, lock_time: u32) -> Self {
        Self {
            path,
            lock_time,
            sighash: SIGHASH_ALL,
            expiry_height: None,
        }
    }

    /// Set the zcash expiry height
    pub fn with_expiry(mut self, expiry_height: u32) -> Self {
        self.expiry_height = Some(expiry_height);
        self
    }
}

impl Command for HashSignReq {
    const INS: Instruction = Instruction::UntrustedHashSign;

    fn apdus(&self, _cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        let mut b = self.path.to_bytes();

        // Empty user validation code
        b.push(0x00);
        put_u32::<BigEndian>(&mut b, self.lock_time);
        b.push(self.sighash);

        if let Some(h) = self.expiry_height {
            put_u32::<BigEndian>(&mut b, h);
        }

        Ok(alloc::vec![new_apdu(Self::INS, 0x00, 0x00, b)?])
    }
}

/// Transaction signature
///
/// The device returns the DER signature with the parity of the
/// signature's R point in the low bit of the first byte, followed by the
/// sighash type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature {
    /// R point y-coordinate parity (odd)
    pub parity: bool,
    der: Vec<u8>,
    pub sighash: u8,
}

impl Signature {
    /// Create a signature from a DER encoding, checking its structure
    pub fn new(der: &[u8], parity: bool, sighash: u8) -> Result<Self, Error> {
        check_der(der)?;

        Ok(Self {
            parity,
            der: der.to_vec(),
            sighash,
        })
    }

    /// DER encoded signature
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Signature as used in scripts (DER ‖ sighash)
    pub fn to_script_bytes(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(self.der.len() + 1);
        b.extend_from_slice(&self.der);
        b.push(self.sighash);
        b
    }
}

impl Encode for Signature {
    type Error = Error;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(self.der.len() + 1)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.der.len();
        if buff.len() < n + 1 {
            return Err(Error::InvalidLength);
        }

        buff[..n].copy_from_slice(&self.der);
        if self.parity {
            buff[0] |= 0x01;
        }
        buff[n] = self.sighash;

        Ok(n + 1)
    }
}

impl DecodeOwned for Signature {
    type Output = Self;
    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < 2 {
            return Err(Error::InvalidLength);
        }

        let der_len = buff[1] as usize + 2;
        if buff.len() < der_len + 1 {
            return Err(Error::InvalidLength);
        }

        let mut der = buff[..der_len].to_vec();
        let parity = der[0] & 0x01 != 0;
        der[0] &= !0x01;

        check_der(&der)?;

        let s = Self {
            parity,
            der,
            sighash: buff[der_len],
        };

        Ok((s, der_len + 1))
    }
}

/// Check DER signature structure `30 L 02 rlen r 02 slen s`
pub(crate) fn check_der(der: &[u8]) -> Result<(), Error> {
    if der.len() < 8 || der.len() > MAX_DER_LEN {
        return Err(Error::InvalidLength);
    }
    if der[0] != 0x30 || der[1] as usize != der.len() - 2 {
        return Err(Error::InvalidEncoding);
    }

    let mut index = 2;
    for _ in 0..2 {
        if der.get(index) != Some(&0x02) {
            return Err(Error::InvalidEncoding);
        }

        let n = *der.get(index + 1).ok_or(Error::InvalidEncoding)? as usize;
        if n == 0 || n > 33 || index + 2 + n > der.len() {
            return Err(Error::InvalidEncoding);
        }
        index += 2 + n;
    }

    if index != der.len() {
        return Err(Error::InvalidEncoding);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use core::str::FromStr;

    use super::*;
    use crate::{decode_exact, test::encode_decode};

    /// Signature from a segwit spend, sighash appended
    const SIG: &str = concat!(
        "30440220495838c36533616d8cbd6474842459596f4f312dce5483fe650791c8",
        "2e17221c02200660520a2584144915efa8519a72819091e5ed78c52689b24235",
        "182f17d96302",
        "01",
    );

    #[test]
    fn hash_sign_apdu() {
        let path = DerivationPath::from_str("m/0'/0/0").unwrap();
        let r = HashSignReq::new(path, 0x001901a7);

        let a = r.apdus(&BuilderConfig::default()).unwrap();
        assert_eq!(
            hex::encode(a[0].serialize()),
            "e0480000130380000000000000000000000000001901a701"
        );
    }

    #[test]
    fn hash_sign_zcash_intermediate() {
        let r = HashSignReq::new(DerivationPath::default(), 0x5eb3f840).with_expiry(0);

        let a = r.apdus(&BuilderConfig::default()).unwrap();
        assert_eq!(hex::encode(a[0].serialize()), "e04800000b00005eb3f8400100000000");
    }

    #[test]
    fn signature_decode() {
        let b = hex::decode(SIG).unwrap();

        let s: Signature = decode_exact(&b).unwrap();
        assert!(!s.parity);
        assert_eq!(s.sighash, SIGHASH_ALL);
        assert_eq!(s.der().len(), 0x46);
        assert_eq!(s.to_script_bytes(), b);

        encode_decode(&s);

        // Odd parity is carried in the first byte
        let mut odd = b.clone();
        odd[0] = 0x31;
        let s: Signature = decode_exact(&odd).unwrap();
        assert!(s.parity);
        assert_eq!(s.der()[0], 0x30);
        assert_eq!(encode_decode(&s), odd);
    }

    #[test]
    fn signature_decode_malformed() {
        let b = hex::decode(SIG).unwrap();

        // Missing sighash
        assert_eq!(
            decode_exact::<Signature>(&b[..b.len() - 1]),
            Err(Error::InvalidLength)
        );

        // Bad sequence tag
        let mut m = b.clone();
        m[0] = 0x20;
        assert_eq!(decode_exact::<Signature>(&m), Err(Error::InvalidEncoding));

        // Bad integer tag
        let mut m = b.clone();
        m[2] = 0x03;
        assert_eq!(decode_exact::<Signature>(&m), Err(Error::InvalidEncoding));

        // R length overruns
        let mut m = b.clone();
        m[3] = 0x21;
        assert_eq!(decode_exact::<Signature>(&m), Err(Error::InvalidEncoding));
    }
}
