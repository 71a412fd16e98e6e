// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Random value APDUs

use alloc::vec::Vec;
use core::ops::RangeInclusive;

use crate::{new_apdu, Apdu, BuilderConfig, Command, Error, Instruction};

/// Number of random bytes the app will return per request
pub const RANDOM_LEN: RangeInclusive<usize> = 5..=248;

/// Request random bytes from the device
///
/// The payload is `len` zero bytes, the device responds with the same
/// number of random bytes.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct RandomReq {
    pub len: usize,
}

impl RandomReq {
    /// Create a new random request for `len` bytes
    pub fn new(len: usize) -> Result<Self, Error> {
        if !RANDOM_LEN.contains(&len) {
            return Err(Error::InvalidParameter);
        }
        Ok(Self { len })
    }

    /// Check a response carries the requested number of bytes
    pub fn check_response(&self, data: &[u8]) -> Result<(), Error> {
        match data.len() == self.len {
            true => Ok(()),
            false => Err(Error::InvalidLength),
        }
    }
}

impl Command for RandomReq {
    const INS: Instruction = Instruction::GetRandom;

    fn apdus(&self, _cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        if !RANDOM_LEN.contains(&self.len) {
            return Err(Error::InvalidParameter);
        }

        let a = new_apdu(Self::INS, 0x00, 0x00, alloc::vec![0u8; self.len])?;
        Ok(alloc::vec![a])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn random_req_apdu() {
        let r = RandomReq::new(8).unwrap();
        let a = r.apdus(&BuilderConfig::default()).unwrap();

        assert_eq!(a.len(), 1);
        assert_eq!(hex::encode(a[0].serialize()), "e0c00000080000000000000000");

        assert!(r.check_response(&[0xaa; 8]).is_ok());
        assert_eq!(r.check_response(&[0xaa; 7]), Err(Error::InvalidLength));
    }

    #[test]
    fn random_len_bounds() {
        assert!(RandomReq::new(5).is_ok());
        assert!(RandomReq::new(248).is_ok());
        assert_eq!(RandomReq::new(4), Err(Error::InvalidParameter));
        assert_eq!(RandomReq::new(249), Err(Error::InvalidParameter));
    }
}
