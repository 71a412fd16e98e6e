// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! BIP32 derivation paths
//!
//! ## Encoding
//!
//! Paths are sent as an element count followed by big-endian 32-bit
//! elements, hardened elements have the top bit set.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     COUNT     |          ELEMENT 0 (BE)...                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   ...         |          ELEMENT N (BE)...                    /
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use alloc::vec::Vec;
use core::{fmt, str::FromStr};

use byteorder::{BigEndian, ByteOrder};
use encdec::{DecodeOwned, Encode};

use crate::Error;

/// Hardened derivation flag
pub const HARDENED: u32 = 0x8000_0000;

/// Maximum number of path elements accepted by the app
pub const MAX_PATH_LEN: usize = 10;

/// BIP32 derivation path
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// Create a derivation path from raw elements
    pub fn new(elements: &[u32]) -> Result<Self, Error> {
        if elements.len() > MAX_PATH_LEN {
            return Err(Error::InvalidPath);
        }
        Ok(Self(elements.to_vec()))
    }

    /// Path elements
    pub fn elements(&self) -> &[u32] {
        &self.0
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the path is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode to a new buffer (count ‖ BE elements)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 4 * self.0.len());
        out.push(self.0.len() as u8);
        for e in &self.0 {
            crate::codec::put_u32::<BigEndian>(&mut out, *e);
        }
        out
    }
}

/// Parse paths in the form `m/44'/0'/0'/0/1`, the `m/` prefix is optional
/// and hardened elements may be marked with `'`, `h` or `H`.
impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("m/").unwrap_or(s);
        if s.is_empty() || s == "m" {
            return Ok(Self::default());
        }

        let mut elements = Vec::new();
        for e in s.split('/') {
            let (n, hardened) = match e.strip_suffix(&['\'', 'h', 'H'][..]) {
                Some(n) => (n, true),
                None => (e, false),
            };

            let v = n.parse::<u32>().map_err(|_| Error::InvalidPath)?;
            if v & HARDENED != 0 {
                return Err(Error::InvalidPath);
            }

            elements.push(if hardened { v | HARDENED } else { v });
        }

        Self::new(&elements)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for e in &self.0 {
            match e & HARDENED != 0 {
                true => write!(f, "/{}'", e & !HARDENED)?,
                false => write!(f, "/{e}")?,
            }
        }
        Ok(())
    }
}

impl Encode for DerivationPath {
    type Error = Error;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1 + 4 * self.0.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.encode_len()?;
        if buff.len() < n {
            return Err(Error::InvalidLength);
        }

        buff[0] = self.0.len() as u8;
        for (i, e) in self.0.iter().enumerate() {
            BigEndian::write_u32(&mut buff[1 + 4 * i..], *e);
        }

        Ok(n)
    }
}

impl DecodeOwned for DerivationPath {
    type Output = Self;
    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let count = *buff.first().ok_or(Error::InvalidLength)? as usize;
        if count > MAX_PATH_LEN {
            return Err(Error::InvalidPath);
        }

        let n = 1 + 4 * count;
        if buff.len() < n {
            return Err(Error::InvalidLength);
        }

        let elements = buff[1..n].chunks(4).map(BigEndian::read_u32).collect();

        Ok((Self(elements), n))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::encode_decode;

    #[test]
    fn parse_paths() {
        let p = DerivationPath::from_str("m/44'/133'/0'/0/1").unwrap();
        assert_eq!(
            p.elements(),
            &[HARDENED | 44, HARDENED | 133, HARDENED, 0, 1]
        );
        assert_eq!(p.to_string(), "m/44'/133'/0'/0/1");

        let q = DerivationPath::from_str("84h/1H/0'").unwrap();
        assert_eq!(q.elements(), &[HARDENED | 84, HARDENED | 1, HARDENED]);

        assert!(DerivationPath::from_str("m").unwrap().is_empty());
        assert_eq!(DerivationPath::from_str("m/x"), Err(Error::InvalidPath));
        assert_eq!(
            DerivationPath::from_str("m/2147483648"),
            Err(Error::InvalidPath)
        );
        assert_eq!(
            DerivationPath::from_str("0/1/2/3/4/5/6/7/8/9/10"),
            Err(Error::InvalidPath)
        );
    }

    #[test]
    fn path_encoding() {
        let p = DerivationPath::from_str("m/44'/133'/0'/0/1").unwrap();
        let b = encode_decode(&p);
        assert_eq!(
            hex::encode(b),
            "058000002c80000085800000000000000000000001"
        );
        assert_eq!(p.to_bytes(), encode_decode(&p));
    }
}
