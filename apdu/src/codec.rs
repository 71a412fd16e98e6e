// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Codec primitives shared by the transaction model and APDU builders
//!
//! Byte order is always explicit, via [`byteorder`] type parameters
//! (`LittleEndian` for transaction fields, `BigEndian` for BIP32 paths
//! and the signing parameters that the app expects big-endian).

use alloc::vec::Vec;

use byteorder::ByteOrder;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::Error;

/// Compute the encoded length of a compact-size integer
pub const fn varint_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append a compact-size integer to `out`
///
/// ```text
/// n < 0xfd         [n]
/// n <= 0xffff      [0xfd, u16 LE]
/// n <= 0xffffffff  [0xfe, u32 LE]
/// otherwise        [0xff, u64 LE]
/// ```
pub fn put_varint(out: &mut Vec<u8>, n: u64) {
    use byteorder::LittleEndian as LE;

    match varint_len(n) {
        1 => out.push(n as u8),
        3 => {
            out.push(0xfd);
            put_u16::<LE>(out, n as u16);
        }
        5 => {
            out.push(0xfe);
            put_u32::<LE>(out, n as u32);
        }
        _ => {
            out.push(0xff);
            put_u64::<LE>(out, n);
        }
    }
}

/// Encode a compact-size integer to a new buffer
pub fn varint(n: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_len(n));
    put_varint(&mut out, n);
    out
}

/// Decode a compact-size integer, returning the value and bytes consumed
///
/// Non-minimal encodings are rejected so decoding is the exact inverse
/// of [`put_varint`].
pub fn decode_varint(buff: &[u8]) -> Result<(u64, usize), Error> {
    use byteorder::LittleEndian as LE;

    let (v, n) = match buff.first() {
        None => return Err(Error::MalformedVarint),
        Some(&b) if b < 0xfd => return Ok((b as u64, 1)),
        Some(0xfd) if buff.len() >= 3 => (LE::read_u16(&buff[1..]) as u64, 3),
        Some(0xfe) if buff.len() >= 5 => (LE::read_u32(&buff[1..]) as u64, 5),
        Some(0xff) if buff.len() >= 9 => (LE::read_u64(&buff[1..]), 9),
        Some(_) => return Err(Error::MalformedVarint),
    };

    if varint_len(v) != n {
        return Err(Error::MalformedVarint);
    }

    Ok((v, n))
}

/// Append a u16 in the specified byte order
pub fn put_u16<B: ByteOrder>(out: &mut Vec<u8>, v: u16) {
    let mut b = [0u8; 2];
    B::write_u16(&mut b, v);
    out.extend_from_slice(&b);
}

/// Append a u32 in the specified byte order
pub fn put_u32<B: ByteOrder>(out: &mut Vec<u8>, v: u32) {
    let mut b = [0u8; 4];
    B::write_u32(&mut b, v);
    out.extend_from_slice(&b);
}

/// Append a u64 in the specified byte order
pub fn put_u64<B: ByteOrder>(out: &mut Vec<u8>, v: u64) {
    let mut b = [0u8; 8];
    B::write_u64(&mut b, v);
    out.extend_from_slice(&b);
}

/// Double SHA256, as used for transaction ids
pub fn hash256(data: &[u8]) -> [u8; 32] {
    let h = Sha256::digest(Sha256::digest(data));
    h.into()
}

/// RIPEMD160(SHA256(data)), as used for public key / script hashes
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let h = Ripemd160::digest(Sha256::digest(data));
    h.into()
}

/// Cursor over a byte buffer for sequential decoding
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    buff: &'a [u8],
    index: usize,
}

impl<'a> Reader<'a> {
    /// Create a new reader over the provided buffer
    pub fn new(buff: &'a [u8]) -> Self {
        Self { buff, index: 0 }
    }

    /// Current offset into the buffer
    pub fn position(&self) -> usize {
        self.index
    }

    /// Number of bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buff.len() - self.index
    }

    /// Borrow the bytes between `start` and the current position
    pub fn since(&self, start: usize) -> &'a [u8] {
        &self.buff[start..self.index]
    }

    /// Look at the next `n` bytes without consuming them
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.buff.get(self.index..self.index + n)
    }

    /// Read `n` bytes
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(Error::TruncatedInput);
        }

        let b = &self.buff[self.index..][..n];
        self.index += n;

        Ok(b)
    }

    /// Read a fixed-size array
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.bytes(N)?);
        Ok(a)
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.bytes(n).map(|_| ())
    }

    /// Read a single byte
    pub fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.bytes(1)?[0])
    }

    /// Read a u16 in the specified byte order
    pub fn u16<B: ByteOrder>(&mut self) -> Result<u16, Error> {
        Ok(B::read_u16(self.bytes(2)?))
    }

    /// Read a u32 in the specified byte order
    pub fn u32<B: ByteOrder>(&mut self) -> Result<u32, Error> {
        Ok(B::read_u32(self.bytes(4)?))
    }

    /// Read a u64 in the specified byte order
    pub fn u64<B: ByteOrder>(&mut self) -> Result<u64, Error> {
        Ok(B::read_u64(self.bytes(8)?))
    }

    /// Read a compact-size integer
    pub fn varint(&mut self) -> Result<u64, Error> {
        let (v, n) = match decode_varint(&self.buff[self.index..]) {
            Ok(v) => v,
            // Distinguish running out of bytes from bad encodings
            Err(_) if self.varint_truncated() => return Err(Error::TruncatedInput),
            Err(e) => return Err(e),
        };
        self.index += n;
        Ok(v)
    }

    /// Read a compact-size length prefix, bounded by the remaining input
    pub fn length(&mut self) -> Result<usize, Error> {
        let n = self.varint()?;
        if n > self.remaining() as u64 {
            return Err(Error::TruncatedInput);
        }
        Ok(n as usize)
    }

    /// Read a compact-size prefixed byte string
    pub fn var_bytes(&mut self) -> Result<&'a [u8], Error> {
        let n = self.length()?;
        self.bytes(n)
    }

    fn varint_truncated(&self) -> bool {
        let needed = match self.buff.get(self.index) {
            None => return true,
            Some(0xfd) => 3,
            Some(0xfe) => 5,
            Some(0xff) => 9,
            Some(_) => 1,
        };
        self.remaining() < needed
    }
}
