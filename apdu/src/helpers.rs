// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

use alloc::string::String;

use encdec::Decode;

use crate::Error;

/// Decode a response object, requiring the whole buffer to be consumed
pub fn decode_exact<T>(buff: &[u8]) -> Result<T, Error>
where
    T: for<'a> Decode<'a, Output = T, Error = Error>,
{
    let (v, n) = T::decode(buff)?;
    if n != buff.len() {
        return Err(Error::InvalidLength);
    }
    Ok(v)
}

/// Read a single-byte length prefixed ASCII string
pub(crate) fn read_ascii(buff: &[u8], index: &mut usize) -> Result<String, Error> {
    let len = *buff.get(*index).ok_or(Error::InvalidLength)? as usize;
    let b = buff.get(*index + 1..*index + 1 + len).ok_or(Error::InvalidLength)?;

    if !b.is_ascii() {
        return Err(Error::InvalidEncoding);
    }
    *index += 1 + len;

    // ASCII is always valid UTF-8
    Ok(b.iter().map(|c| *c as char).collect())
}

/// Write a single-byte length prefixed ASCII string
pub(crate) fn write_ascii(s: &str, buff: &mut [u8], index: &mut usize) -> Result<(), Error> {
    if s.len() > u8::MAX as usize || !s.is_ascii() {
        return Err(Error::InvalidEncoding);
    }
    if buff.len() < *index + 1 + s.len() {
        return Err(Error::InvalidLength);
    }

    buff[*index] = s.len() as u8;
    buff[*index + 1..][..s.len()].copy_from_slice(s.as_bytes());
    *index += 1 + s.len();

    Ok(())
}

/// encdec helper module for fixed size arrays
pub(crate) mod arr {
    use encdec::Error;

    pub fn enc<const N: usize>(d: &[u8; N], buff: &mut [u8]) -> Result<usize, Error> {
        if buff.len() < N {
            return Err(Error::Length);
        }

        buff[..N].copy_from_slice(&d[..]);

        Ok(N)
    }

    pub fn enc_len<const N: usize>(_d: &[u8; N]) -> Result<usize, Error> {
        Ok(N)
    }

    pub fn dec<const N: usize>(buff: &[u8]) -> Result<([u8; N], usize), Error> {
        if buff.len() < N {
            return Err(Error::Length);
        }

        let mut d = [0u8; N];
        d.copy_from_slice(&buff[..N]);

        Ok((d, N))
    }
}
