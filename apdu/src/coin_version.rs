// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Coin version APDUs

use alloc::{string::String, vec::Vec};

use byteorder::{BigEndian, ByteOrder};
use encdec::{DecodeOwned, Encode};

use crate::{
    helpers::{read_ascii, write_ascii},
    new_apdu, Apdu, BuilderConfig, Command, Error, Instruction,
};

/// Fetch coin parameters APDU
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct CoinVersionReq;

impl Command for CoinVersionReq {
    const INS: Instruction = Instruction::GetCoinVersion;

    fn apdus(&self, _cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        Ok(alloc::vec![new_apdu(Self::INS, 0x00, 0x00, Vec::new())?])
    }
}

/// Coin version response
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      P2PKH_PREFIX (BE)        |       P2SH_PREFIX (BE)        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    FAMILY     |   NAME_LEN    |           NAME...             /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  TICKER_LEN   |                  TICKER...                    /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct CoinVersion {
    pub p2pkh_prefix: u16,
    pub p2sh_prefix: u16,
    pub family: u8,
    pub name: String,
    pub ticker: String,
}

impl Encode for CoinVersion {
    type Error = Error;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(5 + 1 + self.name.len() + 1 + self.ticker.len())
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        if buff.len() < self.encode_len()? {
            return Err(Error::InvalidLength);
        }

        let mut index = 0;

        BigEndian::write_u16(&mut buff[0..], self.p2pkh_prefix);
        BigEndian::write_u16(&mut buff[2..], self.p2sh_prefix);
        buff[4] = self.family;
        index += 5;

        write_ascii(&self.name, buff, &mut index)?;
        write_ascii(&self.ticker, buff, &mut index)?;

        Ok(index)
    }
}

impl DecodeOwned for CoinVersion {
    type Output = Self;
    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < 5 {
            return Err(Error::InvalidLength);
        }

        let mut index = 5;
        let name = read_ascii(buff, &mut index)?;
        let ticker = read_ascii(buff, &mut index)?;

        let v = Self {
            p2pkh_prefix: BigEndian::read_u16(&buff[0..]),
            p2sh_prefix: BigEndian::read_u16(&buff[2..]),
            family: buff[4],
            name,
            ticker,
        };

        Ok((v, index))
    }
}
