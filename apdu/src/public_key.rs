// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Wallet public key APDUs

use alloc::{string::String, vec::Vec};

use encdec::{DecodeOwned, Encode};
use num_enum::TryFromPrimitive;
use strum::{Display, EnumIter, EnumString};

use crate::{
    helpers::{read_ascii, write_ascii},
    path::DerivationPath,
    new_apdu, Apdu, BuilderConfig, Command, Error, Instruction,
};

/// Address format returned alongside the public key
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumString, EnumIter, TryFromPrimitive)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum AddressFormat {
    /// Base58 P2PKH address
    Legacy = 0x00,
    /// Base58 P2SH-wrapped P2WPKH address
    P2shP2wpkh = 0x01,
    /// Bech32 native segwit address
    Bech32 = 0x02,
}

/// Fetch the public key for a BIP32 path
///
/// P1 selects whether the address is shown on the device for
/// verification, P2 the [`AddressFormat`]. The payload is the
/// encoded [`DerivationPath`].
#[derive(Clone, PartialEq, Debug)]
pub struct PublicKeyReq {
    pub path: DerivationPath,
    pub format: AddressFormat,
    /// Display the address on the device
    pub display: bool,
}

impl PublicKeyReq {
    pub fn new(path: DerivationPath, format: AddressFormat, display: bool) -> Self {
        Self {
            path,
            format,
            display,
        }
    }
}

impl Command for PublicKeyReq {
    const INS: Instruction = Instruction::GetWalletPublicKey;

    fn apdus(&self, _cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        let p1 = match self.display {
            true => 0x01,
            false => 0x00,
        };

        let a = new_apdu(Self::INS, p1, self.format as u8, self.path.to_bytes())?;
        Ok(alloc::vec![a])
    }
}

/// Wallet public key response
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    PK_LEN     |                PUBLIC_KEY...                  /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   ADDR_LEN    |                 ADDRESS...                    /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                        CHAIN_CODE (32)                        /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct WalletPublicKey {
    /// Public key (uncompressed, 65 bytes)
    pub public_key: Vec<u8>,
    pub address: String,
    pub chain_code: [u8; 32],
}

impl Encode for WalletPublicKey {
    type Error = Error;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1 + self.public_key.len() + 1 + self.address.len() + 32)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.encode_len()?;
        if buff.len() < n || self.public_key.len() > u8::MAX as usize {
            return Err(Error::InvalidLength);
        }

        let mut index = 0;

        buff[0] = self.public_key.len() as u8;
        buff[1..][..self.public_key.len()].copy_from_slice(&self.public_key);
        index += 1 + self.public_key.len();

        write_ascii(&self.address, buff, &mut index)?;

        buff[index..][..32].copy_from_slice(&self.chain_code);
        index += 32;

        Ok(index)
    }
}

impl DecodeOwned for WalletPublicKey {
    type Output = Self;
    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let pk_len = *buff.first().ok_or(Error::InvalidLength)? as usize;
        let public_key = buff.get(1..1 + pk_len).ok_or(Error::InvalidLength)?.to_vec();
        let mut index = 1 + pk_len;

        let address = read_ascii(buff, &mut index)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(buff.get(index..index + 32).ok_or(Error::InvalidLength)?);
        index += 32;

        Ok((
            Self {
                public_key,
                address,
                chain_code,
            },
            index,
        ))
    }
}

#[cfg(test)]
mod test {
    use core::str::FromStr;

    use super::*;
    use crate::{decode_exact, test::encode_decode};

    #[test]
    fn public_key_req_apdu() {
        let path = DerivationPath::from_str("m/44'/133'/1'/0/7").unwrap();
        let r = PublicKeyReq::new(path, AddressFormat::Legacy, false);

        let a = r.apdus(&BuilderConfig::default()).unwrap();
        assert_eq!(
            hex::encode(a[0].serialize()),
            "e040000015058000002c80000085800000010000000000000007"
        );

        let path = DerivationPath::from_str("m/84'/0'/0'/0/0").unwrap();
        let r = PublicKeyReq::new(path, AddressFormat::Bech32, true);
        let a = r.apdus(&BuilderConfig::default()).unwrap();
        assert_eq!((a[0].p1, a[0].p2), (0x01, 0x02));
    }

    #[test]
    fn public_key_resp() {
        let v = WalletPublicKey {
            public_key: [0x04; 65].to_vec(),
            address: String::from("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"),
            chain_code: [0x11; 32],
        };

        let b = encode_decode(&v);
        assert_eq!(b[0], 65);
        assert_eq!(b[66] as usize, v.address.len());
        assert_eq!(b.len(), 1 + 65 + 1 + 34 + 32);

        assert_eq!(
            decode_exact::<WalletPublicKey>(&b[..b.len() - 1]),
            Err(Error::InvalidLength)
        );
    }

    #[test]
    fn address_format_names() {
        assert_eq!(
            AddressFormat::from_str("p2sh-p2wpkh").unwrap(),
            AddressFormat::P2shP2wpkh
        );
        assert_eq!(AddressFormat::Bech32.to_string(), "bech32");
    }
}
