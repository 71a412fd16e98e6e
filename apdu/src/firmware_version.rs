// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Firmware version APDUs

use alloc::vec::Vec;

use encdec::DecodeOwned;

use crate::{new_apdu, Apdu, BuilderConfig, Command, Error, Instruction};

/// Fetch firmware version APDU
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct FirmwareVersionReq;

impl Command for FirmwareVersionReq {
    const INS: Instruction = Instruction::GetFirmwareVersion;

    fn apdus(&self, _cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error> {
        Ok(alloc::vec![new_apdu(Self::INS, 0x00, 0x00, Vec::new())?])
    }
}

bitflags::bitflags! {
    /// Firmware feature flags
    pub struct FirmwareFlags: u8 {
        const COMPRESSED_KEYS = 1 << 0;
        const SCREEN_AND_BUTTONS = 1 << 1;
        const EXTERNAL_SCREEN_AND_BUTTONS = 1 << 2;
        const NFC_PAYMENT = 1 << 3;
        const BLE_LOW_POWER = 1 << 4;
        const TEE = 1 << 5;
    }
}

/// Firmware version response
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     FLAGS     |     ARCH      |     MAJOR     |     MINOR     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     PATCH     | LOADER_MAJOR* | LOADER_MINOR* |     MODE*     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Fields marked `*` are not returned by all devices.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FirmwareVersion {
    pub flags: FirmwareFlags,
    pub architecture: u8,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    /// Loader (major, minor) version, if reported
    pub loader: Option<(u8, u8)>,
    pub mode: Option<u8>,
}

impl DecodeOwned for FirmwareVersion {
    type Output = Self;
    type Error = Error;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        if buff.len() < 5 || buff.len() > 8 {
            return Err(Error::InvalidLength);
        }

        let loader = match buff.len() >= 7 {
            true => Some((buff[5], buff[6])),
            false => None,
        };

        let v = Self {
            flags: FirmwareFlags::from_bits_truncate(buff[0]),
            architecture: buff[1],
            major: buff[2],
            minor: buff[3],
            patch: buff[4],
            loader,
            mode: buff.get(7).copied(),
        };

        Ok((v, buff.len()))
    }
}
