// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Hash modes for streaming inputs into the app
//!
//! A hash mode combines representation flags (trusted input, script
//! attached) with exactly one input family. The family is held as an
//! enum so a mode can never carry zero or several families.
//!
//! ## Encoding
//!
//! ```text
//!  7 6 5 4 3 2 1 0
//! +-+-+-+-+-+-+-+-+
//! |0 0 0| FAM |S|T|
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! `T`: trusted input, `S`: with script, `FAM`: [`InputFamily`].

use num_enum::TryFromPrimitive;
use strum::{Display, EnumIter};

use crate::{tx::TxKind, Error};

bitflags::bitflags! {
    /// Input representation flags
    pub struct HashFlags: u8 {
        /// Inputs are represented by device-issued trusted inputs
        const TRUSTED = 1 << 0;

        /// Input carries its real script (per-input signing pass)
        const WITH_SCRIPT = 1 << 1;
    }
}

/// Input family, selects the sighash scheme used by the app
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumIter, TryFromPrimitive)]
#[repr(u8)]
pub enum InputFamily {
    Legacy = 0,
    Segwit = 2,
    ZcashOverwinter = 3,
    ZcashSapling = 4,
    BitcoinCash = 5,
}

impl InputFamily {
    /// `UntrustedHashTxInputStart` P2 value when starting a new transaction
    pub fn start_p2(&self) -> u8 {
        match self {
            InputFamily::Legacy => 0x00,
            InputFamily::Segwit => 0x02,
            InputFamily::BitcoinCash => 0x03,
            InputFamily::ZcashOverwinter => 0x04,
            InputFamily::ZcashSapling => 0x05,
        }
    }

    /// Check whether the family uses the zcash header fields
    pub fn is_zcash(&self) -> bool {
        matches!(
            self,
            InputFamily::ZcashOverwinter | InputFamily::ZcashSapling
        )
    }

    /// Check whether inputs commit to their amounts (BIP143-style sighash)
    pub fn is_segwit_like(&self) -> bool {
        !matches!(self, InputFamily::Legacy)
    }

    /// Default family for a parsed transaction kind
    pub fn for_tx(kind: TxKind) -> Self {
        match kind {
            TxKind::Legacy | TxKind::Segwit => InputFamily::Segwit,
            TxKind::ZcashPreSapling => InputFamily::ZcashOverwinter,
            TxKind::ZcashSapling => InputFamily::ZcashSapling,
        }
    }
}

/// Hash mode for streamed inputs
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct HashMode {
    pub flags: HashFlags,
    pub family: InputFamily,
}

impl HashMode {
    /// Create a new hash mode
    pub fn new(family: InputFamily, flags: HashFlags) -> Self {
        Self { flags, family }
    }

    /// Check for trusted input representation
    pub fn trusted(&self) -> bool {
        self.flags.contains(HashFlags::TRUSTED)
    }

    /// Check for the per-input with-script pass
    pub fn with_script(&self) -> bool {
        self.flags.contains(HashFlags::WITH_SCRIPT)
    }

    /// Return this mode with the with-script flag set
    pub fn scripted(mut self) -> Self {
        self.flags.insert(HashFlags::WITH_SCRIPT);
        self
    }

    /// Encode to packed bits
    pub fn bits(&self) -> u8 {
        (self.family as u8) << 2 | self.flags.bits()
    }

    /// Decode from packed bits
    pub fn from_bits(bits: u8) -> Result<Self, Error> {
        let family = InputFamily::try_from(bits >> 2).map_err(|_| Error::InvalidHashMode)?;
        let flags = HashFlags::from_bits(bits & 0b11).ok_or(Error::InvalidHashMode)?;

        Ok(Self { flags, family })
    }
}
