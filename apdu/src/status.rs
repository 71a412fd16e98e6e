// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Device status words
//!
//! Every response ends with a two byte status word, `0x9000` for success.
//! Codes the app is known to return map to named variants, anything else
//! is preserved as [`StatusWord::Unknown`].

use num_enum::{FromPrimitive, IntoPrimitive};
use strum::Display;

/// Status word returned by the device with each response
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, FromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum StatusWord {
    /// Command completed successfully
    Ok = 0x9000,

    IncorrectLength = 0x6700,
    IncompatibleFileStructure = 0x6981,
    SecurityStatusNotSatisfied = 0x6982,

    /// Conditions of use not satisfied, returned when the user rejects
    /// an operation on the device (or for an out-of-sequence command)
    ConditionsOfUseNotSatisfied = 0x6985,

    IncorrectData = 0x6a80,
    NotEnoughMemorySpace = 0x6a84,
    ReferencedDataNotFound = 0x6a88,
    FileAlreadyExists = 0x6a89,

    /// Exchange/swap flow attempted without trusted inputs
    SwapWithoutTrustedInputs = 0x6a8a,

    IncorrectP1P2 = 0x6b00,
    InsNotSupported = 0x6d00,
    ClaNotSupported = 0x6e00,
    TechnicalProblem = 0x6f00,
    TechnicalProblem2 = 0x6f0f,
    MemoryProblem = 0x9240,
    NoEfSelected = 0x9400,
    InvalidOffset = 0x9402,
    FileNotFound = 0x9404,
    InconsistentFile = 0x9408,
    AlgorithmNotSupported = 0x9484,
    InvalidKcv = 0x9485,
    CodeNotInitialized = 0x9802,
    AccessConditionNotFulfilled = 0x9804,
    ContradictionSecretCodeStatus = 0x9808,
    ContradictionInvalidation = 0x9810,
    CodeBlocked = 0x9840,
    MaxValueReached = 0x9850,
    GpAuthFailed = 0x6300,
    Licensing = 0x6f42,
    Halted = 0x6faa,

    /// Status word not known to this library
    #[num_enum(catch_all)]
    Unknown(u16),
}

impl StatusWord {
    /// Check whether this status indicates success
    pub fn is_ok(&self) -> bool {
        *self == StatusWord::Ok
    }

    /// Fetch the raw status word
    pub fn code(&self) -> u16 {
        u16::from(*self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_word_mapping() {
        let tests = &[
            (0x9000, StatusWord::Ok),
            (0x6985, StatusWord::ConditionsOfUseNotSatisfied),
            (0x6a80, StatusWord::IncorrectData),
            (0x6a8a, StatusWord::SwapWithoutTrustedInputs),
            (0x6d00, StatusWord::InsNotSupported),
            (0x6faa, StatusWord::Halted),
            (0x9850, StatusWord::MaxValueReached),
        ];

        for (code, sw) in tests {
            assert_eq!(StatusWord::from(*code), *sw);
            assert_eq!(sw.code(), *code);
        }
    }

    #[test]
    fn unknown_status_preserved() {
        let sw = StatusWord::from(0x1234);
        assert_eq!(sw, StatusWord::Unknown(0x1234));
        assert_eq!(sw.code(), 0x1234);
        assert!(!sw.is_ok());
    }
}
