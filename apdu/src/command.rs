// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Command APDU construction and the builder configuration
//!
//! Commands are emitted as [`ledger_apdu::APDUCommand`] objects and answers
//! are [`ledger_apdu::APDUAnswer`]s, the status word is interpreted with
//! [`StatusWord`].

use alloc::vec::Vec;
use core::ops::Deref;

pub use ledger_apdu::{APDUAnswer, APDUCommand};

use crate::{status::StatusWord, Error, Instruction, BTC_APDU_CLA, MAX_APDU_DATA};

/// Bitcoin app command APDU
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      CLA      |      INS      |       P1      |       P2      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      LC       |                    DATA...                    /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
pub type Apdu = APDUCommand<Vec<u8>>;

/// Create a new bitcoin app APDU, failing if the payload exceeds `Lc`
pub fn new_apdu(ins: Instruction, p1: u8, p2: u8, data: Vec<u8>) -> Result<Apdu, Error> {
    if data.len() > MAX_APDU_DATA {
        return Err(Error::InvalidLength);
    }

    Ok(APDUCommand {
        cla: BTC_APDU_CLA,
        ins: ins as u8,
        p1,
        p2,
        data,
    })
}

/// Decode the status word of a device answer
pub fn answer_status<B: Deref<Target = [u8]>>(answer: &APDUAnswer<B>) -> StatusWord {
    StatusWord::from(answer.retcode())
}

/// Per-call builder configuration
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BuilderConfig {
    /// Maximum payload per APDU
    pub max_chunk: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_chunk: MAX_APDU_DATA,
        }
    }
}

/// Command producing one or more APDUs
pub trait Command {
    /// Instruction issued by this command
    const INS: Instruction;

    /// Build the APDU sequence for this command
    fn apdus(&self, cfg: &BuilderConfig) -> Result<Vec<Apdu>, Error>;
}
