// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! In-process Bitcoin app simulator for integration tests
//!
//! [SimDevice] implements [Exchange] and emulates enough of the app to run
//! the full protocol: trusted inputs are issued for known previous
//! transactions, hashing calls are sequenced, and transaction or message
//! signing returns a fixed DER signature. Every APDU is recorded for
//! inspection.

#![allow(dead_code)]

use std::{ops::Deref, str::FromStr, sync::Mutex};

use async_trait::async_trait;
use log::{debug, LevelFilter};
use simplelog::SimpleLogger;

use ledger_btc::{
    apdu::{
        hash_input::FINALIZE_COMPLETE,
        path::DerivationPath,
        prelude::*,
        status::StatusWord,
        tx::{TxInput, TxKind},
        Instruction,
    },
    Error, Exchange,
};

/// Signature returned by the simulator (DER, parity bit set, SIGHASH_ALL)
pub const SIM_SIG: &str = concat!(
    "31440220495838c36533616d8cbd6474842459596f4f312dce5483fe650791c8",
    "2e17221c02200660520a2584144915efa8519a72819091e5ed78c52689b24235",
    "182f17d96302",
    "01",
);

/// Message signature returned by the simulator (DER, parity bit set)
pub const SIM_MESSAGE_SIG: &str = concat!(
    "3145022100e47861156598918cc7e1fb3e042f1f35801741c082b520810791767a",
    "162a9ca902207da01b7aba6f17e5db38233909dfe58e880dc94df0d8e20bf1e602",
    "c99e91bb69",
);

/// Uncompressed public key returned by the simulator (secp256k1 generator)
pub const SIM_PUBLIC_KEY: &str = concat!(
    "04",
    "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8",
);

/// Legacy address for [SIM_PUBLIC_KEY]
pub const SIM_ADDRESS: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";

/// P2PKH script for [SIM_PUBLIC_KEY] (compressed)
pub const SIM_P2PKH_SCRIPT: &str = "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac";

/// Two input legacy transaction spending P2PKH outputs
pub const TX_LEGACY: &str = concat!(
    "0200000002",
    "40d1ae8a596b34f48b303e853c56f8f6f54c483babc16978eb182e2154d5f2ab000000006b",
    "483045022100ca145f0694ffaedd333d3724ce3f4e44aabc0ed5128113660d11",
    "f917b3c5205302207bec7c66328bace92bd525f385a9aa1261b83e0f92310ea1",
    "850488b40bd25a5d0121032006c64cdd0485e068c1e22ba0fa267ca02ca0c2b3",
    "4cdc6dd08cba23796b6ee7",
    "fdffffff",
    "40d1ae8a596b34f48b303e853c56f8f6f54c483babc16978eb182e2154d5f2ab010000006a",
    "47304402202a5d54a1635a7a0ae22cef76d8144ca2a1c3c035c87e7cd0280ab4",
    "3d3451090602200c7e07e384b3620ccd2f97b5c08f5893357c653edc2b8570f0",
    "99d9ff34a0285c012102d82f3fa29d38297db8e1879010c27f27533439c868b1",
    "cc6af27dd3d33b243dec",
    "fdffffff",
    "01",
    "d7ee7c01000000001976a9140ea263ff8b0da6e8d187de76f6a362beadab781188ac",
    "e3691900",
);

/// Segwit transaction with a single P2WPKH output
pub const TX_SEGWIT: &str = concat!(
    "02000000",
    "0001",
    "02",
    "daf4d7b97a62dd9933bd6977b5da9a3edb7c2d853678c9932108f1eb4d27b7a9",
    "0000000000fdffffff",
    "daf4d7b97a62dd9933bd6977b5da9a3edb7c2d853678c9932108f1eb4d27b7a9",
    "0100000000fdffffff",
    "01",
    "01410f0000000000160014e4d3a1ec51102902f6bbede1318047880c9c7680",
    "0247",
    "30440220495838c36533616d8cbd6474842459596f4f312dce5483fe650791c8",
    "2e17221c02200660520a2584144915efa8519a72819091e5ed78c52689b24235",
    "182f17d96302012102ddf4af49ff0eae1d507cc50c86f903cd6aa0395f323975",
    "9c440ea67556a3b91b",
    "0247",
    "304402200090c2507517abc7a9cb32452aabc8d1c8a0aee75ce63618ccd90154",
    "2415f2db02205bb1d22cb6e8173e91dc82780481ea55867b8e753c35424da664",
    "f1d2662ecb1301210254c54648226a45dd2ad79f736ebf7d5f0fc03b6f8f0e6d",
    "4a61df4e531aaca431",
    "a7011900",
);

/// Zcash sapling transaction, one transparent input and two outputs
pub const TX_SAPLING: &str = concat!(
    "0400008085202f89",
    "01",
    "edc69b8179fd7c6a11a8a1ba5d17017df5e09296c3a1acdada0d94e199f68857010000006b",
    "483045022100e8043cd498714122a78b6ecbf8ced1f74d1c65093c5e2649336d",
    "fa248aea9ccf022023b13e575956354521301c91ed0fe7072d295aa232215e74",
    "e50d01a73b005dac01210201e1c9d8186c093d116ec619b7dad2b7ff0e7dd16f",
    "42d458da1100831dc4ff72",
    "ffffff00",
    "02",
    "a0860100000000001976a914fa9737ab9964860ca0c3e9ad6c7eb3bc9c8f6fb588ac",
    "4d949100000000001976a914b714c60805804d86eb72a38c65ba8370582d09e888ac",
    "00000000",
    "000000000000000000000000000000",
);

/// Unsigned zcash sapling transaction spending output 1 of [TX_SAPLING]
pub const TX_SAPLING_UNSIGNED: &str = concat!(
    "0400008085202f89",
    "01",
    "d35f0793da27a5eacfe984c73b1907af4b50f3aa3794ba1bb555b9233addf33f0100000000",
    "ffffff00",
    "02",
    "40420f00000000001976a91490360f7a0b0e50d5dd0c924fc1d6e7adb8519c9388ac",
    "2b518200000000001976a91490360f7a0b0e50d5dd0c924fc1d6e7adb8519c9388ac",
    "5eb3f840",
    "000000000000000000000000000000",
);

/// Setup logging for tests
pub fn setup() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Parse a hex encoded transaction
pub fn tx(s: &str) -> Tx {
    Tx::parse(&hex::decode(s).unwrap()).unwrap()
}

/// Parse a derivation path
pub fn path(s: &str) -> DerivationPath {
    DerivationPath::from_str(s).unwrap()
}

/// Build an unsigned version 2 transaction spending `spends` (previous
/// transaction and output index)
pub fn spend(spends: &[(&Tx, u32)], outputs: Vec<TxOutput>, lock_time: u32) -> Tx {
    let inputs = spends
        .iter()
        .map(|(t, i)| TxInput {
            prev_hash: t.txid(),
            prev_index: *i,
            script: vec![],
            sequence: 0xffff_fffd,
        })
        .collect();

    Tx {
        kind: TxKind::Legacy,
        version: 2,
        version_group_id: None,
        inputs,
        outputs,
        witness: vec![],
        lock_time,
        footer: None,
    }
}

/// P2PKH output paying `value`
pub fn p2pkh_output(value: u64) -> TxOutput {
    let mut script = hex::decode("76a914").unwrap();
    script.extend_from_slice(&[0x11; 20]);
    script.extend_from_slice(&hex::decode("88ac").unwrap());

    TxOutput { value, script }
}

/// Segwit transaction paying `value` to a P2SH script
pub fn p2sh_funding(value: u64) -> Tx {
    Tx {
        kind: TxKind::Segwit,
        version: 2,
        version_group_id: None,
        inputs: vec![TxInput {
            prev_hash: [0x33; 32],
            prev_index: 0,
            script: vec![],
            sequence: 0xffff_fffd,
        }],
        outputs: vec![TxOutput {
            value,
            script: hex::decode("a914b472a266d0bd89c13706a4132ccfb16f7c3b9fcb87").unwrap(),
        }],
        witness: hex::decode("0201aa01bb").unwrap(),
        lock_time: 0,
        footer: None,
    }
}

/// Decoded APDU as received by the simulator
#[derive(Clone, PartialEq, Debug)]
pub struct SimApdu {
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

/// Simulated Bitcoin app
#[derive(Debug, Default)]
pub struct SimDevice {
    state: Mutex<SimState>,
}

#[derive(Debug, Default)]
struct SimState {
    /// Previous transactions the simulator issues trusted inputs for
    utxos: Vec<Tx>,

    /// Raw APDUs received, in order
    apdus: Vec<Vec<u8>>,

    /// Trusted input stream for the current request
    stream: Vec<u8>,

    /// One-shot failure status for the first APDU with the given INS
    fail: Option<(Instruction, u16)>,

    /// Response to the final finalize APDU, overriding `0000`
    finalize_response: Option<Vec<u8>>,

    /// Offset added to trusted input amounts
    amount_offset: u64,

    hashing: bool,
    finalized: bool,

    /// Message bytes still expected, `None` outside a message prepare
    message_remaining: Option<usize>,
    message_prepared: bool,
    message_denied: bool,
}

impl SimDevice {
    /// Create a simulator issuing trusted inputs for `utxos`
    pub fn new(utxos: &[Tx]) -> Self {
        let state = SimState {
            utxos: utxos.to_vec(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn state_mut(&mut self) -> &mut SimState {
        self.state.get_mut().unwrap()
    }

    /// Fail the next APDU with instruction `ins` with `status`
    pub fn fail_on(&mut self, ins: Instruction, status: u16) {
        self.state_mut().fail = Some((ins, status));
    }

    /// Override the final finalize response
    pub fn with_finalize_response(mut self, r: &[u8]) -> Self {
        self.state_mut().finalize_response = Some(r.to_vec());
        self
    }

    /// Misreport trusted input amounts
    pub fn with_amount_offset(mut self, offset: u64) -> Self {
        self.state_mut().amount_offset = offset;
        self
    }

    /// Reject message signing at the confirmation prompt
    pub fn with_message_denied(mut self) -> Self {
        self.state_mut().message_denied = true;
        self
    }

    /// Raw APDUs received, in order
    pub fn apdus(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().apdus.clone()
    }

    /// Decoded APDUs received
    pub fn decoded(&self) -> Vec<SimApdu> {
        self.apdus().iter().map(|a| decode(a)).collect()
    }

    /// Decoded APDUs received for an instruction
    pub fn with_ins(&self, ins: Instruction) -> Vec<SimApdu> {
        self.decoded()
            .into_iter()
            .filter(|a| a.ins == ins as u8)
            .collect()
    }

    /// Instruction sequence with consecutive repeats collapsed
    pub fn ins_sequence(&self) -> Vec<u8> {
        let mut s: Vec<u8> = self.decoded().iter().map(|a| a.ins).collect();
        s.dedup();
        s
    }
}

impl SimState {
    fn handle(&mut self, a: &SimApdu) -> Result<Vec<u8>, u16> {
        if let Some((ins, status)) = self.fail {
            if ins as u8 == a.ins {
                self.fail = None;
                self.hashing = false;
                self.finalized = false;
                self.message_remaining = None;
                self.message_prepared = false;
                return Err(status);
            }
        }

        match a.ins {
            0xc0 => Ok((0..a.data.len()).map(|i| i as u8).collect()),
            0xc4 => Ok(hex::decode("0330020105010600").unwrap()),
            0x16 => Ok(hex::decode("1cb81cbd01055a63617368035a4543").unwrap()),
            0x40 => Ok(public_key_response()),
            0x42 => self.trusted_input(a),
            0x44 => self.hash_start(a),
            0x4a => self.finalize(a),
            0x48 => self.sign(a),
            0x4e => self.message(a),
            _ => Err(StatusWord::InsNotSupported.code()),
        }
    }

    fn trusted_input(&mut self, a: &SimApdu) -> Result<Vec<u8>, u16> {
        if a.p1 == 0x00 {
            self.stream.clear();
        }
        self.stream.extend_from_slice(&a.data);

        for t in &self.utxos {
            for index in 0..t.outputs.len() as u32 {
                let req = TrustedInputReq::new(t, index).unwrap();
                let expected: Vec<u8> = req.records().into_iter().flat_map(|r| r.data).collect();

                if expected != self.stream {
                    continue;
                }

                debug!("SIM: issuing trusted input for output {}", index);

                let ti = TrustedInput {
                    nonce: [0x4d, 0x04],
                    txid: t.txid(),
                    index,
                    amount: t.outputs[index as usize].value + self.amount_offset,
                    hmac: [0xaa; 8],
                };
                self.stream.clear();

                return Ok(ti.to_bytes().to_vec());
            }
        }

        Ok(vec![])
    }

    fn hash_start(&mut self, a: &SimApdu) -> Result<Vec<u8>, u16> {
        // Continuing requires a started hash, a new transaction resets it
        match (a.p1, a.p2) {
            (0x00, 0x80) if !self.hashing => return Err(0x6985),
            (0x00, 0x80) => (),
            (0x00, _) => {
                self.hashing = true;
                self.finalized = false;
            }
            _ => (),
        }

        Ok(vec![])
    }

    fn finalize(&mut self, a: &SimApdu) -> Result<Vec<u8>, u16> {
        if !self.hashing {
            return Err(0x6985);
        }

        match a.p1 {
            0x80 => {
                self.finalized = true;
                Ok(self
                    .finalize_response
                    .clone()
                    .unwrap_or(FINALIZE_COMPLETE.to_vec()))
            }
            _ => Ok(vec![0x00]),
        }
    }

    fn sign(&mut self, a: &SimApdu) -> Result<Vec<u8>, u16> {
        if !self.finalized {
            return Err(0x6985);
        }

        // path ‖ 0x00 ‖ lock time ‖ sighash
        let n = a.data[0] as usize;
        let sighash = a.data[1 + 4 * n + 1 + 4];

        let mut sig = hex::decode(SIM_SIG).unwrap();
        let last = sig.len() - 1;
        sig[last] = sighash;

        Ok(sig)
    }

    fn message(&mut self, a: &SimApdu) -> Result<Vec<u8>, u16> {
        let remaining = match (a.p1, a.p2) {
            // path ‖ length (u16 BE) ‖ message
            (0x00, 0x01) => {
                let n = 1 + 4 * a.data[0] as usize;
                let len = u16::from_be_bytes([a.data[n], a.data[n + 1]]) as usize;
                len.checked_sub(a.data.len() - n - 2)
            }
            (0x00, 0x80) => match self.message_remaining {
                Some(r) => r.checked_sub(a.data.len()),
                None => return Err(0x6985),
            },
            (0x80, 0x00) if self.message_prepared && self.message_denied => {
                self.message_prepared = false;
                return Err(0x6985);
            }
            (0x80, 0x00) if self.message_prepared => {
                self.message_prepared = false;
                return Ok(hex::decode(SIM_MESSAGE_SIG).unwrap());
            }
            _ => return Err(0x6985),
        };

        match remaining {
            Some(0) => {
                self.message_remaining = None;
                self.message_prepared = true;
                Ok(vec![0x00, 0x00])
            }
            Some(r) => {
                self.message_remaining = Some(r);
                Ok(vec![0x00])
            }
            None => Err(0x6a80),
        }
    }
}

#[async_trait]
impl Exchange for SimDevice {
    type Error = Error;
    type AnswerType = Vec<u8>;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        let apdu = command.serialize();
        let a = decode(&apdu);

        let mut s = self.state.lock().unwrap();
        s.apdus.push(apdu);

        let (mut data, sw) = match s.handle(&a) {
            Ok(d) => (d, 0x9000u16),
            Err(sw) => (vec![], sw),
        };
        data.extend_from_slice(&sw.to_be_bytes());

        APDUAnswer::from_answer(data).map_err(|_| Error::UnexpectedResponse)
    }
}

fn decode(apdu: &[u8]) -> SimApdu {
    assert_eq!(apdu[0], 0xe0, "unexpected CLA");
    assert_eq!(apdu[4] as usize, apdu.len() - 5, "Lc mismatch");

    SimApdu {
        ins: apdu[1],
        p1: apdu[2],
        p2: apdu[3],
        data: apdu[5..].to_vec(),
    }
}

fn public_key_response() -> Vec<u8> {
    let key = hex::decode(SIM_PUBLIC_KEY).unwrap();

    let mut b = vec![key.len() as u8];
    b.extend_from_slice(&key);
    b.push(SIM_ADDRESS.len() as u8);
    b.extend_from_slice(SIM_ADDRESS.as_bytes());
    b.extend_from_slice(&[0xcc; 32]);
    b
}
