// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Transaction signing sessions
//!
//! Signing drives the app's transaction hash through a fixed sequence:
//!
//! ```text
//! Idle -> TrustedInputsCollected -> HashStarted -> HashFinalized
//!      -> [ScriptHashed(i) -> Signed(i)] x N -> Done
//! ```
//!
//! `HashStarted` streams every input without scripts to seed the hash,
//! `ScriptHashed(i)` continues it with input `i` and the script it spends.
//! Zcash sessions issue an extra sign call with an empty path after
//! finalizing, committing the lock time and expiry height.
//!
//! The legacy family hashes outputs after inputs, so each input runs its
//! own `ScriptHashed(i) -> HashFinalized -> Signed(i)` cycle instead.
//!
//! Any failure returns the session to `Idle`. Collected inputs are kept
//! and reused, every hashing step must be repeated.

use std::fmt::Display;

use log::{debug, warn};

use ledger_btc_apdu::{
    address::{is_p2sh, key_signing_script, signing_script},
    prelude::*,
};

use crate::{transport::Exchange, DeviceHandle, Error};

/// Signing session state
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SessionState {
    Idle,
    /// Input representations available for hashing
    TrustedInputsCollected,
    /// Inputs hashed without scripts
    HashStarted,
    /// Change path and outputs hashed
    HashFinalized,
    /// Input hashed with its script, ready to sign
    ScriptHashed(usize),
    /// Input signed
    Signed(usize),
    Done,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::ScriptHashed(i) => write!(f, "ScriptHashed({i})"),
            SessionState::Signed(i) => write!(f, "Signed({i})"),
            s => write!(f, "{s:?}"),
        }
    }
}

/// Signing session configuration
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SignConfig {
    /// Input family, derived from the transaction kind when unset
    pub family: Option<InputFamily>,

    /// Represent inputs with device-issued trusted inputs
    pub trusted: bool,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            family: None,
            trusted: true,
        }
    }
}

impl SignConfig {
    /// Resolve the input family for a transaction
    pub fn family_for(&self, tx: &Tx) -> InputFamily {
        self.family.unwrap_or_else(|| InputFamily::for_tx(tx.kind))
    }
}

/// Transaction signing request
#[derive(Clone, PartialEq, Debug)]
pub struct SignRequest {
    /// Transaction to sign
    pub tx: Tx,

    /// Previous transactions, one per input
    pub utxos: Vec<Tx>,

    /// Signing key paths, one per input
    pub paths: Vec<DerivationPath>,

    /// Change output key path, checked by the device when finalizing
    pub change_path: Option<DerivationPath>,
}

impl SignRequest {
    /// Output spent by input `index`
    pub fn spent_output(&self, index: usize) -> Result<&TxOutput, Error> {
        let input = self.tx.inputs.get(index).ok_or(Error::MissingUtxo(index))?;

        self.utxos
            .get(index)
            .and_then(|u| u.outputs.get(input.prev_index as usize))
            .ok_or(Error::MissingUtxo(index))
    }

    /// Check the request carries a matching previous transaction and
    /// signing path for every input
    pub fn validate(&self) -> Result<(), Error> {
        if self.tx.inputs.is_empty() {
            return Err(Error::InvalidConfig("transaction has no inputs"));
        }
        if self.paths.len() != self.tx.inputs.len() {
            return Err(Error::InvalidConfig("one signing path required per input"));
        }
        if self.utxos.len() != self.tx.inputs.len() {
            return Err(Error::MissingUtxo(self.utxos.len().min(self.tx.inputs.len())));
        }

        for (i, (input, utxo)) in self.tx.inputs.iter().zip(self.utxos.iter()).enumerate() {
            if utxo.txid() != input.prev_hash {
                return Err(Error::MissingUtxo(i));
            }
            self.spent_output(i)?;
        }

        Ok(())
    }
}

/// Signing session over a [DeviceHandle]
///
/// The session borrows the handle exclusively for its lifetime.
pub struct SigningSession<'a, T: Exchange> {
    h: &'a mut DeviceHandle<T>,
    req: &'a SignRequest,
    mode: HashMode,
    state: SessionState,
    inputs: Vec<HashInput>,
    /// Script hashed with each input when signing
    scripts: Vec<Vec<u8>>,
    signatures: Vec<Signature>,
}

impl<'a, T> SigningSession<'a, T>
where
    T: Exchange + Send + Sync,
    Error: From<T::Error>,
{
    /// Create a new session, validating the request against the configuration
    pub fn new(
        h: &'a mut DeviceHandle<T>,
        req: &'a SignRequest,
        cfg: SignConfig,
    ) -> Result<Self, Error> {
        req.validate()?;

        let family = cfg.family_for(&req.tx);
        if family.is_zcash() != req.tx.kind.is_zcash() {
            return Err(Error::InvalidConfig(
                "input family does not match transaction kind",
            ));
        }

        let flags = match cfg.trusted {
            true => HashFlags::TRUSTED,
            false => HashFlags::empty(),
        };

        Ok(Self {
            h,
            req,
            mode: HashMode::new(family, flags),
            state: SessionState::Idle,
            inputs: Vec::with_capacity(req.tx.inputs.len()),
            scripts: Vec::with_capacity(req.tx.inputs.len()),
            signatures: Vec::with_capacity(req.tx.inputs.len()),
        })
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Hash mode used for inputs
    pub fn mode(&self) -> HashMode {
        self.mode
    }

    /// Signatures produced so far, in input order
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Execute the full signing sequence, returning one signature per input
    pub async fn run(&mut self) -> Result<Vec<Signature>, Error> {
        self.collect_inputs().await?;

        if self.mode.family.is_segwit_like() {
            self.start_hash().await?;
            self.finalize().await?;
        }

        for i in 0..self.req.tx.inputs.len() {
            self.sign_input(i).await?;
        }

        self.state = SessionState::Done;

        debug!("Signed {} inputs", self.signatures.len());

        Ok(self.signatures.clone())
    }

    /// Collect input representations, requesting trusted inputs from the
    /// device where configured
    pub async fn collect_inputs(&mut self) -> Result<(), Error> {
        let r = self.try_collect_inputs().await;
        self.track(r)
    }

    /// Hash every input without scripts, starting a new transaction
    pub async fn start_hash(&mut self) -> Result<(), Error> {
        let r = self.try_start_hash().await;
        self.track(r)
    }

    /// Hash change path and outputs, committing zcash lock time and expiry
    pub async fn finalize(&mut self) -> Result<(), Error> {
        let r = self.try_finalize().await;
        self.track(r)
    }

    /// Hash input `index` with its script and sign it
    pub async fn sign_input(&mut self, index: usize) -> Result<Signature, Error> {
        let r = self.try_sign_input(index).await;
        self.track(r)
    }

    async fn try_collect_inputs(&mut self) -> Result<(), Error> {
        self.check(SessionState::Idle)?;

        let req = self.req;
        let tx = &req.tx;

        if self.inputs.len() == tx.inputs.len() {
            debug!("Reusing {} collected inputs", self.inputs.len());
            self.state = SessionState::TrustedInputsCollected;
            return Ok(());
        }

        self.inputs.clear();
        self.scripts.clear();

        for i in 0..tx.inputs.len() {
            let script = self.input_script(i).await?;
            self.scripts.push(script);
        }

        for (i, input) in tx.inputs.iter().enumerate() {
            let hi = match (self.mode.trusted(), self.mode.family.is_segwit_like()) {
                (true, _) => {
                    let utxo = req.utxos.get(i).ok_or(Error::MissingUtxo(i))?;
                    let ti = self.h.trusted_input(utxo, input.prev_index).await?;
                    HashInput::Trusted(ti)
                }
                (false, true) => HashInput::Segwit {
                    prev_hash: input.prev_hash,
                    prev_index: input.prev_index,
                    amount: req.spent_output(i)?.value,
                },
                (false, false) => HashInput::Relaxed {
                    prev_hash: input.prev_hash,
                    prev_index: input.prev_index,
                },
            };

            self.inputs.push(hi);
        }

        self.state = SessionState::TrustedInputsCollected;

        Ok(())
    }

    async fn try_start_hash(&mut self) -> Result<(), Error> {
        self.check(SessionState::TrustedInputsCollected)?;

        if !self.mode.family.is_segwit_like() {
            return Err(Error::InvalidConfig(
                "legacy inputs are hashed per signed input",
            ));
        }

        let r = self.req;
        let start = HashInputStartReq {
            tx: &r.tx,
            inputs: &self.inputs,
            mode: self.mode,
            script_index: 0,
            script: &[],
            new_tx: true,
        };
        self.h.hash_input_start(&start).await?;

        self.state = SessionState::HashStarted;

        Ok(())
    }

    async fn try_finalize(&mut self) -> Result<(), Error> {
        self.check(SessionState::HashStarted)?;

        self.finalize_outputs().await?;

        if self.mode.family.is_zcash() {
            let r = self.req;
            let tx = &r.tx;

            debug!(
                "Committing zcash lock time: {} expiry height: {:?}",
                tx.lock_time,
                tx.expiry_height()
            );

            let req = HashSignReq::new(DerivationPath::default(), tx.lock_time)
                .with_expiry(tx.expiry_height().unwrap_or(0));

            // Response carries no usable signature
            let _ = self.h.request(&req).await?;
        }

        self.state = SessionState::HashFinalized;

        Ok(())
    }

    async fn try_sign_input(&mut self, index: usize) -> Result<Signature, Error> {
        let r = self.req;
        let tx = &r.tx;
        let legacy = !self.mode.family.is_segwit_like();

        if index >= tx.inputs.len() {
            return Err(Error::InvalidConfig("input index out of range"));
        }

        let expected = match index {
            0 if legacy => SessionState::TrustedInputsCollected,
            0 => SessionState::HashFinalized,
            i => SessionState::Signed(i - 1),
        };
        self.check(expected)?;

        let script = self
            .scripts
            .get(index)
            .ok_or(Error::InvalidState(self.state, SessionState::TrustedInputsCollected))?;

        let start = HashInputStartReq {
            tx,
            inputs: &self.inputs,
            mode: self.mode.scripted(),
            script_index: index,
            script,
            new_tx: legacy,
        };
        self.h.hash_input_start(&start).await?;

        self.state = SessionState::ScriptHashed(index);

        if legacy {
            self.finalize_outputs().await?;
            self.state = SessionState::HashFinalized;
        }

        let path = r
            .paths
            .get(index)
            .cloned()
            .ok_or(Error::InvalidConfig("one signing path required per input"))?;

        let mut sign = HashSignReq::new(path, tx.lock_time);
        if self.mode.family.is_zcash() {
            sign = sign.with_expiry(tx.expiry_height().unwrap_or(0));
        }

        let sig = self.h.hash_sign(&sign).await?;

        debug!("Signed input {} (parity: {})", index, sig.parity);

        self.signatures.push(sig.clone());
        self.state = SessionState::Signed(index);

        Ok(sig)
    }

    /// Script signed for input `index`
    ///
    /// P2SH outputs of witness transactions are wrapped P2WPKH, signed with
    /// the P2PKH script of the signing key.
    async fn input_script(&mut self, index: usize) -> Result<Vec<u8>, Error> {
        let r = self.req;
        let spent = r.spent_output(index)?;
        let utxo = r.utxos.get(index).ok_or(Error::MissingUtxo(index))?;

        if !(is_p2sh(&spent.script) && utxo.kind == TxKind::Segwit) {
            return Ok(signing_script(&spent.script));
        }

        let path = r
            .paths
            .get(index)
            .ok_or(Error::InvalidConfig("one signing path required per input"))?;

        debug!("Fetching key for wrapped segwit input {}", index);

        let k = self.h.public_key(path, AddressFormat::Legacy, false).await?;
        key_signing_script(&k.public_key).map_err(|e| {
            warn!("Invalid public key for input {}: {}", index, e);
            Error::UnexpectedResponse
        })
    }

    async fn finalize_outputs(&mut self) -> Result<(), Error> {
        let r = self.req;
        self.h
            .hash_input_finalize(&r.tx.outputs, r.change_path.as_ref())
            .await
    }

    fn check(&self, expected: SessionState) -> Result<(), Error> {
        match self.state == expected {
            true => Ok(()),
            false => Err(Error::InvalidState(self.state, expected)),
        }
    }

    /// Return to `Idle` on failure, keeping collected inputs
    fn track<V>(&mut self, r: Result<V, Error>) -> Result<V, Error> {
        if let Err(e) = &r {
            warn!("Signing session aborted in state {}: {}", self.state, e);

            self.state = SessionState::Idle;
            self.signatures.clear();
        }
        r
    }
}
