// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! New payment transactions
//!
//! A payment spends a set of previous outputs to a single address. Value
//! left after the amount and fees is returned to a device key, with a change
//! script of the same kind as the destination address. Change is placed
//! before the destination output.

use ledger_btc_apdu::{
    address::{address_script, change_script, AddressKind},
    prelude::*,
};

use crate::{session::SignRequest, Error};

/// Input sequence for payments (final, replaceable)
pub const PAYMENT_SEQUENCE: u32 = 0xffff_fffd;

/// Transaction version for payments
pub const PAYMENT_VERSION: u32 = 2;

/// Previous output spent by a payment
#[derive(Clone, PartialEq, Debug)]
pub struct Spend {
    /// Transaction holding the spent output
    pub tx: Tx,
    /// Index of the spent output
    pub index: u32,
    /// Key path signing the input
    pub path: DerivationPath,
}

impl Spend {
    /// Value of the spent output
    pub fn value(&self) -> Option<u64> {
        self.tx.outputs.get(self.index as usize).map(|o| o.value)
    }
}

/// Payment to an address
#[derive(Clone, PartialEq, Debug)]
pub struct PaymentRequest {
    /// Destination address
    pub address: String,
    /// Value paid to the destination
    pub amount: u64,
    pub fees: u64,
    /// Key path for the change output
    pub change_path: DerivationPath,
    pub spends: Vec<Spend>,
    pub lock_time: u32,
}

impl PaymentRequest {
    /// Total value of the spent outputs
    pub fn available(&self) -> Result<u64, Error> {
        self.spends.iter().enumerate().try_fold(0u64, |a, (i, s)| {
            let v = s.value().ok_or(Error::MissingUtxo(i))?;
            a.checked_add(v)
                .ok_or(Error::InvalidConfig("spent value overflows"))
        })
    }

    /// Value returned as change, `None` when the spends are used up exactly
    pub fn change(&self) -> Result<Option<u64>, Error> {
        let available = self.available()?;
        let required = self
            .amount
            .checked_add(self.fees)
            .ok_or(Error::InvalidConfig("amount and fees overflow"))?;

        match available.checked_sub(required) {
            None => Err(Error::InsufficientFunds {
                available,
                required,
            }),
            Some(0) => Ok(None),
            Some(c) => Ok(Some(c)),
        }
    }

    /// Build the signing request for this payment
    ///
    /// `change_key` is the public key at `change_path`, required when the
    /// payment returns change.
    pub fn build(&self, change_key: Option<&[u8]>) -> Result<SignRequest, Error> {
        if self.spends.is_empty() {
            return Err(Error::InvalidConfig("payment has no spends"));
        }
        if self.spends.iter().any(|s| s.tx.kind.is_zcash()) {
            return Err(Error::InvalidConfig("payments spend bitcoin outputs only"));
        }

        let kind = AddressKind::classify(&self.address)?;
        let destination = address_script(&self.address)?;

        let mut outputs = Vec::with_capacity(2);

        if let Some(value) = self.change()? {
            let key = change_key.ok_or(Error::InvalidConfig("change key required"))?;
            outputs.push(TxOutput {
                value,
                script: change_script(kind, key)?,
            });
        }

        outputs.push(TxOutput {
            value: self.amount,
            script: destination,
        });

        let inputs = self
            .spends
            .iter()
            .map(|s| TxInput {
                prev_hash: s.tx.txid(),
                prev_index: s.index,
                script: Vec::new(),
                sequence: PAYMENT_SEQUENCE,
            })
            .collect();

        let tx = Tx {
            kind: TxKind::Legacy,
            version: PAYMENT_VERSION,
            version_group_id: None,
            inputs,
            outputs,
            witness: Vec::new(),
            lock_time: self.lock_time,
            footer: None,
        };

        let change_path = match tx.outputs.len() {
            2 => Some(self.change_path.clone()),
            _ => None,
        };

        Ok(SignRequest {
            tx,
            utxos: self.spends.iter().map(|s| s.tx.clone()).collect(),
            paths: self.spends.iter().map(|s| s.path.clone()).collect(),
            change_path,
        })
    }

    /// Input family for the payment, segwit when any spend has witnesses
    pub fn family(&self) -> InputFamily {
        match self.spends.iter().any(|s| s.tx.kind == TxKind::Segwit) {
            true => InputFamily::Segwit,
            false => InputFamily::Legacy,
        }
    }
}

/// Signed payment
#[derive(Clone, PartialEq, Debug)]
pub struct SignedPayment {
    /// Signing request built for the payment, holding the unsigned transaction
    pub request: SignRequest,
    /// Input signatures
    pub signatures: Vec<Signature>,
}
