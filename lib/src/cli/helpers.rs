// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use ledger_btc::{
    apdu::{hash_sign::Signature, path::DerivationPath, tx::Tx},
    PaymentRequest, SignRequest, SignedPayment, Spend,
};

/// Variable length hex encoded argument
#[derive(Clone, PartialEq, Debug)]
pub struct HexData(pub Vec<u8>);

impl FromStr for HexData {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim()).map(HexData)
    }
}

impl AsRef<[u8]> for HexData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Transaction signing request file
///
/// Transactions are hex encoded raw transactions, previous transactions
/// are listed in input order.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignTxFile {
    pub tx: String,
    pub utxos: Vec<String>,
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_path: Option<String>,
}

impl SignTxFile {
    /// Parse transactions and paths into a [SignRequest]
    pub fn to_request(&self) -> anyhow::Result<SignRequest> {
        let tx = parse_tx(&self.tx)?;

        let utxos = self
            .utxos
            .iter()
            .map(|u| parse_tx(u))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let paths = self
            .paths
            .iter()
            .map(|p| DerivationPath::from_str(p))
            .collect::<Result<Vec<_>, _>>()?;

        let change_path = match &self.change_path {
            Some(p) => Some(DerivationPath::from_str(p)?),
            None => None,
        };

        Ok(SignRequest {
            tx,
            utxos,
            paths,
            change_path,
        })
    }
}

/// Signed transaction output file
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignTxResult {
    pub signatures: Vec<InputSignature>,
}

/// Signature for a transaction input
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct InputSignature {
    pub input: usize,
    /// R point parity reported by the device
    pub parity: bool,
    /// Hex encoded DER signature with trailing sighash type
    pub signature: String,
}

impl SignTxResult {
    pub fn new(signatures: &[Signature]) -> Self {
        let signatures = signatures
            .iter()
            .enumerate()
            .map(|(input, s)| InputSignature {
                input,
                parity: s.parity,
                signature: hex::encode(s.to_script_bytes()),
            })
            .collect();

        Self { signatures }
    }
}

/// Payment request file
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PaymentFile {
    pub address: String,
    pub amount: u64,
    pub fees: u64,
    pub change_path: String,
    pub spends: Vec<SpendEntry>,
    #[serde(default)]
    pub lock_time: u32,
}

/// Previous output spent by a payment
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SpendEntry {
    /// Hex encoded raw transaction holding the output
    pub tx: String,
    pub index: u32,
    pub path: String,
}

impl PaymentFile {
    pub fn to_request(&self) -> anyhow::Result<PaymentRequest> {
        let spends = self
            .spends
            .iter()
            .map(|s| -> anyhow::Result<Spend> {
                Ok(Spend {
                    tx: parse_tx(&s.tx)?,
                    index: s.index,
                    path: DerivationPath::from_str(&s.path)?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(PaymentRequest {
            address: self.address.clone(),
            amount: self.amount,
            fees: self.fees,
            change_path: DerivationPath::from_str(&self.change_path)?,
            spends,
            lock_time: self.lock_time,
        })
    }
}

/// Signed payment output file
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SignPaymentResult {
    /// Hex encoded unsigned transaction
    pub tx: String,
    pub signatures: Vec<InputSignature>,
}

impl SignPaymentResult {
    pub fn new(p: &SignedPayment) -> Self {
        Self {
            tx: hex::encode(p.request.tx.serialize()),
            signatures: SignTxResult::new(&p.signatures).signatures,
        }
    }
}

/// Parse a hex encoded raw transaction
pub fn parse_tx(s: &str) -> anyhow::Result<Tx> {
    let b = hex::decode(s.trim())?;
    let tx = Tx::parse(&b)?;
    Ok(tx)
}

/// Display a transaction hash in the conventional (reversed) byte order
pub fn display_hash(h: &[u8; 32]) -> String {
    let mut r = *h;
    r.reverse();
    hex::encode(r)
}
