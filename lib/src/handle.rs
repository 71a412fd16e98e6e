// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Handle for connected ledger devices
//!
//! This provides methods for interacting with the Bitcoin app
//! and is generic over [Exchange] transports

use encdec::Decode;
use log::{debug, warn};

use ledger_btc_apdu::{
    answer_status, decode_exact, hash_input::FINALIZE_COMPLETE, prelude::*,
    sign_message::MESSAGE_PREPARED, status::StatusWord,
};

use crate::{
    payment::{PaymentRequest, SignedPayment},
    session::{SignConfig, SignRequest, SigningSession},
    transport::Exchange,
    Error,
};

/// Bitcoin app handle for a connected ledger device
///
/// The handle owns its transport, operations take `&mut self` as the app
/// processes one request at a time.
pub struct DeviceHandle<T: Exchange> {
    /// Transport for device communication
    t: T,
    /// APDU builder configuration
    cfg: BuilderConfig,
}

/// Create a [DeviceHandle] wrapper from a type implementing [Exchange]
impl<T: Exchange> From<T> for DeviceHandle<T> {
    fn from(t: T) -> Self {
        Self {
            t,
            cfg: BuilderConfig::default(),
        }
    }
}

impl<T> DeviceHandle<T>
where
    T: Exchange + Send + Sync,
    Error: From<T::Error>,
{
    /// Override the APDU builder configuration
    pub fn with_config(mut self, cfg: BuilderConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Fetch the APDU builder configuration
    pub fn config(&self) -> &BuilderConfig {
        &self.cfg
    }

    /// Fetch the underlying transport
    pub fn transport(&self) -> &T {
        &self.t
    }

    /// Consume the handle, returning the underlying transport
    pub fn into_inner(self) -> T {
        self.t
    }

    /// Fetch random bytes from the device
    pub async fn random(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        debug!("Requesting {} random bytes", len);

        let req = RandomReq::new(len)?;
        let data = self.request(&req).await?;

        if req.check_response(&data).is_err() {
            warn!("Random response length {} (expected {})", data.len(), len);
            return Err(Error::UnexpectedResponse);
        }

        Ok(data)
    }

    /// Fetch device firmware version
    pub async fn firmware_version(&mut self) -> Result<FirmwareVersion, Error> {
        debug!("Requesting firmware version");

        let data = self.request(&FirmwareVersionReq).await?;
        decode_response(&data)
    }

    /// Fetch coin parameters for the running app
    pub async fn coin_version(&mut self) -> Result<CoinVersion, Error> {
        debug!("Requesting coin version");

        let data = self.request(&CoinVersionReq).await?;
        decode_response(&data)
    }

    /// Fetch the public key and address for a derivation path,
    /// optionally displaying the address for user verification
    pub async fn public_key(
        &mut self,
        path: &DerivationPath,
        format: AddressFormat,
        display: bool,
    ) -> Result<WalletPublicKey, Error> {
        debug!(
            "Requesting public key for path: {} (format: {}, display: {})",
            path, format, display
        );

        let req = PublicKeyReq::new(path.clone(), format, display);
        let data = match self.request(&req).await {
            Err(Error::Device(StatusWord::ConditionsOfUseNotSatisfied)) if display => {
                return Err(Error::UserDenied)
            }
            r => r?,
        };

        decode_response(&data)
    }

    /// Fetch a trusted input for output `index` of `tx`
    ///
    /// The returned trusted input is checked against the requested output,
    /// a mismatch in index, amount or previous transaction hash is an
    /// [Error::UnexpectedResponse].
    pub async fn trusted_input(&mut self, tx: &Tx, index: u32) -> Result<TrustedInput, Error> {
        debug!(
            "Requesting trusted input for output {} of {} transaction",
            index, tx.kind
        );

        let req = TrustedInputReq::new(tx, index)?;
        let data = self.request(&req).await?;

        let ti: TrustedInput = decode_response(&data)?;
        if !ti.matches(tx, index) {
            warn!(
                "Trusted input mismatch (index: {}, amount: {})",
                ti.index, ti.amount
            );
            return Err(Error::UnexpectedResponse);
        }

        Ok(ti)
    }

    /// Stream transaction inputs to the device hash
    pub async fn hash_input_start(&mut self, req: &HashInputStartReq<'_>) -> Result<(), Error> {
        debug!(
            "Hashing inputs (mode: {:02x}, new: {}, script input: {})",
            req.mode.bits(),
            req.new_tx,
            req.script_index
        );

        self.request(req).await?;

        Ok(())
    }

    /// Stream change path and outputs to the device hash
    ///
    /// The device must answer the final APDU with `0000`, user rejection of
    /// the outputs is reported as [Error::UserDenied].
    pub async fn hash_input_finalize(
        &mut self,
        outputs: &[TxOutput],
        change_path: Option<&DerivationPath>,
    ) -> Result<(), Error> {
        debug!(
            "Finalizing hash ({} outputs, change: {:?})",
            outputs.len(),
            change_path.map(|p| p.to_string())
        );

        let req = HashFinalizeReq::new(outputs, change_path);
        let data = match self.request(&req).await {
            Err(Error::Device(StatusWord::ConditionsOfUseNotSatisfied)) => {
                return Err(Error::UserDenied)
            }
            r => r?,
        };

        if data[..] != FINALIZE_COMPLETE[..] {
            warn!("Unexpected finalize response: {}", hex::encode(&data));
            return Err(Error::UnexpectedResponse);
        }

        Ok(())
    }

    /// Sign the hashed transaction, returning the input signature
    pub async fn hash_sign(&mut self, req: &HashSignReq) -> Result<Signature, Error> {
        debug!(
            "Requesting signature for path: {} (lock time: {})",
            req.path, req.lock_time
        );

        let data = self.request(req).await?;

        let sig: Signature = decode_response(&data)?;
        if sig.sighash != req.sighash {
            warn!("Signature sighash {:02x} (expected {:02x})", sig.sighash, req.sighash);
            return Err(Error::UnexpectedResponse);
        }

        Ok(sig)
    }

    /// Sign a message with the key at `path`
    ///
    /// The app displays the message for approval, rejection is reported as
    /// [Error::UserDenied].
    pub async fn sign_message(
        &mut self,
        path: &DerivationPath,
        message: &[u8],
    ) -> Result<MessageSignature, Error> {
        debug!(
            "Requesting message signature for path: {} ({} bytes)",
            path,
            message.len()
        );

        let req = MessagePrepareReq::new(path.clone(), message)?;
        let data = self.request(&req).await?;

        if data[..] != MESSAGE_PREPARED[..] {
            warn!("Unexpected message prepare response: {}", hex::encode(&data));
            return Err(Error::UnexpectedResponse);
        }

        let data = match self.request(&MessageSignReq).await {
            Err(Error::Device(StatusWord::ConditionsOfUseNotSatisfied)) => {
                return Err(Error::UserDenied)
            }
            r => r?,
        };

        decode_response(&data)
    }

    /// Sign every input of a transaction, returning one signature per input
    pub async fn sign_transaction(
        &mut self,
        req: &SignRequest,
        cfg: SignConfig,
    ) -> Result<Vec<Signature>, Error> {
        debug!(
            "Signing {} transaction ({} inputs, {} outputs)",
            req.tx.kind,
            req.tx.inputs.len(),
            req.tx.outputs.len()
        );

        let mut s = SigningSession::new(self, req, cfg)?;
        s.run().await
    }

    /// Build and sign a new payment transaction
    ///
    /// Change, when any remains after the amount and fees, is paid to the
    /// device key at the payment change path ahead of the destination output.
    /// The input family defaults to segwit when any spent transaction carries
    /// witnesses.
    pub async fn sign_new_transaction(
        &mut self,
        p: &PaymentRequest,
        cfg: SignConfig,
    ) -> Result<SignedPayment, Error> {
        debug!(
            "Signing payment of {} to {} ({} spends, fees: {})",
            p.amount,
            p.address,
            p.spends.len(),
            p.fees
        );

        let change_key = match p.change()? {
            Some(_) => {
                let k = self
                    .public_key(&p.change_path, AddressFormat::Legacy, false)
                    .await?;
                Some(k.public_key)
            }
            None => None,
        };

        let request = p.build(change_key.as_deref())?;

        let cfg = SignConfig {
            family: cfg.family.or(Some(p.family())),
            ..cfg
        };
        let signatures = self.sign_transaction(&request, cfg).await?;

        Ok(SignedPayment {
            request,
            signatures,
        })
    }

    /// Issue the APDU sequence for a command, returning the final response
    /// payload
    ///
    /// Any status other than success aborts the sequence with
    /// [Error::Device].
    pub(crate) async fn request<C: Command + Sync>(&mut self, cmd: &C) -> Result<Vec<u8>, Error> {
        let apdus = cmd.apdus(&self.cfg)?;
        let n = apdus.len();

        let mut data = Vec::new();
        for (i, a) in apdus.iter().enumerate() {
            let resp = self.t.exchange(a).await?;

            let status = answer_status(&resp);
            if !status.is_ok() {
                debug!(
                    "{} APDU {}/{} failed: {} ({:04x})",
                    C::INS,
                    i + 1,
                    n,
                    status,
                    status.code()
                );
                return Err(Error::Device(status));
            }

            data = resp.data().to_vec();
        }

        Ok(data)
    }
}

/// Decode a device response, mapping malformed responses to
/// [Error::UnexpectedResponse]
fn decode_response<V>(data: &[u8]) -> Result<V, Error>
where
    V: for<'a> Decode<'a, Output = V, Error = ledger_btc_apdu::Error>,
{
    decode_exact(data).map_err(|e| {
        warn!("Malformed response ({}): {}", e, hex::encode(data));
        Error::UnexpectedResponse
    })
}
