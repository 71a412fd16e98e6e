// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Command line utility for interacting with the Ledger Bitcoin app

use std::path::Path;

use clap::Parser;
use log::{debug, info, LevelFilter};
use serde::{de::DeserializeOwned, Serialize};

use ledger_btc::{
    apdu::{
        hash_mode::InputFamily, path::DerivationPath, public_key::AddressFormat, tx::Tx,
    },
    transport::TcpOptions,
    DeviceHandle, Error, Exchange, SignConfig, TcpHandle,
};

mod helpers;
use helpers::*;

/// Ledger Bitcoin app command line utility
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Speculos APDU socket options
    #[clap(flatten)]
    tcp: TcpOptions,

    /// Connect to a USB HID device rather than the Speculos socket
    #[cfg(feature = "transport_hid")]
    #[clap(long)]
    hid: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// Fetch a random value from the device
    GetRandom {
        /// Number of random bytes (5 to 248)
        #[clap(long, default_value = "8")]
        len: usize,
    },

    /// Fetch device firmware version
    FirmwareVersion,

    /// Fetch coin parameters for the running app
    CoinVersion,

    /// Fetch the public key and address for a BIP32 path
    PublicKey {
        /// Derivation path, eg. `m/44'/0'/0'/0/0`
        #[clap(long)]
        path: DerivationPath,

        /// Address format
        #[clap(long, default_value = "legacy")]
        format: AddressFormat,

        /// Display the address on the device for verification
        #[clap(long)]
        display: bool,
    },

    /// Fetch a trusted input for a transaction output
    TrustedInput {
        /// Hex encoded raw transaction
        #[clap(long)]
        tx: HexData,

        /// Output index
        #[clap(long, default_value = "0")]
        index: u32,
    },

    /// Parse a raw transaction (does not require a device)
    ParseTx {
        /// Hex encoded raw transaction
        tx: HexData,
    },

    /// Sign a transaction described by a JSON request file
    SignTx {
        /// Signing request file (`.json`)
        #[clap(long)]
        input: String,

        /// Signature output file (`.json`)
        #[clap(long)]
        output: Option<String>,

        /// Use the legacy input family (per-input hashing cycle)
        #[clap(long)]
        legacy: bool,

        /// Send untrusted inputs rather than fetching trusted inputs
        #[clap(long)]
        untrusted: bool,
    },

    /// Build and sign a payment described by a JSON request file
    SignPayment {
        /// Payment request file (`.json`)
        #[clap(long)]
        input: String,

        /// Signed payment output file (`.json`)
        #[clap(long)]
        output: Option<String>,
    },

    /// Sign a message with the key at a BIP32 path
    SignMessage {
        /// Derivation path, eg. `m/44'/0'/0'/0/0`
        #[clap(long)]
        path: DerivationPath,

        /// Message to sign
        message: String,

        /// Message is hex encoded
        #[clap(long)]
        hex: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())?;

    // Handle offline commands
    if let Actions::ParseTx { tx } = &args.cmd {
        let tx = Tx::parse(tx.as_ref())?;
        print_tx(&tx);
        return Ok(());
    }

    #[cfg(feature = "transport_hid")]
    if args.hid {
        debug!("Connecting to HID device");
        let t = ledger_btc::HidHandle::connect_hid()?;
        return execute(t, args.cmd).await;
    }

    // Connect to device
    debug!("Connecting to {}:{}", args.tcp.addr, args.tcp.port);
    let t = TcpHandle::connect(&args.tcp).await?;

    // Execute command
    execute(t, args.cmd).await?;

    Ok(())
}

/// Execute a command with the provided device handle
async fn execute<T>(mut t: DeviceHandle<T>, cmd: Actions) -> anyhow::Result<()>
where
    T: Exchange + Send + Sync,
    Error: From<T::Error>,
{
    debug!("Executing command: {:?}", cmd);

    match cmd {
        Actions::GetRandom { len } => {
            info!("requesting {} random bytes", len);

            let r = t.random(len).await?;

            info!("value: {}", hex::encode(r));
        }
        Actions::FirmwareVersion => {
            let v = t.firmware_version().await?;

            info!("firmware version: {:#?}", v);
        }
        Actions::CoinVersion => {
            let v = t.coin_version().await?;

            info!("coin: {} ({})", v.name, v.ticker);
            info!("p2pkh prefix: {:04x}", v.p2pkh_prefix);
            info!("p2sh prefix: {:04x}", v.p2sh_prefix);
            info!("family: {}", v.family);
        }
        Actions::PublicKey {
            path,
            format,
            display,
        } => {
            info!("requesting public key for path: {} ({})", path, format);

            let k = t.public_key(&path, format, display).await?;

            info!("public key: {}", hex::encode(&k.public_key));
            info!("address: {}", k.address);
            info!("chain code: {}", hex::encode(k.chain_code));
        }
        Actions::TrustedInput { tx, index } => {
            let tx = Tx::parse(tx.as_ref())?;

            info!(
                "requesting trusted input for output {} of {}",
                index,
                display_hash(&tx.txid())
            );

            let ti = t.trusted_input(&tx, index).await?;

            info!("trusted input: {}", hex::encode(ti.to_bytes()));
            info!("amount: {}", ti.amount);
        }
        Actions::SignTx {
            input,
            output,
            legacy,
            untrusted,
        } => {
            // Read in request file
            let f: SignTxFile = read_input(&input).await?;
            let req = f.to_request()?;

            let cfg = SignConfig {
                family: legacy.then_some(InputFamily::Legacy),
                trusted: !untrusted,
            };

            info!(
                "signing transaction {} ({} inputs)",
                display_hash(&req.tx.txid()),
                req.tx.inputs.len()
            );

            let sigs = t.sign_transaction(&req, cfg).await?;
            let resp = SignTxResult::new(&sigs);

            for s in &resp.signatures {
                info!("input {}: {}", s.input, s.signature);
            }

            // Write output file
            if let Some(o) = output {
                write_output(&o, &resp).await?;
            }
        }
        Actions::SignPayment { input, output } => {
            let f: PaymentFile = read_input(&input).await?;
            let p = f.to_request()?;

            info!(
                "signing payment of {} to {} ({} spends, fees: {})",
                p.amount,
                p.address,
                p.spends.len(),
                p.fees
            );

            let signed = t.sign_new_transaction(&p, SignConfig::default()).await?;
            let resp = SignPaymentResult::new(&signed);

            info!("unsigned transaction: {}", resp.tx);
            for s in &resp.signatures {
                info!("input {}: {}", s.input, s.signature);
            }

            if let Some(o) = output {
                write_output(&o, &resp).await?;
            }
        }
        Actions::SignMessage { path, message, hex } => {
            let m = match hex {
                true => hex::decode(message.trim())?,
                false => message.into_bytes(),
            };

            info!("signing {} byte message with path: {}", m.len(), path);

            let s = t.sign_message(&path, &m).await?;

            info!("signature: {}", hex::encode(s.der()));
            info!("parity: {}", s.parity);
            info!("compact: {}", hex::encode(s.to_compact(true)?));
        }
        Actions::ParseTx { tx } => {
            let tx = Tx::parse(tx.as_ref())?;
            print_tx(&tx);
        }
    }

    Ok(())
}

/// Log the decoded contents of a transaction
fn print_tx(tx: &Tx) {
    info!("kind: {}", tx.kind);
    info!("version: {:08x}", tx.version);
    if let Some(g) = tx.version_group_id {
        info!("version group id: {:08x}", g);
    }
    info!("txid: {}", display_hash(&tx.txid()));

    for (i, input) in tx.inputs.iter().enumerate() {
        info!(
            "input {}: {}:{} (sequence: {:08x}, script: {})",
            i,
            display_hash(&input.prev_hash),
            input.prev_index,
            input.sequence,
            hex::encode(&input.script)
        );
    }

    for (i, o) in tx.outputs.iter().enumerate() {
        info!("output {}: {} ({})", i, o.value, hex::encode(&o.script));
    }

    info!("lock time: {}", tx.lock_time);
    if let Some(h) = tx.expiry_height() {
        info!("expiry height: {}", h);
    }
}

/// Helper to read input files where required
async fn read_input<T: DeserializeOwned>(file_name: &str) -> anyhow::Result<T> {
    debug!("Reading input from '{}'", file_name);

    let s = tokio::fs::read_to_string(file_name).await?;

    // Determine format from file name
    let p = Path::new(file_name);

    // Decode based on input extension
    let v = match p.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&s)?,
        _ => return Err(anyhow::anyhow!("unsupported input file format")),
    };

    Ok(v)
}

/// Helper to write output files if `--output` argument is provided
async fn write_output(file_name: &str, value: &impl Serialize) -> anyhow::Result<()> {
    debug!("Writing output to '{}'", file_name);

    // Determine format from file name
    let p = Path::new(file_name);
    match p.extension().and_then(|e| e.to_str()) {
        // Encode to JSON for `.json` files
        Some("json") => {
            let s = serde_json::to_string_pretty(value)?;
            tokio::fs::write(p, s).await?;
        }
        _ => return Err(anyhow::anyhow!("unsupported output file format")),
    }

    Ok(())
}
