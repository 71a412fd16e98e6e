// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

use ledger_btc::{
    apdu::{trusted_input::TRUSTED_INPUT_LEN, Instruction},
    DeviceHandle, Error,
};

mod helpers;
use helpers::*;

#[tokio::test(flavor = "multi_thread")]
async fn btc_trusted_input_legacy() -> anyhow::Result<()> {
    setup();

    let utxo = tx(TX_LEGACY);
    let mut h = DeviceHandle::from(SimDevice::new(&[utxo.clone()]));

    let ti = h.trusted_input(&utxo, 0).await?;
    let b = ti.to_bytes();

    assert_eq!(b.len(), TRUSTED_INPUT_LEN);
    assert_eq!(hex::encode(&b[..2]), "3200");
    assert_eq!(hex::encode(&b[36..40]), "00000000");
    assert_eq!(hex::encode(&b[40..48]), "d7ee7c0100000000");
    assert_eq!(ti.txid, utxo.txid());

    // Index (BE), version, input count lead the stream
    let sent = h.transport().with_ins(Instruction::GetTrustedInput);
    assert_eq!(hex::encode(&sent[0].data), "000000000200000002");
    assert_eq!(sent[0].p1, 0x00);
    assert!(sent[1..].iter().all(|a| a.p1 == 0x80 && a.p2 == 0x00));

    // Lock time closes the stream
    assert_eq!(hex::encode(&sent[sent.len() - 1].data), "e3691900");

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_trusted_input_sapling() -> anyhow::Result<()> {
    setup();

    let utxo = tx(TX_SAPLING);
    let mut h = DeviceHandle::from(SimDevice::new(&[utxo.clone()]));

    let ti = h.trusted_input(&utxo, 1).await?;
    assert_eq!(ti.index, 1);
    assert_eq!(hex::encode(ti.amount.to_le_bytes()), "4d94910000000000");

    // Spent by the unsigned sapling transaction
    let spend = tx(TX_SAPLING_UNSIGNED);
    assert_eq!(ti.txid, spend.inputs[0].prev_hash);

    // Version group id follows the version, footer length follows the lock time
    let sent = h.transport().with_ins(Instruction::GetTrustedInput);
    assert_eq!(hex::encode(&sent[0].data), "000000010400008085202f8901");

    let n = sent.len();
    assert_eq!(hex::encode(&sent[n - 2].data), "000000000f");
    assert_eq!(sent[n - 1].data, vec![0u8; 15]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_trusted_input_small_chunks() -> anyhow::Result<()> {
    setup();

    let utxo = tx(TX_LEGACY);

    let mut a = DeviceHandle::from(SimDevice::new(&[utxo.clone()]));
    let mut b = DeviceHandle::from(SimDevice::new(&[utxo.clone()]))
        .with_config(ledger_btc::apdu::BuilderConfig { max_chunk: 32 });

    let ti_a = a.trusted_input(&utxo, 0).await?;
    let ti_b = b.trusted_input(&utxo, 0).await?;
    assert_eq!(ti_a, ti_b);

    let sent = b.transport().with_ins(Instruction::GetTrustedInput);
    assert!(sent.iter().all(|a| a.data.len() <= 32));
    assert!(sent.len() > a.transport().apdus().len());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_trusted_input_mismatch() -> anyhow::Result<()> {
    setup();

    let utxo = tx(TX_LEGACY);
    let s = SimDevice::new(&[utxo.clone()]).with_amount_offset(1);
    let mut h = DeviceHandle::from(s);

    let r = h.trusted_input(&utxo, 0).await;
    assert!(matches!(r, Err(Error::UnexpectedResponse)), "{r:?}");

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_trusted_input_unknown_output() -> anyhow::Result<()> {
    setup();

    let utxo = tx(TX_LEGACY);
    let mut h = DeviceHandle::from(SimDevice::new(&[utxo.clone()]));

    let r = h.trusted_input(&utxo, 1).await;
    assert!(
        matches!(
            r,
            Err(Error::Protocol(ledger_btc::apdu::Error::InvalidParameter))
        ),
        "{r:?}"
    );
    assert!(h.transport().apdus().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_trusted_input_device_error() -> anyhow::Result<()> {
    setup();

    let utxo = tx(TX_LEGACY);
    let mut s = SimDevice::new(&[utxo.clone()]);
    s.fail_on(Instruction::GetTrustedInput, 0x6a80);
    let mut h = DeviceHandle::from(s);

    // The first failure aborts the stream
    let r = h.trusted_input(&utxo, 0).await;
    assert!(matches!(r, Err(Error::Device(_))), "{r:?}");
    assert_eq!(h.transport().apdus().len(), 1);

    // A fresh request succeeds
    h.trusted_input(&utxo, 0).await?;

    Ok(())
}
