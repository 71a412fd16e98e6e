// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

use rand::Rng;

use ledger_btc::{
    apdu::{prelude::*, status::StatusWord, Instruction},
    DeviceHandle, Error,
};

mod helpers;
use helpers::*;

#[tokio::test(flavor = "multi_thread")]
async fn btc_random() -> anyhow::Result<()> {
    setup();

    let mut h = DeviceHandle::from(SimDevice::default());

    let n = rand::thread_rng().gen_range(5..=248);
    let r = h.random(n).await?;
    assert_eq!(r.len(), n);

    // Out of range lengths are rejected before reaching the device
    assert!(matches!(
        h.random(4).await,
        Err(Error::Protocol(ledger_btc::apdu::Error::InvalidParameter))
    ));
    assert_eq!(h.transport().apdus().len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_versions() -> anyhow::Result<()> {
    setup();

    let mut h = DeviceHandle::from(SimDevice::default());

    let f = h.firmware_version().await?;
    assert_eq!((f.major, f.minor, f.patch), (2, 1, 5));
    assert!(f.flags.contains(FirmwareFlags::COMPRESSED_KEYS));

    let c = h.coin_version().await?;
    assert_eq!(c.name, "Zcash");
    assert_eq!(c.ticker, "ZEC");
    assert_eq!(c.p2pkh_prefix, 0x1cb8);
    assert_eq!(c.p2sh_prefix, 0x1cbd);

    let sent: Vec<String> = h.transport().apdus().iter().map(hex::encode).collect();
    assert_eq!(sent, vec!["e0c4000000", "e016000000"]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_public_key() -> anyhow::Result<()> {
    setup();

    let mut h = DeviceHandle::from(SimDevice::default());
    let p = path("m/44'/0'/0'/0/0");

    let k = h.public_key(&p, AddressFormat::Legacy, false).await?;
    assert_eq!(k.public_key.len(), 65);
    assert_eq!(k.address, SIM_ADDRESS);
    assert_eq!(hex::encode(&k.public_key), SIM_PUBLIC_KEY);
    assert_eq!(k.chain_code, [0xcc; 32]);

    let a = &h.transport().with_ins(Instruction::GetWalletPublicKey)[0];
    assert_eq!((a.p1, a.p2), (0x00, 0x00));
    assert_eq!(a.data, p.to_bytes());

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_public_key_rejected() -> anyhow::Result<()> {
    setup();

    let mut s = SimDevice::default();
    s.fail_on(Instruction::GetWalletPublicKey, 0x6985);
    let mut h = DeviceHandle::from(s);

    let p = path("m/84'/0'/0'/0/0");

    // Rejecting the displayed address is a user denial
    let r = h.public_key(&p, AddressFormat::Bech32, true).await;
    assert!(matches!(r, Err(Error::UserDenied)), "{r:?}");

    let a = &h.transport().with_ins(Instruction::GetWalletPublicKey)[0];
    assert_eq!((a.p1, a.p2), (0x01, 0x02));

    // Without display the status is reported as-is
    let mut s = SimDevice::default();
    s.fail_on(Instruction::GetWalletPublicKey, 0x6985);
    let mut h = DeviceHandle::from(s);

    let r = h.public_key(&p, AddressFormat::Bech32, false).await;
    assert!(
        matches!(
            r,
            Err(Error::Device(StatusWord::ConditionsOfUseNotSatisfied))
        ),
        "{r:?}"
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_unknown_status() -> anyhow::Result<()> {
    setup();

    let mut s = SimDevice::default();
    s.fail_on(Instruction::GetCoinVersion, 0x6123);
    let mut h = DeviceHandle::from(s);

    let r = h.coin_version().await;
    assert!(
        matches!(r, Err(Error::Device(StatusWord::Unknown(0x6123)))),
        "{r:?}"
    );

    Ok(())
}

const MESSAGE: &str = "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks.";

#[tokio::test(flavor = "multi_thread")]
async fn btc_sign_message() -> anyhow::Result<()> {
    setup();

    let mut h = DeviceHandle::from(SimDevice::default()).with_config(BuilderConfig { max_chunk: 32 });
    let p = path("m/44'/1'/0'/0/0");

    let s = h.sign_message(&p, MESSAGE.as_bytes()).await?;
    assert!(s.parity);
    assert_eq!(s.der()[0], 0x30);
    assert_eq!(s.to_compact(true)?[0], 32);

    // Path and length lead the first APDU, the message follows in chunks
    let sent = h.transport().with_ins(Instruction::SignMessage);
    let modes: Vec<_> = sent.iter().map(|a| (a.p1, a.p2)).collect();
    assert_eq!(modes, vec![(0x00, 0x01), (0x00, 0x80), (0x00, 0x80), (0x80, 0x00)]);

    assert_eq!(&sent[0].data[..21], &p.to_bytes()[..]);
    assert_eq!(&sent[0].data[21..23], &[0x00, 0x46]);

    let streamed: Vec<u8> = sent[..3]
        .iter()
        .flat_map(|a| a.data.clone())
        .skip(23)
        .collect();
    assert_eq!(streamed, MESSAGE.as_bytes());
    assert_eq!(sent[3].data, vec![0x00]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn btc_sign_message_rejected() -> anyhow::Result<()> {
    setup();

    let p = path("m/44'/1'/0'/0/0");

    let mut h = DeviceHandle::from(SimDevice::default().with_message_denied());
    let r = h.sign_message(&p, MESSAGE.as_bytes()).await;
    assert!(matches!(r, Err(Error::UserDenied)), "{r:?}");

    // Failures while streaming are device errors
    let mut s = SimDevice::default();
    s.fail_on(Instruction::SignMessage, 0x6a80);
    let mut h = DeviceHandle::from(s);

    let r = h.sign_message(&p, MESSAGE.as_bytes()).await;
    assert!(
        matches!(r, Err(Error::Device(StatusWord::IncorrectData))),
        "{r:?}"
    );
    assert_eq!(h.transport().apdus().len(), 1);

    // Empty messages never reach the device
    let mut h = DeviceHandle::from(SimDevice::default());
    let r = h.sign_message(&p, &[]).await;
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
