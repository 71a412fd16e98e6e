// Copyright (c) 2022-2023 The Ledger Bitcoin Client Developers

//! Transports for the Bitcoin app
//!
//! Devices are driven through [ledger_transport::Exchange], with
//! [TcpTransport] for the Speculos APDU socket and
//! [ledger_transport_hid::TransportNativeHID] for USB devices.

pub use ledger_transport::Exchange;

#[cfg(feature = "transport_hid")]
pub use ledger_transport_hid::{hidapi, LedgerHIDError, TransportNativeHID};

#[cfg(feature = "transport_tcp")]
pub use tcp::{TcpOptions, TcpTransport, MAX_RESPONSE_LEN};

#[cfg(feature = "transport_tcp")]
mod tcp {
    use std::{
        net::{IpAddr, Ipv4Addr, SocketAddr},
        ops::Deref,
        time::Duration,
    };

    use async_trait::async_trait;
    use ledger_apdu::{APDUAnswer, APDUCommand};
    use log::{debug, trace, warn};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        sync::Mutex,
    };

    use super::Exchange;
    use crate::Error;

    /// Default Speculos APDU port
    pub const DEFAULT_APDU_PORT: u16 = 9999;

    /// Largest response payload accepted from the socket
    pub const MAX_RESPONSE_LEN: usize = 64 * 1024;

    /// Options for connecting to a Speculos APDU socket
    #[derive(Clone, PartialEq, Debug, clap::Args)]
    pub struct TcpOptions {
        /// Speculos APDU socket address
        #[clap(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
        pub addr: IpAddr,

        /// Speculos APDU socket port
        #[clap(long, default_value_t = DEFAULT_APDU_PORT)]
        pub port: u16,

        /// Per-request timeout in milliseconds
        #[clap(long = "timeout-ms", default_value_t = 10_000)]
        pub timeout_ms: u64,
    }

    impl Default for TcpOptions {
        fn default() -> Self {
            Self {
                addr: Ipv4Addr::LOCALHOST.into(),
                port: DEFAULT_APDU_PORT,
                timeout_ms: 10_000,
            }
        }
    }

    impl TcpOptions {
        /// Socket address for these options
        pub fn socket_addr(&self) -> SocketAddr {
            SocketAddr::new(self.addr, self.port)
        }

        /// Request timeout
        pub fn timeout(&self) -> Duration {
            Duration::from_millis(self.timeout_ms)
        }
    }

    /// Transport for the Speculos simulator APDU socket
    ///
    /// Requests are framed as `len (u32 BE) ‖ apdu`, responses as
    /// `len (u32 BE) ‖ data ‖ status word` where `len` excludes the
    /// status word.
    pub struct TcpTransport {
        s: Mutex<TcpStream>,
        timeout: Duration,
    }

    impl TcpTransport {
        /// Connect to the APDU socket described by `opts`
        pub async fn connect(opts: &TcpOptions) -> Result<Self, Error> {
            let addr = opts.socket_addr();

            debug!("Connecting to TCP APDU socket: {}", addr);

            let s = tokio::time::timeout(opts.timeout(), TcpStream::connect(addr)).await??;

            Ok(Self {
                s: Mutex::new(s),
                timeout: opts.timeout(),
            })
        }

        async fn request(&self, apdu: &[u8]) -> Result<Vec<u8>, Error> {
            let len = u32::try_from(apdu.len())
                .map_err(|_| Error::Transport(anyhow::anyhow!("TCP: APDU too long")))?;

            let mut req = Vec::with_capacity(4 + apdu.len());
            req.extend_from_slice(&len.to_be_bytes());
            req.extend_from_slice(apdu);

            let mut s = self.s.lock().await;

            s.write_all(&req).await?;

            let mut h = [0u8; 4];
            s.read_exact(&mut h).await?;
            let n = u32::from_be_bytes(h) as usize;

            if n > MAX_RESPONSE_LEN {
                warn!("TCP response length {} exceeds {}", n, MAX_RESPONSE_LEN);
                return Err(Error::Transport(anyhow::anyhow!(
                    "TCP: response length {} too large",
                    n
                )));
            }

            let mut resp = vec![0u8; n + 2];
            s.read_exact(&mut resp).await?;

            trace!("TCP rx: {}", hex::encode(&resp));

            Ok(resp)
        }
    }

    #[async_trait]
    impl Exchange for TcpTransport {
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

            trace!("TCP tx: {}", hex::encode(&apdu));

            let resp = tokio::time::timeout(self.timeout, self.request(&apdu)).await??;

            APDUAnswer::from_answer(resp).map_err(|_| Error::UnexpectedResponse)
        }
    }
}
