//! Connection dialling for the pooled HTTP client.
//!
//! `hyper-util`'s pooled client asks a `tower` service for new connections.
//! [`Dialer`] answers with a Unix socket, a TCP stream or a TLS stream
//! depending on the endpoint, bounded by the configured connect timeout.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use hyper::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tower_service::Service;

use super::endpoint::DialTarget;
use super::tls::TlsSettings;

/// An established connection to the engine.
pub enum EngineIo {
    /// Plain TCP.
    Tcp(TokioIo<TcpStream>),
    /// TCP wrapped in TLS.
    Tls(Box<TokioIo<TlsStream<TcpStream>>>),
    /// Unix domain socket.
    #[cfg(unix)]
    Unix(TokioIo<UnixStream>),
}

impl Connection for EngineIo {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl Read for EngineIo {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(io) => Pin::new(io).poll_read(cx, buf),
            Self::Tls(io) => Pin::new(io.as_mut()).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Unix(io) => Pin::new(io).poll_read(cx, buf),
        }
    }
}

impl Write for EngineIo {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(io) => Pin::new(io).poll_write(cx, buf),
            Self::Tls(io) => Pin::new(io.as_mut()).poll_write(cx, buf),
            #[cfg(unix)]
            Self::Unix(io) => Pin::new(io).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(io) => Pin::new(io).poll_flush(cx),
            Self::Tls(io) => Pin::new(io.as_mut()).poll_flush(cx),
            #[cfg(unix)]
            Self::Unix(io) => Pin::new(io).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(io) => Pin::new(io).poll_shutdown(cx),
            Self::Tls(io) => Pin::new(io.as_mut()).poll_shutdown(cx),
            #[cfg(unix)]
            Self::Unix(io) => Pin::new(io).poll_shutdown(cx),
        }
    }
}

/// Opens connections to a single engine endpoint.
///
/// Request URIs are ignored: the dial target is fixed at construction, which
/// is what lets local socket endpoints use a placeholder URL host.
#[derive(Clone)]
pub struct Dialer {
    target: Arc<DialTarget>,
    tls: Option<TlsConnector>,
    timeout: Duration,
}

impl Dialer {
    pub(crate) fn new(target: DialTarget, tls: Option<&TlsSettings>, timeout: Duration) -> Self {
        Self {
            target: Arc::new(target),
            tls: tls.map(TlsSettings::connector),
            timeout,
        }
    }

    async fn dial(self) -> io::Result<EngineIo> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.dial_target())
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {}s", timeout.as_secs()),
                )
            })?
    }

    async fn dial_target(&self) -> io::Result<EngineIo> {
        match self.target.as_ref() {
            #[cfg(unix)]
            DialTarget::Unix(path) => {
                let stream = UnixStream::connect(path.as_std_path()).await?;
                Ok(EngineIo::Unix(TokioIo::new(stream)))
            }
            #[cfg(not(unix))]
            DialTarget::Unix(path) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unix sockets are not available on this platform: {path}"),
            )),
            DialTarget::Tcp { host, port, tls } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                stream.set_nodelay(true)?;
                if !*tls {
                    return Ok(EngineIo::Tcp(TokioIo::new(stream)));
                }
                let connector = self.tls.as_ref().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "TLS endpoint dialled without TLS settings",
                    )
                })?;
                let server_name = ServerName::try_from(host.clone())
                    .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
                let tls_stream = connector.connect(server_name, stream).await?;
                Ok(EngineIo::Tls(Box::new(TokioIo::new(tls_stream))))
            }
        }
    }
}

impl Service<Uri> for Dialer {
    type Response = EngineIo;
    type Error = io::Error;
    type Future = BoxFuture<'static, io::Result<EngineIo>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        Box::pin(self.clone().dial())
    }
}
