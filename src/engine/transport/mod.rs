//! Transport construction for the engine client.
//!
//! A [`Transport`] is built once per client and shared by every request. It
//! owns the dial target, TLS settings and connect timeout, and pools
//! connections through `hyper-util`'s client. Building a transport never
//! touches the network; dial failures surface on the first request.

mod dialer;
mod endpoint;
mod tls;

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use dialer::Dialer;
pub use endpoint::{DialTarget, Endpoint, LOCAL_SOCKET_BASE_URL};
pub use tls::TlsSettings;

/// Default connect timeout applied when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pooled HTTP/1.1 client bound to one engine endpoint.
#[derive(Clone)]
pub struct Transport {
    client: Client<Dialer, Full<Bytes>>,
    endpoint: Endpoint,
    tls_configured: bool,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .field("tls_configured", &self.tls_configured)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Build a transport for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint, tls: Option<&TlsSettings>, connect_timeout: Duration) -> Self {
        let dialer = Dialer::new(endpoint.target().clone(), tls, connect_timeout);
        let client = Client::builder(TokioExecutor::new()).build(dialer);
        Self {
            client,
            endpoint,
            tls_configured: tls.is_some(),
        }
    }

    /// Returns the endpoint this transport dials.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns whether TLS settings were supplied.
    #[must_use]
    pub const fn tls_configured(&self) -> bool {
        self.tls_configured
    }

    pub(crate) async fn execute(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        self.client.request(request).await
    }
}
