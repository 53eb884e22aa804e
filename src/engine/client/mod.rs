//! Request dispatch against a single container engine.
//!
//! [`EngineClient`] owns the shared transport, the API version prefix and the
//! monitor registry. Every call in the crate funnels through
//! [`EngineClient::send_request`] or [`EngineClient::send_request_streaming`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::error_classification::classify_request_error;
use super::transport::{DEFAULT_CONNECT_TIMEOUT, Endpoint, TlsSettings, Transport};
use crate::error::{ApiError, PodwatchError, Result, TransportError};
use crate::monitor::{MonitorId, MonitorRegistry};

/// API version used when none is supplied.
pub const DEFAULT_API_VERSION: &str = "v1.17";

/// API versions the client has been exercised against.
const CHECKED_API_VERSIONS: &[&str] = &["v1.17", "v1.18"];

const JSON_CONTENT_TYPE: &str = "application/json";

/// Options applied when constructing an [`EngineClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// API version prefix, with or without the leading `v`.
    pub api_version: Option<String>,
    /// Dial timeout; defaults to 30 seconds.
    pub connect_timeout: Option<Duration>,
    /// TLS settings for network endpoints.
    pub tls: Option<TlsSettings>,
    /// Whether the endpoint is a swarm manager rather than a single engine.
    pub swarm: bool,
}

/// A client bound to one container engine endpoint.
///
/// Cloning is cheap: clones share the connection pool and the monitor
/// registry, so a monitor started through one clone can be stopped through
/// another.
#[derive(Debug, Clone)]
pub struct EngineClient {
    transport: Transport,
    api_version: String,
    api_version_checked: bool,
    swarm: bool,
    monitors: Arc<MonitorRegistry>,
}

impl EngineClient {
    /// Build a client for `endpoint`.
    ///
    /// No connection is opened here; dial failures surface on the first
    /// request.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidEndpoint` when the endpoint cannot be
    /// parsed.
    pub fn new(endpoint: &str, options: ClientOptions) -> Result<Self> {
        let ClientOptions {
            api_version,
            connect_timeout,
            tls,
            swarm,
        } = options;

        let parsed = Endpoint::parse(endpoint, tls.is_some())?;
        let transport = Transport::new(
            parsed,
            tls.as_ref(),
            connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        );
        let version = normalise_api_version(api_version.as_deref());
        let checked = CHECKED_API_VERSIONS.contains(&version.as_str());
        if !checked {
            warn!(
                api_version = %version,
                "remote API version has not been checked; continuing anyway"
            );
        }

        Ok(Self {
            transport,
            api_version: version,
            api_version_checked: checked,
            swarm,
            monitors: Arc::new(MonitorRegistry::default()),
        })
    }

    /// Returns the API version prefix, always starting with `v`.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Returns whether the API version is one the client has been checked
    /// against.
    #[must_use]
    pub const fn api_version_checked(&self) -> bool {
        self.api_version_checked
    }

    /// Returns whether this client talks to a swarm manager.
    #[must_use]
    pub const fn is_swarm(&self) -> bool {
        self.swarm
    }

    /// Returns the endpoint this client dials.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        self.transport.endpoint()
    }

    /// Returns the registry of live monitors.
    #[must_use]
    pub fn monitors(&self) -> &MonitorRegistry {
        &self.monitors
    }

    pub(crate) fn monitors_handle(&self) -> Arc<MonitorRegistry> {
        Arc::clone(&self.monitors)
    }

    /// Stop a monitor. Stopping an unknown or already stopped monitor does
    /// nothing.
    pub fn stop_monitor(&self, id: MonitorId) {
        self.monitors.stop(id);
    }

    /// Returns whether a monitor is still live.
    #[must_use]
    pub fn is_monitor_live(&self, id: MonitorId) -> bool {
        self.monitors.is_live(id)
    }

    /// Send a request and buffer the whole response body.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` when the exchange or the body read fails and
    /// `ApiError::Status` for responses with a status of 400 or above.
    pub async fn send_request(&self, request: EngineRequest) -> Result<Bytes> {
        let response = self.dispatch(request).await?;
        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|error| TransportError::Body {
                message: error.to_string(),
            })?;
        Ok(collected.to_bytes())
    }

    /// Send a request and hand the open response body to `consumer`.
    ///
    /// The body is moved into the consumer, so it is released when the
    /// consumer's future completes or is dropped, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the dispatch errors of [`Self::send_request`], or whatever
    /// the consumer returns.
    pub async fn send_request_streaming<F, Fut, T>(
        &self,
        request: EngineRequest,
        consumer: F,
    ) -> Result<T>
    where
        F: FnOnce(Incoming) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let response = self.dispatch(request).await?;
        consumer(response.into_body()).await
    }

    async fn dispatch(&self, request: EngineRequest) -> Result<Response<Incoming>> {
        let http_request = request.into_http(self.endpoint().base_url(), &self.api_version)?;
        debug!(
            method = %http_request.method(),
            uri = %http_request.uri(),
            "sending engine request"
        );

        let response = self
            .transport
            .execute(http_request)
            .await
            .map_err(|error| classify_request_error(&error, self.transport.tls_configured()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ApiError::Status {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("Unknown Status")
                    .to_owned(),
            }
            .into());
        }
        Ok(response)
    }
}

/// Decode a buffered JSON response body.
pub(crate) fn decode_json<T: DeserializeOwned>(what: &'static str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|error| {
        PodwatchError::from(ApiError::Decode {
            what,
            message: error.to_string(),
        })
    })
}

fn normalise_api_version(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|version| !version.is_empty()) {
        None => DEFAULT_API_VERSION.to_owned(),
        Some(version) if version.starts_with('v') => version.to_owned(),
        Some(version) => format!("v{version}"),
    }
}

/// One HTTP exchange with the engine, described relative to the API root.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    what: &'static str,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl EngineRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        let path_string = path.into();
        Self {
            what: "engine",
            method,
            path: path_string,
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A `GET` request for `path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A `POST` request for `path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A `DELETE` request for `path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Name the operation, used in error messages.
    #[must_use]
    pub const fn named(mut self, what: &'static str) -> Self {
        self.what = what;
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query parameter when `value` is present.
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(present) => self.query(key, present),
            None => self,
        }
    }

    /// Add a request header. Caller headers are sent alongside the JSON
    /// content type.
    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Serialise `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` when `body` cannot be serialised.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let encoded = serde_json::to_vec(body).map_err(|error| ApiError::Encode {
            what: self.what,
            message: error.to_string(),
        })?;
        self.body = Bytes::from(encoded);
        Ok(self)
    }

    /// Returns the method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path and query relative to the API version prefix.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        let path = self.path.trim_start_matches('/');
        if self.query.is_empty() {
            return path.to_owned();
        }
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{path}?{encoded}")
    }

    fn into_http(self, base_url: &str, api_version: &str) -> Result<Request<Full<Bytes>>> {
        let url = format!("{base_url}/{api_version}/{}", self.path_and_query());
        let mut builder = Request::builder()
            .method(self.method)
            .uri(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder.body(Full::new(self.body)).map_err(|error| {
            PodwatchError::from(ApiError::Encode {
                what: self.what,
                message: error.to_string(),
            })
        })
    }
}
