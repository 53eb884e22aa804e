//! Engine endpoint resolution and verified connection.
//!
//! The endpoint is taken from configuration when set, otherwise from the
//! conventional environment variables, otherwise the platform default. A
//! connection is just an [`EngineClient`]; nothing is dialled until the first
//! request, so callers that need a live engine verify it with a ping.

use std::time::Duration;

use tracing::debug;

use super::client::{ClientOptions, EngineClient};
use crate::error::{PodwatchError, TransportError};

/// Environment variables consulted, in order, when configuration names no
/// endpoint.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Upper bound on the verification ping.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Endpoint used when nothing else is configured.
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

/// Resolves the engine endpoint from environment variables.
///
/// Generic over [`mockable::Env`] so resolution can be tested without
/// touching the process environment.
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Creates a resolver reading from `env`.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Returns the first non-empty value of `DOCKER_HOST`, `CONTAINER_HOST`
    /// or `PODMAN_HOST`.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default endpoint.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// Builds [`EngineClient`]s from resolved endpoints and checks that the
/// engine answers.
pub struct EngineConnector;

impl EngineConnector {
    /// Build a client for `socket`.
    ///
    /// Accepts `unix://` URLs, bare socket paths, and `tcp://`, `http://`
    /// or `https://` addresses.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidEndpoint` if `socket` cannot be
    /// parsed.
    pub fn connect(socket: &str, options: ClientOptions) -> Result<EngineClient, PodwatchError> {
        debug!(endpoint = socket, "building engine client");
        EngineClient::new(socket, options)
    }

    /// Build a client for the endpoint chosen by [`Self::resolve_socket`].
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidEndpoint` if the resolved endpoint
    /// cannot be parsed.
    pub fn connect_with_fallback<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
        options: ClientOptions,
    ) -> Result<EngineClient, PodwatchError> {
        let socket = Self::resolve_socket(config_socket, resolver);
        Self::connect(&socket, options)
    }

    /// Pick the endpoint without building a client.
    ///
    /// Resolution order:
    /// 1. `config_socket` (CLI, config file or `PODWATCH_ENGINE_SOCKET`)
    /// 2. `DOCKER_HOST`, `CONTAINER_HOST`, `PODMAN_HOST`
    /// 3. `unix:///var/run/docker.sock`
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|socket| !socket.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| SocketResolver::<E>::default_socket().to_owned())
    }

    /// Ping the engine, failing unless it answers `OK` within ten seconds.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::HealthCheckTimeout` when the ping does not
    /// complete in time and `TransportError::HealthCheckFailed` when it
    /// fails or the engine answers something other than `OK`.
    pub async fn health_check_async(client: &EngineClient) -> Result<(), PodwatchError> {
        Self::ping_with_timeout(client, Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS)).await
    }

    /// Build a client for `socket` and verify the engine answers.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect`] and
    /// [`Self::health_check_async`].
    pub async fn connect_and_verify_async(
        socket: &str,
        options: ClientOptions,
    ) -> Result<EngineClient, PodwatchError> {
        let client = Self::connect(socket, options)?;
        Self::health_check_async(&client).await?;
        Ok(client)
    }

    /// Resolve the endpoint, build a client and verify the engine answers.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect_with_fallback`] and
    /// [`Self::health_check_async`].
    pub async fn connect_with_fallback_and_verify_async<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
        options: ClientOptions,
    ) -> Result<EngineClient, PodwatchError> {
        let client = Self::connect_with_fallback(config_socket, resolver, options)?;
        Self::health_check_async(&client).await?;
        Ok(client)
    }

    async fn ping_with_timeout(
        client: &EngineClient,
        timeout: Duration,
    ) -> Result<(), PodwatchError> {
        let answered_ok = tokio::time::timeout(timeout, client.ping())
            .await
            .map_err(|_| TransportError::HealthCheckTimeout {
                seconds: timeout.as_secs(),
            })?
            .map_err(|error| TransportError::HealthCheckFailed {
                message: error.to_string(),
            })?;
        if answered_ok {
            Ok(())
        } else {
            Err(TransportError::HealthCheckFailed {
                message: String::from("engine did not answer the ping with OK"),
            }
            .into())
        }
    }
}
