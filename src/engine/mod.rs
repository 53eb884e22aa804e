//! Container engine connection and request dispatch.
//!
//! The endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `PODWATCH_ENGINE_SOCKET` environment variable
//! 4. `DOCKER_HOST` environment variable
//! 5. `CONTAINER_HOST` environment variable
//! 6. `PODMAN_HOST` environment variable
//! 7. `unix:///var/run/docker.sock`
//!
//! Every request then goes through one [`EngineClient`], which shares a
//! pooled transport between all of its clones.

pub(crate) mod client;
mod connection;
mod error_classification;
mod transport;

pub use client::{ClientOptions, DEFAULT_API_VERSION, EngineClient, EngineRequest};
pub use connection::{EngineConnector, SocketResolver};
pub use transport::{
    DEFAULT_CONNECT_TIMEOUT, DialTarget, Endpoint, LOCAL_SOCKET_BASE_URL, TlsSettings,
};
