//! Engine-wide calls: ping, version and info.

use serde::{Deserialize, Serialize};

use crate::engine::client::decode_json;
use crate::engine::{EngineClient, EngineRequest};
use crate::error::Result;
use crate::wire::{flag, null_as_default};

const PING_OK: &[u8] = b"OK";

/// Engine version report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Version {
    /// Highest API version the engine speaks.
    pub api_version: String,
    /// Engine source revision.
    pub git_commit: String,
    /// Toolchain the engine was built with.
    pub go_version: String,
    /// Engine release.
    pub version: String,
    /// Host operating system.
    pub os: String,
    /// Host architecture.
    pub arch: String,
    /// Host kernel release.
    pub kernel_version: String,
}

/// Engine and host summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EngineInfo {
    /// Engine id.
    #[serde(rename = "ID")]
    pub id: String,
    /// Host name.
    pub name: String,
    /// Number of containers.
    pub containers: i64,
    /// Number of images.
    pub images: i64,
    /// Storage driver.
    pub driver: String,
    /// Storage driver key/value status pairs.
    #[serde(deserialize_with = "null_as_default")]
    pub driver_status: Vec<[String; 2]>,
    /// Execution driver.
    pub execution_driver: String,
    /// Engine data directory.
    pub docker_root_dir: String,
    /// Host kernel release.
    pub kernel_version: String,
    /// Host operating system.
    pub operating_system: String,
    /// Engine labels.
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
    /// Host memory in bytes.
    pub mem_total: i64,
    /// Host CPU count.
    #[serde(rename = "NCPU")]
    pub ncpu: i64,
    /// Whether memory limits are supported.
    #[serde(deserialize_with = "flag")]
    pub memory_limit: bool,
    /// Whether swap limits are supported.
    #[serde(deserialize_with = "flag")]
    pub swap_limit: bool,
    /// Whether IPv4 forwarding is enabled.
    #[serde(rename = "IPv4Forwarding", deserialize_with = "flag")]
    pub ipv4_forwarding: bool,
    /// Registry used for unqualified image names.
    pub index_server_address: String,
    /// Open file descriptors held by the engine.
    #[serde(rename = "NFd")]
    pub file_descriptors: i64,
    /// Goroutines running in the engine.
    #[serde(rename = "NGoroutines")]
    pub goroutines: i64,
    /// Active event listeners.
    #[serde(rename = "NEventsListener")]
    pub events_listeners: i64,
    /// Proxy for plain HTTP.
    pub http_proxy: String,
    /// Proxy for HTTPS.
    pub https_proxy: String,
    /// Hosts that bypass the proxy.
    pub no_proxy: String,
    /// Engine clock (RFC 3339).
    pub system_time: String,
}

impl EngineClient {
    /// Returns whether the engine answers its ping endpoint with `OK`.
    ///
    /// # Errors
    ///
    /// Returns transport and status errors; an unexpected body is `false`.
    pub async fn ping(&self) -> Result<bool> {
        let body = self
            .send_request(EngineRequest::get("_ping").named("ping"))
            .await?;
        Ok(body.as_ref() == PING_OK)
    }

    /// Fetch the engine version.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or `ApiError::Decode`.
    pub async fn version(&self) -> Result<Version> {
        let body = self
            .send_request(EngineRequest::get("version").named("version"))
            .await?;
        decode_json("version", &body)
    }

    /// Fetch the engine and host summary.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or `ApiError::Decode`.
    pub async fn info(&self) -> Result<EngineInfo> {
        let body = self
            .send_request(EngineRequest::get("info").named("info"))
            .await?;
        decode_json("info", &body)
    }
}
