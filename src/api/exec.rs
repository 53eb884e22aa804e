//! Exec instances: run an extra command inside a running container.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::engine::client::decode_json;
use crate::engine::{EngineClient, EngineRequest};
use crate::error::{ApiError, Result};

/// Settings for [`EngineClient::create_exec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecConfig {
    /// Attach standard input.
    pub attach_stdin: bool,
    /// Attach standard output.
    pub attach_stdout: bool,
    /// Attach standard error.
    pub attach_stderr: bool,
    /// Allocate a pseudo-terminal.
    pub tty: bool,
    /// Command argv.
    pub cmd: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartExecBody {
    detach: bool,
    tty: bool,
}

#[derive(Deserialize)]
struct CreateExecResponse {
    #[serde(rename = "Id")]
    id: Option<String>,
}

impl EngineClient {
    /// Create an exec instance in `container_id` and return its id.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors, `ApiError::Decode`, or
    /// `ApiError::MissingField` when the engine omits `Id`.
    pub async fn create_exec(&self, container_id: &str, config: &ExecConfig) -> Result<String> {
        let request = EngineRequest::post(format!("containers/{container_id}/exec"))
            .named("create exec")
            .json(config)?;
        let body = self.send_request(request).await?;
        let created: CreateExecResponse = decode_json("create exec", &body)?;
        created.id.ok_or_else(|| {
            ApiError::MissingField {
                what: "create exec",
                field: "Id",
            }
            .into()
        })
    }

    /// Start an exec instance and return whatever the engine sends back.
    ///
    /// With `detach` the engine answers immediately with an empty body;
    /// otherwise the body holds the command output, framed unless `tty` is
    /// set. Pass it to [`crate::logs::read_log_entries`] to split streams.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or `ApiError::Encode`.
    pub async fn start_exec(&self, exec_id: &str, detach: bool, tty: bool) -> Result<Bytes> {
        let request = start_exec_request(exec_id, detach, tty)?;
        self.send_request(request).await
    }
}

fn start_exec_request(exec_id: &str, detach: bool, tty: bool) -> Result<EngineRequest> {
    EngineRequest::post(format!("exec/{exec_id}/start"))
        .named("start exec")
        .json(&StartExecBody { detach, tty })
}
