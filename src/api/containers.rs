//! Container lifecycle calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::client::decode_json;
use crate::engine::{EngineClient, EngineRequest};
use crate::error::{ApiError, Result};
use crate::wire::{non_empty, null_as_default};

/// An exposed port of a listed container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Port {
    /// Host address the port is published on.
    #[serde(rename = "IP")]
    pub ip: String,
    /// Port inside the container.
    pub private_port: u16,
    /// Port on the host, zero when unpublished.
    pub public_port: u16,
    /// `tcp` or `udp`.
    #[serde(rename = "Type")]
    pub protocol: String,
}

/// Summary row returned by [`EngineClient::list_containers`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Container {
    /// Container id.
    pub id: String,
    /// Names, each with a leading `/`.
    #[serde(deserialize_with = "null_as_default")]
    pub names: Vec<String>,
    /// Image the container was created from.
    pub image: String,
    /// Command line.
    pub command: String,
    /// Creation time in Unix seconds.
    pub created: i64,
    /// Human readable status.
    pub status: String,
    /// Exposed ports.
    #[serde(deserialize_with = "null_as_default")]
    pub ports: Vec<Port>,
    /// Labels.
    #[serde(deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
    /// Bytes written to the container layer, when sizes were requested.
    pub size_rw: i64,
    /// Total size of the container filesystem, when sizes were requested.
    pub size_root_fs: i64,
}

/// Placeholder value in the engine's set-as-map encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Portable container settings sent on create and echoed on inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerConfig {
    /// Container host name.
    pub hostname: String,
    /// Container domain name.
    pub domainname: String,
    /// User the command runs as.
    pub user: String,
    /// Memory limit in bytes.
    pub memory: i64,
    /// Memory plus swap limit in bytes.
    pub memory_swap: i64,
    /// Relative CPU weight.
    pub cpu_shares: i64,
    /// CPUs the container may use.
    pub cpuset: String,
    /// Attach standard input.
    pub attach_stdin: bool,
    /// Attach standard output.
    pub attach_stdout: bool,
    /// Attach standard error.
    pub attach_stderr: bool,
    /// Legacy port specifications.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub port_specs: Vec<String>,
    /// Ports to expose, keyed `<port>/<protocol>`.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub exposed_ports: BTreeMap<String, EmptyObject>,
    /// Allocate a pseudo-terminal. Decides how the container's logs are
    /// framed.
    pub tty: bool,
    /// Keep standard input open.
    pub open_stdin: bool,
    /// Close standard input after the first attach ends.
    pub stdin_once: bool,
    /// Environment as `KEY=value` entries.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Command to run.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    /// Entry point.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    /// Image to create the container from.
    pub image: String,
    /// Volume mount points.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, EmptyObject>,
    /// Working directory of the command.
    pub working_dir: String,
    /// Disable networking.
    pub network_disabled: bool,
    /// MAC address.
    pub mac_address: String,
    /// Image build triggers.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub on_build: Vec<String>,
    /// Labels.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// A host device made available to the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Device {
    /// Device path on the host.
    pub path_on_host: String,
    /// Device path inside the container.
    pub path_in_container: String,
    /// Cgroup permissions, such as `mrw`.
    pub cgroup_permissions: String,
}

/// Restart behaviour after the container exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RestartPolicy {
    /// `no`, `always` or `on-failure`.
    pub name: String,
    /// Retry limit for `on-failure`.
    pub maximum_retry_count: i64,
}

/// A resource limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Ulimit {
    /// Limit name, such as `nofile`.
    pub name: String,
    /// Soft limit.
    pub soft: i64,
    /// Hard limit.
    pub hard: i64,
}

/// Logging driver settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LogDriverConfig {
    /// Driver name.
    #[serde(rename = "Type")]
    pub driver: String,
    /// Driver options.
    #[serde(deserialize_with = "null_as_default")]
    pub config: BTreeMap<String, String>,
}

/// A host address a container port is published on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PortBinding {
    /// Host interface address.
    pub host_ip: String,
    /// Host port.
    pub host_port: String,
}

/// Host-specific container settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostConfig {
    /// Volume bindings as `host:container[:mode]`.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
    /// File the container id is written to.
    #[serde(rename = "ContainerIDFile")]
    pub container_id_file: String,
    /// LXC options.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub lxc_conf: Vec<BTreeMap<String, String>>,
    /// Memory limit in bytes.
    pub memory: i64,
    /// Memory plus swap limit in bytes.
    pub memory_swap: i64,
    /// Relative CPU weight.
    pub cpu_shares: i64,
    /// CPUs the container may use.
    pub cpuset_cpus: String,
    /// Run privileged.
    pub privileged: bool,
    /// Published ports, keyed `<port>/<protocol>`.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,
    /// Links to other containers.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    /// Publish every exposed port on a random host port.
    pub publish_all_ports: bool,
    /// DNS servers.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    /// DNS search domains.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub dns_search: Vec<String>,
    /// Extra `/etc/hosts` entries.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub extra_hosts: Vec<String>,
    /// Containers whose volumes are mounted.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,
    /// Added kernel capabilities.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    /// Dropped kernel capabilities.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub cap_drop: Vec<String>,
    /// Restart policy.
    pub restart_policy: RestartPolicy,
    /// Network mode, such as `bridge` or `host`.
    pub network_mode: String,
    /// IPC namespace mode.
    pub ipc_mode: String,
    /// PID namespace mode.
    pub pid_mode: String,
    /// Host devices.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<Device>,
    /// Security options.
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub security_opt: Vec<String>,
    /// Mount the root filesystem read-only.
    pub readonly_rootfs: bool,
    /// Parent cgroup.
    pub cgroup_parent: String,
    /// Resource limits (API 1.18).
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub ulimits: Vec<Ulimit>,
    /// Logging driver (API 1.18).
    pub log_config: LogDriverConfig,
}

/// Network state of an inspected container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkSettings {
    /// Bridge the container is attached to.
    pub bridge: String,
    /// Default gateway.
    pub gateway: String,
    /// IPv4 address.
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    /// IPv4 prefix length.
    #[serde(rename = "IPPrefixLen")]
    pub ip_prefix_len: u8,
    /// IPv6 gateway.
    #[serde(rename = "IPv6Gateway")]
    pub ipv6_gateway: String,
    /// Global IPv6 address.
    #[serde(rename = "GlobalIPv6Address")]
    pub global_ipv6_address: String,
    /// Global IPv6 prefix length.
    #[serde(rename = "GlobalIPv6PrefixLen")]
    pub global_ipv6_prefix_len: u8,
    /// Link-local IPv6 address.
    #[serde(rename = "LinkLocalIPv6Address")]
    pub link_local_ipv6_address: String,
    /// Link-local IPv6 prefix length.
    #[serde(rename = "LinkLocalIPv6PrefixLen")]
    pub link_local_ipv6_prefix_len: u8,
    /// MAC address.
    pub mac_address: String,
    /// Published ports, keyed `<port>/<protocol>`.
    #[serde(deserialize_with = "null_as_default")]
    pub ports: BTreeMap<String, Option<Vec<PortBinding>>>,
}

/// Process state of an inspected container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerState {
    /// Running.
    pub running: bool,
    /// Paused.
    pub paused: bool,
    /// Restarting.
    pub restarting: bool,
    /// Killed by the OOM killer.
    #[serde(rename = "OOMKilled")]
    pub oom_killed: bool,
    /// Marked for removal.
    pub dead: bool,
    /// Main process id.
    pub pid: i64,
    /// Exit code of the last run.
    pub exit_code: i64,
    /// Engine error, if any.
    pub error: String,
    /// Start time (RFC 3339).
    pub started_at: String,
    /// Finish time (RFC 3339).
    pub finished_at: String,
}

/// Full description returned by [`EngineClient::inspect_container`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerDetail {
    /// Container id.
    pub id: String,
    /// Name with a leading `/`.
    pub name: String,
    /// Creation time (RFC 3339).
    pub created: String,
    /// Command path.
    pub path: String,
    /// Command arguments.
    #[serde(deserialize_with = "null_as_default")]
    pub args: Vec<String>,
    /// Portable settings.
    pub config: ContainerConfig,
    /// Host settings.
    pub host_config: HostConfig,
    /// Process state.
    pub state: ContainerState,
    /// Image id.
    pub image: String,
    /// Network state.
    pub network_settings: NetworkSettings,
    /// `resolv.conf` path on the host.
    pub resolv_conf_path: String,
    /// `hostname` path on the host.
    pub hostname_path: String,
    /// `hosts` path on the host.
    pub hosts_path: String,
    /// Log file path on the host.
    pub log_path: String,
    /// Storage driver.
    pub driver: String,
    /// Execution driver.
    pub exec_driver: String,
    /// `SELinux` mount label.
    pub mount_label: String,
    /// `SELinux` process label.
    pub process_label: String,
    /// `AppArmor` profile.
    pub app_armor_profile: String,
    /// Times the container has been restarted.
    pub restart_count: i64,
    /// Exec instances created in the container.
    #[serde(rename = "ExecIDs", deserialize_with = "null_as_default")]
    pub exec_ids: Vec<String>,
    /// Volume paths on the host, keyed by container path.
    #[serde(deserialize_with = "null_as_default")]
    pub volumes: BTreeMap<String, String>,
    /// Whether each volume is writable.
    #[serde(rename = "VolumesRW", deserialize_with = "null_as_default")]
    pub volumes_rw: BTreeMap<String, bool>,
}

/// Output of [`EngineClient::container_processes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Processes {
    /// Column titles.
    #[serde(deserialize_with = "null_as_default")]
    pub titles: Vec<String>,
    /// One row per process.
    #[serde(deserialize_with = "null_as_default")]
    pub processes: Vec<Vec<String>>,
}

/// Kind of a filesystem change.
pub mod change_kind {
    /// Path was modified.
    pub const MODIFIED: u8 = 0;
    /// Path was added.
    pub const ADDED: u8 = 1;
    /// Path was deleted.
    pub const DELETED: u8 = 2;
}

/// One entry of [`EngineClient::container_changes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FsChange {
    /// Changed path.
    pub path: String,
    /// See [`change_kind`].
    pub kind: u8,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(flatten)]
    config: &'a ContainerConfig,
    #[serde(rename = "HostConfig")]
    host_config: &'a HostConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResponse {
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct WaitResponse {
    #[serde(rename = "StatusCode")]
    status_code: Option<i64>,
}

impl EngineClient {
    /// List containers.
    ///
    /// `filters` is passed through verbatim as the JSON `filters` query
    /// parameter when not empty.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or `ApiError::Decode`.
    pub async fn list_containers(
        &self,
        all: bool,
        size: bool,
        filters: Option<&str>,
    ) -> Result<Vec<Container>> {
        let request = EngineRequest::get("containers/json")
            .named("list containers")
            .query("all", all)
            .query("size", size)
            .query_opt("filters", non_empty(filters));
        let body = self.send_request(request).await?;
        decode_json("list containers", &body)
    }

    /// Inspect one container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or `ApiError::Decode`. A missing container is
    /// a status error for which [`crate::error::PodwatchError::is_not_found`]
    /// holds.
    pub async fn inspect_container(&self, id: &str) -> Result<ContainerDetail> {
        let request =
            EngineRequest::get(format!("containers/{id}/json")).named("inspect container");
        let body = self.send_request(request).await?;
        decode_json("inspect container", &body)
    }

    /// Create a container and return its id.
    ///
    /// Warnings reported by the engine are logged.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors, `ApiError::Encode` or `ApiError::Decode`.
    pub async fn create_container(
        &self,
        config: &ContainerConfig,
        host_config: &HostConfig,
        name: Option<&str>,
    ) -> Result<String> {
        let request = create_request(config, host_config, name)?;
        let body = self.send_request(request).await?;
        let created: CreateResponse = decode_json("create container", &body)?;
        if !created.warnings.is_empty() {
            warn!(
                container = %created.id,
                warnings = ?created.warnings,
                "engine reported warnings while creating container"
            );
        }
        Ok(created.id)
    }

    /// Start a created container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn start_container(&self, id: &str) -> Result<()> {
        self.post_action(id, "start", "start container", None).await
    }

    /// Stop a container, killing it after `timeout_secs` if given.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn stop_container(&self, id: &str, timeout_secs: Option<u64>) -> Result<()> {
        let query = timeout_secs.map(|seconds| ("t", seconds.to_string()));
        self.post_action(id, "stop", "stop container", query).await
    }

    /// Restart a container, killing it after `timeout_secs` if given.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn restart_container(&self, id: &str, timeout_secs: Option<u64>) -> Result<()> {
        let query = timeout_secs.map(|seconds| ("t", seconds.to_string()));
        self.post_action(id, "restart", "restart container", query).await
    }

    /// Send `signal` (default `SIGKILL`) to a container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn kill_container(&self, id: &str, signal: Option<&str>) -> Result<()> {
        let query = non_empty(signal).map(|name| ("signal", name.to_owned()));
        self.post_action(id, "kill", "kill container", query).await
    }

    /// Pause a container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn pause_container(&self, id: &str) -> Result<()> {
        self.post_action(id, "pause", "pause container", None).await
    }

    /// Resume a paused container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn unpause_container(&self, id: &str) -> Result<()> {
        self.post_action(id, "unpause", "unpause container", None).await
    }

    /// Remove a container, optionally forcing removal of a running one and
    /// deleting its anonymous volumes.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn remove_container(&self, id: &str, force: bool, volumes: bool) -> Result<()> {
        let request = EngineRequest::delete(format!("containers/{id}"))
            .named("remove container")
            .query("force", force)
            .query("v", volumes);
        self.send_request(request).await.map(drop)
    }

    /// Rename a container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn rename_container(&self, id: &str, name: &str) -> Result<()> {
        self.post_action(id, "rename", "rename container", Some(("name", name.to_owned())))
            .await
    }

    /// Block until a container exits and return its exit code.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors, `ApiError::Decode`, or
    /// `ApiError::MissingField` when the engine omits `StatusCode`.
    pub async fn wait_container(&self, id: &str) -> Result<i64> {
        let request = EngineRequest::post(format!("containers/{id}/wait")).named("wait container");
        let body = self.send_request(request).await?;
        let waited: WaitResponse = decode_json("wait container", &body)?;
        waited.status_code.ok_or_else(|| {
            warn!(container = %id, "wait response carried no StatusCode");
            ApiError::MissingField {
                what: "wait container",
                field: "StatusCode",
            }
            .into()
        })
    }

    /// List the processes running in a container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or `ApiError::Decode`.
    pub async fn container_processes(&self, id: &str, ps_args: Option<&str>) -> Result<Processes> {
        let request = EngineRequest::get(format!("containers/{id}/top"))
            .named("container processes")
            .query_opt("ps_args", non_empty(ps_args));
        let body = self.send_request(request).await?;
        decode_json("container processes", &body)
    }

    /// List filesystem changes made inside a container.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or `ApiError::Decode`.
    pub async fn container_changes(&self, id: &str) -> Result<Vec<FsChange>> {
        let request =
            EngineRequest::get(format!("containers/{id}/changes")).named("container changes");
        let body = self.send_request(request).await?;
        let changes: Option<Vec<FsChange>> = decode_json("container changes", &body)?;
        Ok(changes.unwrap_or_default())
    }

    async fn post_action(
        &self,
        id: &str,
        action: &str,
        what: &'static str,
        query: Option<(&'static str, String)>,
    ) -> Result<()> {
        let mut request = EngineRequest::post(format!("containers/{id}/{action}")).named(what);
        if let Some((key, value)) = query {
            request = request.query(key, value);
        }
        self.send_request(request).await.map(drop)
    }
}

fn create_request(
    config: &ContainerConfig,
    host_config: &HostConfig,
    name: Option<&str>,
) -> Result<EngineRequest> {
    EngineRequest::post("containers/create")
        .named("create container")
        .query_opt("name", non_empty(name))
        .json(&CreateBody {
            config,
            host_config,
        })
}
