//! One-shot engine calls.
//!
//! Each call is a single request through [`crate::engine::EngineClient`]
//! whose response body is buffered and decoded. Nothing here retries; every
//! failure is returned to the caller as is.

mod auth;
mod containers;
mod exec;
mod system;

pub use auth::{AuthConfig, REGISTRY_AUTH_HEADER};
pub use containers::{
    Container, ContainerConfig, ContainerDetail, ContainerState, Device, EmptyObject, FsChange,
    HostConfig, LogDriverConfig, NetworkSettings, Port, PortBinding, Processes, RestartPolicy,
    Ulimit, change_kind,
};
pub use exec::ExecConfig;
pub use system::{EngineInfo, Version};
