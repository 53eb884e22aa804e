//! Container resource usage stream.
//!
//! The stats endpoint emits one snapshot roughly every second for as long as
//! the container runs. Every snapshot is forwarded; there is no placeholder
//! to skip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pump::{SignalFilter, StreamUnit};
use super::{MonitorId, Subscription, spawn_monitor, spawn_subscription};
use crate::engine::{EngineClient, EngineRequest};
use crate::error::Result;
use crate::wire::null_as_default;

/// Per-interface network counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkStats {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Packets received.
    pub rx_packets: u64,
    /// Receive errors.
    pub rx_errors: u64,
    /// Received packets dropped.
    pub rx_dropped: u64,
    /// Bytes sent.
    pub tx_bytes: u64,
    /// Packets sent.
    pub tx_packets: u64,
    /// Send errors.
    pub tx_errors: u64,
    /// Sent packets dropped.
    pub tx_dropped: u64,
}

/// Memory cgroup counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    /// Current usage in bytes.
    pub usage: u64,
    /// Peak usage in bytes.
    pub max_usage: u64,
    /// Raw cgroup memory statistics.
    #[serde(deserialize_with = "null_as_default")]
    pub stats: BTreeMap<String, u64>,
    /// Times the limit was hit.
    pub failcnt: u64,
    /// Memory limit in bytes.
    pub limit: u64,
}

/// One block I/O counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlkioStatEntry {
    /// Device major number.
    pub major: u64,
    /// Device minor number.
    pub minor: u64,
    /// Operation, such as `Read` or `Write`.
    pub op: String,
    /// Counter value.
    pub value: u64,
}

/// Block I/O cgroup counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlkioStats {
    /// Bytes transferred per device and operation.
    #[serde(deserialize_with = "null_as_default")]
    pub io_service_bytes_recursive: Vec<BlkioStatEntry>,
    /// Requests issued per device and operation.
    #[serde(deserialize_with = "null_as_default")]
    pub io_serviced_recursive: Vec<BlkioStatEntry>,
    /// Requests queued.
    #[serde(deserialize_with = "null_as_default")]
    pub io_queue_recursive: Vec<BlkioStatEntry>,
    /// Service time.
    #[serde(deserialize_with = "null_as_default")]
    pub io_service_time_recursive: Vec<BlkioStatEntry>,
    /// Wait time.
    #[serde(deserialize_with = "null_as_default")]
    pub io_wait_time_recursive: Vec<BlkioStatEntry>,
    /// Merged requests.
    #[serde(deserialize_with = "null_as_default")]
    pub io_merged_recursive: Vec<BlkioStatEntry>,
    /// Time spent on I/O.
    #[serde(deserialize_with = "null_as_default")]
    pub io_time_recursive: Vec<BlkioStatEntry>,
    /// Sectors transferred.
    #[serde(deserialize_with = "null_as_default")]
    pub sectors_recursive: Vec<BlkioStatEntry>,
}

/// CPU time consumed, in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    /// Total CPU time.
    pub total_usage: u64,
    /// CPU time per core.
    #[serde(deserialize_with = "null_as_default")]
    pub percpu_usage: Vec<u64>,
    /// Time spent in kernel mode.
    pub usage_in_kernelmode: u64,
    /// Time spent in user mode.
    pub usage_in_usermode: u64,
}

/// CFS throttling counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottlingData {
    /// Enforcement periods elapsed.
    pub periods: u64,
    /// Periods in which the container was throttled.
    pub throttled_periods: u64,
    /// Total throttled time in nanoseconds.
    pub throttled_time: u64,
}

/// CPU cgroup counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    /// Container CPU usage.
    pub cpu_usage: CpuUsage,
    /// Host CPU time at the moment of sampling.
    pub system_cpu_usage: u64,
    /// Throttling counters.
    pub throttling_data: ThrottlingData,
}

/// One resource usage snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Sampling time as reported by the engine (RFC 3339).
    pub read: String,
    /// Aggregate network counters (API 1.20 and earlier).
    pub network: NetworkStats,
    /// Per-interface network counters (API 1.21 and later).
    #[serde(deserialize_with = "null_as_default")]
    pub networks: BTreeMap<String, NetworkStats>,
    /// Memory counters.
    pub memory_stats: MemoryStats,
    /// Block I/O counters.
    pub blkio_stats: BlkioStats,
    /// CPU counters for this sample.
    pub cpu_stats: CpuStats,
    /// CPU counters for the previous sample.
    pub precpu_stats: CpuStats,
}

impl StreamUnit for Stats {}

impl EngineClient {
    /// Start streaming resource usage for `container_id` to `callback`.
    ///
    /// Delivery follows the same rules as [`Self::monitor_events`], except
    /// that every snapshot is forwarded.
    #[must_use]
    pub fn monitor_stats<F>(&self, container_id: &str, callback: F) -> MonitorId
    where
        F: FnMut(Result<Stats>) + Send + 'static,
    {
        spawn_monitor(self, stats_request(container_id), SignalFilter::Off, callback)
    }

    /// Start streaming resource usage for `container_id` into a channel.
    #[must_use]
    pub fn stats_stream(&self, container_id: &str) -> Subscription<Stats> {
        spawn_subscription(self, stats_request(container_id), SignalFilter::Off)
    }
}

fn stats_request(container_id: &str) -> EngineRequest {
    EngineRequest::get(format!("containers/{container_id}/stats")).named("stats")
}
