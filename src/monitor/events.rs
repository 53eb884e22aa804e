//! Engine event stream.
//!
//! The events endpoint streams one JSON object per engine event. Older
//! engines report only `status`, `id` and `from`; newer ones add `Type`,
//! `Action` and `Actor`. Both shapes decode into [`Event`].

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::pump::{Liveness, SignalFilter, StreamUnit, consume};
use super::{MonitorId, Subscription, spawn_monitor, spawn_subscription};
use crate::engine::{EngineClient, EngineRequest};
use crate::error::{ApiError, PodwatchError, Result};
use crate::wire::{non_empty, null_as_default};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Event actions reported in `Action` (and `status` on older engines).
pub mod action {
    /// Container created.
    pub const CREATE: &str = "create";
    /// Container destroyed.
    pub const DESTROY: &str = "destroy";
    /// Container process exited.
    pub const DIE: &str = "die";
    /// Exec instance created.
    pub const EXEC_CREATE: &str = "exec_create";
    /// Exec instance started.
    pub const EXEC_START: &str = "exec_start";
    /// Container filesystem exported.
    pub const EXPORT: &str = "export";
    /// Container killed.
    pub const KILL: &str = "kill";
    /// Container ran out of memory.
    pub const OOM: &str = "oom";
    /// Container paused.
    pub const PAUSE: &str = "pause";
    /// Container restarted.
    pub const RESTART: &str = "restart";
    /// Container started.
    pub const START: &str = "start";
    /// Container stopped.
    pub const STOP: &str = "stop";
    /// Container unpaused.
    pub const UNPAUSE: &str = "unpause";
    /// Container renamed.
    pub const RENAME: &str = "rename";
    /// Image untagged.
    pub const UNTAG: &str = "untag";
    /// Image deleted.
    pub const DELETE: &str = "delete";
}

/// Object kinds reported in `Type`.
pub mod kind {
    /// Events generated by containers.
    pub const CONTAINER: &str = "container";
    /// Events generated by the engine daemon.
    pub const DAEMON: &str = "daemon";
    /// Events generated by images.
    pub const IMAGE: &str = "image";
    /// Events generated by networks.
    pub const NETWORK: &str = "network";
    /// Events generated by plugins.
    pub const PLUGIN: &str = "plugin";
    /// Events generated by volumes.
    pub const VOLUME: &str = "volume";
}

/// The object an event is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Object id.
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Labels and other object properties.
    #[serde(rename = "Attributes", default, deserialize_with = "null_as_default")]
    pub attributes: BTreeMap<String, String>,
}

/// Swarm node that produced an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmNode {
    /// Node id.
    #[serde(rename = "Id", alias = "ID", default)]
    pub id: String,
    /// Node IP address.
    #[serde(rename = "Ip", alias = "IP", default)]
    pub ip: String,
    /// Node engine address.
    #[serde(rename = "Addr", default)]
    pub addr: String,
    /// Node name.
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// One engine event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Legacy status; mirrors `action` for container events.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    /// Legacy object id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Legacy image name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Object kind, see [`kind`].
    #[serde(rename = "Type", default)]
    pub kind: String,
    /// What happened, see [`action`].
    #[serde(rename = "Action", default)]
    pub action: String,
    /// The object the event is about.
    #[serde(rename = "Actor", default)]
    pub actor: Actor,
    /// Unix seconds.
    #[serde(default)]
    pub time: i64,
    /// Unix nanoseconds.
    #[serde(rename = "timeNano", default)]
    pub time_nano: i64,
    /// Originating node when talking to a swarm manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<SwarmNode>,
}

impl StreamUnit for Event {
    fn carries_signal(&self) -> bool {
        !self.status.is_empty() || !self.action.is_empty()
    }
}

impl EngineClient {
    /// Start streaming engine events to `callback`.
    ///
    /// `filters` is passed through verbatim as the JSON `filters` query
    /// parameter. The callback runs on the monitor's task and receives every
    /// event in arrival order; if the stream fails it receives one `Err` and
    /// is never called again. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn monitor_events<F>(&self, filters: Option<&str>, callback: F) -> MonitorId
    where
        F: FnMut(Result<Event>) + Send + 'static,
    {
        spawn_monitor(self, events_request(filters), SignalFilter::FirstUnit, callback)
    }

    /// Start streaming engine events into a channel.
    ///
    /// Delivery follows the same rules as [`Self::monitor_events`].
    #[must_use]
    pub fn event_stream(&self, filters: Option<&str>) -> Subscription<Event> {
        spawn_subscription(self, events_request(filters), SignalFilter::FirstUnit)
    }

    /// Fetch the events between `since` and `until` ago.
    ///
    /// The engine closes the stream once it has replayed the window, so
    /// this call returns. Events carrying neither a status nor an action are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unsupported` against swarm endpoints, and the usual
    /// dispatch or decode errors otherwise.
    pub async fn events_since(
        &self,
        filters: Option<&str>,
        since: Duration,
        until: Option<Duration>,
    ) -> Result<Vec<Event>> {
        if self.is_swarm() {
            return Err(ApiError::Unsupported {
                operation: "events polling",
                endpoint_kind: "swarm",
            }
            .into());
        }

        let now = OffsetDateTime::now_utc();
        let request = events_request(filters)
            .query("since", unix_seconds_before(now, since))
            .query_opt("until", until.map(|offset| unix_seconds_before(now, offset)));

        self.send_request_streaming(request, |body| async move {
            let mut events = Vec::new();
            consume(body, Liveness::Untracked, SignalFilter::EveryUnit, |event: Event| {
                events.push(event);
                ControlFlow::Continue(())
            })
            .await?;
            Ok::<_, PodwatchError>(events)
        })
        .await
    }
}

fn events_request(filters: Option<&str>) -> EngineRequest {
    EngineRequest::get("events")
        .named("events")
        .query_opt("filters", non_empty(filters))
}

fn unix_seconds_before(now: OffsetDateTime, offset: Duration) -> i64 {
    let offset_nanos = i128::try_from(offset.as_nanos()).unwrap_or(i128::MAX);
    let seconds = now
        .unix_timestamp_nanos()
        .saturating_sub(offset_nanos)
        .div_euclid(NANOS_PER_SECOND);
    i64::try_from(seconds).unwrap_or(i64::MIN)
}
