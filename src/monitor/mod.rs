//! Long-lived streaming monitors.
//!
//! Event and stats endpoints answer with a body that never ends on its own.
//! Each monitor runs on its own task, decodes units as they arrive and hands
//! them to a callback or a channel until it is stopped through the
//! [`MonitorRegistry`] or the engine closes the stream.
//!
//! A monitor delivers units in arrival order, reports at most one error and
//! then ends. A clean end of stream reports nothing.

mod events;
mod json_stream;
mod pump;
mod registry;
mod stats;

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use events::{Actor, Event, SwarmNode, action, kind};
pub use json_stream::{DEFAULT_MAX_UNIT_LEN, JsonStreamDecoder};
pub use registry::{MonitorId, MonitorRegistry};
pub use stats::{
    BlkioStatEntry, BlkioStats, CpuStats, CpuUsage, MemoryStats, NetworkStats, Stats,
    ThrottlingData,
};

use crate::engine::{EngineClient, EngineRequest};
use crate::error::{PodwatchError, Result};
use pump::{Liveness, SignalFilter, StreamUnit, consume};

/// Channel end of a running monitor.
///
/// Units are queued without a bound until [`Self::recv`] takes them, so a
/// reader that falls behind never loses a unit but the queue grows with the
/// backlog. A caller that no longer reads should [`Self::stop`] or drop the
/// subscription; dropping it stops the monitor.
#[derive(Debug)]
pub struct Subscription<T> {
    id: MonitorId,
    receiver: mpsc::UnboundedReceiver<Result<T>>,
    registry: Arc<MonitorRegistry>,
}

impl<T> Subscription<T> {
    /// Returns the monitor id.
    #[must_use]
    pub const fn id(&self) -> MonitorId {
        self.id
    }

    /// Receive the next unit.
    ///
    /// Returns `None` once the monitor has ended and every delivered unit has
    /// been received. An `Err` is always the last item.
    pub async fn recv(&mut self) -> Option<Result<T>> {
        self.receiver.recv().await
    }

    /// Stop the monitor. Units already delivered can still be received.
    pub fn stop(&self) {
        self.registry.stop(self.id);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.registry.stop(self.id);
    }
}

/// Register a monitor and spawn its consumer task.
fn spawn_monitor<T, F>(
    client: &EngineClient,
    request: EngineRequest,
    filter: SignalFilter,
    callback: F,
) -> MonitorId
where
    T: StreamUnit,
    F: FnMut(Result<T>) + Send + 'static,
{
    let id = client.monitors().register();
    spawn_registered(client.clone(), id, request, filter, callback);
    id
}

fn spawn_registered<T, F>(
    client: EngineClient,
    id: MonitorId,
    request: EngineRequest,
    filter: SignalFilter,
    mut callback: F,
) where
    T: StreamUnit,
    F: FnMut(Result<T>) + Send + 'static,
{
    debug!(monitor = %id, path = %request.path_and_query(), "monitor starting");
    tokio::spawn(async move {
        let registry = client.monitors_handle();
        let sink = &mut callback;
        let outcome = client
            .send_request_streaming(request, |body| {
                let liveness = Liveness::Monitor {
                    registry: &registry,
                    id,
                };
                async move {
                    consume(body, liveness, filter, |unit| {
                        sink(Ok(unit));
                        ControlFlow::Continue(())
                    })
                    .await?;
                    Ok::<_, PodwatchError>(())
                }
            })
            .await;

        match outcome {
            Ok(()) => debug!(monitor = %id, "monitor finished"),
            Err(error) => {
                warn!(monitor = %id, error = %error, "monitor ended with an error");
                callback(Err(error));
            }
        }
    });
}

/// Register a monitor that forwards into an unbounded channel.
fn spawn_subscription<T>(
    client: &EngineClient,
    request: EngineRequest,
    filter: SignalFilter,
) -> Subscription<T>
where
    T: StreamUnit,
{
    let registry = client.monitors_handle();
    let id = registry.register();
    let (sender, receiver) = mpsc::unbounded_channel();
    let forwarding_registry = Arc::clone(&registry);
    spawn_registered(client.clone(), id, request, filter, move |item: Result<T>| {
        if sender.send(item).is_err() {
            forwarding_registry.stop(id);
        }
    });
    Subscription {
        id,
        receiver,
        registry,
    }
}
