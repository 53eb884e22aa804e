//! The consumer loop shared by every JSON streaming monitor.
//!
//! The loop owns the response body. It decodes units as bytes arrive, checks
//! liveness before handing each unit on, and returns when the body ends, the
//! monitor is stopped, the sink declines further units, or decoding fails.
//! Returning drops the body, which releases the connection.

use std::fmt;
use std::ops::ControlFlow;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::trace;

use super::json_stream::JsonStreamDecoder;
use super::registry::{MonitorId, MonitorRegistry};
use crate::error::StreamError;

/// A value decoded from a monitoring stream.
pub(crate) trait StreamUnit: DeserializeOwned + Send + 'static {
    /// Returns whether the unit carries a meaningful signal.
    ///
    /// Engines sometimes emit a leading placeholder object; units reporting
    /// `false` here may be skipped depending on the [`SignalFilter`].
    fn carries_signal(&self) -> bool {
        true
    }
}

/// Which units without a signal are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalFilter {
    /// Drop the first unit if it carries no signal.
    FirstUnit,
    /// Drop every unit that carries no signal.
    EveryUnit,
    /// Forward every unit.
    Off,
}

impl SignalFilter {
    const fn accepts(self, first: bool, carries_signal: bool) -> bool {
        match self {
            Self::FirstUnit => !first || carries_signal,
            Self::EveryUnit => carries_signal,
            Self::Off => true,
        }
    }
}

/// Cooperative stop signal for one monitor.
pub(crate) struct StopSignal {
    receiver: Option<watch::Receiver<()>>,
}

impl StopSignal {
    /// A signal that never fires, for bounded reads outside the registry.
    pub(crate) const fn never() -> Self {
        Self { receiver: None }
    }

    /// Resolve once the monitor's registry entry is removed.
    async fn stopped(&mut self) {
        match self.receiver.as_mut() {
            Some(receiver) => while receiver.changed().await.is_ok() {},
            None => std::future::pending::<()>().await,
        }
    }
}

/// Liveness source consulted between units.
pub(crate) enum Liveness<'a> {
    /// A registered monitor.
    Monitor {
        /// The registry holding the monitor.
        registry: &'a MonitorRegistry,
        /// The monitor's id.
        id: MonitorId,
    },
    /// A bounded read outside the registry that runs to end of body.
    Untracked,
}

impl Liveness<'_> {
    fn is_live(&self) -> bool {
        match self {
            Self::Monitor { registry, id } => registry.is_live(*id),
            Self::Untracked => true,
        }
    }

    /// Subscribe to the stop signal, or `None` if the monitor is already
    /// stopped.
    fn stop_signal(&self) -> Option<StopSignal> {
        match self {
            Self::Monitor { registry, id } => registry.watch(*id).map(|receiver| StopSignal {
                receiver: Some(receiver),
            }),
            Self::Untracked => Some(StopSignal::never()),
        }
    }
}

/// Decode `body` into units of `T`, passing each accepted unit to `sink`.
///
/// Returns `Ok(())` on a clean end of body, on stop, or when `sink` breaks.
///
/// # Errors
///
/// Returns the first decode or read failure; no further units are delivered
/// after it.
pub(crate) async fn consume<B, T, F>(
    mut body: B,
    liveness: Liveness<'_>,
    filter: SignalFilter,
    mut sink: F,
) -> Result<(), StreamError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
    T: StreamUnit,
    F: FnMut(T) -> ControlFlow<()>,
{
    let Some(mut stop) = liveness.stop_signal() else {
        return Ok(());
    };
    let mut decoder = JsonStreamDecoder::<T>::new();
    let mut first = true;

    loop {
        while let Some(unit) = decoder.next_unit()? {
            if !liveness.is_live() {
                return Ok(());
            }
            let accepted = filter.accepts(first, unit.carries_signal());
            first = false;
            if !accepted {
                trace!("skipping stream unit without signal");
                continue;
            }
            if sink(unit).is_break() {
                return Ok(());
            }
        }

        let frame = tokio::select! {
            biased;
            () = stop.stopped() => return Ok(()),
            next = body.frame() => next,
        };

        match frame {
            None => return decoder.finish(),
            Some(Err(error)) => {
                return Err(StreamError::Body {
                    message: error.to_string(),
                });
            }
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    trace!(bytes = data.len(), "stream chunk received");
                    decoder.push(&data);
                }
            }
        }
    }
}
