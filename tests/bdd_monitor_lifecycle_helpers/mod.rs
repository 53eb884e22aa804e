//! Behavioural test helpers for event monitors and log retrieval.
//!
//! Every "When" step starts a [`FakeEngine`] with the routes collected by the
//! "Given" steps, runs the client against it on a fresh runtime and records
//! plain outcomes for the "Then" steps.

mod fake_engine;

use std::time::Duration;

use podwatch::engine::{ClientOptions, EngineClient, EngineConnector};
use podwatch::error::{PodwatchError, StreamError};
use podwatch::logs::{LogStream, LogsOptions};
use podwatch::monitor::Subscription;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, then, when};
use time::OffsetDateTime;

use fake_engine::{FakeEngine, Reply, Route, event_unit, log_frame};

/// Step result type for BDD tests, using a static string for errors.
pub type StepResult<T> = Result<T, &'static str>;

/// Upper bound on any single wait for the fake engine.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// What a fetch of container logs produced.
#[derive(Clone, Debug)]
pub enum LogsOutcome {
    /// Entries as `(stream, text)` pairs.
    Entries(Vec<(LogStream, String)>),
    /// The engine answered 404.
    NotFound,
    /// Any other failure.
    Failed(String),
}

/// State shared across monitor lifecycle scenarios.
#[derive(Default, ScenarioState)]
pub struct MonitorState {
    /// Routes the fake engine will serve.
    routes: Slot<Vec<Route>>,
    /// Actions of the events delivered, in delivery order.
    pub received: Slot<Vec<String>>,
    /// Errors delivered by the monitor.
    pub errors: Slot<Vec<String>>,
    /// Whether the monitor was still registered after being stopped.
    pub live_after_stop: Slot<bool>,
    /// Whether the first monitor error was a `404`.
    pub error_not_found: Slot<bool>,
    /// Whether a replay failed because its body was cut short.
    pub replay_truncated: Slot<bool>,
    /// Request targets the fake engine received.
    pub requests: Slot<Vec<String>>,
    /// Unix seconds just before and just after a replay was issued.
    pub replay_window: Slot<(i64, i64)>,
    /// Result of a logs fetch.
    pub logs: Slot<LogsOutcome>,
}

/// Fixture providing a fresh monitor state.
#[fixture]
pub fn monitor_state() -> MonitorState {
    let state = MonitorState::default();
    state.routes.set(Vec::new());
    state
}

fn add_route(state: &MonitorState, path_contains: String, reply: Reply) -> StepResult<()> {
    let mut routes = state.routes.get().ok_or("routes should be initialised")?;
    routes.push(Route {
        path_contains,
        reply,
    });
    state.routes.set(routes);
    Ok(())
}

fn event_chunks(actions: &str) -> Vec<Vec<u8>> {
    actions.split(',').map(|action| event_unit(action.trim())).collect()
}

fn runtime() -> StepResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|_| "failed to create tokio runtime")
}

fn connect(engine: &FakeEngine) -> StepResult<EngineClient> {
    EngineConnector::connect(&engine.endpoint(), ClientOptions::default())
        .map_err(|_| "client should build for the fake engine")
}

/// Everything a subscription delivered before it closed.
struct Drained {
    labels: Vec<String>,
    errors: Vec<PodwatchError>,
}

async fn drain<T>(
    subscription: &mut Subscription<T>,
    label: impl Fn(T) -> String,
) -> StepResult<Drained> {
    let mut drained = Drained {
        labels: Vec::new(),
        errors: Vec::new(),
    };
    loop {
        let next = tokio::time::timeout(STEP_TIMEOUT, subscription.recv())
            .await
            .map_err(|_| "monitor did not finish in time")?;
        match next {
            Some(Ok(unit)) => drained.labels.push(label(unit)),
            Some(Err(error)) => drained.errors.push(error),
            None => return Ok(drained),
        }
    }
}

fn record_drained(state: &MonitorState, drained: Drained) {
    state.error_not_found.set(
        drained
            .errors
            .first()
            .is_some_and(PodwatchError::is_not_found),
    );
    state.received.set(drained.labels);
    state
        .errors
        .set(drained.errors.iter().map(ToString::to_string).collect());
}

fn parse_seconds(raw: &str) -> StepResult<u64> {
    raw.parse().map_err(|_| "seconds should be an unsigned integer")
}

fn query_value(target: &str, key: &str) -> Option<i64> {
    let (_, query) = target.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name == key { value.parse().ok() } else { None }
    })
}

// =============================================================================
// Given
// =============================================================================

#[given("the engine streams the events {actions}")]
fn engine_streams_events(monitor_state: &MonitorState, actions: String) -> StepResult<()> {
    add_route(
        monitor_state,
        String::from("/events"),
        Reply::Stream {
            chunks: event_chunks(&actions),
            hold_open: false,
        },
    )
}

#[given("an open event stream carrying {actions}")]
fn open_event_stream(monitor_state: &MonitorState, actions: String) -> StepResult<()> {
    add_route(
        monitor_state,
        String::from("/events"),
        Reply::Stream {
            chunks: event_chunks(&actions),
            hold_open: true,
        },
    )
}

#[given("a broken event stream carrying {actions}")]
fn broken_event_stream(monitor_state: &MonitorState, actions: String) -> StepResult<()> {
    let mut chunks = event_chunks(&actions);
    chunks.push(b"{\"status\": oops}\n".to_vec());
    add_route(
        monitor_state,
        String::from("/events"),
        Reply::Stream {
            chunks,
            hold_open: false,
        },
    )
}

#[given("the engine replays the events {actions} between placeholders")]
fn engine_replays_events(monitor_state: &MonitorState, actions: String) -> StepResult<()> {
    let mut chunks = vec![b"{}\n".to_vec()];
    for unit in event_chunks(&actions) {
        chunks.push(unit);
        chunks.push(br#"{"Type":"container"}"#.to_vec());
    }
    add_route(
        monitor_state,
        String::from("/events"),
        Reply::Stream {
            chunks,
            hold_open: false,
        },
    )
}

#[given("a truncated event replay carrying {actions}")]
fn truncated_event_replay(monitor_state: &MonitorState, actions: String) -> StepResult<()> {
    let mut chunks = event_chunks(&actions);
    chunks.push(br#"{"status":"di"#.to_vec());
    add_route(
        monitor_state,
        String::from("/events"),
        Reply::Stream {
            chunks,
            hold_open: false,
        },
    )
}

#[given("the engine has no container {name}")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "rstest-bdd step functions must return StepResult for consistency"
)]
#[expect(
    unused_variables,
    reason = "rstest-bdd requires parameter to match fixture name"
)]
fn engine_has_no_container(monitor_state: &MonitorState, name: String) -> StepResult<()> {
    // Unrouted paths already answer 404.
    Ok(())
}

#[given("container {name} wrote {out} to stdout and {err} to stderr")]
fn container_wrote_logs(
    monitor_state: &MonitorState,
    name: String,
    out: String,
    err: String,
) -> StepResult<()> {
    let mut body = log_frame(1, &out);
    body.extend(log_frame(2, &err));
    add_route(
        monitor_state,
        format!("/containers/{name}/logs"),
        Reply::Fixed { status: 200, body },
    )
}

// =============================================================================
// When
// =============================================================================

#[when("events are followed until the stream ends")]
fn follow_until_end(monitor_state: &MonitorState) -> StepResult<()> {
    let routes = monitor_state.routes.get().ok_or("routes should be set")?;
    let rt = runtime()?;
    let drained = rt.block_on(async {
        let engine = FakeEngine::start(routes)?;
        let client = connect(&engine)?;
        let mut subscription = client.event_stream(None);
        drain(&mut subscription, |event| event.action).await
    })?;
    record_drained(monitor_state, drained);
    Ok(())
}

#[when("events are followed by a reader that sits idle until the stream ends")]
fn follow_after_idle(monitor_state: &MonitorState) -> StepResult<()> {
    let routes = monitor_state.routes.get().ok_or("routes should be set")?;
    let rt = runtime()?;
    let drained = rt.block_on(async {
        let engine = FakeEngine::start(routes)?;
        let client = connect(&engine)?;
        let mut subscription = client.event_stream(None);
        tokio::time::sleep(Duration::from_millis(250)).await;
        drain(&mut subscription, |event| event.action).await
    })?;
    record_drained(monitor_state, drained);
    Ok(())
}

#[when("the stats of {name} are followed until the stream ends")]
fn follow_stats(monitor_state: &MonitorState, name: String) -> StepResult<()> {
    let routes = monitor_state.routes.get().ok_or("routes should be set")?;
    let rt = runtime()?;
    let drained = rt.block_on(async {
        let engine = FakeEngine::start(routes)?;
        let client = connect(&engine)?;
        let mut subscription = client.stats_stream(&name);
        drain(&mut subscription, |stats| stats.read).await
    })?;
    record_drained(monitor_state, drained);
    Ok(())
}

#[when("events from {since} to {until} seconds ago are replayed")]
fn replay_events(monitor_state: &MonitorState, since: String, until: String) -> StepResult<()> {
    let since_offset = Duration::from_secs(parse_seconds(&since)?);
    let until_offset = Duration::from_secs(parse_seconds(&until)?);
    let routes = monitor_state.routes.get().ok_or("routes should be set")?;
    let rt = runtime()?;
    let (outcome, requests, window) = rt.block_on(async {
        let engine = FakeEngine::start(routes)?;
        let client = connect(&engine)?;
        let before = OffsetDateTime::now_utc().unix_timestamp();
        let replayed = tokio::time::timeout(
            STEP_TIMEOUT,
            client.events_since(None, since_offset, Some(until_offset)),
        )
        .await
        .map_err(|_| "replay did not finish in time")?;
        let after = OffsetDateTime::now_utc().unix_timestamp();
        Ok::<_, &'static str>((replayed, engine.requests(), (before, after)))
    })?;

    match outcome {
        Ok(events) => {
            monitor_state
                .received
                .set(events.into_iter().map(|event| event.action).collect());
            monitor_state.errors.set(Vec::new());
            monitor_state.replay_truncated.set(false);
        }
        Err(error) => {
            monitor_state.received.set(Vec::new());
            monitor_state.replay_truncated.set(matches!(
                error,
                PodwatchError::Stream(StreamError::Truncated { .. })
            ));
            monitor_state.errors.set(vec![error.to_string()]);
        }
    }
    monitor_state.requests.set(requests);
    monitor_state.replay_window.set(window);
    Ok(())
}

#[when("events are followed and the monitor is stopped after the first event")]
fn follow_then_stop(monitor_state: &MonitorState) -> StepResult<()> {
    let routes = monitor_state.routes.get().ok_or("routes should be set")?;
    let rt = runtime()?;
    let (received, live) = rt.block_on(async {
        let engine = FakeEngine::start(routes)?;
        let client = connect(&engine)?;
        let mut subscription = client.event_stream(None);
        let first = tokio::time::timeout(STEP_TIMEOUT, subscription.recv())
            .await
            .map_err(|_| "first event did not arrive in time")?
            .ok_or("monitor ended before the first event")?
            .map_err(|_| "first unit should be an event")?;
        subscription.stop();
        let live = client.is_monitor_live(subscription.id());

        let mut received = vec![first.action];
        while let Some(item) = tokio::time::timeout(STEP_TIMEOUT, subscription.recv())
            .await
            .map_err(|_| "stopped monitor kept its channel open")?
        {
            if let Ok(event) = item {
                received.push(event.action);
            }
        }
        Ok::<_, &'static str>((received, live))
    })?;
    monitor_state.received.set(received);
    monitor_state.live_after_stop.set(live);
    Ok(())
}

#[when("the logs of {name} are fetched")]
fn fetch_logs(monitor_state: &MonitorState, name: String) -> StepResult<()> {
    let routes = monitor_state.routes.get().ok_or("routes should be set")?;
    let rt = runtime()?;
    let outcome = rt.block_on(async {
        let engine = FakeEngine::start(routes)?;
        let client = connect(&engine)?;
        let outcome = match client.container_logs(&name, &LogsOptions::default()).await {
            Ok(entries) => LogsOutcome::Entries(
                entries
                    .iter()
                    .map(|entry| (entry.stream, entry.text().into_owned()))
                    .collect(),
            ),
            Err(error) if error.is_not_found() => LogsOutcome::NotFound,
            Err(error) => LogsOutcome::Failed(error.to_string()),
        };
        Ok::<_, &'static str>(outcome)
    })?;
    monitor_state.logs.set(outcome);
    Ok(())
}

// =============================================================================
// Then
// =============================================================================

#[then("the events {actions} are received in order")]
fn events_received_in_order(monitor_state: &MonitorState, actions: String) -> StepResult<()> {
    let received = monitor_state.received.get().ok_or("no events recorded")?;
    let expected: Vec<String> = actions.split(',').map(|a| a.trim().to_owned()).collect();
    assert_eq!(received, expected, "events should arrive in order");
    Ok(())
}

#[then("no monitor error is reported")]
fn no_monitor_error(monitor_state: &MonitorState) -> StepResult<()> {
    let errors = monitor_state.errors.get().ok_or("no errors recorded")?;
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    Ok(())
}

#[then("exactly one monitor error is reported")]
fn one_monitor_error(monitor_state: &MonitorState) -> StepResult<()> {
    let errors = monitor_state.errors.get().ok_or("no errors recorded")?;
    assert_eq!(errors.len(), 1, "expected one error, got {errors:?}");
    Ok(())
}

#[then("the monitor error reports not found")]
fn monitor_error_not_found(monitor_state: &MonitorState) -> StepResult<()> {
    let not_found = monitor_state
        .error_not_found
        .get()
        .ok_or("no monitor error recorded")?;
    assert!(not_found, "the monitor error should be a 404");
    Ok(())
}

#[then("the replay asks for events from {since} to {until} seconds ago in Unix seconds")]
fn replay_query_is_absolute(
    monitor_state: &MonitorState,
    since: String,
    until: String,
) -> StepResult<()> {
    let since_secs = i64::try_from(parse_seconds(&since)?).map_err(|_| "offset out of range")?;
    let until_secs = i64::try_from(parse_seconds(&until)?).map_err(|_| "offset out of range")?;
    let (before, after) = monitor_state
        .replay_window
        .get()
        .ok_or("no replay window recorded")?;
    let requests = monitor_state.requests.get().ok_or("no requests recorded")?;
    let target = requests
        .iter()
        .find(|target| target.contains("/events?"))
        .ok_or("the engine saw no events request")?;

    let sent_since = query_value(target, "since").ok_or("since should be in the query")?;
    let sent_until = query_value(target, "until").ok_or("until should be in the query")?;
    assert!(
        (before - since_secs..=after - since_secs).contains(&sent_since),
        "since {sent_since} should be {since_secs}s before the call in {target}"
    );
    assert!(
        (before - until_secs..=after - until_secs).contains(&sent_until),
        "until {sent_until} should be {until_secs}s before the call in {target}"
    );
    Ok(())
}

#[then("the replay fails as truncated without returning events")]
fn replay_truncated(monitor_state: &MonitorState) -> StepResult<()> {
    let truncated = monitor_state
        .replay_truncated
        .get()
        .ok_or("no replay outcome recorded")?;
    let received = monitor_state.received.get().ok_or("no events recorded")?;
    assert!(truncated, "the replay should fail as truncated");
    assert!(received.is_empty(), "a failed replay returns no events");
    Ok(())
}

#[then("the monitor is no longer live")]
fn monitor_not_live(monitor_state: &MonitorState) -> StepResult<()> {
    let live = monitor_state
        .live_after_stop
        .get()
        .ok_or("liveness not recorded")?;
    assert!(!live, "stopped monitor should not be live");
    Ok(())
}

#[then("the request fails with not found")]
fn request_not_found(monitor_state: &MonitorState) -> StepResult<()> {
    let outcome = monitor_state.logs.get().ok_or("no logs outcome recorded")?;
    assert!(
        matches!(outcome, LogsOutcome::NotFound),
        "expected not found, got {outcome:?}"
    );
    Ok(())
}

#[then("the log reads {out} on stdout then {err} on stderr")]
fn log_reads(monitor_state: &MonitorState, out: String, err: String) -> StepResult<()> {
    let outcome = monitor_state.logs.get().ok_or("no logs outcome recorded")?;
    let LogsOutcome::Entries(entries) = outcome else {
        return Err("logs fetch should succeed");
    };
    assert_eq!(
        entries,
        vec![(LogStream::Stdout, out), (LogStream::Stderr, err)]
    );
    Ok(())
}
