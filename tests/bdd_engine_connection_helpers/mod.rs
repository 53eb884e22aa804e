//! Behavioural test helpers for engine endpoint resolution and verification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mockable::MockEnv;
use podwatch::engine::{ClientOptions, EngineConnector, SocketResolver};
use podwatch::error::{PodwatchError, TransportError};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, then, when};

/// Step result type for BDD tests, using a static string for errors.
pub type StepResult<T> = Result<T, &'static str>;

/// Thread-safe environment variable storage for BDD tests.
type EnvVars = Arc<Mutex<HashMap<String, String>>>;

/// Outcome of a verified connection attempt.
#[derive(Clone, Debug)]
pub enum VerifyOutcome {
    /// The engine answered the ping.
    Success,
    /// The ping failed or was answered wrongly.
    Failed,
    /// Any other error, with its message.
    Other(String),
}

/// State shared across engine connection scenarios.
#[derive(Default, ScenarioState)]
pub struct EngineConnectionState {
    env_vars: Slot<EnvVars>,
    config_socket: Slot<Option<String>>,
    resolved_socket: Slot<String>,
    /// The result of verifying the resolved endpoint.
    pub verify_outcome: Slot<VerifyOutcome>,
}

/// Fixture providing a fresh engine connection state.
#[fixture]
pub fn engine_connection_state() -> EngineConnectionState {
    let state = EngineConnectionState::default();
    state.env_vars.set(Arc::new(Mutex::new(HashMap::new())));
    state
}

fn set_env_var(state: &EngineConnectionState, key: &str, value: &str) -> StepResult<()> {
    let env_vars = state.env_vars.get().ok_or("env_vars should be initialised")?;
    let mut vars = env_vars.lock().map_err(|_| "mutex poisoned")?;
    vars.insert(String::from(key), String::from(value));
    Ok(())
}

/// Snapshot the scenario's variables into a `MockEnv`. All "Given" steps run
/// before the "When" step that calls this.
fn create_mock_env(state: &EngineConnectionState) -> StepResult<MockEnv> {
    let env_vars = state.env_vars.get().ok_or("env_vars should be initialised")?;
    let vars = env_vars.lock().map_err(|_| "mutex poisoned")?.clone();

    let mut mock = MockEnv::new();
    mock.expect_string()
        .returning(move |key| vars.get(key).cloned());
    Ok(mock)
}

// =============================================================================
// Given
// =============================================================================

#[given("no engine socket is configured")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "rstest-bdd step functions must return StepResult for consistency"
)]
fn no_engine_socket_configured(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    engine_connection_state.config_socket.set(None);
    Ok(())
}

#[given("engine socket is configured as {socket}")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "rstest-bdd step functions must return StepResult for consistency"
)]
fn engine_socket_configured_as(
    engine_connection_state: &EngineConnectionState,
    socket: String,
) -> StepResult<()> {
    engine_connection_state.config_socket.set(Some(socket));
    Ok(())
}

#[given("{name} is set to {value}")]
fn env_var_is_set_to(
    engine_connection_state: &EngineConnectionState,
    name: String,
    value: String,
) -> StepResult<()> {
    set_env_var(engine_connection_state, &name, &value)
}

#[given("{name} is empty")]
fn env_var_is_empty(
    engine_connection_state: &EngineConnectionState,
    name: String,
) -> StepResult<()> {
    set_env_var(engine_connection_state, &name, "")
}

// =============================================================================
// When
// =============================================================================

#[when("the socket is resolved")]
fn the_socket_is_resolved(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let env = create_mock_env(engine_connection_state)?;
    let resolver = SocketResolver::new(&env);
    let config_socket = engine_connection_state.config_socket.get().flatten();
    let socket = EngineConnector::resolve_socket(config_socket.as_deref(), &resolver);
    engine_connection_state.resolved_socket.set(socket);
    Ok(())
}

#[when("the resolved engine is verified")]
fn the_engine_is_verified(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let socket = engine_connection_state
        .resolved_socket
        .get()
        .ok_or("resolved socket should be set")?;
    let rt = tokio::runtime::Runtime::new().map_err(|_| "failed to create tokio runtime")?;
    let result = rt.block_on(EngineConnector::connect_and_verify_async(
        &socket,
        ClientOptions::default(),
    ));
    let outcome = match result {
        Ok(_) => VerifyOutcome::Success,
        Err(PodwatchError::Transport(TransportError::HealthCheckFailed { .. })) => {
            VerifyOutcome::Failed
        }
        Err(error) => VerifyOutcome::Other(error.to_string()),
    };
    engine_connection_state.verify_outcome.set(outcome);
    Ok(())
}

// =============================================================================
// Then
// =============================================================================

#[then("the resolved socket is {expected}")]
fn the_resolved_socket_is(
    engine_connection_state: &EngineConnectionState,
    expected: String,
) -> StepResult<()> {
    let resolved = engine_connection_state
        .resolved_socket
        .get()
        .ok_or("resolved socket should be set")?;
    assert_eq!(
        resolved, expected,
        "Expected resolved socket to be '{expected}', but got '{resolved}'"
    );
    Ok(())
}

#[then("the socket resolves to the platform default")]
fn the_socket_resolves_to_platform_default(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let resolved = engine_connection_state
        .resolved_socket
        .get()
        .ok_or("resolved socket should be set")?;
    assert_eq!(resolved, SocketResolver::<MockEnv>::default_socket());
    Ok(())
}

#[then("verification fails with a health check error")]
fn verification_fails(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let outcome = engine_connection_state
        .verify_outcome
        .get()
        .ok_or("verification outcome should be set")?;
    assert!(
        matches!(outcome, VerifyOutcome::Failed),
        "expected a failed health check, got {outcome:?}"
    );
    Ok(())
}
