//! Shared fixtures and helper functions for config tests.

use std::sync::Arc;

use ortho_config::MergeComposer;
use rstest::fixture;

use crate::config::{AppConfig, LogFormat};

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        engine_socket = "tcp://10.0.0.5:2376"
        api_version = "v1.18"
        connect_timeout_secs = 10
        swarm = true

        [tls]
        ca_cert_path = "/etc/podwatch/ca.pem"
        client_cert_path = "/etc/podwatch/cert.pem"
        client_key_path = "/etc/podwatch/key.pem"

        [log]
        filter = "podwatch=debug"
        format = "json"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Fixture providing an `AppConfig` parsed from a minimal TOML example.
#[fixture]
pub fn app_config_from_partial_toml() -> AppConfig {
    let toml = r#"
        engine_socket = "unix:///tmp/docker.sock"
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Creates a `MergeComposer` with the defaults layer already pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Merges layers from a composer into `AppConfig`.
pub fn merge_config(composer: MergeComposer) -> Result<AppConfig, Arc<ortho_config::OrthoError>> {
    AppConfig::merge_from_layers(composer.layers())
}

/// Asserts that a config has all default values.
pub fn assert_config_has_defaults(config: &AppConfig) {
    assert!(
        config.engine_socket.is_none(),
        "engine_socket should be None"
    );
    assert!(config.api_version.is_none(), "api_version should be None");
    assert_eq!(
        config.connect_timeout_secs, 30,
        "connect_timeout_secs should be 30"
    );
    assert!(!config.swarm, "swarm should be false");
    assert!(!config.tls.is_enabled(), "tls should be disabled");
    assert_eq!(config.log.filter, "info", "log.filter should be info");
    assert_eq!(
        config.log.format,
        LogFormat::Compact,
        "log.format should be compact"
    );
}

/// Creates a `MergeComposer` with defaults, file and environment layers.
pub fn create_composer_with_file_and_env() -> Result<MergeComposer, serde_json::Error> {
    use ortho_config::serde_json::json;

    let mut composer = create_composer_with_defaults()?;

    composer.push_file(
        json!({
            "engine_socket": "unix:///from/file.sock",
            "api_version": "v1.17"
        }),
        None,
    );

    composer.push_environment(json!({
        "engine_socket": "unix:///from/env.sock"
    }));

    Ok(composer)
}
