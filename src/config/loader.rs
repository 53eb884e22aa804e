//! Configuration loading with layered precedence.
//!
//! Layers are composed by hand with `MergeComposer` (lowest to highest):
//! application defaults, configuration file, environment variables,
//! command-line arguments. The CLI owns subcommand dispatch, so `AppConfig`
//! never parses arguments itself.
//!
//! # Environment Variable Handling
//!
//! Typed variables fail fast. `PODWATCH_SWARM=maybe` or
//! `PODWATCH_CONNECT_TIMEOUT_SECS=soon` stop loading with
//! `ConfigError::InvalidValue` instead of silently falling back to a default.
//! String variables such as `PODWATCH_ENGINE_SOCKET` are always accepted.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

// ============================================================================
// Environment Variable Specification Table
// ============================================================================

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Boolean value (`true`/`false`). Invalid values return an error.
    Bool,
    /// Unsigned 64-bit integer. Invalid values return an error.
    U64,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name (e.g., `PODWATCH_ENGINE_SOCKET`).
    env_var: &'static str,
    /// The JSON path segments (e.g., `["tls", "ca_cert_path"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "PODWATCH_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "PODWATCH_API_VERSION",
        path: &["api_version"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "PODWATCH_CONNECT_TIMEOUT_SECS",
        path: &["connect_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "PODWATCH_SWARM",
        path: &["swarm"],
        var_type: EnvVarType::Bool,
    },
    // TLS fields
    EnvVarSpec {
        env_var: "PODWATCH_TLS_CA_CERT_PATH",
        path: &["tls", "ca_cert_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "PODWATCH_TLS_CLIENT_CERT_PATH",
        path: &["tls", "client_cert_path"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "PODWATCH_TLS_CLIENT_KEY_PATH",
        path: &["tls", "client_key_path"],
        var_type: EnvVarType::String,
    },
    // Log fields
    EnvVarSpec {
        env_var: "PODWATCH_LOG_FILTER",
        path: &["log", "filter"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "PODWATCH_LOG_FORMAT",
        path: &["log", "format"],
        var_type: EnvVarType::String,
    },
];

/// Returns the environment variable names recognised by the config loader.
///
/// Tests use this to clear every `PODWATCH_*` variable without keeping a
/// second list in sync.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Read a configuration file through `cap_std` and push it to the composer.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration from the process environment with full layer
/// precedence.
///
/// # Errors
///
/// See [`load_config_with_env`].
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    load_config_with_env(cli, &mockable::DefaultEnv::new())
}

/// Load configuration with full layer precedence, reading variables from
/// `env`.
///
/// 1. Application defaults
/// 2. Configuration file (`--config`, `PODWATCH_CONFIG_PATH` or discovery)
/// 3. `PODWATCH_*` environment variables
/// 4. Command-line arguments
///
/// Later sources override earlier ones.
///
/// # Errors
///
/// Returns `ConfigError::ParseError` for unreadable or malformed files,
/// `ConfigError::InvalidValue` for unparseable typed environment variables,
/// and `ConfigError::OrthoConfig` when the merged layers do not form a valid
/// configuration.
pub fn load_config_with_env<E: mockable::Env>(cli: &Cli, env: &E) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(ref path) = config_path(cli, env) {
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;

    Ok(config)
}

/// The explicit `--config` path when it exists, otherwise the first existing
/// discovery candidate.
fn config_path<E: mockable::Env>(cli: &Cli, env: &E) -> Option<Utf8PathBuf> {
    if let Some(path) = cli.config.clone().filter(|p| p.exists()) {
        return Some(path);
    }
    if let Some(path) = env
        .string("PODWATCH_CONFIG_PATH")
        .filter(|value| !value.is_empty())
        .map(Utf8PathBuf::from)
        .filter(|p| p.exists())
    {
        return Some(path);
    }
    ConfigDiscovery::builder("podwatch")
        .config_file_name("config.toml")
        .dotfile_name(".podwatch.toml")
        .build()
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok())
}

/// Collect `PODWATCH_*` variables from [`ENV_VAR_SPECS`] into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a bool or u64 variable cannot be
/// parsed.
fn collect_env_vars<E: mockable::Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::Bool => match raw_value.parse::<bool>() {
                Ok(b) => Value::Bool(b),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected bool (true/false), got '{raw_value}'"),
                    }
                    .into());
                }
            },
            EnvVarType::U64 => match raw_value.parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert `value` at a nested `path`, creating intermediate objects.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> serde_json::Value {
    let mut overrides = serde_json::Map::new();

    if let Some(ref socket) = cli.engine_socket {
        overrides.insert(
            "engine_socket".to_owned(),
            serde_json::Value::String(socket.clone()),
        );
    }

    if let Some(ref version) = cli.api_version {
        overrides.insert(
            "api_version".to_owned(),
            serde_json::Value::String(version.clone()),
        );
    }

    if overrides.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::Value::Object(overrides)
    }
}
