//! `podwatch` application entry point.
//!
//! Uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/podwatch/config.toml` or path from `PODWATCH_CONFIG_PATH`)
//! 3. Environment variables (`PODWATCH_*`)
//! 4. Command-line arguments

use std::time::Duration;

use clap::Parser;
use eyre::{Report, Result as EyreResult, WrapErr};
use mockable::DefaultEnv;
use serde::Serialize;
use tracing::info;

use podwatch::config::{
    AppConfig, Cli, Commands, EventsArgs, LogsArgs, PsArgs, StatsArgs, load_config,
};
use podwatch::engine::{EngineClient, EngineConnector, SocketResolver};
use podwatch::error::Result as PodwatchResult;
use podwatch::logs::{LogFraming, LogsOptions};
use podwatch::monitor::Subscription;
use podwatch::telemetry;

/// Application entry point.
///
/// Loads configuration, installs diagnostic logging, then dispatches to the
/// subcommand handler on a multi-threaded runtime.
fn main() -> EyreResult<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;
    telemetry::initialise(&config.log).wrap_err("failed to initialise logging")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start the async runtime")?;
    runtime.block_on(run(&cli, &config)).map_err(Report::from)
}

/// Execute the CLI command, returning domain-specific errors.
async fn run(cli: &Cli, config: &AppConfig) -> PodwatchResult<()> {
    let env = DefaultEnv::new();
    let resolver = SocketResolver::new(&env);
    let client = EngineConnector::connect_with_fallback(
        config.engine_socket.as_deref(),
        &resolver,
        config.client_options()?,
    )?;

    match &cli.command {
        Commands::Ping => ping(&client).await,
        Commands::Version => version(&client).await,
        Commands::Ps(args) => list_containers(&client, args).await,
        Commands::Events(args) => events(&client, args).await,
        Commands::Stats(args) => stats(&client, args).await,
        Commands::Logs(args) => logs(&client, args).await,
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn ping(client: &EngineClient) -> PodwatchResult<()> {
    EngineConnector::health_check_async(client).await?;
    println!("OK");
    Ok(())
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn version(client: &EngineClient) -> PodwatchResult<()> {
    let report = client.version().await?;
    println!("Version:     {}", report.version);
    println!("API version: {}", report.api_version);
    println!("Git commit:  {}", report.git_commit);
    println!("OS/Arch:     {}/{}", report.os, report.arch);
    Ok(())
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn list_containers(client: &EngineClient, args: &PsArgs) -> PodwatchResult<()> {
    let containers = client.list_containers(args.all, false, None).await?;
    println!("{:<14} {:<30} {:<30} NAMES", "CONTAINER ID", "IMAGE", "STATUS");
    for container in containers {
        let short_id: String = container.id.chars().take(12).collect();
        let names = container
            .names
            .iter()
            .map(|name| name.trim_start_matches('/'))
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{short_id:<14} {:<30} {:<30} {names}",
            container.image, container.status
        );
    }
    Ok(())
}

async fn events(client: &EngineClient, args: &EventsArgs) -> PodwatchResult<()> {
    let filters = args.filters.as_deref();
    if let Some(since) = args.since {
        let replayed = client
            .events_since(
                filters,
                Duration::from_secs(since),
                args.until.map(Duration::from_secs),
            )
            .await?;
        for event in &replayed {
            print_json_line(event);
        }
        return Ok(());
    }
    follow(client.event_stream(filters)).await
}

async fn stats(client: &EngineClient, args: &StatsArgs) -> PodwatchResult<()> {
    follow(client.stats_stream(&args.container)).await
}

/// Print every unit of `subscription` until it ends, fails or Ctrl-C is
/// pressed.
async fn follow<T: Serialize>(mut subscription: Subscription<T>) -> PodwatchResult<()> {
    loop {
        tokio::select! {
            unit = subscription.recv() => match unit {
                Some(Ok(value)) => print_json_line(&value),
                Some(Err(error)) => return Err(error),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!(monitor = %subscription.id(), "interrupted, stopping monitor");
                subscription.stop();
                return Ok(());
            }
        }
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_json_line<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(error) => tracing::warn!(%error, "failed to encode unit for output"),
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
async fn logs(client: &EngineClient, args: &LogsArgs) -> PodwatchResult<()> {
    let options = LogsOptions {
        tail: args.tail,
        timestamps: args.timestamps,
        framing: if args.tty {
            LogFraming::Raw
        } else {
            LogFraming::Multiplexed
        },
        ..LogsOptions::default()
    };
    for entry in client.container_logs(&args.container, &options).await? {
        let stamp = entry
            .timestamp
            .map(|timestamp| format!("{timestamp} "))
            .unwrap_or_default();
        let text = entry.text();
        println!("{stamp}{}", text.trim_end_matches('\n'));
    }
    Ok(())
}
