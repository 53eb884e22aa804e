//! Client for Docker-compatible container engines.
//!
//! `podwatch` speaks the engine's HTTP API over a Unix socket, plain TCP or
//! TLS. One-shot calls return decoded values; the events and stats endpoints
//! are followed by long-lived monitors that deliver every unit in arrival
//! order until they are stopped.
//!
//! # Modules
//!
//! - [`api`]: One-shot engine calls (system, containers, exec, registry auth)
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Endpoint resolution, transport and request dispatch
//! - [`error`]: Semantic error types
//! - [`logs`]: Container log retrieval and stream demultiplexing
//! - [`monitor`]: Event and stats monitors
//! - [`telemetry`]: Diagnostic logging for the binary

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logs;
pub mod monitor;
pub mod telemetry;
mod wire;
