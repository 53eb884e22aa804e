//! Unit tests for podwatch configuration types.
//!
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Defaults and serialisation
//! - [`validation`] - `TlsConfig` validation
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence

mod helpers;
