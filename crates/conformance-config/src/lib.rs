// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the conformance runner.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file, the environment and CLI flags
//! - Humantime duration parsing
//! - Kubeconfig path resolution
//! - Configuration validation

pub mod error;
pub mod kubeconfig;
pub mod layer;
pub mod registry;
pub mod runtime;
pub mod sources;
pub mod validation;

pub use error::ConfigError;
pub use kubeconfig::{resolve_kubeconfig, resolve_kubeconfig_with};
pub use layer::ConfigLayer;
pub use registry::ConfigRegistry;
pub use runtime::{LogFormat, LogLevel, LoggingConfig, PollConfig, RunnerConfig};
pub use sources::{CliOverrides, ConfigSource, Precedence};

/// Load configuration with CLI overrides.
///
/// Precedence, lowest first: built-in defaults, the `--config` file (when
/// given), `CONFORMANCE_*` environment variables, CLI flags.
pub fn load_config_with_cli(cli: CliOverrides) -> Result<RunnerConfig, ConfigError> {
	let mut registry = ConfigRegistry::new();

	registry.register(Box::new(sources::DefaultsSource));
	if let Some(ref path) = cli.config_file {
		registry.register(Box::new(sources::FileSource::custom(path.clone())));
	}
	registry.register(Box::new(sources::EnvSource::new()));
	registry.register(Box::new(sources::CliSource::new(cli)));

	registry.load()
}
