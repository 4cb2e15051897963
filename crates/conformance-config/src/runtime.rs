// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::kubeconfig::{expand_tilde, resolve_kubeconfig};
use crate::layer::*;
use crate::ConfigError;

pub const DEFAULT_NAMESPACE: &str = "conformance";
pub const DEFAULT_POD_NAME: &str = "e2e-conformance-test";
pub const DEFAULT_CONTAINER: &str = "conformance-container";

const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 300;
const DEFAULT_LOG_DRAIN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_INITIAL_MS: u64 = 500;
const DEFAULT_POLL_MAX_SECS: u64 = 10;
const DEFAULT_POLL_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_LOOKUP_FAILURES: u32 = 5;

/// The final, validated configuration for a conformance run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
	/// Explicitly configured kubeconfig; `None` means "resolve the default".
	pub kubeconfig: Option<PathBuf>,
	pub namespace: String,
	pub pod_name: String,
	pub container: String,
	pub startup_timeout: Duration,
	/// Overall deadline for the run. `None` waits indefinitely.
	pub run_timeout: Option<Duration>,
	pub log_drain_timeout: Duration,
	pub poll: PollConfig,
	/// Directory that receives a copy of the pod log.
	pub output_dir: Option<PathBuf>,
	pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
	pub initial_interval: Duration,
	pub max_interval: Duration,
	pub multiplier: f64,
	pub jitter: bool,
	pub max_lookup_failures: u32,
}

impl Default for PollConfig {
	fn default() -> Self {
		Self {
			initial_interval: Duration::from_millis(DEFAULT_POLL_INITIAL_MS),
			max_interval: Duration::from_secs(DEFAULT_POLL_MAX_SECS),
			multiplier: DEFAULT_POLL_MULTIPLIER,
			jitter: true,
			max_lookup_failures: DEFAULT_MAX_LOOKUP_FAILURES,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
	pub level: LogLevel,
	pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
	Error,
	Warn,
	#[default]
	Info,
	Debug,
	Trace,
}

impl LogLevel {
	pub fn as_str(&self) -> &'static str {
		match self {
			LogLevel::Error => "error",
			LogLevel::Warn => "warn",
			LogLevel::Info => "info",
			LogLevel::Debug => "debug",
			LogLevel::Trace => "trace",
		}
	}
}

impl FromStr for LogLevel {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"error" => Ok(LogLevel::Error),
			"warn" | "warning" => Ok(LogLevel::Warn),
			"info" => Ok(LogLevel::Info),
			"debug" => Ok(LogLevel::Debug),
			"trace" => Ok(LogLevel::Trace),
			other => Err(ConfigError::invalid_value(
				"logging.level",
				format!("unknown level '{other}'"),
			)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
	Compact,
}

impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pretty" => Ok(LogFormat::Pretty),
			"json" => Ok(LogFormat::Json),
			"compact" => Ok(LogFormat::Compact),
			other => Err(ConfigError::invalid_value(
				"logging.format",
				format!("unknown format '{other}'"),
			)),
		}
	}
}

impl Default for RunnerConfig {
	fn default() -> Self {
		Self {
			kubeconfig: None,
			namespace: DEFAULT_NAMESPACE.to_string(),
			pod_name: DEFAULT_POD_NAME.to_string(),
			container: DEFAULT_CONTAINER.to_string(),
			startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
			run_timeout: None,
			log_drain_timeout: Duration::from_secs(DEFAULT_LOG_DRAIN_TIMEOUT_SECS),
			poll: PollConfig::default(),
			output_dir: None,
			logging: LoggingConfig::default(),
		}
	}
}

impl RunnerConfig {
	/// Build runtime config from a merged layer.
	pub fn from_layer(layer: ConfigLayer) -> Result<Self, ConfigError> {
		let home = dirs::home_dir();
		Self::from_layer_with_home(layer, home.as_deref())
	}

	pub(crate) fn from_layer_with_home(
		layer: ConfigLayer,
		home: Option<&Path>,
	) -> Result<Self, ConfigError> {
		let defaults = Self::default();
		let cluster = layer.cluster.unwrap_or_default();
		let pod = layer.pod.unwrap_or_default();
		let timeouts = layer.timeouts.unwrap_or_default();

		let kubeconfig = cluster
			.kubeconfig
			.map(|p| expand_tilde(&p, home))
			.transpose()?;
		let output_dir = layer
			.output
			.and_then(|o| o.dir)
			.map(|p| expand_tilde(&p, home))
			.transpose()?;

		Ok(Self {
			kubeconfig,
			namespace: cluster.namespace.unwrap_or(defaults.namespace),
			pod_name: pod.name.unwrap_or(defaults.pod_name),
			container: pod.container.unwrap_or(defaults.container),
			startup_timeout: parse_duration_or(
				"timeouts.startup",
				timeouts.startup.as_deref(),
				defaults.startup_timeout,
			)?,
			run_timeout: timeouts
				.run
				.as_deref()
				.map(|s| parse_duration("timeouts.run", s))
				.transpose()?,
			log_drain_timeout: parse_duration_or(
				"timeouts.log_drain",
				timeouts.log_drain.as_deref(),
				defaults.log_drain_timeout,
			)?,
			poll: build_poll_config(layer.poll)?,
			output_dir,
			logging: build_logging_config(layer.logging)?,
		})
	}

	/// Path of the kubeconfig to load: the configured one, else the
	/// conventional default.
	pub fn kubeconfig_path(&self) -> Result<PathBuf, ConfigError> {
		resolve_kubeconfig(self.kubeconfig.as_deref())
	}
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
	humantime::parse_duration(value.trim())
		.map_err(|e| ConfigError::invalid_value(field, format!("'{value}': {e}")))
}

fn parse_duration_or(
	field: &str,
	value: Option<&str>,
	default: Duration,
) -> Result<Duration, ConfigError> {
	value.map_or(Ok(default), |v| parse_duration(field, v))
}

fn build_poll_config(layer: Option<PollLayer>) -> Result<PollConfig, ConfigError> {
	let layer = layer.unwrap_or_default();
	let defaults = PollConfig::default();
	Ok(PollConfig {
		initial_interval: parse_duration_or(
			"poll.initial_interval",
			layer.initial_interval.as_deref(),
			defaults.initial_interval,
		)?,
		max_interval: parse_duration_or(
			"poll.max_interval",
			layer.max_interval.as_deref(),
			defaults.max_interval,
		)?,
		multiplier: layer.multiplier.unwrap_or(defaults.multiplier),
		jitter: layer.jitter.unwrap_or(defaults.jitter),
		max_lookup_failures: layer
			.max_lookup_failures
			.unwrap_or(defaults.max_lookup_failures),
	})
}

fn build_logging_config(layer: Option<LoggingLayer>) -> Result<LoggingConfig, ConfigError> {
	let layer = layer.unwrap_or_default();
	Ok(LoggingConfig {
		level: layer
			.level
			.as_deref()
			.map(LogLevel::from_str)
			.transpose()?
			.unwrap_or_default(),
		format: layer
			.format
			.as_deref()
			.map(LogFormat::from_str)
			.transpose()?
			.unwrap_or_default(),
	})
}
