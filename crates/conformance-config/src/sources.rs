// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: files, environment, CLI, defaults.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::layer::*;
use crate::ConfigError;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "CONFORMANCE_";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	File = 20,
	Environment = 30,
	Cli = 40,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	/// Precedence level
	fn precedence(&self) -> Precedence;

	/// Load configuration layer from this source
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading defaults");
		// Return empty layer - defaults applied during finalization
		Ok(ConfigLayer::default())
	}
}

/// File-based configuration source (TOML).
pub struct FileSource {
	path: PathBuf,
	required: bool,
	name: &'static str,
}

impl FileSource {
	/// A file named on the command line. It must exist.
	pub fn custom(path: PathBuf) -> Self {
		Self {
			path,
			required: true,
			name: "config-file",
		}
	}

	/// A conventional location that may be absent.
	pub fn optional(path: PathBuf, name: &'static str) -> Self {
		Self {
			path,
			required: false,
			name,
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		Precedence::File
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			if self.required {
				return Err(ConfigError::MissingFile {
					path: self.path.clone(),
				});
			}
			debug!(path = %self.path.display(), source = self.name, "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path)?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CONFORMANCE_<FIELD>, e.g. `CONFORMANCE_NAMESPACE`,
/// `CONFORMANCE_STARTUP_TIMEOUT=10m`.
pub struct EnvSource {
	vars: HashMap<String, String>,
}

impl EnvSource {
	/// Snapshot the process environment.
	pub fn new() -> Self {
		Self::from_vars(std::env::vars())
	}

	pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
		Self {
			vars: vars
				.into_iter()
				.filter(|(k, _)| k.starts_with(ENV_PREFIX))
				.collect(),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let mut layer = ConfigLayer::default();

		for (key, value) in &self.vars {
			let value = value.trim().to_string();
			if value.is_empty() {
				continue;
			}

			trace!(key = %key, "processing env var");

			match key.as_str() {
				"CONFORMANCE_KUBECONFIG" => {
					cluster(&mut layer).kubeconfig = Some(PathBuf::from(value));
				}
				"CONFORMANCE_NAMESPACE" => {
					cluster(&mut layer).namespace = Some(value);
				}
				"CONFORMANCE_POD_NAME" => {
					pod(&mut layer).name = Some(value);
				}
				"CONFORMANCE_CONTAINER" => {
					pod(&mut layer).container = Some(value);
				}
				"CONFORMANCE_STARTUP_TIMEOUT" => {
					timeouts(&mut layer).startup = Some(value);
				}
				"CONFORMANCE_RUN_TIMEOUT" => {
					timeouts(&mut layer).run = Some(value);
				}
				"CONFORMANCE_LOG_DRAIN_TIMEOUT" => {
					timeouts(&mut layer).log_drain = Some(value);
				}
				"CONFORMANCE_POLL_INITIAL_INTERVAL" => {
					poll(&mut layer).initial_interval = Some(value);
				}
				"CONFORMANCE_POLL_MAX_INTERVAL" => {
					poll(&mut layer).max_interval = Some(value);
				}
				"CONFORMANCE_POLL_MAX_LOOKUP_FAILURES" => {
					let parsed = value.parse().map_err(|_| {
						ConfigError::invalid_value(key.as_str(), format!("'{value}' is not a count"))
					})?;
					poll(&mut layer).max_lookup_failures = Some(parsed);
				}
				"CONFORMANCE_OUTPUT_DIR" => {
					layer.output.get_or_insert_with(OutputLayer::default).dir =
						Some(PathBuf::from(value));
				}
				"CONFORMANCE_LOG_LEVEL" => {
					logging(&mut layer).level = Some(value);
				}
				"CONFORMANCE_LOG_FORMAT" => {
					logging(&mut layer).format = Some(value);
				}
				_ => {
					// Unknown CONFORMANCE_ variable (e.g. CONFORMANCE_CONFIG), ignore
				}
			}
		}

		Ok(layer)
	}
}

fn cluster(layer: &mut ConfigLayer) -> &mut ClusterLayer {
	layer.cluster.get_or_insert_with(ClusterLayer::default)
}

fn pod(layer: &mut ConfigLayer) -> &mut PodLayer {
	layer.pod.get_or_insert_with(PodLayer::default)
}

fn timeouts(layer: &mut ConfigLayer) -> &mut TimeoutsLayer {
	layer.timeouts.get_or_insert_with(TimeoutsLayer::default)
}

fn poll(layer: &mut ConfigLayer) -> &mut PollLayer {
	layer.poll.get_or_insert_with(PollLayer::default)
}

fn logging(layer: &mut ConfigLayer) -> &mut LoggingLayer {
	layer.logging.get_or_insert_with(LoggingLayer::default)
}

/// CLI override source.
pub struct CliSource {
	overrides: CliOverrides,
}

/// CLI argument overrides. `None` means the flag was not given.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub config_file: Option<PathBuf>,
	pub kubeconfig: Option<PathBuf>,
	pub namespace: Option<String>,
	pub pod_name: Option<String>,
	pub container: Option<String>,
	pub startup_timeout: Option<String>,
	pub run_timeout: Option<String>,
	pub output_dir: Option<PathBuf>,
	pub log_level: Option<String>,
	pub log_format: Option<String>,
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading CLI overrides");
		let o = &self.overrides;
		let mut layer = ConfigLayer::default();

		if let Some(ref kubeconfig) = o.kubeconfig {
			cluster(&mut layer).kubeconfig = Some(kubeconfig.clone());
		}
		if let Some(ref namespace) = o.namespace {
			cluster(&mut layer).namespace = Some(namespace.clone());
		}
		if let Some(ref name) = o.pod_name {
			pod(&mut layer).name = Some(name.clone());
		}
		if let Some(ref container) = o.container {
			pod(&mut layer).container = Some(container.clone());
		}
		if let Some(ref startup) = o.startup_timeout {
			timeouts(&mut layer).startup = Some(startup.clone());
		}
		if let Some(ref run) = o.run_timeout {
			timeouts(&mut layer).run = Some(run.clone());
		}
		if let Some(ref dir) = o.output_dir {
			layer.output.get_or_insert_with(OutputLayer::default).dir = Some(dir.clone());
		}
		if let Some(ref level) = o.log_level {
			logging(&mut layer).level = Some(level.clone());
		}
		if let Some(ref format) = o.log_format {
			logging(&mut layer).format = Some(format.clone());
		}

		Ok(layer)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Cli > Precedence::Environment);
		assert!(Precedence::Environment > Precedence::File);
		assert!(Precedence::File > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.cluster.is_none());
		assert!(layer.pod.is_none());
	}

	#[test]
	fn test_required_file_must_exist() {
		let source = FileSource::custom(PathBuf::from("/nonexistent/conformance.toml"));
		assert!(matches!(source.load(), Err(ConfigError::MissingFile { .. })));
	}

	#[test]
	fn test_optional_file_missing_returns_empty() {
		let source = FileSource::optional(PathBuf::from("/nonexistent/conformance.toml"), "test");
		assert!(source.load().unwrap().cluster.is_none());
	}

	#[test]
	fn test_file_source_reads_toml() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[pod]\ncontainer = \"e2e\"").unwrap();

		let layer = FileSource::custom(file.path().to_path_buf()).load().unwrap();

		assert_eq!(layer.pod.unwrap().container.as_deref(), Some("e2e"));
	}

	#[test]
	fn test_file_source_reports_parse_errors_with_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[pod\nname = ").unwrap();

		let err = FileSource::custom(file.path().to_path_buf())
			.load()
			.unwrap_err();

		match err {
			ConfigError::TomlParse { path, .. } => assert_eq!(path, file.path()),
			other => panic!("expected TomlParse, got {other:?}"),
		}
	}

	#[test]
	fn test_env_source_maps_known_vars() {
		let source = EnvSource::from_vars([
			("CONFORMANCE_NAMESPACE".to_string(), "sonobuoy".to_string()),
			("CONFORMANCE_STARTUP_TIMEOUT".to_string(), " 10m ".to_string()),
			("CONFORMANCE_LOG_FORMAT".to_string(), "json".to_string()),
			("CONFORMANCE_POD_NAME".to_string(), "".to_string()),
			("HOME".to_string(), "/root".to_string()),
		]);

		let layer = source.load().unwrap();

		assert_eq!(layer.cluster.unwrap().namespace.as_deref(), Some("sonobuoy"));
		assert_eq!(layer.timeouts.unwrap().startup.as_deref(), Some("10m"));
		assert_eq!(layer.logging.unwrap().format.as_deref(), Some("json"));
		assert!(layer.pod.is_none());
	}

	#[test]
	fn test_env_source_rejects_bad_count() {
		let source = EnvSource::from_vars([(
			"CONFORMANCE_POLL_MAX_LOOKUP_FAILURES".to_string(),
			"many".to_string(),
		)]);

		assert!(matches!(source.load(), Err(ConfigError::InvalidValue { .. })));
	}

	#[test]
	fn test_cli_source_only_sets_given_flags() {
		let source = CliSource::new(CliOverrides {
			container: Some("tests".to_string()),
			..Default::default()
		});

		let layer = source.load().unwrap();

		let pod = layer.pod.unwrap();
		assert_eq!(pod.container.as_deref(), Some("tests"));
		assert!(pod.name.is_none());
		assert!(layer.cluster.is_none());
	}
}
