// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use std::time::Duration;

use tracing::warn;

use crate::runtime::RunnerConfig;
use crate::ConfigError;

const DNS1123_LABEL_MAX: usize = 63;
const DNS1123_SUBDOMAIN_MAX: usize = 253;

/// Validate the configuration.
///
/// Returns Ok(()) if valid, or ConfigError::InvalidValue naming the field.
pub fn validate_config(config: &RunnerConfig) -> Result<(), ConfigError> {
	validate_target(config)?;
	validate_timeouts(config)?;
	validate_poll(config)?;

	Ok(())
}

/// `[a-z0-9]([-a-z0-9]*[a-z0-9])?`, at most 63 characters.
pub fn is_dns1123_label(value: &str) -> bool {
	let bytes = value.as_bytes();
	if bytes.is_empty() || bytes.len() > DNS1123_LABEL_MAX {
		return false;
	}
	let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
	alnum(&bytes[0])
		&& alnum(&bytes[bytes.len() - 1])
		&& bytes.iter().all(|b| alnum(b) || *b == b'-')
}

/// Dot-separated DNS-1123 labels, at most 253 characters.
pub fn is_dns1123_subdomain(value: &str) -> bool {
	!value.is_empty()
		&& value.len() <= DNS1123_SUBDOMAIN_MAX
		&& value.split('.').all(is_dns1123_label)
}

fn validate_target(config: &RunnerConfig) -> Result<(), ConfigError> {
	if !is_dns1123_label(&config.namespace) {
		return Err(ConfigError::invalid_value(
			"namespace",
			format!("'{}' is not a valid DNS-1123 label", config.namespace),
		));
	}

	if !is_dns1123_subdomain(&config.pod_name) {
		return Err(ConfigError::invalid_value(
			"pod_name",
			format!("'{}' is not a valid DNS-1123 subdomain", config.pod_name),
		));
	}

	if config.container.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"container",
			"cannot be empty",
		));
	}

	Ok(())
}

fn validate_timeouts(config: &RunnerConfig) -> Result<(), ConfigError> {
	if config.startup_timeout.is_zero() {
		return Err(ConfigError::invalid_value(
			"timeouts.startup",
			"must be greater than 0",
		));
	}

	if config.run_timeout.is_some_and(|t| t.is_zero()) {
		return Err(ConfigError::invalid_value(
			"timeouts.run",
			"must be greater than 0",
		));
	}

	if let Some(run) = config.run_timeout {
		if run <= config.startup_timeout {
			warn!(
				run_timeout = ?run,
				startup_timeout = ?config.startup_timeout,
				"run timeout does not exceed startup timeout"
			);
		}
	}

	Ok(())
}

fn validate_poll(config: &RunnerConfig) -> Result<(), ConfigError> {
	let poll = &config.poll;

	if poll.initial_interval.is_zero() {
		return Err(ConfigError::invalid_value(
			"poll.initial_interval",
			"must be greater than 0",
		));
	}

	if poll.initial_interval > poll.max_interval {
		return Err(ConfigError::invalid_value(
			"poll.initial_interval",
			"cannot be greater than max_interval",
		));
	}

	if poll.multiplier < 1.0 {
		return Err(ConfigError::invalid_value(
			"poll.multiplier",
			"must be at least 1.0",
		));
	}

	if poll.max_lookup_failures == 0 {
		return Err(ConfigError::invalid_value(
			"poll.max_lookup_failures",
			"must be at least 1",
		));
	}

	if poll.max_interval > Duration::from_secs(300) {
		warn!(max_interval = ?poll.max_interval, "poll interval is unusually long");
	}

	Ok(())
}
