// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer for merging from multiple sources.
//!
//! Durations are kept as the raw humantime strings (`"90s"`, `"5m"`) until
//! the merged layer is turned into a [`crate::RunnerConfig`], so a bad value
//! is reported against its field name whichever source supplied it.

use serde::Deserialize;
use std::path::PathBuf;

/// Partial configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
	#[serde(default)]
	pub cluster: Option<ClusterLayer>,
	#[serde(default)]
	pub pod: Option<PodLayer>,
	#[serde(default)]
	pub timeouts: Option<TimeoutsLayer>,
	#[serde(default)]
	pub poll: Option<PollLayer>,
	#[serde(default)]
	pub output: Option<OutputLayer>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterLayer {
	#[serde(default)]
	pub kubeconfig: Option<PathBuf>,
	#[serde(default)]
	pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodLayer {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub container: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutsLayer {
	#[serde(default)]
	pub startup: Option<String>,
	#[serde(default)]
	pub run: Option<String>,
	#[serde(default)]
	pub log_drain: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollLayer {
	#[serde(default)]
	pub initial_interval: Option<String>,
	#[serde(default)]
	pub max_interval: Option<String>,
	#[serde(default)]
	pub multiplier: Option<f64>,
	#[serde(default)]
	pub jitter: Option<bool>,
	#[serde(default)]
	pub max_lookup_failures: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputLayer {
	#[serde(default)]
	pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

impl ConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ConfigLayer) {
		merge_option(&mut self.cluster, other.cluster, ClusterLayer::merge);
		merge_option(&mut self.pod, other.pod, PodLayer::merge);
		merge_option(&mut self.timeouts, other.timeouts, TimeoutsLayer::merge);
		merge_option(&mut self.poll, other.poll, PollLayer::merge);
		merge_option(&mut self.output, other.output, |t, s| {
			if s.dir.is_some() {
				t.dir = s.dir;
			}
		});
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

impl ClusterLayer {
	fn merge(&mut self, other: ClusterLayer) {
		if other.kubeconfig.is_some() {
			self.kubeconfig = other.kubeconfig;
		}
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
	}
}

impl PodLayer {
	fn merge(&mut self, other: PodLayer) {
		if other.name.is_some() {
			self.name = other.name;
		}
		if other.container.is_some() {
			self.container = other.container;
		}
	}
}

impl TimeoutsLayer {
	fn merge(&mut self, other: TimeoutsLayer) {
		if other.startup.is_some() {
			self.startup = other.startup;
		}
		if other.run.is_some() {
			self.run = other.run;
		}
		if other.log_drain.is_some() {
			self.log_drain = other.log_drain;
		}
	}
}

impl PollLayer {
	fn merge(&mut self, other: PollLayer) {
		if other.initial_interval.is_some() {
			self.initial_interval = other.initial_interval;
		}
		if other.max_interval.is_some() {
			self.max_interval = other.max_interval;
		}
		if other.multiplier.is_some() {
			self.multiplier = other.multiplier;
		}
		if other.jitter.is_some() {
			self.jitter = other.jitter;
		}
		if other.max_lookup_failures.is_some() {
			self.max_lookup_failures = other.max_lookup_failures;
		}
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Fields from the overlay win; fields it leaves unset keep the base
	/// value. A CLI flag that was not given must never clear a file value.
	#[test]
	fn test_merge_precedence_overwrites_existing_values() {
		let mut base = ConfigLayer {
			cluster: Some(ClusterLayer {
				kubeconfig: Some(PathBuf::from("/base/kubeconfig")),
				namespace: Some("base".to_string()),
			}),
			..Default::default()
		};

		let overlay = ConfigLayer {
			cluster: Some(ClusterLayer {
				kubeconfig: None,
				namespace: Some("overlay".to_string()),
			}),
			..Default::default()
		};

		base.merge(overlay);

		let cluster = base.cluster.unwrap();
		assert_eq!(cluster.namespace, Some("overlay".to_string()));
		assert_eq!(cluster.kubeconfig, Some(PathBuf::from("/base/kubeconfig")));
	}

	#[test]
	fn test_merge_empty_layer_preserves_all() {
		let mut base = ConfigLayer {
			poll: Some(PollLayer {
				initial_interval: Some("1s".to_string()),
				max_interval: Some("30s".to_string()),
				multiplier: Some(1.5),
				jitter: Some(false),
				max_lookup_failures: Some(2),
			}),
			..Default::default()
		};

		base.merge(ConfigLayer::default());

		let poll = base.poll.unwrap();
		assert_eq!(poll.initial_interval.as_deref(), Some("1s"));
		assert_eq!(poll.max_interval.as_deref(), Some("30s"));
		assert_eq!(poll.multiplier, Some(1.5));
		assert_eq!(poll.jitter, Some(false));
		assert_eq!(poll.max_lookup_failures, Some(2));
	}

	#[test]
	fn test_merge_into_empty_base() {
		let mut base = ConfigLayer::default();

		base.merge(ConfigLayer {
			timeouts: Some(TimeoutsLayer {
				startup: Some("10m".to_string()),
				..Default::default()
			}),
			..Default::default()
		});

		assert_eq!(base.timeouts.unwrap().startup.as_deref(), Some("10m"));
	}

	#[test]
	fn test_parses_sectioned_toml() {
		let layer: ConfigLayer = toml::from_str(
			r#"
			[cluster]
			namespace = "sonobuoy"

			[pod]
			name = "e2e"

			[timeouts]
			startup = "90s"
			run = "2h"

			[logging]
			format = "json"
			"#,
		)
		.unwrap();

		assert_eq!(layer.cluster.unwrap().namespace.as_deref(), Some("sonobuoy"));
		assert_eq!(layer.pod.unwrap().name.as_deref(), Some("e2e"));
		let timeouts = layer.timeouts.unwrap();
		assert_eq!(timeouts.startup.as_deref(), Some("90s"));
		assert_eq!(timeouts.run.as_deref(), Some("2h"));
		assert_eq!(layer.logging.unwrap().format.as_deref(), Some("json"));
		assert!(layer.poll.is_none());
	}
}
