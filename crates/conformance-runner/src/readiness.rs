// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Waiting for the conformance pod to start running.

use std::sync::Arc;
use std::time::Duration;

use conformance_k8s::K8sClient;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ReadinessError;
use crate::snapshot::{PodPhase, PodSnapshot};
use crate::types::PodRef;

const POLL_INTERVAL_MS: u64 = 500;
const MAX_POLL_INTERVAL_SECS: u64 = 10;
const MAX_LOOKUP_FAILURES: u32 = 5;
// Stand-in deadline for timeouts too large to add to an `Instant`.
const FAR_FUTURE_SECS: u64 = 86400 * 365 * 30;

/// Spacing between readiness polls.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
	pub initial_interval: Duration,
	pub max_interval: Duration,
	pub multiplier: f64,
	pub jitter: bool,
	/// Consecutive lookup errors (other than "not found") tolerated before
	/// giving up.
	pub max_lookup_failures: u32,
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		Self {
			initial_interval: Duration::from_millis(POLL_INTERVAL_MS),
			max_interval: Duration::from_secs(MAX_POLL_INTERVAL_SECS),
			multiplier: 2.0,
			jitter: true,
			max_lookup_failures: MAX_LOOKUP_FAILURES,
		}
	}
}

impl BackoffPolicy {
	/// Delay before poll number `attempt + 1`.
	pub fn delay(&self, attempt: u32) -> Duration {
		let exponent = attempt.min(i32::MAX as u32) as i32;
		let exponential = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
		let capped = exponential.min(self.max_interval.as_secs_f64());

		let delay = if self.jitter {
			capped * (0.5 + fastrand::f64())
		} else {
			capped
		};

		Duration::try_from_secs_f64(delay).unwrap_or(self.max_interval)
	}
}

/// Polls the pod until it reaches a phase in which its log is available.
pub struct ReadinessPoller {
	client: Arc<dyn K8sClient>,
	backoff: BackoffPolicy,
}

impl ReadinessPoller {
	pub fn new(client: Arc<dyn K8sClient>, backoff: BackoffPolicy) -> Self {
		Self { client, backoff }
	}

	/// Wait until the pod is `Running`.
	///
	/// A pod that has already reached `Succeeded` or `Failed` is also
	/// returned: its log can still be read and its exit code observed.
	/// A missing pod is polled again, since it may not have been created yet.
	pub async fn await_running(
		&self,
		pod: &PodRef,
		timeout: Duration,
		cancel: &CancellationToken,
	) -> Result<PodSnapshot, ReadinessError> {
		let start = Instant::now();
		let deadline = start
			.checked_add(timeout)
			.unwrap_or_else(|| start + Duration::from_secs(FAR_FUTURE_SECS));
		let mut attempt: u32 = 0;
		let mut consecutive_failures: u32 = 0;

		info!(pod = %pod, timeout = ?timeout, "Waiting for pod to start running...");

		loop {
			let lookup = tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					return Err(ReadinessError::Cancelled { pod: pod.clone() });
				}
				res = tokio::time::timeout_at(deadline, self.client.get_pod(&pod.name, &pod.namespace)) => res,
			};

			match lookup {
				Err(_) => {
					return Err(ReadinessError::Timeout {
						pod: pod.clone(),
						waited: start.elapsed(),
					});
				}
				Ok(Ok(found)) => {
					consecutive_failures = 0;
					let snapshot = PodSnapshot::from_pod(&found);
					match snapshot.phase {
						PodPhase::Running => {
							info!(pod = %pod, "Pod is running");
							return Ok(snapshot);
						}
						phase if phase.is_terminal() => {
							warn!(pod = %pod, phase = ?phase, "Pod finished before it was seen running");
							return Ok(snapshot);
						}
						phase => {
							debug!(pod = %pod, phase = ?phase, attempt, "pod not running yet");
						}
					}
				}
				Ok(Err(e)) if e.is_not_found() => {
					debug!(pod = %pod, attempt, "pod does not exist yet");
				}
				Ok(Err(e)) => {
					consecutive_failures += 1;
					if consecutive_failures >= self.backoff.max_lookup_failures {
						return Err(ReadinessError::Lookup {
							pod: pod.clone(),
							source: e,
						});
					}
					warn!(
						pod = %pod,
						error = %e,
						consecutive_failures,
						"pod lookup failed, retrying"
					);
				}
			}

			let delay = self.backoff.delay(attempt);
			attempt = attempt.saturating_add(1);
			let wake = Instant::now()
				.checked_add(delay)
				.map_or(deadline, |wake| wake.min(deadline));

			tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					return Err(ReadinessError::Cancelled { pod: pod.clone() });
				}
				_ = tokio::time::sleep_until(wake) => {}
			}

			if Instant::now() >= deadline {
				return Err(ReadinessError::Timeout {
					pod: pod.clone(),
					waited: start.elapsed(),
				});
			}
		}
	}
}
