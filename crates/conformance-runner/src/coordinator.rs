// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sequencing readiness, log streaming and termination for one run.

use std::sync::Arc;
use std::time::Duration;

use conformance_k8s::{K8sClient, LogOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::logs::{LogSession, LogStreamer};
use crate::readiness::{BackoffPolicy, ReadinessPoller};
use crate::sink::{relay, LineSink};
use crate::termination::TerminationWatcher;
use crate::types::{PodRef, RunResult};

const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 300;
const DEFAULT_LOG_DRAIN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_BUFFER: usize = 256;

/// Timing knobs for a run.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
	/// How long to wait for the pod to start running.
	pub startup_timeout: Duration,
	/// How long log output may keep draining once the exit code is known.
	pub log_drain_timeout: Duration,
	/// Log lines buffered between the streamer and the output sink.
	pub log_buffer: usize,
	pub log_options: LogOptions,
	pub backoff: BackoffPolicy,
}

impl Default for CoordinatorSettings {
	fn default() -> Self {
		Self {
			startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
			log_drain_timeout: Duration::from_secs(DEFAULT_LOG_DRAIN_TIMEOUT_SECS),
			log_buffer: DEFAULT_LOG_BUFFER,
			log_options: LogOptions::default(),
			backoff: BackoffPolicy::default(),
		}
	}
}

/// Drives a single conformance pod from start-up to exit code.
pub struct Coordinator {
	client: Arc<dyn K8sClient>,
	readiness: ReadinessPoller,
	streamer: LogStreamer,
	watcher: TerminationWatcher,
	settings: CoordinatorSettings,
}

impl Coordinator {
	pub fn new(client: Arc<dyn K8sClient>, settings: CoordinatorSettings) -> Self {
		Self {
			readiness: ReadinessPoller::new(client.clone(), settings.backoff.clone()),
			streamer: LogStreamer::new(client.clone())
				.with_buffer(settings.log_buffer)
				.with_options(settings.log_options.clone()),
			watcher: TerminationWatcher::new(client.clone()),
			client,
			settings,
		}
	}

	/// Wait for the pod to run, then print its log until the log ends.
	///
	/// Returns the number of lines printed.
	pub async fn print_running_logs(
		&self,
		pod: &PodRef,
		container: &str,
		sink: Box<dyn LineSink>,
		cancel: &CancellationToken,
	) -> Result<u64, RunnerError> {
		self
			.readiness
			.await_running(pod, self.settings.startup_timeout, cancel)
			.await?;

		let session = self
			.streamer
			.spawn(pod.clone(), container.to_string(), cancel.child_token());
		let result = relay(session.events, sink).await;
		if let Err(e) = session.handle.await {
			warn!(pod = %pod, error = %e, "log streaming task panicked");
		}
		result
	}

	/// Watch the pod until the container's exit code is known.
	///
	/// Only failing to open the watch is an error; every other anomaly
	/// yields an undetermined result.
	pub async fn await_exit_code(
		&self,
		pod: &PodRef,
		container: &str,
		cancel: &CancellationToken,
	) -> Result<RunResult, RunnerError> {
		let events = self
			.client
			.watch_pod(&pod.name, &pod.namespace)
			.await
			.map_err(|source| RunnerError::Watch {
				pod: pod.clone(),
				source,
			})?;

		Ok(self.watcher.observe(pod, events, container, cancel).await)
	}

	/// Run to completion: wait for the pod, stream its log alongside the
	/// termination watch, and return the exit code.
	///
	/// Log streaming is best effort. Its failures are logged and do not
	/// affect the result; once the exit code is known the remaining output
	/// gets `log_drain_timeout` before the stream is cancelled.
	pub async fn run(
		&self,
		pod: &PodRef,
		container: &str,
		sink: Box<dyn LineSink>,
		cancel: &CancellationToken,
	) -> Result<RunResult, RunnerError> {
		self
			.readiness
			.await_running(pod, self.settings.startup_timeout, cancel)
			.await?;

		let log_cancel = cancel.child_token();
		let LogSession { events, handle } =
			self
				.streamer
				.spawn(pod.clone(), container.to_string(), log_cancel.clone());
		let mut relay_task = tokio::spawn(relay(events, sink));

		let result = self.await_exit_code(pod, container, cancel).await;

		let drained = tokio::time::timeout(self.settings.log_drain_timeout, &mut relay_task).await;
		let relayed = match drained {
			Ok(joined) => joined,
			Err(_) => {
				warn!(
					pod = %pod,
					drain_timeout = ?self.settings.log_drain_timeout,
					"log output still open after drain timeout, printed log is truncated"
				);
				log_cancel.cancel();
				relay_task.await
			}
		};

		match relayed {
			Ok(Ok(lines)) => debug!(pod = %pod, lines, "log streaming finished"),
			Ok(Err(RunnerError::Cancelled)) => debug!(pod = %pod, "log streaming cancelled"),
			Ok(Err(e)) => warn!(pod = %pod, error = %e, "log streaming failed, exit code is unaffected"),
			Err(e) => warn!(pod = %pod, error = %e, "log relay task panicked"),
		}
		if let Err(e) = handle.await {
			warn!(pod = %pod, error = %e, "log streaming task panicked");
		}

		let result = result?;
		info!(pod = %pod, exit_code = result.exit_code, "Run finished");
		Ok(result)
	}
}
