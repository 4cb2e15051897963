// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Determining the conformance container's exit code.
//!
//! The watcher consumes pod watch events in order and stops at the first
//! snapshot that decides the outcome. Anything it cannot make sense of
//! resolves to [`RunResult::UNDETERMINED`] instead of an error, so callers
//! always get a decision.

use std::sync::Arc;

use conformance_k8s::{K8sClient, PodWatchEvent, PodWatchStream};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::WatchDecodeError;
use crate::snapshot::{PodPhase, PodSnapshot};
use crate::types::{PodRef, RunResult};

/// Decide the run's outcome from one snapshot, if it is decisive.
///
/// A terminal pod phase always decides; the exit code is undetermined when
/// the container never reported termination. A `Running` pod decides as
/// soon as the named container has terminated, since other containers
/// (sidecars) can keep the pod running.
pub fn decide(snapshot: &PodSnapshot, container: &str) -> Option<RunResult> {
	match snapshot.phase {
		PodPhase::Succeeded | PodPhase::Failed => {
			info!(phase = ?snapshot.phase, "Pod terminated");
			Some(
				snapshot
					.exit_code_of(container)
					.map(RunResult::new)
					.unwrap_or_else(RunResult::undetermined),
			)
		}
		PodPhase::Running => {
			for cs in snapshot.terminated_containers() {
				info!(container = %cs.name, exit_code = ?cs.exit_code, "Container terminated");
			}
			snapshot.exit_code_of(container).map(RunResult::new)
		}
		PodPhase::Pending | PodPhase::Unknown => None,
	}
}

/// Watches the pod until the conformance container's exit code is known.
pub struct TerminationWatcher {
	client: Arc<dyn K8sClient>,
}

impl TerminationWatcher {
	pub fn new(client: Arc<dyn K8sClient>) -> Self {
		Self { client }
	}

	/// Open a watch on the pod and wait for its outcome. Never fails: a
	/// watch that cannot be opened resolves to an undetermined result.
	pub async fn await_termination(
		&self,
		pod: &PodRef,
		container: &str,
		cancel: &CancellationToken,
	) -> RunResult {
		match self.client.watch_pod(&pod.name, &pod.namespace).await {
			Ok(events) => self.observe(pod, events, container, cancel).await,
			Err(e) => {
				warn!(pod = %pod, error = %e, "Failed to watch pod");
				RunResult::undetermined()
			}
		}
	}

	/// Consume `events` until the outcome is decided.
	///
	/// Exactly one result is produced; the stream is not polled again once
	/// it is.
	pub async fn observe(
		&self,
		pod: &PodRef,
		mut events: PodWatchStream,
		container: &str,
		cancel: &CancellationToken,
	) -> RunResult {
		info!(pod = %pod, container, "Waiting for Pod to terminate...");

		loop {
			let next = tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					warn!(pod = %pod, "Cancelled before the pod terminated");
					return RunResult::undetermined();
				}
				next = events.next() => next,
			};

			let (observed, deleted) = match next {
				Some(Ok(PodWatchEvent::Applied(observed))) => (observed, false),
				Some(Ok(PodWatchEvent::Deleted(observed))) => (observed, true),
				Some(Ok(PodWatchEvent::Unrecognized { reason })) => {
					let err = WatchDecodeError {
						pod: pod.clone(),
						reason,
					};
					warn!(error = %err, "Received unexpected object from watch");
					return RunResult::undetermined();
				}
				// The watch re-establishes itself after transport errors.
				Some(Err(e)) => {
					warn!(pod = %pod, error = %e, "Pod watch interrupted, waiting for it to recover");
					continue;
				}
				None => {
					warn!(pod = %pod, "Pod watch closed before the pod terminated");
					return RunResult::undetermined();
				}
			};

			let snapshot = PodSnapshot::from_pod(&observed);
			if let Some(result) = decide(&snapshot, container) {
				info!(pod = %pod, exit_code = result.exit_code, "Conformance container finished");
				return result;
			}

			if deleted {
				warn!(pod = %pod, phase = ?snapshot.phase, "Pod was deleted before it terminated");
				return RunResult::undetermined();
			}
		}
	}
}
