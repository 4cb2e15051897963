// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runner error types.

use std::time::Duration;

use conformance_k8s::K8sError;

use crate::types::PodRef;

/// Errors from waiting for the pod to start running.
#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
	/// The deadline passed before the pod reached a running phase
	#[error("Timed out after {waited:?} waiting for pod {pod} to start")]
	Timeout { pod: PodRef, waited: Duration },

	/// The pod could not be looked up
	#[error("Failed to look up pod {pod}: {source}")]
	Lookup {
		pod: PodRef,
		#[source]
		source: K8sError,
	},

	/// The wait was cancelled by the caller
	#[error("Cancelled while waiting for pod {pod} to start")]
	Cancelled { pod: PodRef },
}

/// A log streaming session failed.
#[derive(Debug, thiserror::Error)]
#[error("Log stream for container {container} of pod {pod} failed: {source}")]
pub struct StreamError {
	pub pod: PodRef,
	pub container: String,
	#[source]
	pub source: K8sError,
}

/// The watch delivered an object that is not a pod.
#[derive(Debug, thiserror::Error)]
#[error("Unexpected object from watch of pod {pod}: {reason}")]
pub struct WatchDecodeError {
	pub pod: PodRef,
	pub reason: String,
}

/// Errors surfaced by the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
	#[error(transparent)]
	Readiness(#[from] ReadinessError),

	#[error(transparent)]
	Stream(#[from] StreamError),

	/// The termination watch could not be opened
	#[error("Failed to watch pod {pod}: {source}")]
	Watch {
		pod: PodRef,
		#[source]
		source: K8sError,
	},

	/// Writing a log line to the output sink failed
	#[error("Failed to write log output: {0}")]
	Output(#[from] std::io::Error),

	/// The log stream ended without completing, because the run was cancelled
	#[error("Log streaming was cancelled")]
	Cancelled,
}
