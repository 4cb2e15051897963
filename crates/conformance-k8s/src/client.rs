// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sResult;
use crate::types::{LogOptions, LogStream, Pod, PodWatchStream};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the pod operations the conformance runner needs.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Get a specific pod by name from the specified namespace.
	async fn get_pod(&self, name: &str, namespace: &str) -> K8sResult<Pod>;

	/// Watch a single pod by name.
	///
	/// The stream starts with the current state of the pod and then yields
	/// every subsequent change in the order the API server emits them.
	async fn watch_pod(&self, name: &str, namespace: &str) -> K8sResult<PodWatchStream>;

	/// Follow the log of a container in a pod.
	///
	/// The stream ends when the container's log ends, typically because the
	/// container terminated.
	async fn stream_logs(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		opts: LogOptions,
	) -> K8sResult<LogStream>;
}
