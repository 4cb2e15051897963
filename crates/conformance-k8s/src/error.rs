// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("Pod not found: {name}")]
	PodNotFound { name: String },

	#[error("Log stream error: {message}")]
	StreamError { message: String },

	#[error("Watch error: {message}")]
	WatchError { message: String },

	#[error("Kubeconfig error: {message}")]
	Kubeconfig { message: String },
}

impl K8sError {
	/// Whether the error means the pod does not exist (yet).
	pub fn is_not_found(&self) -> bool {
		matches!(self, K8sError::PodNotFound { .. })
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}
