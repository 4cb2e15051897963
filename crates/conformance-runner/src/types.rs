// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runner identifiers and results.

use std::fmt;

/// Identifies the observed pod. Passed explicitly to every component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodRef {
	pub namespace: String,
	pub name: String,
}

impl PodRef {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}
}

impl fmt::Display for PodRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// Final outcome of a conformance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
	/// Exit code of the conformance container, or
	/// [`RunResult::UNDETERMINED`] when it could not be determined.
	pub exit_code: i32,
}

impl RunResult {
	/// Sentinel exit code for "could not be determined".
	pub const UNDETERMINED: i32 = -1;

	pub fn new(exit_code: i32) -> Self {
		Self { exit_code }
	}

	pub fn undetermined() -> Self {
		Self {
			exit_code: Self::UNDETERMINED,
		}
	}

	pub fn is_determined(&self) -> bool {
		self.exit_code != Self::UNDETERMINED
	}

	pub fn succeeded(&self) -> bool {
		self.exit_code == 0
	}

	/// The status a shell would observe for this exit code (its low byte).
	pub fn process_status(&self) -> u8 {
		(self.exit_code & 0xff) as u8
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pod_ref_display() {
		let pod = PodRef::new("conformance", "e2e-conformance-test");
		assert_eq!(pod.to_string(), "conformance/e2e-conformance-test");
	}

	#[test]
	fn test_undetermined_result() {
		let result = RunResult::undetermined();
		assert_eq!(result.exit_code, -1);
		assert!(!result.is_determined());
		assert!(!result.succeeded());
	}

	#[test]
	fn test_process_status_wraps_like_a_shell() {
		assert_eq!(RunResult::new(0).process_status(), 0);
		assert_eq!(RunResult::new(2).process_status(), 2);
		assert_eq!(RunResult::undetermined().process_status(), 255);
		assert_eq!(RunResult::new(256).process_status(), 0);
	}
}
