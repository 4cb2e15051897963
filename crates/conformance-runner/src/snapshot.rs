// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Point-in-time views of the observed pod.

use conformance_k8s::Pod;

/// Pod lifecycle phase, as reported by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
	Pending,
	Running,
	Succeeded,
	Failed,
	Unknown,
}

impl PodPhase {
	/// Interpret a raw phase string. Missing or unrecognized values map to
	/// `Unknown`.
	pub fn parse(phase: Option<&str>) -> Self {
		match phase {
			Some("Pending") => PodPhase::Pending,
			Some("Running") => PodPhase::Running,
			Some("Succeeded") => PodPhase::Succeeded,
			Some("Failed") => PodPhase::Failed,
			_ => PodPhase::Unknown,
		}
	}

	/// Whether no further transitions can occur from this phase.
	pub fn is_terminal(&self) -> bool {
		matches!(self, PodPhase::Succeeded | PodPhase::Failed)
	}
}

/// State of a single container within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
	pub name: String,
	pub terminated: bool,
	/// Set only once the container has terminated.
	pub exit_code: Option<i32>,
}

/// One observed state of the pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSnapshot {
	pub phase: PodPhase,
	pub container_statuses: Vec<ContainerStatus>,
}

impl PodSnapshot {
	pub fn from_pod(pod: &Pod) -> Self {
		let status = pod.status.as_ref();
		let phase = PodPhase::parse(status.and_then(|s| s.phase.as_deref()));

		let container_statuses = status
			.and_then(|s| s.container_statuses.as_ref())
			.map(|statuses| {
				statuses
					.iter()
					.map(|cs| {
						let terminated = cs.state.as_ref().and_then(|st| st.terminated.as_ref());
						ContainerStatus {
							name: cs.name.clone(),
							terminated: terminated.is_some(),
							exit_code: terminated.map(|t| t.exit_code),
						}
					})
					.collect()
			})
			.unwrap_or_default();

		Self {
			phase,
			container_statuses,
		}
	}

	pub fn container(&self, name: &str) -> Option<&ContainerStatus> {
		self.container_statuses.iter().find(|cs| cs.name == name)
	}

	/// Exit code of the named container, if it has terminated.
	pub fn exit_code_of(&self, name: &str) -> Option<i32> {
		self
			.container(name)
			.filter(|cs| cs.terminated)
			.and_then(|cs| cs.exit_code)
	}

	pub fn terminated_containers(&self) -> impl Iterator<Item = &ContainerStatus> {
		self.container_statuses.iter().filter(|cs| cs.terminated)
	}
}
