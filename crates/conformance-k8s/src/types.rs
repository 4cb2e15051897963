// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::error::K8sError;

pub use k8s_openapi::api::core::v1::{
	ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
	ContainerStatus, Pod, PodStatus,
};

/// Options for log streaming.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
	/// Only return this many lines from the end of the log. `None` streams
	/// the whole log from container start.
	pub tail: Option<u32>,
	pub timestamps: bool,
}

/// A pinned stream of raw log chunks from a container.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// A single change observed on a watched pod.
#[derive(Debug, Clone)]
pub enum PodWatchEvent {
	/// The pod was listed, added or modified.
	Applied(Pod),
	/// The pod was deleted; carries its last known state.
	Deleted(Pod),
	/// The watch delivered something that is not a pod.
	Unrecognized { reason: String },
}

/// A pinned stream of watch events for a single pod.
pub type PodWatchStream = Pin<Box<dyn Stream<Item = Result<PodWatchEvent, K8sError>> + Send>>;
