// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for the conformance runner.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - Common types for pod watching and log streaming

mod client;
mod error;
mod kube_client;
mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeClient;
pub use types::{
	ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStateWaiting,
	ContainerStatus, LogOptions, LogStream, Pod, PodStatus, PodWatchEvent, PodWatchStream,
};
