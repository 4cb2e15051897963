// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle observation for a Kubernetes conformance pod.
//!
//! This crate turns a running conformance pod into two things an operator
//! cares about: its log output and the exit code of the conformance
//! container.
//!
//! # Architecture
//!
//! The [`Coordinator`] sits on top of the Kubernetes client
//! (conformance-k8s) and sequences:
//!
//! - [`ReadinessPoller`]: wait, with backoff, until the pod is running
//! - [`LogStreamer`]: follow the container log as framed lines
//! - [`TerminationWatcher`]: watch the pod until the exit code is known
//!
//! A run whose outcome cannot be determined resolves to
//! [`RunResult::UNDETERMINED`] rather than failing.

pub mod coordinator;
pub mod error;
pub mod logs;
pub mod readiness;
pub mod sink;
pub mod snapshot;
pub mod termination;
pub mod types;

#[cfg(test)]
mod testing;

pub use coordinator::{Coordinator, CoordinatorSettings};
pub use error::{ReadinessError, RunnerError, StreamError, WatchDecodeError};
pub use logs::{LineFramer, LogSession, LogStreamer, StreamEvent};
pub use readiness::{BackoffPolicy, ReadinessPoller};
pub use sink::{relay, LineSink, TeeSink, WriterSink};
pub use snapshot::{ContainerStatus, PodPhase, PodSnapshot};
pub use termination::{decide, TerminationWatcher};
pub use types::{PodRef, RunResult};
