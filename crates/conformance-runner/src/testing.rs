// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory K8s client for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use conformance_k8s::{
	K8sClient, K8sError, LogOptions, LogStream, Pod, PodWatchEvent, PodWatchStream,
};

/// Scripted answer to a `get_pod` call.
#[derive(Clone)]
pub enum GetPodReply {
	Pod(Pod),
	NotFound,
	ApiError(String),
}

/// Scripted K8s client. `get_pod` replies are consumed in order and the last
/// one repeats; the watch and log streams can each be opened once.
pub struct MockK8sClient {
	get_replies: Mutex<VecDeque<GetPodReply>>,
	get_calls: AtomicUsize,
	watch: Mutex<Option<PodWatchStream>>,
	logs: Mutex<Option<LogStream>>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self {
			get_replies: Mutex::new(VecDeque::new()),
			get_calls: AtomicUsize::new(0),
			watch: Mutex::new(None),
			logs: Mutex::new(None),
		}
	}

	pub fn with_get_replies(self, replies: Vec<GetPodReply>) -> Self {
		*self.get_replies.lock().unwrap() = replies.into();
		self
	}

	pub fn with_watch(self, stream: PodWatchStream) -> Self {
		*self.watch.lock().unwrap() = Some(stream);
		self
	}

	pub fn with_watch_events(self, events: Vec<PodWatchEvent>) -> Self {
		let items: Vec<Result<PodWatchEvent, K8sError>> = events.into_iter().map(Ok).collect();
		self.with_watch(Box::pin(futures::stream::iter(items)))
	}

	pub fn with_logs(self, stream: LogStream) -> Self {
		*self.logs.lock().unwrap() = Some(stream);
		self
	}

	pub fn get_calls(&self) -> usize {
		self.get_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn get_pod(&self, name: &str, _namespace: &str) -> Result<Pod, K8sError> {
		self.get_calls.fetch_add(1, Ordering::SeqCst);
		let reply = {
			let mut replies = self.get_replies.lock().unwrap();
			if replies.len() > 1 {
				replies.pop_front()
			} else {
				replies.front().cloned()
			}
		};

		match reply {
			Some(GetPodReply::Pod(pod)) => Ok(pod),
			Some(GetPodReply::ApiError(message)) => Err(K8sError::ApiError { message }),
			Some(GetPodReply::NotFound) | None => Err(K8sError::PodNotFound {
				name: name.to_string(),
			}),
		}
	}

	async fn watch_pod(&self, _name: &str, _namespace: &str) -> Result<PodWatchStream, K8sError> {
		self
			.watch
			.lock()
			.unwrap()
			.take()
			.ok_or_else(|| K8sError::WatchError {
				message: "watch not scripted".to_string(),
			})
	}

	async fn stream_logs(
		&self,
		name: &str,
		_namespace: &str,
		_container: &str,
		_opts: LogOptions,
	) -> Result<LogStream, K8sError> {
		self
			.logs
			.lock()
			.unwrap()
			.take()
			.ok_or_else(|| K8sError::PodNotFound {
				name: name.to_string(),
			})
	}
}
