// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Following the conformance container's log.
//!
//! A [`LogStreamer`] runs as its own task and reports everything it sees as
//! [`StreamEvent`]s on a bounded channel, so the consumer applies
//! backpressure and never has to reconcile separate line, error and
//! completion signals.

use std::sync::Arc;

use conformance_k8s::{K8sClient, LogOptions};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::types::PodRef;

const DEFAULT_BUFFER: usize = 256;
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One signal from a log streaming session.
///
/// A session produces any number of `Line`s followed by at most one of
/// `Failure` or `Done`.
#[derive(Debug)]
pub enum StreamEvent {
	Line(String),
	Failure(StreamError),
	Done,
}

/// Splits raw log chunks into lines.
///
/// Chunk boundaries are arbitrary, so bytes after the last newline are held
/// until the next chunk or [`LineFramer::finish`]. A line longer than the
/// framer's limit is emitted in pieces of at most that many bytes.
#[derive(Debug)]
pub struct LineFramer {
	pending: Vec<u8>,
	max_line: usize,
}

impl Default for LineFramer {
	fn default() -> Self {
		Self {
			pending: Vec::new(),
			max_line: MAX_LINE_BYTES,
		}
	}
}

impl LineFramer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_max_line(max_line: usize) -> Self {
		Self {
			pending: Vec::new(),
			max_line: max_line.max(1),
		}
	}

	/// Feed a chunk, returning every line it completes.
	pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
		let mut lines = Vec::new();
		let mut rest = chunk;

		// `pending` never holds more than `max_line` bytes.
		while !rest.is_empty() {
			let room = self.max_line - self.pending.len();
			let window = &rest[..rest.len().min(room + 1)];

			if let Some(pos) = window.iter().position(|&b| b == b'\n') {
				self.pending.extend_from_slice(&rest[..pos]);
				lines.push(self.take_line());
				rest = &rest[pos + 1..];
			} else if window.len() > room {
				self.pending.extend_from_slice(&rest[..room]);
				lines.push(self.take_line());
				rest = &rest[room..];
			} else {
				self.pending.extend_from_slice(window);
				rest = &rest[window.len()..];
			}
		}

		lines
	}

	/// Take the trailing partial line, if any.
	pub fn finish(&mut self) -> Option<String> {
		if self.pending.is_empty() {
			return None;
		}
		Some(self.take_line())
	}

	fn take_line(&mut self) -> String {
		let line = decode_line(&self.pending);
		self.pending.clear();
		line
	}
}

fn decode_line(bytes: &[u8]) -> String {
	let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
	String::from_utf8_lossy(bytes).into_owned()
}

/// A running log streaming task.
pub struct LogSession {
	pub events: mpsc::Receiver<StreamEvent>,
	pub handle: JoinHandle<()>,
}

/// Follows a container's log and forwards its lines.
#[derive(Clone)]
pub struct LogStreamer {
	client: Arc<dyn K8sClient>,
	options: LogOptions,
	buffer: usize,
}

impl LogStreamer {
	pub fn new(client: Arc<dyn K8sClient>) -> Self {
		Self {
			client,
			options: LogOptions::default(),
			buffer: DEFAULT_BUFFER,
		}
	}

	pub fn with_options(mut self, options: LogOptions) -> Self {
		self.options = options;
		self
	}

	/// Number of events that may be queued before the streamer waits for
	/// the consumer.
	pub fn with_buffer(mut self, buffer: usize) -> Self {
		self.buffer = buffer.max(1);
		self
	}

	/// Start streaming in a new task.
	pub fn spawn(&self, pod: PodRef, container: String, cancel: CancellationToken) -> LogSession {
		let (tx, rx) = mpsc::channel(self.buffer);
		let streamer = self.clone();
		let handle = tokio::spawn(async move {
			streamer.run(&pod, &container, tx, cancel).await;
		});
		LogSession { events: rx, handle }
	}

	/// Stream until the log ends, an error occurs, the consumer goes away or
	/// `cancel` fires. On cancellation no terminal event is sent; the channel
	/// just closes.
	pub async fn run(
		&self,
		pod: &PodRef,
		container: &str,
		tx: mpsc::Sender<StreamEvent>,
		cancel: CancellationToken,
	) {
		let opened = tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				debug!(pod = %pod, container, "log stream cancelled before it opened");
				return;
			}
			res = self.client.stream_logs(&pod.name, &pod.namespace, container, self.options.clone()) => res,
		};

		let mut stream = match opened {
			Ok(stream) => stream,
			Err(source) => {
				let failure = StreamError {
					pod: pod.clone(),
					container: container.to_string(),
					source,
				};
				send(&tx, StreamEvent::Failure(failure), &cancel).await;
				return;
			}
		};

		info!(pod = %pod, container, "Streaming container logs");

		let mut framer = LineFramer::new();
		loop {
			let next = tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					debug!(pod = %pod, container, "log stream cancelled");
					return;
				}
				next = stream.next() => next,
			};

			match next {
				Some(Ok(chunk)) => {
					for line in framer.push(&chunk) {
						if !send(&tx, StreamEvent::Line(line), &cancel).await {
							return;
						}
					}
				}
				Some(Err(e)) => {
					warn!(pod = %pod, container, error = %e, "log stream failed");
					if let Some(line) = framer.finish() {
						if !send(&tx, StreamEvent::Line(line), &cancel).await {
							return;
						}
					}
					let failure = StreamError {
						pod: pod.clone(),
						container: container.to_string(),
						source: conformance_k8s::K8sError::StreamError {
							message: e.to_string(),
						},
					};
					send(&tx, StreamEvent::Failure(failure), &cancel).await;
					return;
				}
				None => {
					if let Some(line) = framer.finish() {
						if !send(&tx, StreamEvent::Line(line), &cancel).await {
							return;
						}
					}
					debug!(pod = %pod, container, "log stream reached end");
					send(&tx, StreamEvent::Done, &cancel).await;
					return;
				}
			}
		}
	}
}

/// Deliver an event, waiting for channel capacity. Returns false once the
/// consumer is gone or the session was cancelled.
async fn send(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent, cancel: &CancellationToken) -> bool {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => false,
		res = tx.send(event) => res.is_ok(),
	}
}
