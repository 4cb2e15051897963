// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operator-facing output for streamed log lines.

use std::io::{self, Write};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{RunnerError, StreamError};
use crate::logs::StreamEvent;

/// Destination for relayed log lines.
pub trait LineSink: Send {
	fn write_line(&mut self, line: &str) -> io::Result<()>;

	fn flush(&mut self) -> io::Result<()>;
}

/// Writes each line followed by a newline to any writer.
pub struct WriterSink<W> {
	writer: W,
}

impl<W: Write + Send> WriterSink<W> {
	pub fn new(writer: W) -> Self {
		Self { writer }
	}

	pub fn into_inner(self) -> W {
		self.writer
	}
}

impl WriterSink<io::Stdout> {
	pub fn stdout() -> Self {
		Self::new(io::stdout())
	}
}

impl<W: Write + Send> LineSink for WriterSink<W> {
	fn write_line(&mut self, line: &str) -> io::Result<()> {
		self.writer.write_all(line.as_bytes())?;
		self.writer.write_all(b"\n")
	}

	fn flush(&mut self) -> io::Result<()> {
		self.writer.flush()
	}
}

/// Sends every line to two sinks, e.g. the terminal and a log file.
pub struct TeeSink {
	primary: Box<dyn LineSink>,
	secondary: Box<dyn LineSink>,
}

impl TeeSink {
	pub fn new(primary: Box<dyn LineSink>, secondary: Box<dyn LineSink>) -> Self {
		Self { primary, secondary }
	}
}

impl LineSink for TeeSink {
	fn write_line(&mut self, line: &str) -> io::Result<()> {
		self.primary.write_line(line)?;
		self.secondary.write_line(line)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.primary.flush()?;
		self.secondary.flush()
	}
}

/// Lines written to the sink per trip to the blocking pool.
const MAX_BATCH: usize = 64;

/// How a batch of events ended the session, if it did.
enum BatchEnd {
	Done,
	Failed(StreamError),
}

/// Drain a log session into `sink`, pushing each line out as it arrives.
///
/// Sink writes are blocking I/O (a terminal, a pipe, a file), so they run
/// on tokio's blocking pool in batches of whatever lines are already
/// queued. Returns the number of lines written once the session reports
/// `Done`.
pub async fn relay(
	mut events: mpsc::Receiver<StreamEvent>,
	mut sink: Box<dyn LineSink>,
) -> Result<u64, RunnerError> {
	let mut lines: u64 = 0;

	while let Some(first) = events.recv().await {
		let mut batch = vec![first];
		while batch.len() < MAX_BATCH {
			match events.try_recv() {
				Ok(event) => batch.push(event),
				Err(_) => break,
			}
		}

		let (returned, written) = tokio::task::spawn_blocking(move || {
			let written = write_batch(sink.as_mut(), batch);
			(sink, written)
		})
		.await
		.map_err(io::Error::other)?;
		sink = returned;

		let (count, end) = written?;
		lines += count;
		match end {
			Some(BatchEnd::Done) => {
				debug!(lines, "log stream complete");
				return Ok(lines);
			}
			Some(BatchEnd::Failed(err)) => return Err(err.into()),
			None => {}
		}
	}

	Err(RunnerError::Cancelled)
}

/// Write a batch's lines and flush once. Stops at the first terminal event.
fn write_batch(
	sink: &mut dyn LineSink,
	batch: Vec<StreamEvent>,
) -> io::Result<(u64, Option<BatchEnd>)> {
	let mut written: u64 = 0;
	let mut end = None;

	for event in batch {
		match event {
			StreamEvent::Line(line) => {
				sink.write_line(&line)?;
				written += 1;
			}
			StreamEvent::Failure(err) => {
				end = Some(BatchEnd::Failed(err));
				break;
			}
			StreamEvent::Done => {
				end = Some(BatchEnd::Done);
				break;
			}
		}
	}
	sink.flush()?;

	Ok((written, end))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::PodRef;
	use conformance_k8s::K8sError;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::{Arc, Mutex};
	use std::time::Duration;

	/// Captures lines in memory.
	#[derive(Clone, Default)]
	struct MemorySink {
		lines: Arc<Mutex<Vec<String>>>,
	}

	impl LineSink for MemorySink {
		fn write_line(&mut self, line: &str) -> io::Result<()> {
			self.lines.lock().unwrap().push(line.to_string());
			Ok(())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	struct BrokenSink;

	impl LineSink for BrokenSink {
		fn write_line(&mut self, _line: &str) -> io::Result<()> {
			Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	async fn events(items: Vec<StreamEvent>) -> mpsc::Receiver<StreamEvent> {
		let (tx, rx) = mpsc::channel(items.len().max(1));
		for item in items {
			tx.send(item).await.unwrap();
		}
		rx
	}

	fn failure() -> StreamEvent {
		StreamEvent::Failure(StreamError {
			pod: PodRef::new("conformance", "e2e-conformance-test"),
			container: "conformance-container".to_string(),
			source: K8sError::StreamError {
				message: "reset".to_string(),
			},
		})
	}

	#[test]
	fn test_writer_sink_terminates_lines() {
		let mut sink = WriterSink::new(Vec::new());
		sink.write_line("a").unwrap();
		sink.write_line("").unwrap();
		sink.flush().unwrap();
		assert_eq!(sink.into_inner(), b"a\n\n");
	}

	#[test]
	fn test_tee_sink_writes_both() {
		let first = MemorySink::default();
		let second = MemorySink::default();
		let mut tee = TeeSink::new(Box::new(first.clone()), Box::new(second.clone()));

		tee.write_line("hello").unwrap();

		assert_eq!(*first.lines.lock().unwrap(), vec!["hello"]);
		assert_eq!(*second.lines.lock().unwrap(), vec!["hello"]);
	}

	#[tokio::test]
	async fn test_relay_writes_lines_until_done() {
		let rx = events(vec![
			StreamEvent::Line("a".to_string()),
			StreamEvent::Line("b".to_string()),
			StreamEvent::Done,
		])
		.await;
		let sink = MemorySink::default();

		let lines = relay(rx, Box::new(sink.clone())).await.unwrap();

		assert_eq!(lines, 2);
		assert_eq!(*sink.lines.lock().unwrap(), vec!["a", "b"]);
	}

	#[tokio::test]
	async fn test_relay_surfaces_stream_failure() {
		let rx = events(vec![StreamEvent::Line("x".to_string()), failure()]).await;
		let sink = MemorySink::default();

		let result = relay(rx, Box::new(sink.clone())).await;

		assert!(matches!(result, Err(RunnerError::Stream(_))));
		assert_eq!(*sink.lines.lock().unwrap(), vec!["x"]);
	}

	#[tokio::test]
	async fn test_relay_reports_output_errors_instead_of_aborting() {
		let rx = events(vec![StreamEvent::Line("x".to_string()), StreamEvent::Done]).await;

		let result = relay(rx, Box::new(BrokenSink)).await;

		assert!(matches!(result, Err(RunnerError::Output(_))));
	}

	#[tokio::test]
	async fn test_relay_without_done_is_cancelled() {
		let rx = events(vec![StreamEvent::Line("x".to_string())]).await;
		let result = relay(rx, Box::new(MemorySink::default())).await;

		assert!(matches!(result, Err(RunnerError::Cancelled)));
	}

	#[tokio::test]
	async fn test_relay_keeps_lines_after_a_failure_out_of_the_sink() {
		let rx = events(vec![
			StreamEvent::Line("a".to_string()),
			failure(),
			StreamEvent::Line("late".to_string()),
		])
		.await;
		let sink = MemorySink::default();

		let result = relay(rx, Box::new(sink.clone())).await;

		assert!(matches!(result, Err(RunnerError::Stream(_))));
		assert_eq!(*sink.lines.lock().unwrap(), vec!["a"]);
	}

	/// Blocks the calling thread on every write.
	struct SlowSink {
		written: Arc<AtomicBool>,
	}

	impl LineSink for SlowSink {
		fn write_line(&mut self, _line: &str) -> io::Result<()> {
			std::thread::sleep(Duration::from_millis(500));
			self.written.store(true, Ordering::SeqCst);
			Ok(())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn test_slow_sink_does_not_stall_the_runtime() {
		let written = Arc::new(AtomicBool::new(false));
		let rx = events(vec![StreamEvent::Line("x".to_string()), StreamEvent::Done]).await;
		let relay_task = tokio::spawn(relay(
			rx,
			Box::new(SlowSink {
				written: written.clone(),
			}),
		));

		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(!written.load(Ordering::SeqCst));

		assert_eq!(relay_task.await.unwrap().unwrap(), 1);
		assert!(written.load(Ordering::SeqCst));
	}
}
