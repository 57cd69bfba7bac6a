//! Caller-facing conversion progress log.
//!
//! A [`ProgressSink`] is an append-only side channel: every conversion
//! stage may write a timestamped line to it, and nothing ever reads it
//! back for correctness. One sink may be shared by concurrent conversions;
//! each line is appended and flushed as one unit under the sink's lock.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Shared, serialized writer for timestamped progress lines.
#[derive(Clone)]
pub struct ProgressSink {
	inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ProgressSink {
	/// Wraps a writer. The sink clones share the writer and serialize
	/// their appends.
	pub fn new(writer: impl Write + Send + 'static) -> Self {
		Self {
			inner: Arc::new(Mutex::new(Box::new(writer))),
		}
	}

	/// Appends one timestamped line. Write failures are logged and
	/// swallowed; the log is never allowed to fail a conversion.
	pub fn log(&self, message: &str) {
		let line = format!(
			"{}\t{message}\n",
			chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f")
		);

		let mut writer = self.inner.lock();
		if let Err(error) = writer.write_all(line.as_bytes()) {
			debug!(target: "pj", %error, "progress sink write failed");
			return;
		}
		if let Err(error) = writer.flush() {
			debug!(target: "pj", %error, "progress sink flush failed");
		}
	}
}

impl std::fmt::Debug for ProgressSink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProgressSink").finish_non_exhaustive()
	}
}

/// Logs to the sink when one is present.
pub(crate) fn log_progress(sink: Option<&ProgressSink>, message: &str) {
	if let Some(sink) = sink {
		sink.log(message);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Clone, Default)]
	struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

	impl Write for SharedBuffer {
		fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
			self.0.lock().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> std::io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn lines_are_timestamped_and_appended() {
		let buffer = SharedBuffer::default();
		let sink = ProgressSink::new(buffer.clone());

		sink.log("navigating");
		sink.log("rendering");

		let contents = String::from_utf8(buffer.0.lock().clone()).unwrap();
		let lines: Vec<&str> = contents.lines().collect();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].ends_with("\tnavigating"));
		assert!(lines[1].ends_with("\trendering"));
		// Timestamp prefix looks like 2026-08-04T...
		assert_eq!(&lines[0][4..5], "-");
	}

	#[test]
	fn concurrent_writers_never_interleave_within_a_line() {
		let buffer = SharedBuffer::default();
		let sink = ProgressSink::new(buffer.clone());

		let handles: Vec<_> = (0..8)
			.map(|worker| {
				let sink = sink.clone();
				std::thread::spawn(move || {
					for i in 0..50 {
						sink.log(&format!("worker-{worker}-line-{i}"));
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}

		let contents = String::from_utf8(buffer.0.lock().clone()).unwrap();
		let lines: Vec<&str> = contents.lines().collect();
		assert_eq!(lines.len(), 8 * 50);
		for line in lines {
			let (_, message) = line.split_once('\t').expect("timestamped line");
			assert!(message.starts_with("worker-"), "garbled line: {line}");
		}
	}
}
