//! Result and progress reporting.

use std::fmt;

use hostrun_protocol::{RunContext, TestElement, TestOutcome, TestResultRecord};
use parking_lot::Mutex;

/// Destination for run messages and test results.
pub trait RunSink: Send + Sync {
	fn result(&self, record: TestResultRecord);

	/// Asks the driver to stop the run after a fatal failure.
	fn request_stop(&self, run_id: &str);

	/// Run-scoped (`test` is `None`) or test-scoped text message.
	fn message(&self, run_id: &str, test: Option<&TestElement>, text: &str, outcome: TestOutcome) {
		self.result(TestResultRecord {
			run_id: run_id.to_string(),
			test: test.cloned(),
			message: text.to_string(),
			outcome,
			fault: None,
		});
	}
}

/// Receives progress text while a session is brought up.
pub trait ProgressSink: Send + Sync {
	fn progress(&self, text: &str);
}

impl<F> ProgressSink for F
where
	F: Fn(&str) + Send + Sync,
{
	fn progress(&self, text: &str) {
		self(text)
	}
}

/// Binds a sink to the run and test a call belongs to.
#[derive(Clone, Copy)]
pub struct Reporter<'a> {
	sink: &'a dyn RunSink,
	run: &'a RunContext,
	test: Option<&'a TestElement>,
}

impl<'a> Reporter<'a> {
	pub fn new(sink: &'a dyn RunSink, run: &'a RunContext, test: Option<&'a TestElement>) -> Self {
		Self { sink, run, test }
	}

	/// Reports a result. `fault` is attached only in debug builds.
	pub fn result(&self, outcome: TestOutcome, message: impl Into<String>, fault: Option<&dyn fmt::Debug>) {
		let fault = if cfg!(debug_assertions) {
			fault.map(|fault| format!("{fault:?}"))
		} else {
			None
		};
		self.sink.result(TestResultRecord {
			run_id: self.run.run_id.clone(),
			test: self.test.cloned(),
			message: message.into(),
			outcome,
			fault,
		});
	}

	pub fn request_stop(&self) {
		self.sink.request_stop(&self.run.run_id);
	}
}

impl ProgressSink for Reporter<'_> {
	fn progress(&self, text: &str) {
		self.sink.message(&self.run.run_id, self.test, text, TestOutcome::Info);
	}
}

/// Sink that forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RunSink for TracingSink {
	fn result(&self, record: TestResultRecord) {
		let test = record.test.as_ref().map(|test| test.name.as_str());
		match record.outcome {
			TestOutcome::Info => {
				tracing::info!(target = "hostrun.adapter", run_id = %record.run_id, test, "{}", record.message)
			}
			outcome => tracing::info!(
				target = "hostrun.adapter",
				run_id = %record.run_id,
				test,
				%outcome,
				fault = record.fault.as_deref(),
				"{}",
				record.message
			),
		}
	}

	fn request_stop(&self, run_id: &str) {
		tracing::warn!(target = "hostrun.adapter", run_id, "run stop requested");
	}
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
	records: Mutex<Vec<TestResultRecord>>,
	stops: Mutex<Vec<String>>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn records(&self) -> Vec<TestResultRecord> {
		self.records.lock().clone()
	}

	/// Records that carry a verdict, skipping informational messages.
	pub fn results(&self) -> Vec<TestResultRecord> {
		self.records.lock().iter().filter(|record| record.outcome != TestOutcome::Info).cloned().collect()
	}

	/// Text of every informational message, in order.
	pub fn messages(&self) -> Vec<String> {
		self.records
			.lock()
			.iter()
			.filter(|record| record.outcome == TestOutcome::Info)
			.map(|record| record.message.clone())
			.collect()
	}

	pub fn stop_requested(&self) -> bool {
		!self.stops.lock().is_empty()
	}
}

impl RunSink for RecordingSink {
	fn result(&self, record: TestResultRecord) {
		self.records.lock().push(record);
	}

	fn request_stop(&self, run_id: &str) {
		self.stops.lock().push(run_id.to_string());
	}
}
