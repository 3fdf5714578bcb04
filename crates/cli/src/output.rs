//! Console output for test results.

use colored::Colorize;
use hostrun::RunSink;
use hostrun::protocol::{TestOutcome, TestResultRecord};
use std::sync::Mutex;

use crate::error::CliError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
	pub passed: usize,
	pub not_passed: usize,
	pub stop_requested: bool,
}

impl Summary {
	pub fn all_passed(&self) -> bool {
		self.not_passed == 0 && !self.stop_requested
	}
}

/// Prints one line per verdict on stdout; progress goes to the log.
#[derive(Debug, Default)]
pub struct ConsoleSink {
	summary: Mutex<Summary>,
}

impl ConsoleSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn summary(&self) -> Summary {
		*self.summary.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn stop_requested(&self) -> bool {
		self.summary().stop_requested
	}
}

impl RunSink for ConsoleSink {
	fn result(&self, record: TestResultRecord) {
		if record.outcome == TestOutcome::Info {
			tracing::info!(target = "hostrun.adapter", run_id = %record.run_id, "{}", record.message);
			return;
		}

		let label = format!("{:>13}", record.outcome.to_string());
		let label = match record.outcome {
			TestOutcome::Passed => label.green().bold(),
			TestOutcome::Inconclusive | TestOutcome::NotRunnable => label.yellow().bold(),
			_ => label.red().bold(),
		};
		match &record.test {
			Some(test) => println!("{label} {} {}", test.name.bold(), record.message.dimmed()),
			None => println!("{label} {}", record.message),
		}
		if let Some(fault) = &record.fault {
			println!("{:>13} {}", "", fault.dimmed());
		}

		let mut summary = self.summary.lock().unwrap_or_else(|e| e.into_inner());
		if record.test.is_some() {
			if record.outcome.is_success() {
				summary.passed += 1;
			} else {
				summary.not_passed += 1;
			}
		}
	}

	fn request_stop(&self, run_id: &str) {
		tracing::warn!(target = "hostrun.adapter", run_id, "stopping run after fatal failure");
		self.summary.lock().unwrap_or_else(|e| e.into_inner()).stop_requested = true;
	}
}

pub fn print_summary(summary: &Summary) {
	let line = format!("{} passed, {} not passed", summary.passed, summary.not_passed);
	if summary.all_passed() {
		println!("{}", line.green());
	} else {
		println!("{}", line.red());
	}
}

pub fn print_error(err: &CliError) {
	eprintln!("{} {err}", "error:".red().bold());
	let mut source = std::error::Error::source(err);
	while let Some(cause) = source {
		eprintln!("  caused by: {cause}");
		source = cause.source();
	}
}
