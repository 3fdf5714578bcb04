//! Run and test data carried across the call channel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key/value settings attached to a run or a single test.
pub type Settings = BTreeMap<String, String>;

/// Run-wide context handed to `initialize` and `preTestRunFinished`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
	/// Identifier of the test run, echoed on every reported record.
	pub run_id: String,
	/// Run-level defaults for host configuration.
	#[serde(default)]
	pub settings: Settings,
	/// Whether the driving process runs under a debugger.
	#[serde(default)]
	pub debugging: bool,
}

impl RunContext {
	pub fn new(run_id: impl Into<String>) -> Self {
		Self {
			run_id: run_id.into(),
			..Self::default()
		}
	}

	/// Adds a run-level setting.
	pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.settings.insert(key.into(), value.into());
		self
	}
}

/// A single test as seen by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestElement {
	pub id: String,
	pub name: String,
	/// Test-level settings; these override run-level defaults.
	#[serde(default)]
	pub settings: Settings,
}

impl TestElement {
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			settings: Settings::new(),
		}
	}

	/// Adds a test-level setting.
	pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.settings.insert(key.into(), value.into());
		self
	}
}

/// Per-call test context passed along with `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestContext {
	/// Directory the test should treat as its working directory, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub deployment_dir: Option<String>,
	#[serde(default)]
	pub properties: Settings,
}

/// Parameters of a `run` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
	pub run_id: String,
	pub test: TestElement,
	pub context: TestContext,
}

/// Final outcome of a test or run-scoped message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestOutcome {
	Passed,
	Failed,
	Inconclusive,
	Aborted,
	Timeout,
	/// The test could not be run at all (no host available).
	NotRunnable,
	Error,
	/// Informational message with no verdict.
	Info,
}

impl TestOutcome {
	pub fn is_success(self) -> bool {
		matches!(self, TestOutcome::Passed)
	}
}

impl std::fmt::Display for TestOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			TestOutcome::Passed => "passed",
			TestOutcome::Failed => "failed",
			TestOutcome::Inconclusive => "inconclusive",
			TestOutcome::Aborted => "aborted",
			TestOutcome::Timeout => "timeout",
			TestOutcome::NotRunnable => "not-runnable",
			TestOutcome::Error => "error",
			TestOutcome::Info => "info",
		};
		f.write_str(s)
	}
}

impl std::str::FromStr for TestOutcome {
	type Err = String;

	/// Parses the names produced by `Display`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s.trim().to_ascii_lowercase().as_str() {
			"passed" => TestOutcome::Passed,
			"failed" => TestOutcome::Failed,
			"inconclusive" => TestOutcome::Inconclusive,
			"aborted" => TestOutcome::Aborted,
			"timeout" => TestOutcome::Timeout,
			"not-runnable" => TestOutcome::NotRunnable,
			"error" => TestOutcome::Error,
			"info" => TestOutcome::Info,
			other => return Err(format!("unknown outcome '{other}'")),
		})
	}
}

/// Result returned by a host for a `run` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReply {
	pub outcome: TestOutcome,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

/// Record delivered to the reporting sink.
///
/// `test` is absent for run-scoped messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultRecord {
	pub run_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub test: Option<TestElement>,
	pub message: String,
	pub outcome: TestOutcome,
	/// Underlying fault text; only populated in diagnostic builds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fault: Option<String>,
}
