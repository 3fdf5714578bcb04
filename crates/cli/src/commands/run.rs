use std::process::ExitCode;
use std::sync::Arc;

use hostrun::protocol::{RunContext, TestContext, TestElement};
use hostrun::runtime::ProcessLauncher;
use hostrun::{CallDispatcher, SessionManager, TestAdapter, config};

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::output::{ConsoleSink, print_summary};
use crate::run_file::{self, RunFile, RunFileTest};

pub async fn execute(args: RunArgs) -> Result<ExitCode> {
	let (run, tests) = plan(&args)?;

	let launcher = args.host_args.iter().fold(ProcessLauncher::new(), |launcher, arg| launcher.arg(arg));
	let sink = Arc::new(ConsoleSink::new());
	let adapter = TestAdapter::new(CallDispatcher::new(SessionManager::new(Arc::new(launcher)), sink.clone()));

	tracing::info!(target = "hostrun.adapter", run_id = %run.run_id, tests = tests.len(), "starting run");
	adapter.initialize(run.clone())?;
	for test in &tests {
		if sink.stop_requested() {
			break;
		}
		adapter.run(test, &TestContext::default()).await?;
	}
	adapter.pre_test_run_finished(&run).await?;
	adapter.cleanup().await?;

	let summary = sink.summary();
	print_summary(&summary);
	Ok(if summary.all_passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Builds the run context and test list from the run file and flags.
fn plan(args: &RunArgs) -> Result<(RunContext, Vec<TestElement>)> {
	let file = match &args.run_file {
		Some(path) => run_file::load(path)?,
		None => RunFile::default(),
	};

	let mut run = RunContext::new(file.run_id.unwrap_or_else(|| "hostrun".to_string()));
	run.settings = file.settings;
	for raw in &args.settings {
		let (key, value) = raw.split_once('=').ok_or_else(|| CliError::InvalidSetting(raw.clone()))?;
		run.settings.insert(key.trim().to_string(), value.trim().to_string());
	}
	let flags = [
		(config::APPLICATION, args.application.clone()),
		(config::EXECUTABLE, args.executable.clone()),
		(config::VERSION, args.host_version.clone()),
		(config::VARIANT, args.variant.clone()),
		(config::LAUNCH_TIMEOUT, args.launch_timeout.map(|secs| secs.to_string())),
	];
	for (key, value) in flags {
		if let Some(value) = value {
			run.settings.insert(key.to_string(), value);
		}
	}

	let mut tests: Vec<TestElement> = file.tests.into_iter().map(RunFileTest::into_element).collect();
	tests.extend(args.tests.iter().map(|name| TestElement::new(name.as_str(), name.as_str())));
	if tests.is_empty() {
		return Err(CliError::NoTests);
	}

	Ok((run, tests))
}
