//! End-to-end tests driving the `hostrun` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn hostrun_binary() -> PathBuf {
	PathBuf::from(env!("CARGO_BIN_EXE_hostrun"))
}

fn hostrun(args: &[&str]) -> Output {
	Command::new(hostrun_binary())
		.args(args)
		.env("NO_COLOR", "1")
		.env_remove("RUST_LOG")
		.env_remove("HOSTRUN_HOST_PATH")
		.output()
		.expect("failed to execute hostrun")
}

fn stdout(output: &Output) -> String {
	String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_run_file(dir: &Path, body: serde_json::Value) -> PathBuf {
	let path = dir.join("run.json");
	std::fs::write(&path, body.to_string()).unwrap();
	path
}

#[test]
fn mock_run_passes_every_test() {
	let output = hostrun(&["run", "--app", "mock", "--test", "first", "--test", "second"]);

	let out = stdout(&output);
	assert!(output.status.success(), "stdout: {out}\nstderr: {}", stderr(&output));
	let verdicts: Vec<_> = out.lines().filter(|line| line.trim_start().starts_with("passed")).collect();
	assert_eq!(verdicts.len(), 2, "{out}");
	assert!(out.contains("2 passed, 0 not passed"), "{out}");
}

#[test]
fn failing_test_from_run_file_fails_the_process() {
	let dir = tempfile::tempdir().unwrap();
	let run_file = write_run_file(
		dir.path(),
		serde_json::json!({
			"runId": "nightly",
			"settings": { "host.application": "mock" },
			"tests": [
				{ "name": "smoke" },
				{ "name": "regression", "settings": { "mock.outcome": "failed" } }
			]
		}),
	);

	let output = hostrun(&["run", "--run-file", run_file.to_str().unwrap()]);

	let out = stdout(&output);
	assert_eq!(output.status.code(), Some(1), "{out}");
	assert!(out.contains("regression"), "{out}");
	assert!(out.contains("1 passed, 1 not passed"), "{out}");
}

#[test]
fn missing_host_configuration_stops_the_run() {
	let output = hostrun(&["run", "--test", "a", "--test", "b"]);

	let out = stdout(&output);
	assert_eq!(output.status.code(), Some(1), "{out}");
	assert!(out.contains("missing application, executable"), "{out}");
	// The run stops after the first fatal failure.
	assert!(!out.contains(" b "), "{out}");
}

#[test]
fn missing_host_executable_is_reported() {
	let dir = tempfile::tempdir().unwrap();
	let exe = dir.path().join("absent-host");

	let output = hostrun(&["run", "--app", "devenv", "--exe", exe.to_str().unwrap(), "--test", "a"]);

	let out = stdout(&output);
	assert_eq!(output.status.code(), Some(1), "{out}");
	assert!(out.contains("host executable not found"), "{out}");
	assert!(out.contains("absent-host.exe"), "{out}");
}

#[test]
fn run_without_tests_is_a_usage_error() {
	let output = hostrun(&["run", "--app", "mock"]);

	assert_eq!(output.status.code(), Some(2));
	assert!(stderr(&output).contains("no tests to run"), "{}", stderr(&output));
}

#[cfg(unix)]
#[test]
fn launched_host_process_serves_the_run() {
	let dir = tempfile::tempdir().unwrap();
	// Executables named without an extension get `.exe` appended.
	let host = dir.path().join("standin.exe");
	std::os::unix::fs::symlink(hostrun_binary(), &host).unwrap();
	let exe = dir.path().join("standin");

	let output = hostrun(&[
		"run",
		"--app",
		"standin",
		"--exe",
		exe.to_str().unwrap(),
		"--launch-timeout",
		"20",
		"--host-arg",
		"host",
		"--test",
		"one",
		"--test",
		"two",
	]);

	let out = stdout(&output);
	assert!(output.status.success(), "stdout: {out}\nstderr: {}", stderr(&output));
	assert!(out.contains("2 passed, 0 not passed"), "{out}");
	assert!(out.contains("on stand-in host"), "{out}");
}
