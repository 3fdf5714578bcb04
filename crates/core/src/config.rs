//! Launch configuration resolution.
//!
//! Settings are plain key/value pairs attached to the run and to individual
//! tests. A test-level value overrides the run-level one.

use std::path::PathBuf;
use std::time::Duration;

use hostrun_protocol::Settings;

use crate::error::{Error, Result};
use crate::key::SessionKey;
use crate::version::HostVersion;

pub const APPLICATION: &str = "host.application";
pub const EXECUTABLE: &str = "host.executable";
pub const VERSION: &str = "host.version";
pub const VARIANT: &str = "host.variant";
/// Launch timeout in whole seconds.
pub const LAUNCH_TIMEOUT: &str = "host.launch_timeout";
pub const DEBUG_MIXED_MODE: &str = "host.debug_mixed_mode";

pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to bring up a session for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
	pub key: SessionKey,
	pub launch_timeout: Duration,
	pub debug_mixed_mode: bool,
}

/// Resolves test-level settings layered over run-level settings.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] naming every missing required
/// field. The mock application does not require an executable.
pub fn resolve(test: Option<&Settings>, run: &Settings) -> Result<ResolvedConfig> {
	let lookup = |name: &str| {
		test.and_then(|settings| settings.get(name))
			.or_else(|| run.get(name))
			.map(|value| value.trim())
			.filter(|value| !value.is_empty())
	};

	let application = lookup(APPLICATION);
	let executable = lookup(EXECUTABLE);
	let is_mock = application.is_some_and(|app| app.eq_ignore_ascii_case(crate::key::MOCK_APPLICATION));

	let mut missing = Vec::new();
	if application.is_none() {
		missing.push("application");
	}
	if executable.is_none() && !is_mock {
		missing.push("executable");
	}
	let Some(application) = application else {
		return Err(Error::InvalidConfiguration { missing });
	};
	if !missing.is_empty() {
		return Err(Error::InvalidConfiguration { missing });
	}

	let mut key = SessionKey::new(application, executable.map(normalize_executable).unwrap_or_default())
		.with_version(parse_version(lookup(VERSION)));
	if let Some(variant) = lookup(VARIANT) {
		key = key.with_variant(variant);
	}

	Ok(ResolvedConfig {
		key,
		launch_timeout: parse_launch_timeout(lookup(LAUNCH_TIMEOUT)),
		debug_mixed_mode: lookup(DEBUG_MIXED_MODE).is_some_and(parse_flag),
	})
}

/// Appends `.exe` to an executable named without an extension.
pub fn normalize_executable(raw: &str) -> PathBuf {
	let mut path = PathBuf::from(raw);
	if path.extension().is_none() {
		path.set_extension("exe");
	}
	path
}

fn parse_version(raw: Option<&str>) -> HostVersion {
	let Some(raw) = raw else {
		return HostVersion::build_default();
	};
	raw.parse().unwrap_or_else(|err| {
		let fallback = HostVersion::build_default();
		tracing::warn!(target = "hostrun.config", error = %err, %fallback, "using default host version");
		fallback
	})
}

fn parse_launch_timeout(raw: Option<&str>) -> Duration {
	match raw.map(str::parse::<u64>) {
		None => DEFAULT_LAUNCH_TIMEOUT,
		Some(Ok(0)) | Some(Err(_)) => {
			tracing::warn!(
				target = "hostrun.config",
				value = raw,
				default_secs = DEFAULT_LAUNCH_TIMEOUT.as_secs(),
				"ignoring invalid launch timeout"
			);
			DEFAULT_LAUNCH_TIMEOUT
		}
		Some(Ok(secs)) => Duration::from_secs(secs),
	}
}

fn parse_flag(raw: &str) -> bool {
	matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
