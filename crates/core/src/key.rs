//! Session identity.

use std::fmt;
use std::path::PathBuf;

use hostrun_runtime::LaunchSpec;

use crate::version::HostVersion;

/// Application kind served by an in-process stand-in instead of a launched host.
pub const MOCK_APPLICATION: &str = "mock";

/// Identifies a requestable host configuration.
///
/// Two equal keys may share a session; unequal keys force the current
/// session to be closed and a new one launched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
	pub application: String,
	pub executable: PathBuf,
	pub version: HostVersion,
	/// Side-by-side configuration of the host (profile, hive), if any.
	pub variant: Option<String>,
}

impl SessionKey {
	pub fn new(application: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
		Self {
			application: application.into(),
			executable: executable.into(),
			version: HostVersion::build_default(),
			variant: None,
		}
	}

	/// Key for the in-process stand-in host.
	pub fn mock() -> Self {
		Self::new(MOCK_APPLICATION, PathBuf::new())
	}

	pub fn with_version(mut self, version: HostVersion) -> Self {
		self.version = version;
		self
	}

	pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
		self.variant = Some(variant.into());
		self
	}

	pub fn is_mock(&self) -> bool {
		self.application.eq_ignore_ascii_case(MOCK_APPLICATION)
	}

	pub fn to_launch_spec(&self) -> LaunchSpec {
		LaunchSpec {
			application: self.application.clone(),
			executable: self.executable.clone(),
			version: self.version.to_string(),
			variant: self.variant.clone(),
		}
	}
}

impl fmt::Display for SessionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.application, self.version)?;
		if let Some(variant) = &self.variant {
			write!(f, " [{variant}]")?;
		}
		if !self.executable.as_os_str().is_empty() {
			write!(f, " ({})", self.executable.display())?;
		}
		Ok(())
	}
}
