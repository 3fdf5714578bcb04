//! Host version numbers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// `major.minor.patch` version of a host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostVersion {
	pub major: u32,
	pub minor: u32,
	pub patch: u32,
}

/// Fallback when no build-time default is configured.
const FALLBACK_VERSION: HostVersion = HostVersion::new(1, 0, 0);

impl HostVersion {
	pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
		Self { major, minor, patch }
	}

	/// Version used when configuration does not name one or names an
	/// unparsable one.
	///
	/// Set `HOSTRUN_DEFAULT_HOST_VERSION` at build time to change it.
	pub fn build_default() -> Self {
		option_env!("HOSTRUN_DEFAULT_HOST_VERSION")
			.and_then(|raw| raw.parse().ok())
			.unwrap_or(FALLBACK_VERSION)
	}
}

impl Default for HostVersion {
	fn default() -> Self {
		Self::build_default()
	}
}

impl fmt::Display for HostVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid host version '{0}'")]
pub struct ParseVersionError(String);

impl FromStr for HostVersion {
	type Err = ParseVersionError;

	/// Accepts `major`, `major.minor` or `major.minor.patch`, optionally
	/// followed by a build revision (`17.0.31903.59`). The revision must be
	/// numeric but is not kept, so hosts differing only in revision share a
	/// session key.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = || ParseVersionError(s.to_string());
		let trimmed = s.trim();
		if trimmed.is_empty() {
			return Err(invalid());
		}

		let mut parts = [0u32; 4];
		let mut count = 0;
		for part in trimmed.split('.') {
			if count == parts.len() {
				return Err(invalid());
			}
			parts[count] = part.parse().map_err(|_| invalid())?;
			count += 1;
		}

		Ok(Self::new(parts[0], parts[1], parts[2]))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_partial_versions() {
		assert_eq!("17".parse::<HostVersion>().unwrap(), HostVersion::new(17, 0, 0));
		assert_eq!("17.4".parse::<HostVersion>().unwrap(), HostVersion::new(17, 4, 0));
		assert_eq!(" 17.4.2 ".parse::<HostVersion>().unwrap(), HostVersion::new(17, 4, 2));
	}

	#[test]
	fn build_revision_is_accepted_and_dropped() {
		assert_eq!("17.0.31903.59".parse::<HostVersion>().unwrap(), HostVersion::new(17, 0, 31903));
		assert_eq!(
			"17.0.31903.59".parse::<HostVersion>().unwrap(),
			"17.0.31903.60".parse::<HostVersion>().unwrap()
		);
	}

	#[test]
	fn rejects_garbage() {
		for raw in ["", "abc", "1.2.3.4.5", "17.0.31903.x", "1..2", "1.x", "-1"] {
			assert!(raw.parse::<HostVersion>().is_err(), "{raw:?} should not parse");
		}
	}

	#[test]
	fn orders_numerically() {
		assert!(HostVersion::new(1, 10, 0) > HostVersion::new(1, 9, 9));
		assert_eq!(HostVersion::new(16, 0, 3).to_string(), "16.0.3");
	}
}
