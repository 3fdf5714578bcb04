//! Host executable lookup.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable that replaces the configured host executable.
pub const HOST_PATH_ENV: &str = "HOSTRUN_HOST_PATH";

/// Resolves the executable a host is launched from.
///
/// Search order:
/// 1. `HOSTRUN_HOST_PATH`, when set and pointing at an existing file
/// 2. `executable` itself, when it is absolute or contains a directory
/// 3. `executable` looked up on `PATH`
///
/// # Errors
///
/// Returns [`Error::HostNotFound`] when none of the candidates exist.
pub fn locate_executable(executable: &Path) -> Result<PathBuf> {
	let override_path = std::env::var_os(HOST_PATH_ENV).map(PathBuf::from);
	locate_with_override(executable, override_path)
}

fn locate_with_override(executable: &Path, override_path: Option<PathBuf>) -> Result<PathBuf> {
	if let Some(path) = override_path {
		if path.is_file() {
			tracing::debug!(target = "hostrun.runtime", path = %path.display(), "using {HOST_PATH_ENV}");
			return Ok(path);
		}
		tracing::warn!(
			target = "hostrun.runtime",
			path = %path.display(),
			"{HOST_PATH_ENV} does not point at a file; ignoring"
		);
	}

	if executable.is_absolute() || executable.components().count() > 1 {
		return if executable.is_file() {
			Ok(executable.to_path_buf())
		} else {
			Err(Error::HostNotFound(executable.to_path_buf()))
		};
	}

	which::which(executable).map_err(|_| Error::HostNotFound(executable.to_path_buf()))
}
