use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("no tests to run; pass --test or list tests in the run file")]
	NoTests,

	#[error("invalid setting '{0}': expected KEY=VALUE")]
	InvalidSetting(String),

	#[error(transparent)]
	Adapter(#[from] hostrun::Error),

	#[error(transparent)]
	Runtime(#[from] hostrun::runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}
