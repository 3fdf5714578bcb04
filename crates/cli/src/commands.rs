mod host;
mod run;

use std::process::ExitCode;

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
	match cli.command {
		Commands::Run(args) => run::execute(args).await,
		Commands::Host(args) => host::execute(args).await.map(|()| ExitCode::SUCCESS),
	}
}
