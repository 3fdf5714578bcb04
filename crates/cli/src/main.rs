mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod run_file;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match commands::dispatch(cli).await {
		Ok(code) => code,
		Err(err) => {
			output::print_error(&err);
			ExitCode::from(2)
		}
	}
}
