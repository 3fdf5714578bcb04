use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hostrun")]
#[command(about = "Run tests inside a separate host process")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run tests against a host, launching it as needed
	Run(RunArgs),

	/// Act as a host: serve the stand-in call surface over TCP
	///
	/// Prints the listen line on stdout and exits when stdin closes.
	Host(HostArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
	/// JSON run file with run id, settings and tests
	#[arg(long, value_name = "FILE")]
	pub run_file: Option<PathBuf>,

	/// Host application kind ("mock" runs in-process)
	#[arg(long = "app", value_name = "KIND")]
	pub application: Option<String>,

	/// Host executable; `.exe` is appended when it has no extension
	#[arg(long = "exe", value_name = "PATH")]
	pub executable: Option<String>,

	#[arg(long, value_name = "VERSION")]
	pub host_version: Option<String>,

	/// Side-by-side host configuration (profile, hive)
	#[arg(long, value_name = "NAME")]
	pub variant: Option<String>,

	/// Seconds to wait for the host to come up
	#[arg(long, value_name = "SECS")]
	pub launch_timeout: Option<u64>,

	/// Extra run setting (repeatable)
	#[arg(long = "set", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
	pub settings: Vec<String>,

	/// Argument passed to every launched host (repeatable)
	#[arg(long = "host-arg", value_name = "ARG", action = clap::ArgAction::Append, allow_hyphen_values = true)]
	pub host_args: Vec<String>,

	/// Test to run (repeatable); added after tests from the run file
	#[arg(long = "test", value_name = "NAME", action = clap::ArgAction::Append)]
	pub tests: Vec<String>,
}

#[derive(Args, Debug)]
pub struct HostArgs {
	/// Address to listen on
	#[arg(long, default_value = "127.0.0.1:0", value_name = "ADDR")]
	pub listen: String,
}

fn help_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default().bold())
		.usage(AnsiColor::Yellow.on_default().bold())
		.literal(AnsiColor::Green.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
}
