//! Host-side plumbing for hostrun.
//!
//! This crate owns everything below the session layer:
//!
//! - [`HostLauncher`] / [`ProcessLauncher`]: start a host and learn its endpoint
//! - [`HostProcess`]: a launched host that can be shut down or killed
//! - [`Connection`]: request/response correlation over a [`PipeTransport`]
//! - [`RemoteProxy`]: the typed call surface a session talks to
//! - [`serve`]: the host-side loop, for hosts written in Rust

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod launcher;
pub mod locate;
pub mod peer;
pub mod process;
pub mod proxy;
pub mod transport;

pub use connection::Connection;
pub use endpoint::{Endpoint, await_listen_line, parse_listen_line};
pub use error::{Error, Result};
pub use launcher::{HostLauncher, LaunchSpec, LaunchedHost, ProcessLauncher};
pub use locate::{HOST_PATH_ENV, locate_executable};
pub use peer::{HostHandler, serve};
pub use process::{ChildHost, HostProcess};
pub use proxy::{ConnectionProxy, RemoteProxy};
pub use transport::{PipeTransport, read_frame, write_frame};
