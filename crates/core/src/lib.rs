//! hostrun: run tests inside a separate host process.
//!
//! The coordinator keeps one host session matched to the requested
//! configuration, routes test-lifecycle calls to it, and turns host and
//! channel failures into reported results.
//!
//! - [`TestAdapter`]: lifecycle surface (`initialize`, `run`, `abort`, ...)
//! - [`CallDispatcher`]: retry, reconnect and error translation per call
//! - [`SessionManager`]: owns zero or one [`HostSession`]
//! - [`config::resolve`]: settings to [`SessionKey`] and launch options
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use hostrun::{CallDispatcher, RecordingSink, SessionManager, TestAdapter};
//! use hostrun::protocol::{RunContext, TestContext, TestElement};
//! use hostrun::runtime::ProcessLauncher;
//!
//! let sink = Arc::new(RecordingSink::new());
//! let sessions = SessionManager::new(Arc::new(ProcessLauncher::new()));
//! let adapter = TestAdapter::new(CallDispatcher::new(sessions, sink.clone()));
//!
//! adapter.initialize(RunContext::new("run-1").with_setting("host.application", "mock"))?;
//! adapter.run(&TestElement::new("t1", "smoke"), &TestContext::default()).await?;
//! adapter.cleanup().await?;
//! ```

pub mod adapter;
pub mod config;
pub mod debugger;
pub mod dispatch;
pub mod error;
pub mod key;
pub mod manager;
pub mod mock;
pub mod report;
pub mod session;
pub mod version;

pub use adapter::{AdapterState, TestAdapter};
pub use config::ResolvedConfig;
pub use debugger::{DebuggerAttach, NoDebugger};
pub use dispatch::{CallContext, CallDispatcher, CallFailure, FailureKind, RetryPolicy};
pub use error::{Error, Result};
pub use key::{MOCK_APPLICATION, SessionKey};
pub use manager::{Connected, Liveness, SessionManager, SessionSource, StandInFactory};
pub use mock::{InProcessHost, MockProxy};
pub use report::{ProgressSink, RecordingSink, Reporter, RunSink, TracingSink};
pub use session::HostSession;
pub use version::HostVersion;

pub use hostrun_protocol as protocol;
pub use hostrun_runtime as runtime;
