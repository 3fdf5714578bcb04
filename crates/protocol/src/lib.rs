//! Wire types for the hostrun call channel.
//!
//! This crate contains the serde-serializable types exchanged between the
//! coordinator and a test host process. They describe the shape of data on
//! the wire and nothing else:
//! - **Pure data**: no behavior beyond serialization and small accessors
//! - **Shared**: hosts written in Rust depend on this crate directly
//!
//! Session handling, retries and reporting live in the `hostrun` crate.

pub mod message;
pub mod types;

pub use message::*;
pub use types::*;
