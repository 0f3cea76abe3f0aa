//! Caller-facing API for the webrc remote-control harness.
//!
//! A caller issues commands for a browser session and blocks for results;
//! an agent inside the browser polls for those commands and posts results
//! back. This crate sits on the caller side of that exchange:
//!
//! - [`codec`]: converts [`Native`] values to and from the portable trees
//!   carried in commands and responses
//! - [`error_handler`]: maps status codes to [`ErrorKind`]s and rebuilds
//!   remote failures, stack frames and screenshots included
//! - [`RemoteSession`]: ties both to a session's command queue
//!
//! The queue, registry, and handle table live in [`webrc_runtime`]; wire
//! shapes live in [`webrc_protocol`]. Both are re-exported.

pub mod codec;
pub mod error;
pub mod error_handler;
mod session;

pub use codec::{Decode, Native, Structured, decode, encode, from_text};
pub use error::{CodecError, Error, Result};
pub use error_handler::{CommandError, ErrorCause, ErrorHandler, ErrorKind};
pub use session::RemoteSession;
pub use {webrc_protocol as protocol, webrc_runtime as runtime};
