//! Wire types for the webrc remote-control protocol.
//!
//! This crate contains the serde-serializable shapes exchanged between a
//! test client, the command server, and the polling agent that runs inside
//! the browser:
//!
//! 1. A caller submits a [`RemoteCommand`] for a session and blocks for a
//!    [`Response`]
//! 2. The agent polls with an [`AgentPoll`] and receives either a real
//!    command or the retry no-op
//! 3. The agent posts its result back, which becomes the caller's response
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization and small accessors
//! - **Weakly typed on input**: Unknown fields are ignored so older and
//!   newer peers interoperate
//! - **Stable**: Changes only when the wire protocol changes

pub mod command;
pub mod element;
pub mod error_payload;
pub mod response;
pub mod session;

pub use command::*;
pub use element::*;
pub use error_payload::*;
pub use response::*;
pub use session::*;
