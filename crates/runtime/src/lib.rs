//! Session plumbing for the webrc command server.
//!
//! A caller and a browser-side agent never talk directly. Each session owns
//! a [`CommandQueue`] built from two capacity-one [`CommandSlot`]s:
//!
//! ```text
//! caller --do_command--> [command slot] --get_next_command--> agent
//! caller <--get_result-- [result slot]  <--put_result-------- agent
//! ```
//!
//! The [`SessionRegistry`] maps ids to live [`Session`]s, and each session
//! carries a [`HandleTable`] issuing opaque ids for browser-resident
//! objects.

pub mod config;
pub mod error;
pub mod handles;
pub mod queue;
pub mod registry;
pub mod slot;

pub use config::{QueueConfig, RemoteControlConfig};
pub use error::{Error, Result};
pub use handles::{HandleTable, KnownElement, RemoteObject, unwrap_object};
pub use queue::{CommandQueue, QueueState};
pub use registry::{Session, SessionRegistry};
pub use slot::CommandSlot;
