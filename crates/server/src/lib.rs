//! Connection handling and interpretation for the warden server.
//!
//! The [`Handler`] drives one connection end to end: it authenticates the
//! first line, buffers the program body up to the `***` terminator, executes
//! the commands against a [`warden_store::Txn`], and emits one JSON reply
//! per line. It is generic over the line source and reply sink, so the TCP
//! binary and the tests drive the exact same code.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod config;
mod eval;
pub mod handler;
pub mod wire;

pub use handler::{Handler, Outcome};
