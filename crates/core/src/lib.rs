//! Core types for the warden policy store.
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: the three-variant value model (string, list, flat record)
//! - Right: the four delegable rights
//! - Error: the unified failure type, classified onto the two wire statuses
//! - StatusCode: the frozen set of wire status codes
//! - Limits: protocol size limits enforced at the edges

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod right;
pub mod status;
pub mod value;

pub use error::{Error, Result};
pub use right::Right;
pub use status::StatusCode;
pub use value::{flatten, Value};
