//! Global store, transactional view, and delegation engine.
//!
//! The [`Store`] is the single shared, mutable state of the server: users,
//! global variables, the delegation grant table, and the default delegator,
//! behind one writer lock. A connection authenticates with [`Store::begin`]
//! and receives a [`Txn`]: a consistent snapshot plus buffers for every
//! mutation the program makes. Nothing a program does is visible to other
//! connections — or survives the connection — until [`Txn::commit`]
//! publishes the whole transaction at the `***` terminator. A dropped `Txn`
//! is a free abort.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod grants;
mod store;
mod txn;

pub use grants::GrantTable;
pub use store::Store;
pub use txn::{DelegationTarget, Txn};

/// The omnipotent preconfigured principal. Always exists, holds every right
/// on every variable, and is the root of every delegation chain.
pub const ADMIN: &str = "admin";

/// The wildcard preconfigured principal. A delegation whose receiver is
/// `anyone` grants the right to every principal; `anyone` itself carries no
/// inherent authority and its password is random at startup.
pub const ANYONE: &str = "anyone";
