//! The global store.
//!
//! One `Store` exists per server process. All connections share it; the
//! single `RwLock` is held for reading while a transaction snapshots state
//! at authentication, and for writing for the duration of a commit. That
//! makes commits totally ordered, and gives every transaction a consistent
//! point-in-time view: a reader that began before a commit sees the
//! pre-commit state plus its own buffered writes, never a mix.
//!
//! The snapshot is a deep clone. That is O(data) per connection, which is
//! acceptable here: programs are bounded at one megabyte and variables live
//! only as long as the process.

use std::collections::HashMap;

use parking_lot::RwLock;
use rand::Rng;

use warden_core::{Error, Result, Value};

use crate::grants::GrantTable;
use crate::txn::Txn;
use crate::{ADMIN, ANYONE};

/// Shared mutable server state: users, global variables, grant table, and
/// the default delegator.
#[derive(Debug)]
pub struct Store {
    pub(crate) state: RwLock<State>,
}

#[derive(Debug)]
pub(crate) struct State {
    pub(crate) users: HashMap<String, String>,
    pub(crate) vars: HashMap<String, Value>,
    pub(crate) grants: GrantTable,
    pub(crate) default_delegator: String,
}

/// A consistent copy of the committed users and variables, taken under the
/// read lock at authentication time.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) users: HashMap<String, String>,
    pub(crate) vars: HashMap<String, Value>,
}

impl Store {
    /// Create a store preconfigured with `admin` (using the given password)
    /// and `anyone` (using a random password, so it cannot authenticate by
    /// accident).
    pub fn new(admin_password: &str) -> Self {
        let users = HashMap::from([
            (ADMIN.to_string(), admin_password.to_string()),
            (ANYONE.to_string(), random_password()),
        ]);
        Store {
            state: RwLock::new(State {
                users,
                vars: HashMap::new(),
                grants: GrantTable::new(),
                default_delegator: ANYONE.to_string(),
            }),
        }
    }

    /// Authenticate `principal` and open a transaction over a snapshot of
    /// the current committed state.
    ///
    /// Fails with the unknown-principal error if `principal` does not
    /// exist, and the wrong-password error (a security violation) if it
    /// does but the password mismatches.
    pub fn begin(&self, principal: &str, password: &str) -> Result<Txn<'_>> {
        let state = self.state.read();
        let stored = state.users.get(principal).ok_or_else(|| Error::UnknownPrincipal {
            name: principal.to_string(),
        })?;
        if stored != password {
            return Err(Error::WrongPassword {
                name: principal.to_string(),
            });
        }
        let snapshot = Snapshot {
            users: state.users.clone(),
            vars: state.vars.clone(),
        };
        let grants = state.grants.clone();
        let default_delegator = state.default_delegator.clone();
        drop(state);
        Ok(Txn::new(
            self,
            principal.to_string(),
            snapshot,
            grants,
            default_delegator,
        ))
    }

    #[cfg(test)]
    pub(crate) fn committed_var(&self, name: &str) -> Option<Value> {
        self.state.read().vars.get(name).cloned()
    }
}

fn random_password() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_!,.?";
    let mut rng = rand::rng();
    (0..20)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
