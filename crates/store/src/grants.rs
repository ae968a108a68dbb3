//! The delegation grant table and permission derivation.
//!
//! Every delegation assertion `(variable, owner, right, receiver)` means:
//! the receiver holds `right` on `variable` whenever the owner does. For a
//! fixed variable and right the assertions form a directed graph, and a
//! principal holds the right iff it is reachable from `admin` in that graph.
//! An assertion whose receiver is `anyone` fans out to every principal.
//!
//! Assertions are stored as `variable → receiver → right → set[owner]` so
//! that permission derivation can look up candidate owners in O(1) while it
//! walks the graph backwards from the queried principal toward `admin`.
//!
//! A variable gets a (possibly empty) table entry the moment it is created;
//! the entry set doubles as the domain the `all` shorthand expands over.

use std::collections::{HashMap, HashSet};

use warden_core::Right;

use crate::{ADMIN, ANYONE};

/// Owners a receiver derives each right from, for one variable.
type VarGrants = HashMap<String, HashMap<Right, HashSet<String>>>;

/// All delegation assertions, indexed by variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantTable {
    by_var: HashMap<String, VarGrants>,
}

impl GrantTable {
    /// Create an empty table.
    pub fn new() -> Self {
        GrantTable::default()
    }

    /// Ensure a variable has a table entry. Called when a variable is
    /// created; the entry is what `all` expansion iterates over.
    pub fn register_variable(&mut self, variable: &str) {
        self.by_var.entry(variable.to_string()).or_default();
    }

    /// Install the assertion `(variable, owner, right, receiver)`.
    pub fn insert(&mut self, variable: &str, owner: &str, right: Right, receiver: &str) {
        self.by_var
            .entry(variable.to_string())
            .or_default()
            .entry(receiver.to_string())
            .or_default()
            .entry(right)
            .or_default()
            .insert(owner.to_string());
    }

    /// Revoke the assertion `(variable, owner, right, receiver)`.
    /// Revoking an assertion that was never installed is a no-op.
    pub fn remove(&mut self, variable: &str, owner: &str, right: Right, receiver: &str) {
        if let Some(owners) = self
            .by_var
            .get_mut(variable)
            .and_then(|grants| grants.get_mut(receiver))
            .and_then(|rights| rights.get_mut(&right))
        {
            owners.remove(owner);
        }
    }

    /// Every variable the table knows about, including variables with no
    /// assertions yet.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.by_var.keys().map(String::as_str)
    }

    /// Derive whether `principal` holds `right` on `variable`.
    ///
    /// Walks owner edges backwards from `principal`, treating `anyone`
    /// grants as applying to every node, until `admin` is found or the
    /// reachable set is exhausted. The visited set makes cycles among
    /// non-admin principals terminate with `false`.
    pub fn has_path(&self, variable: &str, principal: &str, right: Right) -> bool {
        if principal == ADMIN {
            return true;
        }
        let Some(grants) = self.by_var.get(variable) else {
            return false;
        };
        let mut visited: HashSet<&str> = HashSet::new();
        let mut frontier: Vec<&str> = vec![principal];
        while let Some(current) = frontier.pop() {
            if !visited.insert(current) {
                continue;
            }
            for receiver in [current, ANYONE] {
                let Some(owners) = grants.get(receiver).and_then(|rights| rights.get(&right))
                else {
                    continue;
                };
                for owner in owners {
                    if owner == ADMIN {
                        return true;
                    }
                    frontier.push(owner);
                }
            }
        }
        false
    }
}
