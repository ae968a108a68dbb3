//! The per-connection transactional view.
//!
//! A [`Txn`] is created by [`Store::begin`] and owns everything one program
//! touches: a snapshot of the committed users and variables, buffered user
//! and variable writes, program-lifetime locals, a deep copy of the grant
//! table, and a permission-result cache. Reads resolve locals first, then
//! buffered writes, then the snapshot, so a program always sees its own
//! effects; nothing escapes until [`Txn::commit`].
//!
//! Authorization checks happen here, before any mutation, and every check
//! is against the transaction's own grant table — the one the program has
//! been editing — not the committed one.

use std::collections::HashMap;

use tracing::debug;

use warden_core::{Error, Result, Right, Value};

use crate::grants::GrantTable;
use crate::store::{Snapshot, Store};
use crate::{ADMIN, ANYONE};

/// The variable slot of a delegation operation: one variable, or the `all`
/// shorthand expanding over every variable the owner can delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationTarget<'a> {
    /// Expand over every variable the owner currently holds `delegate` on.
    All,
    /// A single named variable.
    Var(&'a str),
}

/// An open transaction: one connection's authenticated, buffered view of
/// the store.
#[derive(Debug)]
pub struct Txn<'s> {
    store: &'s Store,
    principal: String,
    snapshot: Snapshot,
    pending_users: HashMap<String, String>,
    pending_vars: HashMap<String, Value>,
    locals: HashMap<String, Value>,
    grants: GrantTable,
    default_delegator: String,
    perm_cache: HashMap<(String, String, Right), bool>,
}

impl<'s> Txn<'s> {
    pub(crate) fn new(
        store: &'s Store,
        principal: String,
        snapshot: Snapshot,
        grants: GrantTable,
        default_delegator: String,
    ) -> Self {
        Txn {
            store,
            principal,
            snapshot,
            pending_users: HashMap::new(),
            pending_vars: HashMap::new(),
            locals: HashMap::new(),
            grants,
            default_delegator,
            perm_cache: HashMap::new(),
        }
    }

    /// The authenticated principal this transaction runs as.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Whether this transaction runs as admin.
    pub fn is_admin(&self) -> bool {
        self.principal == ADMIN
    }

    // =========================================================================
    // Principals
    // =========================================================================

    /// Create principal `name` with `password`. Admin only.
    ///
    /// When the default delegator is not `anyone`, the new principal
    /// inherits all four rights on every variable the delegator can
    /// currently delegate.
    pub fn create_principal(&mut self, name: &str, password: &str) -> Result<()> {
        if !self.is_admin() {
            return Err(Error::AdminOnly);
        }
        if self.user_exists(name) {
            return Err(Error::PrincipalExists { name: name.to_string() });
        }
        self.pending_users.insert(name.to_string(), password.to_string());
        if self.default_delegator != ANYONE {
            let delegator = self.default_delegator.clone();
            for right in Right::ALL {
                self.delegate_everything(&delegator, right, name, GrantOp::Insert);
            }
        }
        Ok(())
    }

    /// Change `name`'s password. Allowed for admin and for `name` itself;
    /// the authorization check runs before the existence check, so probing
    /// for foreign principals is a security violation, not a failure.
    pub fn change_password(&mut self, name: &str, password: &str) -> Result<()> {
        if !self.is_admin() && name != self.principal {
            return Err(Error::NotPrincipalSelf { name: name.to_string() });
        }
        if !self.user_exists(name) {
            return Err(Error::UnknownPrincipal { name: name.to_string() });
        }
        self.pending_users.insert(name.to_string(), password.to_string());
        Ok(())
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Set variable `name` to `value`.
    ///
    /// Writes an existing global (buffered or committed) only with the
    /// `write` right. Writes a local unconditionally. Creates a new global
    /// otherwise; a new global created by a non-admin delegates all four
    /// rights from admin to the creator.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        if self.global_var_exists(name) {
            self.require(name, Right::Write)?;
            self.pending_vars.insert(name.to_string(), value);
        } else if self.locals.contains_key(name) {
            self.locals.insert(name.to_string(), value);
        } else {
            self.pending_vars.insert(name.to_string(), value);
            self.grants.register_variable(name);
            if !self.is_admin() {
                let creator = self.principal.clone();
                for right in Right::ALL {
                    self.grants.insert(name, ADMIN, right, &creator);
                }
            }
            self.perm_cache.clear();
        }
        Ok(())
    }

    /// Create program-lifetime local `name`. Fails if `name` exists as any
    /// variable; needs no rights.
    pub fn set_local(&mut self, name: &str, value: Value) -> Result<()> {
        if self.var_exists(name) {
            return Err(Error::VariableExists { name: name.to_string() });
        }
        self.locals.insert(name.to_string(), value);
        Ok(())
    }

    /// Read variable `name`. Locals are always readable; globals require
    /// the `read` right.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        if self.global_var_exists(name) {
            self.require(name, Right::Read)?;
            let value = self
                .pending_vars
                .get(name)
                .or_else(|| self.snapshot.vars.get(name))
                .expect("checked global existence");
            return Ok(value.clone());
        }
        Err(Error::UnknownVariable { name: name.to_string() })
    }

    /// Append `value` as one element to list variable `name`. A value that
    /// is itself a list nests; flattening happens where the protocol says
    /// it does, not here. Globals require `write` or `append`.
    pub fn append_to(&mut self, name: &str, value: Value) -> Result<()> {
        if !self.var_exists(name) {
            return Err(Error::UnknownVariable { name: name.to_string() });
        }
        if let Some(local) = self.locals.get_mut(name) {
            match local {
                Value::List(items) => {
                    items.push(value);
                    return Ok(());
                }
                _ => return Err(Error::NotAList { name: name.to_string() }),
            }
        }
        if !self.has_permission(name, Right::Write) && !self.has_permission(name, Right::Append) {
            return Err(Error::PermissionDenied {
                principal: self.principal.clone(),
                variable: name.to_string(),
                right: Right::Append,
            });
        }
        let current = self
            .pending_vars
            .get(name)
            .or_else(|| self.snapshot.vars.get(name))
            .expect("checked existence");
        let mut items = match current {
            Value::List(items) => items.clone(),
            _ => return Err(Error::NotAList { name: name.to_string() }),
        };
        items.push(value);
        self.pending_vars.insert(name.to_string(), Value::List(items));
        Ok(())
    }

    // =========================================================================
    // Delegation
    // =========================================================================

    /// Set the default delegator to `name`. Admin only.
    pub fn set_default_delegator(&mut self, name: &str) -> Result<()> {
        if !self.is_admin() {
            return Err(Error::AdminOnly);
        }
        if !self.user_exists(name) {
            return Err(Error::UnknownPrincipal { name: name.to_string() });
        }
        self.default_delegator = name.to_string();
        Ok(())
    }

    /// The current default delegator.
    pub fn default_delegator(&self) -> &str {
        &self.default_delegator
    }

    /// Install a delegation: `owner` delegates `right` on `target` to
    /// `receiver`.
    ///
    /// Only admin or the owner may install it; a non-admin owner also needs
    /// `delegate` on the variable. With [`DelegationTarget::All`] the
    /// operation expands over every variable the owner can delegate.
    pub fn set_delegation(
        &mut self,
        target: DelegationTarget<'_>,
        owner: &str,
        right: Right,
        receiver: &str,
    ) -> Result<()> {
        if !self.is_admin() && self.principal != owner {
            return Err(Error::NotDelegationParty);
        }
        match target {
            DelegationTarget::All => {
                self.require_user(owner)?;
                self.require_user(receiver)?;
                self.delegate_everything(owner, right, receiver, GrantOp::Insert);
                Ok(())
            }
            DelegationTarget::Var(variable) => {
                if self.principal == owner && !self.has_permission(variable, Right::Delegate) {
                    return Err(Error::PermissionDenied {
                        principal: owner.to_string(),
                        variable: variable.to_string(),
                        right: Right::Delegate,
                    });
                }
                self.require_user(owner)?;
                self.require_user(receiver)?;
                if !self.global_var_exists(variable) {
                    return Err(Error::UnknownVariable { name: variable.to_string() });
                }
                self.grants.insert(variable, owner, right, receiver);
                self.perm_cache.clear();
                Ok(())
            }
        }
    }

    /// Revoke a delegation: `owner` stops delegating `right` on `target`
    /// to `receiver`.
    ///
    /// Admin's rights can never be revoked. Admin, the owner, and the
    /// receiver may revoke; a non-admin owner also needs `delegate` on the
    /// variable (the receiver needs nothing: any principal may always shed
    /// its own rights).
    pub fn delete_delegation(
        &mut self,
        target: DelegationTarget<'_>,
        owner: &str,
        right: Right,
        receiver: &str,
    ) -> Result<()> {
        if receiver == ADMIN {
            return Err(Error::CannotRevokeAdmin);
        }
        if !self.is_admin() && self.principal != owner && self.principal != receiver {
            return Err(Error::NotDelegationParty);
        }
        match target {
            DelegationTarget::All => {
                self.require_user(owner)?;
                self.require_user(receiver)?;
                self.delegate_everything(owner, right, receiver, GrantOp::Remove);
                Ok(())
            }
            DelegationTarget::Var(variable) => {
                if self.principal == owner && !self.has_permission(variable, Right::Delegate) {
                    return Err(Error::PermissionDenied {
                        principal: owner.to_string(),
                        variable: variable.to_string(),
                        right: Right::Delegate,
                    });
                }
                self.require_user(owner)?;
                self.require_user(receiver)?;
                self.grants.remove(variable, owner, right, receiver);
                self.perm_cache.clear();
                Ok(())
            }
        }
    }

    /// Derive whether the current principal holds `right` on `variable`,
    /// memoizing per `(variable, principal, right)`.
    pub fn has_permission(&mut self, variable: &str, right: Right) -> bool {
        let principal = self.principal.clone();
        self.permitted(variable, &principal, right)
    }

    /// Derive whether an arbitrary principal holds `right` on `variable`.
    pub fn permitted(&mut self, variable: &str, principal: &str, right: Right) -> bool {
        if principal == ADMIN {
            return true;
        }
        let key = (variable.to_string(), principal.to_string(), right);
        if let Some(&hit) = self.perm_cache.get(&key) {
            return hit;
        }
        let granted = self.grants.has_path(variable, principal, right);
        self.perm_cache.insert(key, granted);
        granted
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Atomically publish this transaction into the global store: buffered
    /// users and variables merge in, the grant table and default delegator
    /// replace the committed ones. Locals are discarded.
    ///
    /// Dropping a `Txn` without calling this is the abort path; the global
    /// store is untouched.
    pub fn commit(self) {
        let Txn {
            store,
            principal,
            pending_users,
            pending_vars,
            grants,
            default_delegator,
            ..
        } = self;
        let mut state = store.state.write();
        debug!(
            principal = %principal,
            users = pending_users.len(),
            vars = pending_vars.len(),
            "committing transaction"
        );
        state.users.extend(pending_users);
        state.vars.extend(pending_vars);
        state.grants = grants;
        state.default_delegator = default_delegator;
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Whether `name` exists as a buffered or committed global variable.
    pub fn global_var_exists(&self, name: &str) -> bool {
        self.pending_vars.contains_key(name) || self.snapshot.vars.contains_key(name)
    }

    /// Whether `name` exists as any variable: local, buffered, or committed.
    pub fn var_exists(&self, name: &str) -> bool {
        self.global_var_exists(name) || self.locals.contains_key(name)
    }

    fn user_exists(&self, name: &str) -> bool {
        self.pending_users.contains_key(name) || self.snapshot.users.contains_key(name)
    }

    fn require_user(&self, name: &str) -> Result<()> {
        if self.user_exists(name) {
            Ok(())
        } else {
            Err(Error::UnknownPrincipal { name: name.to_string() })
        }
    }

    fn require(&mut self, variable: &str, right: Right) -> Result<()> {
        if self.has_permission(variable, right) {
            Ok(())
        } else {
            Err(Error::PermissionDenied {
                principal: self.principal.clone(),
                variable: variable.to_string(),
                right,
            })
        }
    }

    /// Apply one grant operation to every variable `owner` currently holds
    /// `delegate` on. The delegable set is computed first, so grants
    /// installed by the expansion itself do not widen it mid-flight.
    fn delegate_everything(&mut self, owner: &str, right: Right, receiver: &str, op: GrantOp) {
        let delegable: Vec<String> = self
            .grants
            .variables()
            .filter(|v| self.grants.has_path(v, owner, Right::Delegate))
            .map(str::to_string)
            .collect();
        for variable in delegable {
            match op {
                GrantOp::Insert => self.grants.insert(&variable, owner, right, receiver),
                GrantOp::Remove => self.grants.remove(&variable, owner, right, receiver),
            }
        }
        self.perm_cache.clear();
    }
}

#[derive(Debug, Clone, Copy)]
enum GrantOp {
    Insert,
    Remove,
}
