//! Expression evaluation.
//!
//! Evaluation runs against an open transaction plus one mutable scope.
//! Identifiers resolve in the scope first, then as variables; `let`,
//! `foreach`, and `filtereach` bind into the scope and unbind when their
//! child evaluation finishes, so no closures or scope chains are needed.

use std::collections::{BTreeMap, HashMap};

use warden_core::{Error, Result, Value};
use warden_lang::{Atom, Expr};
use warden_store::Txn;

use crate::builtins;

/// Bindings introduced by `let`, `foreach`, and `filtereach`.
pub(crate) type Scope = HashMap<String, Value>;

/// Evaluate an expression under the given scope.
pub(crate) fn eval(txn: &mut Txn<'_>, expr: &Expr, scope: &mut Scope) -> Result<Value> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => lookup(txn, name, scope),
        Expr::Field { record, field } => select_field(txn, record, field, scope),
        Expr::EmptyList => Ok(Value::List(Vec::new())),
        Expr::Record(fields) => {
            let mut out = BTreeMap::new();
            for (key, atom) in fields {
                match eval_atom(txn, atom, scope)? {
                    Value::Str(s) => {
                        out.insert(key.clone(), s);
                    }
                    _ => return Err(Error::NonStringField { field: key.clone() }),
                }
            }
            Ok(Value::Record(out))
        }
        Expr::Call { function, args } => {
            let mut values = Vec::with_capacity(args.len());
            for atom in args {
                values.push(eval_atom(txn, atom, scope)?);
            }
            builtins::call(function, &values)
        }
        Expr::Let { binder, bound, body } => {
            if scope.contains_key(binder) || txn.var_exists(binder) {
                return Err(Error::VariableExists {
                    name: binder.clone(),
                });
            }
            let bound = eval(txn, bound, scope)?;
            scope.insert(binder.clone(), bound);
            let result = eval(txn, body, scope);
            scope.remove(binder);
            result
        }
    }
}

/// Evaluate a restricted argument/record-value form.
pub(crate) fn eval_atom(txn: &mut Txn<'_>, atom: &Atom, scope: &mut Scope) -> Result<Value> {
    match atom {
        Atom::Str(s) => Ok(Value::Str(s.clone())),
        Atom::Ident(name) => lookup(txn, name, scope),
        Atom::Field { record, field } => select_field(txn, record, field, scope),
    }
}

/// Scope-first name resolution.
fn lookup(txn: &mut Txn<'_>, name: &str, scope: &Scope) -> Result<Value> {
    if let Some(value) = scope.get(name) {
        return Ok(value.clone());
    }
    txn.get(name)
}

/// Resolve `record.field`: the record scope-first, then the key.
fn select_field(txn: &mut Txn<'_>, record: &str, field: &str, scope: &Scope) -> Result<Value> {
    let value = lookup(txn, record, scope)?;
    let fields = value.as_record().ok_or_else(|| Error::NotARecord {
        name: record.to_string(),
    })?;
    match fields.get(field) {
        Some(s) => Ok(Value::Str(s.clone())),
        None => Err(Error::UnknownField {
            record: record.to_string(),
            field: field.to_string(),
        }),
    }
}
