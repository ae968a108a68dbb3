//! Abstract syntax for the command language.
//!
//! Commands are the instruction set of the server: every line a client can
//! send is one variant of [`Cmd`]. They are self-contained, typed, pure
//! data — no closures, no interpreter state.

use warden_core::Right;

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// `as principal p password "s" do` — authenticate the connection.
    AsPrincipal {
        /// The principal to run the program as.
        principal: String,
        /// The claimed password.
        password: String,
    },

    /// `exit` — admin-only; terminates the whole server process.
    Exit,

    /// `return <expr>` — evaluate and emit as the program's output.
    Return(Expr),

    /// `create principal p "s"` — admin-only.
    CreatePrincipal {
        /// The new principal's name.
        principal: String,
        /// The new principal's password.
        password: String,
    },

    /// `change password p "s"`.
    ChangePassword {
        /// The principal whose password changes.
        principal: String,
        /// The new password.
        password: String,
    },

    /// `set x = <expr>` — write a global, pending, or local variable,
    /// creating a global if `x` does not exist.
    Set {
        /// The variable to set.
        variable: String,
        /// The value expression.
        expr: Expr,
    },

    /// `append to x with <expr>`.
    AppendTo {
        /// The list variable to append to.
        variable: String,
        /// The value expression.
        expr: Expr,
    },

    /// `local x = <expr>` — create a program-lifetime variable.
    Local {
        /// The local variable to create.
        variable: String,
        /// The value expression.
        expr: Expr,
    },

    /// `foreach y in x replacewith <expr>` — rewrite each element of list
    /// `x` with the expression evaluated under binding `y`.
    Foreach {
        /// The per-element binder.
        binder: String,
        /// The list variable being rewritten.
        variable: String,
        /// The replacement expression.
        expr: Expr,
    },

    /// `filtereach y in x with <expr>` — keep the elements for which the
    /// expression evaluates to the empty string.
    Filtereach {
        /// The per-element binder.
        binder: String,
        /// The list variable being filtered.
        variable: String,
        /// The predicate expression.
        expr: Expr,
    },

    /// `set delegation <tgt> q <right> -> p`.
    SetDelegation(Delegation),

    /// `delete delegation <tgt> q <right> -> p`.
    DeleteDelegation(Delegation),

    /// `default delegator = p` — admin-only.
    DefaultDelegator {
        /// The new default delegator.
        principal: String,
    },

    /// `***` — commit the program and flush its replies.
    Terminate,

    /// A blank or comment-only line. Skipped by the handler.
    Empty,
}

/// The variable slot of a delegation command: a named variable or the
/// `all` shorthand, which expands over every variable the owner can
/// currently delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The `all` keyword.
    All,
    /// A single named variable.
    Var(String),
}

/// The arguments of a set/delete delegation command:
/// owner `q` delegates `right` on `target` to receiver `p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    /// The variable (or `all`) the right applies to.
    pub target: Target,
    /// The principal the right is derived from.
    pub owner: String,
    /// The delegated right.
    pub right: Right,
    /// The principal receiving the right.
    pub receiver: String,
}

/// An expression on the right-hand side of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A string literal.
    Str(String),
    /// A variable or scope-binding reference.
    Ident(String),
    /// Field selection `record.key`.
    Field {
        /// The record variable or binding.
        record: String,
        /// The selected key.
        field: String,
    },
    /// A built-in function call. Arguments are restricted to atoms.
    Call {
        /// The function name.
        function: String,
        /// The argument list, evaluated left to right.
        args: Vec<Atom>,
    },
    /// The empty-list literal `[]`.
    EmptyList,
    /// A record literal `{ key = val, … }`. Keys are unique; insertion
    /// order is preserved for left-to-right evaluation.
    Record(Vec<(String, Atom)>),
    /// `let x = <bound> in <body>`.
    Let {
        /// The binder introduced for the body.
        binder: String,
        /// The bound expression.
        bound: Box<Expr>,
        /// The body expression.
        body: Box<Expr>,
    },
}

/// The restricted expression forms allowed as function arguments and
/// record field values: a string, an identifier, or a field selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// A string literal.
    Str(String),
    /// A variable or scope-binding reference.
    Ident(String),
    /// Field selection `record.key`.
    Field {
        /// The record variable or binding.
        record: String,
        /// The selected key.
        field: String,
    },
}
