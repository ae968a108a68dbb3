//! Error types for the warden store and interpreter.
//!
//! Every failure an executing program can hit is a variant of [`Error`].
//! The wire protocol knows only two failure statuses, so each variant is
//! classified by [`Error::status`]:
//!
//! | Class | Wire code | Examples |
//! |-------|-----------|----------|
//! | non-security failure | `FAILED` | unknown identifier, duplicate principal, wrong value shape, arity mismatch |
//! | security violation | `DENIED` | wrong password, missing right, admin-only command |
//!
//! The first error aborts the whole program: the connection's single reply
//! is the error's status and nothing is committed.

use thiserror::Error;

use crate::right::Right;
use crate::status::StatusCode;

/// Result type alias for store and interpreter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure raised while executing a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ==================== Principals ====================
    /// The named principal does not exist.
    #[error("unknown principal: {name}")]
    UnknownPrincipal {
        /// The missing principal.
        name: String,
    },

    /// Authentication presented the wrong password for an existing principal.
    #[error("wrong password for principal: {name}")]
    WrongPassword {
        /// The principal that failed to authenticate.
        name: String,
    },

    /// A principal with this name already exists.
    #[error("principal already exists: {name}")]
    PrincipalExists {
        /// The duplicate principal.
        name: String,
    },

    // ==================== Variables ====================
    /// The named variable is not defined in any scope.
    #[error("unknown variable: {name}")]
    UnknownVariable {
        /// The missing variable.
        name: String,
    },

    /// A variable or binding with this name already exists.
    #[error("variable already exists: {name}")]
    VariableExists {
        /// The duplicate name.
        name: String,
    },

    /// The operation requires a list but the variable holds something else.
    #[error("not a list: {name}")]
    NotAList {
        /// The offending variable.
        name: String,
    },

    // ==================== Expressions ====================
    /// Field access on a value that is not a record.
    #[error("not a record: {name}")]
    NotARecord {
        /// The name the record was looked up under.
        name: String,
    },

    /// Field access named a key the record does not contain.
    #[error("record {record} has no field {field}")]
    UnknownField {
        /// The record the key was looked up in.
        record: String,
        /// The missing key.
        field: String,
    },

    /// A record literal evaluated a field to a non-string value.
    #[error("record field {field} is not a string")]
    NonStringField {
        /// The offending field.
        field: String,
    },

    /// A function call named a function that does not exist.
    #[error("unknown function: {name}")]
    UnknownFunction {
        /// The missing function.
        name: String,
    },

    /// A built-in was called with the wrong arity or argument kind.
    #[error("invalid arguments to {function}")]
    BadArgument {
        /// The built-in that rejected its arguments.
        function: String,
    },

    // ==================== Authorization ====================
    /// The current principal lacks a required right on a variable.
    #[error("{principal} lacks {right} on {variable}")]
    PermissionDenied {
        /// The principal that was checked.
        principal: String,
        /// The variable the right was checked on.
        variable: String,
        /// The missing right.
        right: Right,
    },

    /// The command is reserved to the admin principal.
    #[error("operation requires the admin principal")]
    AdminOnly,

    /// Changing a password is allowed only for admin or the principal itself.
    #[error("only admin or {name} may change this password")]
    NotPrincipalSelf {
        /// The principal whose password was targeted.
        name: String,
    },

    /// The current principal is not a party to the delegation it tried to
    /// create or revoke.
    #[error("not a party to this delegation")]
    NotDelegationParty,

    /// Admin's rights can never be revoked.
    #[error("cannot revoke rights from admin")]
    CannotRevokeAdmin,

    // ==================== Program framing ====================
    /// The program exceeded the cumulative size limit.
    #[error("program exceeds size limit")]
    ProgramTooLarge,

    /// An authentication command appeared after the first line.
    #[error("misplaced authentication command")]
    MisplacedAuth,
}

impl Error {
    /// Classify this error onto one of the two failure statuses.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::WrongPassword { .. }
            | Error::PermissionDenied { .. }
            | Error::AdminOnly
            | Error::NotPrincipalSelf { .. }
            | Error::NotDelegationParty => StatusCode::Denied,

            Error::UnknownPrincipal { .. }
            | Error::PrincipalExists { .. }
            | Error::UnknownVariable { .. }
            | Error::VariableExists { .. }
            | Error::NotAList { .. }
            | Error::NotARecord { .. }
            | Error::UnknownField { .. }
            | Error::NonStringField { .. }
            | Error::UnknownFunction { .. }
            | Error::BadArgument { .. }
            | Error::CannotRevokeAdmin
            | Error::ProgramTooLarge
            | Error::MisplacedAuth => StatusCode::Failed,
        }
    }

    /// Check if this error is a security violation.
    pub fn is_denied(&self) -> bool {
        self.status() == StatusCode::Denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_violations_map_to_denied() {
        let denied = [
            Error::WrongPassword { name: "alice".into() },
            Error::PermissionDenied {
                principal: "alice".into(),
                variable: "x".into(),
                right: Right::Write,
            },
            Error::AdminOnly,
            Error::NotPrincipalSelf { name: "bob".into() },
            Error::NotDelegationParty,
        ];
        for err in denied {
            assert_eq!(err.status(), StatusCode::Denied, "{err}");
            assert!(err.is_denied());
        }
    }

    #[test]
    fn test_everything_else_maps_to_failed() {
        let failed = [
            Error::UnknownPrincipal { name: "ghost".into() },
            Error::PrincipalExists { name: "alice".into() },
            Error::UnknownVariable { name: "x".into() },
            Error::VariableExists { name: "x".into() },
            Error::NotAList { name: "x".into() },
            Error::NotARecord { name: "x".into() },
            Error::UnknownField { record: "r".into(), field: "k".into() },
            Error::NonStringField { field: "k".into() },
            Error::UnknownFunction { name: "frob".into() },
            Error::BadArgument { function: "split".into() },
            Error::CannotRevokeAdmin,
            Error::ProgramTooLarge,
            Error::MisplacedAuth,
        ];
        for err in failed {
            assert_eq!(err.status(), StatusCode::Failed, "{err}");
            assert!(!err.is_denied());
        }
    }

    #[test]
    fn test_display_carries_context() {
        let err = Error::PermissionDenied {
            principal: "alice".into(),
            variable: "x".into(),
            right: Right::Read,
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("read"));
        assert!(msg.contains('x'));
    }
}
