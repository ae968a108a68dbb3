//! Wire status codes.
//!
//! Every reply line carries exactly one of these codes in its `status`
//! field. The set is frozen: clients dispatch on the literal strings.

use serde::{Deserialize, Serialize};

/// Canonical status codes for the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// A principal was created.
    CreatePrincipal,
    /// A password was changed.
    ChangePassword,
    /// A global or pending variable was set.
    Set,
    /// A value was appended to a list.
    Append,
    /// A local variable was created.
    Local,
    /// A list was rewritten element-by-element.
    Foreach,
    /// A list was filtered element-by-element.
    Filtereach,
    /// A delegation assertion was installed.
    SetDelegation,
    /// A delegation assertion was revoked.
    DeleteDelegation,
    /// The default delegator was changed.
    DefaultDelegator,
    /// A `return` command produced output.
    Returning,
    /// The admin asked the server to exit.
    Exiting,
    /// A non-security failure aborted the program.
    Failed,
    /// A security violation aborted the program.
    Denied,
    /// The read deadline fired before the program completed.
    Timeout,
}

impl StatusCode {
    /// Get the canonical wire string for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::CreatePrincipal => "CREATE_PRINCIPAL",
            StatusCode::ChangePassword => "CHANGE_PASSWORD",
            StatusCode::Set => "SET",
            StatusCode::Append => "APPEND",
            StatusCode::Local => "LOCAL",
            StatusCode::Foreach => "FOREACH",
            StatusCode::Filtereach => "FILTEREACH",
            StatusCode::SetDelegation => "SET_DELEGATION",
            StatusCode::DeleteDelegation => "DELETE_DELEGATION",
            StatusCode::DefaultDelegator => "DEFAULT_DELEGATOR",
            StatusCode::Returning => "RETURNING",
            StatusCode::Exiting => "EXITING",
            StatusCode::Failed => "FAILED",
            StatusCode::Denied => "DENIED",
            StatusCode::Timeout => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings_are_screaming_snake() {
        let codes = [
            StatusCode::CreatePrincipal,
            StatusCode::ChangePassword,
            StatusCode::Set,
            StatusCode::Append,
            StatusCode::Local,
            StatusCode::Foreach,
            StatusCode::Filtereach,
            StatusCode::SetDelegation,
            StatusCode::DeleteDelegation,
            StatusCode::DefaultDelegator,
            StatusCode::Returning,
            StatusCode::Exiting,
            StatusCode::Failed,
            StatusCode::Denied,
            StatusCode::Timeout,
        ];
        for code in codes {
            assert!(code
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b == b'_'));
        }
    }
}
