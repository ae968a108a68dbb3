//! The four delegable rights.

use serde::{Deserialize, Serialize};

/// A right a principal may hold on a variable.
///
/// Rights are never implied by one another: `write` does not include `read`,
/// and `append` does not include `write`. The one asymmetry lives in the
/// store: appending is allowed with either `write` or `append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Right {
    /// Read a variable's value.
    Read,
    /// Replace a variable's value.
    Write,
    /// Append to a list variable.
    Append,
    /// Pass a held right on to another principal.
    Delegate,
}

impl Right {
    /// All four rights, in the order the `all` shorthand installs them.
    pub const ALL: [Right; 4] = [Right::Read, Right::Write, Right::Append, Right::Delegate];

    /// Get the canonical keyword for this right.
    pub fn as_str(&self) -> &'static str {
        match self {
            Right::Read => "read",
            Right::Write => "write",
            Right::Append => "append",
            Right::Delegate => "delegate",
        }
    }
}

impl std::fmt::Display for Right {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keywords() {
        for right in Right::ALL {
            assert!(matches!(
                right.as_str(),
                "read" | "write" | "append" | "delegate"
            ));
        }
    }

    #[test]
    fn test_all_is_distinct() {
        for (i, a) in Right::ALL.iter().enumerate() {
            for b in &Right::ALL[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
