//! Protocol size limits.
//!
//! These limits are part of the wire contract and are enforced at the edges:
//! the lexer rejects oversized tokens, the handler rejects oversized
//! programs, and `concat` truncates to the string limit. They are frozen;
//! changing any of them changes which programs are accepted.

use std::time::Duration;

/// Maximum identifier length in bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 255;

/// Maximum string-literal length in bytes. `concat` results are truncated
/// to this length rather than rejected.
pub const MAX_STRING_BYTES: usize = 65_535;

/// Maximum cumulative program size in bytes, counting every line including
/// the authentication line and each line's terminating newline.
pub const MAX_PROGRAM_BYTES: usize = 1_000_000;

/// Per-read deadline on a connection. When it fires mid-program the server
/// replies `TIMEOUT` and closes.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_limit_fits_in_program_limit() {
        assert!(MAX_STRING_BYTES < MAX_PROGRAM_BYTES);
    }

    #[test]
    fn test_identifier_limit_fits_in_string_limit() {
        assert!(MAX_IDENTIFIER_BYTES < MAX_STRING_BYTES);
    }
}
