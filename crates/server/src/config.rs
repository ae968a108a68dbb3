//! Command-line configuration.
//!
//! `warden-server PORT [ADMIN_PASSWORD]`
//!
//! Argument validation is strict and part of the contract: arguments are at
//! most 4,096 bytes; the port is decimal with no leading zeros, between
//! 1,024 and 65,535; the password must be a legal string-literal body
//! (printable ASCII without `"`). Anything else makes the binary exit 255.

use clap::{Arg, ArgMatches, Command};

/// Maximum accepted length of one command-line argument, in bytes.
pub const MAX_ARG_BYTES: usize = 4096;

/// Default admin password when none is given.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP port to listen on.
    pub port: u16,
    /// The admin principal's initial password.
    pub admin_password: String,
}

impl Config {
    /// Extract the configuration from parsed arguments.
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Config {
            port: *matches.get_one::<u16>("port").expect("port is required"),
            admin_password: matches
                .get_one::<String>("password")
                .cloned()
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
        }
    }
}

/// Build the argument parser.
pub fn build_cli() -> Command {
    Command::new("warden-server")
        .about("Policy-governed key/value server")
        .arg(
            Arg::new("port")
                .required(true)
                .value_name("PORT")
                .value_parser(parse_port)
                .help("TCP port to listen on (1024-65535, decimal, no leading zeros)"),
        )
        .arg(
            Arg::new("password")
                .value_name("ADMIN_PASSWORD")
                .value_parser(parse_password)
                .help("Admin password (printable ASCII without '\"'; default \"admin\")"),
        )
}

fn parse_port(s: &str) -> Result<u16, String> {
    if s.len() > MAX_ARG_BYTES {
        return Err("port argument too long".to_string());
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err("port must be a decimal number".to_string());
    }
    if s.starts_with('0') {
        return Err("port must not have leading zeros".to_string());
    }
    let port: u32 = s.parse().map_err(|_| "port out of range".to_string())?;
    if !(1024..=65535).contains(&port) {
        return Err("port must be between 1024 and 65535".to_string());
    }
    Ok(port as u16)
}

fn parse_password(s: &str) -> Result<String, String> {
    if s.len() > MAX_ARG_BYTES {
        return Err("password argument too long".to_string());
    }
    if !s.bytes().all(|b| (0x20..=0x7e).contains(&b) && b != b'"') {
        return Err("password must be printable ASCII without '\"'".to_string());
    }
    Ok(s.to_string())
}
