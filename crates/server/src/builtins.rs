//! Built-in string functions.
//!
//! The language has exactly five functions. Every one rejects wrong arity
//! or wrong argument kinds with a failure (never a security violation).

use std::collections::BTreeMap;

use warden_core::limits::MAX_STRING_BYTES;
use warden_core::{Error, Result, Value};

/// Invoke a built-in by name with already-evaluated arguments.
pub fn call(function: &str, args: &[Value]) -> Result<Value> {
    match function {
        "split" => split(args),
        "concat" => concat(args),
        "tolower" => tolower(args),
        "equal" => equal(args),
        "notequal" => notequal(args),
        _ => Err(Error::UnknownFunction {
            name: function.to_string(),
        }),
    }
}

fn bad(function: &str) -> Error {
    Error::BadArgument {
        function: function.to_string(),
    }
}

fn two_strings<'a>(function: &str, args: &'a [Value]) -> Result<(&'a str, &'a str)> {
    match args {
        [Value::Str(a), Value::Str(b)] => Ok((a, b)),
        _ => Err(bad(function)),
    }
}

/// `split(s1, s2)` — a record `{fst, snd}` cutting `s1` at the length of
/// `s2`: `fst` is the first `len(s2)` bytes of `s1`, `snd` the remainder.
/// When `s1` is shorter than `s2`, `fst` is all of `s1` and `snd` is empty.
fn split(args: &[Value]) -> Result<Value> {
    let (s1, s2) = two_strings("split", args)?;
    let cut = s2.len().min(s1.len());
    let fields = BTreeMap::from([
        ("fst".to_string(), s1[..cut].to_string()),
        ("snd".to_string(), s1[cut..].to_string()),
    ]);
    Ok(Value::Record(fields))
}

/// `concat(s1, s2)` — concatenation, truncated to the string size limit.
fn concat(args: &[Value]) -> Result<Value> {
    let (s1, s2) = two_strings("concat", args)?;
    let mut out = String::with_capacity((s1.len() + s2.len()).min(MAX_STRING_BYTES));
    out.push_str(s1);
    out.push_str(s2);
    out.truncate(MAX_STRING_BYTES);
    Ok(Value::Str(out))
}

/// `tolower(s)` — ASCII lowercase.
fn tolower(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Str(s)] => Ok(Value::Str(s.to_ascii_lowercase())),
        _ => Err(bad("tolower")),
    }
}

/// `equal(a, b)` — `""` when equal, `"0"` when not. Both arguments must be
/// strings, or both records (compared structurally).
fn equal(args: &[Value]) -> Result<Value> {
    let same = match args {
        [Value::Str(a), Value::Str(b)] => a == b,
        [Value::Record(a), Value::Record(b)] => a == b,
        _ => return Err(bad("equal")),
    };
    Ok(Value::Str(if same { "" } else { "0" }.to_string()))
}

/// `notequal(a, b)` — the inverse of `equal`, same failure domain.
fn notequal(args: &[Value]) -> Result<Value> {
    match equal(args)? {
        Value::Str(s) if s.is_empty() => Ok(Value::Str("0".to_string())),
        _ => Ok(Value::Str(String::new())),
    }
}
