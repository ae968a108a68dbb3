//! Reply records and their wire encoding.
//!
//! Every reply is one JSON object on one line: `{"status": "<code>"}`, with
//! a `return` additionally carrying its output under `output`. The server
//! writes replies and nothing else.

use std::io::{self, Write};

use warden_core::{StatusCode, Value};

/// One reply record, queued during execution and flushed on commit (or
/// written immediately for a terminal status).
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A bare status record.
    Status(StatusCode),
    /// A `RETURNING` record with the program's output.
    Returning(Value),
}

impl Reply {
    /// The JSON object for this reply.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Reply::Status(code) => serde_json::json!({ "status": code.as_str() }),
            Reply::Returning(value) => serde_json::json!({
                "status": StatusCode::Returning.as_str(),
                "output": serde_json::Value::from(value.clone()),
            }),
        }
    }

    /// Write this reply as one `\n`-terminated line.
    pub fn write_line<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *sink, &self.to_json())?;
        sink.write_all(b"\n")
    }
}
