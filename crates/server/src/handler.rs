//! The per-connection state machine.
//!
//! A connection moves through `READ_AUTH → READ_BODY → EXECUTE → FLUSH`.
//! The first line must authenticate; the body is buffered up to the `***`
//! terminator within the program-size budget; the buffered commands then
//! execute against one transaction. Success replies are queued and flushed
//! only after the terminator commits the transaction, so the first failure
//! can still discard everything and answer with a single status line.
//!
//! The handler is generic over its line source and reply sink. The TCP
//! binary hands it a socket with a read deadline; a deadline that fires
//! surfaces here as a timed-out read and produces the `TIMEOUT` reply.

use std::io::{BufRead, ErrorKind, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use warden_core::limits::MAX_PROGRAM_BYTES;
use warden_core::{flatten, Error, Result, StatusCode, Value};
use warden_lang::{parse, Cmd, Delegation, Target};
use warden_store::{DelegationTarget, Store, Txn};

use crate::eval::{eval, Scope};
use crate::wire::Reply;

/// What the connection asked of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The connection is finished; keep serving.
    Done,
    /// Admin ran `exit`: the caller should terminate the process cleanly.
    Exit,
}

/// Drives one connection against the shared store.
pub struct Handler {
    store: Arc<Store>,
}

impl Handler {
    /// Create a handler over the shared store.
    pub fn new(store: Arc<Store>) -> Self {
        Handler { store }
    }

    /// Run one program: read, authenticate, execute, reply.
    ///
    /// Consumes the line source up to the terminator and writes every reply
    /// to the sink. The return value is the only side channel: `Exit` means
    /// the admin asked the whole server to stop.
    pub fn execute<R: BufRead, W: Write>(&self, reader: R, mut sink: W) -> Outcome {
        // A single line cannot usefully exceed the whole-program budget, so
        // cap the raw byte stream there instead of trusting line lengths.
        let mut reader = reader.take(MAX_PROGRAM_BYTES as u64 + 2);
        let outcome = self.run(&mut reader, &mut sink);
        if let Err(e) = sink.flush() {
            warn!(error = %e, "failed to flush replies");
        }
        outcome
    }

    fn run<R: BufRead, W: Write>(&self, reader: &mut R, sink: &mut W) -> Outcome {
        // READ_AUTH: the first line must be `as principal p password "s" do`.
        let line = match read_line(reader) {
            Line::Text(line) => line,
            Line::Eof => return Outcome::Done,
            Line::Timeout => return send(sink, Reply::Status(StatusCode::Timeout)),
            Line::Gone => return Outcome::Done,
        };
        let mut total_bytes = line.len() + 1;
        let (principal, password) = match parse(&line) {
            Ok(Cmd::AsPrincipal { principal, password }) => (principal, password),
            Ok(other) => {
                debug!(?other, "first line is not an authentication command");
                return send(sink, Reply::Status(StatusCode::Failed));
            }
            Err(e) => {
                debug!(error = %e, "failed to parse authentication line");
                return send(sink, Reply::Status(StatusCode::Failed));
            }
        };
        let mut txn = match self.store.begin(&principal, &password) {
            Ok(txn) => txn,
            Err(e) => {
                debug!(principal = %principal, error = %e, "authentication rejected");
                return send(sink, Reply::Status(e.status()));
            }
        };
        debug!(principal = %principal, "authenticated");

        // READ_BODY: buffer commands until the terminator.
        let mut cmds = Vec::new();
        let mut terminated = false;
        let mut ending = false; // a return/exit was seen; only `***` may follow
        loop {
            let line = match read_line(reader) {
                Line::Text(line) => line,
                Line::Eof => break,
                Line::Timeout => return send(sink, Reply::Status(StatusCode::Timeout)),
                Line::Gone => return Outcome::Done,
            };
            total_bytes += line.len() + 1;
            if total_bytes > MAX_PROGRAM_BYTES {
                debug!(total_bytes, "program exceeds size limit");
                return send(sink, Reply::Status(StatusCode::Failed));
            }
            let cmd = match parse(&line) {
                Ok(cmd) => cmd,
                Err(e) => {
                    debug!(error = %e, "parse error");
                    return send(sink, Reply::Status(StatusCode::Failed));
                }
            };
            if cmd == Cmd::Empty {
                continue;
            }
            if ending && cmd != Cmd::Terminate {
                debug!("command after return/exit");
                return send(sink, Reply::Status(StatusCode::Failed));
            }
            match cmd {
                Cmd::Terminate => {
                    terminated = true;
                    break;
                }
                Cmd::Return(_) | Cmd::Exit => {
                    ending = true;
                    cmds.push(cmd);
                }
                cmd => cmds.push(cmd),
            }
        }

        // EXECUTE: run the buffered program, queueing success replies.
        let mut replies = Vec::new();
        for cmd in cmds {
            if cmd == Cmd::Exit {
                if !txn.is_admin() {
                    return send(sink, Reply::Status(StatusCode::Denied));
                }
                send(sink, Reply::Status(StatusCode::Exiting));
                return Outcome::Exit;
            }
            match run_cmd(&mut txn, cmd) {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    debug!(error = %e, "command failed");
                    return send(sink, Reply::Status(e.status()));
                }
            }
        }

        // FLUSH: only a terminated program commits and emits its replies.
        // Hitting end of input before `***` discards everything silently.
        if terminated {
            txn.commit();
            for reply in &replies {
                send(sink, reply.clone());
            }
        }
        Outcome::Done
    }
}

/// Execute one non-terminal command, producing its queued reply.
fn run_cmd(txn: &mut Txn<'_>, cmd: Cmd) -> Result<Reply> {
    let mut scope = Scope::new();
    match cmd {
        Cmd::CreatePrincipal { principal, password } => {
            txn.create_principal(&principal, &password)?;
            Ok(Reply::Status(StatusCode::CreatePrincipal))
        }
        Cmd::ChangePassword { principal, password } => {
            txn.change_password(&principal, &password)?;
            Ok(Reply::Status(StatusCode::ChangePassword))
        }
        Cmd::Set { variable, expr } => {
            let value = eval(txn, &expr, &mut scope)?;
            txn.set(&variable, value)?;
            Ok(Reply::Status(StatusCode::Set))
        }
        Cmd::AppendTo { variable, expr } => {
            let value = eval(txn, &expr, &mut scope)?;
            txn.append_to(&variable, value)?;
            Ok(Reply::Status(StatusCode::Append))
        }
        Cmd::Local { variable, expr } => {
            let value = eval(txn, &expr, &mut scope)?;
            txn.set_local(&variable, value)?;
            Ok(Reply::Status(StatusCode::Local))
        }
        Cmd::Foreach { binder, variable, expr } => {
            run_each(txn, &binder, &variable, &expr, EachMode::Replace)
        }
        Cmd::Filtereach { binder, variable, expr } => {
            run_each(txn, &binder, &variable, &expr, EachMode::Filter)
        }
        Cmd::SetDelegation(d) => {
            let Delegation { target, owner, right, receiver } = d;
            txn.set_delegation(as_store_target(&target), &owner, right, &receiver)?;
            Ok(Reply::Status(StatusCode::SetDelegation))
        }
        Cmd::DeleteDelegation(d) => {
            let Delegation { target, owner, right, receiver } = d;
            txn.delete_delegation(as_store_target(&target), &owner, right, &receiver)?;
            Ok(Reply::Status(StatusCode::DeleteDelegation))
        }
        Cmd::DefaultDelegator { principal } => {
            txn.set_default_delegator(&principal)?;
            Ok(Reply::Status(StatusCode::DefaultDelegator))
        }
        Cmd::Return(expr) => {
            let value = eval(txn, &expr, &mut scope)?;
            let output = match value {
                Value::List(items) => Value::List(flatten(items)),
                other => other,
            };
            Ok(Reply::Returning(output))
        }
        Cmd::AsPrincipal { .. } => Err(Error::MisplacedAuth),
        // Filtered out during READ_BODY.
        Cmd::Exit | Cmd::Terminate | Cmd::Empty => unreachable!("handled by the read loop"),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum EachMode {
    Replace,
    Filter,
}

/// Shared body of `foreach` and `filtereach`: fetch the list (read right),
/// flatten it, evaluate the expression once per element under the binder,
/// and rebind the variable through `set` (write right).
fn run_each(
    txn: &mut Txn<'_>,
    binder: &str,
    variable: &str,
    expr: &warden_lang::Expr,
    mode: EachMode,
) -> Result<Reply> {
    let value = txn.get(variable)?;
    let items = match value {
        Value::List(items) => items,
        _ => {
            return Err(Error::NotAList {
                name: variable.to_string(),
            })
        }
    };
    if txn.var_exists(binder) {
        return Err(Error::VariableExists {
            name: binder.to_string(),
        });
    }
    let items = flatten(items);
    let mut scope = Scope::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        scope.insert(binder.to_string(), item.clone());
        let result = eval(txn, expr, &mut scope);
        scope.remove(binder);
        let result = result?;
        match mode {
            EachMode::Replace => out.push(result),
            EachMode::Filter => {
                // Keep exactly the elements whose predicate is the empty
                // string; any other result drops the element.
                if result == Value::Str(String::new()) {
                    out.push(item);
                }
            }
        }
    }
    txn.set(variable, Value::List(out))?;
    Ok(Reply::Status(match mode {
        EachMode::Replace => StatusCode::Foreach,
        EachMode::Filter => StatusCode::Filtereach,
    }))
}

fn as_store_target(target: &Target) -> DelegationTarget<'_> {
    match target {
        Target::All => DelegationTarget::All,
        Target::Var(name) => DelegationTarget::Var(name),
    }
}

/// Write one reply, logging (but not surfacing) sink errors: by the time a
/// reply fails to write there is nothing left to tell the client.
fn send<W: Write>(sink: &mut W, reply: Reply) -> Outcome {
    if let Err(e) = reply.write_line(sink) {
        warn!(error = %e, "failed to write reply");
    }
    Outcome::Done
}

enum Line {
    Text(String),
    Eof,
    Timeout,
    Gone,
}

/// Read one line, stripping the newline and an optional carriage return.
/// A read that hits the socket deadline maps to `Timeout`; any other I/O
/// error means the peer is unreachable and the connection just closes.
fn read_line<R: BufRead>(reader: &mut R) -> Line {
    let mut bytes = Vec::new();
    match reader.read_until(b'\n', &mut bytes) {
        Ok(0) => Line::Eof,
        Ok(_) => {
            if bytes.last() == Some(&b'\n') {
                bytes.pop();
                if bytes.last() == Some(&b'\r') {
                    bytes.pop();
                }
            }
            match String::from_utf8(bytes) {
                Ok(text) => Line::Text(text),
                // Not even valid 8-bit text; let the parser's caller fail
                // the program the same way any junk byte would.
                Err(e) => Line::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            }
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
            Line::Timeout
        }
        Err(e) => {
            debug!(error = %e, "read failed");
            Line::Gone
        }
    }
}
