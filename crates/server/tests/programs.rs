//! End-to-end programs over in-memory connections.
//!
//! Each test drives [`Handler::execute`] with a full program (auth line,
//! body, terminator) exactly as it would arrive on a socket, and checks the
//! JSON reply lines and the committed state that later connections observe.

use std::io::{self, Read};
use std::sync::Arc;

use warden_server::{Handler, Outcome};
use warden_store::Store;

fn new_store() -> Arc<Store> {
    Arc::new(Store::new("admin"))
}

fn run(store: &Arc<Store>, lines: &[&str]) -> (Vec<serde_json::Value>, Outcome) {
    let mut program = lines.join("\n");
    program.push('\n');
    let mut out: Vec<u8> = Vec::new();
    let outcome = Handler::new(Arc::clone(store)).execute(program.as_bytes(), &mut out);
    let replies = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    (replies, outcome)
}

fn statuses(replies: &[serde_json::Value]) -> Vec<&str> {
    replies
        .iter()
        .map(|reply| reply["status"].as_str().unwrap())
        .collect()
}

const AUTH_ADMIN: &str = r#"as principal admin password "admin" do"#;

// === Scenarios from the protocol description ===

#[test]
fn admin_exit_terminates_the_process() {
    let store = new_store();
    let (replies, outcome) = run(&store, &[AUTH_ADMIN, "exit", "***"]);
    assert_eq!(replies, vec![serde_json::json!({"status": "EXITING"})]);
    assert_eq!(outcome, Outcome::Exit);
}

#[test]
fn create_set_delegate_then_read_as_grantee() {
    let store = new_store();
    let (replies, outcome) = run(
        &store,
        &[
            AUTH_ADMIN,
            r#"create principal alice "a""#,
            r#"set x = "hi""#,
            "set delegation x admin read -> alice",
            "***",
        ],
    );
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(statuses(&replies), vec!["CREATE_PRINCIPAL", "SET", "SET_DELEGATION"]);

    let (replies, _) = run(
        &store,
        &[r#"as principal alice password "a" do"#, "return x", "***"],
    );
    assert_eq!(
        replies,
        vec![serde_json::json!({"status": "RETURNING", "output": "hi"})]
    );
}

#[test]
fn unknown_grantee_fails_the_whole_program() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            r#"create principal alice "a""#,
            r#"set x = "v""#,
            "set delegation x admin read -> alice",
            "set delegation x alice read -> bob",
            "***",
        ],
    );
    assert_eq!(statuses(&replies), vec!["FAILED"]);
    // Nothing committed: alice does not exist.
    let (replies, _) = run(&store, &[r#"as principal alice password "a" do"#, "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

#[test]
fn append_and_foreach_rewrite_a_list() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            "set xs = []",
            r#"append to xs with "a""#,
            r#"append to xs with "b""#,
            r#"foreach y in xs replacewith concat(y,"!")"#,
            "return xs",
            "***",
        ],
    );
    assert_eq!(
        statuses(&replies),
        vec!["SET", "APPEND", "APPEND", "FOREACH", "RETURNING"]
    );
    assert_eq!(
        replies.last().unwrap(),
        &serde_json::json!({"status": "RETURNING", "output": ["a!", "b!"]})
    );
}

#[test]
fn delegate_right_lets_owner_extend_chains() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            r#"create principal alice "a""#,
            r#"set x = "v""#,
            "set delegation x admin delegate -> alice",
            "set delegation x admin write -> alice",
            "***",
        ],
    );
    assert_eq!(
        statuses(&replies),
        vec!["CREATE_PRINCIPAL", "SET", "SET_DELEGATION", "SET_DELEGATION"]
    );

    let (replies, _) = run(
        &store,
        &[
            r#"as principal alice password "a" do"#,
            "set delegation x alice write -> admin",
            "***",
        ],
    );
    assert_eq!(statuses(&replies), vec!["SET_DELEGATION"]);
}

// === Authentication ===

#[test]
fn unknown_principal_fails_wrong_password_denies() {
    let store = new_store();
    let (replies, _) = run(&store, &[r#"as principal ghost password "x" do"#, "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);

    let (replies, _) = run(&store, &[r#"as principal admin password "wrong" do"#, "***"]);
    assert_eq!(statuses(&replies), vec!["DENIED"]);
}

#[test]
fn first_line_must_authenticate() {
    let store = new_store();
    let (replies, _) = run(&store, &[r#"set x = "v""#, "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

#[test]
fn auth_command_in_body_fails() {
    let store = new_store();
    let (replies, _) = run(&store, &[AUTH_ADMIN, AUTH_ADMIN, "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

// === Framing ===

#[test]
fn blank_and_comment_lines_are_skipped() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            "",
            "// leading note",
            r#"set x = "v" // trailing note"#,
            "",
            "***",
        ],
    );
    assert_eq!(statuses(&replies), vec!["SET"]);
}

#[test]
fn parse_error_fails_the_program() {
    let store = new_store();
    let (replies, _) = run(&store, &[AUTH_ADMIN, r#"set x = "v""#, "set = broken", "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

#[test]
fn commands_after_return_fail() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[AUTH_ADMIN, r#"set x = "v""#, "return x", r#"set y = "w""#, "***"],
    );
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

#[test]
fn blank_lines_may_separate_return_from_terminator() {
    let store = new_store();
    let (replies, _) = run(&store, &[AUTH_ADMIN, r#"return "ok""#, "", "***"]);
    assert_eq!(
        replies,
        vec![serde_json::json!({"status": "RETURNING", "output": "ok"})]
    );
}

#[test]
fn missing_terminator_discards_everything_silently() {
    let store = new_store();
    let (replies, outcome) = run(&store, &[AUTH_ADMIN, r#"set x = "v""#]);
    assert!(replies.is_empty());
    assert_eq!(outcome, Outcome::Done);
    // And nothing was committed.
    let (replies, _) = run(&store, &[AUTH_ADMIN, "return x", "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

#[test]
fn oversized_program_fails() {
    let store = new_store();
    let big = format!(r#"set x = "{}""#, "a".repeat(65_000));
    let mut lines = vec![AUTH_ADMIN.to_string()];
    for _ in 0..16 {
        lines.push(big.clone());
    }
    lines.push("***".to_string());
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let (replies, _) = run(&store, &refs);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

// === Error short-circuiting and atomicity ===

#[test]
fn first_error_suppresses_queued_replies_and_commit() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            r#"create principal alice "a""#,
            r#"set x = "v""#,
            "***",
        ],
    );
    assert_eq!(statuses(&replies), vec!["CREATE_PRINCIPAL", "SET"]);

    // alice may not create principals: single DENIED, nothing else.
    let (replies, _) = run(
        &store,
        &[
            r#"as principal alice password "a" do"#,
            r#"set mine = "1""#,
            r#"create principal bob "b""#,
            "***",
        ],
    );
    assert_eq!(statuses(&replies), vec!["DENIED"]);
    // The set before the denial was not committed.
    let (replies, _) = run(&store, &[AUTH_ADMIN, "return mine", "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

#[test]
fn non_admin_exit_is_denied() {
    let store = new_store();
    run(&store, &[AUTH_ADMIN, r#"create principal alice "a""#, "***"]);
    let (replies, outcome) = run(
        &store,
        &[r#"as principal alice password "a" do"#, "exit", "***"],
    );
    assert_eq!(statuses(&replies), vec!["DENIED"]);
    assert_eq!(outcome, Outcome::Done);
}

// === Locals, records, filtering ===

#[test]
fn locals_do_not_survive_the_program() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[AUTH_ADMIN, r#"local tmp = "v""#, "return tmp", "***"],
    );
    assert_eq!(
        replies,
        vec![serde_json::json!({"status": "RETURNING", "output": "v"})]
    );
    let (replies, _) = run(&store, &[AUTH_ADMIN, "return tmp", "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}

#[test]
fn records_round_trip_through_the_wire() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            r#"set r = { fst = "a", snd = "b" }"#,
            "return r",
            "***",
        ],
    );
    assert_eq!(
        replies.last().unwrap(),
        &serde_json::json!({"status": "RETURNING", "output": {"fst": "a", "snd": "b"}})
    );
}

#[test]
fn filtereach_keeps_matching_elements() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            "set xs = []",
            r#"append to xs with "keep""#,
            r#"append to xs with "drop""#,
            r#"append to xs with "keep""#,
            r#"filtereach y in xs with equal(y, "keep")"#,
            "return xs",
            "***",
        ],
    );
    assert_eq!(
        replies.last().unwrap(),
        &serde_json::json!({"status": "RETURNING", "output": ["keep", "keep"]})
    );
}

#[test]
fn split_and_let_compose() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            r#"set full = "ab--cd""#,
            r#"set parts = split(full, "ab")"#,
            r#"return let z = parts.snd in tolower(concat("X", z))"#,
            "***",
        ],
    );
    assert_eq!(
        replies.last().unwrap(),
        &serde_json::json!({"status": "RETURNING", "output": "x--cd"})
    );
}

#[test]
fn return_flattens_nested_lists() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[
            AUTH_ADMIN,
            "set xs = []",
            "set ys = []",
            r#"append to ys with "b""#,
            r#"append to xs with "a""#,
            "append to xs with ys",
            "return xs",
            "***",
        ],
    );
    assert_eq!(
        replies.last().unwrap(),
        &serde_json::json!({"status": "RETURNING", "output": ["a", "b"]})
    );
}

#[test]
fn change_password_takes_effect_after_commit() {
    let store = new_store();
    let (replies, _) = run(
        &store,
        &[AUTH_ADMIN, r#"change password admin "rotated""#, "***"],
    );
    assert_eq!(statuses(&replies), vec!["CHANGE_PASSWORD"]);
    let (replies, _) = run(&store, &[AUTH_ADMIN, "***"]);
    assert_eq!(statuses(&replies), vec!["DENIED"]);
    let (replies, _) = run(
        &store,
        &[r#"as principal admin password "rotated" do"#, "***"],
    );
    assert!(replies.is_empty());
}

// === Timeouts ===

/// Yields its buffered bytes, then fails like a socket whose read deadline
/// fired.
struct StallAfter(io::Cursor<Vec<u8>>);

impl Read for StallAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::WouldBlock, "read deadline")),
            n => Ok(n),
        }
    }
}

#[test]
fn stalled_read_times_out_mid_program() {
    let store = new_store();
    let partial = format!("{AUTH_ADMIN}\nset x = \"v\"\n");
    let reader = io::BufReader::new(StallAfter(io::Cursor::new(partial.into_bytes())));
    let mut out: Vec<u8> = Vec::new();
    let outcome = Handler::new(Arc::clone(&store)).execute(reader, &mut out);
    assert_eq!(outcome, Outcome::Done);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text, "{\"status\":\"TIMEOUT\"}\n");
    // The partial program left no trace.
    let (replies, _) = run(&store, &[AUTH_ADMIN, "return x", "***"]);
    assert_eq!(statuses(&replies), vec!["FAILED"]);
}
