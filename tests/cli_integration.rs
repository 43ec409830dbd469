// CLI integration tests: the binary against an in-process mock store.
mod common;

use common::MockRegatta;
use serde_json::Value;
use std::process::{Command, Output};

fn cmd(mock: &MockRegatta) -> Command {
    let exe = env!("CARGO_BIN_EXE_regatta-client");
    let mut command = Command::new(exe);
    command
        .env_remove("RUST_LOG")
        .args(["--endpoint", &mock.endpoint()]);
    command
}

fn run(mock: &MockRegatta, args: &[&str]) -> Output {
    cmd(mock).args(args).output().expect("run regatta-client")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

fn stderr_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stderr);
    let line = text.lines().last().expect("stderr line");
    serde_json::from_str(line).expect("stderr json")
}

fn seeded(page_size: usize) -> MockRegatta {
    let mock = MockRegatta::with_page_size(page_size);
    for idx in 1..=4 {
        mock.insert(
            "users",
            format!("user/{idx}").as_bytes(),
            format!("{{\"id\":{idx}}}").as_bytes(),
        );
    }
    mock.insert("users", b"admin", b"root");
    mock
}

#[test]
fn range_plain_prints_every_key_in_order() {
    let mock = seeded(2);
    let output = run(&mock, &["range", "users"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout(&output),
        "admin: root\nuser/1: {\"id\":1}\nuser/2: {\"id\":2}\nuser/3: {\"id\":3}\nuser/4: {\"id\":4}\n"
    );
}

#[test]
fn range_prefix_jsonl_streams_one_object_per_line() {
    let mock = seeded(2);
    let output = run(&mock, &["range", "users", "user/*", "--output", "jsonl"]);
    assert!(output.status.success(), "{output:?}");
    let lines: Vec<Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["key"], "user/1");
    assert_eq!(lines[3]["value"], "{\"id\":4}");
}

#[test]
fn range_json_array_respects_limit() {
    let mock = seeded(2);
    let output = run(&mock, &["range", "users", "--limit", "3", "-o", "json"]);
    assert!(output.status.success(), "{output:?}");
    let value: Value = serde_json::from_str(&stdout(&output)).expect("json array");
    let items = value.as_array().expect("array");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["key"], "admin");
    assert_eq!(items[2]["key"], "user/2");
}

#[test]
fn range_json_array_is_empty_for_empty_result() {
    let mock = seeded(2);
    let output = run(&mock, &["range", "users", "nobody", "-o", "json"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output), "[]\n");
}

#[test]
fn range_values_only_omits_keys() {
    let mock = seeded(10);
    let output = run(&mock, &["range", "users", "admin", "-o", "jsonl", "--values-only"]);
    assert!(output.status.success(), "{output:?}");
    let line: Value = serde_json::from_str(stdout(&output).trim()).expect("json");
    assert_eq!(line, serde_json::json!({"value": "root"}));
}

#[test]
fn range_explicit_end_is_half_open() {
    let mock = seeded(10);
    let output = run(&mock, &["range", "users", "user/2", "user/4"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output), "user/2: {\"id\":2}\nuser/3: {\"id\":3}\n");
}

#[test]
fn range_with_empty_explicit_end_selects_nothing() {
    let mock = seeded(10);
    let output = run(&mock, &["range", "users", "admin", ""]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());
    let calls = mock.range_calls();
    assert_eq!(calls[0].range_end.as_deref(), Some(&b""[..]));
}

#[test]
fn put_binary_value_and_read_it_back_as_base64() {
    let mock = MockRegatta::start();
    mock.create_table("blobs");
    let put = run(&mock, &["put", "blobs", "raw", "AP8Q", "--binary"]);
    assert!(put.status.success(), "{put:?}");
    assert!(put.stdout.is_empty());

    let stored = mock.table("blobs").expect("table");
    assert_eq!(stored.get(&b"raw"[..].to_vec()), Some(&vec![0x00, 0xff, 0x10]));

    let range = run(&mock, &["range", "blobs", "raw", "--binary"]);
    assert!(range.status.success(), "{range:?}");
    assert_eq!(stdout(&range), "cmF3: AP8Q\n");
}

#[test]
fn put_rejects_invalid_base64_as_usage_error() {
    let mock = MockRegatta::start();
    mock.create_table("blobs");
    let output = run(&mock, &["put", "blobs", "raw", "not base64!", "--binary"]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(mock.table("blobs").expect("table").is_empty());
}

#[test]
fn delete_prefix_is_silent_and_removes_matching_keys() {
    let mock = seeded(10);
    let output = run(&mock, &["delete", "users", "user/*"]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());
    let remaining = mock.table("users").expect("table");
    assert_eq!(remaining.keys().cloned().collect::<Vec<_>>(), vec![b"admin".to_vec()]);
}

#[test]
fn delete_wildcard_empties_table() {
    let mock = seeded(10);
    let output = run(&mock, &["delete", "users", "*"]);
    assert!(output.status.success(), "{output:?}");
    assert!(mock.table("users").expect("table").is_empty());
}

#[test]
fn table_lists_sorted_names_without_color_when_piped() {
    let mock = MockRegatta::start();
    mock.create_table("example2");
    mock.create_table("example1");
    let output = run(&mock, &["table"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output), "example1\nexample2\n");
}

#[test]
fn version_prints_client_and_server_versions() {
    let mock = MockRegatta::start();
    let output = run(&mock, &["version"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(
        stdout(&output),
        format!(
            "client version: {}\nserver version: v0.5.0\n",
            env!("CARGO_PKG_VERSION")
        )
    );
}

#[test]
fn version_reports_unknown_server_when_unreachable() {
    let mock = MockRegatta::start();
    mock.fail_with_status(503);
    let output = run(&mock, &["version"]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).ends_with("server version: unknown\n"));
    let err = stderr_json(&output);
    let message = err["error"]["message"].as_str().expect("message");
    assert!(message.starts_with("Regatta is not reachable: "), "{message}");
}

#[test]
fn missing_table_exits_with_not_found() {
    let mock = MockRegatta::start();
    let output = run(&mock, &["range", "ghost"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "NotFound");
    assert_eq!(
        err["error"]["message"],
        "The requested resource was not found: table not found"
    );
}

#[test]
fn remote_rpc_error_exits_with_rpc_code() {
    let mock = seeded(10);
    mock.fail_with(500, "Internal", "internal Regatta error");
    let output = run(&mock, &["range", "users"]);
    assert_eq!(output.status.code(), Some(5));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["code"], "Internal");
    assert_eq!(
        err["error"]["message"],
        "Received RPC error from Regatta, code 'Internal' with message 'internal Regatta error'"
    );
}

#[test]
fn invalid_timeout_is_usage_error() {
    let mock = MockRegatta::start();
    let output = run(&mock, &["table", "--timeout", "soon"]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(err["error"]["hint"].as_str().expect("hint").contains("ms|s|m|h"));
}

#[test]
fn unknown_subcommand_is_usage_error_with_hint() {
    let mock = MockRegatta::start();
    let output = run(&mock, &["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr_json(&output);
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(err["error"]["hint"].as_str().expect("hint").contains("--help"));
}

#[test]
fn completion_emits_script_for_shell() {
    let mock = MockRegatta::start();
    let output = run(&mock, &["completion", "bash"]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("regatta-client"));
}
