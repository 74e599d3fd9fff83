//! Real subprocess invocation of a shell-script extension.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use beacon::core::action::{Params, PostEffects};
use beacon::core::error::BeaconError;
use beacon::core::page::Page;
use beacon::executor::{Invocation, Outcome, execute};
use beacon::io::extension::{Extension, Invoker, Payload, ProcessInvoker, load_extension};
use serde_json::{Value, json};

const SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  echo) printf '%s' "$BEACON_PAYLOAD" ;;
  stdin) cat ;;
  items) printf '{"title":"Files","items":[{"id":"a","title":"a.txt"}]}' ;;
  fail) echo "bad things" >&2; exit 3 ;;
  slow) exec sleep 5 ;;
  noisy|build) i=0; while [ $i -lt 200 ]; do echo "0123456789"; i=$((i+1)); done ;;
esac
"#;

fn write_extension(dir: &Path) {
    let manifest = json!({
        "title": "Shell tools",
        "entrypoint": ["sh", "main.sh"],
        "commands": [
            {"name": "echo", "mode": "silent"},
            {"name": "stdin", "mode": "silent"},
            {"name": "items", "mode": "list"},
            {"name": "fail", "mode": "silent"},
            {"name": "slow", "mode": "silent"},
            {"name": "noisy", "mode": "list"},
            {"name": "build", "mode": "silent"}
        ]
    });
    fs::write(dir.join("manifest.json"), manifest.to_string()).expect("write manifest");
    fs::write(dir.join("main.sh"), SCRIPT).expect("write script");
}

fn load(dir: &Path) -> Extension {
    write_extension(dir);
    load_extension("sh", dir).expect("load extension")
}

fn payload(command: &str, params: Value) -> Payload {
    let Value::Object(params) = params else {
        panic!("params must be an object");
    };
    Payload {
        command: command.to_string(),
        params: params.into_iter().collect(),
        preferences: Params::new(),
    }
}

fn invocation(extension: &Arc<Extension>, name: &str) -> Invocation {
    Invocation {
        extension: Arc::clone(extension),
        command: extension.command(name).expect("command").clone(),
        payload: payload(name, json!({})),
        post: PostEffects::default(),
    }
}

fn invoker() -> ProcessInvoker {
    ProcessInvoker {
        timeout: Duration::from_secs(10),
        output_limit_bytes: 64 * 1024,
    }
}

#[test]
fn payload_reaches_environment_and_stdin() {
    let temp = tempfile::tempdir().expect("tempdir");
    let extension = load(temp.path());
    let sent = payload("echo", json!({"query": "cat"}));

    let from_env = invoker().capture(&extension, &sent).expect("capture env");
    assert_eq!(from_env.truncated, 0);
    let from_env: Value = serde_json::from_slice(&from_env.stdout).expect("env json");
    assert_eq!(
        from_env,
        json!({"command": "echo", "params": {"query": "cat"}, "preferences": {}})
    );

    let stdin_payload = payload("stdin", json!({"query": "cat"}));
    let from_stdin = invoker()
        .capture(&extension, &stdin_payload)
        .expect("capture stdin");
    let from_stdin: Value = serde_json::from_slice(&from_stdin.stdout).expect("stdin json");
    assert_eq!(from_stdin["command"], "stdin");
    assert_eq!(from_stdin["params"]["query"], "cat");
}

#[test]
fn list_mode_output_becomes_page() {
    let temp = tempfile::tempdir().expect("tempdir");
    let extension = Arc::new(load(temp.path()));

    let outcome = execute(&invoker(), &invocation(&extension, "items")).expect("execute");
    let Outcome::Page(Page::List(list)) = outcome else {
        panic!("expected list page, got {outcome:?}");
    };
    assert_eq!(list.title, "Files");
    assert_eq!(list.items[0].title, "a.txt");
}

#[test]
fn non_zero_exit_keeps_stderr() {
    let temp = tempfile::tempdir().expect("tempdir");
    let extension = load(temp.path());

    let err = invoker()
        .capture(&extension, &payload("fail", json!({})))
        .expect_err("fail");
    let BeaconError::Execution { message, stderr } = &err else {
        panic!("expected execution error, got {err:?}");
    };
    assert_eq!(message, "fail exited with status 3");
    assert_eq!(stderr.as_deref(), Some("bad things"));
}

#[test]
fn slow_command_times_out() {
    let temp = tempfile::tempdir().expect("tempdir");
    let extension = load(temp.path());
    let invoker = ProcessInvoker {
        timeout: Duration::from_millis(200),
        ..invoker()
    };

    let err = invoker
        .capture(&extension, &payload("slow", json!({})))
        .expect_err("timeout");
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[test]
fn oversized_output_is_rejected_where_it_is_decoded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let extension = Arc::new(load(temp.path()));
    let invoker = ProcessInvoker {
        output_limit_bytes: 100,
        ..invoker()
    };

    let captured = invoker
        .capture(&extension, &payload("noisy", json!({})))
        .expect("capture");
    assert_eq!(captured.stdout.len(), 100);
    assert_eq!(captured.truncated, 2100);

    let err = execute(&invoker, &invocation(&extension, "noisy")).expect_err("too much output");
    assert!(matches!(err, BeaconError::Execution { .. }), "{err}");
    assert!(err.to_string().contains("more output than allowed"), "{err}");
}

#[test]
fn silent_command_with_long_output_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");
    let extension = Arc::new(load(temp.path()));
    let invoker = ProcessInvoker {
        output_limit_bytes: 100,
        ..invoker()
    };

    let outcome = execute(&invoker, &invocation(&extension, "build")).expect("silent build");
    assert_eq!(outcome, Outcome::Done(PostEffects::default()));
}
