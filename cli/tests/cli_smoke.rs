//! Process-level smoke tests for the `agent` binary: argument parsing and
//! the short-circuit flags that don't need a configured provider.

use std::process::Command;

fn run_agent(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_agent"))
        .args(args)
        .output()
        .expect("failed to run agent binary")
}

#[test]
fn help_succeeds_and_lists_message_flag() {
    let out = run_agent(&["--help"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--message"));
    assert!(stdout.contains("--model"));
}

#[test]
fn json_schema_prints_valid_json_with_required_fields() {
    let out = run_agent(&["--json-schema"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    let required = value["required"].as_array().expect("required array");
    let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();
    assert!(names.contains(&"ok"));
    assert!(names.contains(&"toolCalls"));
}

#[test]
fn missing_message_fails_with_invalid_option_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("agent.json");
    let auth_path = dir.path().join("agent.auth.json");
    let out = Command::new(env!("CARGO_BIN_EXE_agent"))
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "--auth-config",
            auth_path.to_str().unwrap(),
            "--model",
            "openai/gpt-4o",
        ])
        .output()
        .expect("failed to run agent binary");
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));
}
