//! Runs the compiled binary end to end

use crate::common::config_file;
use std::process::{Command, Output};

fn moduleflow(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_moduleflow"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("run moduleflow binary")
}

const SAMPLE_CONFIG: &str = r#"
[logging]
level = "warn"

[[modules]]
name = "greeter"
kind = "echo"
timer = { interval_ms = 20 }

[[modules]]
name = "tally"
kind = "counter"
threads = 2
"#;

#[test]
fn test_list_kinds_prints_builtin_kinds() {
    let output = moduleflow(&["--list-kinds", "--no-color", "--log-level", "off"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for kind in ["counter", "echo", "failing"] {
        assert!(stdout.contains(kind), "missing {kind} in:\n{stdout}");
    }
}

#[test]
fn test_runs_configured_modules_and_reports_status() {
    let config = config_file(SAMPLE_CONFIG);
    let path = config.path().to_str().unwrap();
    let output = moduleflow(&[
        "--config-file",
        path,
        "--duration-secs",
        "0",
        "--status",
        "--no-color",
    ]);
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scheduler"));
    assert!(stdout.contains("greeter"));
    assert!(stdout.contains("tally"));
    assert!(stdout.contains("stopped"));
    assert!(!stdout.contains("running"));
}

#[test]
fn test_missing_config_file_fails() {
    let output = moduleflow(&["--config-file", "/definitely/not/here.toml", "-d", "0"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_invalid_config_fails() {
    let config = config_file(
        r#"
[[modules]]
name = "broken"
kind = "no-such-kind"
"#,
    );
    let output = moduleflow(&[
        "--config-file",
        config.path().to_str().unwrap(),
        "-d",
        "0",
        "--log-level",
        "off",
    ]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_conflicting_color_flags_are_rejected() {
    let output = moduleflow(&["--color", "--no-color", "--list-kinds"]);
    assert!(!output.status.success());
}
