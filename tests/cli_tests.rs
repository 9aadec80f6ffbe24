//! Integration tests for the tfgen CLI
//!
//! These run the compiled binary and only cover paths that fail before any
//! network or planning tool access.

use std::process::Command;

/// Get the path to the tfgen binary
fn tfgen_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test executable name
    path.pop(); // Remove deps directory

    path.push("tfgen");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    path
}

/// Run tfgen with a clean TFGEN_* environment
fn run_tfgen(args: &[&str]) -> std::process::Output {
    let mut command = Command::new(tfgen_binary());
    for (key, _) in std::env::vars() {
        if key.starts_with("TFGEN_") {
            command.env_remove(key);
        }
    }
    command.args(args).output().expect("Failed to execute tfgen")
}

#[test]
fn test_tfgen_version() {
    let output = run_tfgen(&["--version"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tfgen"));
}

#[test]
fn test_tfgen_help() {
    let output = run_tfgen(&["--help"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("generate"));
}

#[test]
fn test_generate_help() {
    let output = run_tfgen(&["generate", "--help"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--output-dir"));
    assert!(stdout.contains("--clobber"));
    assert!(stdout.contains("--output-format"));
    assert!(stdout.contains("TFGEN_GRAFANA_URL"));
}

#[test]
fn test_generate_requires_output_dir() {
    let output = run_tfgen(&["generate"]);

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--output-dir"));
}

#[test]
fn test_generate_requires_credentials() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("generated");
    let output = run_tfgen(&["generate", "--output-dir", dir.to_str().unwrap()]);

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--grafana-url"));
    assert!(!dir.exists());
}

#[test]
fn test_generate_refuses_existing_dir_without_clobber() {
    let temp = tempfile::tempdir().unwrap();
    let marker = temp.path().join("keep.tf");
    std::fs::write(&marker, "# keep\n").unwrap();

    let output = run_tfgen(&[
        "generate",
        "--output-dir",
        temp.path().to_str().unwrap(),
        "--grafana-url",
        "http://127.0.0.1:1",
        "--grafana-auth",
        "admin:admin",
    ]);

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already exists. Use --clobber to delete it"));
    assert!(marker.exists());
}

#[test]
fn test_generate_rejects_malformed_include_glob() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("generated");

    let output = run_tfgen(&[
        "generate",
        "--output-dir",
        dir.to_str().unwrap(),
        "--grafana-url",
        "http://127.0.0.1:1",
        "--grafana-auth",
        "admin:admin",
        "--include-resources",
        "grafana_folder.[",
    ]);

    assert!(!output.status.success());
    assert!(!dir.exists());
}

#[test]
fn test_generate_rejects_invalid_provider_version() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("generated");

    let output = run_tfgen(&[
        "generate",
        "--output-dir",
        dir.to_str().unwrap(),
        "--grafana-url",
        "http://127.0.0.1:1",
        "--grafana-auth",
        "admin:admin",
        "--terraform-provider-version",
        "latest",
    ]);

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid provider version"));
}
