//! Integration tests driving the `tabrelay` binary

use std::process::{Command, Output};
use tempfile::TempDir;

fn tabrelay(env_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tabrelay"))
        .arg("--quiet")
        .args(args)
        .env("HOME", env_dir.path())
        .env("XDG_CONFIG_HOME", env_dir.path())
        .env("TABRELAY__STORAGE__PATH", env_dir.path().join("store"))
        .env_remove("TABRELAY_LOG")
        .output()
        .expect("failed to run tabrelay")
}

#[test]
fn test_simulate_reports_injection() {
    let dir = TempDir::new().unwrap();
    let output = tabrelay(&dir, &["simulate", "--tab", "7"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no_surface -> injecting"));
    assert!(stdout.contains("injecting -> surface_ready"));
    assert!(stdout.contains("Injections: 1"));
    assert!(stdout.contains("Controller visible: true"));
}

#[test]
fn test_simulate_with_surface_present_skips_injection() {
    let dir = TempDir::new().unwrap();
    let output = tabrelay(&dir, &["simulate", "--tab", "7", "--surface-present"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Injections: 0"));
    assert!(stdout.contains("Deliveries: 1"));
}

#[test]
fn test_settings_persist_between_runs() {
    let dir = TempDir::new().unwrap();

    let set = tabrelay(&dir, &["set", "activeModel", "llama3"]);
    assert!(set.status.success());

    let get = tabrelay(&dir, &["get", "activeModel"]);
    assert!(get.status.success());
    assert_eq!(String::from_utf8_lossy(&get.stdout).trim(), "llama3");

    let reset = tabrelay(&dir, &["reset", "activeModel"]);
    assert!(reset.status.success());
    let get = tabrelay(&dir, &["get", "activeModel"]);
    assert_eq!(String::from_utf8_lossy(&get.stdout).trim(), "(unset)");
}

#[test]
fn test_unknown_setting_fails_with_hint() {
    let dir = TempDir::new().unwrap();
    let output = tabrelay(&dir, &["get", "isVisible"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown setting 'isVisible'"));
    assert!(stderr.contains("activeModel"));
}
