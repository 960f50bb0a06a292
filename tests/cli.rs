use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn valid_config_json() -> &'static str {
    r#"
{
  "clock_data": {
    "matrix_width": 64,
    "timer_face": "timer"
  },
  "clock_faces": [
    {
      "name": "always",
      "bg_color": { "built_in_color": "black" },
      "time_periods": [
        { "start_hour": 0, "start_minute": 0, "end_hour": 23, "end_minute": 59 }
      ],
      "text_lines": [
        { "x_position": -1, "y_position": 10, "text": "{hour}:{minute}" }
      ]
    },
    {
      "name": "timer",
      "text_lines": [
        { "x_position": -1, "y_position": 20, "text": "{timer}" }
      ]
    }
  ],
  "notifications": [
    { "hour": 7, "minute": 30, "message": "wake up" }
  ]
}
"#
}

#[test]
fn check_succeeds_with_valid_config() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("matrix_config.json");
    fs::write(&config, valid_config_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("matrixclock");
    cmd.arg("--check")
        .arg("--config")
        .arg(config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Active face"))
        .stdout(predicate::str::contains("Clock faces: 2"))
        .stdout(predicate::str::contains("Notifications: 1"));
}

#[test]
fn diagnostics_alias_is_accepted() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("matrix_config.json");
    fs::write(&config, valid_config_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("matrixclock");
    cmd.arg("--diagnostics")
        .arg("--config")
        .arg(config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Timer face: timer"));
}

#[test]
fn malformed_json_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("matrix_config.json");
    fs::write(&config, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("matrixclock");
    cmd.arg("--check")
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn config_without_faces_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("matrix_config.json");
    fs::write(&config, r#"{ "clock_faces": [] }"#).expect("write json");

    let mut cmd = cargo_bin_cmd!("matrixclock");
    cmd.arg("--check")
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("defines no clock faces"));
}

#[test]
fn duplicate_face_names_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("matrix_config.json");
    fs::write(
        &config,
        r#"{ "clock_faces": [ { "name": "Night" }, { "name": "night" } ] }"#,
    )
    .expect("write json");

    let mut cmd = cargo_bin_cmd!("matrixclock");
    cmd.arg("--check")
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate clock face name"));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("absent.json");

    let mut cmd = cargo_bin_cmd!("matrixclock");
    cmd.arg("--check")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn zero_tick_interval_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("matrix_config.json");
    fs::write(&config, valid_config_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("matrixclock");
    cmd.arg("--check")
        .arg("--tick-ms")
        .arg("0")
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tick-ms must be greater than zero"));
}
