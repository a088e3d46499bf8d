use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;

mod common;
use common::Sandbox;

const MILAN: [&str; 4] = ["--lat", "45.4642", "--lon", "9.19"];

fn init(sandbox: &Sandbox) {
    sandbox
        .cmd()
        .args(["--test", "init"])
        .assert()
        .success()
        .stdout(contains("Database initialized"));
}

#[test]
fn test_init_creates_database_without_config_in_test_mode() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    assert!(fs::metadata(&sandbox.db).is_ok());
    assert!(!sandbox.dir.path().join(".rattendance/rattendance.conf").exists());
}

#[test]
fn test_init_writes_config_file() {
    let sandbox = Sandbox::new();
    sandbox.cmd().arg("init").assert().success();

    let conf = sandbox.dir.path().join(".rattendance/rattendance.conf");
    let yaml = fs::read_to_string(conf).expect("config written");
    assert!(yaml.contains("database:"));
    assert!(yaml.contains("poll_interval_ms: 1000"));
}

#[test]
fn test_check_in_status_and_check_out() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    sandbox
        .cmd()
        .arg("in")
        .args(MILAN)
        .assert()
        .success()
        .stdout(contains("Checked in").and(contains("Lat: 45.4642, Lon: 9.19")));

    sandbox
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("checked in").and(contains("since")));

    sandbox
        .cmd()
        .arg("in")
        .args(MILAN)
        .assert()
        .failure()
        .stderr(contains("Already checked in"));

    sandbox
        .cmd()
        .arg("out")
        .args(MILAN)
        .assert()
        .success()
        .stdout(contains("Checked out"));

    sandbox
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("checked out"));
}

#[test]
fn test_toggle_alternates() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    sandbox
        .cmd()
        .arg("toggle")
        .args(MILAN)
        .assert()
        .success()
        .stdout(contains("Checked in"));

    sandbox
        .cmd()
        .arg("toggle")
        .args(MILAN)
        .assert()
        .success()
        .stdout(contains("Checked out"));
}

#[test]
fn test_check_out_when_idle_fails() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    sandbox
        .cmd()
        .arg("out")
        .args(MILAN)
        .assert()
        .failure()
        .stderr(contains("Not checked in"));
}

#[test]
fn test_check_in_without_position_writes_nothing() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    sandbox
        .cmd()
        .arg("in")
        .assert()
        .failure()
        .stderr(contains("Could not determine location"));

    sandbox
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("No attendance records"));
}

#[test]
fn test_invalid_coordinates_are_rejected() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    sandbox
        .cmd()
        .args(["in", "--lat", "95", "--lon", "9"])
        .assert()
        .failure()
        .stderr(contains("Invalid coordinates"));
}

#[test]
fn test_users_do_not_share_sessions() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    sandbox.cmd().arg("in").args(MILAN).assert().success();

    sandbox
        .cmd_as("bob")
        .arg("status")
        .assert()
        .success()
        .stdout(contains("checked out"));

    sandbox
        .cmd_as("bob")
        .arg("out")
        .args(MILAN)
        .assert()
        .failure()
        .stderr(contains("Not checked in"));

    sandbox
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(contains("checked in"));
}

#[test]
fn test_list_export_and_log() {
    let sandbox = Sandbox::new();
    init(&sandbox);

    sandbox.cmd().arg("in").args(MILAN).assert().success();
    sandbox.cmd().arg("out").args(MILAN).assert().success();
    sandbox.cmd().arg("in").args(MILAN).assert().success();

    sandbox
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("Attendance of alice").and(contains("Lat: 45.4642, Lon: 9.19")));

    let json_out = sandbox.path("records.json");
    sandbox
        .cmd()
        .args(["export", "--format", "json", "--file", &json_out])
        .assert()
        .success()
        .stdout(contains("JSON export completed: 2 record(s)"));

    let content = fs::read_to_string(&json_out).expect("json written");
    let rows: serde_json::Value = serde_json::from_str(&content).expect("valid json");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert!(rows[0]["checkedOutAt"].is_string());
    assert!(rows[1]["checkedOutAt"].is_null());
    assert_eq!(rows[1]["duration"], "-");

    let csv_out = sandbox.path("records.csv");
    sandbox
        .cmd()
        .args(["export", "--file", &csv_out])
        .assert()
        .success();
    let csv = fs::read_to_string(&csv_out).expect("csv written");
    assert!(csv.starts_with("id,checkedInAt,checkedOutAt,checkInLocation,checkOutLocation,duration"));
    assert_eq!(csv.lines().count(), 3);

    // existing file is kept unless forced
    sandbox
        .cmd()
        .args(["export", "--file", &csv_out])
        .write_stdin("n\n")
        .assert()
        .failure()
        .stderr(contains("not overwritten"));
    sandbox
        .cmd()
        .args(["export", "--file", &csv_out, "--force"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["log", "--print"])
        .assert()
        .success()
        .stdout(
            contains("checkin")
                .and(contains("checkout"))
                .and(contains("export"))
                .and(contains("migration_applied")),
        );
}

#[test]
fn test_config_print_uses_overrides() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "--print"])
        .assert()
        .success()
        .stdout(contains("user_id: alice").and(contains("log_level: warn")));
}
