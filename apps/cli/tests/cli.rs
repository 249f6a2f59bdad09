use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const MACHINE: &str = "#config_version=3
switches:
  s_trough1: {number: 1}
  s_trough2: {number: 2}
  s_plunger: {number: 3}
coils:
  c_trough: {number: 1}
  c_plunger: {number: 2}
ball_devices:
  bd_trough:
    ball_switches: s_trough1, s_trough2
    eject_coil: c_trough
    eject_targets: bd_plunger
    tags: trough, ball_add_live
  bd_plunger:
    ball_switches: s_plunger
    eject_coil: c_plunger
    eject_timeouts: 3s
";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self { dir: TempDir::new().unwrap() }
    }

    fn file(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }
}

fn cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("pinrig");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn validate_reports_a_valid_machine() {
    let fx = Fixture::new();
    let machine = fx.file("machine.yaml", MACHINE);

    cmd()
        .arg("validate")
        .arg(&machine)
        .assert()
        .success()
        .stdout(contains("Machine config valid"))
        .stdout(contains("1 file(s)"));
}

#[test]
fn validate_lists_every_issue_and_fails() {
    let fx = Fixture::new();
    let machine = fx.file(
        "machine.yaml",
        "#config_version=3
flippers:
  left_flipper:
    main_coil: c_missing
    activation_switch: s_missing
    bogus: 1
",
    );

    cmd()
        .arg("validate")
        .arg(&machine)
        .assert()
        .failure()
        .stderr(contains("flippers.left_flipper.main_coil"))
        .stderr(contains("flippers.left_flipper.activation_switch"))
        .stderr(contains("flippers.left_flipper.bogus"));
}

#[test]
fn skipping_references_accepts_dangling_names() {
    let fx = Fixture::new();
    let machine = fx.file(
        "machine.yaml",
        "#config_version=3
flippers:
  left_flipper:
    main_coil: c_missing
    activation_switch: s_missing
",
    );

    cmd().arg("validate").arg(&machine).args(["--skip", "references"]).assert().success();
}

#[test]
fn missing_version_marker_is_an_error() {
    let fx = Fixture::new();
    let machine = fx.file("machine.yaml", "switches:\n  s_start: {number: 1}\n");

    cmd().arg("validate").arg(&machine).assert().failure().stderr(contains("config_version"));
}

#[test]
fn dump_prints_a_section_as_json() {
    let fx = Fixture::new();
    let machine = fx.file("machine.yaml", MACHINE);

    let output =
        cmd().arg("dump").arg(&machine).args(["--section", "ball_devices"]).output().unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["bd_plunger"]["eject_timeouts"][0], 3000);
    assert_eq!(json["bd_trough"]["ball_capacity"], 2);
    assert_eq!(json["bd_trough"]["eject_targets"][0], "bd_plunger");
}

#[test]
fn later_files_override_earlier_ones() {
    let fx = Fixture::new();
    let base = fx.file("base.yaml", MACHINE);
    let local = fx.file("local.yaml", "#config_version=3\ntiming:\n  hz: 60\n");

    cmd()
        .arg("dump")
        .arg(&base)
        .arg(&local)
        .args(["--section", "timing"])
        .assert()
        .success()
        .stdout(contains("60"));
}

#[test]
fn dump_rejects_unknown_section() {
    let fx = Fixture::new();
    let machine = fx.file("machine.yaml", MACHINE);

    cmd()
        .arg("dump")
        .arg(&machine)
        .args(["--section", "nope"])
        .assert()
        .failure()
        .stderr(contains("Section 'nope'"));
}

#[test]
fn schema_lists_sections_and_describes_one() {
    cmd()
        .arg("schema")
        .assert()
        .success()
        .stdout(contains("ball_devices"))
        .stdout(contains("driver_enabled"));

    cmd()
        .args(["schema", "ball_saves"])
        .assert()
        .success()
        .stdout(contains("active_time"))
        .stdout(contains("balls_to_save"));

    cmd().args(["schema", "nope"]).assert().failure();
}

#[test]
fn run_boots_the_machine_for_a_fixed_duration() {
    let fx = Fixture::new();
    let machine = fx.file("machine.yaml", MACHINE);

    cmd()
        .arg("run")
        .arg(&machine)
        .args(["--duration-ms", "200"])
        .assert()
        .success()
        .stdout(contains("init_phase_1"))
        .stdout(contains("machine_reset_phase_3"))
        .stdout(contains("Stopped at 200 ms"))
        .stdout(contains("bd_trough=0"));
}

#[test]
fn run_uses_the_given_ball_count() {
    let fx = Fixture::new();
    let machine = fx.file("machine.yaml", MACHINE);

    cmd()
        .arg("run")
        .arg(&machine)
        .args(["--duration-ms", "50", "--balls-known", "4"])
        .assert()
        .success()
        .stdout(contains("4 ball(s) known"));
}

#[test]
fn no_arguments_prints_help() {
    cmd().assert().failure().stderr(contains("Usage").and(contains("validate")));
}
