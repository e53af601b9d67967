//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `fleetform` binary and checks exit
//! codes, stdout and stderr.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn fleetform() -> Command {
    let mut cmd = cargo_bin_cmd!("fleetform");
    cmd.current_dir(workspace_root());
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fleet.toml");
    fs::write(&path, body).expect("write config");
    path
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    fleetform()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "EC2 autoscaling fleet template generator",
        ));
}

#[test]
fn version_exits_0() {
    fleetform()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetform"));
}

#[test]
fn no_subcommand_is_a_usage_error() {
    fleetform().assert().failure().code(2);
}

// ──────────────────────────────────────────────
// 2. generate
// ──────────────────────────────────────────────

#[test]
fn generate_prints_template_to_stdout() {
    let output = fleetform().arg("generate").output().expect("run");
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(doc["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(
        doc["Resources"]["myLaunchConfig"]["Properties"]["ImageId"],
        serde_json::json!({"Fn::FindInMap": ["RegionMap", {"Ref": "AWS::Region"}, "AMIid"]})
    );
    assert!(String::from_utf8_lossy(&output.stdout).ends_with("}\n"));
}

#[test]
fn generate_out_writes_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("nested").join("fleet.json");
    fleetform()
        .args(["generate", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("wrote"));
    let text = fs::read_to_string(&out).expect("template written");
    assert!(text.contains("\"AWSTemplateFormatVersion\""));
}

#[test]
fn generate_write_uses_program_name() {
    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("fleetform");
    cmd.current_dir(dir.path())
        .args(["generate", "--write", "--quiet"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
    assert!(dir.path().join("fleetform.json").exists());
}

#[test]
fn generate_out_and_write_conflict() {
    fleetform()
        .args(["generate", "--write", "--out", "x.json"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn generate_honors_config_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
description = "web tier"
ami_id = "ami-0abc"
availability_zones = ["us-east-1a", "us-east-1b"]

[capacity]
min = 2
max = 6
desired = 3
"#,
    );
    let output = fleetform()
        .args(["generate", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["Description"], "web tier");
    assert_eq!(doc["Parameters"]["DesNumInstances"]["Default"], "3");
    assert_eq!(
        doc["Resources"]["myAutoScalingGroup"]["Properties"]["AvailabilityZones"],
        serde_json::json!(["us-east-1a", "us-east-1b"])
    );
}

#[test]
fn generate_rejects_desired_outside_bounds() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[capacity]\nmin = 1\nmax = 2\ndesired = 5\n");
    fleetform()
        .args(["generate", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("DesNumInstances"));
}

#[test]
fn build_errors_are_reported_as_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[capacity]\nmin = 3\nmax = 2\ndesired = 2\n");
    let output = fleetform()
        .args(["--output", "json", "generate", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).expect("json stderr");
    assert_eq!(err["stage"], "build");
    assert_eq!(err["field"], "Default");
}

#[test]
fn validation_errors_are_reported_as_json_only() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "instance_type = \"x1.huge\"\n");
    let output = fleetform()
        .env_remove("RUST_LOG")
        .args(["--output", "json", "generate", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).expect("json stderr");
    assert_eq!(err["stage"], "validate");
    assert_eq!(err["errors"][0]["kind"], "DefaultNotAllowed");
    assert_eq!(err["errors"][0]["subject"], "InstanceType");
}

#[test]
fn validation_errors_are_printed_once_in_text_mode() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "instance_type = \"x1.huge\"\n");
    let output = fleetform()
        .env_remove("RUST_LOG")
        .args(["check", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr.matches("x1.huge").count(), 1, "{stderr}");
    assert!(!stderr.contains("WARN"));
}

#[test]
fn quiet_silences_validation_errors() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "instance_type = \"x1.huge\"\n");
    fleetform()
        .env_remove("RUST_LOG")
        .args(["generate", "--quiet", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
}

#[test]
fn unknown_config_key_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "instance_typo = \"t3.large\"\n");
    fleetform()
        .args(["generate", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("instance_typo"));
}

#[test]
fn missing_config_file_fails() {
    fleetform()
        .args(["generate", "--config", "no/such/fleet.toml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no/such/fleet.toml"));
}

// ──────────────────────────────────────────────
// 3. check
// ──────────────────────────────────────────────

#[test]
fn check_default_settings_succeeds() {
    fleetform()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("template is valid (9 resources)"));
}

#[test]
fn check_json_output() {
    let output = fleetform()
        .args(["check", "--output", "json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["valid"], true);
    assert_eq!(v["resources"], 9);
}

#[test]
fn check_quiet_prints_nothing() {
    fleetform()
        .args(["check", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 4. validate
// ──────────────────────────────────────────────

#[test]
fn validate_accepts_generated_template() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("fleet.json");
    fleetform()
        .args(["generate", "--quiet", "--out"])
        .arg(&out)
        .assert()
        .success();
    fleetform()
        .arg("validate")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_rejects_unknown_resource_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        r#"{
  "AWSTemplateFormatVersion": "2010-09-09",
  "Parameters": {},
  "Mappings": {},
  "Resources": {
    "Bucket": { "Type": "AWS::S3::Bucket", "Properties": {} }
  }
}"#,
    )
    .unwrap();
    fleetform()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("schema violation"));
}

#[test]
fn validate_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    fleetform()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error parsing JSON"));
}

// ──────────────────────────────────────────────
// 5. digest and settings
// ──────────────────────────────────────────────

#[test]
fn digest_is_stable_across_runs() {
    let first = fleetform().arg("digest").output().expect("run");
    let second = fleetform().arg("digest").output().expect("run");
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
    let hex = String::from_utf8(first.stdout).unwrap();
    assert_eq!(hex.trim().len(), 64);
}

#[test]
fn digest_changes_with_settings() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "instance_type = \"t2.small\"\n");
    let default = fleetform().arg("digest").output().expect("run");
    let custom = fleetform()
        .args(["digest", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    assert!(custom.status.success());
    assert_ne!(default.stdout, custom.stdout);
}

#[test]
fn settings_round_trips_through_config() {
    let dir = TempDir::new().unwrap();
    let output = fleetform().arg("settings").output().expect("run");
    assert!(output.status.success());
    let rendered = String::from_utf8(output.stdout).unwrap();
    assert!(rendered.contains("[capacity]"));

    let config = write_config(&dir, &rendered);
    let from_file = fleetform()
        .args(["digest", "--config"])
        .arg(&config)
        .output()
        .expect("run");
    let default = fleetform().arg("digest").output().expect("run");
    assert_eq!(from_file.stdout, default.stdout);
}
