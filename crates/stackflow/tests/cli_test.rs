#![allow(deprecated)] // cargo_bin is fine while the bin lives in this package

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;

const WEB_STACK: &str = r#"
stack "web"

resource "sg" kind="security-group" {
    ingress {
        peer "0.0.0.0/0"
        port 80
    }
}

resource "vm" kind="compute-instance" {
    instance_type "t3.micro"
    security_group (ref)"sg.id"
}

output "Public DNS" (ref)"vm.public_dns_name"
"#;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_apply_help_mentions_yes() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.args(["apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_validate_without_project() {
    let project = TestProject::new();
    project.command().arg("validate").assert().failure();
}

#[test]
fn test_validate_valid_stack() {
    let project = TestProject::new();
    project.write_stack_kdl(WEB_STACK);

    project
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stack is valid"))
        .stdout(predicate::str::contains("Resources: 2"))
        .stdout(predicate::str::contains("Public DNS"));
}

#[test]
fn test_validate_reports_cycle() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
resource "a" kind="role" { next (ref)"b.id" }
resource "b" kind="role" { next (ref)"c.id" }
resource "c" kind="role" { next (ref)"a.id" }
"#,
    );

    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("a -> b -> c -> a"));
}

#[test]
fn test_validate_reports_dangling_reference() {
    let project = TestProject::new();
    project.write_stack_kdl(r#"resource "vm" kind="compute-instance" { sg (ref)"ghost.id" }"#);

    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_graph_json_is_in_dependency_order() {
    let project = TestProject::new();
    project.write_stack_kdl(WEB_STACK);

    let output = project
        .command()
        .args(["graph", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = graph["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["logical_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["sg", "vm"]);
}

#[test]
fn test_plan_apply_outputs_destroy() {
    let project = TestProject::new();
    project.write_stack_kdl(WEB_STACK);

    project
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("+ sg"))
        .stdout(predicate::str::contains("2 to create"));

    // Without --yes nothing is applied
    project
        .command()
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
    assert!(!project.path().join(".stackflow/web.state.json").exists());

    project
        .command()
        .args(["apply", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Apply complete"))
        .stdout(predicate::str::contains("Public DNS"));
    assert!(project.path().join(".stackflow/web.state.json").exists());

    project
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));

    project
        .command()
        .args(["outputs", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("compute.local"));

    project
        .command()
        .args(["destroy", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Destroy complete"));

    project
        .command()
        .arg("outputs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No outputs recorded"));
}

#[test]
fn test_apply_records_added_output() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
stack "api"
resource "gw" kind="api-gateway"
"#,
    );
    project.command().args(["apply", "--yes"]).assert().success();

    project.write_stack_kdl(
        r#"
stack "api"
resource "gw" kind="api-gateway"
output "Endpoint" (ref)"gw.url"
"#,
    );
    project
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("~ outputs"))
        .stdout(predicate::str::contains("0 to create, 0 to update, 0 to delete"));

    project
        .command()
        .args(["apply", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Outputs updated"))
        .stdout(predicate::str::contains("Endpoint"));

    project
        .command()
        .arg("outputs")
        .assert()
        .success()
        .stdout(predicate::str::contains("execute-api"));

    project
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));
}

#[test]
fn test_settings_relocate_state() {
    let project = TestProject::new();
    project.write_stack_kdl(WEB_STACK);
    let state_dir = project.path().join("custom-state");
    project.write_file(
        ".config/config.yaml",
        &format!("state_dir: {}\n", state_dir.display()),
    );

    project.command().args(["apply", "--yes"]).assert().success();
    assert!(state_dir.join("web.state.json").exists());
}

#[test]
fn test_demo_stack_applies() {
    let project = TestProject::new();
    let demo = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos/cdk-101/stack.kdl");
    let state_dir = project.path().join("state");
    project.write_file(
        ".config/config.yaml",
        &format!("state_dir: {}\n", state_dir.display()),
    );

    project
        .command()
        .arg("--file")
        .arg(&demo)
        .args(["apply", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EC2 Public DNS Name"))
        .stdout(predicate::str::contains("API Gateway URL"))
        .stdout(predicate::str::contains("awsug-s3-bucket-wyne.s3-website"));

    assert!(
        state_dir
            .join("buckets/awsug-s3-bucket-wyne/index.html")
            .exists()
    );
}
