//! Drive the `hostward` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn hostward(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hostward").unwrap();
    cmd.arg("--config").arg(config).arg("--no-color").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_exits_zero() {
    Command::cargo_bin("hostward")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("assess"));
}

#[test]
fn unknown_category_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    hostward(&dir.path().join("config.toml"))
        .args(["assess", "firmware"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown category"));
}

#[test]
fn categories_lists_every_probe_set() {
    let dir = tempfile::tempdir().unwrap();
    let output = hostward(&dir.path().join("config.toml"))
        .args(["--output", "json", "categories"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let infos: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let infos = infos.as_array().unwrap();
    assert_eq!(infos.len(), 6);
    assert_eq!(infos[0]["category"], "bootloader");
    assert_eq!(infos[0]["policy"]["pass_threshold"], 90);
    assert!(infos[5]["probes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["name"] == "denylisted_entities" && p["veto"] == true));
}

#[test]
fn signatures_filter_by_class() {
    let dir = tempfile::tempdir().unwrap();
    hostward(&dir.path().join("config.toml"))
        .args(["signatures", "--category", "hooking"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SHA-256:"))
        .stdout(predicate::str::contains("frida").or(predicate::str::contains("xposed")));
}

#[test]
fn operator_denylist_replaces_embedded_one() {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("list.json");
    std::fs::write(
        &list,
        r#"{"version":"site-7","entries":[{"identifier":"com.example.bad","category":"package"}]}"#,
    )
    .unwrap();

    hostward(&dir.path().join("config.toml"))
        .args(["--output", "yaml", "signatures", "--denylist"])
        .arg(&list)
        .assert()
        .success()
        .stdout(predicate::str::contains("version: site-7"))
        .stdout(predicate::str::contains("com.example.bad"));
}

#[test]
fn config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hostward").join("config.toml");

    hostward(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    hostward(&path).args(["config", "init"]).assert().success();
    assert!(path.exists());

    hostward(&path)
        .args(["config", "init"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--force"));

    hostward(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("category_budget_ms = 2000"));
}

#[test]
fn json_report_carries_identity_and_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let assert = hostward(&dir.path().join("config.toml"))
        .args(["--output", "json", "assess", "selinux", "network"])
        .assert()
        .code(predicate::in_iter([0, 1, 2]));

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert!(!report["node_id"].as_str().unwrap().is_empty());
    assert!(report["generated_at"].is_string());
    assert!(!report["denylist_version"].as_str().unwrap().is_empty());

    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["category"], "selinux");
    assert_eq!(results[1]["category"], "network");

    let worst = results
        .iter()
        .map(|r| match r["classification"].as_str().unwrap() {
            "passed" => 0,
            "warning" => 1,
            _ => 2,
        })
        .max()
        .unwrap();
    assert_eq!(assert.get_output().status.code(), Some(worst));
}
