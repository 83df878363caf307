use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn pages_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pages"));
    cmd.current_dir(cwd)
        .env_remove("PAGES_CONFIG")
        .env("NO_COLOR", "1");
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("pages-config.yaml");
    fs::write(&path, body).expect("write config");
    path
}

const VALID: &str = "\
home: /srv/pages
git_url_prefix: git@github.com:example-org
builders:
  - branch: pages
    repository_dir: repos/pages
    generated_site_dir: sites/pages
    internal_site_dir: sites/internal
  - branch_in_url_pattern: 'v[0-9]+'
    repository_dir: repos/versions
    generated_site_dir: sites/versions
";

#[test]
fn check_lists_builders_from_default_path() {
    let dir = TempDir::new().expect("dir");
    write_config(&dir, VALID);

    pages_cmd(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(contains("[0] example-org/pages -> /srv/pages/sites/pages"))
        .stdout(contains("internal -> /srv/pages/sites/internal"))
        .stdout(contains("[1] example-org/v[0-9]+"));
}

#[test]
fn check_json_reports_each_builder() {
    let dir = TempDir::new().expect("dir");
    let path = write_config(&dir, VALID);

    let assert = pages_cmd(dir.path())
        .args(["check", "--json", "--config"])
        .arg(&path)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(parsed.as_array().map(Vec::len), Some(2));
    assert_eq!(parsed[1]["branch"], "v[0-9]+");
}

#[test]
fn check_honours_pages_config_env() {
    let dir = TempDir::new().expect("dir");
    let path = dir.path().join("elsewhere.yaml");
    fs::write(&path, VALID).expect("write");

    pages_cmd(dir.path())
        .env("PAGES_CONFIG", &path)
        .arg("check")
        .assert()
        .success()
        .stdout(contains("elsewhere.yaml"));
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().expect("dir");
    pages_cmd(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("configuration not found"));
}

#[test]
fn invalid_pattern_fails_check() {
    let dir = TempDir::new().expect("dir");
    write_config(
        &dir,
        "home: /srv/pages\ngit_url_prefix: x\nbuilders:\n  - branch_in_url_pattern: 'v[0-9'\n    repository_dir: r\n    generated_site_dir: s\n",
    );
    pages_cmd(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("builders[0] has an invalid branch pattern"));
}

#[test]
fn build_with_pattern_builder_requires_branch() {
    let dir = TempDir::new().expect("dir");
    write_config(&dir, VALID);
    pages_cmd(dir.path())
        .args(["build", "hub", "--builder", "1"])
        .assert()
        .failure()
        .stderr(contains("pass --branch"));
}
