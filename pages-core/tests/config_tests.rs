//! Configuration loading, error-message and validation tests.

use assert_fs::prelude::*;
use pages_core::{config, ConfigError, WebhookType};
use predicates::prelude::predicate;
use std::fs;
use std::path::PathBuf;

const FULL: &str = "\
home: /usr/local/pages
host: 0.0.0.0
port: 5005
webhook_type: bitbucket
git_url_prefix: git@github.com:example-org
pages_config: _config_site.yml
pages_yaml: .pages.yml
bundler_cache_dir: bundler_cache_dir
rsync_opts: [-vaxp, --delete]
publish:
  bucket: pages-example
  extra_args: [--delete]
builders:
  - branch: pages
    repository_dir: repos/pages.example.com
    generated_site_dir: sites/pages.example.com
  - branch_in_url_pattern: 'v[0-9]+\\.[0-9]+'
    repository_dir: repos/pages-internal.example.com
    generated_site_dir: sites/pages-public.example.com
    internal_site_dir: sites/pages-internal.example.com
    git_url_prefix: https://git.example.com/scm/docs/
";

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_missing_config_returns_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("pages-config.yaml");
    let err = config::load_at(&path).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("configuration not found"));
    assert!(err.to_string().contains("pages-config.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("pages-config.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("pages-config.yaml"));
}

#[test]
fn builder_without_branch_is_invalid() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("pages-config.yaml");
    file.write_str(
        "home: /srv\ngit_url_prefix: git@github.com:org\nbuilders:\n  - repository_dir: r\n    generated_site_dir: s\n",
    )
    .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
    assert!(err.to_string().contains("builders[0]"));
}

#[test]
fn builder_without_any_git_url_prefix_is_invalid() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("pages-config.yaml");
    file.write_str(
        "home: /srv\nbuilders:\n  - branch: pages\n    repository_dir: r\n    generated_site_dir: s\n",
    )
    .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(err.to_string().contains("git_url_prefix"), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Full file
// ---------------------------------------------------------------------------

#[test]
fn full_config_loads_every_field() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("pages-config.yaml");
    file.write_str(FULL).expect("write");
    file.assert(predicate::path::exists());

    let config = config::load_at(file.path()).expect("load");
    assert_eq!(config.home, PathBuf::from("/usr/local/pages"));
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 5005);
    assert_eq!(config.webhook_type, WebhookType::Bitbucket);
    assert_eq!(config.pages_config, "_config_site.yml");
    assert_eq!(config.pages_yaml.as_deref(), Some(".pages.yml"));
    assert_eq!(config.rsync_opts, vec!["-vaxp", "--delete"]);

    let publish = config.publish.as_ref().expect("publish section");
    assert_eq!(publish.bucket, "pages-example");
    assert_eq!(publish.program, "aws", "program defaults to aws");
    assert_eq!(publish.extra_args, vec!["--delete"]);

    assert_eq!(config.builders.len(), 2);
    assert_eq!(config.builders[0].branch_pattern(), Some("pages"));
    assert_eq!(config.builders[1].branch_pattern(), Some("v[0-9]+\\.[0-9]+"));
    assert_eq!(
        config.builders[1].internal_site_dir.as_deref(),
        Some(std::path::Path::new("sites/pages-internal.example.com"))
    );
}

#[test]
fn reserialized_config_loads_identically() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("pages-config.yaml");
    file.write_str(FULL).expect("write");
    let first = config::load_at(file.path()).expect("load");

    let again = dir.child("again.yaml");
    again
        .write_str(&serde_yaml::to_string(&first).expect("serialize"))
        .expect("write");
    let second = config::load_at(again.path()).expect("reload");
    assert_eq!(first, second);

    // The original file is never touched by loading.
    assert_eq!(fs::read_to_string(file.path()).expect("read"), FULL);
}
